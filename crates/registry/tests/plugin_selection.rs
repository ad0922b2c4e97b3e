use std::sync::Arc;

use eogate_registry::{
    PluginCatalog, PluginRegistry, ProviderError, ProvidersConfig, QueryOutcome, QueryRequest, RegistryError, SearchPlugin,
};
use eogate_util::{HttpClient, HttpError, HttpRequest, HttpResponse};

struct Offline;

impl HttpClient for Offline {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, HttpError> {
        Err(HttpError::Transport {
            url: request.url.clone(),
            message: "offline".into(),
        })
    }
}

struct Empty;

impl SearchPlugin for Empty {
    fn query(&mut self, _request: &QueryRequest) -> Result<QueryOutcome, ProviderError> {
        Ok(QueryOutcome::default())
    }
}

const PROVIDERS: &str = r#"
name: a
products:
  X: {}
search:
  type: Empty
---
name: b
products:
  X: {}
search:
  type: Empty
"#;

fn registry() -> PluginRegistry {
    let mut catalog = PluginCatalog::default();
    catalog.register_search("Empty", |_| Ok(Box::new(Empty)));
    PluginRegistry::new(ProvidersConfig::from_yaml_str(PROVIDERS).expect("providers"), catalog, Arc::new(Offline))
}

fn providers_for(registry: &PluginRegistry, product_type: &str) -> Vec<String> {
    registry
        .get_search_plugins(Some(product_type), None)
        .expect("plugins")
        .map(|plugin| plugin.expect("plugin").provider().to_string())
        .collect()
}

#[test]
fn highest_priority_provider_comes_first() {
    let mut registry = registry();
    registry.set_priority("a", 2).expect("a");
    registry.set_priority("b", 5).expect("b");
    assert_eq!(providers_for(&registry, "X"), ["b", "a"]);
}

#[test]
fn unknown_provider_priority_is_rejected_without_mutation() {
    let mut registry = registry();
    registry.set_priority("a", 2).expect("a");
    let before: Vec<_> = registry.providers().map(|provider| (provider.name.clone(), provider.priority)).collect();

    let error = registry.set_priority("unknown-provider", 5).expect_err("unknown provider");
    assert!(matches!(error, RegistryError::UnsupportedProvider(ref name) if name == "unknown-provider"));

    let after: Vec<_> = registry.providers().map(|provider| (provider.name.clone(), provider.priority)).collect();
    assert_eq!(before, after);
    assert_eq!(providers_for(&registry, "X"), ["a", "b"]);
}

#[test]
fn unsupported_product_type_without_generic_provider() {
    let registry = registry();
    assert!(matches!(
        registry.get_search_plugins(Some("Y"), None),
        Err(RegistryError::UnsupportedProductType(ref product_type)) if product_type == "Y"
    ));
}
