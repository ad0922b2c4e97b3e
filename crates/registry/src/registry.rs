//! Provider selection and plugin instance management.

use std::{
    cmp::Reverse,
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use eogate_types::{EoProduct, GENERIC_PRODUCT_TYPE};
use eogate_util::{HttpClient, ReqwestClient};
use indexmap::IndexMap;
use tracing::{debug, info};

use crate::{
    catalog::{PluginCatalog, PluginContext},
    config::{LoadOptions, PluginConfig, ProviderConfig, ProvidersConfig, merge_yaml},
    crunch::CrunchOptions,
    error::{ConfigError, PluginKind, RegistryError},
    plugins::{
        AuthPluginHandle, CrunchPlugin, DownloadBackend, DownloadPluginHandle, SearchBackend, SearchPluginHandle, SharedApi, SharedAuth,
        SharedDownload, SharedSearch,
    },
};

#[derive(Clone)]
enum CachedPlugin {
    Search(SharedSearch),
    Api(SharedApi),
    Download(SharedDownload),
    Auth(SharedAuth),
}

/// Owns provider configurations and the plugins built from them.
///
/// Plugin instances are created on first use and kept for the registry's
/// lifetime, one per provider and configuration slot. Crunch plugins are
/// built fresh on every request since their options vary per call.
pub struct PluginRegistry {
    providers: IndexMap<String, ProviderConfig>,
    catalog: PluginCatalog,
    http: Arc<dyn HttpClient>,
    cache: Mutex<HashMap<(String, PluginKind), CachedPlugin>>,
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("providers", &self.providers.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl PluginRegistry {
    pub fn new(config: ProvidersConfig, catalog: PluginCatalog, http: Arc<dyn HttpClient>) -> Self {
        Self {
            providers: config.into_providers(),
            catalog,
            http,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Loads the configuration cascade and uses the built-in plugin catalog
    /// with a blocking reqwest client.
    pub fn from_environment() -> Result<Self, RegistryError> {
        let config = ProvidersConfig::load(LoadOptions::default())?;
        let http = ReqwestClient::new().map_err(|error| RegistryError::misconfigured("http client", error.to_string()))?;
        info!(provider_count = config.len(), "provider configuration loaded");
        Ok(Self::new(config, PluginCatalog::default(), Arc::new(http)))
    }

    pub fn providers(&self) -> impl Iterator<Item = &ProviderConfig> {
        self.providers.values()
    }

    pub fn provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.get(name)
    }

    /// Product types offered by at least one provider, in first-seen order.
    pub fn product_types(&self) -> Vec<&str> {
        let mut product_types: Vec<&str> = Vec::new();
        for product_type in self.providers.values().flat_map(|provider| provider.products.keys()) {
            if product_type != GENERIC_PRODUCT_TYPE && !product_types.contains(&product_type.as_str()) {
                product_types.push(product_type);
            }
        }
        product_types
    }

    /// Changes a provider's priority. Iterators already obtained from
    /// [`Self::get_search_plugins`] keep their order.
    pub fn set_priority(&mut self, provider: &str, priority: i64) -> Result<(), RegistryError> {
        let config = self
            .providers
            .get_mut(provider)
            .ok_or_else(|| RegistryError::UnsupportedProvider(provider.to_string()))?;
        info!(provider = %provider, from = config.priority, to = priority, "provider priority updated");
        config.priority = priority;
        Ok(())
    }

    /// Merges a YAML override into a provider's configuration and drops its
    /// cached plugins.
    pub fn update_provider(&mut self, provider: &str, overlay: serde_yaml::Value) -> Result<(), RegistryError> {
        let current = self
            .providers
            .get(provider)
            .ok_or_else(|| RegistryError::UnsupportedProvider(provider.to_string()))?;
        let yaml_error = |source| ConfigError::Yaml {
            origin: format!("update of provider {provider}"),
            source,
        };
        let mut merged = serde_yaml::to_value(current).map_err(yaml_error)?;
        merge_yaml(&mut merged, overlay);
        let mut updated: ProviderConfig = serde_yaml::from_value(merged).map_err(yaml_error)?;
        updated.name = provider.to_string();
        updated.validate().map_err(|message| ConfigError::Invalid {
            provider: provider.to_string(),
            message,
        })?;
        self.providers.insert(provider.to_string(), updated);
        self.cache().retain(|(name, _), _| name != provider);
        debug!(provider = %provider, "provider configuration updated");
        Ok(())
    }

    /// Adds (or replaces) a provider.
    pub fn add_provider(&mut self, provider: ProviderConfig) -> Result<(), RegistryError> {
        provider.validate().map_err(|message| ConfigError::Invalid {
            provider: provider.name.clone(),
            message,
        })?;
        let name = provider.name.clone();
        self.cache().retain(|(cached, _), _| *cached != name);
        self.providers.insert(name, provider);
        Ok(())
    }

    /// Search plugins able to serve `product_type`, highest priority first.
    ///
    /// Providers declaring the product type are used when there are any,
    /// otherwise those declaring [`GENERIC_PRODUCT_TYPE`]. `provider`
    /// restricts the selection to a provider name or group. Equal priorities
    /// keep configuration order. The order is fixed when this is called;
    /// plugin instances are only built as the iterator advances.
    pub fn get_search_plugins(&self, product_type: Option<&str>, provider: Option<&str>) -> Result<SearchPlugins<'_>, RegistryError> {
        let mut candidates: Vec<&ProviderConfig> = match product_type {
            Some(product_type) => {
                let supporting: Vec<_> = self.providers.values().filter(|config| config.supports(product_type)).collect();
                if supporting.is_empty() {
                    info!(product_type = %product_type, "unsupported product type, using generic settings");
                    self.providers.values().filter(|config| config.supports(GENERIC_PRODUCT_TYPE)).collect()
                } else {
                    supporting
                }
            }
            None => self.providers.values().collect(),
        };
        if let Some(selector) = provider {
            candidates.retain(|config| config.matches(selector));
        }
        if candidates.is_empty() {
            return match (provider, product_type) {
                (Some(selector), _) => Err(RegistryError::UnsupportedProvider(selector.to_string())),
                (None, Some(product_type)) => Err(RegistryError::UnsupportedProductType(product_type.to_string())),
                (None, None) => Ok(SearchPlugins::new(self, Vec::new())),
            };
        }
        candidates.sort_by_key(|config| Reverse(config.priority));
        let order = candidates.into_iter().map(|config| config.name.clone()).collect();
        Ok(SearchPlugins::new(self, order))
    }

    /// The search plugin of one provider, built on first use.
    pub fn search_plugin(&self, provider: &str) -> Result<SearchPluginHandle, RegistryError> {
        let config = self.provider_config(provider)?;
        if let Some(search) = &config.search {
            let cached = self.cached(config, search, PluginKind::Search, |context| {
                Ok(CachedPlugin::Search(Arc::new(Mutex::new(self.catalog.build_search(context)?))))
            })?;
            if let CachedPlugin::Search(plugin) = cached {
                return Ok(SearchPluginHandle::new(provider, search.pagination.clone(), SearchBackend::Search(plugin)));
            }
        } else if let Some(api) = &config.api {
            let plugin = self.api_plugin(config, api)?;
            return Ok(SearchPluginHandle::new(provider, api.pagination.clone(), SearchBackend::Api(plugin)));
        }
        Err(RegistryError::misconfigured(format!("provider {provider}"), "no search plugin configured"))
    }

    /// The plugin able to download `product`, from its provider's `download`
    /// or `api` slot.
    pub fn get_download_plugin(&self, product: &EoProduct) -> Result<DownloadPluginHandle, RegistryError> {
        let provider = product.provider.as_str();
        let config = self.provider_config(provider)?;
        if let Some(download) = &config.download {
            let cached = self.cached(config, download, PluginKind::Download, |context| {
                Ok(CachedPlugin::Download(Arc::new(Mutex::new(self.catalog.build_download(context)?))))
            })?;
            if let CachedPlugin::Download(plugin) = cached {
                return Ok(DownloadPluginHandle::new(provider, DownloadBackend::Download(plugin)));
            }
        } else if let Some(api) = &config.api {
            let plugin = self.api_plugin(config, api)?;
            return Ok(DownloadPluginHandle::new(provider, DownloadBackend::Api(plugin)));
        }
        Err(RegistryError::misconfigured(format!("provider {provider}"), "no download plugin configured"))
    }

    /// Authentication for searching: `search_auth`, falling back to `auth`.
    /// `None` when the provider needs none.
    pub fn get_auth_plugin(&self, provider: &str) -> Result<Option<AuthPluginHandle>, RegistryError> {
        let config = self.provider_config(provider)?;
        match (&config.search_auth, &config.auth) {
            (Some(search_auth), _) => self.auth_plugin(config, search_auth, PluginKind::SearchAuth).map(Some),
            (None, Some(auth)) => self.auth_plugin(config, auth, PluginKind::Auth).map(Some),
            (None, None) => Ok(None),
        }
    }

    /// Authentication for downloading: `download_auth`, falling back to `auth`.
    pub fn get_download_auth_plugin(&self, provider: &str) -> Result<Option<AuthPluginHandle>, RegistryError> {
        let config = self.provider_config(provider)?;
        match (&config.download_auth, &config.auth) {
            (Some(download_auth), _) => self.auth_plugin(config, download_auth, PluginKind::DownloadAuth).map(Some),
            (None, Some(auth)) => self.auth_plugin(config, auth, PluginKind::Auth).map(Some),
            (None, None) => Ok(None),
        }
    }

    /// Builds a crunch plugin. Unknown names are configuration errors.
    pub fn get_crunch_plugin(&self, name: &str, options: &CrunchOptions) -> Result<Box<dyn CrunchPlugin>, RegistryError> {
        self.catalog.build_crunch(name, options)
    }

    fn provider_config(&self, provider: &str) -> Result<&ProviderConfig, RegistryError> {
        self.providers
            .get(provider)
            .ok_or_else(|| RegistryError::UnsupportedProvider(provider.to_string()))
    }

    fn api_plugin(&self, config: &ProviderConfig, api: &PluginConfig) -> Result<SharedApi, RegistryError> {
        match self.cached(config, api, PluginKind::Api, |context| {
            Ok(CachedPlugin::Api(Arc::new(Mutex::new(self.catalog.build_api(context)?))))
        })? {
            CachedPlugin::Api(plugin) => Ok(plugin),
            _ => Err(RegistryError::misconfigured(format!("provider {}", config.name), "api plugin cache entry has the wrong kind")),
        }
    }

    fn auth_plugin(&self, config: &ProviderConfig, slot: &PluginConfig, kind: PluginKind) -> Result<AuthPluginHandle, RegistryError> {
        match self.cached(config, slot, kind, |context| {
            Ok(CachedPlugin::Auth(Arc::new(Mutex::new(self.catalog.build_auth(context, kind)?))))
        })? {
            CachedPlugin::Auth(plugin) => Ok(AuthPluginHandle::new(config.name.clone(), plugin)),
            _ => Err(RegistryError::misconfigured(format!("provider {}", config.name), "auth plugin cache entry has the wrong kind")),
        }
    }

    fn cached<F>(&self, config: &ProviderConfig, slot: &PluginConfig, kind: PluginKind, build: F) -> Result<CachedPlugin, RegistryError>
    where
        F: FnOnce(&PluginContext<'_>) -> Result<CachedPlugin, RegistryError>,
    {
        let key = (config.name.clone(), kind);
        let mut cache = self.cache();
        if let Some(plugin) = cache.get(&key) {
            return Ok(plugin.clone());
        }
        let context = PluginContext {
            provider: config,
            config: slot,
            http: Arc::clone(&self.http),
        };
        let plugin = build(&context)?;
        debug!(provider = %config.name, kind = %kind, type_name = %slot.type_name, "plugin instance created");
        cache.insert(key, plugin.clone());
        Ok(plugin)
    }

    fn cache(&self) -> MutexGuard<'_, HashMap<(String, PluginKind), CachedPlugin>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Lazy iterator over search plugins in priority order.
pub struct SearchPlugins<'a> {
    registry: &'a PluginRegistry,
    pending: std::vec::IntoIter<String>,
}

impl<'a> SearchPlugins<'a> {
    fn new(registry: &'a PluginRegistry, order: Vec<String>) -> Self {
        Self {
            registry,
            pending: order.into_iter(),
        }
    }

    /// Provider names not yet visited.
    pub fn remaining(&self) -> &[String] {
        self.pending.as_slice()
    }
}

impl Iterator for SearchPlugins<'_> {
    type Item = Result<SearchPluginHandle, RegistryError>;

    fn next(&mut self) -> Option<Self::Item> {
        let provider = self.pending.next()?;
        Some(self.registry.search_plugin(&provider))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.pending.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use eogate_util::{HttpError, HttpRequest, HttpResponse};
    use indexmap::IndexMap;

    use super::*;
    use crate::plugins::{QueryOutcome, QueryRequest, SearchPlugin};

    struct Offline;

    impl HttpClient for Offline {
        fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, HttpError> {
            Err(HttpError::Transport {
                url: request.url.clone(),
                message: "offline".into(),
            })
        }
    }

    struct Silent;

    impl SearchPlugin for Silent {
        fn query(&mut self, _request: &QueryRequest) -> Result<QueryOutcome, crate::error::ProviderError> {
            Ok(QueryOutcome::default())
        }
    }

    const PROVIDERS: &str = r#"
name: a
priority: 2
products:
  X: {}
search:
  type: Counting
---
name: b
priority: 5
group: grouped
products:
  X: {}
search:
  type: Counting
auth:
  type: GenericAuth
---
name: c
priority: 5
products:
  GENERIC_PRODUCT_TYPE: {}
search:
  type: Counting
download:
  type: HttpDownload
"#;

    fn registry() -> (PluginRegistry, Arc<AtomicUsize>) {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&built);
        let mut catalog = PluginCatalog::default();
        catalog.register_search("Counting", move |_context| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(Silent))
        });
        let config = ProvidersConfig::from_yaml_str(PROVIDERS).expect("providers");
        (PluginRegistry::new(config, catalog, Arc::new(Offline)), built)
    }

    fn order(registry: &PluginRegistry, product_type: Option<&str>, provider: Option<&str>) -> Vec<String> {
        registry
            .get_search_plugins(product_type, provider)
            .expect("plugins")
            .map(|plugin| plugin.expect("build").provider().to_string())
            .collect()
    }

    #[test]
    fn orders_by_priority_then_configuration_order() {
        let (registry, _) = registry();
        assert_eq!(order(&registry, Some("X"), None), ["b", "a"]);
        assert_eq!(order(&registry, None, None), ["b", "c", "a"]);
    }

    #[test]
    fn falls_back_to_generic_providers() {
        let (registry, _) = registry();
        assert_eq!(order(&registry, Some("UNKNOWN"), None), ["c"]);
    }

    #[test]
    fn selects_by_name_or_group() {
        let (registry, _) = registry();
        assert_eq!(order(&registry, Some("X"), Some("grouped")), ["b"]);
        assert_eq!(order(&registry, Some("X"), Some("a")), ["a"]);
        assert!(matches!(
            registry.get_search_plugins(Some("X"), Some("c")),
            Err(RegistryError::UnsupportedProvider(name)) if name == "c"
        ));
    }

    #[test]
    fn builds_lazily_and_caches_instances() {
        let (registry, built) = registry();
        let mut plugins = registry.get_search_plugins(Some("X"), None).expect("plugins");
        assert_eq!(built.load(Ordering::SeqCst), 0);
        plugins.next().expect("first").expect("build");
        assert_eq!(built.load(Ordering::SeqCst), 1);
        assert_eq!(plugins.remaining(), ["a"]);
        drop(plugins);
        order(&registry, Some("X"), None);
        assert_eq!(built.load(Ordering::SeqCst), 2);
        order(&registry, Some("X"), None);
        assert_eq!(built.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn priority_changes_apply_to_new_iterators() {
        let (mut registry, _) = registry();
        registry.set_priority("a", 10).expect("known provider");
        assert_eq!(order(&registry, Some("X"), None), ["a", "b"]);
        assert!(matches!(registry.set_priority("nope", 1), Err(RegistryError::UnsupportedProvider(_))));
    }

    #[test]
    fn auth_and_download_slots() {
        let (registry, _) = registry();
        assert!(registry.get_auth_plugin("a").expect("known").is_none());
        assert!(registry.get_auth_plugin("b").expect("known").is_some());
        let product = EoProduct::new("c", None, IndexMap::new());
        assert_eq!(registry.get_download_plugin(&product).expect("download").provider(), "c");
        let orphan = EoProduct::new("a", None, IndexMap::new());
        assert!(matches!(registry.get_download_plugin(&orphan), Err(RegistryError::Misconfigured { .. })));
    }

    #[test]
    fn unknown_plugin_types_are_reported() {
        let (mut registry, _) = registry();
        registry
            .update_provider("a", serde_yaml::from_str("search:\n  type: Missing\n").expect("yaml"))
            .expect("update");
        assert_eq!(registry.provider("a").expect("a").priority, 2);
        let error = registry.search_plugin("a").expect_err("unknown type");
        assert!(matches!(error, RegistryError::UnknownPluginType { kind: PluginKind::Search, .. }));
    }

    #[test]
    fn unknown_crunchers_are_configuration_errors() {
        let (registry, _) = registry();
        assert!(matches!(
            registry.get_crunch_plugin("Sharpen", &CrunchOptions::new()),
            Err(RegistryError::UnknownCruncher(name)) if name == "Sharpen"
        ));
        assert!(registry.get_crunch_plugin("RemoveDoubles", &CrunchOptions::new()).is_ok());
        assert!(registry.get_crunch_plugin("FilterOverlap", &CrunchOptions::new()).is_ok());
        assert!(registry.get_crunch_plugin("FilterLatestIntersect", &CrunchOptions::new()).is_ok());
    }
}
