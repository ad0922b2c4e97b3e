//! Generic search plugin for JSON APIs driven by query strings.

use std::{collections::HashMap, sync::Arc};

use eogate_mapping::{
    CompiledMapping, ResultFormat, Template, compile_mapping, extract, format_query_params, json_path::JsonPath, value_to_text,
};
use eogate_types::{CanonicalProperties, EoProduct, GENERIC_PRODUCT_TYPE};
use eogate_util::{HttpClient, HttpRequest};
use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, info};

use super::{QueryOutcome, QueryRequest, SearchPlugin};
use crate::{
    catalog::PluginContext,
    config::{PluginConfig, ProductTypeConfig},
    error::{ProviderError, RegistryError},
};

const DEFAULT_RESULTS_ENTRY: &str = "features";

/// Builds a query string from the queryable entries of the provider's
/// mapping, `GET`s it and maps every entry of the result list.
///
/// Paging uses `pagination.next_page_url_tpl` unless the caller supplies a
/// ready-made next page URL.
pub struct QueryStringSearch {
    provider: String,
    config: PluginConfig,
    products: IndexMap<String, ProductTypeConfig>,
    http: Arc<dyn HttpClient>,
    results_path: JsonPath,
    total_path: Option<JsonPath>,
    next_page_path: Option<JsonPath>,
    mappings: HashMap<Option<String>, Arc<CompiledMapping>>,
}

impl QueryStringSearch {
    pub fn new(context: &PluginContext<'_>) -> Result<Self, RegistryError> {
        let provider = context.provider.name.clone();
        let config = context.config.clone();
        let misconfigured = |message: String| RegistryError::misconfigured(format!("search plugin of {provider}"), message);

        if config.api_endpoint.is_none() {
            return Err(misconfigured("missing api_endpoint".to_string()));
        }
        if config.result_type != ResultFormat::Json {
            return Err(misconfigured("QueryStringSearch only reads JSON results".to_string()));
        }
        let results_entry = config.results_entry.as_deref().unwrap_or(DEFAULT_RESULTS_ENTRY);
        let results_path = if results_entry.starts_with('$') {
            JsonPath::parse(results_entry)
        } else {
            JsonPath::parse(&format!("$['{results_entry}']"))
        }
        .map_err(misconfigured)?;
        let parse_optional = |path: Option<&String>| path.map(|path| JsonPath::parse(path)).transpose().map_err(misconfigured);
        let total_path = parse_optional(config.pagination.total_items_nb_key_path.as_ref())?;
        let next_page_path = parse_optional(config.pagination.next_page_url_key_path.as_ref())?;

        Ok(Self {
            provider,
            products: context.provider.products.clone(),
            http: Arc::clone(&context.http),
            results_path,
            total_path,
            next_page_path,
            mappings: HashMap::new(),
            config,
        })
    }

    fn product_config(&self, product_type: Option<&str>) -> Option<&ProductTypeConfig> {
        product_type
            .and_then(|product_type| self.products.get(product_type))
            .or_else(|| self.products.get(GENERIC_PRODUCT_TYPE))
    }

    /// Compiled mapping for `product_type`, built on first use.
    fn mapping_for(&mut self, product_type: Option<&str>) -> Result<Arc<CompiledMapping>, ProviderError> {
        let key = product_type.map(str::to_string);
        if let Some(mapping) = self.mappings.get(&key) {
            return Ok(Arc::clone(mapping));
        }
        let table = self.config.metadata_mapping_for(self.product_config(product_type));
        let compiled = Arc::new(compile_mapping(&table, self.config.result_type, self.config.discover_metadata.as_ref())?);
        debug!(provider = %self.provider, product_type = ?product_type, entries = table.len(), "compiled metadata mapping");
        self.mappings.insert(key, Arc::clone(&compiled));
        Ok(compiled)
    }

    /// Product type defaults overlaid with the caller's filters.
    fn effective_filters(&self, request: &QueryRequest) -> CanonicalProperties {
        let mut context = request.filters.clone();
        if let Some(product_type) = &request.product_type {
            context.insert("productType".to_string(), Value::String(product_type.clone()));
        }

        let mut filters = CanonicalProperties::new();
        if let Some(product) = self.product_config(request.product_type.as_deref()) {
            for (key, value) in product.default_filters() {
                match render_default(&value, &context) {
                    Some(value) => {
                        filters.insert(key, value);
                    }
                    None => debug!(provider = %self.provider, parameter = %key, "dropping default with unresolved fields"),
                }
            }
        }
        for (key, value) in &request.filters {
            if key == "productType" && filters.contains_key(key) {
                continue;
            }
            filters.insert(key.clone(), value.clone());
        }
        filters
    }

    fn build_url(&self, request: &QueryRequest, filters: &CanonicalProperties, mapping: &CompiledMapping) -> Result<String, ProviderError> {
        let endpoint = self.config.api_endpoint.as_deref().unwrap_or_default();
        let url = Template::parse(endpoint)?.render(filters)?;
        let params = format_query_params(mapping, filters)?;
        let search = {
            let mut serializer = url::form_urlencoded::Serializer::new(String::new());
            for (name, values) in &params {
                for value in values {
                    serializer.append_pair(name, value);
                }
            }
            serializer.finish()
        };

        let Some(template) = &self.config.pagination.next_page_url_tpl else {
            return Ok(if search.is_empty() { url } else { format!("{url}?{search}") });
        };
        let page = u64::from(request.page.max(1));
        let items_per_page = u64::from(request.items_per_page);
        let skip = (page - 1) * items_per_page;
        let fields: CanonicalProperties = [
            ("url", Value::String(url)),
            ("search", Value::String(search)),
            ("items_per_page", Value::from(items_per_page)),
            ("page", Value::from(page)),
            ("skip", Value::from(skip)),
            ("skip_base_1", Value::from(skip + 1)),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect();
        Ok(Template::parse(template)?.render(&fields)?)
    }

    fn single_match<'a>(path: Option<&JsonPath>, body: &'a Value) -> Option<&'a Value> {
        let matches = path?.find(body);
        match matches.as_slice() {
            [single] => Some(single.value),
            _ => None,
        }
    }
}

/// Renders placeholders in a product type default. `None` when a field is
/// missing from the request.
fn render_default(value: &Value, context: &CanonicalProperties) -> Option<Value> {
    let Value::String(text) = value else {
        return Some(value.clone());
    };
    if !text.contains('{') {
        return Some(value.clone());
    }
    Template::parse(text).ok()?.render(context).ok().map(Value::String)
}

impl SearchPlugin for QueryStringSearch {
    fn query(&mut self, request: &QueryRequest) -> Result<QueryOutcome, ProviderError> {
        let mapping = self.mapping_for(request.product_type.as_deref())?;
        let url = match &request.next_page_url {
            Some(url) => url.clone(),
            None => {
                let filters = self.effective_filters(request);
                self.build_url(request, &filters, &mapping)?
            }
        };

        let mut http_request = HttpRequest::get(url);
        if let Some(auth) = &request.auth {
            http_request = auth.apply(http_request);
        }
        let body = self.http.execute(&http_request)?.json()?;

        let results = match Self::single_match(Some(&self.results_path), &body) {
            Some(Value::Array(results)) => results.as_slice(),
            Some(other) => {
                return Err(ProviderError::Response(format!(
                    "expected a list at {}, got {}",
                    self.results_path.source(),
                    value_kind(other)
                )));
            }
            None => &[],
        };
        let products: Vec<EoProduct> = results
            .iter()
            .map(|raw| EoProduct::new(self.provider.clone(), request.product_type.clone(), extract(raw, &mapping)))
            .collect();

        let total = Self::single_match(self.total_path.as_ref(), &body).and_then(|value| match value {
            Value::Number(number) => number.as_u64(),
            Value::String(text) => text.trim().parse().ok(),
            _ => None,
        });
        let resume_token = Self::single_match(self.next_page_path.as_ref(), &body)
            .map(value_to_text)
            .filter(|url| !url.is_empty());

        info!(provider = %self.provider, page = request.page, product_count = products.len(), total = ?total, "search page retrieved");
        Ok(QueryOutcome {
            products,
            total,
            resume_token,
        })
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
