//! Search orchestration.
//!
//! A search runs through product type resolution, plugin selection and page
//! queries. Single page searches use the highest priority provider;
//! [`SearchOrchestrator::search_with_fallback`] walks the providers in
//! priority order until one returns products.

use std::path::{Path, PathBuf};

use eogate_registry::{CrunchOptions, PluginRegistry, QueryOutcome, QueryRequest, RegistryError, SearchPluginHandle};
use eogate_types::{EoProduct, Filters, SearchResult};
use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{
    count::reconcile_total,
    error::SearchError,
    guess::{CatalogGuesser, GUESSABLE_KEYS, ProductTypeGuesser},
    pages::PageIter,
};

/// Page size used when the caller does not choose one.
pub const DEFAULT_ITEMS_PER_PAGE: u32 = 20;
/// Page size of exhaustive searches when the provider declares no maximum.
pub const DEFAULT_MAX_ITEMS_PER_PAGE: u32 = 50;

/// A logical search request.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchParams {
    /// Product type to search; guessed from the filters when absent.
    pub product_type: Option<String>,
    /// Provider name or group restricting plugin selection.
    pub provider: Option<String>,
    pub filters: Filters,
    /// 1-based page number.
    pub page: u32,
    pub items_per_page: u32,
    /// Ask providers for the total number of matches.
    pub count: bool,
    /// Surface the first provider error instead of logging it.
    pub raise_errors: bool,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            product_type: None,
            provider: None,
            filters: Filters::new(),
            page: 1,
            items_per_page: DEFAULT_ITEMS_PER_PAGE,
            count: false,
            raise_errors: false,
        }
    }
}

impl SearchParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_product_type(mut self, product_type: impl Into<String>) -> Self {
        self.product_type = Some(product_type.into());
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_filter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.insert(key.into(), value.into());
        self
    }

    pub fn with_page(mut self, page: u32, items_per_page: u32) -> Self {
        self.page = page;
        self.items_per_page = items_per_page;
        self
    }

    pub fn with_count(mut self, count: bool) -> Self {
        self.count = count;
        self
    }

    pub fn strict(mut self) -> Self {
        self.raise_errors = true;
        self
    }

    fn query_request(&self, product_type: Option<String>, page: u32, items_per_page: u32) -> QueryRequest {
        QueryRequest {
            product_type,
            filters: self.filters.clone(),
            page: page.max(1),
            items_per_page: items_per_page.max(1),
            count: self.count,
            auth: None,
            next_page_url: None,
        }
    }
}

/// Where a search request is sent once its product type is resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    ProductType(Option<String>),
    ById(String),
}

/// Entry point for searching and downloading across providers.
pub struct SearchOrchestrator {
    registry: PluginRegistry,
    guesser: Box<dyn ProductTypeGuesser>,
}

impl SearchOrchestrator {
    pub fn new(registry: PluginRegistry, guesser: impl ProductTypeGuesser + 'static) -> Self {
        Self {
            registry,
            guesser: Box::new(guesser),
        }
    }

    /// Orchestrator over the configured providers and the built-in product
    /// type catalog.
    pub fn from_environment() -> Result<Self, SearchError> {
        let registry = PluginRegistry::from_environment()?;
        let guesser = CatalogGuesser::embedded().map_err(RegistryError::from)?;
        Ok(Self::new(registry, guesser))
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    /// Mutable access for priority changes and provider updates.
    pub fn registry_mut(&mut self) -> &mut PluginRegistry {
        &mut self.registry
    }

    /// Queries one page on the highest priority provider.
    ///
    /// A provider failure yields an empty result unless `raise_errors` is set.
    pub fn search(&self, params: &SearchParams) -> Result<SearchResult, SearchError> {
        let product_type = match self.resolve(params)? {
            Target::ById(id) => return self.by_id(&id, params.provider.as_deref(), params.raise_errors),
            Target::ProductType(product_type) => product_type,
        };
        let Some(plugin) = self.first_plugin(product_type.as_deref(), params.provider.as_deref())? else {
            info!(product_type = ?product_type, "no provider available for search");
            return Ok(SearchResult::empty());
        };
        let request = params.query_request(product_type, params.page, params.items_per_page);
        match run_query(&self.registry, &plugin, &request) {
            Ok(outcome) => Ok(page_result(outcome, &request)),
            Err(error) if error.is_provider_error() && !params.raise_errors => {
                warn!(provider = %plugin.provider(), error = %error, "search failed, returning an empty result");
                Ok(SearchResult::empty())
            }
            Err(error) => Err(error),
        }
    }

    /// Lazily iterates over the pages of the highest priority provider,
    /// starting at `params.page`.
    pub fn search_iter_page(&self, params: &SearchParams) -> Result<PageIter<'_>, SearchError> {
        let product_type = match self.resolve(params)? {
            Target::ById(id) => {
                let result = self.by_id(&id, params.provider.as_deref(), params.raise_errors)?;
                return Ok(PageIter::once(&self.registry, result));
            }
            Target::ProductType(product_type) => product_type,
        };
        let Some(plugin) = self.first_plugin(product_type.as_deref(), params.provider.as_deref())? else {
            return Ok(PageIter::empty(&self.registry));
        };
        let request = params.query_request(product_type, params.page, params.items_per_page);
        Ok(PageIter::new(&self.registry, plugin, request, params.raise_errors))
    }

    /// Collects every page of the highest priority provider.
    ///
    /// Pages are as large as the provider allows. The total is the number of
    /// collected products.
    pub fn search_all(&self, params: &SearchParams) -> Result<SearchResult, SearchError> {
        let product_type = match self.resolve(params)? {
            Target::ById(id) => return self.by_id(&id, params.provider.as_deref(), params.raise_errors),
            Target::ProductType(product_type) => product_type,
        };
        let Some(plugin) = self.first_plugin(product_type.as_deref(), params.provider.as_deref())? else {
            return Ok(SearchResult::empty());
        };
        let items_per_page = plugin.max_items_per_page().unwrap_or(DEFAULT_MAX_ITEMS_PER_PAGE);
        let mut request = params.query_request(product_type, 1, items_per_page);
        request.count = false;
        let provider = plugin.provider().to_string();

        let mut products = Vec::new();
        for page in PageIter::new(&self.registry, plugin, request, params.raise_errors) {
            products.extend(page?.products);
        }
        info!(provider = %provider, product_count = products.len(), "exhaustive search finished");
        let total = products.len() as u64;
        Ok(SearchResult::new(products, Some(total)))
    }

    /// Queries providers in priority order until one returns products.
    ///
    /// Empty results and provider failures move on to the next provider;
    /// with `raise_errors` the first failure is returned instead. When every
    /// provider is exhausted the result is empty with a total of zero.
    pub fn search_with_fallback(&self, params: &SearchParams) -> Result<SearchResult, SearchError> {
        let product_type = match self.resolve(params)? {
            Target::ById(id) => return self.by_id(&id, params.provider.as_deref(), params.raise_errors),
            Target::ProductType(product_type) => product_type,
        };
        let request = params.query_request(product_type.clone(), params.page, params.items_per_page);
        for plugin in self.registry.get_search_plugins(product_type.as_deref(), params.provider.as_deref())? {
            let plugin = plugin?;
            match run_query(&self.registry, &plugin, &request) {
                Ok(outcome) if outcome.products.is_empty() => {
                    debug!(provider = %plugin.provider(), "no products, trying the next provider");
                }
                Ok(outcome) => return Ok(page_result(outcome, &request)),
                Err(error) if error.is_provider_error() && !params.raise_errors => {
                    warn!(provider = %plugin.provider(), error = %error, "provider failed, trying the next provider");
                }
                Err(error) => return Err(error),
            }
        }
        info!(product_type = ?product_type, "no provider returned products");
        Ok(SearchResult::empty())
    }

    /// Finds a product by identifier, on `provider` or on every provider in
    /// priority order. Provider failures are logged and skipped.
    pub fn search_by_id(&self, id: &str, provider: Option<&str>) -> Result<SearchResult, SearchError> {
        self.by_id(id, provider, false)
    }

    /// Downloads `product` through its provider's download plugin.
    pub fn download(&self, product: &EoProduct, output_dir: Option<&Path>) -> Result<PathBuf, SearchError> {
        let provider = product.provider.as_str();
        let plugin = self.registry.get_download_plugin(product)?;
        let auth = match self.registry.get_download_auth_plugin(provider)? {
            Some(auth) => Some(auth.authenticate().map_err(|source| SearchError::provider(provider, source))?),
            None => None,
        };
        let path = plugin
            .download(product, auth.as_ref(), output_dir)
            .map_err(|source| SearchError::provider(provider, source))?;
        info!(provider = %provider, path = %path.display(), "product downloaded");
        Ok(path)
    }

    /// Downloads every product of `result` in order, stopping at the first
    /// failure.
    pub fn download_all(&self, result: &SearchResult, output_dir: Option<&Path>) -> Result<Vec<PathBuf>, SearchError> {
        if result.is_empty() {
            info!("empty search result, nothing to download");
            return Ok(Vec::new());
        }
        result.products.iter().map(|product| self.download(product, output_dir)).collect()
    }

    /// Filters `result` through the named crunch plugin.
    pub fn crunch(&self, result: SearchResult, name: &str, options: &CrunchOptions) -> Result<SearchResult, SearchError> {
        let cruncher = self.registry.get_crunch_plugin(name, options)?;
        let before = result.len();
        let result = result.filter_with(|products| cruncher.proceed(products));
        debug!(cruncher = %name, before, after = result.len(), "results crunched");
        Ok(result)
    }

    fn resolve(&self, params: &SearchParams) -> Result<Target, SearchError> {
        if let Some(product_type) = &params.product_type {
            return Ok(Target::ProductType(Some(product_type.clone())));
        }
        let id = params.filters.get("id").and_then(value_text);
        let keywords: IndexMap<String, String> = GUESSABLE_KEYS
            .iter()
            .filter_map(|key| params.filters.get(*key).and_then(value_text).map(|value| (key.to_string(), value)))
            .collect();
        if keywords.is_empty() {
            return Ok(match id {
                Some(id) => Target::ById(id),
                None => Target::ProductType(None),
            });
        }
        let guesses = match self.guesser.guess(&keywords) {
            Ok(guesses) => guesses,
            Err(SearchError::NoMatchingProductType { .. }) => Vec::new(),
            Err(error) => return Err(error),
        };
        if let Some(product_type) = guesses.into_iter().next() {
            debug!(product_type = %product_type, "product type resolved from keywords");
            return Ok(Target::ProductType(Some(product_type)));
        }
        Ok(match id {
            Some(id) => {
                debug!(keywords = ?keywords, "no product type matches, searching by id");
                Target::ById(id)
            }
            None => {
                info!(keywords = ?keywords, "no product type matches, searching without product type");
                Target::ProductType(None)
            }
        })
    }

    fn first_plugin(&self, product_type: Option<&str>, provider: Option<&str>) -> Result<Option<SearchPluginHandle>, SearchError> {
        let plugin = self.registry.get_search_plugins(product_type, provider)?.next().transpose()?;
        Ok(plugin)
    }

    fn by_id(&self, id: &str, provider: Option<&str>, raise_errors: bool) -> Result<SearchResult, SearchError> {
        let mut filters = Filters::new();
        filters.insert("id".to_string(), Value::String(id.to_string()));
        let request = QueryRequest {
            filters,
            page: 1,
            items_per_page: DEFAULT_ITEMS_PER_PAGE,
            ..QueryRequest::default()
        };
        for plugin in self.registry.get_search_plugins(None, provider)? {
            let plugin = plugin?;
            let outcome = match run_query(&self.registry, &plugin, &request) {
                Ok(outcome) => outcome,
                Err(error) if error.is_provider_error() && !raise_errors => {
                    warn!(provider = %plugin.provider(), error = %error, "search by id failed, trying the next provider");
                    continue;
                }
                Err(error) => return Err(error),
            };
            let products: Vec<EoProduct> = outcome
                .products
                .into_iter()
                .filter(|product| product.id().as_deref() == Some(id))
                .collect();
            if !products.is_empty() {
                info!(provider = %plugin.provider(), id = %id, "product found by id");
                let total = products.len() as u64;
                return Ok(SearchResult::new(products, Some(total)));
            }
        }
        info!(id = %id, "no provider knows this product id");
        Ok(SearchResult::empty())
    }
}

impl std::fmt::Debug for SearchOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchOrchestrator").field("registry", &self.registry).finish_non_exhaustive()
    }
}

/// Runs one query after authenticating, and checks the plugin only returned
/// products of its own provider.
pub(crate) fn run_query(registry: &PluginRegistry, plugin: &SearchPluginHandle, request: &QueryRequest) -> Result<QueryOutcome, SearchError> {
    let provider = plugin.provider();
    let mut request = request.clone();
    if let Some(auth) = registry.get_auth_plugin(provider)? {
        request.auth = Some(auth.authenticate().map_err(|source| SearchError::provider(provider, source))?);
    }
    debug!(provider = %provider, product_type = ?request.product_type, page = request.page, "querying provider");
    let outcome = plugin.query(&request).map_err(|source| SearchError::provider(provider, source))?;
    if let Some(stray) = outcome.products.iter().find(|product| product.provider != provider) {
        return Err(SearchError::PluginContractViolation {
            provider: provider.to_string(),
            message: format!("returned a product of provider {}", stray.provider),
        });
    }
    Ok(outcome)
}

/// Turns a query outcome into a page of results with a reconciled total.
pub(crate) fn page_result(outcome: QueryOutcome, request: &QueryRequest) -> SearchResult {
    let total = reconcile_total(request.count, outcome.total, request.page, request.items_per_page, outcome.products.len());
    SearchResult::new(outcome.products, total)
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use eogate_registry::{PluginCatalog, ProvidersConfig};
    use eogate_util::{HttpClient, HttpError, HttpRequest, HttpResponse};

    use super::*;

    struct Offline;

    impl HttpClient for Offline {
        fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, HttpError> {
            Err(HttpError::Transport {
                url: request.url.clone(),
                message: "offline".to_string(),
            })
        }
    }

    struct Fixed(Vec<String>);

    impl ProductTypeGuesser for Fixed {
        fn guess(&self, keywords: &IndexMap<String, String>) -> Result<Vec<String>, SearchError> {
            if self.0.is_empty() {
                return Err(SearchError::NoMatchingProductType {
                    keywords: format!("{keywords:?}"),
                });
            }
            Ok(self.0.clone())
        }
    }

    struct NoGuess;

    impl ProductTypeGuesser for NoGuess {
        fn guess(&self, _keywords: &IndexMap<String, String>) -> Result<Vec<String>, SearchError> {
            Ok(Vec::new())
        }
    }

    fn orchestrator(guesses: &[&str]) -> SearchOrchestrator {
        let registry = PluginRegistry::new(ProvidersConfig::default(), PluginCatalog::default(), Arc::new(Offline));
        SearchOrchestrator::new(registry, Fixed(guesses.iter().map(|guess| guess.to_string()).collect()))
    }

    #[test]
    fn explicit_product_type_wins_over_keywords() {
        let orchestrator = orchestrator(&["S1_SAR_GRD"]);
        let params = SearchParams::new().with_product_type("S2_MSI_L1C").with_filter("platform", "SENTINEL1");
        assert_eq!(orchestrator.resolve(&params).expect("resolve"), Target::ProductType(Some("S2_MSI_L1C".into())));
    }

    #[test]
    fn first_guess_is_used() {
        let orchestrator = orchestrator(&["S2_MSI_L1C", "S2_MSI_L2A"]);
        let params = SearchParams::new().with_filter("platform", "SENTINEL2");
        assert_eq!(orchestrator.resolve(&params).expect("resolve"), Target::ProductType(Some("S2_MSI_L1C".into())));
    }

    #[test]
    fn no_keywords_searches_unfiltered() {
        let orchestrator = orchestrator(&[]);
        let params = SearchParams::new().with_filter("cloudCover", 20);
        assert_eq!(orchestrator.resolve(&params).expect("resolve"), Target::ProductType(None));
    }

    #[test]
    fn unmatched_keywords_with_id_search_by_id() {
        let orchestrator = orchestrator(&[]);
        let params = SearchParams::new().with_filter("platform", "SPOT").with_filter("id", "S2A_1");
        assert_eq!(orchestrator.resolve(&params).expect("resolve"), Target::ById("S2A_1".into()));
    }

    #[test]
    fn unmatched_keywords_without_id_search_unfiltered() {
        let orchestrator = orchestrator(&[]);
        let params = SearchParams::new().with_filter("platform", "SPOT");
        assert_eq!(orchestrator.resolve(&params).expect("resolve"), Target::ProductType(None));
    }

    #[test]
    fn empty_guess_list_behaves_like_no_match() {
        let registry = PluginRegistry::new(ProvidersConfig::default(), PluginCatalog::default(), Arc::new(Offline));
        let orchestrator = SearchOrchestrator::new(registry, NoGuess);
        let with_id = SearchParams::new().with_filter("instrument", "MSI").with_filter("id", "S2A_1");
        assert_eq!(orchestrator.resolve(&with_id).expect("resolve"), Target::ById("S2A_1".into()));
        let without_id = SearchParams::new().with_filter("instrument", "MSI");
        assert_eq!(orchestrator.resolve(&without_id).expect("resolve"), Target::ProductType(None));
    }

    #[test]
    fn null_keywords_are_ignored() {
        let orchestrator = orchestrator(&[]);
        let params = SearchParams::new().with_filter("platform", Value::Null);
        assert_eq!(orchestrator.resolve(&params).expect("resolve"), Target::ProductType(None));
    }

    #[test]
    fn page_result_reconciles_totals() {
        let request = QueryRequest {
            page: 3,
            items_per_page: 10,
            ..QueryRequest::default()
        };
        let outcome = QueryOutcome {
            products: vec![
                EoProduct::new("p", None, Default::default()),
                EoProduct::new("p", None, Default::default()),
            ],
            total: Some(0),
            resume_token: None,
        };
        let result = page_result(outcome, &request);
        assert_eq!(result.number_matched, Some(20));
        assert_eq!(result.len(), 2);
    }
}
