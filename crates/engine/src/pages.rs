//! Lazy page iteration over one search plugin.

use eogate_registry::{PluginRegistry, QueryRequest, SearchPluginHandle};
use eogate_types::{NOT_AVAILABLE, SearchResult};
use tracing::{debug, warn};

use crate::{
    error::SearchError,
    orchestrator::{page_result, run_query},
};

/// Iterator over the result pages of one provider.
///
/// Iteration stops after an empty page, after a page shorter than the
/// requested page size, or when a page starts with the same product as the
/// previous one (the provider ignores paging). Products without a usable `id`
/// never count as repeated. A next-page URL announced by the provider is used
/// for the following query only.
pub struct PageIter<'a> {
    registry: &'a PluginRegistry,
    plugin: Option<SearchPluginHandle>,
    request: QueryRequest,
    raise_errors: bool,
    previous_first: Option<(String, String)>,
    ready: Option<SearchResult>,
    done: bool,
}

impl<'a> PageIter<'a> {
    pub(crate) fn new(registry: &'a PluginRegistry, plugin: SearchPluginHandle, request: QueryRequest, raise_errors: bool) -> Self {
        Self {
            registry,
            plugin: Some(plugin),
            request,
            raise_errors,
            previous_first: None,
            ready: None,
            done: false,
        }
    }

    /// Iterator yielding an already computed result once.
    pub(crate) fn once(registry: &'a PluginRegistry, result: SearchResult) -> Self {
        Self {
            registry,
            plugin: None,
            request: QueryRequest::default(),
            raise_errors: false,
            previous_first: None,
            ready: (!result.is_empty()).then_some(result),
            done: false,
        }
    }

    /// Iterator yielding nothing.
    pub(crate) fn empty(registry: &'a PluginRegistry) -> Self {
        Self::once(registry, SearchResult::empty())
    }

    /// Provider the pages come from.
    pub fn provider(&self) -> Option<&str> {
        self.plugin.as_ref().map(SearchPluginHandle::provider)
    }

    /// Number of the page the next call to `next` fetches.
    pub fn next_page(&self) -> u32 {
        self.request.page
    }
}

impl Iterator for PageIter<'_> {
    type Item = Result<SearchResult, SearchError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(result) = self.ready.take() {
            self.done = true;
            return Some(Ok(result));
        }
        if self.done {
            return None;
        }
        let plugin = self.plugin.as_ref()?;
        let request = self.request.clone();
        let outcome = match run_query(self.registry, plugin, &request) {
            Ok(outcome) => outcome,
            Err(error) => {
                self.done = true;
                if error.is_provider_error() && !self.raise_errors {
                    warn!(provider = %plugin.provider(), page = request.page, error = %error, "page query failed, stopping iteration");
                    return None;
                }
                return Some(Err(error));
            }
        };

        let Some(first) = outcome.products.first() else {
            debug!(provider = %plugin.provider(), page = request.page, "empty page, iteration finished");
            self.done = true;
            return None;
        };
        let first = match first.identity() {
            (Some(id), provider) if id != NOT_AVAILABLE => Some((id, provider.to_string())),
            _ => None,
        };
        if first.is_some() && self.previous_first == first {
            warn!(
                provider = %plugin.provider(),
                page = request.page,
                "page starts with the previous page's first product, provider ignores paging"
            );
            self.done = true;
            return None;
        }
        if outcome.products.len() < request.items_per_page as usize {
            self.done = true;
        }
        self.previous_first = first;
        self.request.page += 1;
        self.request.next_page_url = outcome.resume_token.clone();
        debug!(provider = %plugin.provider(), page = request.page, product_count = outcome.products.len(), "page fetched");
        Some(Ok(page_result(outcome, &request)))
    }
}
