//! Plugin contracts and the built-in plugin types.
//!
//! Plugins are stateful: they may cache compiled mappings or tokens. The
//! registry keeps one instance per provider and slot behind a mutex and hands
//! out cheap handles to it.

mod auth;
mod download;
mod search;

use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use eogate_types::{EoProduct, Filters};
use eogate_util::HttpRequest;

pub use auth::{GenericAuth, HttpHeaderAuth};
pub use download::HttpDownload;
pub use search::QueryStringSearch;

use crate::{config::PaginationConfig, error::ProviderError};

/// Parameters of one search query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryRequest {
    pub product_type: Option<String>,
    /// Canonical search criteria.
    pub filters: Filters,
    /// 1-based page number.
    pub page: u32,
    pub items_per_page: u32,
    /// Whether the caller wants the total number of results.
    pub count: bool,
    pub auth: Option<AuthHandle>,
    /// Fetch this URL instead of building one from the other fields.
    pub next_page_url: Option<String>,
}

/// What a search query produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOutcome {
    pub products: Vec<EoProduct>,
    /// Total reported by the provider, which may be inaccurate.
    pub total: Option<u64>,
    /// URL of the following page, when the provider announces one.
    pub resume_token: Option<String>,
}

/// Credentials ready to be attached to requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthHandle {
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub basic: Option<(String, String)>,
}

impl AuthHandle {
    /// Attaches the credentials to `request`.
    pub fn apply(&self, mut request: HttpRequest) -> HttpRequest {
        for (name, value) in &self.headers {
            request = request.with_header(name.clone(), value.clone());
        }
        for (name, value) in &self.query {
            request = request.with_query(name.clone(), value.clone());
        }
        if let Some((username, password)) = &self.basic {
            request = request.with_basic_auth(username.clone(), password.clone());
        }
        request
    }
}

pub trait SearchPlugin: Send {
    fn query(&mut self, request: &QueryRequest) -> Result<QueryOutcome, ProviderError>;
}

pub trait DownloadPlugin: Send {
    /// Downloads `product` into `output_dir` (or the plugin's configured
    /// directory) and returns the local path.
    fn download(&mut self, product: &EoProduct, auth: Option<&AuthHandle>, output_dir: Option<&Path>) -> Result<PathBuf, ProviderError>;
}

pub trait AuthPlugin: Send {
    fn authenticate(&mut self) -> Result<AuthHandle, ProviderError>;
}

/// A plugin that searches and downloads through one provider API.
pub trait ApiPlugin: SearchPlugin + DownloadPlugin {}

impl<T: SearchPlugin + DownloadPlugin> ApiPlugin for T {}

/// Post-processing of search results.
pub trait CrunchPlugin {
    fn proceed(&self, products: Vec<EoProduct>) -> Vec<EoProduct>;
}

pub(crate) type SharedSearch = Arc<Mutex<Box<dyn SearchPlugin>>>;
pub(crate) type SharedApi = Arc<Mutex<Box<dyn ApiPlugin>>>;
pub(crate) type SharedDownload = Arc<Mutex<Box<dyn DownloadPlugin>>>;
pub(crate) type SharedAuth = Arc<Mutex<Box<dyn AuthPlugin>>>;

fn lock<T: ?Sized>(plugin: &Mutex<T>) -> MutexGuard<'_, T> {
    plugin.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Clone)]
pub(crate) enum SearchBackend {
    Search(SharedSearch),
    Api(SharedApi),
}

/// A search-capable plugin bound to one provider.
#[derive(Clone)]
pub struct SearchPluginHandle {
    provider: String,
    pagination: PaginationConfig,
    backend: SearchBackend,
}

impl SearchPluginHandle {
    pub(crate) fn new(provider: impl Into<String>, pagination: PaginationConfig, backend: SearchBackend) -> Self {
        Self {
            provider: provider.into(),
            pagination,
            backend,
        }
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn max_items_per_page(&self) -> Option<u32> {
        self.pagination.max_items_per_page
    }

    pub fn query(&self, request: &QueryRequest) -> Result<QueryOutcome, ProviderError> {
        match &self.backend {
            SearchBackend::Search(plugin) => lock(plugin).query(request),
            SearchBackend::Api(plugin) => lock(plugin).query(request),
        }
    }
}

impl std::fmt::Debug for SearchPluginHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchPluginHandle").field("provider", &self.provider).finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub(crate) enum DownloadBackend {
    Download(SharedDownload),
    Api(SharedApi),
}

/// A download-capable plugin bound to one provider.
#[derive(Clone)]
pub struct DownloadPluginHandle {
    provider: String,
    backend: DownloadBackend,
}

impl DownloadPluginHandle {
    pub(crate) fn new(provider: impl Into<String>, backend: DownloadBackend) -> Self {
        Self {
            provider: provider.into(),
            backend,
        }
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn download(&self, product: &EoProduct, auth: Option<&AuthHandle>, output_dir: Option<&Path>) -> Result<PathBuf, ProviderError> {
        match &self.backend {
            DownloadBackend::Download(plugin) => lock(plugin).download(product, auth, output_dir),
            DownloadBackend::Api(plugin) => lock(plugin).download(product, auth, output_dir),
        }
    }
}

impl std::fmt::Debug for DownloadPluginHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadPluginHandle").field("provider", &self.provider).finish_non_exhaustive()
    }
}

/// An authentication plugin bound to one provider.
#[derive(Clone)]
pub struct AuthPluginHandle {
    provider: String,
    plugin: SharedAuth,
}

impl AuthPluginHandle {
    pub(crate) fn new(provider: impl Into<String>, plugin: SharedAuth) -> Self {
        Self {
            provider: provider.into(),
            plugin,
        }
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn authenticate(&self) -> Result<AuthHandle, ProviderError> {
        lock(&self.plugin).authenticate()
    }
}

impl std::fmt::Debug for AuthPluginHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthPluginHandle").field("provider", &self.provider).finish_non_exhaustive()
    }
}
