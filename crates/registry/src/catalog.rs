//! Plugin type catalog: which constructor builds which `type:` name.

use std::sync::Arc;

use eogate_util::HttpClient;
use indexmap::IndexMap;

use crate::{
    config::{PluginConfig, ProviderConfig},
    crunch::{
        CrunchOptions, FilterDate, FilterLatestByName, FilterLatestIntersect, FilterOverlap, FilterProperty, RemoveDoubles,
    },
    error::{PluginKind, RegistryError},
    plugins::{ApiPlugin, AuthPlugin, CrunchPlugin, DownloadPlugin, GenericAuth, HttpDownload, HttpHeaderAuth, QueryStringSearch, SearchPlugin},
};

/// What a plugin constructor gets to work with.
pub struct PluginContext<'a> {
    pub provider: &'a ProviderConfig,
    /// The slot the plugin is built from.
    pub config: &'a PluginConfig,
    pub http: Arc<dyn HttpClient>,
}

pub type SearchConstructor = Arc<dyn Fn(&PluginContext<'_>) -> Result<Box<dyn SearchPlugin>, RegistryError> + Send + Sync>;
pub type ApiConstructor = Arc<dyn Fn(&PluginContext<'_>) -> Result<Box<dyn ApiPlugin>, RegistryError> + Send + Sync>;
pub type DownloadConstructor = Arc<dyn Fn(&PluginContext<'_>) -> Result<Box<dyn DownloadPlugin>, RegistryError> + Send + Sync>;
pub type AuthConstructor = Arc<dyn Fn(&PluginContext<'_>) -> Result<Box<dyn AuthPlugin>, RegistryError> + Send + Sync>;
pub type CrunchConstructor = Arc<dyn Fn(&CrunchOptions) -> Result<Box<dyn CrunchPlugin>, RegistryError> + Send + Sync>;

/// Constructor tables per plugin kind.
///
/// [`PluginCatalog::default`] holds the built-in types; callers add their own
/// with the `register_*` methods before handing the catalog to the registry.
#[derive(Clone)]
pub struct PluginCatalog {
    search: IndexMap<String, SearchConstructor>,
    api: IndexMap<String, ApiConstructor>,
    download: IndexMap<String, DownloadConstructor>,
    auth: IndexMap<String, AuthConstructor>,
    crunch: IndexMap<String, CrunchConstructor>,
}

impl Default for PluginCatalog {
    fn default() -> Self {
        let mut catalog = Self::empty();
        catalog.register_search("QueryStringSearch", |context| Ok(Box::new(QueryStringSearch::new(context)?)));
        catalog.register_download("HttpDownload", |context| Ok(Box::new(HttpDownload::new(context)?)));
        catalog.register_auth("GenericAuth", |context| Ok(Box::new(GenericAuth::new(context)?)));
        catalog.register_auth("HttpHeaderAuth", |context| Ok(Box::new(HttpHeaderAuth::new(context)?)));
        catalog.register_crunch("FilterDate", |options| Ok(Box::new(FilterDate::new(options)?)));
        catalog.register_crunch("FilterProperty", |options| Ok(Box::new(FilterProperty::new(options)?)));
        catalog.register_crunch("FilterLatestByName", |options| Ok(Box::new(FilterLatestByName::new(options)?)));
        catalog.register_crunch("RemoveDoubles", |options| Ok(Box::new(RemoveDoubles::new(options)?)));
        catalog.register_crunch("FilterOverlap", |options| Ok(Box::new(FilterOverlap::new(options)?)));
        catalog.register_crunch("FilterLatestIntersect", |options| Ok(Box::new(FilterLatestIntersect::new(options)?)));
        catalog
    }
}

impl PluginCatalog {
    /// A catalog without any plugin type.
    pub fn empty() -> Self {
        Self {
            search: IndexMap::new(),
            api: IndexMap::new(),
            download: IndexMap::new(),
            auth: IndexMap::new(),
            crunch: IndexMap::new(),
        }
    }

    pub fn register_search<F>(&mut self, type_name: &str, constructor: F) -> &mut Self
    where
        F: Fn(&PluginContext<'_>) -> Result<Box<dyn SearchPlugin>, RegistryError> + Send + Sync + 'static,
    {
        self.search.insert(type_name.to_string(), Arc::new(constructor));
        self
    }

    pub fn register_api<F>(&mut self, type_name: &str, constructor: F) -> &mut Self
    where
        F: Fn(&PluginContext<'_>) -> Result<Box<dyn ApiPlugin>, RegistryError> + Send + Sync + 'static,
    {
        self.api.insert(type_name.to_string(), Arc::new(constructor));
        self
    }

    pub fn register_download<F>(&mut self, type_name: &str, constructor: F) -> &mut Self
    where
        F: Fn(&PluginContext<'_>) -> Result<Box<dyn DownloadPlugin>, RegistryError> + Send + Sync + 'static,
    {
        self.download.insert(type_name.to_string(), Arc::new(constructor));
        self
    }

    pub fn register_auth<F>(&mut self, type_name: &str, constructor: F) -> &mut Self
    where
        F: Fn(&PluginContext<'_>) -> Result<Box<dyn AuthPlugin>, RegistryError> + Send + Sync + 'static,
    {
        self.auth.insert(type_name.to_string(), Arc::new(constructor));
        self
    }

    pub fn register_crunch<F>(&mut self, name: &str, constructor: F) -> &mut Self
    where
        F: Fn(&CrunchOptions) -> Result<Box<dyn CrunchPlugin>, RegistryError> + Send + Sync + 'static,
    {
        self.crunch.insert(name.to_string(), Arc::new(constructor));
        self
    }

    pub fn crunch_names(&self) -> impl Iterator<Item = &str> {
        self.crunch.keys().map(String::as_str)
    }

    fn lookup<'c, T>(table: &'c IndexMap<String, T>, context: &PluginContext<'_>, kind: PluginKind) -> Result<&'c T, RegistryError> {
        table.get(&context.config.type_name).ok_or_else(|| RegistryError::UnknownPluginType {
            provider: context.provider.name.clone(),
            kind,
            type_name: context.config.type_name.clone(),
        })
    }

    pub(crate) fn build_search(&self, context: &PluginContext<'_>) -> Result<Box<dyn SearchPlugin>, RegistryError> {
        Self::lookup(&self.search, context, PluginKind::Search)?(context)
    }

    pub(crate) fn build_api(&self, context: &PluginContext<'_>) -> Result<Box<dyn ApiPlugin>, RegistryError> {
        Self::lookup(&self.api, context, PluginKind::Api)?(context)
    }

    pub(crate) fn build_download(&self, context: &PluginContext<'_>) -> Result<Box<dyn DownloadPlugin>, RegistryError> {
        Self::lookup(&self.download, context, PluginKind::Download)?(context)
    }

    pub(crate) fn build_auth(&self, context: &PluginContext<'_>, kind: PluginKind) -> Result<Box<dyn AuthPlugin>, RegistryError> {
        Self::lookup(&self.auth, context, kind)?(context)
    }

    pub(crate) fn build_crunch(&self, name: &str, options: &CrunchOptions) -> Result<Box<dyn CrunchPlugin>, RegistryError> {
        let constructor = self.crunch.get(name).ok_or_else(|| RegistryError::UnknownCruncher(name.to_string()))?;
        constructor(options)
    }
}
