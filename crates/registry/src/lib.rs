//! Provider configuration and plugin management for eogate.
//!
//! [`ProvidersConfig`] assembles provider definitions from the embedded
//! defaults, the user file and the environment. [`PluginRegistry`] turns those
//! definitions into plugin instances on demand: search plugins in priority
//! order, authentication and download plugins per provider, and crunch
//! plugins by name. Plugin types are looked up in a [`PluginCatalog`], which
//! callers can extend with their own implementations.

pub mod catalog;
pub mod config;
pub mod crunch;
pub mod error;
pub mod plugins;
pub mod registry;

pub use catalog::{PluginCatalog, PluginContext};
pub use config::{LoadOptions, PaginationConfig, PluginConfig, ProductTypeConfig, ProviderConfig, ProvidersConfig};
pub use crunch::CrunchOptions;
pub use error::{ConfigError, PluginKind, ProviderError, RegistryError};
pub use plugins::{
    ApiPlugin, AuthHandle, AuthPlugin, AuthPluginHandle, CrunchPlugin, DownloadPlugin, DownloadPluginHandle, QueryOutcome, QueryRequest,
    SearchPlugin, SearchPluginHandle,
};
pub use registry::{PluginRegistry, SearchPlugins};
