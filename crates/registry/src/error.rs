use std::{fmt, path::PathBuf};

use eogate_mapping::MappingError;
use eogate_util::HttpError;
use thiserror::Error;

/// The configuration slot a plugin instance is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginKind {
    Search,
    Api,
    Download,
    Auth,
    SearchAuth,
    DownloadAuth,
}

impl fmt::Display for PluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PluginKind::Search => "search",
            PluginKind::Api => "api",
            PluginKind::Download => "download",
            PluginKind::Auth => "auth",
            PluginKind::SearchAuth => "search_auth",
            PluginKind::DownloadAuth => "download_auth",
        };
        f.write_str(name)
    }
}

/// Errors raised while loading provider configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read provider configuration {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid provider configuration in {origin}: {source}")]
    Yaml {
        origin: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("provider {provider}: {message}")]
    Invalid { provider: String, message: String },
}

/// Errors raised while selecting or building plugins.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("unsupported provider: {0}")]
    UnsupportedProvider(String),
    #[error("no provider supports product type {0}")]
    UnsupportedProductType(String),
    #[error("unknown crunch plugin: {0}")]
    UnknownCruncher(String),
    #[error("unknown {kind} plugin type '{type_name}' for provider {provider}")]
    UnknownPluginType {
        provider: String,
        kind: PluginKind,
        type_name: String,
    },
    #[error("{subject} is misconfigured: {message}")]
    Misconfigured { subject: String, message: String },
    #[error(transparent)]
    Mapping(#[from] MappingError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl RegistryError {
    pub(crate) fn misconfigured(subject: impl Into<String>, message: impl Into<String>) -> Self {
        RegistryError::Misconfigured {
            subject: subject.into(),
            message: message.into(),
        }
    }
}

/// Failures raised by plugins while talking to a provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error(transparent)]
    Http(#[from] HttpError),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("unexpected provider response: {0}")]
    Response(String),
    #[error(transparent)]
    Mapping(#[from] MappingError),
    #[error("download failed: {0}")]
    Download(String),
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Escape hatch for plugins registered by callers.
    #[error(transparent)]
    Plugin(#[from] anyhow::Error),
}
