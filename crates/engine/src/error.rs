use eogate_registry::{ProviderError, RegistryError};
use thiserror::Error;

/// Errors surfaced by the search orchestrator.
///
/// Only [`SearchError::Provider`] is recoverable: it is logged and the next
/// provider tried unless strict mode was requested. Everything else points at
/// a broken setup and always reaches the caller.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("plugin of provider {provider} broke its contract: {message}")]
    PluginContractViolation { provider: String, message: String },
    #[error("no product type matches {keywords}")]
    NoMatchingProductType { keywords: String },
    #[error("provider {provider} failed: {source}")]
    Provider {
        provider: String,
        #[source]
        source: ProviderError,
    },
}

impl SearchError {
    pub(crate) fn provider(provider: &str, source: ProviderError) -> Self {
        SearchError::Provider {
            provider: provider.to_string(),
            source,
        }
    }

    /// Whether the error is a provider outage rather than a setup problem.
    pub fn is_provider_error(&self) -> bool {
        matches!(self, SearchError::Provider { .. })
    }
}
