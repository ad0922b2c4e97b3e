//! Credential based authentication plugins.

use eogate_mapping::{MappingError, format_metadata, value_to_text};
use tracing::debug;

use super::{AuthHandle, AuthPlugin};
use crate::{
    catalog::PluginContext,
    config::PluginConfig,
    error::{ProviderError, RegistryError},
};

/// HTTP basic authentication with `username` and `password` credentials.
#[derive(Debug, Clone)]
pub struct GenericAuth {
    provider: String,
    config: PluginConfig,
}

impl GenericAuth {
    pub fn new(context: &PluginContext<'_>) -> Result<Self, RegistryError> {
        let method = context.config.extra_str("method").unwrap_or("basic");
        if method != "basic" {
            return Err(RegistryError::misconfigured(
                format!("auth plugin of {}", context.provider.name),
                format!("unsupported authentication method '{method}'"),
            ));
        }
        Ok(Self {
            provider: context.provider.name.clone(),
            config: context.config.clone(),
        })
    }

    fn credential(&self, key: &str) -> Result<String, ProviderError> {
        self.config
            .credentials
            .get(key)
            .filter(|value| !value.is_null())
            .map(value_to_text)
            .ok_or_else(|| ProviderError::Auth(format!("missing credential '{key}' for provider {}", self.provider)))
    }
}

impl AuthPlugin for GenericAuth {
    fn authenticate(&mut self) -> Result<AuthHandle, ProviderError> {
        let username = self.credential("username")?;
        let password = self.credential("password")?;
        debug!(provider = %self.provider, "using basic authentication");
        Ok(AuthHandle {
            basic: Some((username, password)),
            ..AuthHandle::default()
        })
    }
}

/// Custom headers whose values are templates over the credentials, e.g.
/// `Authorization: 'Bearer {token}'`.
#[derive(Debug, Clone)]
pub struct HttpHeaderAuth {
    provider: String,
    config: PluginConfig,
    resolved: Option<AuthHandle>,
}

impl HttpHeaderAuth {
    pub fn new(context: &PluginContext<'_>) -> Result<Self, RegistryError> {
        if context.config.headers.is_empty() {
            return Err(RegistryError::misconfigured(
                format!("auth plugin of {}", context.provider.name),
                "HttpHeaderAuth needs at least one header",
            ));
        }
        Ok(Self {
            provider: context.provider.name.clone(),
            config: context.config.clone(),
            resolved: None,
        })
    }
}

impl AuthPlugin for HttpHeaderAuth {
    fn authenticate(&mut self) -> Result<AuthHandle, ProviderError> {
        if let Some(handle) = &self.resolved {
            return Ok(handle.clone());
        }
        let mut headers = Vec::with_capacity(self.config.headers.len());
        for (name, template) in &self.config.headers {
            let value = format_metadata(template, &self.config.credentials).map_err(|error| match error {
                MappingError::MissingField { field } => {
                    ProviderError::Auth(format!("missing credential '{field}' for provider {}", self.provider))
                }
                other => ProviderError::Mapping(other),
            })?;
            headers.push((name.clone(), value));
        }
        let handle = AuthHandle {
            headers,
            ..AuthHandle::default()
        };
        self.resolved = Some(handle.clone());
        Ok(handle)
    }
}
