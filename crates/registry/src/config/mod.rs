//! Provider configuration cascade.
//!
//! Providers are assembled from three layers, last writer winning at leaf
//! level: the definitions embedded in the crate, the user YAML file and
//! `EOGATE__<PROVIDER>__<KEY>` environment variables. The result is
//! optionally restricted by `EOGATE_PROVIDERS_WHITELIST`.

mod io;
mod model;

use std::{env, path::PathBuf};

use indexmap::IndexMap;
use serde_yaml::Value as YamlValue;
use tracing::{debug, info, warn};

pub use io::{CFG_FILE_ENV, ENV_PREFIX, WHITELIST_ENV, default_config_path};
pub(crate) use io::merge_yaml;
pub use model::{PaginationConfig, PluginConfig, ProductTypeConfig, ProviderConfig};

use crate::error::ConfigError;

/// Where [`ProvidersConfig::load`] reads its layers from.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Replaces the embedded provider definitions.
    pub defaults_yaml: Option<String>,
    /// User file to read. Must exist when set. When unset and the environment
    /// is used, `EOGATE_CFG_FILE` or the platform config path is tried.
    pub user_config_path: Option<PathBuf>,
    /// Apply `EOGATE__*` overrides and the providers whitelist.
    pub use_environment: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            defaults_yaml: None,
            user_config_path: None,
            use_environment: true,
        }
    }
}

impl LoadOptions {
    /// Embedded defaults only, no user file and no environment.
    pub fn defaults_only() -> Self {
        Self {
            use_environment: false,
            ..Self::default()
        }
    }
}

/// The merged, validated set of providers, in definition order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProvidersConfig {
    providers: IndexMap<String, ProviderConfig>,
}

impl ProvidersConfig {
    /// Runs the configuration cascade.
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let defaults = options.defaults_yaml.as_deref().unwrap_or(io::DEFAULT_PROVIDERS);
        let mut raw: IndexMap<String, YamlValue> = io::parse_provider_documents(defaults, "provider defaults")?.into_iter().collect();

        let user_file = match (&options.user_config_path, options.use_environment) {
            (Some(path), _) => io::read_user_file(path, true)?,
            (None, true) => io::read_user_file(&default_config_path(), false)?,
            (None, false) => None,
        };
        if let Some(user_file) = user_file {
            for (name, overlay) in user_file {
                let Some(name) = name.as_str().map(str::to_string) else {
                    warn!(key = ?name, "ignoring non-string provider key in user configuration");
                    continue;
                };
                apply_overlay(&mut raw, name, overlay);
            }
        }

        if options.use_environment {
            for env_override in io::env_overrides(env::vars()) {
                let Some(name) = raw.keys().find(|name| name.eq_ignore_ascii_case(&env_override.provider)).cloned() else {
                    debug!(provider = %env_override.provider, "ignoring override for unknown provider");
                    continue;
                };
                if let Some(target) = raw.get_mut(&name) {
                    io::set_path(target, &env_override.path, env_override.value);
                }
            }
        }

        let mut config = Self::from_raw(raw)?;
        if options.use_environment
            && let Ok(whitelist) = env::var(WHITELIST_ENV)
        {
            config.retain_whitelisted(&io::parse_whitelist(&whitelist));
        }
        Ok(config)
    }

    /// Builds a configuration from a multi-document YAML string alone.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        Self::from_raw(io::parse_provider_documents(text, "inline configuration")?.into_iter().collect())
    }

    fn from_raw(raw: IndexMap<String, YamlValue>) -> Result<Self, ConfigError> {
        let mut providers = IndexMap::with_capacity(raw.len());
        for (name, value) in raw {
            let provider: ProviderConfig = serde_yaml::from_value(value).map_err(|source| ConfigError::Yaml {
                origin: format!("provider {name}"),
                source,
            })?;
            provider.validate().map_err(|message| ConfigError::Invalid {
                provider: name.clone(),
                message,
            })?;
            if provider.products.is_empty() {
                info!(provider = %name, "skipping provider without products");
                continue;
            }
            providers.insert(name, provider);
        }
        Ok(Self { providers })
    }

    /// Keeps only the named providers. An empty list keeps everything.
    pub fn retain_whitelisted(&mut self, whitelist: &[String]) {
        if whitelist.is_empty() {
            return;
        }
        self.providers.retain(|name, _| whitelist.iter().any(|allowed| allowed == name));
        debug!(providers = ?self.providers.keys().collect::<Vec<_>>(), "applied providers whitelist");
    }

    pub fn get(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn into_providers(self) -> IndexMap<String, ProviderConfig> {
        self.providers
    }
}

fn apply_overlay(raw: &mut IndexMap<String, YamlValue>, name: String, mut overlay: YamlValue) {
    match raw.get_mut(&name) {
        Some(existing) => merge_yaml(existing, overlay),
        None => {
            // A provider only known to the user file.
            if let YamlValue::Mapping(mapping) = &mut overlay {
                mapping.insert(YamlValue::String("name".to_string()), YamlValue::String(name.clone()));
            }
            raw.insert(name, overlay);
        }
    }
}

impl FromIterator<ProviderConfig> for ProvidersConfig {
    fn from_iter<T: IntoIterator<Item = ProviderConfig>>(iter: T) -> Self {
        Self {
            providers: iter.into_iter().map(|provider| (provider.name.clone(), provider)).collect(),
        }
    }
}
