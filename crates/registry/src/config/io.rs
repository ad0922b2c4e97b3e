//! Reading the configuration layers: embedded defaults, user file and
//! environment overrides.

use std::{env, path::PathBuf};

use dirs_next::config_dir;
use eogate_util::expand_tilde;
use serde::Deserialize;
use serde_yaml::{Mapping, Value as YamlValue};
use tracing::debug;

use crate::error::ConfigError;

/// Environment variable naming the user configuration file.
pub const CFG_FILE_ENV: &str = "EOGATE_CFG_FILE";
/// Prefix of per-provider override variables, e.g. `EOGATE__PEPS__PRIORITY`.
pub const ENV_PREFIX: &str = "EOGATE__";
/// Comma separated list of the only providers to load.
pub const WHITELIST_ENV: &str = "EOGATE_PROVIDERS_WHITELIST";

/// Providers shipped with eogate, one YAML document per provider.
pub(crate) const DEFAULT_PROVIDERS: &str = include_str!("../../resources/providers.yml");

/// Get the default path for the user configuration file.
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = env::var(CFG_FILE_ENV)
        && !path.trim().is_empty()
    {
        return expand_tilde(&path);
    }

    config_dir().unwrap_or_else(|| PathBuf::from(".")).join("eogate").join("eogate.yml")
}

/// Parses a stream of YAML documents, each describing one provider.
pub(crate) fn parse_provider_documents(text: &str, origin: &str) -> Result<Vec<(String, YamlValue)>, ConfigError> {
    let mut providers = Vec::new();
    for document in serde_yaml::Deserializer::from_str(text) {
        let value = YamlValue::deserialize(document).map_err(|source| ConfigError::Yaml {
            origin: origin.to_string(),
            source,
        })?;
        if value.is_null() {
            continue;
        }
        let name = value
            .get("name")
            .and_then(YamlValue::as_str)
            .ok_or_else(|| ConfigError::Invalid {
                provider: "<unnamed>".to_string(),
                message: format!("provider document in {origin} has no name"),
            })?
            .to_string();
        providers.push((name, value));
    }
    Ok(providers)
}

/// Reads the user file: a mapping from provider name to overrides.
///
/// A missing file is only an error when `required` is set.
pub(crate) fn read_user_file(path: &PathBuf, required: bool) -> Result<Option<Mapping>, ConfigError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(error) if !required && error.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no user configuration file");
            return Ok(None);
        }
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.clone(),
                source,
            });
        }
    };
    let origin = path.display().to_string();
    let value: YamlValue = serde_yaml::from_str(&text).map_err(|source| ConfigError::Yaml { origin, source })?;
    match value {
        YamlValue::Null => Ok(None),
        YamlValue::Mapping(mapping) => Ok(Some(mapping)),
        _ => Err(ConfigError::Invalid {
            provider: "<user file>".to_string(),
            message: format!("{} must be a mapping of provider names", path.display()),
        }),
    }
}

/// One `EOGATE__<PROVIDER>__<KEY>...` override, split into lowercase segments.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct EnvOverride {
    pub provider: String,
    pub path: Vec<String>,
    pub value: YamlValue,
}

/// Collects overrides from environment variables.
///
/// Values are parsed as YAML scalars so `EOGATE__PEPS__PRIORITY=3` sets a
/// number. Variables without a key after the provider are ignored.
pub(crate) fn env_overrides<I>(vars: I) -> Vec<EnvOverride>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut overrides = Vec::new();
    for (name, raw) in vars {
        let Some(rest) = name.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        let mut segments = rest.split("__").filter(|segment| !segment.is_empty()).map(str::to_lowercase);
        let Some(provider) = segments.next() else { continue };
        let path: Vec<String> = segments.collect();
        if path.is_empty() {
            debug!(variable = %name, "ignoring override without a key");
            continue;
        }
        overrides.push(EnvOverride {
            provider,
            path,
            value: parse_scalar(&raw),
        });
    }
    overrides
}

fn parse_scalar(raw: &str) -> YamlValue {
    match serde_yaml::from_str::<YamlValue>(raw) {
        Ok(value @ (YamlValue::Bool(_) | YamlValue::Number(_) | YamlValue::String(_))) => value,
        _ => YamlValue::String(raw.to_string()),
    }
}

/// Parses a comma separated whitelist, ignoring blanks.
pub(crate) fn parse_whitelist(raw: &str) -> Vec<String> {
    raw.split(',').map(str::trim).filter(|name| !name.is_empty()).map(str::to_string).collect()
}

/// Recursively merges `overlay` into `base`. Mappings merge key by key,
/// anything else is replaced.
pub(crate) fn merge_yaml(base: &mut YamlValue, overlay: YamlValue) {
    match (base, overlay) {
        (YamlValue::Mapping(base), YamlValue::Mapping(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_yaml(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Sets `value` at `path` inside `target`, creating mappings on the way.
pub(crate) fn set_path(target: &mut YamlValue, path: &[String], value: YamlValue) {
    let Some((first, rest)) = path.split_first() else {
        *target = value;
        return;
    };
    if !target.is_mapping() {
        *target = YamlValue::Mapping(Mapping::new());
    }
    if let YamlValue::Mapping(mapping) = target {
        let key = YamlValue::String(first.clone());
        let child = mapping.entry(key).or_insert(YamlValue::Null);
        set_path(child, rest, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(text: &str) -> YamlValue {
        serde_yaml::from_str(text).expect("yaml")
    }

    #[test]
    fn splits_multi_document_defaults() {
        let providers = parse_provider_documents("name: a\npriority: 1\n---\nname: b\n", "test").expect("parse");
        let names: Vec<_> = providers.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
        assert!(parse_provider_documents("priority: 1\n", "test").is_err());
    }

    #[test]
    fn embedded_defaults_parse() {
        let providers = parse_provider_documents(DEFAULT_PROVIDERS, "defaults").expect("parse defaults");
        assert!(!providers.is_empty());
    }

    #[test]
    fn parses_env_overrides() {
        let overrides = env_overrides(vec![
            ("EOGATE__PEPS__PRIORITY".to_string(), "3".to_string()),
            ("EOGATE__PEPS__AUTH__CREDENTIALS__USERNAME".to_string(), "alice".to_string()),
            ("EOGATE__PEPS".to_string(), "ignored".to_string()),
            ("EOGATE_CFG_FILE".to_string(), "/tmp/x.yml".to_string()),
            ("EOGATE__USGS__SEARCH__COUNT".to_string(), "false".to_string()),
        ]);
        assert_eq!(overrides.len(), 3);
        assert_eq!(overrides[0].provider, "peps");
        assert_eq!(overrides[0].path, ["priority"]);
        assert_eq!(overrides[0].value, yaml("3"));
        assert_eq!(overrides[1].path, ["auth", "credentials", "username"]);
        assert_eq!(overrides[1].value, YamlValue::String("alice".into()));
        assert_eq!(overrides[2].value, YamlValue::Bool(false));
    }

    #[test]
    fn non_scalar_env_values_stay_strings() {
        assert_eq!(parse_scalar("[a, b]"), YamlValue::String("[a, b]".into()));
        assert_eq!(parse_scalar("key: value"), YamlValue::String("key: value".into()));
    }

    #[test]
    fn merges_recursively_with_last_writer_winning() {
        let mut base = yaml("name: peps\npriority: 1\nsearch:\n  type: QueryStringSearch\n  api_endpoint: https://a\n");
        merge_yaml(&mut base, yaml("priority: 4\nsearch:\n  api_endpoint: https://b\n"));
        assert_eq!(base, yaml("name: peps\npriority: 4\nsearch:\n  type: QueryStringSearch\n  api_endpoint: https://b\n"));
    }

    #[test]
    fn set_path_creates_intermediate_mappings() {
        let mut base = yaml("name: peps\n");
        set_path(&mut base, &["auth".to_string(), "credentials".to_string(), "apikey".to_string()], YamlValue::String("k".into()));
        assert_eq!(base, yaml("name: peps\nauth:\n  credentials:\n    apikey: k\n"));
    }

    #[test]
    fn whitelist_ignores_blanks() {
        assert_eq!(parse_whitelist(" peps, ,usgs,"), ["peps", "usgs"]);
    }

    #[test]
    fn missing_optional_user_file_is_ignored() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("absent.yml");
        assert!(read_user_file(&path, false).expect("optional").is_none());
        assert!(read_user_file(&path, true).is_err());
    }
}
