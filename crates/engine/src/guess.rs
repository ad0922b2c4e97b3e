//! Product type guessing from free-form search keywords.

use eogate_registry::ConfigError;
use indexmap::IndexMap;
use serde::Deserialize;
use tracing::debug;

use crate::error::SearchError;

/// Filters the guesser looks at, in the order they are reported.
pub const GUESSABLE_KEYS: &[&str] = &["instrument", "platform", "platformSerialIdentifier", "processingLevel", "sensorType"];

const EMBEDDED_PRODUCT_TYPES: &str = include_str!("../resources/product_types.yml");

/// Maps search keywords to candidate product types.
pub trait ProductTypeGuesser: Send + Sync {
    /// Returns matching product types, best match first, or
    /// [`SearchError::NoMatchingProductType`] when nothing matches.
    fn guess(&self, keywords: &IndexMap<String, String>) -> Result<Vec<String>, SearchError>;
}

/// Descriptive attributes of a product type.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProductTypeDescription {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub platform_serial_identifier: Option<String>,
    #[serde(default)]
    pub instrument: Option<String>,
    #[serde(default)]
    pub processing_level: Option<String>,
    #[serde(default)]
    pub sensor_type: Option<String>,
}

impl ProductTypeDescription {
    fn attribute(&self, key: &str) -> Option<&str> {
        match key {
            "platform" => self.platform.as_deref(),
            "platformSerialIdentifier" => self.platform_serial_identifier.as_deref(),
            "instrument" => self.instrument.as_deref(),
            "processingLevel" => self.processing_level.as_deref(),
            "sensorType" => self.sensor_type.as_deref(),
            _ => None,
        }
    }

    /// Every keyword must equal one of the comma-separated attribute values,
    /// ignoring case.
    fn matches(&self, keywords: &IndexMap<String, String>) -> bool {
        keywords.iter().all(|(key, wanted)| {
            self.attribute(key)
                .is_some_and(|values| values.split(',').any(|value| value.trim().eq_ignore_ascii_case(wanted.trim())))
        })
    }
}

/// Guesser backed by a catalog of product type descriptions.
#[derive(Debug, Clone, Default)]
pub struct CatalogGuesser {
    product_types: IndexMap<String, ProductTypeDescription>,
}

impl CatalogGuesser {
    /// Guesser over the built-in product type catalog.
    pub fn embedded() -> Result<Self, ConfigError> {
        Self::from_yaml_str(EMBEDDED_PRODUCT_TYPES, "embedded product types")
    }

    /// Parses a mapping of product type ids to descriptions. `origin` names
    /// the source in errors.
    pub fn from_yaml_str(yaml: &str, origin: &str) -> Result<Self, ConfigError> {
        let product_types = serde_yaml::from_str(yaml).map_err(|source| ConfigError::Yaml {
            origin: origin.to_string(),
            source,
        })?;
        Ok(Self { product_types })
    }

    pub fn insert(&mut self, product_type: impl Into<String>, description: ProductTypeDescription) {
        self.product_types.insert(product_type.into(), description);
    }

    pub fn product_types(&self) -> impl Iterator<Item = (&str, &ProductTypeDescription)> {
        self.product_types.iter().map(|(name, description)| (name.as_str(), description))
    }
}

impl ProductTypeGuesser for CatalogGuesser {
    fn guess(&self, keywords: &IndexMap<String, String>) -> Result<Vec<String>, SearchError> {
        let guesses: Vec<String> = self
            .product_types
            .iter()
            .filter(|(_, description)| description.matches(keywords))
            .map(|(name, _)| name.clone())
            .collect();
        debug!(keywords = ?keywords, guesses = ?guesses, "product type guessed");
        if guesses.is_empty() {
            let keywords = keywords.iter().map(|(key, value)| format!("{key}={value}")).collect::<Vec<_>>().join(", ");
            return Err(SearchError::NoMatchingProductType { keywords });
        }
        Ok(guesses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keywords(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs.iter().map(|(key, value)| (key.to_string(), value.to_string())).collect()
    }

    #[test]
    fn embedded_catalog_parses() {
        let guesser = CatalogGuesser::embedded().expect("embedded catalog");
        assert!(guesser.product_types().any(|(name, _)| name == "S2_MSI_L1C"));
    }

    #[test]
    fn all_keywords_must_match() {
        let guesser = CatalogGuesser::embedded().expect("embedded catalog");
        let guesses = guesser
            .guess(&keywords(&[("platform", "sentinel2"), ("processingLevel", "L1")]))
            .expect("guess");
        assert_eq!(guesses, vec!["S2_MSI_L1C".to_string()]);
    }

    #[test]
    fn comma_separated_values_are_alternatives() {
        let guesser = CatalogGuesser::embedded().expect("embedded catalog");
        let guesses = guesser.guess(&keywords(&[("instrument", "TIRS")])).expect("guess");
        assert_eq!(guesses, vec!["L8_OLI_TIRS_C1L1".to_string()]);
    }

    #[test]
    fn no_match_is_an_error() {
        let guesser = CatalogGuesser::embedded().expect("embedded catalog");
        let error = guesser.guess(&keywords(&[("platform", "SPOT")])).expect_err("nothing matches");
        assert!(matches!(error, SearchError::NoMatchingProductType { ref keywords } if keywords == "platform=SPOT"));
    }
}
