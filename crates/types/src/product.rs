use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::metadata::CanonicalProperties;

/// A normalized Earth-Observation product returned by a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EoProduct {
    /// Name of the provider the product was found on.
    pub provider: String,
    /// Product type the search was run for, if any.
    #[serde(default)]
    pub product_type: Option<String>,
    /// Canonical metadata extracted through the provider's mapping.
    pub properties: CanonicalProperties,
}

impl EoProduct {
    pub fn new(provider: impl Into<String>, product_type: Option<String>, properties: CanonicalProperties) -> Self {
        Self {
            provider: provider.into(),
            product_type,
            properties,
        }
    }

    /// Product identifier as a string, if the `id` property is a scalar.
    pub fn id(&self) -> Option<String> {
        self.properties.get("id").and_then(scalar_to_string)
    }

    /// Product title, falling back to the identifier.
    pub fn title(&self) -> Option<String> {
        self.properties.get("title").and_then(scalar_to_string).or_else(|| self.id())
    }

    /// Returns the property as a string slice when it holds a string.
    pub fn property_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(Value::as_str)
    }

    /// Identity used to detect providers that ignore pagination parameters.
    pub fn identity(&self) -> (Option<String>, &str) {
        (self.id(), self.provider.as_str())
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn id_accepts_numeric_identifiers() {
        let mut properties = CanonicalProperties::new();
        properties.insert("id".into(), json!(42));
        let product = EoProduct::new("peps", None, properties);
        assert_eq!(product.id().as_deref(), Some("42"));
        assert_eq!(product.title().as_deref(), Some("42"));
    }

    #[test]
    fn identity_pairs_id_with_provider() {
        let mut properties = CanonicalProperties::new();
        properties.insert("id".into(), json!("S2A_1"));
        let product = EoProduct::new("theia", Some("S2_MSI_L1C".into()), properties);
        assert_eq!(product.identity(), (Some("S2A_1".to_string()), "theia"));
    }

    #[test]
    fn deserializes_from_yaml_fixture() {
        let yaml = "provider: peps\nproduct_type: S1_SAR_GRD\nproperties:\n  id: abc\n  cloudCover: 12\n";
        let product: EoProduct = serde_yaml::from_str(yaml).expect("parse product");
        assert_eq!(product.property_str("id"), Some("abc"));
        assert_eq!(product.properties.get("cloudCover"), Some(&Value::from(12)));
    }
}
