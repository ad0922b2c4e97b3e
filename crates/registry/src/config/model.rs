//! Typed provider configuration.

use std::path::PathBuf;

use eogate_mapping::{DiscoveryConfig, MetadataMapping, ResultFormat};
use eogate_types::CanonicalProperties;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Everything eogate knows about one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    /// Higher values are tried first. Several providers may share a value.
    #[serde(default)]
    pub priority: i64,
    /// Providers sharing a group can be selected together by that name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Product types offered, keyed by eogate product type.
    #[serde(default)]
    pub products: IndexMap<String, ProductTypeConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<PluginConfig>,
    /// A plugin that both searches and downloads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api: Option<PluginConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download: Option<PluginConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<PluginConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_auth: Option<PluginConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_auth: Option<PluginConfig>,
}

impl ProviderConfig {
    /// Whether the provider offers `product_type`.
    pub fn supports(&self, product_type: &str) -> bool {
        self.products.contains_key(product_type)
    }

    /// Whether `selector` is this provider's name or group.
    pub fn matches(&self, selector: &str) -> bool {
        self.name == selector || self.group.as_deref() == Some(selector)
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.api.is_some() && (self.search.is_some() || self.download.is_some()) {
            return Err("an `api` plugin cannot be combined with `search` or `download`".to_string());
        }
        Ok(())
    }
}

/// Per product type parameters of a provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductTypeConfig {
    /// The provider's own name for the product type.
    #[serde(default, rename = "productType", skip_serializing_if = "Option::is_none")]
    pub product_type: Option<String>,
    /// Entries replacing the plugin-level mapping for this product type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_mapping: Option<MetadataMapping>,
    /// Default search parameters, keyed by canonical name.
    #[serde(flatten)]
    pub parameters: IndexMap<String, Value>,
}

impl ProductTypeConfig {
    /// Search defaults for this product type, `productType` included.
    pub fn default_filters(&self) -> CanonicalProperties {
        let mut filters: CanonicalProperties = self.parameters.clone();
        if let Some(product_type) = &self.product_type {
            filters.insert("productType".to_string(), Value::String(product_type.clone()));
        }
        filters
    }
}

/// Paging settings of a search plugin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationConfig {
    /// Template with `{url}`, `{search}`, `{items_per_page}`, `{page}`,
    /// `{skip}` and `{skip_base_1}` fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_url_tpl: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_items_per_page: Option<u32>,
    /// Path of the next page URL in a response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_url_key_path: Option<String>,
    /// Path of the total number of results in a response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_items_nb_key_path: Option<String>,
}

/// Settings of one plugin slot (`search`, `download`, `auth`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginConfig {
    /// Name the plugin type is registered under in the catalog.
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_endpoint: Option<String>,
    #[serde(default)]
    pub pagination: PaginationConfig,
    /// Where the result list sits in a search response. Defaults to `features`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results_entry: Option<String>,
    #[serde(default)]
    pub result_type: ResultFormat,
    #[serde(default)]
    pub metadata_mapping: MetadataMapping,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discover_metadata: Option<DiscoveryConfig>,
    #[serde(default)]
    pub credentials: IndexMap<String, Value>,
    /// Header templates, formatted against `credentials`.
    #[serde(default)]
    pub headers: IndexMap<String, String>,
    /// Plugins sharing this value can reuse each other's authentication.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matching_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
    /// Settings specific to a plugin type.
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl PluginConfig {
    /// The mapping table to use for `product`: the plugin-level table with
    /// the product type's entries applied on top.
    pub fn metadata_mapping_for(&self, product: Option<&ProductTypeConfig>) -> MetadataMapping {
        let mut mapping = self.metadata_mapping.clone();
        if let Some(overrides) = product.and_then(|product| product.metadata_mapping.as_ref()) {
            for (key, entry) in overrides {
                mapping.insert(key.clone(), entry.clone());
            }
        }
        mapping
    }

    /// Reads a string setting from `extra`.
    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(Value::as_str)
    }
}
