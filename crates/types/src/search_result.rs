use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::product::EoProduct;

/// Search criteria keyed by canonical metadata names.
pub type Filters = IndexMap<String, Value>;

/// Ordered products returned by one search call plus a best-effort total.
///
/// `number_matched` is `None` when counting was not requested or a provider
/// did not report anything usable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub products: Vec<EoProduct>,
    pub number_matched: Option<u64>,
}

impl SearchResult {
    pub fn new(products: Vec<EoProduct>, number_matched: Option<u64>) -> Self {
        Self { products, number_matched }
    }

    /// Empty result reported as zero matches, used when every provider failed.
    pub fn empty() -> Self {
        Self {
            products: Vec::new(),
            number_matched: Some(0),
        }
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// Appends the products of another page, keeping the highest known total.
    pub fn extend(&mut self, other: SearchResult) {
        self.products.extend(other.products);
        self.number_matched = match (self.number_matched, other.number_matched) {
            (Some(current), Some(next)) => Some(current.max(next)),
            (current, next) => current.or(next),
        };
    }

    /// Applies a product filter, keeping the reported total untouched.
    pub fn filter_with<F>(self, filter: F) -> Self
    where
        F: FnOnce(Vec<EoProduct>) -> Vec<EoProduct>,
    {
        Self {
            products: filter(self.products),
            number_matched: self.number_matched,
        }
    }

    /// Values of a single property across products, in result order.
    pub fn property_values<'a>(&'a self, key: &'a str) -> impl Iterator<Item = Option<&'a Value>> + 'a {
        self.products.iter().map(move |product| product.properties.get(key))
    }
}

impl IntoIterator for SearchResult {
    type Item = EoProduct;
    type IntoIter = std::vec::IntoIter<EoProduct>;

    fn into_iter(self) -> Self::IntoIter {
        self.products.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::CanonicalProperties;

    fn product(id: &str) -> EoProduct {
        let mut properties = CanonicalProperties::new();
        properties.insert("id".into(), json!(id));
        EoProduct::new("peps", None, properties)
    }

    #[test]
    fn extend_keeps_highest_total() {
        let mut first = SearchResult::new(vec![product("a")], Some(10));
        first.extend(SearchResult::new(vec![product("b")], Some(4)));
        assert_eq!(first.len(), 2);
        assert_eq!(first.number_matched, Some(10));

        let mut unknown = SearchResult::new(vec![], None);
        unknown.extend(SearchResult::new(vec![product("c")], Some(3)));
        assert_eq!(unknown.number_matched, Some(3));
    }

    #[test]
    fn filter_with_preserves_total() {
        let result = SearchResult::new(vec![product("a"), product("b")], Some(2));
        let filtered = result.filter_with(|products| products.into_iter().filter(|p| p.id().as_deref() == Some("b")).collect());
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered.number_matched, Some(2));
    }
}
