//! Built-in crunch plugins: post-filters applied to search results.

use std::{
    cmp::{Ordering, Reverse},
    collections::HashSet,
};

use chrono::{DateTime, Utc};
use eogate_mapping::geometry::Geometry;
use eogate_types::EoProduct;
use eogate_util::date_handling::parse_datetime_utc;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{error::RegistryError, plugins::CrunchPlugin};

/// Options of a crunch plugin, as given by the caller.
pub type CrunchOptions = IndexMap<String, Value>;

fn option_str<'a>(options: &'a CrunchOptions, key: &str) -> Option<&'a str> {
    options.get(key).and_then(Value::as_str).filter(|text| !text.trim().is_empty())
}

fn misconfigured(cruncher: &str, message: impl Into<String>) -> RegistryError {
    RegistryError::misconfigured(format!("crunch plugin {cruncher}"), message)
}

/// Keeps products whose acquisition falls within `start`/`end`.
///
/// A product is dropped when it starts before `start`, ends after `end`, or
/// starts after `end`. Missing product dates never exclude it.
#[derive(Debug, Clone)]
pub struct FilterDate {
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
}

impl FilterDate {
    pub fn new(options: &CrunchOptions) -> Result<Self, RegistryError> {
        let parse = |key: &str| {
            option_str(options, key)
                .map(|text| parse_datetime_utc(text).ok_or_else(|| misconfigured("FilterDate", format!("invalid {key} date '{text}'"))))
                .transpose()
        };
        Ok(Self {
            start: parse("start")?,
            end: parse("end")?,
        })
    }
}

impl CrunchPlugin for FilterDate {
    fn proceed(&self, products: Vec<EoProduct>) -> Vec<EoProduct> {
        if self.start.is_none() && self.end.is_none() {
            return products;
        }
        let date = |product: &EoProduct, key: &str| product.property_str(key).and_then(parse_datetime_utc);
        let filtered: Vec<EoProduct> = products
            .into_iter()
            .filter(|product| {
                let product_start = date(product, "startTimeFromAscendingNode");
                let product_end = date(product, "completionTimeFromAscendingNode");
                let starts_too_early = matches!((self.start, product_start), (Some(start), Some(at)) if at < start);
                let ends_too_late = matches!((self.end, product_end), (Some(end), Some(at)) if at > end);
                let starts_too_late = matches!((self.end, product_start), (Some(end), Some(at)) if at > end);
                !(starts_too_early || ends_too_late || starts_too_late)
            })
            .collect();
        info!(product_count = filtered.len(), "finished filtering products by date");
        filtered
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Lt,
    Le,
    Eq,
    Ne,
    Ge,
    Gt,
}

impl Operator {
    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "lt" => Operator::Lt,
            "le" => Operator::Le,
            "eq" => Operator::Eq,
            "ne" => Operator::Ne,
            "ge" => Operator::Ge,
            "gt" => Operator::Gt,
            _ => return None,
        })
    }

    fn holds(self, left: &Value, right: &Value) -> bool {
        let ordering = compare_values(left, right);
        match self {
            Operator::Eq => ordering == Some(Ordering::Equal),
            Operator::Ne => ordering != Some(Ordering::Equal),
            Operator::Lt => ordering == Some(Ordering::Less),
            Operator::Le => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
            Operator::Gt => ordering == Some(Ordering::Greater),
            Operator::Ge => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
        }
    }
}

/// Numbers (and numeric strings) compare numerically, strings
/// lexicographically. Other values are only ever equal or unordered.
fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    let as_number = |value: &Value| match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    if let (Some(left), Some(right)) = (as_number(left), as_number(right)) {
        return left.partial_cmp(&right);
    }
    match (left, right) {
        (Value::String(left), Value::String(right)) => Some(left.cmp(right)),
        _ if left == right => Some(Ordering::Equal),
        _ => None,
    }
}

/// Keeps products whose property satisfies `operator` against a value, e.g.
/// `{cloudCover: 10, operator: le}`. The operator defaults to `eq`.
#[derive(Debug, Clone)]
pub struct FilterProperty {
    key: String,
    value: Value,
    operator: Operator,
}

impl FilterProperty {
    pub fn new(options: &CrunchOptions) -> Result<Self, RegistryError> {
        let operator_name = option_str(options, "operator").unwrap_or("eq");
        let operator = Operator::parse(operator_name)
            .ok_or_else(|| misconfigured("FilterProperty", format!("unknown operator '{operator_name}', expected one of lt, le, eq, ne, ge, gt")))?;
        let mut properties = options.iter().filter(|(key, _)| key.as_str() != "operator");
        let (Some((key, value)), None) = (properties.next(), properties.next()) else {
            return Err(misconfigured("FilterProperty", "exactly one property is needed for filtering"));
        };
        Ok(Self {
            key: key.clone(),
            value: value.clone(),
            operator,
        })
    }
}

impl CrunchPlugin for FilterProperty {
    fn proceed(&self, products: Vec<EoProduct>) -> Vec<EoProduct> {
        debug!(property = %self.key, operator = ?self.operator, value = %self.value, "filtering products by property");
        if let Some(product) = products.iter().find(|product| !product.properties.contains_key(&self.key)) {
            warn!(property = %self.key, product = ?product.id(), "property missing from product, filtering disabled");
            return products;
        }
        let filtered: Vec<EoProduct> = products
            .into_iter()
            .filter(|product| self.operator.holds(&product.properties[&self.key], &self.value))
            .collect();
        info!(product_count = filtered.len(), "finished filtering products by property");
        filtered
    }
}

static NAME_PATTERN_CONSTRAINT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(\?P<tileid>\\d\{6\}\)").expect("valid constraint regex"));

/// Keeps the first product seen per tile, the tile being read from the
/// title with `name_pattern`. Results are expected newest first.
#[derive(Debug, Clone)]
pub struct FilterLatestByName {
    name_pattern: Regex,
}

impl FilterLatestByName {
    pub fn new(options: &CrunchOptions) -> Result<Self, RegistryError> {
        let pattern = option_str(options, "name_pattern").ok_or_else(|| misconfigured("FilterLatestByName", "missing name_pattern"))?;
        if !NAME_PATTERN_CONSTRAINT.is_match(pattern) {
            return Err(misconfigured(
                "FilterLatestByName",
                format!("name pattern should contain {}", r"(?P<tileid>\d{6})"),
            ));
        }
        let name_pattern = Regex::new(pattern).map_err(|error| misconfigured("FilterLatestByName", error.to_string()))?;
        Ok(Self { name_pattern })
    }
}

impl CrunchPlugin for FilterLatestByName {
    fn proceed(&self, products: Vec<EoProduct>) -> Vec<EoProduct> {
        let mut seen_tiles = HashSet::new();
        let mut filtered = Vec::new();
        for product in products {
            let title = product.title().unwrap_or_default();
            let Some(tile) = self.name_pattern.captures(&title).and_then(|captures| captures.name("tileid")) else {
                warn!(title = %title, pattern = %self.name_pattern, "product name does not match the expected pattern");
                continue;
            };
            if seen_tiles.insert(tile.as_str().to_string()) {
                debug!(tile = %tile.as_str(), "latest product found for tile");
                filtered.push(product);
            }
        }
        info!(product_count = filtered.len(), "finished filtering latest products by name");
        filtered
    }
}

/// Drops products whose id was already seen, keeping the first occurrence.
#[derive(Debug, Clone, Default)]
pub struct RemoveDoubles;

impl RemoveDoubles {
    pub fn new(_options: &CrunchOptions) -> Result<Self, RegistryError> {
        Ok(Self)
    }
}

impl CrunchPlugin for RemoveDoubles {
    fn proceed(&self, products: Vec<EoProduct>) -> Vec<EoProduct> {
        let mut seen = HashSet::new();
        products
            .into_iter()
            .filter(|product| product.id().is_none_or(|id| seen.insert(id)))
            .collect()
    }
}

/// Axis-aligned extent of a geometry. Overlap crunchers compare footprints
/// through their bounding boxes.
#[derive(Debug, Clone, Copy, PartialEq)]
struct BoundingBox {
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
}

impl BoundingBox {
    fn from_value(value: &Value) -> Result<Self, String> {
        let [min_x, min_y, max_x, max_y] = Geometry::from_value(value)?.bounds();
        if [min_x, min_y, max_x, max_y].iter().any(|coordinate| !coordinate.is_finite()) {
            return Err("geometry has no coordinates".to_string());
        }
        Ok(Self { min_x, min_y, max_x, max_y })
    }

    fn of_product(product: &EoProduct) -> Option<Self> {
        let geometry = product.properties.get("geometry")?;
        match Self::from_value(geometry) {
            Ok(bbox) => Some(bbox),
            Err(message) => {
                debug!(product = ?product.id(), error = %message, "product geometry unusable");
                None
            }
        }
    }

    fn area(&self) -> f64 {
        (self.max_x - self.min_x).max(0.0) * (self.max_y - self.min_y).max(0.0)
    }

    /// Common part of both boxes, touching edges included.
    fn intersection(&self, other: &Self) -> Option<Self> {
        let common = Self {
            min_x: self.min_x.max(other.min_x),
            min_y: self.min_y.max(other.min_y),
            max_x: self.max_x.min(other.max_x),
            max_y: self.max_y.min(other.max_y),
        };
        (common.min_x <= common.max_x && common.min_y <= common.max_y).then_some(common)
    }

    fn contains(&self, other: &Self) -> bool {
        self.min_x <= other.min_x && self.min_y <= other.min_y && self.max_x >= other.max_x && self.max_y >= other.max_y
    }

    /// Parts of `self` not covered by `other`, as up to four boxes.
    fn difference(&self, other: &Self) -> Vec<Self> {
        let Some(cut) = self.intersection(other).filter(|cut| cut.area() > 0.0) else {
            return vec![*self];
        };
        [
            Self { max_x: cut.min_x, ..*self },
            Self { min_x: cut.max_x, ..*self },
            Self {
                min_x: cut.min_x,
                max_x: cut.max_x,
                max_y: cut.min_y,
                ..*self
            },
            Self {
                min_x: cut.min_x,
                max_x: cut.max_x,
                min_y: cut.max_y,
                ..*self
            },
        ]
        .into_iter()
        .filter(|part| part.area() > 0.0)
        .collect()
    }
}

fn option_geometry(cruncher: &str, options: &CrunchOptions) -> Result<Option<BoundingBox>, RegistryError> {
    match options.get("geometry") {
        None | Some(Value::Null) => Ok(None),
        Some(value) => BoundingBox::from_value(value)
            .map(Some)
            .map_err(|message| misconfigured(cruncher, format!("invalid geometry: {message}"))),
    }
}

fn option_flag(cruncher: &str, options: &CrunchOptions, key: &str) -> Result<bool, RegistryError> {
    match options.get(key) {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(flag)) => Ok(*flag),
        Some(Value::String(text)) if text.eq_ignore_ascii_case("true") => Ok(true),
        Some(Value::String(text)) if text.eq_ignore_ascii_case("false") => Ok(false),
        Some(other) => Err(misconfigured(cruncher, format!("{key} must be a boolean, got {other}"))),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OverlapRule {
    MinimumOverlap,
    Contains,
    Within,
    Intersects,
}

/// Keeps products whose footprint overlaps the search `geometry`.
///
/// With `contains`, `within` or `intersects` (mutually exclusive) the
/// product footprint must contain, lie within or intersect the search
/// extent. Otherwise a product is kept when the search extent contains it or
/// when the overlap covers at least `minimum_overlap` percent of either the
/// search extent or the product footprint. Footprints are compared through
/// their bounding boxes. Without a geometry filtering is disabled.
#[derive(Debug, Clone)]
pub struct FilterOverlap {
    extent: Option<BoundingBox>,
    minimum_overlap: f64,
    rule: OverlapRule,
}

impl FilterOverlap {
    pub fn new(options: &CrunchOptions) -> Result<Self, RegistryError> {
        let minimum_overlap = match options.get("minimum_overlap") {
            None | Some(Value::Null) => 0.0,
            Some(Value::Number(number)) => number.as_f64().unwrap_or_default(),
            Some(Value::String(text)) => text
                .trim()
                .parse()
                .map_err(|_| misconfigured("FilterOverlap", format!("invalid minimum_overlap '{text}'")))?,
            Some(other) => return Err(misconfigured("FilterOverlap", format!("invalid minimum_overlap {other}"))),
        };
        let flags = [
            (OverlapRule::Contains, option_flag("FilterOverlap", options, "contains")?),
            (OverlapRule::Within, option_flag("FilterOverlap", options, "within")?),
            (OverlapRule::Intersects, option_flag("FilterOverlap", options, "intersects")?),
        ];
        let mut enabled = flags.iter().filter(|(_, enabled)| *enabled).map(|(rule, _)| *rule);
        let rule = match (enabled.next(), enabled.next()) {
            (None, _) => OverlapRule::MinimumOverlap,
            (Some(rule), None) => rule,
            (Some(_), Some(_)) => {
                return Err(misconfigured("FilterOverlap", "contains, intersects and within are mutually exclusive"));
            }
        };
        if rule != OverlapRule::MinimumOverlap && minimum_overlap > 0.0 {
            warn!(rule = ?rule, minimum_overlap, "minimum_overlap is ignored when contains, within or intersects is set");
        }
        Ok(Self {
            extent: option_geometry("FilterOverlap", options)?,
            minimum_overlap,
            rule,
        })
    }

    fn keeps(&self, extent: &BoundingBox, footprint: &BoundingBox) -> bool {
        match self.rule {
            OverlapRule::Contains => footprint.contains(extent),
            OverlapRule::Within => extent.contains(footprint),
            OverlapRule::Intersects => footprint.intersection(extent).is_some(),
            OverlapRule::MinimumOverlap => {
                let common = footprint.intersection(extent).map(|common| common.area()).unwrap_or_default();
                let of_search = common / extent.area() * 100.0;
                let of_product = if footprint.area() > 0.0 { common / footprint.area() * 100.0 } else { 0.0 };
                extent.contains(footprint) || of_search >= self.minimum_overlap || of_product >= self.minimum_overlap
            }
        }
    }
}

impl CrunchPlugin for FilterOverlap {
    fn proceed(&self, products: Vec<EoProduct>) -> Vec<EoProduct> {
        let Some(extent) = self.extent else {
            warn!("geometry not found in cruncher arguments, filtering disabled");
            return products;
        };
        if extent.area() == 0.0 {
            debug!("no product can overlap a search extent without area");
            return Vec::new();
        }
        let filtered: Vec<EoProduct> = products
            .into_iter()
            .filter(|product| BoundingBox::of_product(product).is_some_and(|footprint| self.keeps(&extent, &footprint)))
            .collect();
        info!(product_count = filtered.len(), "finished filtering overlapping products");
        filtered
    }
}

/// Keeps the most recent products intersecting the search `geometry` until
/// their footprints cover it entirely.
///
/// Products are ordered by descending `startTimeFromAscendingNode`, undated
/// ones last. Without a geometry the products are only sorted.
#[derive(Debug, Clone)]
pub struct FilterLatestIntersect {
    extent: Option<BoundingBox>,
}

impl FilterLatestIntersect {
    pub fn new(options: &CrunchOptions) -> Result<Self, RegistryError> {
        Ok(Self {
            extent: option_geometry("FilterLatestIntersect", options)?,
        })
    }
}

impl CrunchPlugin for FilterLatestIntersect {
    fn proceed(&self, mut products: Vec<EoProduct>) -> Vec<EoProduct> {
        products.sort_by_key(|product| {
            Reverse(
                product
                    .property_str("startTimeFromAscendingNode")
                    .and_then(parse_datetime_utc)
                    .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
            )
        });
        let Some(extent) = self.extent else {
            warn!("geometry not found in cruncher arguments, filtering disabled");
            return products;
        };
        let mut uncovered = vec![extent];
        let mut filtered = Vec::new();
        for product in products {
            let Some(footprint) = BoundingBox::of_product(&product) else {
                continue;
            };
            uncovered = uncovered.iter().flat_map(|part| part.difference(&footprint)).collect();
            if footprint.intersection(&extent).is_some() {
                filtered.push(product);
            }
            if uncovered.is_empty() {
                debug!("search extent entirely covered");
                break;
            }
        }
        info!(product_count = filtered.len(), "finished filtering latest intersecting products");
        filtered
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn product(properties: Value) -> EoProduct {
        EoProduct::new("peps", None, serde_json::from_value(properties).unwrap())
    }

    fn options(value: Value) -> CrunchOptions {
        serde_json::from_value(value).unwrap()
    }

    fn ids(products: &[EoProduct]) -> Vec<String> {
        products.iter().filter_map(EoProduct::id).collect()
    }

    #[test]
    fn filter_date_keeps_products_inside_window() {
        let crunch = FilterDate::new(&options(json!({"start": "2021-01-10", "end": "2021-01-20T00:00:00Z"}))).unwrap();
        let products = vec![
            product(json!({"id": "early", "startTimeFromAscendingNode": "2021-01-05T00:00:00Z"})),
            product(json!({"id": "inside", "startTimeFromAscendingNode": "2021-01-12T00:00:00Z", "completionTimeFromAscendingNode": "2021-01-12T00:10:00Z"})),
            product(json!({"id": "overlapping_end", "startTimeFromAscendingNode": "2021-01-19T23:00:00Z", "completionTimeFromAscendingNode": "2021-01-20T01:00:00Z"})),
            product(json!({"id": "late", "startTimeFromAscendingNode": "2021-02-01T00:00:00Z"})),
            product(json!({"id": "undated"})),
        ];
        assert_eq!(ids(&crunch.proceed(products)), ["inside", "undated"]);
    }

    #[test]
    fn filter_date_rejects_invalid_bounds() {
        assert!(FilterDate::new(&options(json!({"start": "yesterday"}))).is_err());
        assert!(FilterDate::new(&options(json!({}))).is_ok());
    }

    #[test]
    fn filter_property_compares_numbers_and_strings() {
        let products = vec![
            product(json!({"id": "a", "cloudCover": 5, "platform": "S2A"})),
            product(json!({"id": "b", "cloudCover": "15.5", "platform": "S2B"})),
            product(json!({"id": "c", "cloudCover": 30, "platform": "S2A"})),
        ];
        let le = FilterProperty::new(&options(json!({"cloudCover": 15.5, "operator": "le"}))).unwrap();
        assert_eq!(ids(&le.proceed(products.clone())), ["a", "b"]);
        let eq = FilterProperty::new(&options(json!({"platform": "S2A"}))).unwrap();
        assert_eq!(ids(&eq.proceed(products.clone())), ["a", "c"]);
        let ne = FilterProperty::new(&options(json!({"platform": "S2A", "operator": "ne"}))).unwrap();
        assert_eq!(ids(&ne.proceed(products)), ["b"]);
    }

    #[test]
    fn filter_property_is_disabled_when_a_product_lacks_the_property() {
        let crunch = FilterProperty::new(&options(json!({"orbitNumber": 3}))).unwrap();
        let products = vec![product(json!({"id": "a", "orbitNumber": 3})), product(json!({"id": "b"}))];
        assert_eq!(ids(&crunch.proceed(products)), ["a", "b"]);
    }

    #[test]
    fn filter_property_configuration_errors() {
        assert!(FilterProperty::new(&options(json!({"cloudCover": 1, "operator": "like"}))).is_err());
        assert!(FilterProperty::new(&options(json!({"cloudCover": 1, "orbitNumber": 2}))).is_err());
        assert!(FilterProperty::new(&options(json!({"operator": "eq"}))).is_err());
    }

    #[test]
    fn filter_latest_by_name_keeps_first_per_tile() {
        let crunch = FilterLatestByName::new(&options(json!({"name_pattern": r"^S2[AB]_MSIL1C_\d{8}T\d{6}_N\d{4}_R\d{3}_T(?P<tileid>\d{6})_.*$"}))).unwrap();
        let products = vec![
            product(json!({"id": "1", "title": "S2A_MSIL1C_20210420T103021_N0300_R108_T310031_20210420T124134"})),
            product(json!({"id": "2", "title": "S2B_MSIL1C_20210410T103021_N0300_R108_T310031_20210410T124134"})),
            product(json!({"id": "3", "title": "S2B_MSIL1C_20210410T103021_N0300_R108_T310032_20210410T124134"})),
            product(json!({"id": "4", "title": "LC08_L1TP_196030"})),
        ];
        assert_eq!(ids(&crunch.proceed(products)), ["1", "3"]);
    }

    #[test]
    fn filter_latest_by_name_requires_tile_group() {
        let error = FilterLatestByName::new(&options(json!({"name_pattern": r"^S2.*$"}))).unwrap_err();
        assert!(matches!(error, RegistryError::Misconfigured { .. }));
        assert!(FilterLatestByName::new(&options(json!({}))).is_err());
    }

    fn footprint(id: &str, start: &str, bbox: [f64; 4]) -> EoProduct {
        let [min_x, min_y, max_x, max_y] = bbox;
        product(json!({
            "id": id,
            "startTimeFromAscendingNode": start,
            "geometry": format!("POLYGON (({min_x} {min_y}, {max_x} {min_y}, {max_x} {max_y}, {min_x} {max_y}, {min_x} {min_y}))"),
        }))
    }

    fn overlap_products() -> Vec<EoProduct> {
        vec![
            footprint("inside", "2021-01-01", [1.0, 1.0, 2.0, 2.0]),
            footprint("covering", "2021-01-01", [-1.0, -1.0, 5.0, 5.0]),
            footprint("corner", "2021-01-01", [3.0, 3.0, 7.0, 7.0]),
            footprint("away", "2021-01-01", [10.0, 10.0, 11.0, 11.0]),
        ]
    }

    #[test]
    fn filter_overlap_minimum_overlap() {
        let search = json!({"lonmin": 0, "latmin": 0, "lonmax": 4, "latmax": 4});
        let crunch = FilterOverlap::new(&options(json!({"geometry": search, "minimum_overlap": 50}))).unwrap();
        assert_eq!(ids(&crunch.proceed(overlap_products())), ["inside", "covering"]);
        let loose = FilterOverlap::new(&options(json!({"geometry": search, "minimum_overlap": "5"}))).unwrap();
        assert_eq!(ids(&loose.proceed(overlap_products())), ["inside", "covering", "corner"]);
    }

    #[test]
    fn filter_overlap_spatial_predicates() {
        let search = json!("POLYGON ((0 0, 4 0, 4 4, 0 4, 0 0))");
        let contains = FilterOverlap::new(&options(json!({"geometry": search, "contains": true}))).unwrap();
        assert_eq!(ids(&contains.proceed(overlap_products())), ["covering"]);
        let within = FilterOverlap::new(&options(json!({"geometry": search, "within": true}))).unwrap();
        assert_eq!(ids(&within.proceed(overlap_products())), ["inside"]);
        let intersects = FilterOverlap::new(&options(json!({"geometry": search, "intersects": true}))).unwrap();
        assert_eq!(ids(&intersects.proceed(overlap_products())), ["inside", "covering", "corner"]);
    }

    #[test]
    fn filter_overlap_configuration() {
        let error = FilterOverlap::new(&options(json!({"geometry": [0, 0, 1, 1], "within": true, "contains": true}))).unwrap_err();
        assert!(matches!(error, RegistryError::Misconfigured { .. }));
        assert!(FilterOverlap::new(&options(json!({"geometry": "not wkt"}))).is_err());
        assert!(FilterOverlap::new(&options(json!({"minimum_overlap": "half"}))).is_err());

        let disabled = FilterOverlap::new(&options(json!({}))).unwrap();
        assert_eq!(disabled.proceed(overlap_products()).len(), 4);
        let flat = FilterOverlap::new(&options(json!({"geometry": "POINT (1 1)"}))).unwrap();
        assert!(flat.proceed(overlap_products()).is_empty());
    }

    #[test]
    fn filter_latest_intersect_stops_once_extent_is_covered() {
        let crunch = FilterLatestIntersect::new(&options(json!({"geometry": [0, 0, 4, 4]}))).unwrap();
        let products = vec![
            footprint("old_left", "2021-01-01T00:00:00Z", [0.0, 0.0, 2.0, 4.0]),
            footprint("new_left", "2021-03-01T00:00:00Z", [-1.0, -1.0, 2.0, 5.0]),
            footprint("away", "2021-04-01T00:00:00Z", [10.0, 10.0, 11.0, 11.0]),
            footprint("new_right", "2021-02-01T00:00:00Z", [2.0, 0.0, 4.0, 4.0]),
            footprint("oldest", "2020-01-01T00:00:00Z", [0.0, 0.0, 4.0, 4.0]),
        ];
        assert_eq!(ids(&crunch.proceed(products)), ["new_left", "new_right"]);
    }

    #[test]
    fn filter_latest_intersect_without_geometry_only_sorts() {
        let crunch = FilterLatestIntersect::new(&options(json!({}))).unwrap();
        let products = vec![
            product(json!({"id": "undated"})),
            footprint("older", "2021-01-01T00:00:00Z", [0.0, 0.0, 1.0, 1.0]),
            footprint("newer", "2021-02-01T00:00:00Z", [0.0, 0.0, 1.0, 1.0]),
        ];
        assert_eq!(ids(&crunch.proceed(products)), ["newer", "older", "undated"]);
    }

    #[test]
    fn remove_doubles_keeps_first_occurrence() {
        let products = vec![
            product(json!({"id": "a", "title": "first"})),
            product(json!({"id": "b"})),
            product(json!({"id": "a", "title": "second"})),
        ];
        let kept = RemoveDoubles.proceed(products);
        assert_eq!(ids(&kept), ["a", "b"]);
        assert_eq!(kept[0].title().as_deref(), Some("first"));
    }
}
