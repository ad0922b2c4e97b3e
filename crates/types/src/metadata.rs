//! Canonical metadata catalog.
//!
//! Canonical keys follow the OpenSearch EO, Geo and Time extensions. Every
//! product produced by the mapper carries all of them, unresolved ones holding
//! [`NOT_AVAILABLE`].

use indexmap::IndexMap;
use serde_json::Value;

/// Ordered mapping from canonical (and provider-discovered) keys to values.
pub type CanonicalProperties = IndexMap<String, Value>;

/// Sentinel emitted for keys that a provider does not map or did not return.
pub const NOT_AVAILABLE: &str = "N/A";

/// Product type used by providers that accept any product type passed through.
pub const GENERIC_PRODUCT_TYPE: &str = "GENERIC_PRODUCT_TYPE";

/// Fixed catalog of canonical metadata keys, in output order.
pub const CANONICAL_KEYS: &[&str] = &[
    // OpenSearch parameters for collection search
    "productType",
    "doi",
    "platform",
    "platformSerialIdentifier",
    "instrument",
    "sensorType",
    "compositeType",
    "processingLevel",
    "orbitType",
    "spectralRange",
    "wavelengths",
    "hasSecurityConstraints",
    "dissemination",
    // INSPIRE obligated
    "title",
    "topicCategory",
    "keyword",
    "abstract",
    "resolution",
    "organisationName",
    "organisationRole",
    "publicationDate",
    "lineage",
    "useLimitation",
    "accessConstraint",
    "otherConstraint",
    "classification",
    "language",
    "specification",
    // OpenSearch parameters for product search
    "parentIdentifier",
    "productionStatus",
    "acquisitionType",
    "orbitNumber",
    "orbitDirection",
    "track",
    "frame",
    "swathIdentifier",
    "cloudCover",
    "snowCover",
    "lowestLocation",
    "highestLocation",
    "productVersion",
    "productQualityStatus",
    "productQualityDegradationTag",
    "processorName",
    "processingCenter",
    "creationDate",
    "modificationDate",
    "processingDate",
    "sensorMode",
    "archivingCenter",
    "processingMode",
    // OpenSearch parameters for acquisition parameters search
    "availabilityTime",
    "acquisitionStation",
    "acquisitionSubType",
    "startTimeFromAscendingNode",
    "completionTimeFromAscendingNode",
    "illuminationAzimuthAngle",
    "illuminationZenithAngle",
    "illuminationElevationAngle",
    "polarizationMode",
    "polarizationChannels",
    "antennaLookDirection",
    "minimumIncidenceAngle",
    "maximumIncidenceAngle",
    "dopplerFrequency",
    "incidenceAngleVariation",
    // Identification and access
    "id",
    "geometry",
    "quicklook",
    "thumbnail",
    "downloadLink",
    "storageStatus",
];

/// Returns true if `value` is the [`NOT_AVAILABLE`] sentinel.
pub fn is_not_available(value: &Value) -> bool {
    matches!(value, Value::String(text) if text == NOT_AVAILABLE)
}
