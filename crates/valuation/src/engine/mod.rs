use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub mod comparables;
pub mod floor;
pub mod hdb;
pub mod private;
pub mod vector;

pub use hdb::HdbValuationPipeline;
pub use private::PrivateValuationPipeline;

/// Keywords marking a property type as public housing. Matching is by
/// case-insensitive substring, so "HDB 4-ROOM FLAT" belongs to the HDB
/// domain while "Condominium" does not.
pub const HDB_TYPE_KEYWORDS: [&str; 7] = [
    "HDB",
    "1-ROOM",
    "2-ROOM",
    "3-ROOM",
    "4-ROOM",
    "5-ROOM",
    "EXECUTIVE",
];

pub fn is_hdb_property_type(property_type: &str) -> bool {
    let upper = property_type.to_uppercase();
    HDB_TYPE_KEYWORDS
        .iter()
        .any(|keyword| upper.contains(keyword))
}

/// The two mutually exclusive valuation domains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyDomain {
    Hdb,
    Private,
}

impl fmt::Display for PropertyDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyDomain::Hdb => write!(f, "HDB"),
            PropertyDomain::Private => write!(f, "private"),
        }
    }
}

/// Raw valuation input. Only the property type and floor area are
/// mandatory; every other attribute may be absent and the feature builder
/// decides the substitution, never the deserializer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PropertyAttributes {
    pub property_type: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    pub area_sqm: f64,
    #[serde(default)]
    pub floor_level: Option<String>,
    #[serde(default)]
    pub unit_num: Option<String>,
    // Public-housing attributes.
    #[serde(default)]
    pub precinct: Option<String>,
    #[serde(default)]
    pub flat_type: Option<String>,
    #[serde(default)]
    pub flat_model: Option<String>,
    #[serde(default)]
    pub remaining_lease: Option<f64>,
    #[serde(default)]
    pub sector: Option<Sector>,
    #[serde(default)]
    pub distance_to_mrt: Option<f64>,
    // Private-market attributes.
    #[serde(default)]
    pub zone: Option<i64>,
    #[serde(default)]
    pub tenure: Option<String>,
    #[serde(default)]
    pub completion_year: Option<i32>,
    #[serde(default)]
    pub distance_to_school: Option<f64>,
    #[serde(default)]
    pub northing: Option<f64>,
    #[serde(default)]
    pub easting: Option<f64>,
    #[serde(default)]
    pub is_premium_location: Option<i64>,
    #[serde(default)]
    pub x_coord: Option<f64>,
    #[serde(default)]
    pub y_coord: Option<f64>,
    #[serde(default)]
    pub project_name_hash: Option<i64>,
    #[serde(default)]
    pub street_hash: Option<i64>,
    #[serde(default)]
    pub area_region: Option<i64>,
}

/// Region sector, either a textual label ("Central") or an integer code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Sector {
    Code(i64),
    Label(String),
}

impl Sector {
    pub fn as_label(&self) -> Option<&str> {
        match self {
            Sector::Label(label) => Some(label),
            Sector::Code(_) => None,
        }
    }

    pub fn as_code(&self) -> Option<i64> {
        match self {
            Sector::Code(code) => Some(*code),
            Sector::Label(label) => label.trim().parse().ok(),
        }
    }
}

/// How the final estimate was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalculationMethod {
    ModelInference,
    HeuristicFallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceRange {
    pub low: f64,
    pub high: f64,
}

/// Synthetic reference listing presented alongside an estimate. These are
/// presentation artifacts with fixed arithmetic, not market comparables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparableListing {
    pub address: String,
    pub transaction_date: String,
    pub price: f64,
    pub area_sqm: f64,
    pub property_type: String,
}

/// One correction-table match recorded during post-adjustment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionDetail {
    pub factor: f64,
    pub applied_to: String,
}

pub type CorrectionDetails = BTreeMap<String, CorrectionDetail>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValuationResult {
    pub estimated_value: f64,
    pub confidence_range: ConfidenceRange,
    pub features_used: Vec<String>,
    pub comparable_properties: Vec<ComparableListing>,
    pub property_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub calculation_method: CalculationMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correction_details: Option<CorrectionDetails>,
}

#[derive(Debug, thiserror::Error)]
pub enum ValuationError {
    #[error("this pipeline only handles {expected} properties (got '{found}')")]
    DomainMismatch {
        expected: PropertyDomain,
        found: String,
    },
    #[error("required features could not be derived: {columns:?}")]
    MissingFeatures { columns: Vec<String> },
    #[error(transparent)]
    Inference(#[from] vector::InferenceError),
    #[error("no valuation model is loaded for the HDB domain")]
    UnavailableModel,
    #[error("internal valuation failure: {0}")]
    Internal(String),
}

impl ValuationError {
    /// Client faults are request-routing mistakes; everything else is a
    /// server fault by the time it crosses the pipeline boundary.
    pub fn is_client_fault(&self) -> bool {
        matches!(self, ValuationError::DomainMismatch { .. })
    }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
