//! Public-housing valuation pipeline: artifact inference with
//! correction-factor post-adjustment. Unlike the private domain there is
//! no closed-form fallback; a missing artifact is a server fault.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use super::floor::floor_number;
use super::vector::{FeatureValue, FeatureVector, InferenceModel};
use super::{
    comparables, is_hdb_property_type, round2, CalculationMethod, CorrectionDetail,
    CorrectionDetails, PropertyAttributes, PropertyDomain, Sector, ValuationError, ValuationResult,
};

/// Feature schema shipped with the HDB artifact, split into the
/// categorical and numeric groups the builder dispatches on.
#[derive(Debug, Clone, Deserialize)]
pub struct HdbFeatureLists {
    #[serde(rename = "all_features")]
    pub all: Vec<String>,
    #[serde(rename = "categorical_features")]
    pub categorical: Vec<String>,
    #[serde(rename = "numeric_features")]
    pub numeric: Vec<String>,
}

/// Multiplicative post-inference adjustments keyed by segment value.
/// A missing dimension or segment entry is a no-op, never an error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CorrectionTable {
    #[serde(default)]
    pub region: HashMap<String, f64>,
    #[serde(default)]
    pub flat_type: HashMap<String, f64>,
    #[serde(default)]
    pub town: HashMap<String, f64>,
    #[serde(default)]
    pub flat_model: HashMap<String, f64>,
}

pub type TownToRegion = HashMap<String, String>;

const DEFAULT_TOWN: &str = "ANG MO KIO";
const DEFAULT_FLAT_TYPE: &str = "4 ROOM";
const DEFAULT_FLAT_MODEL: &str = "Standard";
const DEFAULT_PRECINCT: &str = "WOODLANDS";

fn flat_type_from_property_type(property_type: &str) -> String {
    let upper = property_type.to_uppercase();
    for (needle, label) in [
        ("1-ROOM", "1 ROOM"),
        ("2-ROOM", "2 ROOM"),
        ("3-ROOM", "3 ROOM"),
        ("4-ROOM", "4 ROOM"),
        ("5-ROOM", "5 ROOM"),
        ("EXECUTIVE", "EXECUTIVE"),
    ] {
        if upper.contains(needle) {
            return label.to_string();
        }
    }
    DEFAULT_FLAT_TYPE.to_string()
}

fn typical_area_for_flat_type(flat_type: &str) -> f64 {
    let upper = flat_type.to_uppercase();
    for (needle, area) in [
        ("1 ROOM", 35.0),
        ("2 ROOM", 45.0),
        ("3 ROOM", 65.0),
        ("4 ROOM", 90.0),
        ("5 ROOM", 110.0),
        ("EXECUTIVE", 130.0),
    ] {
        if upper.contains(needle) {
            return area;
        }
    }
    90.0
}

fn region_score(sector: Option<&Sector>) -> f64 {
    match sector {
        Some(Sector::Label(label)) => match label.as_str() {
            "Central" => 9.0,
            "East" => 7.0,
            "Northeast" => 6.0,
            // North, West, and anything unrecognized.
            _ => 5.0,
        },
        Some(Sector::Code(code)) => match code {
            0 => 9.0,
            1 => 7.0,
            _ => 5.0,
        },
        None => 5.0,
    }
}

fn mrt_score(distance: Option<f64>) -> f64 {
    match distance {
        Some(d) if d < 0.3 => 9.0,
        Some(d) if d < 0.6 => 7.0,
        Some(d) if d < 1.0 => 5.0,
        Some(_) => 3.0,
        None => 5.0,
    }
}

fn mrt_factor(distance: Option<f64>) -> f64 {
    match distance {
        Some(d) if d < 0.3 => 1.3,
        Some(d) if d < 0.6 => 1.2,
        Some(d) if d < 1.0 => 1.1,
        _ => 1.0,
    }
}

fn categorical_value(name: &str, attrs: &PropertyAttributes) -> Option<FeatureValue> {
    let value = match name {
        "town" => attrs
            .precinct
            .clone()
            .unwrap_or_else(|| DEFAULT_TOWN.to_string()),
        "flat_type" => attrs
            .flat_type
            .clone()
            .unwrap_or_else(|| DEFAULT_FLAT_TYPE.to_string()),
        "flat_model" => attrs
            .flat_model
            .clone()
            .unwrap_or_else(|| DEFAULT_FLAT_MODEL.to_string()),
        _ => return None,
    };
    Some(FeatureValue::Text(value))
}

fn numeric_value(name: &str, attrs: &PropertyAttributes) -> FeatureValue {
    let value = match name {
        "area_cbd_interaction_scaled" => {
            let distance = attrs.distance_to_mrt.unwrap_or(5.0);
            attrs.area_sqm / (1.0 + distance) / 100.0
        }
        "remaining_lease_at_transaction" => attrs.remaining_lease.unwrap_or(70.0),
        "location_score" => {
            (region_score(attrs.sector.as_ref()) + mrt_score(attrs.distance_to_mrt)) / 2.0
        }
        "area_premium_for_flattype" => {
            let flat_type = attrs.flat_type.as_deref().unwrap_or(DEFAULT_FLAT_TYPE);
            attrs.area_sqm / typical_area_for_flat_type(flat_type)
        }
        "floor_mrt_premium_scaled" => {
            let floor = floor_number(attrs.floor_level.as_deref()) as f64;
            let floor_factor = (floor / 40.0).min(1.0) * 0.7 + 0.3;
            floor_factor * mrt_factor(attrs.distance_to_mrt)
        }
        // Numeric names without an engineered rule carry a zero default.
        _ => 0.0,
    };
    FeatureValue::Number(value)
}

/// Builds the inference row for the artifact schema. Names listed in
/// `all` but missing from both groups are a schema gap and surface as
/// `MissingFeatures`.
pub fn build_feature_vector(
    lists: &HdbFeatureLists,
    attrs: &PropertyAttributes,
) -> Result<FeatureVector, ValuationError> {
    let mut vector = FeatureVector::with_capacity(lists.all.len());
    for name in &lists.all {
        if lists.categorical.iter().any(|c| c == name) {
            if let Some(value) = categorical_value(name, attrs) {
                vector.push(name.clone(), value);
            }
        } else if lists.numeric.iter().any(|n| n == name) {
            vector.push(name.clone(), numeric_value(name, attrs));
        }
    }

    let columns = vector.missing_from(&lists.all);
    if columns.is_empty() {
        Ok(vector)
    } else {
        Err(ValuationError::MissingFeatures { columns })
    }
}

/// Compounds every matching correction factor onto the raw estimate, in
/// a fixed dimension order, recording each applied segment. The region
/// dimension only matches textual sector labels, never integer codes.
pub fn apply_corrections(
    table: Option<&CorrectionTable>,
    raw: f64,
    attrs: &PropertyAttributes,
) -> (f64, CorrectionDetails) {
    let mut corrected = raw;
    let mut details = CorrectionDetails::new();
    let Some(table) = table else {
        return (corrected, details);
    };

    if let Some(region) = attrs.sector.as_ref().and_then(Sector::as_label) {
        if let Some(factor) = table.region.get(region) {
            corrected *= factor;
            details.insert(
                "region".to_string(),
                CorrectionDetail {
                    factor: *factor,
                    applied_to: region.to_string(),
                },
            );
        }
    }

    if let Some(flat_type) = attrs.flat_type.as_deref() {
        if let Some(factor) = table.flat_type.get(flat_type) {
            corrected *= factor;
            details.insert(
                "flat_type".to_string(),
                CorrectionDetail {
                    factor: *factor,
                    applied_to: flat_type.to_string(),
                },
            );
        }
    }

    if let Some(town) = attrs.precinct.as_deref() {
        if let Some(factor) = table.town.get(town) {
            corrected *= factor;
            details.insert(
                "town".to_string(),
                CorrectionDetail {
                    factor: *factor,
                    applied_to: town.to_string(),
                },
            );
        }
    }

    if let Some(flat_model) = attrs.flat_model.as_deref() {
        if let Some(factor) = table.flat_model.get(flat_model) {
            corrected *= factor;
            details.insert(
                "flat_model".to_string(),
                CorrectionDetail {
                    factor: *factor,
                    applied_to: flat_model.to_string(),
                },
            );
        }
    }

    (corrected, details)
}

/// Valuation pipeline for the public-housing domain. All dependencies
/// are read-only after construction.
pub struct HdbValuationPipeline {
    model: Option<Arc<dyn InferenceModel>>,
    feature_lists: Option<Arc<HdbFeatureLists>>,
    corrections: Option<Arc<CorrectionTable>>,
    town_to_region: Option<Arc<TownToRegion>>,
}

impl HdbValuationPipeline {
    pub fn new(
        model: Option<Arc<dyn InferenceModel>>,
        feature_lists: Option<Arc<HdbFeatureLists>>,
        corrections: Option<Arc<CorrectionTable>>,
        town_to_region: Option<Arc<TownToRegion>>,
    ) -> Self {
        Self {
            model,
            feature_lists,
            corrections,
            town_to_region,
        }
    }

    pub fn model_loaded(&self) -> bool {
        self.model.is_some()
    }

    pub fn feature_lists_loaded(&self) -> bool {
        self.feature_lists.is_some()
    }

    pub fn corrections_loaded(&self) -> bool {
        self.corrections.is_some()
    }

    pub fn town_to_region_loaded(&self) -> bool {
        self.town_to_region.is_some()
    }

    /// Fills the two domain defaults (flat type from the property-type
    /// string, precinct) and resolves the sector from the town-to-region
    /// mapping before feature derivation.
    fn resolved_attributes(&self, attrs: &PropertyAttributes) -> PropertyAttributes {
        let mut resolved = attrs.clone();
        if resolved.flat_type.is_none() {
            resolved.flat_type = Some(flat_type_from_property_type(&resolved.property_type));
        }
        if resolved.precinct.is_none() {
            resolved.precinct = Some(DEFAULT_PRECINCT.to_string());
        }
        if resolved.sector.is_none() {
            if let Some(mapping) = &self.town_to_region {
                if let Some(region) = resolved
                    .precinct
                    .as_deref()
                    .and_then(|town| mapping.get(town))
                {
                    resolved.sector = Some(Sector::Label(region.clone()));
                }
            }
        }
        resolved
    }

    pub fn valuate(&self, attrs: &PropertyAttributes) -> Result<ValuationResult, ValuationError> {
        if !is_hdb_property_type(&attrs.property_type) {
            return Err(ValuationError::DomainMismatch {
                expected: PropertyDomain::Hdb,
                found: attrs.property_type.clone(),
            });
        }

        let (Some(model), Some(lists)) = (&self.model, &self.feature_lists) else {
            return Err(ValuationError::UnavailableModel);
        };

        let resolved = self.resolved_attributes(attrs);
        let vector = build_feature_vector(lists, &resolved)?;
        let raw = model.predict(&vector)?;
        debug!(raw, "raw HDB model estimate");

        let (corrected, details) = apply_corrections(self.corrections.as_deref(), raw, &resolved);

        let location = resolved.location.clone().or_else(|| {
            Some(format!(
                "Block {}, Singapore {}",
                resolved.precinct.as_deref().unwrap_or(""),
                resolved.postal_code.as_deref().unwrap_or("")
            ))
        });

        Ok(ValuationResult {
            estimated_value: round2(corrected),
            confidence_range: comparables::confidence_range(corrected),
            features_used: lists.all.clone(),
            comparable_properties: comparables::synthesize_comparables(
                corrected,
                &resolved,
                PropertyDomain::Hdb,
            ),
            property_type: resolved.property_type.clone(),
            location,
            calculation_method: CalculationMethod::ModelInference,
            correction_details: Some(details),
        })
    }
}
