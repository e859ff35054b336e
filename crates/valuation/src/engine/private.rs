//! Private-market valuation pipeline: model inference with a
//! deterministic per-square-meter heuristic behind it.

use std::sync::Arc;

use tracing::{debug, warn};

use super::floor::floor_number;
use super::vector::{FeatureValue, FeatureVector, InferenceModel};
use super::{
    comparables, is_hdb_property_type, round2, CalculationMethod, PropertyAttributes,
    PropertyDomain, ValuationError, ValuationResult,
};

/// Schema used when the artifact does not declare its own feature names.
pub const DEFAULT_FEATURE_NAMES: [&str; 30] = [
    "district",
    "region",
    "is_premium_location",
    "x_coord",
    "y_coord",
    "latitude",
    "longitude",
    "property_type",
    "is_ec",
    "is_apartment",
    "is_detached",
    "is_semi_detached",
    "is_terrace",
    "is_strata",
    "avg_floor",
    "is_high_floor",
    "area_sqm",
    "size_category",
    "log_area",
    "tenure_type",
    "is_freehold",
    "is_new_sale",
    "is_resale",
    "is_subsale",
    "transaction_year",
    "transaction_quarter",
    "years_since_transaction",
    "project_name_hash",
    "street_hash",
    "area_region",
];

/// Attributes the heuristic formula reads.
const FALLBACK_FEATURES: [&str; 5] = [
    "area_sqm",
    "district",
    "property_type",
    "tenure",
    "floor_level",
];

type DeriveFn = fn(&PropertyAttributes) -> FeatureValue;

/// Per-feature derivation rules, keyed by feature name. Each rule is
/// evaluated independently; the required-name list drives which rules
/// run, and names without a rule default to numeric zero.
static DERIVATIONS: &[(&str, DeriveFn)] = &[
    ("district", |a| number_or_zero(a.zone)),
    ("region", |a| {
        number_or_zero(a.sector.as_ref().and_then(super::Sector::as_code))
    }),
    ("is_premium_location", |a| {
        number_or_zero(a.is_premium_location)
    }),
    ("x_coord", |a| float_or_zero(a.x_coord)),
    ("y_coord", |a| float_or_zero(a.y_coord)),
    ("latitude", |a| float_or_zero(a.northing)),
    ("longitude", |a| float_or_zero(a.easting)),
    // These two categoricals are pinned to the levels the artifact was
    // trained against; the raw property type only feeds the shape flags.
    ("property_type", |_| {
        FeatureValue::Text("CONDOMINIUM".to_string())
    }),
    ("tenure_type", |_| {
        FeatureValue::Text("99-YEAR LEASEHOLD".to_string())
    }),
    ("is_ec", |a| {
        type_flag(a, &["EC", "EXECUTIVE CONDOMINIUM"])
    }),
    ("is_apartment", |a| type_flag(a, &["APARTMENT"])),
    ("is_detached", |a| type_flag(a, &["DETACHED", "BUNGALOW"])),
    ("is_semi_detached", |a| {
        type_flag(a, &["SEMI-DETACHED", "SEMI DETACHED"])
    }),
    ("is_terrace", |a| type_flag(a, &["TERRACE"])),
    ("is_strata", |a| {
        type_flag(a, &["CONDOMINIUM", "APARTMENT"])
    }),
    ("avg_floor", |a| match a.floor_level.as_deref() {
        Some(level) => FeatureValue::Number(floor_number(Some(level)) as f64),
        None => FeatureValue::Number(0.0),
    }),
    ("is_high_floor", |a| match a.floor_level.as_deref() {
        Some(level) => FeatureValue::flag(floor_number(Some(level)) >= 10),
        None => FeatureValue::Number(0.0),
    }),
    ("area_sqm", |a| FeatureValue::Number(a.area_sqm)),
    ("size_category", |a| {
        let area = usable_area(a);
        FeatureValue::Number(if area < 70.0 {
            0.0
        } else if area < 120.0 {
            1.0
        } else {
            2.0
        })
    }),
    ("log_area", |a| FeatureValue::Number(usable_area(a).ln())),
    ("is_freehold", |a| match a.tenure.as_deref() {
        Some(tenure) => FeatureValue::flag(tenure.to_uppercase().contains("FREEHOLD")),
        None => FeatureValue::Number(0.0),
    }),
    // Transaction context is fixed: a resale valued in the current year.
    ("is_new_sale", |_| FeatureValue::Number(0.0)),
    ("is_resale", |_| FeatureValue::Number(1.0)),
    ("is_subsale", |_| FeatureValue::Number(0.0)),
    ("transaction_year", |_| FeatureValue::Number(2025.0)),
    ("transaction_quarter", |_| FeatureValue::Number(1.0)),
    ("years_since_transaction", |_| FeatureValue::Number(0.0)),
    ("project_name_hash", |a| number_or_zero(a.project_name_hash)),
    ("street_hash", |a| number_or_zero(a.street_hash)),
    ("area_region", |a| number_or_zero(a.area_region)),
];

fn number_or_zero(value: Option<i64>) -> FeatureValue {
    FeatureValue::Number(value.map(|v| v as f64).unwrap_or(0.0))
}

fn float_or_zero(value: Option<f64>) -> FeatureValue {
    FeatureValue::Number(value.unwrap_or(0.0))
}

fn type_flag(attrs: &PropertyAttributes, needles: &[&str]) -> FeatureValue {
    let upper = attrs.property_type.to_uppercase();
    FeatureValue::flag(needles.iter().any(|needle| upper.contains(needle)))
}

/// Floor area guarded for the log/bucket rules: non-positive or
/// non-finite values substitute the 100 m² default.
fn usable_area(attrs: &PropertyAttributes) -> f64 {
    if attrs.area_sqm.is_finite() && attrs.area_sqm > 0.0 {
        attrs.area_sqm
    } else {
        100.0
    }
}

/// Builds the inference row for the required names, one derivation per
/// name, then verifies nothing was left underived.
pub fn build_feature_vector(
    required: &[String],
    attrs: &PropertyAttributes,
) -> Result<FeatureVector, ValuationError> {
    let mut vector = FeatureVector::with_capacity(required.len());
    for name in required {
        let value = DERIVATIONS
            .iter()
            .find(|(rule, _)| rule == name)
            .map(|(_, derive)| derive(attrs))
            .unwrap_or(FeatureValue::Number(0.0));
        vector.push(name.clone(), value);
    }

    let columns = vector.missing_from(required);
    if columns.is_empty() {
        Ok(vector)
    } else {
        Err(ValuationError::MissingFeatures { columns })
    }
}

/// Deterministic fallback: area × district base price × compound
/// multiplier for property type, tenure, and floor.
pub fn heuristic_estimate(attrs: &PropertyAttributes) -> f64 {
    const TIER_A: [i64; 7] = [1, 2, 3, 4, 9, 10, 11];
    const TIER_B: [i64; 8] = [5, 6, 7, 8, 12, 13, 14, 15];

    let district = attrs.zone.unwrap_or(10);
    let base_price = if TIER_A.contains(&district) {
        25_000.0
    } else if TIER_B.contains(&district) {
        18_000.0
    } else {
        12_000.0
    };

    let upper = attrs.property_type.to_uppercase();
    let mut factor = if upper.contains("SEMI-DETACHED") {
        1.3
    } else if upper.contains("DETACHED") || upper.contains("BUNGALOW") {
        1.5
    } else if upper.contains("TERRACE") {
        1.2
    } else if upper.contains("CONDOMINIUM") {
        1.0
    } else if upper.contains("APARTMENT") {
        0.9
    } else {
        1.0
    };

    if attrs
        .tenure
        .as_deref()
        .is_some_and(|tenure| tenure.to_uppercase().contains("FREEHOLD"))
    {
        factor *= 1.2;
    }

    let floor = floor_number(attrs.floor_level.as_deref());
    if floor > 15 {
        factor *= 1.1;
    } else if floor > 10 {
        factor *= 1.05;
    }

    usable_area(attrs) * base_price * factor
}

/// One strategy attempt: either an estimate with its provenance, or a
/// signal to try the next strategy.
enum Attempt {
    Estimated {
        value: f64,
        features_used: Vec<String>,
        method: CalculationMethod,
    },
    Skipped,
}

/// Valuation pipeline for the private residential domain. Holds the
/// optional artifact; the heuristic guarantees an answer either way.
pub struct PrivateValuationPipeline {
    model: Option<Arc<dyn InferenceModel>>,
}

impl PrivateValuationPipeline {
    pub fn new(model: Option<Arc<dyn InferenceModel>>) -> Self {
        Self { model }
    }

    pub fn model_loaded(&self) -> bool {
        self.model.is_some()
    }

    pub fn valuate(&self, attrs: &PropertyAttributes) -> Result<ValuationResult, ValuationError> {
        if is_hdb_property_type(&attrs.property_type) {
            return Err(ValuationError::DomainMismatch {
                expected: PropertyDomain::Private,
                found: attrs.property_type.clone(),
            });
        }

        // Strategies in order: artifact inference, then the heuristic.
        // A skipped or failed inference attempt never reaches the caller.
        let (estimate, features_used, method) = match self.inference_attempt(attrs) {
            Attempt::Estimated {
                value,
                features_used,
                method,
            } => (value, features_used, method),
            Attempt::Skipped => {
                debug!("using private heuristic fallback");
                (
                    heuristic_estimate(attrs),
                    FALLBACK_FEATURES.iter().map(|s| s.to_string()).collect(),
                    CalculationMethod::HeuristicFallback,
                )
            }
        };

        let location = attrs
            .location
            .clone()
            .or_else(|| attrs.postal_code.clone());

        Ok(ValuationResult {
            estimated_value: round2(estimate),
            confidence_range: comparables::confidence_range(estimate),
            features_used,
            comparable_properties: comparables::synthesize_comparables(
                estimate,
                attrs,
                PropertyDomain::Private,
            ),
            property_type: attrs.property_type.clone(),
            location,
            calculation_method: method,
            correction_details: None,
        })
    }

    fn inference_attempt(&self, attrs: &PropertyAttributes) -> Attempt {
        let Some(model) = &self.model else {
            return Attempt::Skipped;
        };

        let required = model
            .feature_names()
            .unwrap_or_else(|| DEFAULT_FEATURE_NAMES.iter().map(|s| s.to_string()).collect());

        let vector = match build_feature_vector(&required, attrs) {
            Ok(vector) => vector,
            Err(err) => {
                warn!(error = %err, "private feature derivation failed, falling back");
                return Attempt::Skipped;
            }
        };

        match model.predict(&vector) {
            Ok(value) => Attempt::Estimated {
                value,
                features_used: required,
                method: CalculationMethod::ModelInference,
            },
            Err(err) => {
                warn!(error = %err, "private model inference failed, falling back");
                Attempt::Skipped
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::vector::InferenceError;
    use super::*;

    struct FixedModel {
        value: f64,
        names: Option<Vec<String>>,
    }

    impl InferenceModel for FixedModel {
        fn feature_names(&self) -> Option<Vec<String>> {
            self.names.clone()
        }

        fn predict(&self, _row: &FeatureVector) -> Result<f64, InferenceError> {
            Ok(self.value)
        }
    }

    struct FailingModel;

    impl InferenceModel for FailingModel {
        fn feature_names(&self) -> Option<Vec<String>> {
            None
        }

        fn predict(&self, _row: &FeatureVector) -> Result<f64, InferenceError> {
            Err(InferenceError::new("categorical level unseen in training"))
        }
    }

    fn condo_request() -> PropertyAttributes {
        PropertyAttributes {
            property_type: "Condominium".to_string(),
            area_sqm: 90.0,
            zone: Some(9),
            tenure: Some("99-YEAR LEASEHOLD".to_string()),
            floor_level: Some("16-20".to_string()),
            ..PropertyAttributes::default()
        }
    }

    fn required_names() -> Vec<String> {
        DEFAULT_FEATURE_NAMES.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn guard_rejects_public_housing_types() {
        let pipeline = PrivateValuationPipeline::new(None);
        let mut attrs = condo_request();
        attrs.property_type = "HDB 4-ROOM FLAT".to_string();
        let err = pipeline.valuate(&attrs).unwrap_err();
        assert!(matches!(err, ValuationError::DomainMismatch { .. }));
    }

    #[test]
    fn categorical_constants_ignore_the_real_property_type() {
        // The shape flags see the true type while the two categorical
        // passthroughs stay pinned to the training levels.
        let mut attrs = condo_request();
        attrs.property_type = "Terrace House".to_string();
        attrs.tenure = Some("FREEHOLD".to_string());
        let vector = build_feature_vector(&required_names(), &attrs).expect("vector builds");
        assert_eq!(
            vector.get("property_type").and_then(FeatureValue::as_text),
            Some("CONDOMINIUM")
        );
        assert_eq!(
            vector.get("tenure_type").and_then(FeatureValue::as_text),
            Some("99-YEAR LEASEHOLD")
        );
        assert_eq!(
            vector.get("is_terrace").and_then(FeatureValue::as_number),
            Some(1.0)
        );
        assert_eq!(
            vector.get("is_strata").and_then(FeatureValue::as_number),
            Some(0.0)
        );
        assert_eq!(
            vector.get("is_freehold").and_then(FeatureValue::as_number),
            Some(1.0)
        );
    }

    #[test]
    fn floor_features_derive_from_the_parser() {
        let attrs = condo_request();
        let vector = build_feature_vector(&required_names(), &attrs).expect("vector builds");
        assert_eq!(
            vector.get("avg_floor").and_then(FeatureValue::as_number),
            Some(18.0)
        );
        assert_eq!(
            vector.get("is_high_floor").and_then(FeatureValue::as_number),
            Some(1.0)
        );
    }

    #[test]
    fn absent_floor_level_zeroes_the_floor_features() {
        let mut attrs = condo_request();
        attrs.floor_level = None;
        let vector = build_feature_vector(&required_names(), &attrs).expect("vector builds");
        assert_eq!(
            vector.get("avg_floor").and_then(FeatureValue::as_number),
            Some(0.0)
        );
        assert_eq!(
            vector.get("is_high_floor").and_then(FeatureValue::as_number),
            Some(0.0)
        );
    }

    #[test]
    fn size_category_buckets_by_area() {
        let mut attrs = condo_request();
        for (area, expected) in [(65.0, 0.0), (90.0, 1.0), (120.0, 2.0)] {
            attrs.area_sqm = area;
            let vector = build_feature_vector(&required_names(), &attrs).expect("vector builds");
            assert_eq!(
                vector.get("size_category").and_then(FeatureValue::as_number),
                Some(expected),
                "area {area}"
            );
        }
    }

    #[test]
    fn log_area_is_the_natural_log() {
        let attrs = condo_request();
        let vector = build_feature_vector(&required_names(), &attrs).expect("vector builds");
        let log_area = vector
            .get("log_area")
            .and_then(FeatureValue::as_number)
            .expect("numeric log_area");
        assert!((log_area - 90.0_f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn non_positive_area_substitutes_the_default_floor_area() {
        // Keeps log_area out of ln(0) territory and gives the heuristic
        // a workable base instead of a zero estimate.
        let mut attrs = condo_request();
        attrs.area_sqm = 0.0;
        let vector = build_feature_vector(&required_names(), &attrs).expect("vector builds");
        let log_area = vector
            .get("log_area")
            .and_then(FeatureValue::as_number)
            .expect("numeric log_area");
        assert!((log_area - 100.0_f64.ln()).abs() < 1e-12);
        assert_eq!(heuristic_estimate(&attrs), 100.0 * 25_000.0 * 1.1);
    }

    #[test]
    fn unknown_required_names_default_to_zero() {
        let required = vec!["area_sqm".to_string(), "mystery_signal".to_string()];
        let vector = build_feature_vector(&required, &condo_request()).expect("vector builds");
        assert_eq!(
            vector.get("mystery_signal").and_then(FeatureValue::as_number),
            Some(0.0)
        );
    }

    #[test]
    fn heuristic_matches_the_documented_scenario() {
        // Tier A district, condominium, leasehold, floor 16-20 → 18 → ×1.1.
        let estimate = heuristic_estimate(&condo_request());
        assert_eq!(estimate, 90.0 * 25_000.0 * 1.1);
    }

    #[test]
    fn heuristic_semi_detached_freehold_mid_floor() {
        let attrs = PropertyAttributes {
            property_type: "Semi-Detached House".to_string(),
            area_sqm: 100.0,
            zone: Some(5),
            tenure: Some("FREEHOLD".to_string()),
            ..PropertyAttributes::default()
        };
        // Tier B base, 1.3 type factor, 1.2 freehold, default floor 5.
        let estimate = heuristic_estimate(&attrs);
        assert!((estimate - 100.0 * 18_000.0 * 1.3 * 1.2).abs() < 1e-6);
    }

    #[test]
    fn heuristic_missing_district_takes_the_tier_a_sentinel() {
        // An absent district substitutes 10, which sits inside tier A.
        let mut attrs = condo_request();
        attrs.zone = None;
        attrs.floor_level = None;
        assert_eq!(heuristic_estimate(&attrs), 90.0 * 25_000.0);
    }

    #[test]
    fn heuristic_unlisted_district_is_tier_c() {
        let mut attrs = condo_request();
        attrs.zone = Some(20);
        attrs.floor_level = None;
        assert_eq!(heuristic_estimate(&attrs), 90.0 * 12_000.0);
    }

    #[test]
    fn no_model_means_heuristic_fallback() {
        let pipeline = PrivateValuationPipeline::new(None);
        let result = pipeline.valuate(&condo_request()).expect("valuation");
        assert_eq!(result.calculation_method, CalculationMethod::HeuristicFallback);
        assert_eq!(
            result.features_used,
            vec!["area_sqm", "district", "property_type", "tenure", "floor_level"]
        );
        assert!(result.correction_details.is_none());
    }

    #[test]
    fn loaded_model_reports_its_full_feature_list() {
        let names: Vec<String> = vec!["area_sqm".to_string(), "district".to_string()];
        let pipeline = PrivateValuationPipeline::new(Some(Arc::new(FixedModel {
            value: 1_500_000.0,
            names: Some(names.clone()),
        })));
        let result = pipeline.valuate(&condo_request()).expect("valuation");
        assert_eq!(result.calculation_method, CalculationMethod::ModelInference);
        assert_eq!(result.features_used, names);
        assert_eq!(result.estimated_value, 1_500_000.0);
    }

    #[test]
    fn undeclared_names_fall_back_to_the_default_schema() {
        let pipeline = PrivateValuationPipeline::new(Some(Arc::new(FixedModel {
            value: 2_000_000.0,
            names: None,
        })));
        let result = pipeline.valuate(&condo_request()).expect("valuation");
        assert_eq!(result.features_used.len(), DEFAULT_FEATURE_NAMES.len());
        assert_eq!(result.features_used[0], "district");
    }

    #[test]
    fn inference_failure_falls_through_to_the_heuristic() {
        let pipeline = PrivateValuationPipeline::new(Some(Arc::new(FailingModel)));
        let result = pipeline.valuate(&condo_request()).expect("valuation");
        assert_eq!(result.calculation_method, CalculationMethod::HeuristicFallback);
        assert_eq!(result.estimated_value, round2(90.0 * 25_000.0 * 1.1));
    }

    #[test]
    fn confidence_band_brackets_the_estimate() {
        let pipeline = PrivateValuationPipeline::new(None);
        let result = pipeline.valuate(&condo_request()).expect("valuation");
        let estimate = 90.0 * 25_000.0 * 1.1;
        assert_eq!(result.confidence_range.low, round2(estimate * 0.9));
        assert_eq!(result.confidence_range.high, round2(estimate * 1.1));
        assert_eq!(result.comparable_properties.len(), 3);
    }
}
