//! Model store: loads per-domain artifacts and lookup tables from disk
//! once at startup. Every file is optional; absence or a malformed file
//! is logged and the corresponding slot stays empty.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::ModelPathsConfig;
use crate::engine::hdb::{CorrectionTable, HdbFeatureLists, TownToRegion};
use crate::engine::vector::{FeatureValue, FeatureVector, InferenceError, InferenceModel};
use crate::engine::{HdbValuationPipeline, PrivateValuationPipeline};

const HDB_MODEL_FILE: &str = "hdb_model.json";
const HDB_FEATURE_LISTS_FILE: &str = "hdb_feature_lists.json";
const CORRECTION_FACTORS_FILE: &str = "correction_factors.json";
const TOWN_TO_REGION_FILE: &str = "town_to_region.json";
const PRIVATE_MODEL_FILE: &str = "private_model.json";

/// Linear scoring artifact exported to JSON: an intercept, a weight per
/// numeric feature, and an offset per categorical level. Levels unseen
/// during training are an inference error, matching encoder behavior in
/// the training stack, which is what drives the fallback path.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LinearModel {
    #[serde(default)]
    pub intercept: f64,
    #[serde(default)]
    pub weights: HashMap<String, f64>,
    #[serde(default)]
    pub offsets: HashMap<String, HashMap<String, f64>>,
    #[serde(default)]
    pub feature_names: Option<Vec<String>>,
}

impl InferenceModel for LinearModel {
    fn feature_names(&self) -> Option<Vec<String>> {
        self.feature_names.clone()
    }

    fn predict(&self, row: &FeatureVector) -> Result<f64, InferenceError> {
        let mut total = self.intercept;
        for (name, value) in row.iter() {
            match value {
                FeatureValue::Number(number) => {
                    if let Some(weight) = self.weights.get(name) {
                        total += weight * number;
                    }
                }
                FeatureValue::Text(level) => {
                    if let Some(levels) = self.offsets.get(name) {
                        match levels.get(level) {
                            Some(offset) => total += offset,
                            None => {
                                return Err(InferenceError::new(format!(
                                    "unknown level '{level}' for categorical feature '{name}'"
                                )))
                            }
                        }
                    }
                }
            }
        }
        if total.is_finite() {
            Ok(total)
        } else {
            Err(InferenceError::new("estimate is not finite"))
        }
    }
}

/// Loaded-dependency flags for the HDB pipeline health report.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct HdbHealth {
    pub hdb_model_loaded: bool,
    pub hdb_feature_lists_loaded: bool,
    pub correction_factors_loaded: bool,
    pub town_to_region_loaded: bool,
}

/// Loaded-dependency flags for the private pipeline health report.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PrivateHealth {
    pub private_model_loaded: bool,
    pub private_feature_names_loaded: bool,
}

/// Read-only collection of everything loaded at process start. Shared
/// across requests without coordination.
#[derive(Default)]
pub struct ModelStore {
    hdb_model: Option<Arc<dyn InferenceModel>>,
    hdb_feature_lists: Option<Arc<HdbFeatureLists>>,
    corrections: Option<Arc<CorrectionTable>>,
    town_to_region: Option<Arc<TownToRegion>>,
    private_model: Option<Arc<dyn InferenceModel>>,
}

impl ModelStore {
    /// A store with nothing loaded. The private pipeline still answers
    /// through its heuristic; the HDB pipeline reports a server fault.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn load(paths: &ModelPathsConfig) -> Self {
        let hdb_model: Option<LinearModel> = load_json(&paths.hdb_dir.join(HDB_MODEL_FILE), "HDB model");
        let hdb_feature_lists: Option<HdbFeatureLists> = load_json(
            &paths.hdb_dir.join(HDB_FEATURE_LISTS_FILE),
            "HDB feature lists",
        );
        let corrections: Option<CorrectionTable> = load_json(
            &paths.hdb_dir.join(CORRECTION_FACTORS_FILE),
            "correction factors",
        );
        let town_to_region: Option<TownToRegion> = load_json(
            &paths.hdb_dir.join(TOWN_TO_REGION_FILE),
            "town-to-region mapping",
        );
        let private_model: Option<LinearModel> = load_json(
            &paths.private_dir.join(PRIVATE_MODEL_FILE),
            "private property model",
        );

        Self {
            hdb_model: hdb_model.map(|model| Arc::new(model) as Arc<dyn InferenceModel>),
            hdb_feature_lists: hdb_feature_lists.map(Arc::new),
            corrections: corrections.map(Arc::new),
            town_to_region: town_to_region.map(Arc::new),
            private_model: private_model.map(|model| Arc::new(model) as Arc<dyn InferenceModel>),
        }
    }

    pub fn hdb_pipeline(&self) -> HdbValuationPipeline {
        HdbValuationPipeline::new(
            self.hdb_model.clone(),
            self.hdb_feature_lists.clone(),
            self.corrections.clone(),
            self.town_to_region.clone(),
        )
    }

    pub fn private_pipeline(&self) -> PrivateValuationPipeline {
        PrivateValuationPipeline::new(self.private_model.clone())
    }

    pub fn hdb_health(&self) -> HdbHealth {
        HdbHealth {
            hdb_model_loaded: self.hdb_model.is_some(),
            hdb_feature_lists_loaded: self.hdb_feature_lists.is_some(),
            correction_factors_loaded: self.corrections.is_some(),
            town_to_region_loaded: self.town_to_region.is_some(),
        }
    }

    pub fn private_health(&self) -> PrivateHealth {
        PrivateHealth {
            private_model_loaded: self.private_model.is_some(),
            // A loaded model always has a feature list: the one it
            // declares, or the built-in default schema.
            private_feature_names_loaded: self.private_model.is_some(),
        }
    }
}

fn load_json<T: DeserializeOwned>(path: &Path, what: &str) -> Option<T> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "{what} not available");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => {
            info!(path = %path.display(), "loaded {what}");
            Some(value)
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "{what} is malformed, skipping");
            None
        }
    }
}
