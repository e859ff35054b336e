//! Model-facing feature schema: ordered name/value pairs plus the
//! inference contract artifacts must satisfy.

use serde::Serialize;

/// A single derived feature, numeric or categorical.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Number(f64),
    Text(String),
}

impl FeatureValue {
    pub fn flag(set: bool) -> Self {
        FeatureValue::Number(if set { 1.0 } else { 0.0 })
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            FeatureValue::Number(value) => Some(*value),
            FeatureValue::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FeatureValue::Text(value) => Some(value),
            FeatureValue::Number(_) => None,
        }
    }
}

/// One inference row, ordered to match the artifact's declared schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureVector {
    entries: Vec<(String, FeatureValue)>,
}

impl FeatureVector {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, name: impl Into<String>, value: FeatureValue) {
        self.entries.push((name.into(), value));
    }

    pub fn get(&self, name: &str) -> Option<&FeatureValue> {
        self.entries
            .iter()
            .find(|(entry, _)| entry == name)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FeatureValue)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Required names for which no value was derived.
    pub fn missing_from(&self, required: &[String]) -> Vec<String> {
        required
            .iter()
            .filter(|name| self.get(name).is_none())
            .cloned()
            .collect()
    }
}

#[derive(Debug, thiserror::Error)]
#[error("inference failed: {reason}")]
pub struct InferenceError {
    pub reason: String,
}

impl InferenceError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// A pre-trained artifact capable of estimating a value from one feature
/// row. Absence of an artifact is a normal runtime state; pipelines hold
/// an `Option` of this trait object and decide the fallback policy.
pub trait InferenceModel: Send + Sync {
    /// The feature names the artifact was trained on, when it declares
    /// them. `None` means the caller supplies the domain default list.
    fn feature_names(&self) -> Option<Vec<String>>;

    /// Produce a single raw estimate for the row.
    fn predict(&self, row: &FeatureVector) -> Result<f64, InferenceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_preserves_insertion_order() {
        let mut vector = FeatureVector::with_capacity(2);
        vector.push("b", FeatureValue::Number(2.0));
        vector.push("a", FeatureValue::Text("x".to_string()));
        assert_eq!(vector.names(), vec!["b".to_string(), "a".to_string()]);
        assert_eq!(vector.get("a").and_then(FeatureValue::as_text), Some("x"));
        assert_eq!(vector.len(), 2);
    }

    #[test]
    fn missing_from_reports_underived_names() {
        let mut vector = FeatureVector::default();
        vector.push("area_sqm", FeatureValue::Number(90.0));
        let required = vec!["area_sqm".to_string(), "district".to_string()];
        assert_eq!(vector.missing_from(&required), vec!["district".to_string()]);
    }

    #[test]
    fn flag_encodes_booleans_as_numbers() {
        assert_eq!(FeatureValue::flag(true).as_number(), Some(1.0));
        assert_eq!(FeatureValue::flag(false).as_number(), Some(0.0));
    }
}
