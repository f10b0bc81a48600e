//! Model envelopes and run metadata

use serde::{Deserialize, Serialize};

use super::versioning::ModelVersion;
use crate::error::{Result, TrainerError};
use crate::evaluation::EvaluationMetrics;
use crate::preprocessing::FeatureSet;
use crate::training::{Classifier, ModelVariant, TrainedModel};

/// Metadata record written next to the model files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub version: String,
    pub features: Vec<String>,
    pub auc_logistic: f64,
    pub auc_xgb: f64,
    pub auc_ensemble: f64,
}

impl ModelMetadata {
    pub fn new(version: impl Into<String>, features: &FeatureSet, metrics: &EvaluationMetrics) -> Result<Self> {
        let metadata = Self {
            version: version.into(),
            features: features.to_vec(),
            auc_logistic: metrics.auc_logistic,
            auc_xgb: metrics.auc_xgb,
            auc_ensemble: metrics.auc_ensemble,
        };
        metadata.model_version()?;
        Ok(metadata)
    }

    /// Parsed form of `version`
    pub fn model_version(&self) -> Result<ModelVersion> {
        ModelVersion::parse(&self.version)
    }

    /// Reject a feature list that differs from the training one in names or order
    pub fn ensure_compatible(&self, features: &[String]) -> Result<()> {
        if self.features.as_slice() == features {
            return Ok(());
        }

        let missing: Vec<&str> = self
            .features
            .iter()
            .filter(|f| !features.contains(f))
            .map(String::as_str)
            .collect();
        let unexpected: Vec<&str> = features
            .iter()
            .filter(|f| !self.features.contains(f))
            .map(String::as_str)
            .collect();

        let detail = if missing.is_empty() && unexpected.is_empty() {
            "same columns in a different order".to_string()
        } else {
            format!("missing {:?}, unexpected {:?}", missing, unexpected)
        };
        Err(TrainerError::Schema(format!(
            "feature list does not match model {}: {}",
            self.version, detail
        )))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let metadata: Self = serde_json::from_str(json)?;
        metadata.model_version()?;
        Ok(metadata)
    }
}

/// Self-describing binary wrapper around one fitted model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEnvelope {
    /// Magic bytes for format detection
    pub magic: [u8; 4],
    pub format_version: u32,
    pub variant: ModelVariant,
    /// Version of the model set this file belongs to
    pub schema_version: String,
    /// Column order the model expects
    pub features: Vec<String>,
    /// bincode-encoded `TrainedModel`
    pub payload: Vec<u8>,
    pub checksum: u64,
}

impl ModelEnvelope {
    pub const MAGIC: [u8; 4] = *b"OTRM";
    pub const FORMAT_VERSION: u32 = 1;

    pub fn wrap(model: &TrainedModel, metadata: &ModelMetadata) -> Result<Self> {
        let payload = bincode::serialize(model)?;
        let checksum = compute_checksum(&payload);
        Ok(Self {
            magic: Self::MAGIC,
            format_version: Self::FORMAT_VERSION,
            variant: model.variant(),
            schema_version: metadata.version.clone(),
            features: metadata.features.clone(),
            payload,
            checksum,
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode and verify magic, format version and checksum
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let envelope: Self = bincode::deserialize(data)?;
        if envelope.magic != Self::MAGIC {
            return Err(TrainerError::Serialization(
                "not a model file (bad magic bytes)".to_string(),
            ));
        }
        if envelope.format_version != Self::FORMAT_VERSION {
            return Err(TrainerError::Serialization(format!(
                "unsupported model format version {}",
                envelope.format_version
            )));
        }
        if !envelope.verify_checksum() {
            return Err(TrainerError::Serialization("model checksum mismatch".to_string()));
        }
        Ok(envelope)
    }

    pub fn verify_checksum(&self) -> bool {
        compute_checksum(&self.payload) == self.checksum
    }

    /// Decode the wrapped model
    pub fn into_model(self) -> Result<TrainedModel> {
        let model: TrainedModel = bincode::deserialize(&self.payload)?;
        if model.variant() != self.variant {
            return Err(TrainerError::Serialization(format!(
                "envelope says {} but payload holds {}",
                self.variant,
                model.variant()
            )));
        }
        Ok(model)
    }
}

/// FNV-1a
fn compute_checksum(data: &[u8]) -> u64 {
    const FNV_OFFSET: u64 = 14695981039346656037;
    const FNV_PRIME: u64 = 1099511628211;

    data.iter().fold(FNV_OFFSET, |hash, &byte| {
        (hash ^ byte as u64).wrapping_mul(FNV_PRIME)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::ClassificationReport;
    use crate::training::{LogisticConfig, ModelConfig};
    use ndarray::array;

    fn metrics() -> EvaluationMetrics {
        EvaluationMetrics {
            auc_logistic: 0.81,
            auc_xgb: 0.84,
            auc_ensemble: 0.86,
            report: ClassificationReport::compute(&[0, 1], &[0.2, 0.9], 0.5).unwrap(),
        }
    }

    fn metadata() -> ModelMetadata {
        let features = FeatureSet::new(vec!["attendance".into(), "avg_score".into()]);
        ModelMetadata::new("v1.0.0", &features, &metrics()).unwrap()
    }

    fn fitted_logistic() -> TrainedModel {
        let mut model = ModelConfig::Logistic(LogisticConfig::default()).build();
        let x = array![[0.0, 1.0], [1.0, 0.0], [3.0, 4.0], [4.0, 3.0]];
        model.fit(&x, &array![0.0, 0.0, 1.0, 1.0]).unwrap();
        model
    }

    #[test]
    fn test_metadata_json_has_exactly_five_fields() {
        let json = metadata().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.len(), 5);
        for key in ["version", "features", "auc_logistic", "auc_xgb", "auc_ensemble"] {
            assert!(obj.contains_key(key), "missing {}", key);
        }
    }

    #[test]
    fn test_metadata_rejects_bad_version() {
        let features = FeatureSet::new(vec!["a".into()]);
        assert!(ModelMetadata::new("latest", &features, &metrics()).is_err());
    }

    #[test]
    fn test_ensure_compatible() {
        let meta = metadata();
        assert!(meta
            .ensure_compatible(&["attendance".to_string(), "avg_score".to_string()])
            .is_ok());

        let reordered = meta
            .ensure_compatible(&["avg_score".to_string(), "attendance".to_string()])
            .unwrap_err();
        assert!(matches!(reordered, TrainerError::Schema(ref m) if m.contains("different order")));

        let missing = meta.ensure_compatible(&["attendance".to_string()]).unwrap_err();
        assert!(matches!(missing, TrainerError::Schema(ref m) if m.contains("avg_score")));
    }

    #[test]
    fn test_envelope_restores_predictions() {
        let model = fitted_logistic();
        let bytes = ModelEnvelope::wrap(&model, &metadata()).unwrap().to_bytes().unwrap();

        let envelope = ModelEnvelope::from_bytes(&bytes).unwrap();
        assert_eq!(envelope.variant, ModelVariant::Logistic);
        assert_eq!(envelope.features, metadata().features);

        let restored = envelope.into_model().unwrap();
        let x = array![[2.0, 2.0], [0.5, 0.5]];
        assert_eq!(model.predict_proba(&x).unwrap(), restored.predict_proba(&x).unwrap());
    }

    #[test]
    fn test_corrupted_payload_detected() {
        let mut envelope = ModelEnvelope::wrap(&fitted_logistic(), &metadata()).unwrap();
        envelope.payload[0] ^= 0xFF;
        let bytes = envelope.to_bytes().unwrap();
        assert!(matches!(
            ModelEnvelope::from_bytes(&bytes),
            Err(TrainerError::Serialization(_))
        ));
    }

    #[test]
    fn test_checksum_is_fnv1a() {
        assert_eq!(compute_checksum(b""), 14695981039346656037);
        assert_eq!(compute_checksum(b"a"), 0xaf63dc4c8601ec8c);
    }
}
