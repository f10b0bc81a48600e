//! Filesystem artifact store

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info};

use super::serializer::{ModelEnvelope, ModelMetadata};
use crate::error::{Result, TrainerError};
use crate::training::{Classifier, ModelVariant, TrainedModel};

pub const LOGISTIC_MODEL_FILE: &str = "logistic_model.bin";
pub const XGB_MODEL_FILE: &str = "xgb_model.bin";
pub const METADATA_FILE: &str = "metadata.json";

/// Paths of one published model set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedArtifacts {
    pub logistic: PathBuf,
    pub xgb: PathBuf,
    pub metadata: PathBuf,
}

/// Writes and reads the model files and metadata in one directory
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn model_path(&self, variant: ModelVariant) -> PathBuf {
        match variant {
            ModelVariant::Logistic => self.dir.join(LOGISTIC_MODEL_FILE),
            ModelVariant::GradientBoosted => self.dir.join(XGB_MODEL_FILE),
        }
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.dir.join(METADATA_FILE)
    }

    /// Stage all three artifacts, then rename them into place.
    ///
    /// Nothing is published unless every staging write succeeds. A failure
    /// between two renames can leave a mix of new and previous files.
    pub fn publish(
        &self,
        logistic: &TrainedModel,
        gradient_boosted: &TrainedModel,
        metadata: &ModelMetadata,
    ) -> Result<PublishedArtifacts> {
        if logistic.variant() != ModelVariant::Logistic
            || gradient_boosted.variant() != ModelVariant::GradientBoosted
        {
            return Err(TrainerError::ArtifactWrite(format!(
                "expected logistic and xgb models, got {} and {}",
                logistic.variant(),
                gradient_boosted.variant()
            )));
        }

        fs::create_dir_all(&self.dir).map_err(|e| {
            TrainerError::ArtifactWrite(format!(
                "cannot create output directory {}: {}",
                self.dir.display(),
                e
            ))
        })?;

        let logistic_bytes = envelope_bytes(logistic, metadata)?;
        let xgb_bytes = envelope_bytes(gradient_boosted, metadata)?;
        let metadata_json = metadata
            .to_json()
            .map_err(|e| TrainerError::ArtifactWrite(format!("cannot encode metadata: {}", e)))?;

        let targets = PublishedArtifacts {
            logistic: self.model_path(ModelVariant::Logistic),
            xgb: self.model_path(ModelVariant::GradientBoosted),
            metadata: self.metadata_path(),
        };

        // staged files are removed on drop if a later step fails
        let staged = vec![
            (self.stage(&logistic_bytes)?, &targets.logistic),
            (self.stage(&xgb_bytes)?, &targets.xgb),
            (self.stage(metadata_json.as_bytes())?, &targets.metadata),
        ];

        for (file, target) in staged {
            file.persist(target).map_err(|e| {
                TrainerError::ArtifactWrite(format!("cannot publish {}: {}", target.display(), e.error))
            })?;
            debug!(path = %target.display(), "Artifact published");
        }

        info!(dir = %self.dir.display(), version = %metadata.version, "Artifacts written");
        Ok(targets)
    }

    fn stage(&self, bytes: &[u8]) -> Result<NamedTempFile> {
        let write = || -> std::io::Result<NamedTempFile> {
            let mut file = NamedTempFile::new_in(&self.dir)?;
            file.write_all(bytes)?;
            file.as_file().sync_all()?;
            Ok(file)
        };
        write().map_err(|e| {
            TrainerError::ArtifactWrite(format!(
                "cannot stage artifact in {}: {}",
                self.dir.display(),
                e
            ))
        })
    }

    pub fn load_metadata(&self) -> Result<ModelMetadata> {
        let json = fs::read_to_string(self.metadata_path())?;
        ModelMetadata::from_json(&json)
    }

    pub fn load_envelope(&self, variant: ModelVariant) -> Result<ModelEnvelope> {
        let bytes = fs::read(self.model_path(variant))?;
        let envelope = ModelEnvelope::from_bytes(&bytes)?;
        if envelope.variant != variant {
            return Err(TrainerError::Schema(format!(
                "{} holds a {} model",
                self.model_path(variant).display(),
                envelope.variant
            )));
        }
        Ok(envelope)
    }

    pub fn load_model(&self, variant: ModelVariant) -> Result<TrainedModel> {
        self.load_envelope(variant)?.into_model()
    }
}

fn envelope_bytes(model: &TrainedModel, metadata: &ModelMetadata) -> Result<Vec<u8>> {
    ModelEnvelope::wrap(model, metadata)
        .and_then(|envelope| envelope.to_bytes())
        .map_err(|e| TrainerError::ArtifactWrite(format!("cannot encode {} model: {}", model.variant(), e)))
}
