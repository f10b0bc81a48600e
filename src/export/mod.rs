//! Model export module
//!
//! Binary model envelopes, the JSON metadata record and the directory
//! store that publishes them together.

mod serializer;
mod store;
mod versioning;

pub use serializer::{ModelEnvelope, ModelMetadata};
pub use store::{ArtifactStore, PublishedArtifacts, LOGISTIC_MODEL_FILE, METADATA_FILE, XGB_MODEL_FILE};
pub use versioning::ModelVersion;
