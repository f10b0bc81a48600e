//! Ensemble methods module
//!
//! Soft voting over the probability outputs of the trained models.

mod voting;

pub use voting::Ensembler;
