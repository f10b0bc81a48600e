//! Semantic version of a published model set

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrainerError};

/// Semantic version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ModelVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ModelVersion {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }

    /// Parse `1.2.3` or `v1.2.3`
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);

        let parts: Vec<&str> = digits.split('.').collect();
        if parts.len() != 3 {
            return Err(TrainerError::Configuration(format!(
                "Invalid version format: {:?} (expected MAJOR.MINOR.PATCH)",
                s
            )));
        }

        let component = |name: &str, raw: &str| -> Result<u32> {
            raw.parse().map_err(|_| {
                TrainerError::Configuration(format!("Invalid {} version: {:?}", name, raw))
            })
        };

        Ok(Self {
            major: component("major", parts[0])?,
            minor: component("minor", parts[1])?,
            patch: component("patch", parts[2])?,
        })
    }
}

impl std::fmt::Display for ModelVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl Default for ModelVersion {
    fn default() -> Self {
        Self::new(1, 0, 0)
    }
}
