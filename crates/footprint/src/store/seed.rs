//! Read-only demo snapshot served under the reserved tag.

use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};

/// Tag under which the demo snapshot is always listed.
pub const DEMO_TAG: &str = "DEMO";

/// Snapshot compiled into the binary, used when no seed path is configured.
const BUNDLED_SEED: &str = include_str!("../../data/demo.json");

/// The demo snapshot, loaded once when the store is opened.
#[derive(Debug, Clone, PartialEq)]
pub struct DemoSeed {
    payload: Value,
}

impl DemoSeed {
    /// The seed bundled with the crate.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SeedLoad`] if the bundled file is not valid JSON.
    pub fn bundled() -> Result<Self> {
        let payload = serde_json::from_str(BUNDLED_SEED).map_err(|e| Error::SeedLoad {
            path: "<bundled>".into(),
            message: e.to_string(),
        })?;
        Ok(Self { payload })
    }

    /// Load a seed from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SeedLoad`] if the file can't be read or parsed, or
    /// if it holds `null`.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let seed_err = |message: String| Error::SeedLoad {
            path: path.to_path_buf(),
            message,
        };

        debug!("Loading demo seed from {}", path.display());
        let raw = std::fs::read_to_string(path).map_err(|e| seed_err(e.to_string()))?;
        let payload: Value = serde_json::from_str(&raw).map_err(|e| seed_err(e.to_string()))?;
        if payload.is_null() {
            return Err(seed_err("seed is null".to_string()));
        }
        Ok(Self { payload })
    }

    /// Wrap an in-memory payload.
    #[must_use]
    pub fn from_value(payload: Value) -> Self {
        Self { payload }
    }

    /// The seed payload.
    #[must_use]
    pub fn payload(&self) -> &Value {
        &self.payload
    }
}
