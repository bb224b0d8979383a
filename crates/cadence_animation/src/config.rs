//! Engine configuration
//!
//! Loaded from TOML (`cadence.toml` by convention):
//!
//! ```toml
//! isolate_panics = true
//!
//! [pulse]
//! min_interval_ms = 16.0
//! ```

use crate::error::{AnimationError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Top-level engine configuration
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub pulse: PulseConfig,
    /// Catch panics from progress callbacks and warps instead of re-raising
    /// them once the tick has finished its bookkeeping
    #[serde(default = "default_true")]
    pub isolate_panics: bool,
}

/// Timing pulse configuration
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct PulseConfig {
    /// Minimum spacing between consecutive pulses
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: f64,
}

/// Longest pulse interval accepted, one minute
pub const MAX_MIN_INTERVAL_MS: f64 = 60_000.0;

fn default_true() -> bool {
    true
}

fn default_min_interval_ms() -> f64 {
    16.0
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pulse: PulseConfig::default(),
            isolate_panics: default_true(),
        }
    }
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: default_min_interval_ms(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let source = fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<()> {
        self.pulse.validate()
    }
}

impl PulseConfig {
    pub fn validate(&self) -> Result<()> {
        validate_interval(self.min_interval_ms)
    }
}

/// Accepts intervals in `(0, MAX_MIN_INTERVAL_MS]`
pub(crate) fn validate_interval(min_interval_ms: f64) -> Result<()> {
    if !min_interval_ms.is_finite() || min_interval_ms <= 0.0 {
        return Err(AnimationError::InvalidArgument(format!(
            "pulse.min_interval_ms must be a positive number, got {min_interval_ms}"
        )));
    }
    if min_interval_ms > MAX_MIN_INTERVAL_MS {
        return Err(AnimationError::InvalidArgument(format!(
            "pulse.min_interval_ms must be at most {MAX_MIN_INTERVAL_MS}, got {min_interval_ms}"
        )));
    }
    Ok(())
}
