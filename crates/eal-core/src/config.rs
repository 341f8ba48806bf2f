//! Engine configuration (`eal.toml`)
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when loading a configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config value for '{field}': {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Execution limits.
    pub limits: Limits,

    /// Advisory error predictor.
    pub predictor: PredictorConfig,

    /// Suggestion engine.
    pub suggestions: SuggestionConfig,

    /// Execution trace handling.
    pub trace: TraceConfig,
}

/// Upper bound for `limits.max_call_depth`; calls nest on the host stack.
pub const MAX_CALL_DEPTH: usize = 512;

/// Budgets enforced by the virtual machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Limits {
    /// Maximum number of statements executed per request, counting loop
    /// iterations and function bodies.
    pub max_steps: u64,

    /// Maximum `call` nesting depth, at most [`MAX_CALL_DEPTH`].
    pub max_call_depth: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_steps: 1_000_000,
            max_call_depth: 256,
        }
    }
}

/// Weights of the linear line-shape predictor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PredictorConfig {
    pub enabled: bool,
    pub length_weight: f64,
    pub space_weight: f64,
    pub equals_weight: f64,
    pub bias: f64,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            length_weight: 0.02,
            space_weight: -0.3,
            equals_weight: 0.6,
            bias: -0.5,
        }
    }
}

/// Suggestion engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SuggestionConfig {
    pub enabled: bool,

    /// Upper bound on the number of suggestions attached to a response.
    pub max_suggestions: usize,
}

impl Default for SuggestionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_suggestions: 5,
        }
    }
}

/// Execution trace settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TraceConfig {
    /// Attach the trace to the boundary response.
    pub include_in_response: bool,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            include_in_response: true,
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.max_steps == 0 {
            return Err(ConfigError::Invalid {
                field: "limits.max_steps",
                reason: "must be greater than zero",
            });
        }
        if self.limits.max_call_depth == 0 {
            return Err(ConfigError::Invalid {
                field: "limits.max_call_depth",
                reason: "must be greater than zero",
            });
        }
        if self.limits.max_call_depth > MAX_CALL_DEPTH {
            return Err(ConfigError::Invalid {
                field: "limits.max_call_depth",
                reason: "must not exceed 512; calls nest on the host thread stack",
            });
        }
        let weights = [
            self.predictor.length_weight,
            self.predictor.space_weight,
            self.predictor.equals_weight,
            self.predictor.bias,
        ];
        if weights.iter().any(|w| !w.is_finite()) {
            return Err(ConfigError::Invalid {
                field: "predictor",
                reason: "weights must be finite numbers",
            });
        }
        Ok(())
    }
}
