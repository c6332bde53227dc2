//! Scheduler configuration
//!
//! Loaded from JSON so a game can tune it alongside its other data files.
//! Every field has a default, so `{}` is a valid document.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Default cap on routine advances within a single resume.
pub const DEFAULT_STEP_BUDGET: usize = 10_000;

/// Tunables shared by tasks, managers and time contexts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Max routine advances per `resume()` before the chain is torn down.
    pub step_budget: usize,
    /// Initial time dilation applied by `wait_seconds`.
    pub time_scale: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            step_budget: DEFAULT_STEP_BUDGET,
            time_scale: 1.0,
        }
    }
}

impl SchedulerConfig {
    /// Parse and validate a JSON document.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the scheduler cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.step_budget == 0 {
            return Err(ConfigError::Invalid {
                field: "step_budget",
                reason: "must be at least 1".to_string(),
            });
        }
        if !self.time_scale.is_finite() || self.time_scale < 0.0 {
            return Err(ConfigError::Invalid {
                field: "time_scale",
                reason: format!("must be a finite, non-negative number (got {})", self.time_scale),
            });
        }
        Ok(())
    }
}
