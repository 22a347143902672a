//! Detector configuration.

use serde::{Deserialize, Serialize};

use crate::error::{DetectorError, DetectorResult};

/// Analysis scheduling knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Minimum gap between two analyses of the same pair.
    pub min_analysis_interval_ms: u64,
    /// Settle window between a triggering market event and the analysis
    /// run. New triggers inside the window restart it.
    pub debounce_ms: u64,
    /// Execution-time estimate stamped on detected opportunities.
    pub estimated_execution_time_ms: u64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_analysis_interval_ms: 500,
            debounce_ms: 200,
            estimated_execution_time_ms: 3_000,
        }
    }
}

impl DetectorConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> DetectorResult<()> {
        if self.debounce_ms > self.min_analysis_interval_ms {
            return Err(DetectorError::Config(format!(
                "debounce_ms ({}) must not exceed min_analysis_interval_ms ({})",
                self.debounce_ms, self.min_analysis_interval_ms
            )));
        }
        Ok(())
    }
}
