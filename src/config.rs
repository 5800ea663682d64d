//! Pipeline and batch configuration
//!
//! Both configurations have sensible defaults and can be persisted as JSON.

use crate::error::IntervalError;
use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Default inactivity timeout for file interaction intervals
pub const DEFAULT_FILE_INTERACTION_TIMEOUT_SECS: i64 = 16;

/// Default inactivity timeout for user activity intervals
pub const DEFAULT_ACTIVITY_TIMEOUT_SECS: i64 = 16;

/// Default number of concurrently processed archives
pub const DEFAULT_WORKERS: usize = 4;

/// Default number of simultaneously open output archives
pub const DEFAULT_CACHE_CAPACITY: usize = 16;

/// Settings of a single pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Gap after which an open file interaction is considered abandoned
    pub file_interaction_timeout_secs: i64,
    /// Gap after which an open user activity span ends
    pub activity_timeout_secs: i64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            file_interaction_timeout_secs: DEFAULT_FILE_INTERACTION_TIMEOUT_SECS,
            activity_timeout_secs: DEFAULT_ACTIVITY_TIMEOUT_SECS,
        }
    }
}

impl PipelineConfig {
    pub fn file_interaction_timeout(&self) -> Duration {
        Duration::seconds(self.file_interaction_timeout_secs)
    }

    pub fn activity_timeout(&self) -> Duration {
        Duration::seconds(self.activity_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), IntervalError> {
        if self.file_interaction_timeout_secs <= 0 || self.activity_timeout_secs <= 0 {
            return Err(IntervalError::InvalidConfig(
                "timeouts must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Key under which intervals of one archive are grouped in the output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
    /// One output folder per input archive (user)
    #[default]
    User,
    /// One output folder per project; intervals without a project go to `unknown`
    Project,
}

/// Settings of a multi-archive batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub workers: usize,
    pub cache_capacity: usize,
    pub group_by: GroupBy,
    pub pipeline: PipelineConfig,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            group_by: GroupBy::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl BatchConfig {
    pub fn from_json(json: &str) -> Result<Self, IntervalError> {
        let config: BatchConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, IntervalError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), IntervalError> {
        if self.workers == 0 {
            return Err(IntervalError::InvalidConfig(
                "at least one worker is required".to_string(),
            ));
        }
        if self.cache_capacity == 0 {
            return Err(IntervalError::InvalidCapacity(self.cache_capacity));
        }
        self.pipeline.validate()
    }
}
