//! Extractor configuration.

use serde::{Deserialize, Serialize};

use crate::directives::DEFAULT_SEPARATORS;
use crate::tx::RetryPolicy;
use crate::{Error, Result};

/// Settings for the pipeline and its worker.
///
/// Every field has a default, so `{}` is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Keys starting with this prefix are directives, never properties.
    pub reserved_prefix: String,
    /// Separators for string tagging when the document names none.
    pub default_separators: Vec<String>,
    pub retry: RetryPolicy,
    /// Pending extractions the worker queue holds before `submit` waits.
    pub queue_capacity: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            reserved_prefix: "sys:".into(),
            default_separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
            retry: RetryPolicy::default(),
            queue_capacity: 64,
        }
    }
}

impl ExtractorConfig {
    /// Load from a JSON object. Missing fields take their defaults.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let decoded: serde_json::Value =
            serde_json::from_str(s).map_err(|e| Error::Config(e.to_string()))?;
        if !decoded.is_object() {
            return Err(Error::Config(format!("expected a JSON object, got {decoded}")));
        }
        let config: Self = serde_json::from_value(decoded).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.reserved_prefix.is_empty() {
            return Err(Error::Config("reserved_prefix must not be empty".into()));
        }
        if self.queue_capacity == 0 {
            return Err(Error::Config("queue_capacity must be at least 1".into()));
        }
        if self.retry.min_wait_ms > self.retry.max_wait_ms {
            return Err(Error::Config("retry.min_wait_ms exceeds retry.max_wait_ms".into()));
        }
        Ok(())
    }
}
