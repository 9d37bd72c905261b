//! Execution context: the identity a run acts as and its retry limits.
//!
//! Passed explicitly into the pipeline rather than held in ambient state.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::tx::RetryPolicy;

/// Identity a unit of work executes as.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunAs {
    /// Elevated system identity, bypassing user permissions.
    System,
    User(String),
}

impl RunAs {
    pub fn name(&self) -> &str {
        match self {
            RunAs::System => "System",
            RunAs::User(name) => name,
        }
    }
}

impl fmt::Display for RunAs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionContext {
    identity: RunAs,
    retry: RetryPolicy,
}

impl ExecutionContext {
    pub fn new(identity: RunAs, retry: RetryPolicy) -> Self {
        Self { identity, retry }
    }

    /// Run as the system identity with the default retry policy.
    pub fn system() -> Self {
        Self::new(RunAs::System, RetryPolicy::default())
    }

    pub fn as_user(name: impl Into<String>) -> Self {
        Self::new(RunAs::User(name.into()), RetryPolicy::default())
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn identity(&self) -> &RunAs {
        &self.identity
    }

    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }
}
