//! Automatically retried transactions.
//!
//! A unit of work runs inside a fresh transaction. When the commit (or
//! the work itself) fails with an optimistic-concurrency conflict, the
//! whole unit is replayed from a new transaction after a back-off, up to
//! the policy's limit.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::ExecutionContext;
use crate::storage::ContentStore;
use crate::{Error, Result};
use super::TxMode;

/// Limits for retrying conflicted transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Replays allowed after the first attempt.
    pub max_retries: u32,
    pub min_wait_ms: u64,
    pub max_wait_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 20, min_wait_ms: 100, max_wait_ms: 2000 }
    }
}

impl RetryPolicy {
    /// No waiting between attempts.
    pub fn immediate(max_retries: u32) -> Self {
        Self { max_retries, min_wait_ms: 0, max_wait_ms: 0 }
    }

    /// Doubling back-off before replay number `retry` (1-based), capped.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u64.checked_shl(retry.saturating_sub(1)).unwrap_or(u64::MAX);
        let wait = self.min_wait_ms.saturating_mul(factor).min(self.max_wait_ms);
        Duration::from_millis(wait)
    }
}

/// Work that must run atomically against one store.
#[async_trait]
pub trait TransactionalWork<S: ContentStore>: Send {
    type Output: Send;

    /// Run once inside `tx`. May be called again after a conflict, so it
    /// must re-read whatever it depends on.
    async fn run(&mut self, store: &S, tx: &mut S::Tx) -> Result<Self::Output>;
}

/// Runs `TransactionalWork` with commit, rollback and replay.
#[derive(Debug, Clone, Copy)]
pub struct RetryingTransaction<'a> {
    policy: &'a RetryPolicy,
    mode: TxMode,
}

impl<'a> RetryingTransaction<'a> {
    pub fn new(policy: &'a RetryPolicy, mode: TxMode) -> Self {
        Self { policy, mode }
    }

    pub async fn run<S, W>(&self, store: &S, ctx: &ExecutionContext, work: &mut W) -> Result<W::Output>
    where
        S: ContentStore,
        W: TransactionalWork<S>,
    {
        let mut attempt: u32 = 1;
        loop {
            let mut tx = store.begin_tx(self.mode, ctx.identity()).await?;
            let result = match work.run(store, &mut tx).await {
                Ok(output) => store.commit_tx(tx).await.map(|()| output),
                Err(e) => {
                    if let Err(rollback) = store.rollback_tx(tx).await {
                        tracing::error!(error = %rollback, "rollback failed");
                    }
                    Err(e)
                }
            };

            match result {
                Ok(output) => return Ok(output),
                Err(e) if e.is_retryable() => {
                    if attempt > self.policy.max_retries {
                        tracing::error!(attempts = attempt, error = %e, "transaction retries exhausted");
                        return Err(Error::RetriesExhausted { attempts: attempt, last: Box::new(e) });
                    }
                    let wait = self.policy.backoff(attempt);
                    tracing::debug!(attempt, wait_ms = wait.as_millis() as u64, error = %e, "retrying transaction");
                    if !wait.is_zero() {
                        tokio::time::sleep(wait).await;
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
