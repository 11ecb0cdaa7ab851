//! Fixed-backoff retry around backend calls
//!
//! Queries are retried on transport failures and 5xx responses. Mutations
//! and actions are retried only when the connection was refused.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use super::{BackendClient, BackendResult, FunctionKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn from_config(config: &cn_config::BackendConfig) -> Self {
        Self::new(config.max_attempts, config.retry_backoff())
    }

    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }
}

/// [`BackendClient`] decorator that repeats retryable failures
pub struct Retrying<C> {
    inner: C,
    policy: RetryPolicy,
}

impl<C: BackendClient> Retrying<C> {
    pub fn new(inner: C, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl<C: BackendClient> BackendClient for Retrying<C> {
    async fn call(&self, kind: FunctionKind, path: &str, args: Value) -> BackendResult<Value> {
        let mut attempt = 1;
        loop {
            match self.inner.call(kind, path, args.clone()).await {
                Err(e) if e.is_retryable_for(kind) && attempt < self.policy.max_attempts => {
                    warn!(
                        path,
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        error = %e,
                        "Backend call failed, retrying"
                    );
                    attempt += 1;
                    tokio::time::sleep(self.policy.backoff).await;
                }
                result => return result,
            }
        }
    }
}
