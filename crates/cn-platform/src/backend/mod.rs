//! Managed Backend Client
//!
//! Users, orders, meals and sessions are owned by the managed backend
//! (a Convex deployment). The platform reaches it through [`BackendClient`],
//! an opaque query/mutation/action RPC surface.

pub mod convex;
pub mod retry;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub use convex::ConvexHttpClient;
pub use retry::{RetryPolicy, Retrying};

/// Function paths called by the admin paths
pub mod functions {
    pub const INSERT_ADMIN_LOG: &str = "mutations/admin:insertAdminLog";
    pub const UPDATE_MEAL: &str = "mutations/meals:updateMeal";
    pub const GET_ORDER_BY_ID: &str = "queries/orders:getOrderById";
    pub const GET_ORDERS_WITH_REFUND_ELIGIBILITY: &str = "queries/orders:getOrdersWithRefundEligibility";
    pub const GET_REFUND_ELIGIBILITY_SUMMARY: &str = "queries/orders:getRefundEligibilitySummary";
    pub const UPDATE_REFUND_ELIGIBILITY: &str = "mutations/orders:updateRefundEligibility";
    pub const UPDATE_REFUND_WINDOW: &str = "mutations/orders:updateRefundWindow";
    pub const GET_USER_BY_SESSION_TOKEN: &str = "queries/users:getUserBySessionToken";
}

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The function ran and threw; the message is the backend's own
    #[error("{0}")]
    Function(String),

    #[error("unexpected backend response: {0}")]
    Decode(String),
}

impl BackendError {
    /// Only failures that never reached a function, or hit a server fault,
    /// are worth repeating
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status { status, .. } => *status >= 500,
            Self::Function(_) | Self::Decode(_) => false,
        }
    }

    /// Retry rule per function kind. A mutation or action may already have
    /// committed unless the connection was never established.
    pub fn is_retryable_for(&self, kind: FunctionKind) -> bool {
        match (kind, self) {
            (FunctionKind::Query, e) => e.is_retryable(),
            (_, Self::Transport(e)) => e.is_connect(),
            _ => false,
        }
    }
}

pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Kind of backend function, which selects the HTTP endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Query,
    Mutation,
    Action,
}

impl FunctionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Mutation => "mutation",
            Self::Action => "action",
        }
    }
}

#[async_trait]
pub trait BackendClient: Send + Sync {
    async fn call(&self, kind: FunctionKind, path: &str, args: Value) -> BackendResult<Value>;

    async fn query(&self, path: &str, args: Value) -> BackendResult<Value> {
        self.call(FunctionKind::Query, path, args).await
    }

    async fn mutation(&self, path: &str, args: Value) -> BackendResult<Value> {
        self.call(FunctionKind::Mutation, path, args).await
    }

    async fn action(&self, path: &str, args: Value) -> BackendResult<Value> {
        self.call(FunctionKind::Action, path, args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(BackendError::Status { status: 503, body: String::new() }.is_retryable());
        assert!(!BackendError::Status { status: 400, body: String::new() }.is_retryable());
        assert!(!BackendError::Function("Order not found".to_string()).is_retryable());
        assert!(!BackendError::Decode("bad".to_string()).is_retryable());

        let unavailable = BackendError::Status { status: 503, body: String::new() };
        assert!(unavailable.is_retryable_for(FunctionKind::Query));
        assert!(!unavailable.is_retryable_for(FunctionKind::Mutation));
        assert!(!unavailable.is_retryable_for(FunctionKind::Action));
    }

    #[test]
    fn test_function_error_displays_backend_message() {
        let err = BackendError::Function("Meal does not exist".to_string());
        assert_eq!(err.to_string(), "Meal does not exist");
    }
}
