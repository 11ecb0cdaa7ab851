use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod logging;

// ============================================================================
// Webhook Wire Types
// ============================================================================

/// The fixed JSON body POSTed to every webhook destination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct WebhookEnvelope {
    /// Event name, e.g. `order.created`
    pub event: String,
    /// Arbitrary event payload, passed through untouched
    #[schema(value_type = Object)]
    pub data: serde_json::Value,
}

impl WebhookEnvelope {
    pub fn new(event: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }
}

/// Result of delivering an envelope to a single destination
///
/// `status` is the HTTP status code of the destination's response, or `0`
/// when no response was received (connect failure, timeout, bad URL).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DeliveryOutcome {
    pub url: String,
    pub status: u16,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeliveryOutcome {
    /// A destination answered; `ok` follows the 2xx rule
    pub fn responded(url: impl Into<String>, status: u16) -> Self {
        Self {
            url: url.into(),
            status,
            ok: (200..300).contains(&status),
            error: None,
        }
    }

    /// No HTTP response was received
    pub fn unreachable(url: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status: 0,
            ok: false,
            error: Some(error.into()),
        }
    }
}

// ============================================================================
// Time
// ============================================================================

/// Current wall-clock time as epoch milliseconds, the unit the backend stores
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CommonError {
    #[error("Logging error: {0}")]
    Logging(String),
}

pub type Result<T> = std::result::Result<T, CommonError>;
