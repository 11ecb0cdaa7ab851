//! Common API types and utilities

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::Query;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::PlatformError;

/// Standard API error response
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiError {
    pub success: bool,
    pub error: String,
    pub code: String,
}

impl ApiError {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            code: code.into(),
        }
    }
}

/// Success envelope
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            message: None,
        }
    }

    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data,
            message: Some(message.into()),
        }
    }
}

/// Unwrap a JSON body, reporting malformed input as a validation error
pub fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, PlatformError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| PlatformError::validation(rejection.body_text()))
}

/// Unwrap query parameters, reporting malformed input as a validation error
pub fn query_params<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, PlatformError> {
    query
        .map(|Query(value)| value)
        .map_err(|rejection| PlatformError::validation(rejection.body_text()))
}

/// Epoch milliseconds as RFC 3339
pub fn millis_to_rfc3339(millis: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp_millis(millis).map(|dt| dt.to_rfc3339())
}
