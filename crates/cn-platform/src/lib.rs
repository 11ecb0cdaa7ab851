//! CribNosh Platform
//!
//! Admin HTTP layer in front of the managed backend:
//! - Webhook fan-out with per-destination outcomes
//! - Best-effort admin audit logging to a pluggable sink
//! - Dish review and refund eligibility overrides
//! - Bearer/session authentication with role checks

pub mod api;
pub mod backend;
pub mod domain;
pub mod error;
pub mod repository;
pub mod service;

pub use domain::*;
pub use error::PlatformError;
