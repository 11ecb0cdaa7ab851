//! Repositories

pub mod audit_log;
pub mod mongo;

pub use audit_log::{AuditLogRepository, BackendAuditLogRepository, InMemoryAuditLogRepository};
pub use mongo::MongoAuditLogRepository;
