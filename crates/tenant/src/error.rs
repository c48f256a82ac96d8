//! Tenant-service error types

use thiserror::Error;

/// Errors surfaced by the tenant, subscription, and quota services
#[derive(Debug, Error)]
pub enum TenantError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Quota exceeded: {quota_type} is at {current} of {limit}")]
    QuotaExceeded {
        quota_type: String,
        current: i64,
        limit: i64,
    },

    #[error("Unknown quota type: {0}")]
    UnknownQuotaType(String),

    #[error("Invalid {entity} transition: {from} -> {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    #[error("Usage amount cannot be negative")]
    NegativeUsage,

    #[error("Database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for TenantError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => TenantError::NotFound("row not found".to_string()),
            other => TenantError::Database(other.to_string()),
        }
    }
}

pub type TenantResult<T> = Result<T, TenantError>;
