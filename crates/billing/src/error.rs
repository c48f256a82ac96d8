//! Billing error types

use thiserror::Error;

use advoca_tenant::TenantError;

#[derive(Debug, Error)]
pub enum BillingError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid {entity} transition: {from} -> {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    /// Gateway calls are retryable up to the payment's retry ceiling
    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Refund rejected: {0}")]
    Refund(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error(transparent)]
    Tenant(#[from] TenantError),
}

impl From<sqlx::Error> for BillingError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound("record not found".to_string()),
            other => Self::Database(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for BillingError {
    fn from(err: reqwest::Error) -> Self {
        Self::Gateway(err.to_string())
    }
}

pub type BillingResult<T> = Result<T, BillingError>;
