use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Nothing to invoice: {0}")]
    NoUnbilledWork(String),
    #[error("No rate configured: {0}")]
    NoRateConfigured(String),
    #[error("Time entry {0} was already invoiced")]
    AlreadyInvoiced(Uuid),
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Store error: {0}")]
    Store(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
