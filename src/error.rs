use sled::transaction::TransactionError;
use std::convert::Infallible;

pub type Result<T> = std::result::Result<T, ReplenishError>;

#[derive(thiserror::Error, Debug)]
pub enum ReplenishError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("cannot {event} a request that is {from:?}")]
    InvalidTransition {
        from: crate::request::RequestStatus,
        event: crate::request::RequestEvent,
    },
    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: u64, available: u64 },
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("storage failure: {0}")]
    Storage(#[from] sled::Error),
    #[error("failed to encode record: {0}")]
    Encode(#[from] minicbor::encode::Error<Infallible>),
    #[error("failed to decode record: {0}")]
    Decode(#[from] minicbor::decode::Error),
}

impl ReplenishError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
}

// Aborts carry the domain error through untouched; anything else came from sled.
impl From<TransactionError<ReplenishError>> for ReplenishError {
    fn from(value: TransactionError<ReplenishError>) -> Self {
        match value {
            TransactionError::Abort(err) => err,
            TransactionError::Storage(err) => ReplenishError::Storage(err),
        }
    }
}
