//! The module contains the errors the ledger can throw.
//!
//! The errors are:
//!
//! - [`Validation`] thrown when a batch or a line item is rejected before any
//!   write attempt.
//! - [`Persistence`] produced when the durable store is unreachable, times
//!   out or rejects a write. Writers never fail on it: it is handed back as a
//!   warning next to the (already applied) local change.
//! - [`KeyNotFound`] thrown when a batch key matches no record.
//!
//!  [`Validation`]: EngineError::Validation
//!  [`Persistence`]: EngineError::Persistence
//!  [`KeyNotFound`]: EngineError::KeyNotFound
use sea_orm::DbErr;
use thiserror::Error;

/// Ledger custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Persistence failed: {0}")]
    Persistence(String),
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("Invalid record: {0}")]
    InvalidRecord(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl EngineError {
    /// Returns true for errors that leave the local snapshot untouched and
    /// must be fixed by the caller.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Validation(a), Self::Validation(b)) => a == b,
            (Self::Persistence(a), Self::Persistence(b)) => a == b,
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::InvalidRecord(a), Self::InvalidRecord(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
