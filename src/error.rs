//! Error taxonomy for the store and query engine.
//!
//! The binary wraps these in `anyhow`; library callers (an API layer, tests)
//! match on the variants and use [`QuakeError::http_status`] to pick a
//! response code.

use rusqlite::ErrorCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, QuakeError>;

#[derive(Error, Debug)]
pub enum QuakeError {
    /// An identifier lookup, or an aggregate that needs at least one row, came back empty
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// A write violated a foreign-key, NOT NULL or CHECK constraint
    #[error("constraint violated: {reason}")]
    Constraint { reason: String },

    /// A query produced a row that does not fit its response shape.
    /// Always a defect in the query or schema, never caused by user input.
    #[error("row does not fit shape {shape}: field '{field}': {reason}")]
    Shaping {
        shape: &'static str,
        field: &'static str,
        reason: String,
    },

    /// Store unreachable, busy past its timeout, or no pooled connection free in time
    #[error("connection error: {reason}")]
    Connection { reason: String },

    /// Tables could not be created or an existing table conflicts with the expected layout
    #[error("schema error: {reason}")]
    Schema { reason: String },

    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// A statement handed to the read-only query path would modify the store
    #[error("invalid query: {reason}")]
    InvalidQuery { reason: String },

    #[error("database error: {0}")]
    Database(rusqlite::Error),
}

impl QuakeError {
    pub fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        QuakeError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }

    pub fn schema(reason: impl Into<String>) -> Self {
        QuakeError::Schema {
            reason: reason.into(),
        }
    }

    /// HTTP status an API layer should answer with for this error
    pub fn http_status(&self) -> u16 {
        match self {
            QuakeError::NotFound { .. } => 404,
            QuakeError::InvalidParameter { .. } | QuakeError::InvalidQuery { .. } => 422,
            QuakeError::Connection { .. } => 503,
            QuakeError::Constraint { .. }
            | QuakeError::Shaping { .. }
            | QuakeError::Schema { .. }
            | QuakeError::Database(_) => 500,
        }
    }
}

impl From<rusqlite::Error> for QuakeError {
    fn from(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(failure, message) = &err {
            let reason = message.clone().unwrap_or_else(|| failure.to_string());
            match failure.code {
                ErrorCode::ConstraintViolation => return QuakeError::Constraint { reason },
                ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::CannotOpen
                | ErrorCode::NotADatabase => return QuakeError::Connection { reason },
                _ => {}
            }
        }
        QuakeError::Database(err)
    }
}

impl From<r2d2::Error> for QuakeError {
    fn from(err: r2d2::Error) -> Self {
        QuakeError::Connection {
            reason: err.to_string(),
        }
    }
}
