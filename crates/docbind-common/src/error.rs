//! Error types for docbind

use thiserror::Error;

/// Result type alias for docbind operations
pub type Result<T> = std::result::Result<T, DocBindError>;

/// MongoDB server code for a duplicate key write
#[cfg(feature = "mongodb-errors")]
const DUPLICATE_KEY_CODE: i32 = 11000;

/// Unified error type for all docbind operations
///
/// The type is `Clone` so that a single connection failure can be handed to
/// every observer of a shared connection handle.
#[derive(Error, Debug, Clone)]
pub enum DocBindError {
    #[error("MongoDB error: {0}")]
    MongoDB(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// Unique index violation (server code 11000)
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DocBindError {
    /// Returns true if the error came from establishing or keeping the session
    pub fn is_connection_error(&self) -> bool {
        matches!(self, DocBindError::Connection(_))
    }

    /// Returns true if the error was raised by a single store operation
    pub fn is_operation_error(&self) -> bool {
        !matches!(
            self,
            DocBindError::Connection(_) | DocBindError::Internal(_)
        )
    }

    /// Returns true if this is a constraint violation error
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            DocBindError::Conflict(_) | DocBindError::Validation(_)
        )
    }
}

impl From<serde_json::Error> for DocBindError {
    fn from(err: serde_json::Error) -> Self {
        DocBindError::Serialization(err.to_string())
    }
}

// MongoDB-specific error conversions (when mongodb-errors feature is enabled)
#[cfg(feature = "mongodb-errors")]
impl From<mongodb::error::Error> for DocBindError {
    fn from(err: mongodb::error::Error) -> Self {
        use mongodb::error::{ErrorKind, WriteFailure};

        match err.kind.as_ref() {
            ErrorKind::Write(WriteFailure::WriteError(write_error))
                if write_error.code == DUPLICATE_KEY_CODE =>
            {
                DocBindError::Conflict(err.to_string())
            }
            ErrorKind::Command(command_error) if command_error.code == DUPLICATE_KEY_CODE => {
                DocBindError::Conflict(err.to_string())
            }
            ErrorKind::ServerSelection { .. }
            | ErrorKind::Io(_)
            | ErrorKind::DnsResolve { .. }
            | ErrorKind::Authentication { .. }
            | ErrorKind::ConnectionPoolCleared { .. } => DocBindError::Connection(err.to_string()),
            ErrorKind::InvalidArgument { .. } => DocBindError::Query(err.to_string()),
            _ => DocBindError::MongoDB(err.to_string()),
        }
    }
}

#[cfg(feature = "mongodb-errors")]
impl From<bson::ser::Error> for DocBindError {
    fn from(err: bson::ser::Error) -> Self {
        DocBindError::Serialization(format!("BSON serialization error: {}", err))
    }
}

#[cfg(feature = "mongodb-errors")]
impl From<bson::de::Error> for DocBindError {
    fn from(err: bson::de::Error) -> Self {
        DocBindError::Deserialization(format!("BSON deserialization error: {}", err))
    }
}
