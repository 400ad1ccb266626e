use std::fmt;

/// Error raised by a [`TransactionStore`](crate::database::repository::TransactionStore).
#[derive(Debug, Clone)]
pub struct DatabaseError {
    pub kind: DatabaseErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseErrorKind {
    /// A transaction with this reference already exists.
    DuplicateReference { reference: String },
    /// The backing store could not be reached.
    ConnectionError { message: String },
    QueryError { message: String },
    /// A stored row could not be turned back into a transaction.
    DecodeError { message: String },
    Unknown { message: String },
}

impl DatabaseError {
    pub fn new(kind: DatabaseErrorKind) -> Self {
        Self { kind }
    }

    pub fn duplicate_reference(reference: impl Into<String>) -> Self {
        Self::new(DatabaseErrorKind::DuplicateReference {
            reference: reference.into(),
        })
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(DatabaseErrorKind::DecodeError {
            message: message.into(),
        })
    }

    #[cfg(feature = "database")]
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        let kind = match &err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                DatabaseErrorKind::ConnectionError {
                    message: err.to_string(),
                }
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                DatabaseErrorKind::DecodeError {
                    message: err.to_string(),
                }
            }
            sqlx::Error::Database(_) => DatabaseErrorKind::QueryError {
                message: err.to_string(),
            },
            _ => DatabaseErrorKind::Unknown {
                message: err.to_string(),
            },
        };
        Self { kind }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self.kind, DatabaseErrorKind::ConnectionError { .. })
    }
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            DatabaseErrorKind::DuplicateReference { reference } => {
                write!(f, "transaction reference already exists: {}", reference)
            }
            DatabaseErrorKind::ConnectionError { message } => {
                write!(f, "database connection error: {}", message)
            }
            DatabaseErrorKind::QueryError { message } => write!(f, "database query error: {}", message),
            DatabaseErrorKind::DecodeError { message } => {
                write!(f, "stored transaction is invalid: {}", message)
            }
            DatabaseErrorKind::Unknown { message } => write!(f, "database error: {}", message),
        }
    }
}

impl std::error::Error for DatabaseError {}

impl From<DatabaseError> for crate::error::AppError {
    fn from(err: DatabaseError) -> Self {
        use crate::error::{AppError, AppErrorKind, DomainError, InfrastructureError};

        let is_retryable = err.is_retryable();
        let message = err.to_string();
        let kind = match err.kind {
            DatabaseErrorKind::DuplicateReference { reference } => {
                AppErrorKind::Domain(DomainError::DuplicateReference { reference })
            }
            _ => AppErrorKind::Infrastructure(InfrastructureError::Database {
                message,
                is_retryable,
            }),
        };
        AppError::new(kind)
    }
}
