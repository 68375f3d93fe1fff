//! Error taxonomy for the ingresos pipeline
//!
//! Extraction failures are deliberately absent: a failed object read or an
//! unreadable workbook is reported through [`crate::extract::Extraction`]
//! as an empty sheet with no provenance instead of an `Err`.

use thiserror::Error;

pub type EtlResult<T> = std::result::Result<T, EtlError>;

#[derive(Debug, Error)]
pub enum EtlError {
    /// Caller-supplied selector or name is not acceptable. Raised before any I/O.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Worksheet does not have the shape the layout expects.
    #[error("unexpected sheet layout: {0}")]
    Layout(String),

    /// Plain insert hit an id that already exists.
    #[error("{operation} failed: primary key collision in table '{table}': {message}")]
    ConstraintViolation {
        operation: &'static str,
        table: String,
        message: String,
    },

    /// Any other storage failure during a load. The enclosing transaction is rolled back.
    #[error("{operation} failed: {source}")]
    LoadFailure {
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },
}

impl EtlError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        EtlError::InvalidArgument(message.into())
    }

    /// Map a storage error raised while running `operation` against `table`.
    ///
    /// Unique/primary-key violations become [`EtlError::ConstraintViolation`],
    /// everything else is wrapped as [`EtlError::LoadFailure`].
    pub fn from_storage(operation: &'static str, table: &str, err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if db.is_unique_violation() {
                return EtlError::ConstraintViolation {
                    operation,
                    table: table.to_string(),
                    message: db.message().to_string(),
                };
            }
        }
        EtlError::LoadFailure {
            operation,
            source: err,
        }
    }

    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, EtlError::ConstraintViolation { .. })
    }
}
