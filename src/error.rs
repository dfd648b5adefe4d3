use thiserror::Error;

/// Errors raised by the mapping core.
#[derive(Debug, Error)]
pub enum OrmError {
    /// A mapped type is missing required metadata, or an operation needs an
    /// identity the entity does not have.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A row value could not be coerced into the declared field type, or the
    /// row lacks the expected column.
    #[error("conversion error on column `{column}`: {message}")]
    Conversion { column: String, message: String },

    /// Failure reported by the underlying connection, statement or result.
    #[error("data access error: {0}")]
    DataAccess(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl OrmError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        OrmError::Configuration(msg.into())
    }

    pub fn conversion(column: impl Into<String>, message: impl Into<String>) -> Self {
        OrmError::Conversion {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Wrap any driver-level error.
    pub fn data_access(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        OrmError::DataAccess(Box::new(err))
    }
}

impl From<rusqlite::Error> for OrmError {
    fn from(err: rusqlite::Error) -> Self {
        OrmError::data_access(err)
    }
}

pub type Result<T> = std::result::Result<T, OrmError>;
