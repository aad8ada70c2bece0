use cohortql_core::ErrorCategory;
use thiserror::Error;

/// Errors raised while executing a query or reading its rows.
#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error("Query execution failed: {0}")]
    Execution(String),

    #[error("Unsupported query: {0}")]
    UnsupportedQuery(String),

    #[error("Column not found: {0}")]
    MissingColumn(String),

    #[error("Column '{column}' is not {expected}")]
    TypeMismatch { column: String, expected: String },

    #[error("Invalid fixture: {0}")]
    Fixture(String),
}

impl WarehouseError {
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution(message.into())
    }

    pub fn unsupported_query(message: impl Into<String>) -> Self {
        Self::UnsupportedQuery(message.into())
    }

    pub fn missing_column(column: impl Into<String>) -> Self {
        Self::MissingColumn(column.into())
    }

    pub fn type_mismatch(column: impl Into<String>, expected: impl Into<String>) -> Self {
        Self::TypeMismatch {
            column: column.into(),
            expected: expected.into(),
        }
    }

    pub fn fixture(message: impl Into<String>) -> Self {
        Self::Fixture(message.into())
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Execution(_) | Self::UnsupportedQuery(_) => ErrorCategory::Execution,
            Self::MissingColumn(_) | Self::TypeMismatch { .. } => ErrorCategory::Serialization,
            Self::Fixture(_) => ErrorCategory::Configuration,
        }
    }
}

impl From<serde_json::Error> for WarehouseError {
    fn from(err: serde_json::Error) -> Self {
        Self::Fixture(err.to_string())
    }
}

impl From<std::io::Error> for WarehouseError {
    fn from(err: std::io::Error) -> Self {
        Self::Fixture(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, WarehouseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = WarehouseError::type_mismatch("count", "an INT64");
        assert_eq!(err.to_string(), "Column 'count' is not an INT64");
        assert_eq!(err.category(), ErrorCategory::Serialization);
        assert_eq!(
            WarehouseError::execution("boom").category(),
            ErrorCategory::Execution
        );
    }
}
