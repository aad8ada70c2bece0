use thiserror::Error;

/// Core error types for criteria and parameter handling
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid dataset namespace: {0}")]
    InvalidNamespace(String),

    #[error("Invalid date/time value: {0}")]
    InvalidDateTime(String),

    #[error("Invalid operand '{operand}': expected {expected}")]
    InvalidOperand { operand: String, expected: String },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Time parsing error: {0}")]
    TimeParse(#[from] time::error::Parse),

    #[error("Time formatting error: {0}")]
    TimeFormat(#[from] time::error::Format),
}

impl CoreError {
    /// Create a new InvalidNamespace error
    pub fn invalid_namespace(namespace: impl Into<String>) -> Self {
        Self::InvalidNamespace(namespace.into())
    }

    /// Create a new InvalidDateTime error
    pub fn invalid_date_time(value: impl Into<String>) -> Self {
        Self::InvalidDateTime(value.into())
    }

    /// Create a new InvalidOperand error
    pub fn invalid_operand(operand: impl Into<String>, expected: impl Into<String>) -> Self {
        Self::InvalidOperand {
            operand: operand.into(),
            expected: expected.into(),
        }
    }

    /// Check if this error was caused by caller input
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidNamespace(_)
                | Self::InvalidDateTime(_)
                | Self::InvalidOperand { .. }
                | Self::Json(_)
                | Self::TimeParse(_)
        )
    }

    /// Get error category for logging/monitoring
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidNamespace(_) => ErrorCategory::Configuration,
            Self::InvalidDateTime(_) | Self::InvalidOperand { .. } | Self::TimeParse(_) => {
                ErrorCategory::Validation
            }
            Self::Json(_) => ErrorCategory::Serialization,
            Self::TimeFormat(_) => ErrorCategory::System,
        }
    }
}

/// A structurally valid domain id with no table mapping.
///
/// Only reachable when the allowed-domain list used during validation and the
/// registry disagree, so callers treat it as a defect rather than bad input.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("No table mapping for domain '{domain}'")]
pub struct DomainResolutionError {
    pub domain: String,
}

impl DomainResolutionError {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
        }
    }
}

/// Error categories for monitoring and classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    DomainResolution,
    Compilation,
    Serialization,
    Execution,
    System,
    Configuration,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::DomainResolution => write!(f, "domain_resolution"),
            Self::Compilation => write!(f, "compilation"),
            Self::Serialization => write!(f, "serialization"),
            Self::Execution => write!(f, "execution"),
            Self::System => write!(f, "system"),
            Self::Configuration => write!(f, "configuration"),
        }
    }
}

/// Convenience result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
