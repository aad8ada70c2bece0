//! Error types for validation, compilation and execution.

use cohortql_core::{CoreError, DomainResolutionError, ErrorCategory};
use cohortql_warehouse::WarehouseError;
use std::fmt;
use thiserror::Error;

/// A criteria tree broke a validation rule.
///
/// Carries the rule name and the ids needed to point the user at the
/// offending item and criterion.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct ValidationError {
    pub rule: String,
    pub item_id: Option<String>,
    pub criterion_id: Option<String>,
    pub message: String,
}

impl ValidationError {
    pub fn new(rule: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            item_id: None,
            criterion_id: None,
            message: message.into(),
        }
    }

    pub fn with_item(mut self, item_id: impl Into<String>) -> Self {
        self.item_id = Some(item_id.into());
        self
    }

    pub fn with_criterion(mut self, criterion_id: impl Into<String>) -> Self {
        self.criterion_id = Some(criterion_id.into());
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bad Request: {} [rule: {}", self.message, self.rule)?;
        if let Some(item) = &self.item_id {
            write!(f, ", item: {item}")?;
        }
        if let Some(criterion) = &self.criterion_id {
            write!(f, ", criterion: {criterion}")?;
        }
        write!(f, "]")
    }
}

/// Errors from a single compile call.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Domain resolution failed: {0}")]
    DomainResolution(#[from] DomainResolutionError),

    #[error("Compilation failed: {0}")]
    Compilation(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl CompileError {
    pub fn compilation(message: impl Into<String>) -> Self {
        Self::Compilation(message.into())
    }

    /// Caller-fixable errors; everything else is a defect.
    pub fn is_client_error(&self) -> bool {
        match self {
            Self::Validation(_) => true,
            Self::Core(err) => err.is_client_error(),
            Self::DomainResolution(_) | Self::Compilation(_) => false,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation(_) => ErrorCategory::Validation,
            Self::DomainResolution(_) => ErrorCategory::DomainResolution,
            Self::Compilation(_) => ErrorCategory::Compilation,
            Self::Core(err) => err.category(),
        }
    }
}

/// Errors from compiling and then executing a cohort query.
#[derive(Debug, Error)]
pub enum CohortError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Warehouse(#[from] WarehouseError),
}

impl CohortError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Compile(err) => err.category(),
            Self::Warehouse(err) => err.category(),
        }
    }
}

impl From<ValidationError> for CohortError {
    fn from(err: ValidationError) -> Self {
        Self::Compile(err.into())
    }
}

pub type Result<T> = std::result::Result<T, CompileError>;
