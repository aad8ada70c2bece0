//! Dataset namespace used to qualify warehouse tables.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, Result};

/// `project.dataset` prefix for every table reference.
///
/// Passed explicitly to each compile call; nothing in the compiler keeps an
/// ambient "current dataset".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DatasetNamespace {
    project: String,
    dataset: String,
}

impl DatasetNamespace {
    pub fn new(project: impl Into<String>, dataset: impl Into<String>) -> Result<Self> {
        let project = project.into();
        let dataset = dataset.into();
        validate_segment(&project)?;
        validate_segment(&dataset)?;
        Ok(Self { project, dataset })
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    /// Fully qualified, backtick-quoted table reference.
    pub fn qualify(&self, table: &str) -> String {
        format!("`{}.{}.{}`", self.project, self.dataset, table)
    }
}

/// Only alphanumerics, `_` and `-` may appear in a namespace segment.
fn validate_segment(segment: &str) -> Result<()> {
    if segment.is_empty() {
        return Err(CoreError::invalid_namespace("empty namespace segment"));
    }
    if !segment
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(CoreError::invalid_namespace(segment));
    }
    Ok(())
}

impl fmt::Display for DatasetNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.project, self.dataset)
    }
}

impl FromStr for DatasetNamespace {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('.') {
            Some((project, dataset)) => Self::new(project, dataset),
            None => Err(CoreError::invalid_namespace(format!(
                "expected 'project.dataset', got '{s}'"
            ))),
        }
    }
}

impl TryFrom<String> for DatasetNamespace {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<DatasetNamespace> for String {
    fn from(value: DatasetNamespace) -> Self {
        value.to_string()
    }
}
