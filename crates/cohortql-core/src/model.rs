//! Cohort definition tree as it arrives over the wire.
//!
//! JSON keys are camelCase. Every field that a caller may omit has a serde
//! default so that structurally incomplete criteria reach the validator,
//! which reports them by rule name instead of failing inside serde.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;

// ============================================================================
// Operators and modifiers
// ============================================================================

/// Comparison operator used by attributes and modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operator {
    Equal,
    NotEqual,
    LessThan,
    GreaterThan,
    LessThanOrEqualTo,
    GreaterThanOrEqualTo,
    Like,
    In,
    NotIn,
    Between,
}

impl Operator {
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "EQUAL" => Some(Self::Equal),
            "NOT_EQUAL" => Some(Self::NotEqual),
            "LESS_THAN" => Some(Self::LessThan),
            "GREATER_THAN" => Some(Self::GreaterThan),
            "LESS_THAN_OR_EQUAL_TO" => Some(Self::LessThanOrEqualTo),
            "GREATER_THAN_OR_EQUAL_TO" => Some(Self::GreaterThanOrEqualTo),
            "LIKE" => Some(Self::Like),
            "IN" => Some(Self::In),
            "NOT_IN" => Some(Self::NotIn),
            "BETWEEN" => Some(Self::Between),
            _ => None,
        }
    }

    /// SQL token for this operator.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Equal => "=",
            Self::NotEqual => "!=",
            Self::LessThan => "<",
            Self::GreaterThan => ">",
            Self::LessThanOrEqualTo => "<=",
            Self::GreaterThanOrEqualTo => ">=",
            Self::Like => "LIKE",
            Self::In => "IN",
            Self::NotIn => "NOT IN",
            Self::Between => "BETWEEN",
        }
    }

    pub fn is_between(&self) -> bool {
        matches!(self, Self::Between)
    }

    /// `IN` and `NOT IN` take a list of operands.
    pub fn is_list(&self) -> bool {
        matches!(self, Self::In | Self::NotIn)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Event-level restriction applied to every criterion of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModifierType {
    AgeAtEvent,
    EventDate,
    NumOfOccurrences,
    Encounters,
}

impl fmt::Display for ModifierType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AgeAtEvent => "AGE_AT_EVENT",
            Self::EventDate => "EVENT_DATE",
            Self::NumOfOccurrences => "NUM_OF_OCCURRENCES",
            Self::Encounters => "ENCOUNTERS",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Modifier {
    pub name: ModifierType,
    #[serde(default)]
    pub operator: Option<Operator>,
    #[serde(default)]
    pub operands: Vec<String>,
}

impl Modifier {
    pub fn new(name: ModifierType, operator: Operator, operands: &[&str]) -> Self {
        Self {
            name,
            operator: Some(operator),
            operands: operands.iter().map(|s| s.to_string()).collect(),
        }
    }
}

// ============================================================================
// Criteria
// ============================================================================

/// Range or categorical restriction on a criterion's value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribute {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub operator: Option<Operator>,
    #[serde(default, alias = "values")]
    pub operands: Vec<String>,
    #[serde(default)]
    pub concept_id: Option<i64>,
}

impl Attribute {
    pub fn new(name: impl Into<String>, operator: Operator, operands: &[&str]) -> Self {
        Self {
            name: Some(name.into()),
            operator: Some(operator),
            operands: operands.iter().map(|s| s.to_string()).collect(),
            concept_id: None,
        }
    }

    /// Attribute name, or the empty string when absent.
    pub fn name_str(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }
}

/// A single leaf criterion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParameter {
    #[serde(default)]
    pub parameter_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "domainId")]
    pub domain: Option<String>,
    #[serde(default, rename = "type")]
    pub param_type: Option<String>,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub concept_id: Option<i64>,
    #[serde(default)]
    pub group: bool,
    #[serde(default = "default_selectable")]
    pub selectable: bool,
    /// `true` for a standard-vocabulary concept, `false` for a source one.
    #[serde(default)]
    pub standard: bool,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

fn default_selectable() -> bool {
    true
}

impl Default for SearchParameter {
    fn default() -> Self {
        Self {
            parameter_id: None,
            name: None,
            domain: None,
            param_type: None,
            subtype: None,
            value: None,
            concept_id: None,
            group: false,
            selectable: true,
            standard: false,
            attributes: Vec::new(),
        }
    }
}

impl SearchParameter {
    pub fn new(param_type: impl Into<String>) -> Self {
        Self {
            param_type: Some(param_type.into()),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.parameter_id = Some(id.into());
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_subtype(mut self, subtype: impl Into<String>) -> Self {
        self.subtype = Some(subtype.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_concept_id(mut self, concept_id: i64) -> Self {
        self.concept_id = Some(concept_id);
        self
    }

    pub fn with_group(mut self, group: bool) -> Self {
        self.group = group;
        self
    }

    pub fn with_standard(mut self, standard: bool) -> Self {
        self.standard = standard;
        self
    }

    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Identifier used in error messages.
    pub fn display_id(&self) -> &str {
        self.parameter_id.as_deref().unwrap_or("<unnamed>")
    }

    pub fn type_str(&self) -> &str {
        self.param_type.as_deref().unwrap_or_default()
    }

    pub fn subtype_str(&self) -> &str {
        self.subtype.as_deref().unwrap_or_default()
    }

    pub fn domain_str(&self) -> &str {
        self.domain.as_deref().unwrap_or_default()
    }

    pub fn value_str(&self) -> &str {
        self.value.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchGroupItem {
    #[serde(default)]
    pub id: String,
    #[serde(default, rename = "type")]
    pub item_type: String,
    #[serde(default)]
    pub search_parameters: Vec<SearchParameter>,
    #[serde(default)]
    pub modifiers: Vec<Modifier>,
}

impl SearchGroupItem {
    pub fn new(id: impl Into<String>, item_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            item_type: item_type.into(),
            ..Self::default()
        }
    }

    pub fn with_parameter(mut self, parameter: SearchParameter) -> Self {
        self.search_parameters.push(parameter);
        self
    }

    pub fn with_modifier(mut self, modifier: Modifier) -> Self {
        self.modifiers.push(modifier);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchGroup {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub items: Vec<SearchGroupItem>,
}

impl SearchGroup {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            items: Vec::new(),
        }
    }

    pub fn with_item(mut self, item: SearchGroupItem) -> Self {
        self.items.push(item);
        self
    }
}

/// Root of a cohort definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    #[serde(default)]
    pub includes: Vec<SearchGroup>,
    #[serde(default)]
    pub excludes: Vec<SearchGroup>,
}

impl SearchRequest {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_include(mut self, group: SearchGroup) -> Self {
        self.includes.push(group);
        self
    }

    pub fn with_exclude(mut self, group: SearchGroup) -> Self {
        self.excludes.push(group);
        self
    }
}
