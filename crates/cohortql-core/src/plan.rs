//! Person-set plan.
//!
//! Builders produce a [`PersonSet`] tree; the renderer turns it into SQL and
//! warehouses that cannot run SQL (the in-memory fixture) evaluate it
//! directly. Both views are produced from the same tree, so they cannot
//! disagree about which persons qualify.

use time::Date;

use crate::domain::Domain;
use crate::model::Operator;

/// Set algebra over person ids.
#[derive(Debug, Clone, PartialEq)]
pub enum PersonSet {
    /// No persons. Impossible criteria compile to this rather than failing.
    Empty,
    Events(EventQuery),
    Demographic(DemographicQuery),
    Union(Vec<PersonSet>),
    Intersect(Vec<PersonSet>),
    Except {
        base: Box<PersonSet>,
        excluded: Box<PersonSet>,
    },
}

impl PersonSet {
    /// Union that drops empty members and flattens nested unions.
    pub fn union(sets: Vec<PersonSet>) -> PersonSet {
        let mut members = Vec::with_capacity(sets.len());
        for set in sets {
            match set {
                PersonSet::Empty => {}
                PersonSet::Union(inner) => members.extend(inner),
                other => members.push(other),
            }
        }
        match members.len() {
            0 => PersonSet::Empty,
            1 => members.remove(0),
            _ => PersonSet::Union(members),
        }
    }

    /// Intersection; any empty member empties the whole set.
    pub fn intersect(sets: Vec<PersonSet>) -> PersonSet {
        if sets.iter().any(PersonSet::is_empty_set) {
            return PersonSet::Empty;
        }
        let mut members = Vec::with_capacity(sets.len());
        for set in sets {
            match set {
                PersonSet::Intersect(inner) => members.extend(inner),
                other => members.push(other),
            }
        }
        match members.len() {
            0 => PersonSet::Empty,
            1 => members.remove(0),
            _ => PersonSet::Intersect(members),
        }
    }

    pub fn except(base: PersonSet, excluded: PersonSet) -> PersonSet {
        match (base, excluded) {
            (PersonSet::Empty, _) => PersonSet::Empty,
            (base, PersonSet::Empty) => base,
            (base, excluded) => PersonSet::Except {
                base: Box::new(base),
                excluded: Box::new(excluded),
            },
        }
    }

    pub fn is_empty_set(&self) -> bool {
        matches!(self, PersonSet::Empty)
    }
}

// ============================================================================
// Event queries
// ============================================================================

/// Persons with at least one qualifying event.
#[derive(Debug, Clone, PartialEq)]
pub struct EventQuery {
    /// Event selections combined with UNION ALL.
    pub sources: Vec<EventSource>,
    /// Minimum occurrence count per (person, concept).
    pub occurrences: Option<Comparison<i64>>,
}

impl EventQuery {
    pub fn new(sources: Vec<EventSource>) -> Self {
        Self {
            sources,
            occurrences: None,
        }
    }
}

/// Rows of one domain's search table matching a predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct EventSource {
    pub domain: Domain,
    pub predicate: EventPredicate,
}

impl EventSource {
    pub fn new(domain: Domain, predicate: EventPredicate) -> Self {
        Self { domain, predicate }
    }
}

/// How a concept id expands to its descendants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpansionStrategy {
    /// Walk `cb_criteria.path` below each anchor row.
    CriteriaPath,
    /// Walk `cb_criteria.path`, then follow `cb_criteria_ancestor` to the
    /// ingredient-level descendants.
    DrugAncestor,
}

impl ExpansionStrategy {
    pub fn for_domain(domain: Domain) -> Self {
        match domain {
            Domain::Drug => Self::DrugAncestor,
            _ => Self::CriteriaPath,
        }
    }
}

/// Numeric value column on the measurement search table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueColumn {
    ValueAsNumber,
    Systolic,
    Diastolic,
}

impl ValueColumn {
    pub fn column_name(&self) -> &'static str {
        match self {
            Self::ValueAsNumber => "value_as_number",
            Self::Systolic => "systolic",
            Self::Diastolic => "diastolic",
        }
    }
}

/// Row-level predicate over a search table.
#[derive(Debug, Clone, PartialEq)]
pub enum EventPredicate {
    Standard(bool),
    ConceptIn(Vec<i64>),
    /// Prefix patterns (already suffixed with `%`), OR'd.
    CodeLike(Vec<String>),
    /// Concepts of one source vocabulary in `cb_criteria`.
    Vocabulary {
        code_type: String,
        subtype: Option<String>,
        domain: Domain,
    },
    /// Concepts under any group criterion whose code matches a pattern.
    CodeRollup {
        code_type: String,
        subtype: Option<String>,
        domain: Domain,
        patterns: Vec<String>,
    },
    /// Concepts under the given anchors in the criteria hierarchy.
    ConceptRollup {
        strategy: ExpansionStrategy,
        domain: Domain,
        standard: bool,
        parents: Vec<i64>,
        children: Vec<i64>,
    },
    Value {
        column: ValueColumn,
        comparison: Comparison<f64>,
    },
    ValueConceptIn(Vec<i64>),
    AgeAtEvent(Comparison<i64>),
    EntryDate(Comparison<Date>),
    VisitConceptIn(Vec<i64>),
    And(Vec<EventPredicate>),
    Or(Vec<EventPredicate>),
}

impl EventPredicate {
    pub fn and(predicates: Vec<EventPredicate>) -> Self {
        Self::combine(predicates, EventPredicate::And)
    }

    pub fn or(predicates: Vec<EventPredicate>) -> Self {
        Self::combine(predicates, EventPredicate::Or)
    }

    fn combine(mut predicates: Vec<EventPredicate>, wrap: fn(Vec<EventPredicate>) -> Self) -> Self {
        if predicates.len() == 1 {
            predicates.remove(0)
        } else {
            wrap(predicates)
        }
    }
}

// ============================================================================
// Demographics
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DemographicColumn {
    Gender,
    Race,
    Ethnicity,
}

impl DemographicColumn {
    pub fn column_name(&self) -> &'static str {
        match self {
            Self::Gender => "gender_concept_id",
            Self::Race => "race_concept_id",
            Self::Ethnicity => "ethnicity_concept_id",
        }
    }
}

/// Which age an AGE criterion compares against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgeColumn {
    /// Computed from date of birth at query time.
    Age,
    AgeAtConsent,
    AgeAtCdr,
}

impl AgeColumn {
    #[must_use]
    pub fn parse(attribute_name: &str) -> Option<Self> {
        match attribute_name.to_ascii_uppercase().as_str() {
            "AGE" => Some(Self::Age),
            "AGE_AT_CONSENT" => Some(Self::AgeAtConsent),
            "AGE_AT_CDR" => Some(Self::AgeAtCdr),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DemographicQuery {
    ConceptIn {
        column: DemographicColumn,
        concept_ids: Vec<i64>,
    },
    /// Living persons whose age satisfies the comparison.
    Age {
        column: AgeColumn,
        comparison: Comparison<i64>,
    },
    Deceased,
}

// ============================================================================
// Comparisons
// ============================================================================

/// `<column> <operator> <operands>`.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison<T> {
    pub operator: Operator,
    pub operands: Vec<T>,
}

impl<T: PartialOrd> Comparison<T> {
    pub fn new(operator: Operator, operands: Vec<T>) -> Self {
        Self { operator, operands }
    }

    /// Evaluate against a single value. `LIKE` never matches non-text values.
    pub fn matches(&self, value: &T) -> bool {
        let first = self.operands.first();
        match self.operator {
            Operator::Equal => first.is_some_and(|o| value == o),
            Operator::NotEqual => first.is_some_and(|o| value != o),
            Operator::LessThan => first.is_some_and(|o| value < o),
            Operator::GreaterThan => first.is_some_and(|o| value > o),
            Operator::LessThanOrEqualTo => first.is_some_and(|o| value <= o),
            Operator::GreaterThanOrEqualTo => first.is_some_and(|o| value >= o),
            Operator::Between => match self.operands.as_slice() {
                [low, high] => value >= low && value <= high,
                _ => false,
            },
            Operator::In => self.operands.iter().any(|o| value == o),
            Operator::NotIn => self.operands.iter().all(|o| value != o),
            Operator::Like => false,
        }
    }
}
