//! Composable validation predicates.
//!
//! Every predicate answers "is this criterion broken in this particular
//! way?". A `true` result is a failure. Predicates carry a name so a
//! failure can be reported by rule, and compose with [`Predicate::and`],
//! [`Predicate::or`] and [`Predicate::not`] into the per-family bundles the
//! validator runs.

use cohortql_core::{
    AgeColumn, Attribute, Domain, Modifier, ModifierType, Operator, SearchParameter,
};
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

// ============================================================================
// Allowed value sets
// ============================================================================

pub const CODE_TYPES: &[&str] = &["ICD9", "ICD10", "CPT"];
pub const ICD_TYPES: &[&str] = &["ICD9", "ICD10"];
pub const CODE_SUBTYPES: &[&str] = &["CM", "PROC", "ICD10CM", "ICD10PCS", "CPT4"];
pub const DEMO_SUBTYPES: &[&str] = &["AGE", "DEC", "GEN", "RACE", "ETH"];
pub const PM_SUBTYPES: &[&str] = &[
    "BP", "HR", "HR_DETAIL", "HEIGHT", "WEIGHT", "BMI", "WC", "HC", "PREG", "WHEEL",
];
/// Physical-measurement subtypes compared through attributes.
pub const PM_SUBTYPES_WITH_ATTRIBUTES: &[&str] =
    &["BP", "HR_DETAIL", "HEIGHT", "WEIGHT", "BMI", "WC", "HC"];
/// Physical-measurement subtypes matched on a categorical value.
pub const PM_SUBTYPES_WITHOUT_ATTRIBUTES: &[&str] = &["HR", "PREG", "WHEEL"];
/// Domains a code or concept criterion may name.
pub const VALID_DOMAINS: &[&str] = &[
    "CONDITION",
    "PROCEDURE",
    "OBSERVATION",
    "MEASUREMENT",
    "DRUG",
    "DEVICE",
    "VISIT",
];

pub const DECEASED: &str = "Deceased";
pub const ANY: &str = "ANY";
pub const SYSTOLIC: &str = "Systolic";
pub const DIASTOLIC: &str = "Diastolic";
pub const NUMERICAL: &str = "NUM";
pub const CATEGORICAL: &str = "CAT";
pub const BOTH: &str = "BOTH";

// ============================================================================
// Predicate
// ============================================================================

/// A named, pure test over `T`.
pub struct Predicate<T: ?Sized> {
    name: Cow<'static, str>,
    test: Arc<dyn Fn(&T) -> bool + Send + Sync>,
}

impl<T: ?Sized + 'static> Predicate<T> {
    pub fn new(name: &'static str, test: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        Self {
            name: Cow::Borrowed(name),
            test: Arc::new(test),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn test(&self, value: &T) -> bool {
        (self.test)(value)
    }

    pub fn and(self, other: Predicate<T>) -> Predicate<T> {
        let (left, right) = (self.test, other.test);
        Predicate {
            name: Cow::Owned(format!("{} and {}", self.name, other.name)),
            test: Arc::new(move |value: &T| left(value) && right(value)),
        }
    }

    pub fn or(self, other: Predicate<T>) -> Predicate<T> {
        let (left, right) = (self.test, other.test);
        Predicate {
            name: Cow::Owned(format!("{} or {}", self.name, other.name)),
            test: Arc::new(move |value: &T| left(value) || right(value)),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Predicate<T> {
        let inner = self.test;
        Predicate {
            name: Cow::Owned(format!("not {}", self.name)),
            test: Arc::new(move |value: &T| !inner(value)),
        }
    }
}

impl<T: ?Sized> Clone for Predicate<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            test: Arc::clone(&self.test),
        }
    }
}

impl<T: ?Sized> fmt::Debug for Predicate<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predicate").field("name", &self.name).finish()
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.is_none_or(|v| v.trim().is_empty())
}

fn in_set(value: Option<&str>, allowed: &[&str]) -> bool {
    value.is_some_and(|v| allowed.iter().any(|a| a.eq_ignore_ascii_case(v.trim())))
}

pub fn is_number(value: &str) -> bool {
    value.trim().parse::<f64>().is_ok_and(f64::is_finite)
}

/// Concept ids, ages and counts are whole numbers.
pub fn is_integer(value: &str) -> bool {
    value.trim().parse::<i64>().is_ok()
}

// ============================================================================
// Criteria lists
// ============================================================================

pub fn parameters_empty() -> Predicate<[SearchParameter]> {
    Predicate::new("parameters_empty", |params: &[SearchParameter]| {
        params.is_empty()
    })
}

/// AGE and DEC cannot appear in the same demographic item.
pub fn contains_age_and_dec() -> Predicate<[SearchParameter]> {
    Predicate::new("contains_age_and_dec", |params: &[SearchParameter]| {
        let has = |subtype: &str| {
            params
                .iter()
                .any(|p| p.subtype_str().eq_ignore_ascii_case(subtype))
        };
        has("AGE") && has("DEC")
    })
}

// ============================================================================
// Single criterion
// ============================================================================

pub fn attributes_empty() -> Predicate<SearchParameter> {
    Predicate::new("attributes_empty", |p: &SearchParameter| p.attributes.is_empty())
}

pub fn concept_id_null() -> Predicate<SearchParameter> {
    Predicate::new("concept_id_null", |p: &SearchParameter| p.concept_id.is_none())
}

pub fn param_child() -> Predicate<SearchParameter> {
    Predicate::new("param_child", |p: &SearchParameter| !p.group)
}

pub fn param_parent() -> Predicate<SearchParameter> {
    Predicate::new("param_parent", |p: &SearchParameter| p.group)
}

pub fn code_blank() -> Predicate<SearchParameter> {
    Predicate::new("code_blank", |p: &SearchParameter| is_blank(p.value.as_deref()))
}

pub fn domain_blank() -> Predicate<SearchParameter> {
    Predicate::new("domain_blank", |p: &SearchParameter| is_blank(p.domain.as_deref()))
}

pub fn domain_invalid() -> Predicate<SearchParameter> {
    Predicate::new("domain_invalid", |p: &SearchParameter| {
        !in_set(p.domain.as_deref(), VALID_DOMAINS)
    })
}

pub fn type_blank() -> Predicate<SearchParameter> {
    Predicate::new("type_blank", |p: &SearchParameter| is_blank(p.param_type.as_deref()))
}

pub fn code_type_invalid() -> Predicate<SearchParameter> {
    Predicate::new("code_type_invalid", |p: &SearchParameter| {
        !in_set(p.param_type.as_deref(), CODE_TYPES)
    })
}

pub fn demo_type_invalid() -> Predicate<SearchParameter> {
    Predicate::new("demo_type_invalid", |p: &SearchParameter| {
        !in_set(p.param_type.as_deref(), &["DEMO"])
    })
}

pub fn pm_type_invalid() -> Predicate<SearchParameter> {
    Predicate::new("pm_type_invalid", |p: &SearchParameter| {
        !in_set(p.param_type.as_deref(), &["PM"])
    })
}

pub fn drug_type_invalid() -> Predicate<SearchParameter> {
    Predicate::new("drug_type_invalid", |p: &SearchParameter| {
        !in_set(p.param_type.as_deref(), &["DRUG", "ATC", "RXNORM"])
    })
}

pub fn meas_type_invalid() -> Predicate<SearchParameter> {
    Predicate::new("meas_type_invalid", |p: &SearchParameter| {
        !in_set(p.param_type.as_deref(), &["MEAS", "LOINC"])
    })
}

pub fn visit_type_invalid() -> Predicate<SearchParameter> {
    Predicate::new("visit_type_invalid", |p: &SearchParameter| {
        !in_set(p.param_type.as_deref(), &["VISIT"])
    })
}

pub fn type_icd() -> Predicate<SearchParameter> {
    Predicate::new("type_icd", |p: &SearchParameter| {
        in_set(p.param_type.as_deref(), ICD_TYPES)
    })
}

pub fn subtype_blank() -> Predicate<SearchParameter> {
    Predicate::new("subtype_blank", |p: &SearchParameter| is_blank(p.subtype.as_deref()))
}

pub fn code_subtype_invalid() -> Predicate<SearchParameter> {
    Predicate::new("code_subtype_invalid", |p: &SearchParameter| {
        !in_set(p.subtype.as_deref(), CODE_SUBTYPES)
    })
}

pub fn demo_subtype_invalid() -> Predicate<SearchParameter> {
    Predicate::new("demo_subtype_invalid", |p: &SearchParameter| {
        !in_set(p.subtype.as_deref(), DEMO_SUBTYPES)
    })
}

pub fn pm_subtype_invalid() -> Predicate<SearchParameter> {
    Predicate::new("pm_subtype_invalid", |p: &SearchParameter| {
        !in_set(p.subtype.as_deref(), PM_SUBTYPES)
    })
}

pub fn subtype_age() -> Predicate<SearchParameter> {
    Predicate::new("subtype_age", |p: &SearchParameter| {
        in_set(p.subtype.as_deref(), &["AGE"])
    })
}

pub fn subtype_dec() -> Predicate<SearchParameter> {
    Predicate::new("subtype_dec", |p: &SearchParameter| {
        in_set(p.subtype.as_deref(), &["DEC"])
    })
}

pub fn subtype_gen_race_eth() -> Predicate<SearchParameter> {
    Predicate::new("subtype_gen_race_eth", |p: &SearchParameter| {
        in_set(p.subtype.as_deref(), &["GEN", "RACE", "ETH"])
    })
}

pub fn subtype_bp() -> Predicate<SearchParameter> {
    Predicate::new("subtype_bp", |p: &SearchParameter| {
        in_set(p.subtype.as_deref(), &["BP"])
    })
}

pub fn pm_subtype_with_attributes() -> Predicate<SearchParameter> {
    Predicate::new("pm_subtype_with_attributes", |p: &SearchParameter| {
        in_set(p.subtype.as_deref(), PM_SUBTYPES_WITH_ATTRIBUTES)
    })
}

pub fn pm_subtype_without_attributes() -> Predicate<SearchParameter> {
    Predicate::new("pm_subtype_without_attributes", |p: &SearchParameter| {
        in_set(p.subtype.as_deref(), PM_SUBTYPES_WITHOUT_ATTRIBUTES)
    })
}

pub fn value_not_dec() -> Predicate<SearchParameter> {
    Predicate::new("value_not_dec", |p: &SearchParameter| {
        p.value.as_deref() != Some(DECEASED)
    })
}

pub fn value_null() -> Predicate<SearchParameter> {
    Predicate::new("value_null", |p: &SearchParameter| p.value.is_none())
}

pub fn value_not_integer() -> Predicate<SearchParameter> {
    Predicate::new("value_not_integer", |p: &SearchParameter| {
        !p.value.as_deref().is_some_and(is_integer)
    })
}

pub fn not_two_attributes() -> Predicate<SearchParameter> {
    Predicate::new("not_two_attributes", |p: &SearchParameter| {
        p.attributes.len() != 2
    })
}

/// Blood pressure needs one Systolic and one Diastolic attribute.
pub fn not_systolic_and_diastolic() -> Predicate<SearchParameter> {
    Predicate::new("not_systolic_and_diastolic", |p: &SearchParameter| {
        let count = |name: &str| p.attributes.iter().filter(|a| a.name_str() == name).count();
        !(count(SYSTOLIC) == 1 && count(DIASTOLIC) == 1)
    })
}

/// No attribute is the `ANY` wildcard.
pub fn not_any_attr() -> Predicate<SearchParameter> {
    Predicate::new("not_any_attr", |p: &SearchParameter| {
        !p.attributes.iter().any(|a| a.name_str() == ANY)
    })
}

/// The criterion names a different domain than its item.
pub fn domain_mismatch(domain: Domain) -> Predicate<SearchParameter> {
    Predicate::new("domain_mismatch", move |p: &SearchParameter| {
        Domain::parse(p.domain_str()) != Some(domain)
    })
}

// ============================================================================
// Attributes and modifiers
// ============================================================================

/// Shared shape of attributes and modifiers.
pub trait Operands {
    fn operator(&self) -> Option<Operator>;
    fn operands(&self) -> &[String];
}

impl Operands for Attribute {
    fn operator(&self) -> Option<Operator> {
        self.operator
    }

    fn operands(&self) -> &[String] {
        &self.operands
    }
}

impl Operands for Modifier {
    fn operator(&self) -> Option<Operator> {
        self.operator
    }

    fn operands(&self) -> &[String] {
        &self.operands
    }
}

pub fn operator_null<T: Operands + 'static>() -> Predicate<T> {
    Predicate::new("operator_null", |t: &T| t.operator().is_none())
}

pub fn operands_empty<T: Operands + 'static>() -> Predicate<T> {
    Predicate::new("operands_empty", |t: &T| t.operands().is_empty())
}

pub fn between_operator<T: Operands + 'static>() -> Predicate<T> {
    Predicate::new("between_operator", |t: &T| {
        t.operator().is_some_and(|o| o.is_between())
    })
}

pub fn list_operator<T: Operands + 'static>() -> Predicate<T> {
    Predicate::new("list_operator", |t: &T| t.operator().is_some_and(|o| o.is_list()))
}

pub fn like_operator<T: Operands + 'static>() -> Predicate<T> {
    Predicate::new("like_operator", |t: &T| t.operator() == Some(Operator::Like))
}

pub fn operands_not_one<T: Operands + 'static>() -> Predicate<T> {
    Predicate::new("operands_not_one", |t: &T| t.operands().len() != 1)
}

pub fn operands_not_two<T: Operands + 'static>() -> Predicate<T> {
    Predicate::new("operands_not_two", |t: &T| t.operands().len() != 2)
}

pub fn operands_not_numbers<T: Operands + 'static>() -> Predicate<T> {
    Predicate::new("operands_not_numbers", |t: &T| {
        !t.operands().iter().all(|o| is_number(o))
    })
}

pub fn operands_not_integers<T: Operands + 'static>() -> Predicate<T> {
    Predicate::new("operands_not_integers", |t: &T| {
        !t.operands().iter().all(|o| is_integer(o))
    })
}

pub fn name_blank() -> Predicate<Attribute> {
    Predicate::new("name_blank", |a: &Attribute| is_blank(a.name.as_deref()))
}

pub fn any_attribute() -> Predicate<Attribute> {
    Predicate::new("any_attribute", |a: &Attribute| a.name_str() == ANY)
}

pub fn categorical_attribute() -> Predicate<Attribute> {
    Predicate::new("categorical_attribute", |a: &Attribute| a.name_str() == CATEGORICAL)
}

/// CAT, and BOTH with a list operator, compare value concept ids.
pub fn value_concept_attribute() -> Predicate<Attribute> {
    Predicate::new("value_concept_attribute", |a: &Attribute| {
        a.name_str() == CATEGORICAL
            || (a.name_str() == BOTH && a.operator.is_some_and(|o| o.is_list()))
    })
}

/// The attribute name is none of AGE, AGE_AT_CONSENT and AGE_AT_CDR.
pub fn not_age_column() -> Predicate<Attribute> {
    Predicate::new("not_age_column", |a: &Attribute| {
        AgeColumn::parse(a.name_str().trim()).is_none()
    })
}

pub fn event_date_modifier() -> Predicate<Modifier> {
    Predicate::new("event_date_modifier", |m: &Modifier| {
        m.name == ModifierType::EventDate
    })
}

pub fn operands_not_dates() -> Predicate<Modifier> {
    Predicate::new("operands_not_dates", |m: &Modifier| {
        !m.operands
            .iter()
            .all(|o| cohortql_core::time::parse_date(o.trim()).is_ok())
    })
}
