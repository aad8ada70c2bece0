//! Request validator.
//!
//! Walks the criteria tree and runs the predicate bundle for each item's
//! family. The first failing predicate aborts validation; nothing is
//! compiled for a tree that does not validate.

use cohortql_core::{Attribute, Domain, Modifier, SearchGroupItem, SearchParameter, SearchRequest};
use std::collections::HashSet;
use tracing::debug;

use super::predicates::*;
use crate::compiler::CompilerConfig;
use crate::error::ValidationError;
use crate::family::CriterionFamily;

type Result<T> = std::result::Result<T, ValidationError>;

/// Fail with the predicate's name when it holds.
fn check<T: ?Sized + 'static>(
    rule: Predicate<T>,
    value: &T,
    message: impl FnOnce() -> String,
) -> Result<()> {
    if rule.test(value) {
        Err(ValidationError::new(rule.name(), message()))
    } else {
        Ok(())
    }
}

fn not_valid(label: &str, value: Option<&str>) -> String {
    format!("{label} \"{}\" is not valid.", value.unwrap_or_default())
}

#[derive(Debug, Clone, Default)]
pub struct RequestValidator {
    config: CompilerConfig,
}

impl RequestValidator {
    pub fn new(config: CompilerConfig) -> Self {
        Self { config }
    }

    /// Validate a whole cohort definition.
    pub fn validate(&self, request: &SearchRequest) -> Result<()> {
        if request.includes.is_empty() {
            return Err(ValidationError::new(
                "includes_empty",
                "Search includes are empty.",
            ));
        }
        let groups = request.includes.len() + request.excludes.len();
        if groups > self.config.max_groups {
            return Err(ValidationError::new(
                "too_many_groups",
                format!(
                    "Search has {groups} groups; at most {} are allowed.",
                    self.config.max_groups
                ),
            ));
        }

        for group in request.includes.iter().chain(&request.excludes) {
            if group.items.is_empty() {
                return Err(ValidationError::new(
                    "items_empty",
                    format!("Search items of group \"{}\" are empty.", group.id),
                ));
            }
            if group.items.len() > self.config.max_items_per_group {
                return Err(ValidationError::new(
                    "too_many_items",
                    format!(
                        "Group \"{}\" has {} items; at most {} are allowed.",
                        group.id,
                        group.items.len(),
                        self.config.max_items_per_group
                    ),
                ));
            }
            for item in &group.items {
                self.validate_item(item)?;
            }
        }
        debug!(groups, "criteria tree validated");
        Ok(())
    }

    /// Validate one item and return the family it dispatches to.
    pub fn validate_item(&self, item: &SearchGroupItem) -> Result<CriterionFamily> {
        self.validate_item_inner(item)
            .map_err(|err| err.with_item(item.id.clone()))
    }

    fn validate_item_inner(&self, item: &SearchGroupItem) -> Result<CriterionFamily> {
        let family = CriterionFamily::from_item_type(&item.item_type).ok_or_else(|| {
            ValidationError::new("item_type_invalid", not_valid("Item type", Some(&item.item_type)))
        })?;

        let params = item.search_parameters.as_slice();
        check(parameters_empty(), params, || {
            "Search parameters are empty.".to_string()
        })?;
        if params.len() > self.config.max_parameters_per_item {
            return Err(ValidationError::new(
                "too_many_parameters",
                format!(
                    "Item has {} parameters; at most {} are allowed.",
                    params.len(),
                    self.config.max_parameters_per_item
                ),
            ));
        }

        if !item.modifiers.is_empty() && !family.supports_modifiers() {
            return Err(ValidationError::new(
                "modifiers_unsupported",
                format!("Modifiers are not supported for {} items.", family.name()),
            ));
        }
        validate_modifiers(&item.modifiers)?;

        match family {
            CriterionFamily::Codes => each(params, validate_code),
            CriterionFamily::Demographic => {
                check(contains_age_and_dec(), params, || {
                    "Age and Deceased cannot be combined in one item.".to_string()
                })?;
                each(params, validate_demographic)
            }
            CriterionFamily::PhysicalMeasurement => each(params, validate_physical_measurement),
            CriterionFamily::Drug => each(params, validate_drug),
            CriterionFamily::Measurement => each(params, validate_measurement),
            CriterionFamily::Visit => each(params, validate_visit),
            CriterionFamily::Concept(domain) => each(params, |p| validate_concept(p, domain)),
        }?;
        Ok(family)
    }
}

/// Run `validate` on every criterion, tagging failures with its id.
fn each(params: &[SearchParameter], validate: impl Fn(&SearchParameter) -> Result<()>) -> Result<()> {
    for param in params {
        validate(param).map_err(|err| err.with_criterion(param.display_id()))?;
    }
    Ok(())
}

// ============================================================================
// Family bundles
// ============================================================================

fn validate_code(p: &SearchParameter) -> Result<()> {
    check(type_blank().or(code_type_invalid()), p, || {
        not_valid("Type", p.param_type.as_deref())
    })?;
    check(
        type_icd().and(subtype_blank().or(code_subtype_invalid())),
        p,
        || not_valid("Subtype", p.subtype.as_deref()),
    )?;
    check(domain_blank().or(domain_invalid()), p, || {
        not_valid("Domain", p.domain.as_deref())
    })?;
    check(param_child().and(code_blank()).and(concept_id_null()), p, || {
        not_valid("Concept id", None)
    })?;
    check(param_parent().and(code_blank()), p, || {
        not_valid("Code", p.value.as_deref())
    })
}

fn validate_demographic(p: &SearchParameter) -> Result<()> {
    check(type_blank().or(demo_type_invalid()), p, || {
        not_valid("Type", p.param_type.as_deref())
    })?;
    check(subtype_blank().or(demo_subtype_invalid()), p, || {
        not_valid("Subtype", p.subtype.as_deref())
    })?;
    check(subtype_gen_race_eth().and(concept_id_null()), p, || {
        "Provide a concept id for gender, race and ethnicity.".to_string()
    })?;
    check(subtype_dec().and(value_not_dec()), p, || {
        format!(
            "Value \"{}\" is not valid for subtype DEC; expected \"{DECEASED}\".",
            p.value_str()
        )
    })?;
    check(subtype_age().and(attributes_empty()), p, || {
        "Search attributes are empty.".to_string()
    })?;
    validate_attributes(p)?;
    if subtype_age().test(p) {
        for attribute in &p.attributes {
            check(not_age_column(), attribute, || {
                not_valid("Age attribute", attribute.name.as_deref())
            })?;
            check(operands_not_integers(), attribute, || {
                "Please provide whole numbers for age.".to_string()
            })?;
        }
    }
    Ok(())
}

fn validate_physical_measurement(p: &SearchParameter) -> Result<()> {
    check(type_blank().or(pm_type_invalid()), p, || {
        not_valid("Type", p.param_type.as_deref())
    })?;
    check(subtype_blank().or(pm_subtype_invalid()), p, || {
        not_valid("Subtype", p.subtype.as_deref())
    })?;
    check(concept_id_null(), p, || {
        "Provide a concept id for physical measurements.".to_string()
    })?;
    check(pm_subtype_with_attributes().and(attributes_empty()), p, || {
        "Search attributes are empty.".to_string()
    })?;
    check(
        subtype_bp().and(not_any_attr()).and(not_two_attributes()),
        p,
        || "Provide two attributes for Blood Pressure.".to_string(),
    )?;
    check(
        subtype_bp().and(not_any_attr()).and(not_systolic_and_diastolic()),
        p,
        || format!("Provide {SYSTOLIC} and {DIASTOLIC} attributes."),
    )?;
    check(
        pm_subtype_without_attributes().and(value_null().or(value_not_integer())),
        p,
        || format!("Value \"{}\" is not a valid concept id.", p.value_str()),
    )?;
    validate_attributes(p)
}

fn validate_drug(p: &SearchParameter) -> Result<()> {
    check(type_blank().or(drug_type_invalid()), p, || {
        not_valid("Type", p.param_type.as_deref())
    })?;
    check(concept_id_null(), p, || "Provide a concept id for drugs.".to_string())
}

fn validate_measurement(p: &SearchParameter) -> Result<()> {
    check(type_blank().or(meas_type_invalid()), p, || {
        not_valid("Type", p.param_type.as_deref())
    })?;
    check(concept_id_null(), p, || {
        "Provide a concept id for measurements.".to_string()
    })?;
    validate_attributes(p)
}

fn validate_visit(p: &SearchParameter) -> Result<()> {
    check(type_blank().or(visit_type_invalid()), p, || {
        not_valid("Type", p.param_type.as_deref())
    })?;
    check(concept_id_null(), p, || "Provide a concept id for visits.".to_string())
}

fn validate_concept(p: &SearchParameter, domain: Domain) -> Result<()> {
    check(type_blank(), p, || not_valid("Type", p.param_type.as_deref()))?;
    check(domain_blank().or(domain_invalid()), p, || {
        not_valid("Domain", p.domain.as_deref())
    })?;
    check(domain_mismatch(domain), p, || {
        format!("Domain \"{}\" does not match item domain {domain}.", p.domain_str())
    })?;
    check(concept_id_null(), p, || "Provide a concept id.".to_string())
}

// ============================================================================
// Attributes and modifiers
// ============================================================================

fn validate_attributes(p: &SearchParameter) -> Result<()> {
    p.attributes.iter().try_for_each(validate_attribute)
}

fn validate_attribute(a: &Attribute) -> Result<()> {
    if any_attribute().test(a) {
        return Ok(());
    }
    check(name_blank(), a, || "Please provide an attribute name.".to_string())?;
    check(operator_null(), a, || {
        "Please provide an attribute operator.".to_string()
    })?;
    check(operands_empty(), a, || {
        "Please provide one or more operands.".to_string()
    })?;
    check(like_operator(), a, || {
        "Operator LIKE is not supported for attributes.".to_string()
    })?;
    check(categorical_attribute().and(list_operator().not()), a, || {
        "Please provide the in operator when searching categorical attributes.".to_string()
    })?;
    check(between_operator().and(operands_not_two()), a, || {
        "Please provide two operands when using the between operator.".to_string()
    })?;
    check(
        between_operator().not().and(list_operator().not()).and(operands_not_one()),
        a,
        || "Please provide one operand for this operator.".to_string(),
    )?;
    check(operands_not_numbers(), a, || {
        "Please provide valid numeric operands.".to_string()
    })?;
    check(value_concept_attribute().and(operands_not_integers()), a, || {
        "Please provide concept ids as operands.".to_string()
    })
}

fn validate_modifiers(modifiers: &[Modifier]) -> Result<()> {
    let mut seen = HashSet::new();
    for modifier in modifiers {
        if !seen.insert(modifier.name) {
            return Err(ValidationError::new(
                "modifier_duplicate",
                format!("Modifier {} appears more than once.", modifier.name),
            ));
        }
        validate_modifier(modifier)?;
    }
    Ok(())
}

fn validate_modifier(m: &Modifier) -> Result<()> {
    check(operator_null(), m, || {
        format!("Please provide an operator for modifier {}.", m.name)
    })?;
    check(operands_empty(), m, || {
        format!("Please provide one or more operands for modifier {}.", m.name)
    })?;
    check(like_operator(), m, || {
        format!("Operator LIKE is not supported for modifier {}.", m.name)
    })?;
    check(between_operator().and(operands_not_two()), m, || {
        "Please provide two operands when using the between operator.".to_string()
    })?;
    check(
        between_operator().not().and(list_operator().not()).and(operands_not_one()),
        m,
        || format!("Please provide one operand for modifier {}.", m.name),
    )?;
    check(event_date_modifier().and(operands_not_dates()), m, || {
        "Please provide valid dates (yyyy-MM-dd) for modifier EVENT_DATE.".to_string()
    })?;
    check(event_date_modifier().not().and(operands_not_integers()), m, || {
        format!("Please provide whole-number operands for modifier {}.", m.name)
    })
}
