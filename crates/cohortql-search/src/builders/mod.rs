//! Per-family plan builders.
//!
//! Each builder turns the criteria of one validated item into a
//! [`PersonSet`](cohortql_core::PersonSet). Builders never emit SQL; the
//! renderer does that from the plan.

pub mod codes;
pub mod concept;
pub mod demographic;
pub mod measurement;
pub mod modifiers;
pub mod physical;

use cohortql_core::{Attribute, Comparison, CoreError, Operator};

use crate::error::{CompileError, Result};

/// Parse a numeric operand.
pub(crate) fn number(operand: &str) -> Result<f64> {
    operand
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| CoreError::invalid_operand(operand, "number").into())
}

/// Parse a whole-number operand. Fractions and out-of-range values are
/// rejected, never truncated.
pub(crate) fn integer(operand: &str) -> Result<i64> {
    operand
        .trim()
        .parse::<i64>()
        .map_err(|_| CoreError::invalid_operand(operand, "integer").into())
}

pub(crate) fn numbers(operands: &[String]) -> Result<Vec<f64>> {
    operands.iter().map(|o| number(o)).collect()
}

pub(crate) fn integers(operands: &[String]) -> Result<Vec<i64>> {
    operands.iter().map(|o| integer(o)).collect()
}

pub(crate) fn require_operator(operator: Option<Operator>, owner: &str) -> Result<Operator> {
    operator.ok_or_else(|| CompileError::compilation(format!("{owner} has no operator")))
}

/// Numeric comparison carried by an attribute.
pub(crate) fn attribute_comparison(attribute: &Attribute) -> Result<Comparison<f64>> {
    let operator = require_operator(
        attribute.operator,
        &format!("attribute \"{}\"", attribute.name_str()),
    )?;
    Ok(Comparison::new(operator, numbers(&attribute.operands)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operand_parsing() {
        assert_eq!(number(" 7.5 ").unwrap(), 7.5);
        assert_eq!(integer(" 18 ").unwrap(), 18);
        assert!(matches!(
            number("high"),
            Err(CompileError::Core(CoreError::InvalidOperand { .. }))
        ));
        assert!(number("NaN").is_err());
        assert_eq!(
            integers(&["1".to_string(), "2".to_string()]).unwrap(),
            vec![1, 2]
        );
    }

    #[test]
    fn test_integer_operands_are_not_truncated() {
        for operand in ["18.9", "1e30", "99999999999999999999", "eighteen"] {
            assert!(
                matches!(
                    integer(operand),
                    Err(CompileError::Core(CoreError::InvalidOperand { .. }))
                ),
                "{operand} should be rejected"
            );
        }
        assert!(integers(&["1".to_string(), "2.5".to_string()]).is_err());
    }

    #[test]
    fn test_attribute_comparison() {
        let attr = Attribute::new("NUM", Operator::Between, &["1", "2.5"]);
        let comparison = attribute_comparison(&attr).unwrap();
        assert_eq!(comparison.operator, Operator::Between);
        assert_eq!(comparison.operands, vec![1.0, 2.5]);

        let bare = Attribute::default();
        assert!(matches!(
            attribute_comparison(&bare),
            Err(CompileError::Compilation(_))
        ));
    }
}
