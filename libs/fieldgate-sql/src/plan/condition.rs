//! One comparison → one SQL predicate.

use fieldgate_request::{Comparison, ComparisonValue, Operator, Scalar};

use crate::convert::ToDb;
use crate::literal;

fn symbol(operator: Operator) -> Option<&'static str> {
    match operator {
        Operator::GreaterThan => Some(">"),
        Operator::GreaterThanOrEquals => Some(">="),
        Operator::LesserThan => Some("<"),
        Operator::LesserThanOrEquals => Some("<="),
        Operator::Equals | Operator::Between | Operator::Contains => None,
    }
}

/// Predicate on `lhs` for `comparison`, values converted with `to_db`.
///
/// `None` when the value shape does not fit the operator.
#[must_use]
pub fn comparison_sql(lhs: &str, comparison: &Comparison, to_db: ToDb) -> Option<String> {
    let lit = |value: &Scalar| literal::scalar(&to_db(value));
    match (comparison.operator, &comparison.value) {
        (Operator::Equals, ComparisonValue::Single(Scalar::Null)) => Some(format!("{lhs} IS NULL")),
        (Operator::Equals, ComparisonValue::Single(value)) => Some(format!("{lhs} = {}", lit(value))),
        // IN () matches nothing
        (Operator::Equals, ComparisonValue::List(values)) if values.is_empty() => Some("1=0".to_owned()),
        (Operator::Equals, ComparisonValue::List(values)) => Some(format!(
            "{lhs} IN ({})",
            values.iter().map(lit).collect::<Vec<_>>().join(", ")
        )),
        (Operator::Between, ComparisonValue::List(values)) => match values.as_slice() {
            [low, high] => Some(format!("{lhs} BETWEEN {} AND {}", lit(low), lit(high))),
            _ => None,
        },
        (Operator::Contains, ComparisonValue::Single(Scalar::String(needle))) => {
            Some(literal::like_contains(lhs, needle))
        }
        (operator, ComparisonValue::Single(value)) if !value.is_null() => {
            symbol(operator).map(|op| format!("{lhs} {op} {}", lit(value)))
        }
        _ => None,
    }
}
