//! Value validation for filterable fields.

use crate::filter::{ComparisonValue, Operator};
use crate::predicate::TypePredicate;
use crate::tree::{Scalar, Tree};

/// What a field may be filtered by, beyond plain `equals`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FilterCapabilities {
    /// `equals` accepts a list of values (SQL `IN`).
    pub by_list_of_value: bool,
    /// Ordering operators and `between`.
    pub by_range_of_value: bool,
}

impl FilterCapabilities {
    pub const NONE: Self = Self {
        by_list_of_value: false,
        by_range_of_value: false,
    };

    pub const ALL: Self = Self {
        by_list_of_value: true,
        by_range_of_value: true,
    };

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn by_list(mut self) -> Self {
        self.by_list_of_value = true;
        self
    }

    #[must_use]
    pub fn by_range(mut self) -> Self {
        self.by_range_of_value = true;
        self
    }
}

/// Pairs a type predicate with the capabilities of one field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Validator {
    predicate: TypePredicate,
    capabilities: FilterCapabilities,
}

impl Validator {
    #[must_use]
    pub fn new(predicate: TypePredicate, capabilities: FilterCapabilities) -> Self {
        Self {
            predicate,
            capabilities,
        }
    }

    #[must_use]
    pub fn predicate(&self) -> TypePredicate {
        self.predicate
    }

    #[must_use]
    pub fn capabilities(&self) -> FilterCapabilities {
        self.capabilities
    }

    #[must_use]
    pub fn accepts(&self, op: Operator) -> bool {
        match op {
            Operator::Equals => true,
            Operator::Contains => self.predicate == TypePredicate::String,
            _ => op.is_range() && self.capabilities.by_range_of_value,
        }
    }

    /// Operators this field accepts, in declaration order.
    #[must_use]
    pub fn operators(&self) -> Vec<Operator> {
        Operator::ALL.into_iter().filter(|op| self.accepts(*op)).collect()
    }

    /// Type-check `value` for `op`. The error is a human readable reason.
    pub fn validate(&self, op: Operator, value: &Tree) -> Result<ComparisonValue, String> {
        if !self.accepts(op) {
            return Err(format!("operator `{op}` is not allowed on this field"));
        }
        match (op, value) {
            (Operator::Equals, Tree::Leaf(Scalar::Null)) => Ok(ComparisonValue::Single(Scalar::Null)),
            (Operator::Equals, Tree::Array(items)) => {
                if !self.capabilities.by_list_of_value {
                    return Err("filtering by a list of values is not allowed on this field".into());
                }
                items
                    .iter()
                    .map(|item| self.scalar(item))
                    .collect::<Result<Vec<_>, _>>()
                    .map(ComparisonValue::List)
            }
            (Operator::Between, Tree::Array(items)) => match items.as_slice() {
                [only] => {
                    let v = self.scalar(only)?;
                    Ok(ComparisonValue::List(vec![v.clone(), v]))
                }
                [low, high] => Ok(ComparisonValue::List(vec![self.scalar(low)?, self.scalar(high)?])),
                _ => Err(format!("`between` expects 2 values, got {}", items.len())),
            },
            (Operator::Between, leaf @ Tree::Leaf(_)) => {
                let v = self.scalar(leaf)?;
                Ok(ComparisonValue::List(vec![v.clone(), v]))
            }
            (_, leaf @ Tree::Leaf(_)) => self.scalar(leaf).map(ComparisonValue::Single),
            (_, Tree::Array(_)) => Err(format!("operator `{op}` expects a single value")),
            (_, Tree::Object(_)) => Err("expected a value, got an object".into()),
        }
    }

    fn scalar(&self, value: &Tree) -> Result<Scalar, String> {
        match value {
            Tree::Leaf(s) if self.predicate.check(s) => Ok(s.clone()),
            Tree::Leaf(s) => Err(format!("expected {} value, got {}", self.predicate, s.kind())),
            _ => Err(format!("expected {} value", self.predicate)),
        }
    }
}
