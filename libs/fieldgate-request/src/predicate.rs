//! Primitive runtime type predicates.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::tree::{Scalar, Tree};

/// Runtime type of a leaf field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypePredicate {
    String,
    Number,
    Boolean,
    /// Any string chrono understands as a date or date-time.
    Date,
    /// Strict ISO-8601: RFC 3339 date-time or `YYYY-MM-DD`.
    IsoDate,
}

impl TypePredicate {
    #[must_use]
    pub fn check(self, value: &Scalar) -> bool {
        match self {
            TypePredicate::String => is_string(value),
            TypePredicate::Number => is_number(value),
            TypePredicate::Boolean => is_boolean(value),
            TypePredicate::Date => is_date(value),
            TypePredicate::IsoDate => is_iso_date(value),
        }
    }
}

impl fmt::Display for TypePredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypePredicate::String => write!(f, "string"),
            TypePredicate::Number => write!(f, "number"),
            TypePredicate::Boolean => write!(f, "boolean"),
            TypePredicate::Date => write!(f, "date"),
            TypePredicate::IsoDate => write!(f, "iso date"),
        }
    }
}

/// Validates the opaque `data` payload carried by computed-field comparisons.
pub type DataPredicate = fn(&Tree) -> bool;

#[must_use]
pub fn is_string(value: &Scalar) -> bool {
    matches!(value, Scalar::String(_))
}

#[must_use]
pub fn is_number(value: &Scalar) -> bool {
    matches!(value, Scalar::Number(n) if n.is_finite())
}

#[must_use]
pub fn is_boolean(value: &Scalar) -> bool {
    matches!(value, Scalar::Bool(_))
}

const LOOSE_DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y/%m/%d %H:%M:%S"];
const LOOSE_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y"];

#[must_use]
pub fn is_date(value: &Scalar) -> bool {
    let Scalar::String(s) = value else {
        return false;
    };
    if is_iso_date(value) {
        return true;
    }
    LOOSE_DATETIME_FORMATS
        .iter()
        .any(|fmt| NaiveDateTime::parse_from_str(s, fmt).is_ok())
        || LOOSE_DATE_FORMATS
            .iter()
            .any(|fmt| NaiveDate::parse_from_str(s, fmt).is_ok())
}

#[must_use]
pub fn is_iso_date(value: &Scalar) -> bool {
    let Scalar::String(s) = value else {
        return false;
    };
    DateTime::parse_from_rfc3339(s).is_ok() || NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
}

/// Data predicate for `{latitude, longitude}` reference points, the usual payload of
/// distance-style computed fields.
#[must_use]
pub fn is_coordinates(data: &Tree) -> bool {
    let coordinate = |key: &str| {
        data.get(key)
            .and_then(Tree::as_scalar)
            .is_some_and(is_number)
    };
    coordinate("latitude") && coordinate("longitude")
}
