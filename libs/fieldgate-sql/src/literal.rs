//! SQL literal rendering.
//!
//! Values reach SQL text only through this module: strings are single-quoted with
//! embedded quotes doubled, `LIKE` patterns escape their wildcards with `!`.

use fieldgate_request::Scalar;
use serde_json::Value;

/// Escape character used in every generated `LIKE ... ESCAPE` clause.
pub const LIKE_ESCAPE: char = '!';

/// Quote `s` as a SQL string literal.
#[must_use]
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for ch in s.chars() {
        if ch == '\'' {
            out.push('\'');
        }
        out.push(ch);
    }
    out.push('\'');
    out
}

/// Render a number without a trailing `.0` when it is integral.
#[must_use]
pub fn number(n: f64) -> String {
    if !n.is_finite() {
        return "NULL".to_owned();
    }
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        // integral and exactly representable
        #[allow(clippy::cast_possible_truncation)]
        let whole = n as i64;
        return whole.to_string();
    }
    n.to_string()
}

/// Render a scalar. Booleans become `1`/`0`.
#[must_use]
pub fn scalar(value: &Scalar) -> String {
    match value {
        Scalar::Null => "NULL".to_owned(),
        Scalar::Bool(b) => if *b { "1" } else { "0" }.to_owned(),
        Scalar::Number(n) => number(*n),
        Scalar::String(s) => quote(s),
    }
}

/// Render a JSON value read back from the database, e.g. a parent key.
///
/// Returns `None` for null and composite values, which cannot be keys.
#[must_use]
pub fn json(value: &Value) -> Option<String> {
    match value {
        Value::Bool(b) => Some(if *b { "1" } else { "0" }.to_owned()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(quote(s)),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Escape `LIKE` wildcards (and the escape character itself) in `s`.
#[must_use]
pub fn like_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        if matches!(ch, '%' | '_') || ch == LIKE_ESCAPE {
            out.push(LIKE_ESCAPE);
        }
        out.push(ch);
    }
    out
}

/// `lhs LIKE '%s%' ESCAPE '!'` with `s` matched literally.
#[must_use]
pub fn like_contains(lhs: &str, s: &str) -> String {
    format!(
        "{lhs} LIKE {} ESCAPE '{LIKE_ESCAPE}'",
        quote(&format!("%{}%", like_escape(s)))
    )
}
