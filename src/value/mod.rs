//! # Value Model
//!
//! The engine's universal output shape: a [`Row`] is an ordered mapping from
//! column name to [`Value`]; a [`Value`] is a small tagged union covering
//! everything a JFR field or pipeline computation can produce.
//!
//! ## Usage
//!
//! ```rust
//! use jfrpath::value::{Row, Value};
//!
//! let mut row = Row::new();
//! row.insert("bytes", Value::Int(1500));
//! row.insert("path", Value::Str("/var/log/app.log".into()));
//!
//! assert_eq!(row.get("bytes"), Some(&Value::Int(1500)));
//! ```

use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;

/// A dynamically-typed value produced while navigating or aggregating a
/// recording. Schema-free by design — the engine never needs reflection over
/// a fixed Rust type to represent an arbitrary JFR field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Row(Row),
    List(Vec<Value>),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Best-effort coercion to `f64`, used by numeric aggregates. Non-numeric
    /// values (including null) yield `None` rather than panicking — callers
    /// that need strict numeric input surface their own `TypeMismatch`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_row(&self) -> Option<&Row> {
        match self {
            Value::Row(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// A short, human-readable type name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::Str(_) => "string",
            Value::Row(_) => "row",
            Value::List(_) => "list",
        }
    }

    /// Stringify for display purposes (string templates, `toMap` keys, CSV
    /// cells produced upstream of rendering). Never fails.
    pub fn display_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Str(s) => s.clone(),
            Value::Row(_) => "<row>".to_string(),
            Value::List(items) => format!("<list:{}>", items.len()),
        }
    }

    /// A total-order sort key used by `groupBy(sortBy=key)` so that mixed-type
    /// keys still produce a deterministic order; see DESIGN.md for why this
    /// total-order scheme was chosen over leaving mixed-type ordering
    /// unspecified.
    ///
    /// Keys are grouped by a type tag first (null < bool < number < string <
    /// other), then compared within the tag; numbers are formatted with a
    /// fixed-width, sign-aware encoding so that string comparison of the key
    /// matches numeric comparison of the value.
    pub fn sort_key(&self) -> String {
        match self {
            Value::Null => "0".to_string(),
            Value::Bool(b) => format!("1{}", u8::from(*b)),
            Value::Int(i) => format!("2{}", encode_sortable_number(*i as f64)),
            Value::Float(f) => format!("2{}", encode_sortable_number(*f)),
            Value::Str(s) => format!("3{s}"),
            Value::Row(_) | Value::List(_) => format!("4{}", self.display_string()),
        }
    }
}

/// Encodes a float so that its lexicographic string order matches its
/// numeric order: offset by a large bias, zero-padded, with negatives
/// additionally inverted so "more negative" still sorts first.
fn encode_sortable_number(f: f64) -> String {
    const BIAS: f64 = 1e15;
    let shifted = f + BIAS;
    format!("{shifted:030.6}")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_string())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<Row> for Value {
    fn from(v: Row) -> Self {
        Value::Row(v)
    }
}

/// Numeric comparison used by predicate operators and `top`/`groupBy`
/// ordering. Returns `None` when the two values aren't numerically
/// comparable (different non-numeric kinds, or a numeric vs. a string).
pub fn numeric_partial_cmp(a: &Value, b: &Value) -> Option<Ordering> {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x.partial_cmp(&y),
        _ => match (a, b) {
            (Value::Str(x), Value::Str(y)) => Some(x.cmp(y)),
            (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
            _ => None,
        },
    }
}

// ============================================================================
// Row
// ============================================================================

/// An ordered mapping from column name to [`Value`].
///
/// Insertion order is significant (it drives default column display) and
/// column names are unique — re-inserting a name overwrites the prior value
/// in place rather than appending a duplicate, which is exactly what
/// `IndexMap::insert` already does.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: IndexMap<String, Value>,
}

impl Row {
    pub fn new() -> Self {
        Row {
            columns: IndexMap::new(),
        }
    }

    pub fn with_capacity(cap: usize) -> Self {
        Row {
            columns: IndexMap::with_capacity(cap),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.columns.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns.get(name)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, String, Value> {
        self.columns.iter()
    }

    pub fn keys(&self) -> indexmap::map::Keys<'_, String, Value> {
        self.columns.keys()
    }

    /// The value of the single column, when a row carries exactly one. This
    /// is what pipeline stages consult when an operator's argument path is
    /// omitted (e.g. `sum()` after a leaf-scalar projection).
    pub fn single_value(&self) -> Option<&Value> {
        if self.columns.len() == 1 {
            self.columns.values().next()
        } else {
            None
        }
    }

    /// The first column's value, regardless of row width. Used by operators
    /// documented to fall back to "the first column" (e.g. `top(n)` without
    /// `by=`).
    pub fn first_value(&self) -> Option<&Value> {
        self.columns.values().next()
    }

    pub fn first_numeric_column(&self) -> Option<(&str, &Value)> {
        self.columns
            .iter()
            .find(|(_, v)| v.as_f64().is_some())
            .map(|(k, v)| (k.as_str(), v))
    }
}

impl Serialize for Row {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.columns.serialize(serializer)
    }
}

impl FromIterator<(String, Value)> for Row {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Row {
            columns: IndexMap::from_iter(iter),
        }
    }
}

impl IntoIterator for Row {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn row_preserves_insertion_order() {
        let mut row = Row::new();
        row.insert("c", Value::Int(3));
        row.insert("a", Value::Int(1));
        row.insert("b", Value::Int(2));

        let names: Vec<_> = row.keys().collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }

    #[test]
    fn row_insert_overwrites_same_key() {
        let mut row = Row::new();
        row.insert("x", Value::Int(1));
        row.insert("x", Value::Int(2));
        assert_eq!(row.len(), 1);
        assert_eq!(row.get("x"), Some(&Value::Int(2)));
    }

    #[test]
    fn numeric_partial_cmp_coerces_int_float() {
        assert_eq!(
            numeric_partial_cmp(&Value::Int(2), &Value::Float(2.0)),
            Some(Ordering::Equal)
        );
        assert_eq!(
            numeric_partial_cmp(&Value::Int(1), &Value::Float(2.0)),
            Some(Ordering::Less)
        );
    }

    #[test]
    fn numeric_partial_cmp_rejects_mixed_kinds() {
        assert_eq!(
            numeric_partial_cmp(&Value::Int(1), &Value::Str("a".into())),
            None
        );
    }

    #[test]
    fn sort_key_orders_numbers_correctly() {
        let mut values = vec![Value::Int(10), Value::Int(-5), Value::Float(0.5)];
        values.sort_by_key(Value::sort_key);
        assert_eq!(values, vec![Value::Int(-5), Value::Float(0.5), Value::Int(10)]);
    }

    #[test]
    fn sort_key_groups_by_type_tag() {
        let null_key = Value::Null.sort_key();
        let bool_key = Value::Bool(true).sort_key();
        let int_key = Value::Int(0).sort_key();
        let str_key = Value::Str("x".into()).sort_key();
        let mut keys = vec![str_key.clone(), int_key.clone(), bool_key.clone(), null_key.clone()];
        keys.sort();
        assert_eq!(keys, vec![null_key, bool_key, int_key, str_key]);
    }

    proptest! {
        // The whole point of `encode_sortable_number`'s bias-and-pad scheme is
        // that lexicographic key order matches numeric order for any pair of
        // floats within the encodable range; bounded well inside BIAS so the
        // shifted value never goes negative or overflows the field width.
        #[test]
        fn sort_key_matches_numeric_order_for_bounded_floats(a in -1.0e9f64..1.0e9, b in -1.0e9f64..1.0e9) {
            let key_a = Value::Float(a).sort_key();
            let key_b = Value::Float(b).sort_key();
            prop_assert_eq!(a.partial_cmp(&b).unwrap(), key_a.cmp(&key_b));
        }
    }
}
