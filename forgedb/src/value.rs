//! The value model: a tagged union of the six kinds a cell can hold, plus
//! the coercions applied when a literal is written into a typed column.

use std::collections::BTreeSet;
use std::fmt;

use serde_derive::{Deserialize, Serialize};

/// A single cell. Exactly one of null, int, double, text, a set of text,
/// or a fixed-length vector of doubles.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Int(i64),
    Double(f64),
    Text(String),
    /// An ordered (lexicographically, via `BTreeSet`) set of text, the
    /// backing representation for `GSET`-merged columns.
    SetText(BTreeSet<String>),
    Vector(Vec<f64>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Best-effort conversion to `f64`, used by aggregates and ordering.
    /// Non-numeric values are not contributors.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_vector(&self) -> Option<&[f64]> {
        match self {
            Value::Vector(v) => Some(v),
            _ => None,
        }
    }

    /// The canonical encoding used for group keys, join keys, and the
    /// snapshot cell payload: a one-character tag followed by the
    /// textual value. Distinct types never collide, e.g. int `1` does
    /// not hash the same as double `1.0`.
    pub fn canonical_encoding(&self) -> String {
        match self {
            Value::Null => "n:".to_string(),
            Value::Int(i) => format!("i:{}", i),
            Value::Double(d) => format!("f:{}", d),
            Value::Text(s) => format!("s:{}", s),
            Value::SetText(set) => {
                format!("g:{}", set.iter().cloned().collect::<Vec<_>>().join(","))
            }
            Value::Vector(v) => format!(
                "v:{}",
                v.iter().map(|d| d.to_string()).collect::<Vec<_>>().join(",")
            ),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Int(i) => write!(f, "{}", i),
            Value::Double(d) => write!(f, "{}", d),
            Value::Text(s) => write!(f, "{}", s),
            Value::SetText(set) => {
                write!(f, "{{{}}}", set.iter().cloned().collect::<Vec<_>>().join(","))
            }
            Value::Vector(v) => write!(
                f,
                "[{}]",
                v.iter().map(|d| d.to_string()).collect::<Vec<_>>().join(",")
            ),
        }
    }
}

/// A column's declared type. `Vector` carries its fixed dimension.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Int,
    Double,
    Text,
    SetText,
    Vector(usize),
}

impl ColumnType {
    /// The integer tag used by the snapshot format (§6.4), in the
    /// declaration order of this enum.
    pub fn type_tag(&self) -> i32 {
        match self {
            ColumnType::Int => 0,
            ColumnType::Double => 1,
            ColumnType::Text => 2,
            ColumnType::SetText => 3,
            ColumnType::Vector(_) => 4,
        }
    }

    pub fn from_tag(tag: i32, vector_dim: usize) -> Option<Self> {
        match tag {
            0 => Some(ColumnType::Int),
            1 => Some(ColumnType::Double),
            2 => Some(ColumnType::Text),
            3 => Some(ColumnType::SetText),
            4 => Some(ColumnType::Vector(vector_dim)),
            _ => None,
        }
    }
}

/// Coerce a literal `Value` on write into the target column type. Only the
/// conversions spelled out in §3 are allowed; anything else yields `Null`
/// so the caller can fail the statement with a type error.
pub fn coerce(value: &Value, target: ColumnType) -> Value {
    match (value, target) {
        (Value::Null, _) => Value::Null,

        (Value::Int(_), ColumnType::Int) => value.clone(),
        (Value::Double(d), ColumnType::Int) => Value::Int(*d as i64),
        (Value::Text(s), ColumnType::Int) => {
            s.trim().parse::<i64>().map(Value::Int).unwrap_or(Value::Null)
        }

        (Value::Double(_), ColumnType::Double) => value.clone(),
        (Value::Int(i), ColumnType::Double) => Value::Double(*i as f64),
        (Value::Text(s), ColumnType::Double) => {
            s.trim().parse::<f64>().map(Value::Double).unwrap_or(Value::Null)
        }

        (Value::Text(_), ColumnType::Text) => value.clone(),
        (Value::Int(i), ColumnType::Text) => Value::Text(i.to_string()),
        (Value::Double(d), ColumnType::Text) => Value::Text(d.to_string()),

        (Value::Text(s), ColumnType::SetText) => {
            let mut set = BTreeSet::new();
            set.insert(s.clone());
            Value::SetText(set)
        }
        (Value::SetText(_), ColumnType::SetText) => value.clone(),

        (Value::Vector(v), ColumnType::Vector(dim)) if v.len() == dim => value.clone(),

        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn coerce_int_to_text() {
        assert_eq!(coerce(&Value::Int(42), ColumnType::Text), Value::Text("42".to_string()));
    }

    #[test]
    fn coerce_text_to_double() {
        assert_eq!(coerce(&Value::Text("3.5".to_string()), ColumnType::Double), Value::Double(3.5));
    }

    #[test]
    fn coerce_vector_wrong_dim_is_null() {
        assert_eq!(coerce(&Value::Vector(vec![1.0, 2.0]), ColumnType::Vector(3)), Value::Null);
    }

    #[test]
    fn coerce_text_to_set_is_singleton() {
        let mut expect = BTreeSet::new();
        expect.insert("a".to_string());
        assert_eq!(coerce(&Value::Text("a".to_string()), ColumnType::SetText), Value::SetText(expect));
    }

    #[test]
    fn canonical_encoding_distinguishes_int_and_double() {
        assert_ne!(Value::Int(1).canonical_encoding(), Value::Double(1.0).canonical_encoding());
    }
}
