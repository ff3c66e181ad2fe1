//! Attribute value types
//!
//! The recursive tagged-union data model: an [`Attribute`] is a key paired
//! with a value that is either an atomic scalar, an unbound variable, or an
//! ordered sequence of child attributes.

use crate::error::{MemoryError, MemoryResult};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// A scalar value carried by an atomic attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "lowercase")]
pub enum Atom {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

impl Atom {
    /// Lift this atom to a floating point number for numeric comparison,
    /// per the data model's rule that numeric constraint/condition
    /// evaluation coerces atoms to float.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Atom::Int(i) => Some(*i as f64),
            Atom::Float(f) => Some(*f),
            Atom::Bool(_) | Atom::Str(_) => None,
        }
    }

    /// Canonical compact-string rendering of this atom.
    pub fn to_compact_string(&self) -> String {
        match self {
            Atom::Int(i) => i.to_string(),
            Atom::Float(f) => f.to_string(),
            Atom::Bool(b) => b.to_string(),
            Atom::Str(s) => format!("\"{s}\""),
        }
    }
}

impl std::fmt::Display for Atom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_compact_string())
    }
}

/// The value carried by an [`Attribute`]: an atom, an unbound variable, or
/// a nested sequence of child attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AttributeValue {
    Atom { data: Atom },
    Variable { name: String },
    Nested { attributes: Vec<Attribute> },
}

/// A key paired with a value and a construction timestamp.
///
/// Attributes are immutable after construction; every transforming
/// operation (union, unify, substitute, ...) produces a new `Attribute`.
/// Equality (`PartialEq`) is structural over `(key, value)` only, ignoring
/// `timestamp` — use [`Attribute::identical_to`] when timestamp must also
/// match (serialization round-trip tests).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attribute {
    pub key: String,
    pub value: AttributeValue,
    pub timestamp: f64,
}

impl PartialEq for Attribute {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.value == other.value
    }
}

fn now_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

impl Attribute {
    /// Construct an atomic attribute, stamped with the current time.
    pub fn atom(key: impl Into<String>, value: Atom) -> Self {
        Self {
            key: key.into(),
            value: AttributeValue::Atom { data: value },
            timestamp: now_seconds(),
        }
    }

    /// Construct a variable attribute. `name` must be non-empty.
    pub fn variable(key: impl Into<String>, name: impl Into<String>) -> MemoryResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(MemoryError::InvalidInput(
                "variable name must be non-empty".into(),
            ));
        }
        Ok(Self {
            key: key.into(),
            value: AttributeValue::Variable { name },
            timestamp: now_seconds(),
        })
    }

    /// Construct a nested attribute from child attributes, preserving
    /// insertion order.
    pub fn nested(key: impl Into<String>, children: Vec<Attribute>) -> Self {
        Self {
            key: key.into(),
            value: AttributeValue::Nested {
                attributes: children,
            },
            timestamp: now_seconds(),
        }
    }

    /// Construct with an explicit timestamp (used by substitution and
    /// reconstruction code that must preserve the original timestamp).
    pub fn with_timestamp(key: impl Into<String>, value: AttributeValue, timestamp: f64) -> Self {
        Self {
            key: key.into(),
            value,
            timestamp,
        }
    }

    pub fn is_atomic(&self) -> bool {
        matches!(self.value, AttributeValue::Atom { .. })
    }

    pub fn is_variable(&self) -> bool {
        matches!(self.value, AttributeValue::Variable { .. })
    }

    pub fn is_nested(&self) -> bool {
        matches!(self.value, AttributeValue::Nested { .. })
    }

    pub fn as_atom(&self) -> Option<&Atom> {
        match &self.value {
            AttributeValue::Atom { data } => Some(data),
            _ => None,
        }
    }

    pub fn as_variable_name(&self) -> Option<&str> {
        match &self.value {
            AttributeValue::Variable { name } => Some(name),
            _ => None,
        }
    }

    pub fn as_nested(&self) -> Option<&[Attribute]> {
        match &self.value {
            AttributeValue::Nested { attributes } => Some(attributes),
            _ => None,
        }
    }

    /// First child matching `key`, under insertion order.
    pub fn child(&self, key: &str) -> Option<&Attribute> {
        self.as_nested()?.iter().find(|c| c.key == key)
    }

    /// Collect every key reachable from this attribute, including itself,
    /// transitively through nested children.
    pub fn all_keys(&self) -> Vec<String> {
        let mut keys = vec![self.key.clone()];
        if let Some(children) = self.as_nested() {
            for child in children {
                keys.extend(child.all_keys());
            }
        }
        keys
    }

    /// Tree depth: a leaf (atom or variable) has depth 1.
    pub fn depth(&self) -> usize {
        match self.as_nested() {
            None => 1,
            Some(children) => 1 + children.iter().map(Attribute::depth).max().unwrap_or(0),
        }
    }

    /// Structural equality including the timestamp.
    pub fn identical_to(&self, other: &Attribute) -> bool {
        self == other && self.timestamp == other.timestamp
    }

    /// Canonical compact string form, used for equality-by-string,
    /// de-duplication, and pattern signatures.
    pub fn to_compact_string(&self) -> String {
        match &self.value {
            AttributeValue::Atom { data } => format!("{}:{}", self.key, data.to_compact_string()),
            AttributeValue::Variable { name } => format!("{}:?{}", self.key, name),
            AttributeValue::Nested { attributes } => {
                let children = attributes
                    .iter()
                    .map(Attribute::to_compact_string)
                    .collect::<Vec<_>>()
                    .join(",");
                format!("{}:[{}]", self.key, children)
            }
        }
    }
}

impl std::fmt::Display for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_compact_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_compact_string() {
        let a = Attribute::atom("rpm", Atom::Int(9500));
        assert_eq!(a.to_compact_string(), "rpm:9500");
    }

    #[test]
    fn string_atom_is_quoted() {
        let a = Attribute::atom("name", Atom::Str("bob".into()));
        assert_eq!(a.to_compact_string(), "name:\"bob\"");
    }

    #[test]
    fn variable_compact_string() {
        let a = Attribute::variable("rpm", "x").unwrap();
        assert_eq!(a.to_compact_string(), "rpm:?x");
    }

    #[test]
    fn empty_variable_name_rejected() {
        assert!(Attribute::variable("rpm", "").is_err());
    }

    #[test]
    fn nested_compact_string_preserves_order() {
        let nested = Attribute::nested(
            "engine",
            vec![
                Attribute::atom("rpm", Atom::Int(9500)),
                Attribute::atom("temp", Atom::Int(80)),
            ],
        );
        assert_eq!(nested.to_compact_string(), "engine:[rpm:9500,temp:80]");
    }

    #[test]
    fn equality_ignores_timestamp() {
        let a = Attribute::with_timestamp("rpm", AttributeValue::Atom { data: Atom::Int(1) }, 1.0);
        let b = Attribute::with_timestamp("rpm", AttributeValue::Atom { data: Atom::Int(1) }, 2.0);
        assert_eq!(a, b);
        assert!(!a.identical_to(&b));
    }

    #[test]
    fn depth_and_keys() {
        let nested = Attribute::nested(
            "car",
            vec![Attribute::nested(
                "engine",
                vec![Attribute::atom("rpm", Atom::Int(1))],
            )],
        );
        assert_eq!(nested.depth(), 3);
        assert_eq!(nested.all_keys(), vec!["car", "engine", "rpm"]);
    }

    #[test]
    fn child_lookup_first_match() {
        let nested = Attribute::nested(
            "car",
            vec![
                Attribute::atom("color", Atom::Str("red".into())),
                Attribute::atom("color", Atom::Str("blue".into())),
            ],
        );
        let found = nested.child("color").unwrap();
        assert_eq!(found.as_atom(), Some(&Atom::Str("red".into())));
    }

    #[test]
    fn round_trip_json() {
        let nested = Attribute::nested(
            "car",
            vec![Attribute::atom("rpm", Atom::Int(9500))],
        );
        let json = serde_json::to_string(&nested).unwrap();
        let back: Attribute = serde_json::from_str(&json).unwrap();
        assert!(back.identical_to(&nested));
    }
}
