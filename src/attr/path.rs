//! Dot-separated path parsing and resolution (projection)

use crate::attr::value::{Attribute, AttributeValue};
use crate::error::{MemoryError, MemoryResult};

/// An ordered, non-empty sequence of key segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrPath {
    segments: Vec<String>,
}

impl AttrPath {
    /// Parse a dot-separated path string. `.` is the only separator;
    /// segment characters are otherwise unconstrained.
    pub fn parse(path: &str) -> MemoryResult<Self> {
        let segments: Vec<String> = path.split('.').map(str::to_string).collect();
        if segments.is_empty() || segments.iter().any(|s| s.is_empty()) {
            return Err(MemoryError::InvalidInput(format!(
                "malformed path: {path:?}"
            )));
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Resolve this path against an attribute. The root's own key must
    /// equal the first segment; each subsequent segment is searched for as
    /// a first-matching child key within a `Nested` value.
    pub fn resolve(&self, attr: &Attribute) -> Option<AttributeValue> {
        let (first, rest) = self.segments.split_first()?;
        if attr.key != *first {
            return None;
        }
        let mut current = attr;
        for segment in rest {
            current = current.child(segment)?;
        }
        Some(current.value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attr::value::Atom;

    fn car() -> Attribute {
        Attribute::nested(
            "car",
            vec![Attribute::nested(
                "engine",
                vec![
                    Attribute::atom("rpm", Atom::Int(9500)),
                    Attribute::atom("temp", Atom::Int(80)),
                ],
            )],
        )
    }

    #[test]
    fn resolves_nested_path() {
        let path = AttrPath::parse("car.engine.rpm").unwrap();
        let resolved = path.resolve(&car()).unwrap();
        assert_eq!(resolved, AttributeValue::Atom { data: Atom::Int(9500) });
    }

    #[test]
    fn missing_segment_is_none() {
        let path = AttrPath::parse("car.engine.power").unwrap();
        assert!(path.resolve(&car()).is_none());
    }

    #[test]
    fn root_key_mismatch_is_none() {
        let path = AttrPath::parse("truck.engine.rpm").unwrap();
        assert!(path.resolve(&car()).is_none());
    }

    #[test]
    fn empty_path_is_invalid() {
        assert!(AttrPath::parse("").is_err());
        assert!(AttrPath::parse("car..rpm").is_err());
    }
}
