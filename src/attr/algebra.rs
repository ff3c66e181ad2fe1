//! Symbolic algebra operations
//!
//! Union (∪), subsumption (⊆), unification (≈), projection (.), and
//! generalization. All operations here are pure and side-effect free.

use crate::attr::path::AttrPath;
use crate::attr::pattern::AttrPattern;
use crate::attr::value::{Atom, Attribute, AttributeValue};
use crate::error::{MemoryError, MemoryResult};
use std::collections::HashMap;

/// Variable bindings produced by unification.
pub type Bindings = HashMap<String, AttributeValue>;

/// Result of unifying a pattern against data.
#[derive(Debug, Clone)]
pub struct UnificationResult {
    pub success: bool,
    pub bindings: Bindings,
    pub unified: Option<Attribute>,
}

impl UnificationResult {
    fn fail(bindings: Bindings) -> Self {
        Self {
            success: false,
            bindings,
            unified: None,
        }
    }

    fn ok(bindings: Bindings, unified: Attribute) -> Self {
        Self {
            success: true,
            bindings,
            unified: Some(unified),
        }
    }
}

/// Union (∪): merge two attribute structures sharing a key.
///
/// Atomic ∪ atomic: right overwrites. Atomic ∪ nested: nested wins.
/// Nested ∪ nested: merge children by key, recursing on collision and
/// otherwise preserving left-then-new-right insertion order. Variable on
/// either side yields the other side.
pub fn union(a: &Attribute, b: &Attribute) -> MemoryResult<Attribute> {
    if a.key != b.key {
        return Err(MemoryError::InvalidInput(format!(
            "cannot union attributes with different keys: {} vs {}",
            a.key, b.key
        )));
    }

    if a.is_variable() {
        return Ok(b.clone());
    }
    if b.is_variable() {
        return Ok(a.clone());
    }

    match (a.is_atomic(), b.is_atomic(), a.is_nested(), b.is_nested()) {
        (true, true, _, _) => Ok(Attribute::atom(
            a.key.clone(),
            b.as_atom().expect("checked atomic").clone(),
        )),
        (true, false, _, true) => Ok(b.clone()),
        (false, true, true, _) => Ok(Attribute::atom(
            a.key.clone(),
            b.as_atom().expect("checked atomic").clone(),
        )),
        (false, false, true, true) => {
            let mut order: Vec<String> = Vec::new();
            let mut merged: HashMap<String, Attribute> = HashMap::new();

            for child in a.as_nested().expect("checked nested") {
                if !merged.contains_key(&child.key) {
                    order.push(child.key.clone());
                }
                merged.insert(child.key.clone(), child.clone());
            }
            for child in b.as_nested().expect("checked nested") {
                if let Some(existing) = merged.get(&child.key) {
                    let recursed = union(existing, child)?;
                    merged.insert(child.key.clone(), recursed);
                } else {
                    order.push(child.key.clone());
                    merged.insert(child.key.clone(), child.clone());
                }
            }

            let children = order
                .into_iter()
                .map(|k| merged.remove(&k).expect("key present"))
                .collect();
            Ok(Attribute::nested(a.key.clone(), children))
        }
        _ => Err(MemoryError::InvalidInput(format!(
            "cannot union incompatible value types for key {}",
            a.key
        ))),
    }
}

/// Subsumption (⊆): does `contained` have, for every attribute of
/// `container`, a corresponding attribute whose value recursively
/// subsumes the container's?
pub fn subsumes(container: &Attribute, contained: &Attribute) -> bool {
    if container.key != contained.key && !container.is_variable() {
        return false;
    }

    if container.is_variable() {
        return true;
    }

    if container.is_atomic() {
        return contained.is_atomic() && container.as_atom() == contained.as_atom();
    }

    if container.is_nested() {
        let Some(contained_children) = contained.as_nested() else {
            return false;
        };
        let contained_by_key: HashMap<&str, &Attribute> = contained_children
            .iter()
            .map(|a| (a.key.as_str(), a))
            .collect();

        for container_child in container.as_nested().expect("checked nested") {
            match contained_by_key.get(container_child.key.as_str()) {
                Some(contained_child) => {
                    if !subsumes(container_child, contained_child) {
                        return false;
                    }
                }
                None => return false,
            }
        }
        return true;
    }

    false
}

/// Unification (≈): single-sided pattern matching. Only `pattern` may
/// contain Variables.
pub fn unify(pattern: &Attribute, data: &Attribute) -> UnificationResult {
    unify_with(pattern, data, Bindings::new())
}

/// Unify reusing an existing bindings map (for recursive calls across a
/// pattern's siblings).
pub fn unify_with(pattern: &Attribute, data: &Attribute, mut bindings: Bindings) -> UnificationResult {
    if pattern.key != data.key {
        return UnificationResult::fail(bindings);
    }

    if let Some(var_name) = pattern.as_variable_name() {
        if let Some(existing) = bindings.get(var_name) {
            if *existing != data.value {
                return UnificationResult::fail(bindings);
            }
        } else {
            bindings.insert(var_name.to_string(), data.value.clone());
        }
        return UnificationResult::ok(bindings, data.clone());
    }

    if pattern.is_atomic() && data.is_atomic() {
        return if pattern.as_atom() == data.as_atom() {
            UnificationResult::ok(bindings, data.clone())
        } else {
            UnificationResult::fail(bindings)
        };
    }

    if pattern.is_nested() && data.is_nested() {
        let data_children = data.as_nested().expect("checked nested");
        let data_by_key: HashMap<&str, &Attribute> =
            data_children.iter().map(|a| (a.key.as_str(), a)).collect();
        let mut unified_children = Vec::new();

        for pattern_child in pattern.as_nested().expect("checked nested") {
            let Some(data_child) = data_by_key.get(pattern_child.key.as_str()) else {
                return UnificationResult::fail(bindings);
            };
            let result = unify_with(pattern_child, data_child, bindings);
            if !result.success {
                return result;
            }
            bindings = result.bindings;
            unified_children.push(result.unified.expect("success implies unified"));
        }

        let pattern_keys: std::collections::HashSet<&str> = pattern
            .as_nested()
            .expect("checked nested")
            .iter()
            .map(|a| a.key.as_str())
            .collect();
        for data_child in data_children {
            if !pattern_keys.contains(data_child.key.as_str()) {
                unified_children.push(data_child.clone());
            }
        }

        let unified = Attribute::nested(pattern.key.clone(), unified_children);
        return UnificationResult::ok(bindings, unified);
    }

    UnificationResult::fail(bindings)
}

/// Projection (.): resolve a path against an attribute.
pub fn project(attr: &Attribute, path: &AttrPath) -> Option<AttributeValue> {
    path.resolve(attr)
}

/// Pattern match: unify the pattern's template against data, then evaluate
/// every constraint. A constraint referencing an unbound variable is
/// conservative and evaluates to true here — the Query Engine's condition
/// layer is the strict filter.
pub fn match_pattern(pattern: &AttrPattern, data: &Attribute) -> UnificationResult {
    let result = unify(&pattern.template, data);
    if !result.success {
        return result;
    }

    for constraint in &pattern.constraints {
        if !evaluate_constraint(constraint, &result.bindings) {
            return UnificationResult::fail(result.bindings);
        }
    }

    result
}

/// Evaluate a pattern constraint (conservative form: `>` and `=` only,
/// defaulting to true when the constraint doesn't reference a bound
/// variable or isn't one of the two recognized operators). This mirrors
/// the lightweight pre-unification constraint layer; the stricter,
/// exhaustive condition DSL lives in the query engine.
fn evaluate_constraint(constraint: &str, bindings: &Bindings) -> bool {
    if let Some((left, right)) = constraint.split_once('>') {
        let (left, right) = (left.trim(), right.trim());
        if let Some(var) = left.strip_prefix('?') {
            if let Some(AttributeValue::Atom { data }) = bindings.get(var) {
                if let (Some(value), Ok(threshold)) = (data.as_f64(), right.parse::<f64>()) {
                    return value > threshold;
                }
            }
        }
        return true;
    }

    if let Some((left, right)) = constraint.split_once('=') {
        let (left, right) = (left.trim(), right.trim());
        if let Some(var) = left.strip_prefix('?') {
            if let Some(AttributeValue::Atom { data }) = bindings.get(var) {
                return data.to_compact_string().trim_matches(|c| c == '"' || c == '\'')
                    == right.trim_matches(|c| c == '"' || c == '\'');
            }
        }
        return true;
    }

    true
}

/// Generalize a set of attributes into a pattern that unifies with every
/// one of them.
pub fn generalize(attrs: &[Attribute]) -> Option<AttrPattern> {
    match attrs {
        [] => None,
        [single] => Some(generalize_single(single)),
        many => {
            let root_key = &many[0].key;
            if !many.iter().all(|a| a.key == *root_key) {
                return None;
            }

            if many.iter().all(Attribute::is_atomic) {
                let var_name = format!("var_{root_key}");
                let template = Attribute::variable(root_key.clone(), var_name).ok()?;
                return Some(AttrPattern::new(template));
            }

            if many.iter().all(Attribute::is_nested) {
                return Some(AttrPattern::new(generalize_nested_many(root_key, many)));
            }

            None
        }
    }
}

/// Deep generalization for multiple Nested inputs sharing a root key: for
/// each child key present in every input's direct children, recursively
/// generalize that child across all inputs' matching children; children
/// not present in every input fall back to a single-input generalization
/// over their first occurrence (still sound: unmatched data children are
/// preserved, never required, by `unify`).
fn generalize_nested_many(root_key: &str, attrs: &[Attribute]) -> Attribute {
    let mut order: Vec<String> = Vec::new();
    let mut seen: std::collections::HashSet<String> = std::collections::HashSet::new();
    for attr in attrs {
        if let Some(children) = attr.as_nested() {
            for child in children {
                if seen.insert(child.key.clone()) {
                    order.push(child.key.clone());
                }
            }
        }
    }

    let mut template_children = Vec::new();
    for key in order {
        let matching: Vec<Attribute> = attrs
            .iter()
            .filter_map(|a| a.child(&key).cloned())
            .collect();

        let present_in_all = matching.len() == attrs.len();
        let child_template = if present_in_all {
            generalize(&matching)
                .map(|p| p.template)
                .unwrap_or_else(|| generalize_single(&matching[0]).template)
        } else {
            generalize_single(&matching[0]).template
        };
        template_children.push(child_template);
    }

    Attribute::nested(root_key, template_children)
}

fn generalize_single(attr: &Attribute) -> AttrPattern {
    if attr.is_atomic() {
        let var_name = format!("var_{}", attr.key);
        let template = Attribute::variable(attr.key.clone(), var_name)
            .expect("generated variable name is non-empty");
        return AttrPattern::new(template);
    }

    if let Some(children) = attr.as_nested() {
        let generalized_children = children
            .iter()
            .map(|c| generalize_single(c).template)
            .collect();
        return AttrPattern::new(Attribute::nested(attr.key.clone(), generalized_children));
    }

    // Already a variable.
    AttrPattern::new(attr.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attr::value::Atom;

    fn motor_rpm(rpm: i64, temp: i64) -> Attribute {
        Attribute::nested(
            "motor",
            vec![
                Attribute::atom("rpm", Atom::Int(rpm)),
                Attribute::atom("temp", Atom::Int(temp)),
            ],
        )
    }

    // S1: Unification binding.
    #[test]
    fn s1_unification_binding() {
        let data = motor_rpm(12000, 85);
        let pattern = Attribute::nested(
            "motor",
            vec![Attribute::variable("rpm", "x").unwrap()],
        );
        let result = unify(&pattern, &data);
        assert!(result.success);
        assert_eq!(
            result.bindings.get("x"),
            Some(&AttributeValue::Atom { data: Atom::Int(12000) })
        );
        let unified = result.unified.unwrap();
        assert_eq!(unified.child("temp").unwrap().as_atom(), Some(&Atom::Int(85)));
    }

    // S2: Path projection - see attr::path tests; covered there directly.

    // S3: Union merge, child order rpm before temp.
    #[test]
    fn s3_union_merge_order() {
        let a = Attribute::nested(
            "car",
            vec![Attribute::nested(
                "engine",
                vec![Attribute::atom("rpm", Atom::Int(9500))],
            )],
        );
        let b = Attribute::nested(
            "car",
            vec![Attribute::nested(
                "engine",
                vec![Attribute::atom("temp", Atom::Int(80))],
            )],
        );
        let merged = union(&a, &b).unwrap();
        let engine = merged.child("engine").unwrap();
        let keys: Vec<&str> = engine
            .as_nested()
            .unwrap()
            .iter()
            .map(|a| a.key.as_str())
            .collect();
        assert_eq!(keys, vec!["rpm", "temp"]);
    }

    #[test]
    fn union_different_keys_errors() {
        let a = Attribute::atom("a", Atom::Int(1));
        let b = Attribute::atom("b", Atom::Int(2));
        assert!(union(&a, &b).is_err());
    }

    #[test]
    fn union_atomic_right_overwrites() {
        let a = Attribute::atom("rpm", Atom::Int(1));
        let b = Attribute::atom("rpm", Atom::Int(2));
        let merged = union(&a, &b).unwrap();
        assert_eq!(merged.as_atom(), Some(&Atom::Int(2)));
    }

    // S4: Subsumption.
    #[test]
    fn s4_subsumption() {
        let container = Attribute::nested(
            "motor",
            vec![Attribute::variable("rpm", "x").unwrap()],
        );
        let contained = motor_rpm(12000, 85);
        assert!(subsumes(&container, &contained));

        let container2 = Attribute::nested("motor", vec![Attribute::atom("rpm", Atom::Int(9000))]);
        let contained2 = Attribute::nested("motor", vec![Attribute::atom("rpm", Atom::Int(12000))]);
        assert!(!subsumes(&container2, &contained2));
    }

    #[test]
    fn subsumption_reflexive_and_transitive() {
        let a = motor_rpm(1, 2);
        assert!(subsumes(&a, &a));

        let b = Attribute::nested("motor", vec![Attribute::atom("rpm", Atom::Int(1))]);
        let c = motor_rpm(1, 2);
        assert!(subsumes(&b, &c));
        assert!(subsumes(&b, &b));
    }

    #[test]
    fn generalize_single_atomic() {
        let pattern = generalize(&[Attribute::atom("rpm", Atom::Int(1))]).unwrap();
        assert_eq!(pattern.template.as_variable_name(), Some("var_rpm"));
    }

    // Property 5: generalization is sound.
    #[test]
    fn generalize_many_atomic_is_sound() {
        let instances = vec![motor_rpm(1, 1), motor_rpm(2, 2), motor_rpm(3, 3)];
        let pattern = generalize(&instances).unwrap();
        for instance in &instances {
            assert!(unify(&pattern.template, instance).success);
        }
    }

    #[test]
    fn generalize_many_nested_is_sound_and_deep() {
        let instances = vec![
            Attribute::nested(
                "sensor",
                vec![
                    Attribute::atom("reading", Atom::Float(1.0)),
                    Attribute::atom("unit", Atom::Str("c".into())),
                ],
            ),
            Attribute::nested(
                "sensor",
                vec![
                    Attribute::atom("reading", Atom::Float(2.0)),
                    Attribute::atom("unit", Atom::Str("c".into())),
                ],
            ),
        ];
        let pattern = generalize(&instances).unwrap();
        // Deep generalization: the nested child "reading" becomes a variable,
        // not the whole template collapsed to the first instance verbatim.
        let reading = pattern.template.child("reading").unwrap();
        assert!(reading.is_variable());
        for instance in &instances {
            assert!(unify(&pattern.template, instance).success);
        }
    }

    #[test]
    fn generalize_empty_is_none() {
        assert!(generalize(&[]).is_none());
    }
}
