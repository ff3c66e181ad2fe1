//! Patterns and queries

use crate::attr::value::Attribute;
use std::collections::HashSet;

/// A template attribute (which may contain Variables at any depth) plus a
/// sequence of constraint strings evaluated after unification binds them.
#[derive(Debug, Clone, PartialEq)]
pub struct AttrPattern {
    pub template: Attribute,
    pub constraints: Vec<String>,
}

impl AttrPattern {
    pub fn new(template: Attribute) -> Self {
        Self {
            template,
            constraints: Vec::new(),
        }
    }

    pub fn with_constraints(template: Attribute, constraints: Vec<String>) -> Self {
        Self {
            template,
            constraints,
        }
    }

    /// All variable names appearing anywhere in the template.
    pub fn extract_variables(&self) -> HashSet<String> {
        collect_variables(&self.template)
    }
}

fn collect_variables(attr: &Attribute) -> HashSet<String> {
    let mut vars = HashSet::new();
    if let Some(name) = attr.as_variable_name() {
        vars.insert(name.to_string());
    }
    if let Some(children) = attr.as_nested() {
        for child in children {
            vars.extend(collect_variables(child));
        }
    }
    vars
}

/// A pattern paired with a sequence of query-engine condition strings.
#[derive(Debug, Clone, PartialEq)]
pub struct AttrQuery {
    pub pattern: AttrPattern,
    pub conditions: Vec<String>,
}

impl AttrQuery {
    pub fn new(pattern: AttrPattern) -> Self {
        Self {
            pattern,
            conditions: Vec::new(),
        }
    }

    pub fn with_conditions(pattern: AttrPattern, conditions: Vec<String>) -> Self {
        Self { pattern, conditions }
    }
}
