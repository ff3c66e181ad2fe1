//! Query Engine (component G)
//!
//! Orchestrates a four-phase search — episodic, concept, schema, then
//! condition filtering — across the other three stores, de-duplicating by
//! canonical compact string and recording rolling statistics.

use crate::attr::{match_pattern, unify, AttrPath, AttrQuery, Attribute, AttributeValue, Bindings};
use crate::error::{MemoryError, MemoryResult};
use crate::memory::concepts::ConceptStore;
use crate::memory::episodic::EpisodicStore;
use crate::memory::schemas::SchemaCache;
use std::collections::HashSet;
use std::time::{Duration, Instant};

/// Result of executing a query across all memory tiers.
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub success: bool,
    pub matches: Vec<Attribute>,
    pub bindings: Vec<Bindings>,
    pub concepts_activated: Vec<String>,
    pub schemas_used: Vec<String>,
    pub execution_time: Duration,
    pub query_id: String,
}

impl QueryResult {
    pub fn best_match(&self) -> Option<&Attribute> {
        self.matches.first()
    }

    /// All distinct values ever bound to each variable, across every match.
    pub fn all_bindings(&self) -> std::collections::HashMap<String, HashSet<String>> {
        let mut by_var: std::collections::HashMap<String, HashSet<String>> =
            std::collections::HashMap::new();
        for binding in &self.bindings {
            for (var, value) in binding {
                by_var
                    .entry(var.clone())
                    .or_default()
                    .insert(value_to_compact(value));
            }
        }
        by_var
    }
}

/// A single planned step of a [`QueryPlan`].
#[derive(Debug, Clone)]
pub struct PlanStep {
    pub description: String,
    pub cost: f64,
}

/// An informational execution plan. Execution is never
/// constrained to follow it.
#[derive(Debug, Clone)]
pub struct QueryPlan {
    pub query_id: String,
    pub steps: Vec<PlanStep>,
    pub estimated_cost: f64,
}

impl QueryPlan {
    fn add_step(&mut self, description: impl Into<String>, cost: f64) {
        self.steps.push(PlanStep {
            description: description.into(),
            cost,
        });
        self.estimated_cost += cost;
    }
}

/// Rolling query-engine statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryStatistics {
    pub total_queries: u64,
    pub successful_queries: u64,
    pub average_execution_time: Duration,
}

impl Default for QueryStatistics {
    fn default() -> Self {
        Self {
            total_queries: 0,
            successful_queries: 0,
            average_execution_time: Duration::ZERO,
        }
    }
}

pub struct QueryEngine {
    statistics: QueryStatistics,
}

impl Default for QueryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryEngine {
    pub fn new() -> Self {
        Self {
            statistics: QueryStatistics::default(),
        }
    }

    /// Execute a query across episodic, concept, and schema tiers, in that
    /// order, then apply conditions and de-duplicate. Any per-phase
    /// failure is contained: the engine returns an unsuccessful result
    /// rather than propagating.
    #[allow(clippy::too_many_arguments)]
    pub fn query(
        &mut self,
        query: &AttrQuery,
        query_id: impl Into<String>,
        episodic: &EpisodicStore,
        concepts: Option<&ConceptStore>,
        schemas: Option<&SchemaCache>,
    ) -> QueryResult {
        let start = Instant::now();
        let query_id = query_id.into();

        let result = self.run_phases(query, episodic, concepts, schemas);

        let (matches, bindings, concepts_activated, schemas_used) = match result {
            Ok(parts) => parts,
            Err(_) => (Vec::new(), Vec::new(), Vec::new(), Vec::new()),
        };

        let execution_time = start.elapsed();
        let success = !matches.is_empty();
        self.record(success, execution_time);

        QueryResult {
            success,
            matches,
            bindings,
            concepts_activated,
            schemas_used,
            execution_time,
            query_id,
        }
    }

    #[allow(clippy::type_complexity)]
    fn run_phases(
        &self,
        query: &AttrQuery,
        episodic: &EpisodicStore,
        concepts: Option<&ConceptStore>,
        schemas: Option<&SchemaCache>,
    ) -> MemoryResult<(Vec<Attribute>, Vec<Bindings>, Vec<String>, Vec<String>)> {
        let mut matches = Vec::new();
        let mut bindings = Vec::new();

        // Phase 1: episodic, newest first.
        for (entry, entry_bindings) in episodic.search_pattern(&query.pattern, None) {
            matches.push(entry.attr.clone());
            bindings.push(entry_bindings);
        }

        // Phase 2: concept, restricted to concepts compatible with the
        // query template.
        let mut concepts_activated = Vec::new();
        if let Some(concepts) = concepts {
            for concept in concepts.all() {
                if !unify(&query.pattern.template, &concept.pattern.template).success {
                    continue;
                }
                concepts_activated.push(concept.name.clone());
                for instance in &concept.instances {
                    let result = match_pattern(&query.pattern, instance);
                    if result.success {
                        matches.push(instance.clone());
                        bindings.push(result.bindings);
                    }
                }
            }
        }

        // Phase 3: schema, symmetric to concepts.
        let mut schemas_used = Vec::new();
        if let Some(schemas) = schemas {
            for (schema, _) in schemas.find_matching_schemas(&query.pattern.template) {
                schemas_used.push(schema.name.clone());
                for instance in &schema.instances {
                    let result = match_pattern(&query.pattern, instance);
                    if result.success {
                        matches.push(instance.clone());
                        bindings.push(result.bindings);
                    }
                }
            }
        }

        // Phase 4: conditions.
        if !query.conditions.is_empty() {
            let mut filtered_matches = Vec::new();
            let mut filtered_bindings = Vec::new();
            for (m, b) in matches.into_iter().zip(bindings.into_iter()) {
                let mut keep = true;
                for condition in &query.conditions {
                    if !evaluate_condition(condition, &b)? {
                        keep = false;
                        break;
                    }
                }
                if keep {
                    filtered_matches.push(m);
                    filtered_bindings.push(b);
                }
            }
            matches = filtered_matches;
            bindings = filtered_bindings;
        }

        // De-duplication by canonical compact string, first-seen order.
        let mut seen = HashSet::new();
        let mut unique_matches = Vec::new();
        let mut unique_bindings = Vec::new();
        for (m, b) in matches.into_iter().zip(bindings.into_iter()) {
            if seen.insert(m.to_compact_string()) {
                unique_matches.push(m);
                unique_bindings.push(b);
            }
        }

        concepts_activated.sort();
        concepts_activated.dedup();
        schemas_used.sort();
        schemas_used.dedup();

        Ok((unique_matches, unique_bindings, concepts_activated, schemas_used))
    }

    /// Resolve a path over a specific attribute, or over the 1000 most
    /// recent episodic entries when no source is given.
    pub fn path_query(
        &mut self,
        path: &AttrPath,
        source: Option<&Attribute>,
        episodic: &EpisodicStore,
        query_id: impl Into<String>,
    ) -> QueryResult {
        let start = Instant::now();
        let query_id = query_id.into();
        let mut matches = Vec::new();

        match source {
            Some(attr) => {
                if path.resolve(attr).is_some() {
                    matches.push(attr.clone());
                }
            }
            None => {
                for entry in episodic.get_recent(1000) {
                    if path.resolve(&entry.attr).is_some() {
                        matches.push(entry.attr.clone());
                    }
                }
            }
        }

        let execution_time = start.elapsed();
        let success = !matches.is_empty();
        self.record(success, execution_time);
        let bindings = vec![Bindings::new(); matches.len()];

        QueryResult {
            success,
            matches,
            bindings,
            concepts_activated: Vec::new(),
            schemas_used: Vec::new(),
            execution_time,
            query_id,
        }
    }

    /// Build an informational execution plan for `query`.
    pub fn create_query_plan(&self, query: &AttrQuery, query_id: impl Into<String>) -> QueryPlan {
        let mut plan = QueryPlan {
            query_id: query_id.into(),
            steps: Vec::new(),
            estimated_cost: 0.0,
        };

        plan.add_step("search episodic memory for direct matches", 1.0);

        if !query.pattern.extract_variables().is_empty() {
            plan.add_step("search concept store for pattern matches", 2.0);
        }

        plan.add_step("search schema cache for structural matches", 1.5);

        if !query.conditions.is_empty() {
            plan.add_step(
                format!("apply {} conditions to filter results", query.conditions.len()),
                0.5 * query.conditions.len() as f64,
            );
        }

        plan
    }

    fn record(&mut self, success: bool, execution_time: Duration) {
        self.statistics.total_queries += 1;
        if success {
            self.statistics.successful_queries += 1;
        }

        let n = self.statistics.total_queries;
        let prior_total = self.statistics.average_execution_time.as_secs_f64() * (n - 1) as f64;
        let new_average = (prior_total + execution_time.as_secs_f64()) / n as f64;
        self.statistics.average_execution_time = Duration::from_secs_f64(new_average.max(0.0));
    }

    pub fn statistics(&self) -> QueryStatistics {
        self.statistics.clone()
    }
}

fn value_to_compact(value: &AttributeValue) -> String {
    match value {
        AttributeValue::Atom { data } => data.to_compact_string(),
        AttributeValue::Variable { name } => format!("?{name}"),
        AttributeValue::Nested { attributes } => {
            let parts: Vec<String> = attributes.iter().map(Attribute::to_compact_string).collect();
            format!("[{}]", parts.join(","))
        }
    }
}

/// Evaluate one condition string of the form `?name OP literal`
/// Condition DSL). Unlike the lightweight constraint layer in the algebra
/// module, this is the strict filter: an unrecognized operator is an
/// `InvalidInput` error, not a silent pass.
/// A condition referencing an unbound variable fails the row (returns
/// `Ok(false)`), rather than erroring.
fn evaluate_condition(condition: &str, bindings: &Bindings) -> MemoryResult<bool> {
    const OPERATORS: [&str; 6] = [" >= ", " <= ", " != ", " > ", " < ", " = "];

    let trimmed = condition.trim();
    let Some((op, left, right)) = OPERATORS.iter().find_map(|op| {
        trimmed
            .split_once(op)
            .map(|(l, r)| (op.trim(), l.trim(), r.trim()))
    }) else {
        return Err(MemoryError::InvalidInput(format!(
            "malformed condition (no recognized operator): {condition:?}"
        )));
    };

    let Some(var_name) = left.strip_prefix('?') else {
        return Err(MemoryError::InvalidInput(format!(
            "condition left-hand side must reference a binding: {condition:?}"
        )));
    };

    let Some(bound) = bindings.get(var_name) else {
        return Ok(false);
    };

    if let Some(string_literal) = right
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
    {
        let AttributeValue::Atom { data } = bound else {
            return Ok(false);
        };
        let crate::attr::Atom::Str(s) = data else {
            return Ok(false);
        };
        return Ok(match op {
            "=" => s == string_literal,
            "!=" => s != string_literal,
            _ => {
                return Err(MemoryError::InvalidInput(format!(
                    "operator {op} is not valid for string literals: {condition:?}"
                )))
            }
        });
    }

    let Ok(threshold) = right.parse::<f64>() else {
        return Err(MemoryError::InvalidInput(format!(
            "right-hand side is neither a quoted string nor a number: {condition:?}"
        )));
    };

    let AttributeValue::Atom { data } = bound else {
        return Ok(false);
    };
    let Some(value) = data.as_f64() else {
        return Ok(false);
    };

    Ok(match op {
        ">" => value > threshold,
        "<" => value < threshold,
        ">=" => value >= threshold,
        "<=" => value <= threshold,
        "=" => (value - threshold).abs() < f64::EPSILON,
        "!=" => (value - threshold).abs() >= f64::EPSILON,
        _ => unreachable!("operator set is exhaustive"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attr::{Atom, AttrPattern, AttrQuery, Attribute};

    fn rpm_obs(value: i64) -> Attribute {
        Attribute::nested("motor", vec![Attribute::atom("rpm", Atom::Int(value))])
    }

    fn rpm_pattern() -> AttrPattern {
        AttrPattern::new(Attribute::nested(
            "motor",
            vec![Attribute::variable("rpm", "x").unwrap()],
        ))
    }

    // S6: Condition filter.
    #[test]
    fn s6_condition_filter_keeps_matches_above_threshold() {
        let mut episodic = EpisodicStore::new(10);
        episodic.store(rpm_obs(8000), None);
        episodic.store(rpm_obs(9500), None);
        episodic.store(rpm_obs(12000), None);

        let query = AttrQuery::with_conditions(rpm_pattern(), vec!["?x > 9000".to_string()]);
        let mut engine = QueryEngine::new();
        let result = engine.query(&query, "q1", &episodic, None, None);

        assert_eq!(result.matches.len(), 2);
        for m in &result.matches {
            let rpm = m.child("rpm").unwrap().as_atom().unwrap();
            assert!(matches!(rpm, Atom::Int(v) if *v > 9000));
        }
    }

    #[test]
    fn unbound_variable_condition_fails_row() {
        let mut episodic = EpisodicStore::new(10);
        episodic.store(rpm_obs(1), None);

        let query = AttrQuery::with_conditions(rpm_pattern(), vec!["?y > 0".to_string()]);
        let mut engine = QueryEngine::new();
        let result = engine.query(&query, "q1", &episodic, None, None);
        assert!(result.matches.is_empty());
        assert!(!result.success);
    }

    #[test]
    fn malformed_condition_is_invalid_input() {
        let bindings = Bindings::new();
        let err = evaluate_condition("?x ~~ 1", &bindings).unwrap_err();
        assert!(matches!(err, MemoryError::InvalidInput(_)));
    }

    #[test]
    fn string_equality_condition() {
        let mut bindings = Bindings::new();
        bindings.insert(
            "name".to_string(),
            AttributeValue::Atom { data: Atom::Str("bob".to_string()) },
        );
        assert!(evaluate_condition(r#"?name = "bob""#, &bindings).unwrap());
        assert!(!evaluate_condition(r#"?name = "alice""#, &bindings).unwrap());
    }

    #[test]
    fn dedup_preserves_first_seen_order() {
        let mut episodic = EpisodicStore::new(10);
        episodic.store(rpm_obs(1), None);
        episodic.store(rpm_obs(1), None);
        episodic.store(rpm_obs(2), None);

        let query = AttrQuery::new(rpm_pattern());
        let mut engine = QueryEngine::new();
        let result = engine.query(&query, "q1", &episodic, None, None);
        assert_eq!(result.matches.len(), 2);
    }

    #[test]
    fn query_plan_costs_scale_with_variables_and_conditions() {
        let query = AttrQuery::with_conditions(rpm_pattern(), vec!["?x > 1".to_string()]);
        let engine = QueryEngine::new();
        let plan = engine.create_query_plan(&query, "plan_1");
        // episodic (1.0) + concept (2.0, has variables) + schema (1.5) + condition (0.5*1)
        assert!((plan.estimated_cost - 5.0).abs() < 1e-9);
    }

    #[test]
    fn statistics_track_success_rate() {
        let mut episodic = EpisodicStore::new(10);
        episodic.store(rpm_obs(1), None);

        let mut engine = QueryEngine::new();
        engine.query(&AttrQuery::new(rpm_pattern()), "q1", &episodic, None, None);
        engine.query(
            &AttrQuery::new(AttrPattern::new(Attribute::variable("truck", "z").unwrap())),
            "q2",
            &episodic,
            None,
            None,
        );

        let stats = engine.statistics();
        assert_eq!(stats.total_queries, 2);
        assert_eq!(stats.successful_queries, 1);
    }
}
