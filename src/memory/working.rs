//! Working Memory (component F)
//!
//! Per-query scratch space: partial variable bindings, intermediate
//! results, and a small set of cross-query global bindings. Query
//! contexts expire on a wall-clock timeout, using an `Instant`/`Duration`
//! elapsed-time check rather than the source's `time.time()` float
//! subtraction.

use crate::attr::{AttrPattern, AttrQuery, Attribute, AttributeValue};
use std::collections::HashMap;
use std::time::{Duration, Instant};

pub struct WorkingMemoryEntry {
    pub query_id: String,
    pub pattern: AttrPattern,
    pub bindings: HashMap<String, AttributeValue>,
    pub partial_matches: Vec<Attribute>,
    pub created_at: Instant,
    pub last_accessed: Instant,
}

pub struct QueryContext {
    pub query_id: String,
    pub original_query: AttrQuery,
    pub current_step: usize,
    pub max_steps: usize,
    pub intermediate_results: Vec<HashMap<String, AttributeValue>>,
    pub started_at: Instant,
    pub timeout: Duration,
}

impl QueryContext {
    pub fn is_expired(&self) -> bool {
        self.started_at.elapsed() > self.timeout
    }

    pub fn add_result(&mut self, bindings: HashMap<String, AttributeValue>) {
        self.intermediate_results.push(bindings);
        self.current_step += 1;
    }

    pub fn is_complete(&self) -> bool {
        self.current_step >= self.max_steps
    }
}

/// Snapshot statistics over working memory.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkingMemoryStatistics {
    pub active_queries: usize,
    pub total_entries: usize,
    pub global_bindings: usize,
    pub total_local_bindings: usize,
    pub total_partial_matches: usize,
    pub capacity: usize,
}

pub struct WorkingMemory {
    entries: HashMap<String, WorkingMemoryEntry>,
    query_contexts: HashMap<String, QueryContext>,
    global_bindings: HashMap<String, AttributeValue>,
    max_entries: usize,
    default_timeout: Duration,
}

impl WorkingMemory {
    pub fn new(max_entries: usize, default_timeout: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            query_contexts: HashMap::new(),
            global_bindings: HashMap::new(),
            max_entries: max_entries.max(1),
            default_timeout,
        }
    }

    /// Create a new query context for multi-step reasoning; returns its id.
    pub fn create_query_context(
        &mut self,
        query: AttrQuery,
        max_steps: usize,
        timeout: Option<Duration>,
    ) -> String {
        let query_id = format!("query_{}", uuid::Uuid::new_v4());
        let context = QueryContext {
            query_id: query_id.clone(),
            original_query: query,
            current_step: 0,
            max_steps,
            intermediate_results: Vec::new(),
            started_at: Instant::now(),
            timeout: timeout.unwrap_or(self.default_timeout),
        };
        self.query_contexts.insert(query_id.clone(), context);
        query_id
    }

    /// Fetch a query context, evicting it first if it has expired.
    pub fn get_query_context(&mut self, query_id: &str) -> Option<&QueryContext> {
        if self.query_contexts.get(query_id)?.is_expired() {
            self.query_contexts.remove(query_id);
            return None;
        }
        self.query_contexts.get(query_id)
    }

    pub fn update_bindings(
        &mut self,
        query_id: &str,
        new_bindings: HashMap<String, AttributeValue>,
    ) -> bool {
        let Some(entry) = self.entries.get_mut(query_id) else {
            return false;
        };
        entry.bindings.extend(new_bindings.clone());
        entry.last_accessed = Instant::now();

        if let Some(context) = self.query_contexts.get_mut(query_id) {
            context.add_result(new_bindings);
        }
        true
    }

    pub fn add_partial_match(&mut self, query_id: &str, matched: Attribute) -> bool {
        let Some(entry) = self.entries.get_mut(query_id) else {
            return false;
        };
        entry.partial_matches.push(matched);
        entry.last_accessed = Instant::now();
        true
    }

    /// Create a new entry, evicting the least-recently-accessed one if
    /// this pushes the store over capacity.
    pub fn create_entry(
        &mut self,
        query_id: impl Into<String>,
        pattern: AttrPattern,
        initial_bindings: HashMap<String, AttributeValue>,
    ) {
        let query_id = query_id.into();
        let now = Instant::now();
        let entry = WorkingMemoryEntry {
            query_id: query_id.clone(),
            pattern,
            bindings: initial_bindings,
            partial_matches: Vec::new(),
            created_at: now,
            last_accessed: now,
        };
        self.entries.insert(query_id, entry);

        if self.entries.len() > self.max_entries {
            self.evict_oldest();
        }
    }

    pub fn get_entry(&mut self, query_id: &str) -> Option<&WorkingMemoryEntry> {
        let entry = self.entries.get_mut(query_id)?;
        entry.last_accessed = Instant::now();
        Some(entry)
    }

    pub fn get_bindings(&mut self, query_id: &str) -> HashMap<String, AttributeValue> {
        match self.entries.get_mut(query_id) {
            Some(entry) => {
                entry.last_accessed = Instant::now();
                entry.bindings.clone()
            }
            None => HashMap::new(),
        }
    }

    pub fn set_global_binding(&mut self, variable: impl Into<String>, value: AttributeValue) {
        self.global_bindings.insert(variable.into(), value);
    }

    pub fn get_global_binding(&self, variable: &str) -> Option<&AttributeValue> {
        self.global_bindings.get(variable)
    }

    /// Resolve a variable from query-local bindings first, falling back to
    /// globals.
    pub fn resolve_variable(&self, query_id: &str, variable: &str) -> Option<&AttributeValue> {
        if let Some(entry) = self.entries.get(query_id) {
            if let Some(value) = entry.bindings.get(variable) {
                return Some(value);
            }
        }
        self.global_bindings.get(variable)
    }

    /// Substitute bound variables into `attr`. A variable resolving to
    /// `None` is left as-is — this checks `Option::is_some`, not any
    /// truthiness of the bound value, so a bound `false`/`0` still
    /// substitutes.
    pub fn substitute_variables(&self, query_id: &str, attr: &Attribute) -> Attribute {
        if let Some(var_name) = attr.as_variable_name() {
            return match self.resolve_variable(query_id, var_name) {
                Some(value) => {
                    Attribute::with_timestamp(attr.key.clone(), value.clone(), attr.timestamp)
                }
                None => attr.clone(),
            };
        }

        if let Some(children) = attr.as_nested() {
            let substituted = children
                .iter()
                .map(|child| self.substitute_variables(query_id, child))
                .collect();
            return Attribute::with_timestamp(
                attr.key.clone(),
                AttributeValue::Nested { attributes: substituted },
                attr.timestamp,
            );
        }

        attr.clone()
    }

    /// Variables in `pattern` with no resolvable binding in this query's
    /// local or global scope.
    pub fn find_unbound_variables(
        &self,
        query_id: &str,
        pattern: &AttrPattern,
    ) -> std::collections::HashSet<String> {
        pattern
            .extract_variables()
            .into_iter()
            .filter(|var| self.resolve_variable(query_id, var).is_none())
            .collect()
    }

    /// Remove expired query contexts and entries untouched for over an
    /// hour. Returns the number of items removed.
    pub fn cleanup_expired(&mut self) -> usize {
        let expired_contexts: Vec<String> = self
            .query_contexts
            .iter()
            .filter(|(_, ctx)| ctx.is_expired())
            .map(|(id, _)| id.clone())
            .collect();
        let mut cleaned = expired_contexts.len();
        for id in expired_contexts {
            self.query_contexts.remove(&id);
        }

        let max_age = Duration::from_secs(3600);
        let expired_entries: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, e)| e.last_accessed.elapsed() > max_age)
            .map(|(id, _)| id.clone())
            .collect();
        cleaned += expired_entries.len();
        for id in expired_entries {
            self.entries.remove(&id);
        }

        cleaned
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .entries
            .values()
            .min_by_key(|e| e.last_accessed)
            .map(|e| e.query_id.clone());
        if let Some(id) = oldest {
            self.entries.remove(&id);
        }
    }

    /// Active (non-expired) query contexts, after a cleanup pass.
    pub fn active_queries(&mut self) -> Vec<&QueryContext> {
        self.cleanup_expired();
        self.query_contexts.values().collect()
    }

    pub fn statistics(&self) -> WorkingMemoryStatistics {
        let total_local_bindings: usize = self.entries.values().map(|e| e.bindings.len()).sum();
        let total_partial_matches: usize =
            self.entries.values().map(|e| e.partial_matches.len()).sum();

        WorkingMemoryStatistics {
            active_queries: self.query_contexts.len(),
            total_entries: self.entries.len(),
            global_bindings: self.global_bindings.len(),
            total_local_bindings,
            total_partial_matches,
            capacity: self.max_entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attr::{AttrPattern, Atom};

    #[test]
    fn create_and_fetch_entry() {
        let mut mem = WorkingMemory::new(10, Duration::from_secs(300));
        let pattern = AttrPattern::new(Attribute::variable("rpm", "x").unwrap());
        mem.create_entry("q1", pattern, HashMap::new());
        assert!(mem.get_entry("q1").is_some());
    }

    #[test]
    fn eviction_drops_least_recently_accessed() {
        let mut mem = WorkingMemory::new(1, Duration::from_secs(300));
        let pattern = AttrPattern::new(Attribute::variable("rpm", "x").unwrap());
        mem.create_entry("q1", pattern.clone(), HashMap::new());
        mem.create_entry("q2", pattern, HashMap::new());
        assert!(mem.get_entry("q1").is_none());
        assert!(mem.get_entry("q2").is_some());
    }

    #[test]
    fn resolve_variable_prefers_local_over_global() {
        let mut mem = WorkingMemory::new(10, Duration::from_secs(300));
        let pattern = AttrPattern::new(Attribute::variable("rpm", "x").unwrap());
        let mut locals = HashMap::new();
        locals.insert("x".to_string(), AttributeValue::Atom { data: Atom::Int(1) });
        mem.create_entry("q1", pattern, locals);
        mem.set_global_binding("x", AttributeValue::Atom { data: Atom::Int(99) });

        assert_eq!(
            mem.resolve_variable("q1", "x"),
            Some(&AttributeValue::Atom { data: Atom::Int(1) })
        );
    }

    #[test]
    fn substitute_variables_replaces_bound_falsy_value() {
        let mut mem = WorkingMemory::new(10, Duration::from_secs(300));
        let pattern = AttrPattern::new(Attribute::variable("flag", "x").unwrap());
        let mut locals = HashMap::new();
        locals.insert("x".to_string(), AttributeValue::Atom { data: Atom::Bool(false) });
        mem.create_entry("q1", pattern, locals);

        let var_attr = Attribute::variable("flag", "x").unwrap();
        let substituted = mem.substitute_variables("q1", &var_attr);
        assert_eq!(substituted.as_atom(), Some(&Atom::Bool(false)));
    }

    #[test]
    fn query_context_expires_after_timeout() {
        let mut mem = WorkingMemory::new(10, Duration::from_millis(1));
        let query = AttrQuery::new(AttrPattern::new(Attribute::variable("rpm", "x").unwrap()));
        let id = mem.create_query_context(query, 5, Some(Duration::from_millis(1)));
        std::thread::sleep(Duration::from_millis(5));
        assert!(mem.get_query_context(&id).is_none());
    }
}
