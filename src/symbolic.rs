//! Symbolic Memory façade
//!
//! The crate's single entry point: owns one instance each of the episodic
//! store, concept store, schema cache, and working memory, wires them into
//! a query engine, and exposes the public store/query/maintain API. All
//! five components live behind one `RwLock` so a composite mutation like
//! `store_observation` — episodic append, concept reinforcement, schema
//! update — is atomic to any concurrently running query (Rust
//! realization).

use crate::attr::{AttrPath, AttrPattern, AttrQuery, Attribute};
use crate::memory::{
    ConceptStatistics, ConceptStore, EpisodicStatistics, EpisodicStore, QueryEngine, QueryResult,
    QueryStatistics, SchemaCache, SchemaStatistics, WorkingMemory, WorkingMemoryStatistics,
};
use parking_lot::RwLock;
use std::time::Duration;

/// Tunable capacities and thresholds for a [`SymbolicMemory`] instance.
/// Plain constructible struct with a `Default` impl, mirroring
/// `ResourceLimits`/`SessionConfig` elsewhere in this repository — no
/// figment/toml loader, per the configuration Non-goal.
#[derive(Debug, Clone)]
pub struct SymbolicMemoryConfig {
    pub max_episodic_entries: usize,
    pub max_working_entries: usize,
    pub working_memory_timeout: Duration,
    pub schema_min_frequency: usize,
    pub max_schemas: usize,
    pub concept_min_confidence: f64,
    pub concept_min_instances: usize,
    pub auto_concept_discovery: bool,
    pub auto_schema_discovery: bool,
    /// Fraction of episodic capacity at which periodic maintenance
    /// triggers a full `compress_memory` pass.
    pub compression_threshold: f64,
}

impl Default for SymbolicMemoryConfig {
    fn default() -> Self {
        Self {
            max_episodic_entries: 10_000,
            max_working_entries: 100,
            working_memory_timeout: Duration::from_secs(300),
            schema_min_frequency: 3,
            max_schemas: 1000,
            concept_min_confidence: 0.5,
            concept_min_instances: 3,
            auto_concept_discovery: true,
            auto_schema_discovery: true,
            compression_threshold: 0.9,
        }
    }
}

/// Observation/discovery/query counters owned by the façade itself,
/// distinct from each component's own `statistics()`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymbolicMemoryCounters {
    pub observations_stored: u64,
    pub concepts_discovered: u64,
    pub schemas_discovered: u64,
    pub queries_executed: u64,
}

/// Aggregated statistics across all five components plus the façade's own
/// counters (`memory_statistics`).
#[derive(Debug, Clone)]
pub struct MemoryStatistics {
    pub overview: SymbolicMemoryCounters,
    pub episodic: EpisodicStatistics,
    pub concepts: ConceptStatistics,
    pub working_memory: WorkingMemoryStatistics,
    pub schemas: SchemaStatistics,
    pub query_engine: QueryStatistics,
}

/// Compression/pruning counts from a `compress_memory` pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompressionReport {
    pub episodic_entries_removed: usize,
    pub concepts_removed: usize,
    pub schemas_removed: usize,
    pub working_memory_cleaned: usize,
}

/// A read-only snapshot of discovered concepts and schemas for external
/// inspection — not a wire-serialization facility.
#[derive(Debug, Clone)]
pub struct KnowledgeExport {
    pub concepts: Vec<ConceptSummary>,
    pub schemas: Vec<SchemaSummary>,
    pub statistics: MemoryStatisticsSummary,
}

#[derive(Debug, Clone)]
pub struct ConceptSummary {
    pub name: String,
    pub pattern: String,
    pub instances_count: usize,
    pub confidence: f64,
}

#[derive(Debug, Clone)]
pub struct SchemaSummary {
    pub name: String,
    pub template: String,
    pub frequency: usize,
    pub compression_ratio: f64,
}

/// Flattened counter view used in [`KnowledgeExport`], avoiding a
/// dependency on the full per-component statistics structs for callers
/// that only want headline numbers.
#[derive(Debug, Clone)]
pub struct MemoryStatisticsSummary {
    pub observations_stored: u64,
    pub concepts_discovered: u64,
    pub schemas_discovered: u64,
    pub queries_executed: u64,
    pub total_episodic_entries: usize,
    pub total_concepts: usize,
    pub total_schemas: usize,
}

struct MemoryState {
    episodic: EpisodicStore,
    concepts: ConceptStore,
    working: WorkingMemory,
    schemas: SchemaCache,
    query_engine: QueryEngine,
    counters: SymbolicMemoryCounters,
}

impl MemoryState {
    fn new(config: &SymbolicMemoryConfig) -> Self {
        Self {
            episodic: EpisodicStore::new(config.max_episodic_entries),
            concepts: ConceptStore::new(),
            working: WorkingMemory::new(config.max_working_entries, config.working_memory_timeout),
            schemas: SchemaCache::new(config.schema_min_frequency, config.max_schemas),
            query_engine: QueryEngine::new(),
            counters: SymbolicMemoryCounters::default(),
        }
    }
}

/// The symbolic memory core: observe, generalize, and query over a
/// layered store.
pub struct SymbolicMemory {
    state: RwLock<MemoryState>,
    config: SymbolicMemoryConfig,
}

impl SymbolicMemory {
    pub fn new(config: SymbolicMemoryConfig) -> Self {
        let state = MemoryState::new(&config);
        Self {
            state: RwLock::new(state),
            config,
        }
    }

    /// Store a new observation. One write-lock acquisition covers the
    /// whole composite mutation (episodic append, concept reinforcement,
    /// schema update), so the operation is atomic to concurrent queries
    /// Serialized across stores by a single exclusive guard.
    #[tracing::instrument(skip(self, attr), fields(key = %attr.key))]
    pub fn store_observation(&self, attr: Attribute, source: Option<String>) {
        let mut state = self.state.write();

        state.episodic.store(attr.clone(), source);
        state.counters.observations_stored += 1;

        if self.config.auto_concept_discovery {
            let reinforced = state.concepts.reinforce_concepts(&attr);
            if reinforced.is_empty() {
                Self::try_discover_concepts(&mut state, &self.config);
            } else {
                tracing::debug!(concepts = ?reinforced, "concepts_reinforced");
            }
        }

        if self.config.auto_schema_discovery {
            Self::update_schemas(&mut state, &[attr], &self.config);
        }

        if state.counters.observations_stored % 100 == 0 {
            Self::periodic_maintenance(&mut state, &self.config);
        }
    }

    fn try_discover_concepts(state: &mut MemoryState, config: &SymbolicMemoryConfig) {
        let recent: Vec<Attribute> = state
            .episodic
            .get_recent(50)
            .into_iter()
            .map(|e| e.attr.clone())
            .collect();
        if recent.len() < config.concept_min_instances {
            return;
        }

        let suggestions = state
            .concepts
            .suggest_new_concepts(&recent, config.concept_min_instances);

        for suggestion in suggestions {
            if suggestion.instances.len() < config.concept_min_instances {
                continue;
            }
            let created = state.concepts.create_concept(
                suggestion.name.clone(),
                suggestion.instances,
                config.concept_min_confidence,
            );
            if created.is_some() {
                state.counters.concepts_discovered += 1;
                tracing::info!(name = %suggestion.name, key = %suggestion.key, "concept_discovered");
            }
        }
    }

    fn update_schemas(state: &mut MemoryState, new_instances: &[Attribute], _config: &SymbolicMemoryConfig) {
        let updated = state.schemas.update_schemas(new_instances);
        if updated.is_empty() && new_instances.len() >= state.schemas.min_frequency() {
            if let Some(schema) = state.schemas.discover_schema(new_instances.to_vec(), None) {
                state.counters.schemas_discovered += 1;
                tracing::info!(name = %schema.name, "schema_discovered");
            }
        }
    }

    fn periodic_maintenance(state: &mut MemoryState, config: &SymbolicMemoryConfig) {
        state.working.cleanup_expired();

        let stats = state.episodic.statistics();
        let occupancy = stats.total_entries as f64 / stats.capacity.max(1) as f64;
        if occupancy > config.compression_threshold {
            tracing::debug!(occupancy, "periodic_maintenance_triggers_compression");
            Self::compress(state);
        }
    }

    /// Execute a symbolic query across all memory tiers.
    pub fn query(&self, pattern: AttrPattern, conditions: Vec<String>) -> QueryResult {
        let query = AttrQuery::with_conditions(pattern, conditions);
        let mut state = self.state.write();
        let query_id = state.working.create_query_context(query.clone(), 1, None);
        let result = state.query_engine.query(
            &query,
            query_id,
            &state.episodic,
            Some(&state.concepts),
            Some(&state.schemas),
        );
        state.counters.queries_executed += 1;
        result
    }

    /// Execute a dot-separated path query.
    pub fn query_path(&self, path_str: &str, source: Option<Attribute>) -> crate::error::MemoryResult<QueryResult> {
        let path = AttrPath::parse(path_str)?;
        let mut state = self.state.write();
        let query_id = format!("path_query_{}", uuid::Uuid::new_v4());
        let result = state
            .query_engine
            .path_query(&path, source.as_ref(), &state.episodic, query_id);
        state.counters.queries_executed += 1;
        Ok(result)
    }

    /// Manually discover a concept, bypassing auto-discovery heuristics.
    pub fn discover_concept(&self, name: impl Into<String>, instances: Vec<Attribute>) -> bool {
        let mut state = self.state.write();
        let created = state
            .concepts
            .create_concept(name, instances, self.config.concept_min_confidence)
            .is_some();
        if created {
            state.counters.concepts_discovered += 1;
        }
        created
    }

    /// Manually discover a schema, bypassing auto-discovery heuristics.
    pub fn discover_schema(&self, name: impl Into<String>, instances: Vec<Attribute>) -> bool {
        let mut state = self.state.write();
        let created = state.schemas.discover_schema(instances, Some(name.into())).is_some();
        if created {
            state.counters.schemas_discovered += 1;
        }
        created
    }

    pub fn get_recent_observations(&self, count: usize) -> Vec<Attribute> {
        let state = self.state.read();
        state.episodic.get_recent(count).into_iter().map(|e| e.attr.clone()).collect()
    }

    pub fn get_concepts(&self, min_confidence: f64) -> Vec<String> {
        let state = self.state.read();
        state
            .concepts
            .by_confidence(min_confidence)
            .into_iter()
            .map(|c| c.name.clone())
            .collect()
    }

    pub fn get_schemas(&self, min_frequency: usize) -> Vec<String> {
        let state = self.state.read();
        state
            .schemas
            .by_frequency(min_frequency)
            .into_iter()
            .map(|s| s.name.clone())
            .collect()
    }

    /// Run episodic compaction, concept/schema pruning, and working-memory
    /// expiry cleanup in one call.
    pub fn compress_memory(&self) -> CompressionReport {
        let mut state = self.state.write();
        Self::compress(&mut state)
    }

    fn compress(state: &mut MemoryState) -> CompressionReport {
        let episodic_entries_removed = state.episodic.compress_similar();
        let concepts_removed = state.concepts.prune_weak_concepts(0.1, 24.0);
        let schemas_removed = state.schemas.prune_ineffective(0.8, 2);
        let working_memory_cleaned = state.working.cleanup_expired();

        tracing::debug!(
            episodic_entries_removed,
            concepts_removed,
            schemas_removed,
            working_memory_cleaned,
            "memory_compressed"
        );

        CompressionReport {
            episodic_entries_removed,
            concepts_removed,
            schemas_removed,
            working_memory_cleaned,
        }
    }

    /// Aggregate statistics across every owned component.
    pub fn memory_statistics(&self) -> MemoryStatistics {
        let state = self.state.read();
        MemoryStatistics {
            overview: state.counters.clone(),
            episodic: state.episodic.statistics(),
            concepts: state.concepts.statistics(),
            working_memory: state.working.statistics(),
            schemas: state.schemas.statistics(),
            query_engine: state.query_engine.statistics(),
        }
    }

    /// A read-only snapshot of concepts/schemas plus statistics, for
    /// external inspection — not a substitute for the dictionary wire
    /// boundary.
    pub fn export_knowledge(&self) -> KnowledgeExport {
        let state = self.state.read();

        let concepts = state
            .concepts
            .all()
            .into_iter()
            .map(|c| ConceptSummary {
                name: c.name.clone(),
                pattern: c.pattern.template.to_compact_string(),
                instances_count: c.instances.len(),
                confidence: c.confidence,
            })
            .collect();

        let schemas = state
            .schemas
            .by_frequency(0)
            .into_iter()
            .map(|s| SchemaSummary {
                name: s.name.clone(),
                template: s.template.template.to_compact_string(),
                frequency: s.frequency,
                compression_ratio: s.compression_ratio,
            })
            .collect();

        let statistics = MemoryStatisticsSummary {
            observations_stored: state.counters.observations_stored,
            concepts_discovered: state.counters.concepts_discovered,
            schemas_discovered: state.counters.schemas_discovered,
            queries_executed: state.counters.queries_executed,
            total_episodic_entries: state.episodic.len(),
            total_concepts: state.concepts.all().len(),
            total_schemas: state.schemas.len(),
        };

        KnowledgeExport {
            concepts,
            schemas,
            statistics,
        }
    }

    /// Replace every owned component with a fresh default and zero the
    /// façade's own counters.
    pub fn reset(&self) {
        let mut state = self.state.write();
        *state = MemoryState::new(&self.config);
    }

    pub fn config(&self) -> &SymbolicMemoryConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attr::{Atom, Attribute};

    fn rpm(value: i64) -> Attribute {
        Attribute::nested("motor", vec![Attribute::atom("rpm", Atom::Int(value))])
    }

    #[test]
    fn store_and_query_round_trip() {
        let memory = SymbolicMemory::new(SymbolicMemoryConfig::default());
        memory.store_observation(rpm(9500), None);

        let pattern = AttrPattern::new(Attribute::nested(
            "motor",
            vec![Attribute::variable("rpm", "x").unwrap()],
        ));
        let result = memory.query(pattern, vec![]);
        assert!(result.success);
        assert_eq!(result.matches.len(), 1);
    }

    #[test]
    fn reset_clears_observations_and_counters() {
        let memory = SymbolicMemory::new(SymbolicMemoryConfig::default());
        memory.store_observation(rpm(1), None);
        assert_eq!(memory.get_recent_observations(10).len(), 1);

        memory.reset();
        assert_eq!(memory.get_recent_observations(10).len(), 0);
        assert_eq!(memory.memory_statistics().overview.observations_stored, 0);
    }

    #[test]
    fn auto_concept_discovery_triggers_after_enough_observations() {
        let mut config = SymbolicMemoryConfig::default();
        config.concept_min_instances = 3;
        config.concept_min_confidence = 0.0;
        let memory = SymbolicMemory::new(config);

        for v in [1, 2, 3] {
            memory.store_observation(Attribute::atom("rpm", Atom::Int(v)), None);
        }

        let concepts = memory.get_concepts(0.0);
        assert!(!concepts.is_empty());
    }

    #[test]
    fn manual_discovery_bypasses_auto_heuristics() {
        let mut config = SymbolicMemoryConfig::default();
        config.auto_concept_discovery = false;
        config.auto_schema_discovery = false;
        let memory = SymbolicMemory::new(config);

        let created = memory.discover_concept(
            "manual",
            vec![Attribute::atom("rpm", Atom::Int(1)), Attribute::atom("rpm", Atom::Int(2))],
        );
        assert!(created);
        assert_eq!(memory.get_concepts(0.0), vec!["manual".to_string()]);
    }

    #[test]
    fn compress_memory_returns_report() {
        let memory = SymbolicMemory::new(SymbolicMemoryConfig::default());
        memory.store_observation(rpm(1), None);
        memory.store_observation(rpm(1), None);
        let report = memory.compress_memory();
        assert_eq!(report.episodic_entries_removed, 1);
    }

    #[test]
    fn query_path_resolves_over_recent_episodic_entries() {
        let memory = SymbolicMemory::new(SymbolicMemoryConfig::default());
        memory.store_observation(rpm(9500), None);

        let result = memory.query_path("motor.rpm", None).unwrap();
        assert!(result.success);
    }
}
