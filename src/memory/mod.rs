//! Multi-tier symbolic memory (components C–G)

pub mod concepts;
pub mod episodic;
pub mod query;
pub mod schemas;
pub mod working;

pub use concepts::{Concept, ConceptStatistics, ConceptStore, ConceptSuggestion};
pub use episodic::{EpisodicEntry, EpisodicStatistics, EpisodicStore};
pub use query::{PlanStep, QueryEngine, QueryPlan, QueryResult, QueryStatistics};
pub use schemas::{Schema, SchemaCache, SchemaEvolutionStep, SchemaStatistics};
pub use working::{QueryContext, WorkingMemory, WorkingMemoryEntry, WorkingMemoryStatistics};
