//! # Symbolic Memory Core
//!
//! An in-memory, layered symbolic store for recursive attribute
//! observations. The crate has three layers:
//!
//! - **Attribute model and algebra** (`attr`): an immutable recursive
//!   tagged-union value type plus the pure, side-effect-free operations
//!   (union, subsumption, unification, projection, generalization) that
//!   everything else is built from.
//! - **Multi-tier memory** (`memory`): a bounded episodic log, a
//!   reinforced concept store, a compression-scored schema cache, a
//!   per-query working memory, and a query engine that unifies results
//!   across all three.
//! - **Façade** (`symbolic`): [`SymbolicMemory`] ties the above into a
//!   single handle — `store_observation`, `query`, `query_path`,
//!   `compress_memory`, `memory_statistics`, `export_knowledge`.
//!
//! ## Usage
//!
//! ```rust
//! use inputlayer::attr::{Atom, AttrPattern, Attribute};
//! use inputlayer::symbolic::{SymbolicMemory, SymbolicMemoryConfig};
//!
//! let memory = SymbolicMemory::new(SymbolicMemoryConfig::default());
//!
//! memory.store_observation(
//!     Attribute::nested("motor", vec![Attribute::atom("rpm", Atom::Int(9500))]),
//!     None,
//! );
//!
//! let pattern = AttrPattern::new(Attribute::nested(
//!     "motor",
//!     vec![Attribute::variable("rpm", "x").unwrap()],
//! ));
//! let result = memory.query(pattern, vec!["?x > 9000".to_string()]);
//! assert!(result.success);
//! ```
//!
//! ## Scope
//!
//! This crate is the symbolic reasoning core only. Agent runtimes,
//! network transport, distributed-mesh protocols, serialization codecs
//! beyond `serde` derives, CLI/logging configuration loading, and
//! natural-language model integration are all external collaborators
//! that exchange only the data model of `attr` with this crate.

pub mod attr;
pub mod error;
pub mod memory;
pub mod symbolic;

pub use attr::{Atom, AttrPath, AttrPattern, AttrQuery, Attribute, AttributeValue, Bindings};
pub use error::{MemoryError, MemoryResult};
pub use memory::{
    Concept, ConceptStatistics, ConceptStore, ConceptSuggestion, EpisodicEntry,
    EpisodicStatistics, EpisodicStore, QueryEngine, QueryPlan, QueryResult, QueryStatistics,
    Schema, SchemaCache, SchemaEvolutionStep, SchemaStatistics, WorkingMemory,
    WorkingMemoryStatistics,
};
pub use symbolic::{
    CompressionReport, KnowledgeExport, MemoryStatistics, SymbolicMemory, SymbolicMemoryConfig,
    SymbolicMemoryCounters,
};
