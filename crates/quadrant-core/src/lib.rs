//! # quadrant-core
//!
//! The embeddable quad store for Quadrant.
//!
//! This crate stores RDF-style statements (subject, predicate, object and an
//! optional graph) in named graphs and evaluates a restricted SELECT subset
//! over them.
//!
//! ## Architecture
//!
//! - `types`: nodes, statements, content hashes, errors
//! - `namespace`: prefix registry (`foaf:Person` <-> full URI)
//! - `ingestor`: validation, graph resolution, blank node remapping
//! - `store`: the `QuadStore` trait and the in-memory `MemoryStore`
//! - `storage`: `RedbStore`, the value-interning redb backend
//! - `query`: pest grammar, shape dispatcher, filter, results
//! - `diff`: content-hash set difference between statement collections
//! - `session`: backend selection and mutex-shared access
//! - `config`: TOML configuration with environment overrides
//!
//! ## Constraints
//!
//! - Both backends share one normalization path and one query dispatcher
//! - Unsupported queries fail closed with a typed error
//! - Row order is scan order; nothing is sorted implicitly
//! - No async, no network dependencies (pure Rust)
//!
//! ## Example
//!
//! ```
//! use quadrant_core::{Node, Session, Statement};
//!
//! let mut session = Session::new();
//! session
//!     .add_statements(
//!         &[Statement::triple(
//!             Node::named("http://example.org/alice"),
//!             Node::named("rdf:type"),
//!             Node::named("foaf:Person"),
//!         )],
//!         None,
//!     )
//!     .expect("add");
//!
//! let result = session
//!     .query("SELECT ?s WHERE { ?s a foaf:Person }")
//!     .expect("query");
//! assert_eq!(result.count(), 1);
//! ```

// =============================================================================
// MODULES
// =============================================================================

pub mod config;
pub mod diff;
pub mod ingestor;
pub mod namespace;
pub mod primitives;
pub mod query;
pub mod session;
pub mod storage;
pub mod store;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    BlankNode, ContentHash, Literal, NamedNode, Node, PatternNode, QuadError, Statement,
};

// =============================================================================
// RE-EXPORTS: Store Engine
// =============================================================================

pub use config::{BackendConfig, StoreConfig};
pub use diff::{StatementDiff, diff_statements};
pub use ingestor::{BlankNodeRemapTable, Ingestor};
pub use namespace::NamespaceRegistry;
pub use query::{QueryOptions, QueryResult, QueryShape, Row};
pub use session::{Session, SharedSession, StorageBackend};
pub use storage::RedbStore;
pub use store::{MemoryStore, QuadStore};

// =============================================================================
// RE-EXPORTS: Primitives
// =============================================================================

pub use primitives::DEFAULT_GRAPH_URI;
