//! # Session Module
//!
//! Session management over a configured quad store.
//!
//! ## Storage Backends
//!
//! Session supports two storage backends:
//! - `InMemory`: Uses `MemoryStore` (fast, volatile)
//! - `Persistent`: Uses `RedbStore` for disk-backed ACID storage
//!
//! ## Sharing
//!
//! A store is single-writer: `query` reads several times and must see one
//! consistent state. `SharedSession` wraps a session in one mutex so every
//! operation runs under a single lock acquisition.

use crate::config::{BackendConfig, StoreConfig};
use crate::query::{QueryOptions, QueryResult};
use crate::storage::RedbStore;
use crate::store::{MemoryStore, QuadStore};
use crate::{NamedNode, QuadError, Statement};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

// =============================================================================
// ERROR LOGGING HELPERS
// =============================================================================

/// Log a storage error and convert Result<T, E> to default value.
///
/// Storage errors are logged before being converted to a default value,
/// never swallowed silently.
#[inline]
fn log_and_default<T: Default>(result: Result<T, QuadError>, context: &str) -> T {
    match result {
        Ok(v) => v,
        Err(e) => {
            warn!(target: "quadrant_core::session", error = %e, "storage error in {}", context);
            T::default()
        }
    }
}

/// Storage backend for a Session.
#[derive(Debug)]
pub enum StorageBackend {
    /// In-memory store (fast, volatile).
    InMemory(MemoryStore),
    /// Disk-backed store using redb (ACID, persistent).
    Persistent(RedbStore),
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::InMemory(MemoryStore::new())
    }
}

// NOTE: StorageBackend does NOT implement Clone.
// RedbStore (database handle) cannot be safely cloned.

/// A Session owns one quad store.
///
/// The Session provides a high-level interface for:
/// - Managing graphs
/// - Adding and deleting statements
/// - Evaluating SELECT queries
#[derive(Debug, Default)]
pub struct Session {
    /// The storage backend (in-memory or persistent).
    backend: StorageBackend,
}

impl Session {
    /// Create a new empty session with in-memory storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session with an existing in-memory store.
    #[must_use]
    pub fn with_store(store: MemoryStore) -> Self {
        Self {
            backend: StorageBackend::InMemory(store),
        }
    }

    /// Create a session with persistent redb storage.
    ///
    /// Opens or creates a redb database at the given path.
    /// All changes are automatically persisted to disk.
    pub fn with_redb(path: impl AsRef<Path>) -> Result<Self, QuadError> {
        let redb = RedbStore::open(path)?;
        Ok(Self::with_redb_store(redb))
    }

    /// Create a session with an existing RedbStore.
    #[must_use]
    pub fn with_redb_store(redb: RedbStore) -> Self {
        Self {
            backend: StorageBackend::Persistent(redb),
        }
    }

    /// Build the backend a configuration describes.
    pub fn from_config(config: &StoreConfig) -> Result<Self, QuadError> {
        config.validate()?;
        let namespaces = config.namespace_registry();

        let session = match &config.backend {
            BackendConfig::Memory => Self::with_store(
                MemoryStore::with_namespaces(namespaces)
                    .with_default_graph(config.default_graph.as_str()),
            ),
            BackendConfig::Redb { path } => Self::with_redb_store(
                RedbStore::open(path)?
                    .with_namespaces(namespaces)
                    .with_default_graph(config.default_graph.as_str()),
            ),
        };
        info!(
            persistent = session.is_persistent(),
            default_graph = %config.default_graph,
            "session ready"
        );
        Ok(session)
    }

    /// Check if using persistent storage.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self.backend, StorageBackend::Persistent(_))
    }

    /// Get a reference to the storage backend.
    #[must_use]
    pub fn backend(&self) -> &StorageBackend {
        &self.backend
    }

    /// The active store behind the `QuadStore` interface.
    #[must_use]
    pub fn store(&self) -> &dyn QuadStore {
        match &self.backend {
            StorageBackend::InMemory(store) => store,
            StorageBackend::Persistent(store) => store,
        }
    }

    /// Mutable access to the active store.
    pub fn store_mut(&mut self) -> &mut dyn QuadStore {
        match &mut self.backend {
            StorageBackend::InMemory(store) => store,
            StorageBackend::Persistent(store) => store,
        }
    }

    /// Try to clone the session.
    ///
    /// Returns `None` for persistent backends (database handles cannot be
    /// safely cloned).
    #[must_use]
    pub fn try_clone(&self) -> Option<Self> {
        match &self.backend {
            StorageBackend::InMemory(store) => Some(Self::with_store(store.clone())),
            StorageBackend::Persistent(_) => None,
        }
    }

    // =========================================================================
    // GRAPH MANAGEMENT
    // =========================================================================

    /// Register a graph.
    pub fn create_graph(&mut self, graph: &NamedNode) -> Result<(), QuadError> {
        self.store_mut().create_graph(graph)
    }

    /// Remove a graph and its statements.
    pub fn drop_graph(&mut self, graph: &NamedNode) -> Result<(), QuadError> {
        self.store_mut().drop_graph(graph)
    }

    /// All graphs in creation order.
    pub fn get_graphs(&self) -> Result<Vec<NamedNode>, QuadError> {
        self.store().get_graphs()
    }

    /// Check if a graph exists. Storage errors are logged and read as absent.
    #[must_use]
    pub fn contains_graph(&self, graph: &NamedNode) -> bool {
        let store = self.store();
        let uri = store.namespaces().extend_uri(graph.as_str());
        log_and_default(store.contains_graph(&uri), "contains_graph")
    }

    /// Number of graphs. Storage errors are logged and read as zero.
    #[must_use]
    pub fn graph_count(&self) -> usize {
        log_and_default(self.store().get_graphs().map(|g| g.len()), "graph_count")
    }

    // =========================================================================
    // STATEMENTS
    // =========================================================================

    /// Normalize and store statements.
    pub fn add_statements(
        &mut self,
        statements: &[Statement],
        graph: Option<&NamedNode>,
    ) -> Result<usize, QuadError> {
        self.store_mut().add_statements(statements, graph)
    }

    /// Remove statements matching a pattern.
    pub fn delete_matching_statements(
        &mut self,
        pattern: &Statement,
        graph: Option<&NamedNode>,
    ) -> Result<usize, QuadError> {
        self.store_mut().delete_matching_statements(pattern, graph)
    }

    /// Statements matching a pattern (in-memory backend only).
    pub fn get_matching_statements(
        &self,
        pattern: &Statement,
        graph: Option<&NamedNode>,
    ) -> Result<Vec<Statement>, QuadError> {
        self.store().get_matching_statements(pattern, graph)
    }

    /// Whether a statement matches a pattern (in-memory backend only).
    pub fn has_matching_statement(
        &self,
        pattern: &Statement,
        graph: Option<&NamedNode>,
    ) -> Result<bool, QuadError> {
        self.store().has_matching_statement(pattern, graph)
    }

    /// Number of statements in a graph (default graph if `None`).
    ///
    /// Storage errors are logged and read as zero.
    #[must_use]
    pub fn statement_count(&self, graph: Option<&NamedNode>) -> usize {
        log_and_default(self.store().statement_count(graph), "statement_count")
    }

    // =========================================================================
    // QUERY
    // =========================================================================

    /// Evaluate a SELECT query with default options.
    pub fn query(&self, text: &str) -> Result<QueryResult, QuadError> {
        self.store().query(text, &QueryOptions::default())
    }

    /// Evaluate a SELECT query.
    pub fn query_with(&self, text: &str, options: &QueryOptions) -> Result<QueryResult, QuadError> {
        self.store().query(text, options)
    }
}

// =============================================================================
// SHARED SESSION
// =============================================================================

/// A session behind one mutex, cloneable across threads.
#[derive(Debug, Clone, Default)]
pub struct SharedSession {
    inner: Arc<Mutex<Session>>,
}

impl SharedSession {
    /// Wrap a session.
    #[must_use]
    pub fn new(session: Session) -> Self {
        Self {
            inner: Arc::new(Mutex::new(session)),
        }
    }

    /// Run `f` with exclusive access to the session.
    ///
    /// Returns `LockPoisoned` if a previous holder panicked.
    pub fn with<R>(
        &self,
        f: impl FnOnce(&mut Session) -> Result<R, QuadError>,
    ) -> Result<R, QuadError> {
        let mut session = self.inner.lock().map_err(|_| QuadError::LockPoisoned)?;
        f(&mut session)
    }

    /// Evaluate a SELECT query under the lock.
    pub fn query(&self, text: &str) -> Result<QueryResult, QuadError> {
        self.with(|session| session.query(text))
    }

    /// Add statements under the lock.
    pub fn add_statements(
        &self,
        statements: &[Statement],
        graph: Option<&NamedNode>,
    ) -> Result<usize, QuadError> {
        self.with(|session| session.add_statements(statements, graph))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::Node;
    use crate::primitives::DEFAULT_GRAPH_URI;
    use std::thread;
    use tempfile::tempdir;

    fn named_triple(subject: &str) -> Statement {
        Statement::triple(
            Node::named(subject),
            Node::named("rdf:type"),
            Node::named("foaf:Person"),
        )
    }

    #[test]
    fn session_new_is_in_memory() {
        let session = Session::new();
        assert!(!session.is_persistent());
        assert_eq!(session.graph_count(), 0);
        assert!(session.try_clone().is_some());
    }

    #[test]
    fn session_add_and_query() {
        let mut session = Session::new();
        session
            .add_statements(&[named_triple("http://x/a")], None)
            .expect("add");

        let result = session
            .query("SELECT ?s WHERE { ?s a foaf:Person }")
            .expect("query");
        assert_eq!(result.count(), 1);
        assert!(session.contains_graph(&NamedNode::new(DEFAULT_GRAPH_URI)));
    }

    #[test]
    fn session_with_redb_is_persistent() {
        let temp = tempdir().expect("temp dir");
        let mut session = Session::with_redb(temp.path().join("s.redb")).expect("open");
        assert!(session.is_persistent());
        assert!(session.try_clone().is_none());

        session
            .add_statements(&[named_triple("http://x/a")], None)
            .expect("add");
        assert_eq!(session.statement_count(None), 1);
    }

    #[test]
    fn from_config_applies_prefixes_and_default_graph() {
        let config = StoreConfig::from_toml_str(
            "default_graph = \"urn:test:default\"\n[prefixes]\nex = \"http://example.org/\"\n",
        )
        .expect("config");
        let mut session = Session::from_config(&config).expect("session");

        session
            .add_statements(
                &[Statement::triple(
                    Node::named("ex:a"),
                    Node::named("ex:p"),
                    Node::literal("v"),
                )],
                None,
            )
            .expect("add");

        let graphs = session.get_graphs().expect("graphs");
        assert_eq!(graphs, vec![NamedNode::new("urn:test:default")]);

        let result = session
            .query("SELECT ?p ?o WHERE { <http://example.org/a> ?p ?o }")
            .expect("query");
        assert_eq!(result.count(), 1);
    }

    #[test]
    fn from_config_opens_redb() {
        let temp = tempdir().expect("temp dir");
        let config = StoreConfig {
            backend: BackendConfig::Redb {
                path: temp.path().join("cfg.redb"),
            },
            ..StoreConfig::default()
        };
        let session = Session::from_config(&config).expect("session");
        assert!(session.is_persistent());
    }

    #[test]
    fn shared_session_across_threads() {
        let shared = SharedSession::new(Session::new());

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let shared = shared.clone();
                thread::spawn(move || {
                    shared
                        .add_statements(&[named_triple(&format!("http://x/{}", i))], None)
                        .expect("add");
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("join");
        }

        let result = shared
            .query("SELECT * WHERE { ?s ?p ?o }")
            .expect("query");
        assert_eq!(result.count(), 4);
    }

    #[test]
    fn shared_session_reports_poisoned_lock() {
        let shared = SharedSession::new(Session::new());
        let poisoner = shared.clone();
        let _ = thread::spawn(move || {
            let _guard = poisoner.inner.lock();
            panic!("poison");
        })
        .join();

        assert!(matches!(
            shared.query("SELECT * WHERE { ?s ?p ?o }"),
            Err(QuadError::LockPoisoned)
        ));
    }
}
