//! # Store Core
//!
//! The graph-scoped quad storage shared by every Quadrant backend.
//!
//! This module defines the `QuadStore` trait and its in-memory
//! implementation, `MemoryStore`. Backends implement a small set of
//! primitive operations over already-normalized statements; the public
//! operations (`add_statements`, `delete_matching_statements`, `query`) are
//! provided methods so that both backends share one normalization path and
//! one query dispatcher.

use crate::ingestor::{BlankNodeRemapTable, Ingestor};
use crate::namespace::NamespaceRegistry;
use crate::primitives::DEFAULT_GRAPH_URI;
use crate::query::{PreparedQuery, QueryOptions, QueryResult};
use crate::{ContentHash, NamedNode, Node, QuadError, Statement};
use indexmap::IndexMap;
use tracing::{debug, info, warn};

// =============================================================================
// QUADSTORE TRAIT
// =============================================================================

/// The QuadStore trait defines the core store operations.
///
/// Graph arguments of the primitive methods (`contains_graph`,
/// `insert_statements`, `remove_matching`, `graph_statements`) are full,
/// already-extended URIs. Statements handed to `insert_statements` are
/// validated and normalized.
///
/// All fallible operations return `Result<T, QuadError>` to support both
/// in-memory and persistent storage backends uniformly.
pub trait QuadStore {
    /// The namespace registry owned by this store.
    fn namespaces(&self) -> &NamespaceRegistry;

    /// The reserved default graph URI.
    fn default_graph(&self) -> &str;

    /// Check if a graph is registered.
    fn contains_graph(&self, graph: &str) -> Result<bool, QuadError>;

    /// Register a graph. No-op if it already exists.
    fn create_graph(&mut self, graph: &NamedNode) -> Result<(), QuadError>;

    /// Remove a graph and all of its statements. No-op if it does not exist.
    fn drop_graph(&mut self, graph: &NamedNode) -> Result<(), QuadError>;

    /// All registered graphs in creation order.
    fn get_graphs(&self) -> Result<Vec<NamedNode>, QuadError>;

    /// Insert normalized statements into an existing graph.
    ///
    /// Statements already present (same triple hash) are skipped.
    /// Returns the number of statements actually inserted.
    fn insert_statements(&mut self, graph: &str, statements: &[Statement])
    -> Result<usize, QuadError>;

    /// Remove every statement of `graph` matching an extended pattern.
    ///
    /// Returns the number of statements removed.
    fn remove_matching(&mut self, graph: &str, pattern: &Statement) -> Result<usize, QuadError>;

    /// All statements of a graph in insertion order, graph field set.
    fn graph_statements(&self, graph: &str) -> Result<Vec<Statement>, QuadError>;

    /// Statements matching a pattern, wildcards allowed in any position.
    fn get_matching_statements(
        &self,
        pattern: &Statement,
        graph: Option<&NamedNode>,
    ) -> Result<Vec<Statement>, QuadError>;

    /// Whether any statement matches a pattern.
    fn has_matching_statement(
        &self,
        pattern: &Statement,
        graph: Option<&NamedNode>,
    ) -> Result<bool, QuadError>;

    // =========================================================================
    // PROVIDED OPERATIONS
    // =========================================================================

    /// Normalize and store statements.
    ///
    /// Each statement goes to the explicit `graph`, else its own graph, else
    /// the default graph. Blank node labels are remapped with a table that
    /// lives for this call only. The default graph is created on demand; any
    /// other absent graph rejects the whole batch before anything is written.
    ///
    /// Returns the number of statements newly stored.
    fn add_statements(
        &mut self,
        statements: &[Statement],
        graph: Option<&NamedNode>,
    ) -> Result<usize, QuadError> {
        let mut remap = BlankNodeRemapTable::new();
        let mut batches: IndexMap<String, Vec<Statement>> = IndexMap::new();

        for statement in statements {
            Ingestor::validate(statement)?;
            let target =
                Ingestor::resolve_graph(graph, statement, self.default_graph(), self.namespaces());
            let normalized = Ingestor::normalize(statement, &target, self.namespaces(), &mut remap);
            batches.entry(target).or_default().push(normalized);
        }

        // Reject unknown graphs before touching the backend.
        for target in batches.keys() {
            if target != self.default_graph() && !self.contains_graph(target)? {
                return Err(QuadError::GraphNotFound(target.clone()));
            }
        }

        let mut inserted = 0usize;
        for (target, batch) in &batches {
            if !self.contains_graph(target)? {
                self.create_graph(&NamedNode::new(target.as_str()))?;
            }
            let count = self.insert_statements(target, batch)?;
            debug!(graph = %target, submitted = batch.len(), inserted = count, "stored statements");
            inserted = inserted.saturating_add(count);
        }

        Ok(inserted)
    }

    /// Remove every statement matching `pattern`.
    ///
    /// `Pattern` nodes match anything. The graph is the explicit argument,
    /// else the pattern's graph field (a `Pattern` there means every graph),
    /// else the default graph.
    ///
    /// Returns the number of statements removed.
    fn delete_matching_statements(
        &mut self,
        pattern: &Statement,
        graph: Option<&NamedNode>,
    ) -> Result<usize, QuadError> {
        let targets = resolve_pattern_graphs(self, pattern, graph)?;
        let extended = Ingestor::extend_pattern(pattern, self.namespaces());

        let mut removed = 0usize;
        for target in &targets {
            let count = self.remove_matching(target, &extended)?;
            debug!(graph = %target, removed = count, "deleted matching statements");
            removed = removed.saturating_add(count);
        }
        Ok(removed)
    }

    /// Number of statements in a graph (default graph if `None`).
    ///
    /// Absent graphs count as empty.
    fn statement_count(&self, graph: Option<&NamedNode>) -> Result<usize, QuadError> {
        let target = match graph {
            Some(graph) => self.namespaces().extend_uri(graph.as_str()),
            None => self.default_graph().to_string(),
        };
        if !self.contains_graph(&target)? {
            return Ok(0);
        }
        Ok(self.graph_statements(&target)?.len())
    }

    /// Evaluate a SELECT query.
    ///
    /// The target graphs (FROM clauses, else the default graph) are
    /// materialized, unioned with triple-hash dedup in first-seen order, and
    /// handed to the shape dispatcher.
    fn query(&self, text: &str, options: &QueryOptions) -> Result<QueryResult, QuadError> {
        let prepared = PreparedQuery::prepare(text, self.namespaces(), self.default_graph())
            .inspect_err(|e| warn!(error = %e, "query rejected"))?;

        let mut union: IndexMap<ContentHash, Statement> = IndexMap::new();
        for graph in prepared.graphs() {
            if !self.contains_graph(graph)? {
                if graph == self.default_graph() {
                    continue;
                }
                return Err(QuadError::GraphNotFound(graph.clone()));
            }
            for statement in self.graph_statements(graph)? {
                union.entry(statement.triple_hash()).or_insert(statement);
            }
        }

        let statements: Vec<Statement> = union.into_values().collect();
        let result = prepared.execute(&statements, options);
        debug!(
            shape = prepared.shape().name(),
            scanned = statements.len(),
            rows = result.count(),
            "query evaluated"
        );
        Ok(result)
    }
}

// =============================================================================
// SHARED MATCHING
// =============================================================================

/// Check whether a stored statement matches an extended pattern.
///
/// `Pattern` positions match anything; concrete positions must be equal.
/// The graph field is ignored: graph selection happens before matching.
#[must_use]
pub fn matches_pattern(statement: &Statement, pattern: &Statement) -> bool {
    position_matches(&statement.subject, &pattern.subject)
        && position_matches(&statement.predicate, &pattern.predicate)
        && position_matches(&statement.object, &pattern.object)
}

fn position_matches(stored: &Node, pattern: &Node) -> bool {
    pattern.is_pattern() || stored == pattern
}

/// Resolve the graphs a deletion or matching pattern addresses.
///
/// An absent default graph resolves to nothing; any other absent graph is
/// `GraphNotFound`.
pub fn resolve_pattern_graphs<S: QuadStore + ?Sized>(
    store: &S,
    pattern: &Statement,
    graph: Option<&NamedNode>,
) -> Result<Vec<String>, QuadError> {
    let namespaces = store.namespaces();
    let candidates = match (graph, &pattern.graph) {
        (Some(graph), _) => vec![namespaces.extend_uri(graph.as_str())],
        (None, Some(Node::Named(graph))) => vec![namespaces.extend_uri(graph.as_str())],
        (None, Some(Node::Pattern(_))) => {
            return Ok(store
                .get_graphs()?
                .into_iter()
                .map(|graph| graph.0)
                .collect());
        }
        (None, Some(other)) => {
            return Err(QuadError::InvalidStatement(format!(
                "graph must be a named node or a pattern, got {}",
                other
            )));
        }
        (None, None) => vec![store.default_graph().to_string()],
    };

    let mut targets = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if store.contains_graph(&candidate)? {
            targets.push(candidate);
        } else if candidate != store.default_graph() {
            return Err(QuadError::GraphNotFound(candidate));
        }
    }
    Ok(targets)
}

// =============================================================================
// MEMORY STORE
// =============================================================================

/// The in-memory QuadStore.
///
/// Graphs and their statements are kept in insertion-ordered maps keyed by
/// graph URI and triple hash, so scans return first-inserted order and
/// presence checks never compare statements structurally.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    /// Graph URI -> (triple hash -> statement)
    graphs: IndexMap<String, IndexMap<ContentHash, Statement>>,

    /// Prefixes used to extend URIs on the way in.
    namespaces: NamespaceRegistry,

    /// Reserved default graph URI.
    default_graph: String,
}

impl MemoryStore {
    /// Create an empty store with the standard prefixes.
    #[must_use]
    pub fn new() -> Self {
        Self::with_namespaces(NamespaceRegistry::new())
    }

    /// Create an empty store with a custom namespace registry.
    #[must_use]
    pub fn with_namespaces(namespaces: NamespaceRegistry) -> Self {
        Self {
            graphs: IndexMap::new(),
            namespaces,
            default_graph: DEFAULT_GRAPH_URI.to_string(),
        }
    }

    /// Replace the default graph URI.
    #[must_use]
    pub fn with_default_graph(mut self, uri: impl Into<String>) -> Self {
        self.default_graph = uri.into();
        self
    }

    /// Mutable access to the namespace registry.
    pub fn namespaces_mut(&mut self) -> &mut NamespaceRegistry {
        &mut self.namespaces
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl QuadStore for MemoryStore {
    fn namespaces(&self) -> &NamespaceRegistry {
        &self.namespaces
    }

    fn default_graph(&self) -> &str {
        &self.default_graph
    }

    fn contains_graph(&self, graph: &str) -> Result<bool, QuadError> {
        Ok(self.graphs.contains_key(graph))
    }

    fn create_graph(&mut self, graph: &NamedNode) -> Result<(), QuadError> {
        let uri = self.namespaces.extend_uri(graph.as_str());
        if !self.graphs.contains_key(&uri) {
            info!(graph = %uri, "created graph");
            self.graphs.insert(uri, IndexMap::new());
        }
        Ok(())
    }

    fn drop_graph(&mut self, graph: &NamedNode) -> Result<(), QuadError> {
        let uri = self.namespaces.extend_uri(graph.as_str());
        match self.graphs.shift_remove(&uri) {
            Some(statements) => {
                info!(graph = %uri, statements = statements.len(), "dropped graph");
            }
            None => debug!(graph = %uri, "drop of unknown graph ignored"),
        }
        Ok(())
    }

    fn get_graphs(&self) -> Result<Vec<NamedNode>, QuadError> {
        Ok(self.graphs.keys().map(NamedNode::new).collect())
    }

    fn insert_statements(
        &mut self,
        graph: &str,
        statements: &[Statement],
    ) -> Result<usize, QuadError> {
        let collection = self
            .graphs
            .get_mut(graph)
            .ok_or_else(|| QuadError::GraphNotFound(graph.to_string()))?;

        let mut inserted = 0usize;
        for statement in statements {
            let hash = statement.triple_hash();
            if !collection.contains_key(&hash) {
                collection.insert(hash, statement.clone());
                inserted = inserted.saturating_add(1);
            }
        }
        Ok(inserted)
    }

    fn remove_matching(&mut self, graph: &str, pattern: &Statement) -> Result<usize, QuadError> {
        let collection = self
            .graphs
            .get_mut(graph)
            .ok_or_else(|| QuadError::GraphNotFound(graph.to_string()))?;

        let before = collection.len();
        collection.retain(|_, statement| !matches_pattern(statement, pattern));
        Ok(before - collection.len())
    }

    fn graph_statements(&self, graph: &str) -> Result<Vec<Statement>, QuadError> {
        self.graphs
            .get(graph)
            .map(|collection| collection.values().cloned().collect())
            .ok_or_else(|| QuadError::GraphNotFound(graph.to_string()))
    }

    fn get_matching_statements(
        &self,
        pattern: &Statement,
        graph: Option<&NamedNode>,
    ) -> Result<Vec<Statement>, QuadError> {
        let targets = resolve_pattern_graphs(self, pattern, graph)?;
        let extended = Ingestor::extend_pattern(pattern, &self.namespaces);

        let mut matching = Vec::new();
        for target in &targets {
            if let Some(collection) = self.graphs.get(target) {
                matching.extend(
                    collection
                        .values()
                        .filter(|statement| matches_pattern(statement, &extended))
                        .cloned(),
                );
            }
        }
        Ok(matching)
    }

    fn has_matching_statement(
        &self,
        pattern: &Statement,
        graph: Option<&NamedNode>,
    ) -> Result<bool, QuadError> {
        let targets = resolve_pattern_graphs(self, pattern, graph)?;
        let extended = Ingestor::extend_pattern(pattern, &self.namespaces);

        Ok(targets.iter().any(|target| {
            self.graphs.get(target).is_some_and(|collection| {
                collection
                    .values()
                    .any(|statement| matches_pattern(statement, &extended))
            })
        }))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const G: &str = "http://example.org/graph";

    fn foaf_triple(subject: &str, object: Node) -> Statement {
        Statement::triple(Node::named(subject), Node::named("foaf:name"), object)
    }

    #[test]
    fn add_creates_default_graph() {
        let mut store = MemoryStore::new();
        let inserted = store
            .add_statements(&[foaf_triple("http://x/a", Node::literal("A"))], None)
            .expect("add");

        assert_eq!(inserted, 1);
        assert_eq!(
            store.get_graphs().expect("graphs"),
            vec![NamedNode::new(DEFAULT_GRAPH_URI)]
        );
    }

    #[test]
    fn add_to_unknown_graph_fails_without_writing() {
        let mut store = MemoryStore::new();
        let statements = [
            foaf_triple("http://x/a", Node::literal("A")),
            foaf_triple("http://x/b", Node::literal("B")).with_graph(Node::named(G)),
        ];

        let result = store.add_statements(&statements, None);

        assert!(matches!(result, Err(QuadError::GraphNotFound(g)) if g == G));
        assert!(store.get_graphs().expect("graphs").is_empty());
    }

    #[test]
    fn add_dedupes_by_content_hash() {
        let mut store = MemoryStore::new();
        let statement = foaf_triple("http://x/a", Node::literal("A"));

        assert_eq!(store.add_statements(&[statement.clone()], None).expect("add"), 1);
        assert_eq!(store.add_statements(&[statement], None).expect("add"), 0);
        assert_eq!(store.statement_count(None).expect("count"), 1);
    }

    #[test]
    fn shortened_and_full_uris_dedupe() {
        let mut store = MemoryStore::new();
        let short = Statement::triple(
            Node::named("http://x/a"),
            Node::named("rdf:type"),
            Node::named("foaf:Person"),
        );
        let full = Statement::triple(
            Node::named("http://x/a"),
            Node::named("http://www.w3.org/1999/02/22-rdf-syntax-ns#type"),
            Node::named("http://xmlns.com/foaf/0.1/Person"),
        );

        store.add_statements(&[short, full], None).expect("add");
        assert_eq!(store.statement_count(None).expect("count"), 1);
    }

    #[test]
    fn explicit_graph_overrides_quad_graph() {
        let mut store = MemoryStore::new();
        store.create_graph(&NamedNode::new(G)).expect("create");
        let quad = foaf_triple("http://x/a", Node::literal("A"))
            .with_graph(Node::named("http://elsewhere/"));

        store
            .add_statements(&[quad], Some(&NamedNode::new(G)))
            .expect("add");

        assert_eq!(
            store
                .statement_count(Some(&NamedNode::new(G)))
                .expect("count"),
            1
        );
    }

    #[test]
    fn create_graph_is_idempotent() {
        let mut store = MemoryStore::new();
        store.create_graph(&NamedNode::new(G)).expect("create");
        store
            .add_statements(
                &[foaf_triple("http://x/a", Node::literal("A"))],
                Some(&NamedNode::new(G)),
            )
            .expect("add");
        store.create_graph(&NamedNode::new(G)).expect("create again");

        assert_eq!(store.get_graphs().expect("graphs").len(), 1);
        assert_eq!(
            store
                .statement_count(Some(&NamedNode::new(G)))
                .expect("count"),
            1
        );
    }

    #[test]
    fn drop_graph_removes_statements_and_record() {
        let mut store = MemoryStore::new();
        store.create_graph(&NamedNode::new(G)).expect("create");
        store
            .add_statements(
                &[foaf_triple("http://x/a", Node::literal("A"))],
                Some(&NamedNode::new(G)),
            )
            .expect("add");

        store.drop_graph(&NamedNode::new(G)).expect("drop");

        assert!(store.get_graphs().expect("graphs").is_empty());
        let again = store.add_statements(
            &[foaf_triple("http://x/a", Node::literal("A"))],
            Some(&NamedNode::new(G)),
        );
        assert!(matches!(again, Err(QuadError::GraphNotFound(_))));
    }

    #[test]
    fn drop_unknown_graph_is_noop() {
        let mut store = MemoryStore::new();
        assert!(store.drop_graph(&NamedNode::new(G)).is_ok());
    }

    #[test]
    fn delete_with_wildcards() {
        let mut store = MemoryStore::new();
        store
            .add_statements(
                &[
                    foaf_triple("http://x/a", Node::literal("A")),
                    foaf_triple("http://x/a", Node::literal("A2")),
                    foaf_triple("http://x/b", Node::literal("B")),
                ],
                None,
            )
            .expect("add");

        let pattern = Statement::triple(Node::named("http://x/a"), Node::any(), Node::any());
        let removed = store
            .delete_matching_statements(&pattern, None)
            .expect("delete");

        assert_eq!(removed, 2);
        assert_eq!(store.statement_count(None).expect("count"), 1);
    }

    #[test]
    fn delete_pattern_uses_extended_uris() {
        let mut store = MemoryStore::new();
        store
            .add_statements(&[foaf_triple("http://x/a", Node::literal("A"))], None)
            .expect("add");

        let pattern = Statement::triple(
            Node::any(),
            Node::named("http://xmlns.com/foaf/0.1/name"),
            Node::any(),
        );
        assert_eq!(
            store
                .delete_matching_statements(&pattern, None)
                .expect("delete"),
            1
        );
    }

    #[test]
    fn delete_across_every_graph() {
        let mut store = MemoryStore::new();
        store.create_graph(&NamedNode::new(G)).expect("create");
        let statement = foaf_triple("http://x/a", Node::literal("A"));
        store
            .add_statements(&[statement.clone()], None)
            .expect("add");
        store
            .add_statements(&[statement], Some(&NamedNode::new(G)))
            .expect("add");

        let pattern = Statement::triple(Node::any(), Node::any(), Node::any())
            .with_graph(Node::any());
        assert_eq!(
            store
                .delete_matching_statements(&pattern, None)
                .expect("delete"),
            2
        );
    }

    #[test]
    fn delete_in_unknown_graph_fails() {
        let mut store = MemoryStore::new();
        let pattern = Statement::triple(Node::any(), Node::any(), Node::any());
        let result = store.delete_matching_statements(&pattern, Some(&NamedNode::new(G)));
        assert!(matches!(result, Err(QuadError::GraphNotFound(_))));
    }

    #[test]
    fn matching_statements_carry_graph() {
        let mut store = MemoryStore::new();
        store
            .add_statements(&[foaf_triple("http://x/a", Node::literal("A"))], None)
            .expect("add");

        let pattern = Statement::triple(Node::any(), Node::named("foaf:name"), Node::any());
        let found = store
            .get_matching_statements(&pattern, None)
            .expect("match");

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].graph, Some(Node::named(DEFAULT_GRAPH_URI)));
        assert!(store.has_matching_statement(&pattern, None).expect("has"));

        let miss = Statement::triple(Node::named("http://x/zzz"), Node::any(), Node::any());
        assert!(!store.has_matching_statement(&miss, None).expect("has"));
    }

    #[test]
    fn graphs_listed_in_creation_order() {
        let mut store = MemoryStore::new();
        for uri in ["http://x/g3", "http://x/g1", "http://x/g2"] {
            store.create_graph(&NamedNode::new(uri)).expect("create");
        }
        let graphs: Vec<_> = store
            .get_graphs()
            .expect("graphs")
            .into_iter()
            .map(|g| g.0)
            .collect();
        assert_eq!(graphs, vec!["http://x/g3", "http://x/g1", "http://x/g2"]);
    }

    #[test]
    fn prefixed_graph_names_are_extended() {
        let mut store = MemoryStore::new();
        store.namespaces_mut().add_prefix("ex", "http://example.org/");
        store
            .create_graph(&NamedNode::new("ex:graph"))
            .expect("create");
        assert!(store.contains_graph(G).expect("contains"));
    }
}
