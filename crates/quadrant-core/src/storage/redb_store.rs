//! # redb-backed Quad Storage
//!
//! A disk-backed quad store using the redb embedded database.
//!
//! Values (URIs, blank nodes, literals) are interned once in a value table
//! and quads reference them by id. Every write runs in a single redb
//! transaction, so a batch of statements, a deletion and the value garbage
//! collection that follows it are committed or rolled back together.
//!
//! ## Layout
//!
//! - `graphs`: graph URI -> graph id
//! - `values` / `value_index`: interned values and their reverse index
//! - `quads`: insertion sequence -> (graph, subject, predicate, object)
//! - `quad_index`: (graph, subject, predicate, object) -> sequence
//! - `metadata`: id counters

use crate::namespace::NamespaceRegistry;
use crate::primitives::DEFAULT_GRAPH_URI;
use crate::store::{QuadStore, matches_pattern};
use crate::{BlankNode, Literal, NamedNode, Node, QuadError, Statement};
use indexmap::IndexMap;
use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, Table, TableDefinition,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{debug, info};

/// Table for graphs: graph URI -> graph id
const GRAPHS: TableDefinition<&str, u64> = TableDefinition::new("graphs");

/// Table for interned values: value id -> serialized ValueRecord
const VALUES: TableDefinition<u64, &[u8]> = TableDefinition::new("values");

/// Reverse index for interning: serialized ValueRecord -> value id
const VALUE_INDEX: TableDefinition<&[u8], u64> = TableDefinition::new("value_index");

/// Table for quads in insertion order: sequence -> (graph, subject, predicate, object)
const QUADS: TableDefinition<u64, (u64, u64, u64, u64)> = TableDefinition::new("quads");

/// Dedup index: (graph, subject, predicate, object) -> sequence
const QUAD_INDEX: TableDefinition<(u64, u64, u64, u64), u64> = TableDefinition::new("quad_index");

/// Table for metadata: key string -> value u64
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

type QuadKey = (u64, u64, u64, u64);

// =============================================================================
// VALUE RECORDS
// =============================================================================

/// Kind of an interned value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum ValueKind {
    Uri,
    BlankNode,
    Literal,
}

/// One row of the value table.
///
/// The postcard encoding of a record is also its key in `value_index`, so
/// two nodes intern to the same id exactly when every field is equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ValueRecord {
    value: String,
    kind: ValueKind,
    language: Option<String>,
    datatype: Option<String>,
}

impl ValueRecord {
    fn from_node(node: &Node) -> Result<Self, QuadError> {
        match node {
            Node::Named(named) => Ok(Self {
                value: named.0.clone(),
                kind: ValueKind::Uri,
                language: None,
                datatype: None,
            }),
            Node::Blank(blank) => Ok(Self {
                value: blank.0.clone(),
                kind: ValueKind::BlankNode,
                language: None,
                datatype: None,
            }),
            Node::Literal(literal) => Ok(Self {
                value: literal.value.clone(),
                kind: ValueKind::Literal,
                language: literal.language.clone(),
                datatype: literal.datatype.clone(),
            }),
            Node::Pattern(pattern) => Err(QuadError::InvalidStatement(format!(
                "cannot store pattern {}",
                pattern
            ))),
        }
    }

    fn into_node(self) -> Node {
        match self.kind {
            ValueKind::Uri => Node::Named(NamedNode(self.value)),
            ValueKind::BlankNode => Node::Blank(BlankNode(self.value)),
            ValueKind::Literal => Node::Literal(Literal {
                value: self.value,
                datatype: self.datatype,
                language: self.language,
            }),
        }
    }
}

/// Intern a node, returning its value id.
fn intern(
    values: &mut Table<'_, u64, &'static [u8]>,
    value_index: &mut Table<'_, &'static [u8], u64>,
    next_value_id: &mut u64,
    node: &Node,
) -> Result<u64, QuadError> {
    let record = ValueRecord::from_node(node)?;
    let bytes =
        postcard::to_allocvec(&record).map_err(|e| QuadError::SerializationError(e.to_string()))?;

    let existing = value_index
        .get(bytes.as_slice())
        .map_err(|e| QuadError::IoError(e.to_string()))?
        .map(|v| v.value());
    if let Some(id) = existing {
        return Ok(id);
    }

    let id = *next_value_id;
    *next_value_id = next_value_id.saturating_add(1);
    values
        .insert(id, bytes.as_slice())
        .map_err(|e| QuadError::IoError(e.to_string()))?;
    value_index
        .insert(bytes.as_slice(), id)
        .map_err(|e| QuadError::IoError(e.to_string()))?;
    Ok(id)
}

/// Resolve a value id, memoizing decoded nodes in `cache`.
fn load_value(
    values: &impl ReadableTable<u64, &'static [u8]>,
    cache: &mut BTreeMap<u64, Node>,
    id: u64,
) -> Result<Node, QuadError> {
    if let Some(node) = cache.get(&id) {
        return Ok(node.clone());
    }
    let record: ValueRecord = match values
        .get(id)
        .map_err(|e| QuadError::IoError(e.to_string()))?
    {
        Some(data) => postcard::from_bytes(data.value())
            .map_err(|e| QuadError::SerializationError(e.to_string()))?,
        None => {
            return Err(QuadError::IoError(format!(
                "quad references missing value {}",
                id
            )));
        }
    };
    let node = record.into_node();
    cache.insert(id, node.clone());
    Ok(node)
}

/// Delete every value no quad references. Returns the number removed.
fn collect_orphan_values(
    quads: &impl ReadableTable<u64, QuadKey>,
    values: &mut Table<'_, u64, &'static [u8]>,
    value_index: &mut Table<'_, &'static [u8], u64>,
) -> Result<usize, QuadError> {
    let mut referenced = BTreeSet::new();
    for entry in quads.iter().map_err(|e| QuadError::IoError(e.to_string()))? {
        let (_, quad) = entry.map_err(|e| QuadError::IoError(e.to_string()))?;
        let (_, subject, predicate, object) = quad.value();
        referenced.insert(subject);
        referenced.insert(predicate);
        referenced.insert(object);
    }

    let mut orphans: Vec<(u64, Vec<u8>)> = Vec::new();
    for entry in values.iter().map_err(|e| QuadError::IoError(e.to_string()))? {
        let (id, data) = entry.map_err(|e| QuadError::IoError(e.to_string()))?;
        let id = id.value();
        if !referenced.contains(&id) {
            orphans.push((id, data.value().to_vec()));
        }
    }

    for (id, bytes) in &orphans {
        values
            .remove(id)
            .map_err(|e| QuadError::IoError(e.to_string()))?;
        value_index
            .remove(bytes.as_slice())
            .map_err(|e| QuadError::IoError(e.to_string()))?;
    }
    Ok(orphans.len())
}

// =============================================================================
// REDB STORE
// =============================================================================

/// A disk-backed quad store using redb.
///
/// - Graph records live in redb; an in-memory cache mirrors them in
///   creation order
/// - Caches and counters are updated only after a successful commit
/// - Pattern matching (`get_matching_statements`) is not available
pub struct RedbStore {
    /// The redb database handle.
    db: Database,
    /// Graph URI -> graph id, in creation order.
    graph_cache: IndexMap<String, u64>,
    /// Next available graph id.
    next_graph_id: u64,
    /// Next available value id.
    next_value_id: u64,
    /// Next quad insertion sequence.
    next_quad_seq: u64,
    /// Prefixes used to extend URIs on the way in.
    namespaces: NamespaceRegistry,
    /// Reserved default graph URI.
    default_graph: String,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore")
            .field("graph_cache_size", &self.graph_cache.len())
            .field("next_value_id", &self.next_value_id)
            .field("next_quad_seq", &self.next_quad_seq)
            .field("default_graph", &self.default_graph)
            .finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a quad database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, QuadError> {
        let db = Database::create(path.as_ref()).map_err(|e| QuadError::IoError(e.to_string()))?;

        // Initialize tables if they don't exist
        {
            let write_txn = db
                .begin_write()
                .map_err(|e| QuadError::IoError(e.to_string()))?;
            let _ = write_txn
                .open_table(GRAPHS)
                .map_err(|e| QuadError::IoError(e.to_string()))?;
            let _ = write_txn
                .open_table(VALUES)
                .map_err(|e| QuadError::IoError(e.to_string()))?;
            let _ = write_txn
                .open_table(VALUE_INDEX)
                .map_err(|e| QuadError::IoError(e.to_string()))?;
            let _ = write_txn
                .open_table(QUADS)
                .map_err(|e| QuadError::IoError(e.to_string()))?;
            let _ = write_txn
                .open_table(QUAD_INDEX)
                .map_err(|e| QuadError::IoError(e.to_string()))?;
            let _ = write_txn
                .open_table(METADATA)
                .map_err(|e| QuadError::IoError(e.to_string()))?;
            write_txn
                .commit()
                .map_err(|e| QuadError::IoError(e.to_string()))?;
        }

        let read_txn = db
            .begin_read()
            .map_err(|e| QuadError::IoError(e.to_string()))?;

        // Load metadata
        let (next_graph_id, next_value_id, next_quad_seq) = {
            let table = read_txn
                .open_table(METADATA)
                .map_err(|e| QuadError::IoError(e.to_string()))?;
            let counter = |key: &str| -> Result<u64, QuadError> {
                Ok(table
                    .get(key)
                    .map_err(|e| QuadError::IoError(e.to_string()))?
                    .map(|v| v.value())
                    .unwrap_or(0))
            };
            (
                counter("next_graph_id")?,
                counter("next_value_id")?,
                counter("next_quad_seq")?,
            )
        };

        // Load graph cache in creation order
        let graph_cache = {
            let table = read_txn
                .open_table(GRAPHS)
                .map_err(|e| QuadError::IoError(e.to_string()))?;
            let mut graphs = Vec::new();
            for entry in table.iter().map_err(|e| QuadError::IoError(e.to_string()))? {
                let (key, value) = entry.map_err(|e| QuadError::IoError(e.to_string()))?;
                graphs.push((value.value(), key.value().to_string()));
            }
            graphs.sort_unstable();
            graphs
                .into_iter()
                .map(|(id, uri)| (uri, id))
                .collect::<IndexMap<_, _>>()
        };

        debug!(graphs = graph_cache.len(), "opened redb quad store");

        Ok(Self {
            db,
            graph_cache,
            next_graph_id,
            next_value_id,
            next_quad_seq,
            namespaces: NamespaceRegistry::new(),
            default_graph: DEFAULT_GRAPH_URI.to_string(),
        })
    }

    /// Replace the namespace registry.
    #[must_use]
    pub fn with_namespaces(mut self, namespaces: NamespaceRegistry) -> Self {
        self.namespaces = namespaces;
        self
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

    /// Compact the database file.
    pub fn compact(&mut self) -> Result<(), QuadError> {
        self.db
            .compact()
            .map_err(|e| QuadError::IoError(e.to_string()))?;
        Ok(())
    }

    /// Number of interned values.
    pub fn value_count(&self) -> Result<u64, QuadError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| QuadError::IoError(e.to_string()))?;
        let values = read_txn
            .open_table(VALUES)
            .map_err(|e| QuadError::IoError(e.to_string()))?;
        values.len().map_err(|e| QuadError::IoError(e.to_string()))
    }

    /// Number of stored quads across all graphs.
    pub fn quad_count(&self) -> Result<u64, QuadError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| QuadError::IoError(e.to_string()))?;
        let quads = read_txn
            .open_table(QUADS)
            .map_err(|e| QuadError::IoError(e.to_string()))?;
        quads.len().map_err(|e| QuadError::IoError(e.to_string()))
    }
}

impl QuadStore for RedbStore {
    fn namespaces(&self) -> &NamespaceRegistry {
        &self.namespaces
    }

    fn default_graph(&self) -> &str {
        &self.default_graph
    }

    fn contains_graph(&self, graph: &str) -> Result<bool, QuadError> {
        Ok(self.graph_cache.contains_key(graph))
    }

    fn create_graph(&mut self, graph: &NamedNode) -> Result<(), QuadError> {
        let uri = self.namespaces.extend_uri(graph.as_str());
        if self.graph_cache.contains_key(&uri) {
            return Ok(());
        }

        let graph_id = self.next_graph_id;
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| QuadError::IoError(e.to_string()))?;
        {
            let mut graphs = write_txn
                .open_table(GRAPHS)
                .map_err(|e| QuadError::IoError(e.to_string()))?;
            graphs
                .insert(uri.as_str(), graph_id)
                .map_err(|e| QuadError::IoError(e.to_string()))?;

            let mut meta = write_txn
                .open_table(METADATA)
                .map_err(|e| QuadError::IoError(e.to_string()))?;
            meta.insert("next_graph_id", graph_id.saturating_add(1))
                .map_err(|e| QuadError::IoError(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| QuadError::IoError(e.to_string()))?;

        self.next_graph_id = graph_id.saturating_add(1);
        info!(graph = %uri, id = graph_id, "created graph");
        self.graph_cache.insert(uri, graph_id);
        Ok(())
    }

    fn drop_graph(&mut self, graph: &NamedNode) -> Result<(), QuadError> {
        let uri = self.namespaces.extend_uri(graph.as_str());
        let Some(&graph_id) = self.graph_cache.get(&uri) else {
            debug!(graph = %uri, "drop of unknown graph ignored");
            return Ok(());
        };

        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| QuadError::IoError(e.to_string()))?;
        let (removed, collected) = {
            let mut graphs = write_txn
                .open_table(GRAPHS)
                .map_err(|e| QuadError::IoError(e.to_string()))?;
            let mut quads = write_txn
                .open_table(QUADS)
                .map_err(|e| QuadError::IoError(e.to_string()))?;
            let mut quad_index = write_txn
                .open_table(QUAD_INDEX)
                .map_err(|e| QuadError::IoError(e.to_string()))?;
            let mut values = write_txn
                .open_table(VALUES)
                .map_err(|e| QuadError::IoError(e.to_string()))?;
            let mut value_index = write_txn
                .open_table(VALUE_INDEX)
                .map_err(|e| QuadError::IoError(e.to_string()))?;

            let mut doomed: Vec<(u64, QuadKey)> = Vec::new();
            for entry in quads.iter().map_err(|e| QuadError::IoError(e.to_string()))? {
                let (seq, quad) = entry.map_err(|e| QuadError::IoError(e.to_string()))?;
                let quad = quad.value();
                if quad.0 == graph_id {
                    doomed.push((seq.value(), quad));
                }
            }
            for (seq, quad) in &doomed {
                quads
                    .remove(seq)
                    .map_err(|e| QuadError::IoError(e.to_string()))?;
                quad_index
                    .remove(quad)
                    .map_err(|e| QuadError::IoError(e.to_string()))?;
            }
            graphs
                .remove(uri.as_str())
                .map_err(|e| QuadError::IoError(e.to_string()))?;

            let collected = collect_orphan_values(&quads, &mut values, &mut value_index)?;
            (doomed.len(), collected)
        };
        write_txn
            .commit()
            .map_err(|e| QuadError::IoError(e.to_string()))?;

        self.graph_cache.shift_remove(&uri);
        info!(graph = %uri, statements = removed, values_collected = collected, "dropped graph");
        Ok(())
    }

    fn get_graphs(&self) -> Result<Vec<NamedNode>, QuadError> {
        Ok(self.graph_cache.keys().map(NamedNode::new).collect())
    }

    fn insert_statements(
        &mut self,
        graph: &str,
        statements: &[Statement],
    ) -> Result<usize, QuadError> {
        let graph_id = *self
            .graph_cache
            .get(graph)
            .ok_or_else(|| QuadError::GraphNotFound(graph.to_string()))?;

        let mut next_value_id = self.next_value_id;
        let mut next_quad_seq = self.next_quad_seq;
        let mut inserted = 0usize;

        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| QuadError::IoError(e.to_string()))?;
        {
            let mut values = write_txn
                .open_table(VALUES)
                .map_err(|e| QuadError::IoError(e.to_string()))?;
            let mut value_index = write_txn
                .open_table(VALUE_INDEX)
                .map_err(|e| QuadError::IoError(e.to_string()))?;
            let mut quads = write_txn
                .open_table(QUADS)
                .map_err(|e| QuadError::IoError(e.to_string()))?;
            let mut quad_index = write_txn
                .open_table(QUAD_INDEX)
                .map_err(|e| QuadError::IoError(e.to_string()))?;
            let mut meta = write_txn
                .open_table(METADATA)
                .map_err(|e| QuadError::IoError(e.to_string()))?;

            for statement in statements {
                let subject = intern(
                    &mut values,
                    &mut value_index,
                    &mut next_value_id,
                    &statement.subject,
                )?;
                let predicate = intern(
                    &mut values,
                    &mut value_index,
                    &mut next_value_id,
                    &statement.predicate,
                )?;
                let object = intern(
                    &mut values,
                    &mut value_index,
                    &mut next_value_id,
                    &statement.object,
                )?;

                let key = (graph_id, subject, predicate, object);
                let present = quad_index
                    .get(key)
                    .map_err(|e| QuadError::IoError(e.to_string()))?
                    .is_some();
                if present {
                    continue;
                }

                quads
                    .insert(next_quad_seq, key)
                    .map_err(|e| QuadError::IoError(e.to_string()))?;
                quad_index
                    .insert(key, next_quad_seq)
                    .map_err(|e| QuadError::IoError(e.to_string()))?;
                next_quad_seq = next_quad_seq.saturating_add(1);
                inserted = inserted.saturating_add(1);
            }

            meta.insert("next_value_id", next_value_id)
                .map_err(|e| QuadError::IoError(e.to_string()))?;
            meta.insert("next_quad_seq", next_quad_seq)
                .map_err(|e| QuadError::IoError(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| QuadError::IoError(e.to_string()))?;

        // Update in-memory state only after successful commit.
        self.next_value_id = next_value_id;
        self.next_quad_seq = next_quad_seq;
        Ok(inserted)
    }

    fn remove_matching(&mut self, graph: &str, pattern: &Statement) -> Result<usize, QuadError> {
        let graph_id = *self
            .graph_cache
            .get(graph)
            .ok_or_else(|| QuadError::GraphNotFound(graph.to_string()))?;

        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| QuadError::IoError(e.to_string()))?;
        let (removed, collected) = {
            let mut quads = write_txn
                .open_table(QUADS)
                .map_err(|e| QuadError::IoError(e.to_string()))?;
            let mut quad_index = write_txn
                .open_table(QUAD_INDEX)
                .map_err(|e| QuadError::IoError(e.to_string()))?;
            let mut values = write_txn
                .open_table(VALUES)
                .map_err(|e| QuadError::IoError(e.to_string()))?;
            let mut value_index = write_txn
                .open_table(VALUE_INDEX)
                .map_err(|e| QuadError::IoError(e.to_string()))?;

            // Pass 1: find matching quads of this graph.
            let mut cache = BTreeMap::new();
            let mut doomed: Vec<(u64, QuadKey)> = Vec::new();
            for entry in quads.iter().map_err(|e| QuadError::IoError(e.to_string()))? {
                let (seq, quad) = entry.map_err(|e| QuadError::IoError(e.to_string()))?;
                let quad = quad.value();
                if quad.0 != graph_id {
                    continue;
                }
                let statement = Statement::triple(
                    load_value(&values, &mut cache, quad.1)?,
                    load_value(&values, &mut cache, quad.2)?,
                    load_value(&values, &mut cache, quad.3)?,
                );
                if matches_pattern(&statement, pattern) {
                    doomed.push((seq.value(), quad));
                }
            }

            // Pass 2: delete them, then collect values nothing references.
            for (seq, quad) in &doomed {
                quads
                    .remove(seq)
                    .map_err(|e| QuadError::IoError(e.to_string()))?;
                quad_index
                    .remove(quad)
                    .map_err(|e| QuadError::IoError(e.to_string()))?;
            }
            let collected = if doomed.is_empty() {
                0
            } else {
                collect_orphan_values(&quads, &mut values, &mut value_index)?
            };
            (doomed.len(), collected)
        };
        write_txn
            .commit()
            .map_err(|e| QuadError::IoError(e.to_string()))?;

        debug!(graph = %graph, removed, values_collected = collected, "removed quads");
        Ok(removed)
    }

    fn graph_statements(&self, graph: &str) -> Result<Vec<Statement>, QuadError> {
        let graph_id = *self
            .graph_cache
            .get(graph)
            .ok_or_else(|| QuadError::GraphNotFound(graph.to_string()))?;

        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| QuadError::IoError(e.to_string()))?;
        let quads = read_txn
            .open_table(QUADS)
            .map_err(|e| QuadError::IoError(e.to_string()))?;
        let values = read_txn
            .open_table(VALUES)
            .map_err(|e| QuadError::IoError(e.to_string()))?;

        let graph_node = Node::named(graph);
        let mut cache = BTreeMap::new();
        let mut statements = Vec::new();
        for entry in quads.iter().map_err(|e| QuadError::IoError(e.to_string()))? {
            let (_, quad) = entry.map_err(|e| QuadError::IoError(e.to_string()))?;
            let (quad_graph, subject, predicate, object) = quad.value();
            if quad_graph != graph_id {
                continue;
            }
            statements.push(Statement::quad(
                load_value(&values, &mut cache, subject)?,
                load_value(&values, &mut cache, predicate)?,
                load_value(&values, &mut cache, object)?,
                graph_node.clone(),
            ));
        }
        Ok(statements)
    }

    fn get_matching_statements(
        &self,
        _pattern: &Statement,
        _graph: Option<&NamedNode>,
    ) -> Result<Vec<Statement>, QuadError> {
        Err(QuadError::NotImplemented(
            "get_matching_statements on the redb backend",
        ))
    }

    fn has_matching_statement(
        &self,
        _pattern: &Statement,
        _graph: Option<&NamedNode>,
    ) -> Result<bool, QuadError> {
        Err(QuadError::NotImplemented(
            "has_matching_statement on the redb backend",
        ))
    }
}

// =============================================================================
// TESTS
// =============================================================================
