//! # Ingestor Module
//!
//! Statement validation and normalization for Quadrant stores.
//!
//! - Validate statements before any backend mutation
//! - Resolve the effective graph (argument > quad field > default graph)
//! - Extend every prefixed URI through the store's namespace registry
//! - Replace caller blank node labels with fresh, globally unique ones

use crate::namespace::NamespaceRegistry;
use crate::primitives::{BLANK_LABEL_HEX_LEN, BLANK_LABEL_PREFIX};
use crate::{BlankNode, Literal, NamedNode, Node, QuadError, Statement};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Process-wide sequence mixed into generated labels.
static LABEL_SEQUENCE: AtomicU64 = AtomicU64::new(0);

// =============================================================================
// BLANK NODE REMAPPING
// =============================================================================

/// Per-call mapping from caller blank node labels to generated labels.
///
/// One table lives for exactly one `add_statements` call: repeated labels in
/// that call resolve to the same generated label, while a new call starts
/// with an empty table and therefore never reuses a label.
#[derive(Debug, Default)]
pub struct BlankNodeRemapTable {
    labels: BTreeMap<String, String>,
}

impl BlankNodeRemapTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the generated label for `label`, generating one on first use.
    pub fn resolve(&mut self, label: &str) -> String {
        self.labels
            .entry(label.to_string())
            .or_insert_with(generate_label)
            .clone()
    }

    /// Number of distinct source labels seen so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether no label has been resolved yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// BLAKE3 over wall-clock nanoseconds, a random salt and a process sequence.
fn generate_label() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos())
        .unwrap_or(0);
    let salt: u128 = rand::random();
    let sequence = LABEL_SEQUENCE.fetch_add(1, Ordering::Relaxed);

    let mut hasher = blake3::Hasher::new();
    hasher.update(&nanos.to_le_bytes());
    hasher.update(&salt.to_le_bytes());
    hasher.update(&sequence.to_le_bytes());
    let digest = hasher.finalize().to_hex();

    format!(
        "{}{}",
        BLANK_LABEL_PREFIX,
        &digest.as_str()[..BLANK_LABEL_HEX_LEN]
    )
}

// =============================================================================
// INGESTOR
// =============================================================================

/// The Ingestor turns caller statements into stored statements.
///
/// The Ingestor:
/// - Rejects statements that violate stored-statement invariants
/// - Decides which graph each statement lands in
/// - Produces the normalized form backends persist and compare
pub struct Ingestor;

impl Ingestor {
    /// Validate a statement destined for storage.
    ///
    /// A statement is valid if:
    /// - No position holds a `Pattern`
    /// - The predicate is a `Named` node
    /// - The graph, when present, is a `Named` node
    /// - No named node has an empty URI
    ///
    /// Returns `QuadError::InvalidStatement` if validation fails.
    pub fn validate(statement: &Statement) -> Result<(), QuadError> {
        for (position, node) in [
            ("subject", &statement.subject),
            ("predicate", &statement.predicate),
            ("object", &statement.object),
        ] {
            Self::validate_concrete(position, node)?;
        }

        if statement.predicate.as_named().is_none() {
            return Err(QuadError::InvalidStatement(format!(
                "predicate must be a named node, got {}",
                statement.predicate
            )));
        }

        if let Some(graph) = &statement.graph {
            Self::validate_concrete("graph", graph)?;
            if graph.as_named().is_none() {
                return Err(QuadError::InvalidStatement(format!(
                    "graph must be a named node, got {}",
                    graph
                )));
            }
        }

        Ok(())
    }

    fn validate_concrete(position: &str, node: &Node) -> Result<(), QuadError> {
        match node {
            Node::Pattern(pattern) => Err(QuadError::InvalidStatement(format!(
                "{} is a pattern ({}); stored statements must be concrete",
                position, pattern
            ))),
            Node::Named(named) if named.as_str().is_empty() => Err(
                QuadError::InvalidStatement(format!("{} has an empty URI", position)),
            ),
            _ => Ok(()),
        }
    }

    /// Resolve the graph a statement is written to.
    ///
    /// Precedence: explicit argument, then the statement's own graph, then
    /// `default_graph`. The result is URI-extended.
    #[must_use]
    pub fn resolve_graph(
        explicit: Option<&NamedNode>,
        statement: &Statement,
        default_graph: &str,
        namespaces: &NamespaceRegistry,
    ) -> String {
        if let Some(graph) = explicit {
            return namespaces.extend_uri(graph.as_str());
        }
        match statement.graph.as_ref().and_then(Node::as_named) {
            Some(graph) => namespaces.extend_uri(graph.as_str()),
            None => default_graph.to_string(),
        }
    }

    /// Normalize a validated statement for storage in `graph_uri`.
    ///
    /// Named nodes and literal datatypes are URI-extended, blank nodes are
    /// remapped through `remap`, and the graph field is set to `graph_uri`.
    pub fn normalize(
        statement: &Statement,
        graph_uri: &str,
        namespaces: &NamespaceRegistry,
        remap: &mut BlankNodeRemapTable,
    ) -> Statement {
        Statement::quad(
            Self::normalize_node(&statement.subject, namespaces, remap),
            Self::normalize_node(&statement.predicate, namespaces, remap),
            Self::normalize_node(&statement.object, namespaces, remap),
            Node::named(graph_uri),
        )
    }

    fn normalize_node(
        node: &Node,
        namespaces: &NamespaceRegistry,
        remap: &mut BlankNodeRemapTable,
    ) -> Node {
        match node {
            Node::Blank(blank) => Node::Blank(BlankNode::new(remap.resolve(blank.as_str()))),
            other => Self::extend_node(other, namespaces),
        }
    }

    /// URI-extend a node without touching blank node labels.
    ///
    /// Used for deletion and matching patterns, which must address stored
    /// labels verbatim.
    #[must_use]
    pub fn extend_node(node: &Node, namespaces: &NamespaceRegistry) -> Node {
        match node {
            Node::Named(named) => Node::named(namespaces.extend_uri(named.as_str())),
            Node::Literal(literal) => Node::Literal(Literal {
                value: literal.value.clone(),
                datatype: literal
                    .datatype
                    .as_deref()
                    .map(|datatype| namespaces.extend_uri(datatype)),
                language: literal.language.clone(),
            }),
            other => other.clone(),
        }
    }

    /// URI-extend every position of a pattern statement.
    #[must_use]
    pub fn extend_pattern(pattern: &Statement, namespaces: &NamespaceRegistry) -> Statement {
        Statement {
            subject: Self::extend_node(&pattern.subject, namespaces),
            predicate: Self::extend_node(&pattern.predicate, namespaces),
            object: Self::extend_node(&pattern.object, namespaces),
            graph: pattern
                .graph
                .as_ref()
                .map(|graph| Self::extend_node(graph, namespaces)),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
