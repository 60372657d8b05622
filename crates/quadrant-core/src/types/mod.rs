//! # Core Type Definitions
//!
//! This module contains the value types shared by every Quadrant backend:
//! - RDF terms (`NamedNode`, `BlankNode`, `Literal`) and query placeholders (`PatternNode`)
//! - The `Node` union over all of them
//! - `Statement`, a triple or (with a graph) a quad
//! - `ContentHash`, the BLAKE3 digest of a statement's canonical form
//! - Error types (`QuadError`)
//!
//! ## Canonical Form
//!
//! Every node has exactly one canonical string (`<uri>`, `_:id`, `"value"@lang`,
//! `"value"^^<datatype>`, `?name`). Statement identity, deduplication and
//! diffing are all defined over that string, never over in-memory layout.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// RDF TERMS
// =============================================================================

/// A URI-identified resource.
///
/// The URI is stored as given; stores extend shortened forms (`foaf:Person`)
/// before a named node is persisted or compared.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NamedNode(pub String);

impl NamedNode {
    /// Create a named node from a URI (full or prefixed).
    #[must_use]
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    /// Get the URI as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NamedNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.0)
    }
}

/// An anonymous resource, identified only within one store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlankNode(pub String);

impl BlankNode {
    /// Create a blank node from a label (without the `_:` prefix).
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the label as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlankNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "_:{}", self.0)
    }
}

/// A scalar value, optionally typed or language-tagged.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Literal {
    /// The lexical value.
    pub value: String,
    /// Datatype URI, if any.
    pub datatype: Option<String>,
    /// Language tag, if any.
    pub language: Option<String>,
}

impl Literal {
    /// Create a plain literal.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            datatype: None,
            language: None,
        }
    }

    /// Create a literal with a datatype URI.
    #[must_use]
    pub fn typed(value: impl Into<String>, datatype: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            datatype: Some(datatype.into()),
            language: None,
        }
    }

    /// Create a language-tagged literal.
    #[must_use]
    pub fn with_language(value: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            datatype: None,
            language: Some(language.into()),
        }
    }

    /// Get the lexical value as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", escape_literal(&self.value))?;
        if let Some(language) = &self.language {
            write!(f, "@{}", language)?;
        }
        if let Some(datatype) = &self.datatype {
            write!(f, "^^<{}>", datatype)?;
        }
        Ok(())
    }
}

/// Escape a lexical value so that distinct literals never share a canonical form.
fn escape_literal(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// A query placeholder.
///
/// A named pattern is a query variable; an unnamed one is the wildcard used
/// by `delete_matching_statements` and `get_matching_statements`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PatternNode {
    /// Variable name without the leading `?`, or `None` for the wildcard.
    pub name: Option<String>,
}

impl PatternNode {
    /// The anonymous wildcard.
    #[must_use]
    pub const fn any() -> Self {
        Self { name: None }
    }

    /// A named query variable.
    #[must_use]
    pub fn variable(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
        }
    }
}

impl fmt::Display for PatternNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "?{}", name),
            None => f.write_str("?"),
        }
    }
}

// =============================================================================
// NODE
// =============================================================================

/// Any position of a statement.
///
/// Only `Named`, `Literal` and `Blank` are concrete. `Pattern` appears in
/// query and deletion patterns, never in stored statements.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Node {
    /// A URI-identified resource.
    Named(NamedNode),
    /// A literal value.
    Literal(Literal),
    /// A blank node.
    Blank(BlankNode),
    /// A variable or wildcard.
    Pattern(PatternNode),
}

impl Node {
    /// Shorthand for a named node.
    #[must_use]
    pub fn named(uri: impl Into<String>) -> Self {
        Self::Named(NamedNode::new(uri))
    }

    /// Shorthand for a plain literal.
    #[must_use]
    pub fn literal(value: impl Into<String>) -> Self {
        Self::Literal(Literal::new(value))
    }

    /// Shorthand for a blank node.
    #[must_use]
    pub fn blank(id: impl Into<String>) -> Self {
        Self::Blank(BlankNode::new(id))
    }

    /// Shorthand for the wildcard pattern.
    #[must_use]
    pub const fn any() -> Self {
        Self::Pattern(PatternNode::any())
    }

    /// Shorthand for a named variable.
    #[must_use]
    pub fn variable(name: impl Into<String>) -> Self {
        Self::Pattern(PatternNode::variable(name))
    }

    /// Whether this node may appear in a stored statement.
    #[must_use]
    pub const fn is_concrete(&self) -> bool {
        !matches!(self, Self::Pattern(_))
    }

    /// Whether this node is a variable or wildcard.
    #[must_use]
    pub const fn is_pattern(&self) -> bool {
        matches!(self, Self::Pattern(_))
    }

    /// Get the named node, if this is one.
    #[must_use]
    pub const fn as_named(&self) -> Option<&NamedNode> {
        match self {
            Self::Named(named) => Some(named),
            _ => None,
        }
    }

    /// Get the blank node, if this is one.
    #[must_use]
    pub const fn as_blank(&self) -> Option<&BlankNode> {
        match self {
            Self::Blank(blank) => Some(blank),
            _ => None,
        }
    }

    /// Get the literal, if this is one.
    #[must_use]
    pub const fn as_literal(&self) -> Option<&Literal> {
        match self {
            Self::Literal(literal) => Some(literal),
            _ => None,
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(named) => named.fmt(f),
            Self::Literal(literal) => literal.fmt(f),
            Self::Blank(blank) => blank.fmt(f),
            Self::Pattern(pattern) => pattern.fmt(f),
        }
    }
}

impl From<NamedNode> for Node {
    fn from(named: NamedNode) -> Self {
        Self::Named(named)
    }
}

impl From<Literal> for Node {
    fn from(literal: Literal) -> Self {
        Self::Literal(literal)
    }
}

impl From<BlankNode> for Node {
    fn from(blank: BlankNode) -> Self {
        Self::Blank(blank)
    }
}

// =============================================================================
// CONTENT HASH
// =============================================================================

/// BLAKE3 digest of a statement's canonical form.
///
/// Used as the dedup key inside a graph and as the identity in diffs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Hash a canonical string.
    #[must_use]
    pub fn of(canonical: &str) -> Self {
        Self(*blake3::hash(canonical.as_bytes()).as_bytes())
    }

    /// Get the raw digest bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

// =============================================================================
// STATEMENT
// =============================================================================

/// A subject-predicate-object fact, optionally scoped to a graph.
///
/// Stored statements always have a `Named` predicate and no `Pattern` nodes;
/// the ingestor rejects anything else before it reaches a backend. Pattern
/// statements used for deletion and matching may contain `Pattern` anywhere.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Statement {
    /// The subject.
    pub subject: Node,
    /// The predicate.
    pub predicate: Node,
    /// The object.
    pub object: Node,
    /// The graph, if this statement is a quad.
    pub graph: Option<Node>,
}

impl Statement {
    /// Create a triple.
    #[must_use]
    pub fn triple(subject: Node, predicate: Node, object: Node) -> Self {
        Self {
            subject,
            predicate,
            object,
            graph: None,
        }
    }

    /// Create a quad.
    #[must_use]
    pub fn quad(subject: Node, predicate: Node, object: Node, graph: Node) -> Self {
        Self {
            subject,
            predicate,
            object,
            graph: Some(graph),
        }
    }

    /// Return the same statement scoped to another graph.
    #[must_use]
    pub fn with_graph(mut self, graph: Node) -> Self {
        self.graph = Some(graph);
        self
    }

    /// Whether this statement carries a graph.
    #[must_use]
    pub const fn is_quad(&self) -> bool {
        self.graph.is_some()
    }

    /// Canonical string form: `s p o` or `s p o g`.
    ///
    /// The graph is only included when `consider_graph` is set and present.
    #[must_use]
    pub fn canonical_form(&self, consider_graph: bool) -> String {
        let mut canonical = format!("{} {} {}", self.subject, self.predicate, self.object);
        if consider_graph && let Some(graph) = &self.graph {
            canonical.push(' ');
            canonical.push_str(&graph.to_string());
        }
        canonical
    }

    /// Content hash of the canonical form.
    #[must_use]
    pub fn content_hash(&self, consider_graph: bool) -> ContentHash {
        ContentHash::of(&self.canonical_form(consider_graph))
    }

    /// Content hash of subject, predicate and object only.
    ///
    /// This is the dedup key within a graph.
    #[must_use]
    pub fn triple_hash(&self) -> ContentHash {
        self.content_hash(false)
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} .", self.canonical_form(true))
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the Quadrant engine.
///
/// - No silent failures: unsupported queries fail closed
/// - Use `Result<T, QuadError>` for fallible operations
/// - Storage errors are stringified at the backend boundary
#[derive(Debug, Error)]
pub enum QuadError {
    /// A write or query named a graph that is not registered.
    #[error("Graph not found: {0}")]
    GraphNotFound(String),

    /// The query is not a SELECT query.
    #[error("Unsupported query type: {0}")]
    UnsupportedQueryType(String),

    /// The triple patterns do not form one of the supported shapes.
    #[error("Unsupported query shape: {0}")]
    UnsupportedQueryShape(String),

    /// The query uses a construct outside the supported subset.
    #[error("Unsupported query: {0}")]
    UnsupportedQuery(String),

    /// The query text could not be parsed.
    #[error("Malformed query: {0}")]
    MalformedQuery(String),

    /// The operation is not available on this backend.
    #[error("Not implemented: {0}")]
    NotImplemented(&'static str),

    /// A statement violates the stored-statement invariants.
    #[error("Invalid statement: {0}")]
    InvalidStatement(String),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),

    /// The store configuration is invalid.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A thread panicked while holding a shared store.
    #[error("Store lock poisoned")]
    LockPoisoned,
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Statement {
        Statement::triple(
            Node::named("http://example.org/s"),
            Node::named("http://example.org/p"),
            Node::literal("o"),
        )
    }

    #[test]
    fn canonical_forms() {
        assert_eq!(Node::named("http://x/a").to_string(), "<http://x/a>");
        assert_eq!(Node::blank("b0").to_string(), "_:b0");
        assert_eq!(Node::variable("s").to_string(), "?s");
        assert_eq!(Node::any().to_string(), "?");
        assert_eq!(
            Node::Literal(Literal::with_language("chat", "fr")).to_string(),
            "\"chat\"@fr"
        );
        assert_eq!(
            Node::Literal(Literal::typed("1", "http://www.w3.org/2001/XMLSchema#integer"))
                .to_string(),
            "\"1\"^^<http://www.w3.org/2001/XMLSchema#integer>"
        );
    }

    #[test]
    fn literal_escaping_keeps_forms_distinct() {
        let quoted = Node::literal("a\" b");
        let plain = Node::literal("a b");
        assert_eq!(quoted.to_string(), "\"a\\\" b\"");
        assert_ne!(quoted.to_string(), plain.to_string());
    }

    #[test]
    fn independently_built_statements_share_hash() {
        assert_eq!(sample().triple_hash(), sample().triple_hash());
    }

    #[test]
    fn graph_only_hashed_when_requested() {
        let triple = sample();
        let quad = sample().with_graph(Node::named("http://example.org/g"));

        assert_eq!(triple.content_hash(false), quad.content_hash(false));
        assert_ne!(triple.content_hash(true), quad.content_hash(true));
        // A triple has no graph to consider.
        assert_eq!(triple.content_hash(true), triple.content_hash(false));
    }

    #[test]
    fn plain_and_typed_literals_hash_differently() {
        let plain = Statement::triple(Node::named("s"), Node::named("p"), Node::literal("1"));
        let typed = Statement::triple(
            Node::named("s"),
            Node::named("p"),
            Node::Literal(Literal::typed("1", "http://www.w3.org/2001/XMLSchema#integer")),
        );
        assert_ne!(plain.triple_hash(), typed.triple_hash());
    }

    #[test]
    fn language_and_datatype_both_count() {
        let mut both = Literal::with_language("chat", "fr");
        both.datatype = Some("http://x/dt".to_string());

        assert_eq!(both.to_string(), "\"chat\"@fr^^<http://x/dt>");
        let tagged = Statement::triple(
            Node::named("s"),
            Node::named("p"),
            Node::Literal(Literal::with_language("chat", "fr")),
        );
        let tagged_and_typed =
            Statement::triple(Node::named("s"), Node::named("p"), Node::Literal(both));
        assert_ne!(tagged.triple_hash(), tagged_and_typed.triple_hash());
    }

    #[test]
    fn content_hash_hex_display() {
        let hex = sample().triple_hash().to_string();
        assert_eq!(hex.len(), 64);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn concreteness() {
        assert!(Node::named("x").is_concrete());
        assert!(Node::literal("x").is_concrete());
        assert!(Node::blank("x").is_concrete());
        assert!(!Node::any().is_concrete());
        assert!(Node::variable("v").is_pattern());
    }

    #[test]
    fn statement_display_includes_graph() {
        let quad = sample().with_graph(Node::named("http://example.org/g"));
        assert_eq!(
            quad.to_string(),
            "<http://example.org/s> <http://example.org/p> \"o\" <http://example.org/g> ."
        );
        assert!(quad.is_quad());
        assert!(!sample().is_quad());
    }
}
