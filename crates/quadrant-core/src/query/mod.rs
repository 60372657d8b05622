//! # Query Module
//!
//! The SELECT subset evaluated by every Quadrant store.
//!
//! Evaluation is a fixed pipeline with no general algebra:
//!
//! 1. `parser` turns text into a `SelectQuery` (pest grammar)
//! 2. `shape` classifies the triple patterns into one `QueryShape`
//! 3. `filter` resolves the optional `FILTER` into a `FilterClause`
//! 4. `executor` matches, filters, binds and projects into a `QueryResult`
//!
//! Anything outside the recognized shapes fails closed with a typed error.

mod executor;
mod filter;
mod parser;
mod result;
mod shape;

pub use executor::PreparedQuery;
pub use filter::FilterClause;
pub use parser::parse_query;
pub use result::{QueryResult, Row};
pub use shape::{ObjectConstant, Position, QueryShape, SubjectConstraint};

use crate::Literal;
use crate::namespace::NamespaceRegistry;

// =============================================================================
// PARSED QUERY
// =============================================================================

/// One position of a triple pattern as written in the query.
///
/// URIs keep their written form (full or prefixed); extension happens at
/// match time against the store's registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternTerm {
    /// `?name` or `$name`, stored without the sigil.
    Variable(String),
    /// `<uri>`, `prefix:local` or the `a` keyword.
    Uri(String),
    /// `"value"`, `"value"@lang`, `"value"^^type` or a bare number.
    Literal(Literal),
    /// `_:label`, stored without `_:`.
    Blank(String),
}

impl PatternTerm {
    /// Kind name used in shape diagnostics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Variable(_) => "var",
            Self::Uri(_) => "uri",
            Self::Literal(_) => "literal",
            Self::Blank(_) => "blank",
        }
    }

    /// Variable name, if this is a variable.
    #[must_use]
    pub fn as_variable(&self) -> Option<&str> {
        match self {
            Self::Variable(name) => Some(name),
            _ => None,
        }
    }
}

/// A `subject predicate object` pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriplePattern {
    pub subject: PatternTerm,
    pub predicate: PatternTerm,
    pub object: PatternTerm,
}

impl TriplePattern {
    /// Create a new triple pattern.
    #[must_use]
    pub fn new(subject: PatternTerm, predicate: PatternTerm, object: PatternTerm) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }

    /// Kind signature such as `(var, uri, literal)`.
    #[must_use]
    pub fn signature(&self) -> String {
        format!(
            "({}, {}, {})",
            self.subject.kind(),
            self.predicate.kind(),
            self.object.kind()
        )
    }
}

/// The SELECT clause.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Projection {
    /// `SELECT *`: every variable of the shape, in pattern order.
    #[default]
    All,
    /// `SELECT ?a ?b`
    Variables(Vec<String>),
}

/// A single `?var = <uri>` comparison inside `FILTER`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterComparison {
    pub variable: String,
    pub uri: String,
}

/// A parsed SELECT query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectQuery {
    /// `PREFIX` declarations local to this query.
    pub prefixes: Vec<(String, String)>,
    /// `FROM` graphs as written.
    pub graphs: Vec<String>,
    pub projection: Projection,
    pub distinct: bool,
    pub patterns: Vec<TriplePattern>,
    /// The `FILTER` disjunction, if any.
    pub filter: Option<Vec<FilterComparison>>,
}

impl SelectQuery {
    /// The store registry plus this query's `PREFIX` declarations.
    #[must_use]
    pub fn namespaces(&self, base: &NamespaceRegistry) -> NamespaceRegistry {
        let mut namespaces = base.clone();
        for (prefix, uri) in &self.prefixes {
            namespaces.add_prefix(prefix.as_str(), uri.as_str());
        }
        namespaces
    }
}

// =============================================================================
// OPTIONS
// =============================================================================

/// Evaluation options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Stop after this many rows.
    pub limit: Option<usize>,
}

impl QueryOptions {
    /// Options with a row limit.
    #[must_use]
    pub const fn with_limit(limit: usize) -> Self {
        Self { limit: Some(limit) }
    }
}
