//! # Fixed Primitives
//!
//! Compile-time constants for the Quadrant engine.
//!
//! These are the defaults every store starts from; `StoreConfig` may override
//! the default graph but nothing else here changes at runtime.

/// Reserved identifier of the default graph.
///
/// Statements written without an explicit graph (argument or quad field)
/// land here. Both backends create it on the first write that targets it.
pub const DEFAULT_GRAPH_URI: &str = "urn:x-quadrant:default-graph";

/// Maximum number of triple patterns in one SELECT query.
///
/// The dispatcher recognises shapes of one, two and three patterns only.
pub const MAX_QUERY_PATTERNS: usize = 3;

/// Prefix of generated blank node labels.
pub const BLANK_LABEL_PREFIX: &str = "genid";

/// Number of hex digits taken from the BLAKE3 digest for a generated label.
///
/// 32 hex digits = 128 bits, so labels from separate ingestion calls never
/// collide in practice.
pub const BLANK_LABEL_HEX_LEN: usize = 32;

// =============================================================================
// WELL-KNOWN URIS
// =============================================================================

/// `rdf:type`, the expansion of the `a` keyword in queries.
pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

/// Datatype of integer literals written as bare numbers in queries.
pub const XSD_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";

/// Datatype of decimal literals written as bare numbers in queries.
pub const XSD_DECIMAL: &str = "http://www.w3.org/2001/XMLSchema#decimal";
