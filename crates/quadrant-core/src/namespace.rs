//! # Namespace Registry
//!
//! Prefix management for compact URI notation (`foaf:Person`).
//!
//! Every store owns its own registry; there is no process-wide table.
//! The registry is ordered: `shorten_uri` returns the first registered
//! namespace whose URI occurs in the input, so registration order decides
//! ties between overlapping namespaces.

use indexmap::IndexMap;

/// Prefixes preloaded by `NamespaceRegistry::new`, in registration order.
pub const STANDARD_PREFIXES: &[(&str, &str)] = &[
    ("rdf", "http://www.w3.org/1999/02/22-rdf-syntax-ns#"),
    ("rdfs", "http://www.w3.org/2000/01/rdf-schema#"),
    ("xsd", "http://www.w3.org/2001/XMLSchema#"),
    ("owl", "http://www.w3.org/2002/07/owl#"),
    ("foaf", "http://xmlns.com/foaf/0.1/"),
    ("dc", "http://purl.org/dc/elements/1.1/"),
    ("dcterms", "http://purl.org/dc/terms/"),
    ("skos", "http://www.w3.org/2004/02/skos/core#"),
    ("schema", "http://schema.org/"),
];

/// Ordered `prefix -> namespace URI` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceRegistry {
    prefixes: IndexMap<String, String>,
}

impl NamespaceRegistry {
    /// Create a registry preloaded with `STANDARD_PREFIXES`.
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Self::empty();
        for (prefix, uri) in STANDARD_PREFIXES {
            registry.add_prefix(*prefix, *uri);
        }
        registry
    }

    /// Create a registry with no prefixes.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            prefixes: IndexMap::new(),
        }
    }

    /// Register a prefix.
    ///
    /// Re-registering an existing prefix replaces its URI but keeps its
    /// original position.
    pub fn add_prefix(&mut self, prefix: impl Into<String>, uri: impl Into<String>) {
        self.prefixes.insert(prefix.into(), uri.into());
    }

    /// Get the namespace URI for a prefix.
    #[must_use]
    pub fn get_uri(&self, prefix: &str) -> Option<&str> {
        self.prefixes.get(prefix).map(String::as_str)
    }

    /// All registered `(prefix, uri)` pairs in registration order.
    pub fn prefixes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.prefixes
            .iter()
            .map(|(prefix, uri)| (prefix.as_str(), uri.as_str()))
    }

    /// Number of registered prefixes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    /// Whether no prefix is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }

    /// Split `prefix:local` when `prefix` is registered.
    ///
    /// `scheme://...` is never treated as a prefixed name, which keeps
    /// extension idempotent on full URIs.
    fn split_registered<'a>(&'a self, uri: &'a str) -> Option<(&'a str, &'a str)> {
        let (prefix, local) = uri.split_once(':')?;
        if local.starts_with("//") {
            return None;
        }
        let namespace = self.prefixes.get(prefix)?;
        Some((namespace.as_str(), local))
    }

    /// Expand a prefixed URI to its full form.
    ///
    /// Returns the input unchanged when it has no registered prefix.
    #[must_use]
    pub fn extend_uri(&self, uri: &str) -> String {
        match self.split_registered(uri) {
            Some((namespace, local)) => format!("{}{}", namespace, local),
            None => uri.to_string(),
        }
    }

    /// Replace the first registered namespace found in `uri` with `prefix:`.
    ///
    /// Returns the input unchanged when no namespace occurs in it.
    #[must_use]
    pub fn shorten_uri(&self, uri: &str) -> String {
        for (prefix, namespace) in &self.prefixes {
            if !namespace.is_empty() && uri.contains(namespace.as_str()) {
                return uri.replacen(namespace.as_str(), &format!("{}:", prefix), 1);
            }
        }
        uri.to_string()
    }

    /// Whether `uri` is written with a registered prefix.
    ///
    /// Equivalent to `extend_uri(uri) != uri` for every registered namespace
    /// that is non-empty.
    #[must_use]
    pub fn is_shortened(&self, uri: &str) -> bool {
        self.split_registered(uri).is_some()
    }
}

impl Default for NamespaceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const FOAF_PERSON: &str = "http://xmlns.com/foaf/0.1/Person";

    #[test]
    fn standard_prefixes_loaded() {
        let registry = NamespaceRegistry::new();
        assert_eq!(registry.len(), STANDARD_PREFIXES.len());
        assert_eq!(
            registry.get_uri("rdf"),
            Some("http://www.w3.org/1999/02/22-rdf-syntax-ns#")
        );
        assert_eq!(registry.get_uri("nope"), None);
    }

    #[test]
    fn extend_known_prefix() {
        let registry = NamespaceRegistry::new();
        assert_eq!(registry.extend_uri("foaf:Person"), FOAF_PERSON);
        assert_eq!(
            registry.extend_uri("rdf:type"),
            "http://www.w3.org/1999/02/22-rdf-syntax-ns#type"
        );
    }

    #[test]
    fn extend_unknown_prefix_is_identity() {
        let registry = NamespaceRegistry::new();
        assert_eq!(registry.extend_uri("nope:thing"), "nope:thing");
        assert_eq!(registry.extend_uri("plain"), "plain");
        assert_eq!(registry.extend_uri(""), "");
    }

    #[test]
    fn extend_is_idempotent() {
        let registry = NamespaceRegistry::new();
        let once = registry.extend_uri("foaf:Person");
        assert_eq!(registry.extend_uri(&once), once);
    }

    #[test]
    fn full_uri_never_treated_as_prefixed() {
        let mut registry = NamespaceRegistry::new();
        registry.add_prefix("http", "urn:broken:");
        assert_eq!(registry.extend_uri(FOAF_PERSON), FOAF_PERSON);
    }

    #[test]
    fn shorten_known_namespace() {
        let registry = NamespaceRegistry::new();
        assert_eq!(registry.shorten_uri(FOAF_PERSON), "foaf:Person");
        assert_eq!(
            registry.shorten_uri("http://example.org/x"),
            "http://example.org/x"
        );
    }

    #[test]
    fn shorten_after_extend_matches_shorten() {
        let registry = NamespaceRegistry::new();
        for uri in ["foaf:Person", FOAF_PERSON, "urn:other", "dcterms:title"] {
            assert_eq!(
                registry.shorten_uri(&registry.extend_uri(uri)),
                registry.shorten_uri(uri)
            );
        }
    }

    #[test]
    fn shorten_first_registered_namespace_wins() {
        // Overlapping namespaces: registration order decides, not length.
        let mut registry = NamespaceRegistry::empty();
        registry.add_prefix("ex", "http://example.org/");
        registry.add_prefix("deep", "http://example.org/deep/");
        assert_eq!(registry.shorten_uri("http://example.org/deep/x"), "ex:deep/x");

        let mut reversed = NamespaceRegistry::empty();
        reversed.add_prefix("deep", "http://example.org/deep/");
        reversed.add_prefix("ex", "http://example.org/");
        assert_eq!(reversed.shorten_uri("http://example.org/deep/x"), "deep:x");
    }

    #[test]
    fn readding_prefix_keeps_position() {
        let mut registry = NamespaceRegistry::empty();
        registry.add_prefix("a", "http://a/");
        registry.add_prefix("b", "http://b/");
        registry.add_prefix("a", "http://a2/");
        let order: Vec<_> = registry.prefixes().map(|(p, _)| p).collect();
        assert_eq!(order, vec!["a", "b"]);
        assert_eq!(registry.get_uri("a"), Some("http://a2/"));
    }

    #[test]
    fn is_shortened_tracks_registered_prefixes() {
        let registry = NamespaceRegistry::new();
        assert!(registry.is_shortened("foaf:Person"));
        assert!(!registry.is_shortened(FOAF_PERSON));
        assert!(!registry.is_shortened("nope:thing"));
        assert!(!registry.is_shortened("no-colon"));
    }
}
