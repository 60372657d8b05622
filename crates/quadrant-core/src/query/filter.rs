//! `FILTER (?v = <a> || ?v = <b>)` restriction.

use super::FilterComparison;
use super::shape::{Position, QueryShape};
use crate::namespace::NamespaceRegistry;
use crate::{QuadError, Statement};

/// A resolved filter: one variable, one position, a set of accepted URIs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterClause {
    pub variable: String,
    pub position: Position,
    /// Accepted URIs in extended form.
    pub uris: Vec<String>,
}

impl FilterClause {
    /// Resolve parsed comparisons against a shape and its projection.
    ///
    /// The filter must compare a single variable that the shape binds and
    /// the query selects.
    pub fn extract(
        comparisons: &[FilterComparison],
        shape: &QueryShape,
        selected: &[String],
        namespaces: &NamespaceRegistry,
    ) -> Result<Self, QuadError> {
        let Some(first) = comparisons.first() else {
            return Err(QuadError::MalformedQuery("empty FILTER".to_string()));
        };
        let variable = first.variable.as_str();

        if comparisons.iter().any(|c| c.variable != variable) {
            return Err(QuadError::UnsupportedQuery(
                "FILTER must compare a single variable".to_string(),
            ));
        }
        let position = shape.position_of(variable).ok_or_else(|| {
            QuadError::UnsupportedQuery(format!(
                "FILTER variable ?{} is not bound by the triple patterns",
                variable
            ))
        })?;
        if !selected.iter().any(|name| name == variable) {
            return Err(QuadError::UnsupportedQuery(format!(
                "FILTER variable ?{} is not selected",
                variable
            )));
        }

        let mut uris: Vec<String> = Vec::with_capacity(comparisons.len());
        for comparison in comparisons {
            let uri = namespaces.extend_uri(&comparison.uri);
            if !uris.contains(&uri) {
                uris.push(uri);
            }
        }

        Ok(Self {
            variable: variable.to_string(),
            position,
            uris,
        })
    }

    /// Whether the filtered position of `statement` holds an accepted URI.
    #[must_use]
    pub fn accepts(&self, statement: &Statement, namespaces: &NamespaceRegistry) -> bool {
        self.position.of(statement).as_named().is_some_and(|named| {
            let uri = namespaces.extend_uri(named.as_str());
            self.uris.contains(&uri)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Node;
    use crate::query::{PatternTerm, TriplePattern};

    fn comparison(variable: &str, uri: &str) -> FilterComparison {
        FilterComparison {
            variable: variable.to_string(),
            uri: uri.to_string(),
        }
    }

    fn all_shape() -> QueryShape {
        let var = |n: &str| PatternTerm::Variable(n.to_string());
        QueryShape::classify(&[TriplePattern::new(var("s"), var("p"), var("o"))]).expect("shape")
    }

    fn selected() -> Vec<String> {
        vec!["s".to_string(), "p".to_string(), "o".to_string()]
    }

    #[test]
    fn extract_resolves_position_and_extends() {
        let namespaces = NamespaceRegistry::new();
        let clause = FilterClause::extract(
            &[
                comparison("p", "foaf:name"),
                comparison("p", "http://xmlns.com/foaf/0.1/name"),
                comparison("p", "http://x/q"),
            ],
            &all_shape(),
            &selected(),
            &namespaces,
        )
        .expect("extract");

        assert_eq!(clause.position, Position::Predicate);
        assert_eq!(
            clause.uris,
            vec![
                "http://xmlns.com/foaf/0.1/name".to_string(),
                "http://x/q".to_string()
            ]
        );
    }

    #[test]
    fn extract_rejects_mixed_variables() {
        let namespaces = NamespaceRegistry::new();
        let result = FilterClause::extract(
            &[comparison("p", "http://x/a"), comparison("o", "http://x/b")],
            &all_shape(),
            &selected(),
            &namespaces,
        );
        assert!(matches!(result, Err(QuadError::UnsupportedQuery(_))));
    }

    #[test]
    fn extract_rejects_unbound_or_unselected() {
        let namespaces = NamespaceRegistry::new();
        let unbound = FilterClause::extract(
            &[comparison("x", "http://x/a")],
            &all_shape(),
            &selected(),
            &namespaces,
        );
        let unselected = FilterClause::extract(
            &[comparison("p", "http://x/a")],
            &all_shape(),
            &["s".to_string()],
            &namespaces,
        );
        assert!(matches!(unbound, Err(QuadError::UnsupportedQuery(_))));
        assert!(matches!(unselected, Err(QuadError::UnsupportedQuery(_))));
    }

    #[test]
    fn accepts_only_listed_uris() {
        let namespaces = NamespaceRegistry::new();
        let clause = FilterClause::extract(
            &[comparison("o", "foaf:Person")],
            &all_shape(),
            &selected(),
            &namespaces,
        )
        .expect("extract");

        let person = Statement::triple(
            Node::named("http://x/a"),
            Node::named("rdf:type"),
            Node::named("http://xmlns.com/foaf/0.1/Person"),
        );
        let literal = Statement::triple(
            Node::named("http://x/a"),
            Node::named("rdf:type"),
            Node::literal("foaf:Person"),
        );
        assert!(clause.accepts(&person, &namespaces));
        assert!(!clause.accepts(&literal, &namespaces));
    }
}
