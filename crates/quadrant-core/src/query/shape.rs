//! Query shape classification and matching.
//!
//! Each recognized arrangement of triple patterns is one `QueryShape`
//! variant with its own matcher. Shapes produce the statements that satisfy
//! them; binding turns one matched statement into one result row.

use super::result::Row;
use super::{PatternTerm, TriplePattern};
use crate::namespace::NamespaceRegistry;
use crate::primitives::MAX_QUERY_PATTERNS;
use crate::{Literal, Node, QuadError, Statement};
use std::collections::HashSet;

// =============================================================================
// POSITIONS AND CONSTRAINTS
// =============================================================================

/// A statement position a variable binds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Subject,
    Predicate,
    Object,
}

impl Position {
    /// The node at this position.
    #[must_use]
    pub fn of(self, statement: &Statement) -> &Node {
        match self {
            Self::Subject => &statement.subject,
            Self::Predicate => &statement.predicate,
            Self::Object => &statement.object,
        }
    }
}

/// The constant object of a `?s <p> object` pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectConstant {
    Uri(String),
    Literal(Literal),
}

/// A `?s <predicate> object` pattern with a constant predicate and object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectConstraint {
    pub predicate: String,
    pub object: ObjectConstant,
}

impl SubjectConstraint {
    /// Whether `statement` has this predicate and object.
    #[must_use]
    pub fn matches(&self, statement: &Statement, namespaces: &NamespaceRegistry) -> bool {
        if !node_is_uri(&statement.predicate, &self.predicate, namespaces) {
            return false;
        }
        match &self.object {
            ObjectConstant::Uri(uri) => node_is_uri(&statement.object, uri, namespaces),
            ObjectConstant::Literal(literal) => statement
                .object
                .as_literal()
                .is_some_and(|stored| literal_matches(stored, literal, namespaces)),
        }
    }
}

/// Compare a stored URI with a query URI, either side possibly prefixed.
fn uri_matches(stored: &str, written: &str, namespaces: &NamespaceRegistry) -> bool {
    stored == written || namespaces.extend_uri(stored) == namespaces.extend_uri(written)
}

fn node_is_uri(node: &Node, written: &str, namespaces: &NamespaceRegistry) -> bool {
    node.as_named()
        .is_some_and(|named| uri_matches(named.as_str(), written, namespaces))
}

/// Value equality, plus language and datatype when the query states them.
fn literal_matches(stored: &Literal, written: &Literal, namespaces: &NamespaceRegistry) -> bool {
    if stored.value != written.value {
        return false;
    }
    if let Some(language) = &written.language
        && !stored
            .language
            .as_deref()
            .is_some_and(|stored| stored.eq_ignore_ascii_case(language))
    {
        return false;
    }
    if let Some(datatype) = &written.datatype
        && !stored
            .datatype
            .as_deref()
            .is_some_and(|stored| uri_matches(stored, datatype, namespaces))
    {
        return false;
    }
    true
}

// =============================================================================
// QUERY SHAPE
// =============================================================================

/// The supported arrangements of triple patterns.
///
/// Variable fields hold variable names without the `?` sigil.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryShape {
    /// `?s ?p ?o`
    AllStatements {
        subject: String,
        predicate: String,
        object: String,
    },
    /// `<uri> ?p ?o`
    BySubjectUri {
        uri: String,
        predicate: String,
        object: String,
    },
    /// `_:label ?p ?o`
    BySubjectBlank {
        label: String,
        predicate: String,
        object: String,
    },
    /// `?s <p> <o>` or `?s <p> "literal"`
    SubjectsByPredicateObject {
        subject: String,
        constraint: SubjectConstraint,
    },
    /// `?s ?p ?o . ?s <p> <o>`
    Constrained {
        subject: String,
        predicate: String,
        object: String,
        constraint: SubjectConstraint,
    },
    /// `?s ?p ?o . ?s <p1> <o1> . ?s <p2> <o2>` where `<o2>` may be a literal
    DoublyConstrained {
        subject: String,
        predicate: String,
        object: String,
        first: SubjectConstraint,
        second: SubjectConstraint,
    },
}

impl QueryShape {
    /// Classify a list of triple patterns.
    ///
    /// Returns `UnsupportedQueryShape` for every arrangement not listed on
    /// the variants.
    pub fn classify(patterns: &[TriplePattern]) -> Result<Self, QuadError> {
        match patterns {
            [single] => Self::classify_single(single),
            [full, first] => {
                let (subject, predicate, object) = all_variables(full)?;
                let first = constraint_on(first, &subject, false)?;
                Ok(Self::Constrained {
                    subject,
                    predicate,
                    object,
                    constraint: first,
                })
            }
            [full, first, second] => {
                let (subject, predicate, object) = all_variables(full)?;
                let first = constraint_on(first, &subject, false)?;
                let second = constraint_on(second, &subject, true)?;
                Ok(Self::DoublyConstrained {
                    subject,
                    predicate,
                    object,
                    first,
                    second,
                })
            }
            [] => Err(QuadError::UnsupportedQueryShape(
                "no triple patterns".to_string(),
            )),
            _ => Err(QuadError::UnsupportedQueryShape(format!(
                "{} triple patterns (at most {} supported)",
                patterns.len(),
                MAX_QUERY_PATTERNS
            ))),
        }
    }

    fn classify_single(pattern: &TriplePattern) -> Result<Self, QuadError> {
        use PatternTerm::{Blank, Literal, Uri, Variable};

        match (&pattern.subject, &pattern.predicate, &pattern.object) {
            (Variable(s), Variable(p), Variable(o)) if s != p && p != o && s != o => {
                Ok(Self::AllStatements {
                    subject: s.clone(),
                    predicate: p.clone(),
                    object: o.clone(),
                })
            }
            (Uri(uri), Variable(p), Variable(o)) if p != o => Ok(Self::BySubjectUri {
                uri: uri.clone(),
                predicate: p.clone(),
                object: o.clone(),
            }),
            (Blank(label), Variable(p), Variable(o)) if p != o => Ok(Self::BySubjectBlank {
                label: label.clone(),
                predicate: p.clone(),
                object: o.clone(),
            }),
            (Variable(s), Uri(p), Uri(o)) => Ok(Self::SubjectsByPredicateObject {
                subject: s.clone(),
                constraint: SubjectConstraint {
                    predicate: p.clone(),
                    object: ObjectConstant::Uri(o.clone()),
                },
            }),
            (Variable(s), Uri(p), Literal(o)) => Ok(Self::SubjectsByPredicateObject {
                subject: s.clone(),
                constraint: SubjectConstraint {
                    predicate: p.clone(),
                    object: ObjectConstant::Literal(o.clone()),
                },
            }),
            _ => Err(QuadError::UnsupportedQueryShape(format!(
                "triple pattern {}",
                pattern.signature()
            ))),
        }
    }

    /// Stable name used in logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::AllStatements { .. } => "all_statements",
            Self::BySubjectUri { .. } => "by_subject_uri",
            Self::BySubjectBlank { .. } => "by_subject_blank",
            Self::SubjectsByPredicateObject { .. } => "subjects_by_predicate_object",
            Self::Constrained { .. } => "constrained",
            Self::DoublyConstrained { .. } => "doubly_constrained",
        }
    }

    /// Variables this shape binds, in pattern order.
    #[must_use]
    pub fn variables(&self) -> Vec<String> {
        self.bindings()
            .into_iter()
            .map(|(name, _)| name.to_string())
            .collect()
    }

    /// The statement position a variable binds to, if it is bound.
    #[must_use]
    pub fn position_of(&self, variable: &str) -> Option<Position> {
        self.bindings()
            .into_iter()
            .find(|(name, _)| *name == variable)
            .map(|(_, position)| position)
    }

    fn bindings(&self) -> Vec<(&str, Position)> {
        match self {
            Self::AllStatements {
                subject,
                predicate,
                object,
            }
            | Self::Constrained {
                subject,
                predicate,
                object,
                ..
            }
            | Self::DoublyConstrained {
                subject,
                predicate,
                object,
                ..
            } => vec![
                (subject.as_str(), Position::Subject),
                (predicate.as_str(), Position::Predicate),
                (object.as_str(), Position::Object),
            ],
            Self::BySubjectUri {
                predicate, object, ..
            }
            | Self::BySubjectBlank {
                predicate, object, ..
            } => vec![
                (predicate.as_str(), Position::Predicate),
                (object.as_str(), Position::Object),
            ],
            Self::SubjectsByPredicateObject { subject, .. } => {
                vec![(subject.as_str(), Position::Subject)]
            }
        }
    }

    /// Statements satisfying this shape, in input order.
    #[must_use]
    pub fn matching<'a>(
        &self,
        statements: &'a [Statement],
        namespaces: &NamespaceRegistry,
    ) -> Vec<&'a Statement> {
        match self {
            Self::AllStatements { .. } => statements.iter().collect(),
            Self::BySubjectUri { uri, .. } => statements
                .iter()
                .filter(|statement| node_is_uri(&statement.subject, uri, namespaces))
                .collect(),
            Self::BySubjectBlank { label, .. } => statements
                .iter()
                .filter(|statement| {
                    statement
                        .subject
                        .as_blank()
                        .is_some_and(|blank| blank.as_str().eq_ignore_ascii_case(label))
                })
                .collect(),
            Self::SubjectsByPredicateObject { constraint, .. } => statements
                .iter()
                .filter(|statement| constraint.matches(statement, namespaces))
                .collect(),
            Self::Constrained { constraint, .. } => {
                let subjects = constrained_subjects(statements, constraint, None, namespaces);
                statements
                    .iter()
                    .filter(|statement| subjects.contains(&statement.subject))
                    .collect()
            }
            Self::DoublyConstrained { first, second, .. } => {
                let candidates = constrained_subjects(statements, first, None, namespaces);
                let subjects =
                    constrained_subjects(statements, second, Some(&candidates), namespaces);
                statements
                    .iter()
                    .filter(|statement| subjects.contains(&statement.subject))
                    .collect()
            }
        }
    }

    /// Bind the shape's variables from one matched statement.
    #[must_use]
    pub fn bind(&self, statement: &Statement) -> Row {
        self.bindings()
            .into_iter()
            .map(|(name, position)| (name.to_string(), position.of(statement).clone()))
            .collect()
    }
}

/// Subjects of statements satisfying `constraint`, optionally narrowed to
/// `within`.
fn constrained_subjects<'a>(
    statements: &'a [Statement],
    constraint: &SubjectConstraint,
    within: Option<&HashSet<&'a Node>>,
    namespaces: &NamespaceRegistry,
) -> HashSet<&'a Node> {
    statements
        .iter()
        .filter(|statement| constraint.matches(statement, namespaces))
        .map(|statement| &statement.subject)
        .filter(|subject| within.is_none_or(|candidates| candidates.contains(subject)))
        .collect()
}

fn all_variables(pattern: &TriplePattern) -> Result<(String, String, String), QuadError> {
    match (
        pattern.subject.as_variable(),
        pattern.predicate.as_variable(),
        pattern.object.as_variable(),
    ) {
        (Some(s), Some(p), Some(o)) if s != p && p != o && s != o => {
            Ok((s.to_string(), p.to_string(), o.to_string()))
        }
        _ => Err(QuadError::UnsupportedQueryShape(format!(
            "first of several patterns must be (var, var, var), got {}",
            pattern.signature()
        ))),
    }
}

/// Read `?subject <p> object` as a constraint on `subject`.
fn constraint_on(
    pattern: &TriplePattern,
    subject: &str,
    allow_literal: bool,
) -> Result<SubjectConstraint, QuadError> {
    let unsupported = || {
        QuadError::UnsupportedQueryShape(format!(
            "narrowing pattern must be (?{}, uri, {}), got {}",
            subject,
            if allow_literal { "uri|literal" } else { "uri" },
            pattern.signature()
        ))
    };

    if pattern.subject.as_variable() != Some(subject) {
        return Err(unsupported());
    }
    let PatternTerm::Uri(predicate) = &pattern.predicate else {
        return Err(unsupported());
    };
    let object = match &pattern.object {
        PatternTerm::Uri(uri) => ObjectConstant::Uri(uri.clone()),
        PatternTerm::Literal(literal) if allow_literal => ObjectConstant::Literal(literal.clone()),
        _ => return Err(unsupported()),
    };
    Ok(SubjectConstraint {
        predicate: predicate.clone(),
        object,
    })
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> PatternTerm {
        PatternTerm::Variable(name.to_string())
    }

    fn uri(text: &str) -> PatternTerm {
        PatternTerm::Uri(text.to_string())
    }

    fn spo() -> TriplePattern {
        TriplePattern::new(var("s"), var("p"), var("o"))
    }

    fn sample() -> Vec<Statement> {
        let stmt = |s: &str, p: &str, o: Node| Statement::triple(Node::named(s), Node::named(p), o);
        vec![
            stmt(
                "http://x/alice",
                "http://xmlns.com/foaf/0.1/name",
                Node::literal("Alice"),
            ),
            stmt(
                "http://x/alice",
                "http://www.w3.org/1999/02/22-rdf-syntax-ns#type",
                Node::named("http://xmlns.com/foaf/0.1/Person"),
            ),
            stmt(
                "http://x/bob",
                "http://www.w3.org/1999/02/22-rdf-syntax-ns#type",
                Node::named("http://xmlns.com/foaf/0.1/Person"),
            ),
            stmt(
                "http://x/bob",
                "http://xmlns.com/foaf/0.1/name",
                Node::literal("Bob"),
            ),
            Statement::triple(
                Node::blank("genidABC"),
                Node::named("http://xmlns.com/foaf/0.1/name"),
                Node::literal("anon"),
            ),
        ]
    }

    #[test]
    fn classify_single_patterns() {
        assert_eq!(
            QueryShape::classify(&[spo()]).expect("shape").name(),
            "all_statements"
        );
        assert_eq!(
            QueryShape::classify(&[TriplePattern::new(uri("http://x/a"), var("p"), var("o"))])
                .expect("shape")
                .name(),
            "by_subject_uri"
        );
        assert_eq!(
            QueryShape::classify(&[TriplePattern::new(
                PatternTerm::Blank("b".to_string()),
                var("p"),
                var("o")
            )])
            .expect("shape")
            .name(),
            "by_subject_blank"
        );
        assert_eq!(
            QueryShape::classify(&[TriplePattern::new(
                var("s"),
                uri("foaf:name"),
                PatternTerm::Literal(Literal::new("Alice"))
            )])
            .expect("shape")
            .name(),
            "subjects_by_predicate_object"
        );
    }

    #[test]
    fn reject_unsupported_single_patterns() {
        for pattern in [
            TriplePattern::new(var("s"), var("p"), uri("http://x/o")),
            TriplePattern::new(var("s"), var("s"), var("o")),
            TriplePattern::new(uri("http://x/a"), uri("http://x/p"), var("o")),
            TriplePattern::new(var("s"), uri("http://x/p"), var("o")),
        ] {
            assert!(matches!(
                QueryShape::classify(&[pattern]),
                Err(QuadError::UnsupportedQueryShape(_))
            ));
        }
    }

    #[test]
    fn reject_bad_conjunctions() {
        // different subject variable
        let other_subject = [
            spo(),
            TriplePattern::new(var("x"), uri("http://x/p"), uri("http://x/o")),
        ];
        // literal allowed only in the third pattern
        let literal_second = [
            spo(),
            TriplePattern::new(
                var("s"),
                uri("http://x/p"),
                PatternTerm::Literal(Literal::new("v")),
            ),
        ];
        let four = [spo(), spo(), spo(), spo()];

        for patterns in [&other_subject[..], &literal_second[..], &four[..]] {
            assert!(matches!(
                QueryShape::classify(patterns),
                Err(QuadError::UnsupportedQueryShape(_))
            ));
        }
    }

    #[test]
    fn subject_uri_matches_prefixed_query() {
        let namespaces = NamespaceRegistry::new();
        let statements = sample();
        let shape = QueryShape::BySubjectUri {
            uri: "http://x/alice".to_string(),
            predicate: "p".to_string(),
            object: "o".to_string(),
        };
        assert_eq!(shape.matching(&statements, &namespaces).len(), 2);
    }

    #[test]
    fn blank_subject_is_case_insensitive() {
        let namespaces = NamespaceRegistry::new();
        let statements = sample();
        let shape = QueryShape::BySubjectBlank {
            label: "genidabc".to_string(),
            predicate: "p".to_string(),
            object: "o".to_string(),
        };
        assert_eq!(shape.matching(&statements, &namespaces).len(), 1);
    }

    #[test]
    fn constrained_shapes_narrow_subjects() {
        let namespaces = NamespaceRegistry::new();
        let statements = sample();

        let constrained = QueryShape::classify(&[
            spo(),
            TriplePattern::new(var("s"), uri("rdf:type"), uri("foaf:Person")),
        ])
        .expect("shape");
        assert_eq!(constrained.matching(&statements, &namespaces).len(), 4);

        let doubly = QueryShape::classify(&[
            spo(),
            TriplePattern::new(var("s"), uri("rdf:type"), uri("foaf:Person")),
            TriplePattern::new(
                var("s"),
                uri("foaf:name"),
                PatternTerm::Literal(Literal::new("Bob")),
            ),
        ])
        .expect("shape");
        let matched = doubly.matching(&statements, &namespaces);
        assert_eq!(matched.len(), 2);
        assert!(
            matched
                .iter()
                .all(|statement| statement.subject == Node::named("http://x/bob"))
        );
    }

    #[test]
    fn literal_constraint_checks_language_when_given() {
        let namespaces = NamespaceRegistry::new();
        let stored = Literal::with_language("chat", "fr");

        assert!(literal_matches(&stored, &Literal::new("chat"), &namespaces));
        assert!(literal_matches(
            &stored,
            &Literal::with_language("chat", "FR"),
            &namespaces
        ));
        assert!(!literal_matches(
            &stored,
            &Literal::with_language("chat", "en"),
            &namespaces
        ));
        assert!(literal_matches(
            &Literal::typed("1", "http://www.w3.org/2001/XMLSchema#integer"),
            &Literal::typed("1", "xsd:integer"),
            &namespaces
        ));
    }

    #[test]
    fn bind_follows_pattern_order() {
        let statements = sample();
        let shape = QueryShape::classify(&[spo()]).expect("shape");
        let row = shape.bind(&statements[0]);

        let names: Vec<_> = row.keys().cloned().collect();
        assert_eq!(names, vec!["s", "p", "o"]);
        assert_eq!(row["o"], Node::literal("Alice"));
        assert_eq!(shape.position_of("p"), Some(Position::Predicate));
        assert_eq!(shape.position_of("missing"), None);
    }
}
