//! # Statement Diff
//!
//! Set difference between two statement collections by content hash.
//!
//! Duplicates within one side collapse to their first occurrence before
//! comparison, so the diff of a collection against an empty one is the
//! deduplicated collection.

use crate::{ContentHash, Statement};
use indexmap::IndexMap;

/// Statements present on one side only, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatementDiff {
    pub only_left: Vec<Statement>,
    pub only_right: Vec<Statement>,
}

impl StatementDiff {
    /// Whether both sides hold the same statements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.only_left.is_empty() && self.only_right.is_empty()
    }

    /// Swap the sides.
    #[must_use]
    pub fn reversed(self) -> Self {
        Self {
            only_left: self.only_right,
            only_right: self.only_left,
        }
    }
}

fn index(statements: &[Statement], consider_graph: bool) -> IndexMap<ContentHash, &Statement> {
    let mut map = IndexMap::with_capacity(statements.len());
    for statement in statements {
        map.entry(statement.content_hash(consider_graph))
            .or_insert(statement);
    }
    map
}

/// Compare two collections.
///
/// With `consider_graph` unset, quads differing only in their graph are the
/// same statement.
#[must_use]
pub fn diff_statements(
    left: &[Statement],
    right: &[Statement],
    consider_graph: bool,
) -> StatementDiff {
    let left_index = index(left, consider_graph);
    let right_index = index(right, consider_graph);

    let only = |from: &IndexMap<ContentHash, &Statement>,
                other: &IndexMap<ContentHash, &Statement>| {
        from.iter()
            .filter(|(hash, _)| !other.contains_key(*hash))
            .map(|(_, statement)| (*statement).clone())
            .collect::<Vec<_>>()
    };

    StatementDiff {
        only_left: only(&left_index, &right_index),
        only_right: only(&right_index, &left_index),
    }
}
