//! Query results.

use crate::Node;
use indexmap::IndexMap;

/// One solution: variable name (without `?`) -> bound node, in projection
/// order.
pub type Row = IndexMap<String, Node>;

/// Ordered rows produced by a SELECT query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryResult {
    variables: Vec<String>,
    rows: Vec<Row>,
}

impl QueryResult {
    /// Create a result from projected variables and rows.
    #[must_use]
    pub fn new(variables: Vec<String>, rows: Vec<Row>) -> Self {
        Self { variables, rows }
    }

    /// Projected variable names in order.
    #[must_use]
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// Rows in scan order.
    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Number of rows.
    #[must_use]
    pub fn count(&self) -> usize {
        self.rows.len()
    }

    /// Whether no row matched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    /// Iterate over the rows.
    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }

    /// Take the rows.
    #[must_use]
    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }
}

impl IntoIterator for QueryResult {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

impl<'a> IntoIterator for &'a QueryResult {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}
