//! Query preparation and evaluation.

use super::filter::FilterClause;
use super::parser::parse_query;
use super::result::{QueryResult, Row};
use super::shape::QueryShape;
use super::{Projection, QueryOptions};
use crate::namespace::NamespaceRegistry;
use crate::{QuadError, Statement};
use std::collections::HashSet;

/// A parsed, classified query ready to run against materialized statements.
///
/// Preparation does all validation: once `prepare` succeeds, evaluation
/// cannot fail.
#[derive(Debug, Clone)]
pub struct PreparedQuery {
    /// Store registry plus the query's own `PREFIX` declarations.
    namespaces: NamespaceRegistry,
    shape: QueryShape,
    selected: Vec<String>,
    filter: Option<FilterClause>,
    /// Target graphs, extended, in `FROM` order.
    graphs: Vec<String>,
    distinct: bool,
}

impl PreparedQuery {
    /// Parse and classify `text`.
    ///
    /// A query without `FROM` targets `default_graph`.
    pub fn prepare(
        text: &str,
        namespaces: &NamespaceRegistry,
        default_graph: &str,
    ) -> Result<Self, QuadError> {
        let query = parse_query(text)?;
        let namespaces = query.namespaces(namespaces);
        let shape = QueryShape::classify(&query.patterns)?;

        let selected = match &query.projection {
            Projection::All => shape.variables(),
            Projection::Variables(variables) => {
                if let Some(unbound) = variables.iter().find(|v| shape.position_of(v).is_none()) {
                    return Err(QuadError::UnsupportedQuery(format!(
                        "selected variable ?{} is not bound by the triple patterns",
                        unbound
                    )));
                }
                variables.clone()
            }
        };

        let filter = query
            .filter
            .as_deref()
            .map(|comparisons| FilterClause::extract(comparisons, &shape, &selected, &namespaces))
            .transpose()?;

        let mut graphs: Vec<String> = Vec::with_capacity(query.graphs.len().max(1));
        for graph in &query.graphs {
            let uri = namespaces.extend_uri(graph);
            if !graphs.contains(&uri) {
                graphs.push(uri);
            }
        }
        if graphs.is_empty() {
            graphs.push(default_graph.to_string());
        }

        Ok(Self {
            namespaces,
            shape,
            selected,
            filter,
            graphs,
            distinct: query.distinct,
        })
    }

    /// The classified shape.
    #[must_use]
    pub fn shape(&self) -> &QueryShape {
        &self.shape
    }

    /// Target graphs in extended form.
    #[must_use]
    pub fn graphs(&self) -> &[String] {
        &self.graphs
    }

    /// Projected variables.
    #[must_use]
    pub fn variables(&self) -> &[String] {
        &self.selected
    }

    /// Evaluate against the union of the target graphs' statements.
    ///
    /// Rows keep the order of `statements`.
    #[must_use]
    pub fn execute(&self, statements: &[Statement], options: &QueryOptions) -> QueryResult {
        let limit = options.limit.unwrap_or(usize::MAX);
        let mut seen: HashSet<Vec<String>> = HashSet::new();
        let mut rows: Vec<Row> = Vec::new();

        for statement in self.shape.matching(statements, &self.namespaces) {
            if rows.len() >= limit {
                break;
            }
            if let Some(filter) = &self.filter
                && !filter.accepts(statement, &self.namespaces)
            {
                continue;
            }

            let bound = self.shape.bind(statement);
            let row: Row = self
                .selected
                .iter()
                .filter_map(|name| bound.get(name).map(|node| (name.clone(), node.clone())))
                .collect();

            if self.distinct {
                let key = row.values().map(ToString::to_string).collect();
                if !seen.insert(key) {
                    continue;
                }
            }
            rows.push(row);
        }

        QueryResult::new(self.selected.clone(), rows)
    }
}
