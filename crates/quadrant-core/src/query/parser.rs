//! SELECT query parser using Pest.

use super::{FilterComparison, PatternTerm, Projection, SelectQuery, TriplePattern};
use crate::primitives::{RDF_TYPE, XSD_DECIMAL, XSD_INTEGER};
use crate::{Literal, QuadError};
use pest::Parser;
use pest::iterators::Pair;
use pest_derive::Parser;

#[derive(Parser)]
#[grammar = "query/select.pest"]
struct SelectParser;

/// Query forms that parse as SPARQL but are not evaluated here.
const OTHER_QUERY_FORMS: &[&str] = &[
    "ASK", "CONSTRUCT", "DESCRIBE", "INSERT", "DELETE", "LOAD", "CLEAR", "CREATE", "DROP", "COPY",
    "MOVE", "ADD", "WITH",
];

/// SPARQL keywords outside the supported subset.
const UNSUPPORTED_KEYWORDS: &[&str] = &[
    "OPTIONAL", "UNION", "MINUS", "GRAPH", "BIND", "VALUES", "SERVICE", "ORDER", "GROUP",
    "HAVING", "LIMIT", "OFFSET", "REDUCED", "EXISTS", "BASE",
];

/// Parse a SELECT query.
///
/// # Errors
///
/// - `UnsupportedQueryType` for ASK, CONSTRUCT, DESCRIBE and update forms
/// - `UnsupportedQuery` for recognizable SPARQL outside the subset
/// - `MalformedQuery` for everything else that does not parse
pub fn parse_query(text: &str) -> Result<SelectQuery, QuadError> {
    check_query_form(text)?;

    let mut pairs =
        SelectParser::parse(Rule::query, text).map_err(|e| classify_failure(text, &e))?;
    let root = pairs
        .next()
        .ok_or_else(|| QuadError::MalformedQuery("empty query".to_string()))?;

    let mut query = SelectQuery::default();
    for pair in root.into_inner() {
        match pair.as_rule() {
            Rule::prefix_decl => query.prefixes.push(parse_prefix_decl(pair)?),
            Rule::distinct => query.distinct = true,
            Rule::projection => query.projection = parse_projection(pair),
            Rule::from_clause => query.graphs.push(parse_graph_ref(pair)?),
            Rule::group => parse_group(pair, &mut query)?,
            Rule::filter => set_filter(&mut query, parse_filter(pair)?)?,
            _ => {}
        }
    }

    if query.patterns.is_empty() {
        return Err(QuadError::MalformedQuery(
            "WHERE clause has no triple patterns".to_string(),
        ));
    }
    Ok(query)
}

// =============================================================================
// ERROR CLASSIFICATION
// =============================================================================

/// Reject non-SELECT forms before parsing.
///
/// Leading `PREFIX` declarations are skipped through the `>` closing their
/// namespace IRI, so `PREFIX ex:<http://x/>` needs no inner whitespace.
fn check_query_form(text: &str) -> Result<(), QuadError> {
    let code = strip_comments(text);
    let mut rest = code.trim_start();

    loop {
        let word = rest
            .chars()
            .take_while(char::is_ascii_alphabetic)
            .collect::<String>()
            .to_ascii_uppercase();
        match word.as_str() {
            "PREFIX" => match rest.find('>') {
                Some(end) => rest = rest[end + 1..].trim_start(),
                None => break,
            },
            "SELECT" => return Ok(()),
            form if OTHER_QUERY_FORMS.contains(&form) => {
                return Err(QuadError::UnsupportedQueryType(form.to_string()));
            }
            _ => break,
        }
    }
    Ok(())
}

fn classify_failure(text: &str, error: &pest::error::Error<Rule>) -> QuadError {
    let code = strip_terms(&strip_comments(text));

    if code.contains("&&") {
        return QuadError::UnsupportedQuery("FILTER conjunctions (&&)".to_string());
    }
    if code.contains("!=") {
        return QuadError::UnsupportedQuery("FILTER operators other than =".to_string());
    }

    let keyword = code
        .split(|c: char| !c.is_ascii_alphanumeric())
        .map(str::to_ascii_uppercase)
        .find(|word| UNSUPPORTED_KEYWORDS.contains(&word.as_str()));
    match keyword {
        Some(keyword) => QuadError::UnsupportedQuery(keyword),
        None => QuadError::MalformedQuery(error.to_string()),
    }
}

fn strip_comments(text: &str) -> String {
    text.lines()
        .map(|line| match line.rsplit_once('#') {
            // `#` inside an IRI is not a comment
            Some((before, _)) if before.matches('<').count() <= before.matches('>').count() => {
                before
            }
            _ => line,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Blank out IRIs and quoted strings so keyword scans only see syntax.
fn strip_terms(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut closing: Option<char> = None;
    for c in text.chars() {
        match closing {
            Some(end) if c == end => {
                closing = None;
                out.push(' ');
            }
            Some(_) => {}
            None if c == '<' => closing = Some('>'),
            None if c == '"' || c == '\'' => closing = Some(c),
            None => out.push(c),
        }
    }
    out
}

// =============================================================================
// CLAUSES
// =============================================================================

fn parse_prefix_decl(pair: Pair<Rule>) -> Result<(String, String), QuadError> {
    let mut prefix = None;
    let mut uri = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::pname_ns => prefix = Some(inner.as_str().trim_end_matches(':').to_string()),
            Rule::iri => uri = Some(iri_text(inner)),
            _ => {}
        }
    }
    match (prefix, uri) {
        (Some(prefix), Some(uri)) => Ok((prefix, uri)),
        _ => Err(QuadError::MalformedQuery(
            "incomplete PREFIX declaration".to_string(),
        )),
    }
}

fn parse_projection(pair: Pair<Rule>) -> Projection {
    let variables: Vec<String> = pair
        .into_inner()
        .filter(|inner| inner.as_rule() == Rule::variable)
        .map(variable_name)
        .collect();
    if variables.is_empty() {
        Projection::All
    } else {
        Projection::Variables(variables)
    }
}

fn parse_graph_ref(pair: Pair<Rule>) -> Result<String, QuadError> {
    let inner = pair
        .into_inner()
        .next()
        .ok_or_else(|| QuadError::MalformedQuery("FROM without a graph".to_string()))?;
    Ok(match inner.as_rule() {
        Rule::iri => iri_text(inner),
        _ => inner.as_str().to_string(),
    })
}

fn parse_group(pair: Pair<Rule>, query: &mut SelectQuery) -> Result<(), QuadError> {
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::triples => {
                for pattern in inner.into_inner() {
                    query.patterns.push(parse_triple_pattern(pattern)?);
                }
            }
            Rule::filter => set_filter(query, parse_filter(inner)?)?,
            _ => {}
        }
    }
    Ok(())
}

fn parse_triple_pattern(pair: Pair<Rule>) -> Result<TriplePattern, QuadError> {
    let terms = pair
        .into_inner()
        .map(parse_term)
        .collect::<Result<Vec<_>, _>>()?;
    match <[PatternTerm; 3]>::try_from(terms) {
        Ok([subject, predicate, object]) => Ok(TriplePattern::new(subject, predicate, object)),
        Err(terms) => Err(QuadError::MalformedQuery(format!(
            "triple pattern has {} terms",
            terms.len()
        ))),
    }
}

fn set_filter(query: &mut SelectQuery, filter: Vec<FilterComparison>) -> Result<(), QuadError> {
    if query.filter.is_some() {
        return Err(QuadError::UnsupportedQuery(
            "more than one FILTER".to_string(),
        ));
    }
    query.filter = Some(filter);
    Ok(())
}

fn parse_filter(pair: Pair<Rule>) -> Result<Vec<FilterComparison>, QuadError> {
    let mut comparisons = Vec::new();
    for inner in pair.into_inner() {
        if inner.as_rule() == Rule::comparison {
            comparisons.push(parse_comparison(inner)?);
        }
    }
    Ok(comparisons)
}

fn parse_comparison(pair: Pair<Rule>) -> Result<FilterComparison, QuadError> {
    let mut variable = None;
    let mut uri = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::comparison => return parse_comparison(inner),
            Rule::variable => variable = Some(variable_name(inner)),
            Rule::iri => uri = Some(iri_text(inner)),
            Rule::prefixed_name => uri = Some(inner.as_str().to_string()),
            _ => {}
        }
    }
    match (variable, uri) {
        (Some(variable), Some(uri)) => Ok(FilterComparison { variable, uri }),
        _ => Err(QuadError::MalformedQuery(
            "FILTER comparison must be ?var = <uri>".to_string(),
        )),
    }
}

// =============================================================================
// TERMS
// =============================================================================

fn parse_term(pair: Pair<Rule>) -> Result<PatternTerm, QuadError> {
    match pair.as_rule() {
        Rule::variable => Ok(PatternTerm::Variable(variable_name(pair))),
        Rule::iri => Ok(PatternTerm::Uri(iri_text(pair))),
        Rule::prefixed_name => Ok(PatternTerm::Uri(pair.as_str().to_string())),
        Rule::rdf_type => Ok(PatternTerm::Uri(RDF_TYPE.to_string())),
        Rule::blank => Ok(PatternTerm::Blank(
            pair.as_str().trim_start_matches("_:").to_string(),
        )),
        Rule::number => {
            let text = pair.as_str();
            let datatype = if text.contains('.') {
                XSD_DECIMAL
            } else {
                XSD_INTEGER
            };
            Ok(PatternTerm::Literal(Literal::typed(text, datatype)))
        }
        Rule::literal => Ok(PatternTerm::Literal(parse_literal(pair))),
        other => Err(QuadError::MalformedQuery(format!(
            "unexpected term {:?}",
            other
        ))),
    }
}

fn parse_literal(pair: Pair<Rule>) -> Literal {
    let mut literal = Literal::new("");
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::string_double | Rule::string_single => {
                literal.value = unescape(inner.as_str());
            }
            Rule::lang_tag => {
                literal.language = Some(inner.as_str().trim_start_matches('@').to_string());
            }
            Rule::datatype => {
                literal.datatype = inner.into_inner().next().map(|target| match target
                    .as_rule()
                {
                    Rule::iri => iri_text(target),
                    _ => target.as_str().to_string(),
                });
            }
            _ => {}
        }
    }
    literal
}

fn variable_name(pair: Pair<Rule>) -> String {
    pair.as_str()
        .trim_start_matches(['?', '$'])
        .to_string()
}

fn iri_text(pair: Pair<Rule>) -> String {
    pair.as_str()
        .trim_start_matches('<')
        .trim_end_matches('>')
        .to_string()
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

// =============================================================================
// TESTS
// =============================================================================
