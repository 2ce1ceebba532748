//! SRQL query parser.
//!
//! Assembles the classified token stream into a [`Query`], rejecting
//! duplicate singleton clauses deterministically and accumulating repeated
//! same-field filters.

use super::ast::{Direction, Query};
use super::error::CompileError;
use super::filter::merge_filters;
use super::token::{classify, tokenize, Clause};

/// Parses an SRQL query string into a [`Query`].
///
/// # Errors
///
/// Returns a [`CompileError`] for malformed tokens, a missing `in:` clause,
/// duplicate singleton clauses, or unparseable clause payloads.
///
/// # Examples
///
/// ```
/// use shared::srql::parse_query;
///
/// let query = parse_query("in:logs severity_text:error limit:20").unwrap();
/// assert_eq!(query.entity, "logs");
/// assert_eq!(query.limit, Some(20));
/// ```
pub fn parse_query(input: &str) -> Result<Query, CompileError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(CompileError::syntax(0, "empty query"));
    }

    let mut entity = None;
    let mut time_range = None;
    let mut sort = None;
    let mut limit = None;
    let mut cursor = None;
    let mut stats = None;
    let mut bucket = None;
    let mut series_by = None;
    let mut agg = None;
    let mut stream = None;
    let mut filters = Vec::new();

    for token in &tokens {
        let clause = classify(token)?;
        let keyword = clause.keyword();
        match clause {
            Clause::Entity(value) => set_once(&mut entity, value, keyword)?,
            Clause::Time(value) => set_once(&mut time_range, value, keyword)?,
            Clause::Sort(value) => set_once(&mut sort, value, keyword)?,
            Clause::Limit(value) => set_once(&mut limit, value, keyword)?,
            Clause::Cursor(value) => set_once(&mut cursor, value, keyword)?,
            Clause::Stats(value) => set_once(&mut stats, value, keyword)?,
            Clause::Bucket(value) => set_once(&mut bucket, value, keyword)?,
            Clause::Series(value) => set_once(&mut series_by, value, keyword)?,
            Clause::Agg(value) => set_once(&mut agg, value, keyword)?,
            Clause::Stream(value) => set_once(&mut stream, value, keyword)?,
            Clause::Filter(value) => filters.push(value),
        }
    }

    let entity = entity.ok_or_else(|| {
        CompileError::syntax(0, "query must include an 'in:<entity>' clause")
    })?;

    Ok(Query {
        entity,
        filters: merge_filters(filters),
        time_range,
        sort,
        limit,
        cursor,
        direction: Direction::Next,
        stats,
        bucket,
        series_by,
        agg,
        stream: stream.unwrap_or(false),
    })
}

fn set_once<T>(slot: &mut Option<T>, value: T, keyword: &str) -> Result<(), CompileError> {
    if slot.is_some() {
        return Err(CompileError::DuplicateClause(keyword.to_string()));
    }
    *slot = Some(value);
    Ok(())
}
