//! SRQL → SQL compiler.
//!
//! Turns a validated [`Query`] into a [`CompiledQuery`]: one parameterized
//! SQL statement plus an ordered parameter list. Every caller-supplied
//! literal is bound as a `?` parameter; identifiers (tables, fields,
//! aliases) are only spliced after allow-list validation.

use super::ast::{
    AggCall, AggFn, ConditionalExpr, Direction, FilterClause, FilterOp, Query, Sort, SortDir,
};
use super::cursor::{shape_fingerprint, Cursor};
use super::error::CompileError;
use super::parser::parse_query;
use super::schema::{EntitySchema, SchemaCatalog};
use serde::{Deserialize, Serialize};

/// Default and maximum page sizes; limits outside `[1, max]` are clamped,
/// not rejected, because views routinely overshoot when toggling
/// "show more".
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    /// Page size when the query does not specify one.
    pub default: i64,
    /// Hard cap on the page size.
    pub max: i64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            default: 100,
            max: 500,
        }
    }
}

impl Limits {
    /// Clamps a requested limit into `[1, max]`, falling back to the
    /// default when absent.
    #[must_use]
    pub fn clamp(&self, requested: Option<i64>) -> i64 {
        requested.unwrap_or(self.default).clamp(1, self.max)
    }
}

/// One bound SQL parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v", rename_all = "snake_case")]
pub enum SqlValue {
    /// Text parameter.
    Text(String),
    /// Integer parameter.
    Int(i64),
}

/// How the compiled statement should be post-processed by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum CompiledShape {
    /// Row projection with keyset pagination.
    Rows {
        /// Requested page size (the SQL LIMIT is `page_size + 1`).
        page_size: i64,
        /// Effective sort clause.
        sort: Sort,
        /// Tie-break column appended to the sort.
        tie_break: String,
        /// Walk direction.
        direction: Direction,
        /// Shape fingerprint for cursors issued from this result.
        fingerprint: String,
        /// Whether a cursor seeded this fetch (controls `prev_cursor`).
        resumed: bool,
    },
    /// Aggregation; no cursor pagination applies.
    Aggregate,
}

/// A compiled, parameterized SQL statement.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    /// SQL text with `?` placeholders.
    pub sql: String,
    /// Bound parameters, in placeholder order.
    pub params: Vec<SqlValue>,
    /// Post-processing contract for the engine.
    pub shape: CompiledShape,
}

/// The compile contract: parse a query string, fold in request-level
/// cursor/direction/limit, and compile it.
///
/// # Errors
///
/// Returns the full [`CompileError`] taxonomy; see [`compile`].
pub fn translate(
    query: &str,
    cursor: Option<&str>,
    direction: Option<Direction>,
    limit: Option<i64>,
    catalog: &SchemaCatalog,
    limits: &Limits,
) -> Result<CompiledQuery, CompileError> {
    let mut parsed = parse_query(query)?;
    apply_request(&mut parsed, cursor, direction, limit);
    compile(&parsed, catalog, limits)
}

/// Folds request-level pagination arguments into a parsed query.
///
/// An explicit `direction` wins; otherwise the direction embedded in the
/// cursor (when it decodes) is adopted.
pub fn apply_request(
    query: &mut Query,
    cursor: Option<&str>,
    direction: Option<Direction>,
    limit: Option<i64>,
) {
    if let Some(raw) = cursor {
        query.cursor = Some(raw.to_string());
    }
    if let Some(requested) = limit {
        query.limit = Some(requested);
    }
    query.direction = match direction {
        Some(explicit) => explicit,
        None => query
            .cursor
            .as_deref()
            .and_then(|raw| Cursor::decode(raw).ok())
            .map_or(Direction::Next, |c| c.direction),
    };
}

/// Compiles a [`Query`] against a schema catalog.
///
/// # Errors
///
/// - [`CompileError::UnknownEntity`] for entities outside the catalog
/// - [`CompileError::UnknownField`] for fields outside the entity schema
/// - [`CompileError::UnsupportedExpression`] for invalid stats/bucket
///   combinations
/// - [`CompileError::InvalidCursor`] when the cursor does not decode or was
///   issued for a different query shape
pub fn compile(
    query: &Query,
    catalog: &SchemaCatalog,
    limits: &Limits,
) -> Result<CompiledQuery, CompileError> {
    let schema = catalog
        .entity(&query.entity)
        .ok_or_else(|| CompileError::UnknownEntity(query.entity.clone()))?;

    validate_fields(query, schema)?;

    let sort = effective_sort(query, schema);
    let page_size = limits.clamp(query.limit);

    if query.stats.is_some() || query.bucket.is_some() {
        return compile_aggregate(query, schema, page_size);
    }

    if query.agg.is_some() {
        return Err(CompileError::UnsupportedExpression(
            "agg: requires a stats: or bucket: clause".to_string(),
        ));
    }
    if query.series_by.is_some() {
        return Err(CompileError::UnsupportedExpression(
            "series: requires a stats: or bucket: clause".to_string(),
        ));
    }

    compile_rows(query, schema, &sort, page_size)
}

/// The effective sort: the query's, or the timestamp column descending.
#[must_use]
pub fn effective_sort(query: &Query, schema: &EntitySchema) -> Sort {
    query.sort.clone().unwrap_or_else(|| Sort {
        field: schema.timestamp_field.clone(),
        direction: SortDir::Desc,
    })
}

fn validate_fields(query: &Query, schema: &EntitySchema) -> Result<(), CompileError> {
    let unknown = |field: &str| CompileError::UnknownField {
        field: field.to_string(),
        entity: query.entity.clone(),
    };

    for filter in &query.filters {
        if !schema.has_field(&filter.field) {
            return Err(unknown(&filter.field));
        }
    }

    if let Some(ref sort) = query.sort {
        if !schema.has_field(&sort.field) {
            return Err(unknown(&sort.field));
        }
    }

    if let Some(ref series) = query.series_by {
        if !schema.has_field(series) {
            return Err(unknown(series));
        }
    }

    if let Some(ref stats) = query.stats {
        for expr in stats {
            match &expr.call {
                AggCall::Count => {}
                AggCall::Sum(field)
                | AggCall::Avg(field)
                | AggCall::Min(field)
                | AggCall::Max(field) => {
                    if !schema.has_field(field) {
                        return Err(unknown(field));
                    }
                }
                AggCall::SumIf(cond) | AggCall::CountIf(cond) => {
                    for term in cond.terms() {
                        if !schema.has_field(&term.field) {
                            return Err(unknown(&term.field));
                        }
                    }
                }
            }
        }
    }

    Ok(())
}

fn compile_rows(
    query: &Query,
    schema: &EntitySchema,
    sort: &Sort,
    page_size: i64,
) -> Result<CompiledQuery, CompileError> {
    let fingerprint = shape_fingerprint(query, sort);
    let tie_break = schema.tie_break_field.clone();

    let mut params = Vec::new();
    let mut predicates = Vec::new();
    render_filters(query, &mut predicates, &mut params);
    render_time(query, schema, &mut predicates, &mut params);

    let mut resumed = false;
    if let Some(raw) = query.cursor.as_deref() {
        let cursor = Cursor::decode(raw)?;
        if cursor.fingerprint != fingerprint {
            return Err(CompileError::InvalidCursor(
                "issued for a different query shape".to_string(),
            ));
        }
        if cursor.direction != query.direction {
            return Err(CompileError::InvalidCursor(format!(
                "issued for direction '{}'",
                cursor.direction
            )));
        }

        let comparator = keyset_comparator(sort.direction, query.direction);
        predicates.push(format!(
            "({}, {tie_break}) {comparator} (?, ?)",
            sort.field
        ));
        params.push(SqlValue::Text(cursor.sort_value));
        params.push(SqlValue::Text(cursor.tie_break));
        resumed = true;
    }

    let mut sql = format!("SELECT * FROM {}", schema.table);
    if !predicates.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&predicates.join(" AND "));
    }

    // Fetch order flips when walking backward; the engine restores the
    // requested order after the fetch.
    let fetch_dir = match query.direction {
        Direction::Next => sort.direction,
        Direction::Prev => sort.direction.flipped(),
    };
    sql.push_str(&format!(
        " ORDER BY {} {dir}, {tie_break} {dir}",
        sort.field,
        dir = fetch_dir.sql()
    ));

    // One extra row detects whether a further page exists.
    sql.push_str(" LIMIT ?");
    params.push(SqlValue::Int(page_size + 1));

    let compiled = CompiledQuery {
        sql,
        params,
        shape: CompiledShape::Rows {
            page_size,
            sort: sort.clone(),
            tie_break,
            direction: query.direction,
            fingerprint,
            resumed,
        },
    };
    debug_assert_eq!(placeholder_count(&compiled.sql), compiled.params.len());
    Ok(compiled)
}

fn compile_aggregate(
    query: &Query,
    schema: &EntitySchema,
    page_size: i64,
) -> Result<CompiledQuery, CompileError> {
    if query.agg.is_some() && query.stats.is_some() {
        return Err(CompileError::UnsupportedExpression(
            "agg: cannot be combined with stats:".to_string(),
        ));
    }
    if query.agg.is_some() && query.bucket.is_none() {
        return Err(CompileError::UnsupportedExpression(
            "agg: requires a bucket: clause".to_string(),
        ));
    }

    let mut params = Vec::new();
    let mut select = Vec::new();
    let mut group_by = Vec::new();

    if let Some(ref bucket) = query.bucket {
        select.push(format!(
            "toStartOfInterval({}, toIntervalSecond(?)) AS bucket",
            schema.timestamp_field
        ));
        params.push(SqlValue::Int(bucket.as_seconds()));
        group_by.push("bucket".to_string());
    }

    if let Some(ref series) = query.series_by {
        select.push(series.clone());
        group_by.push(series.clone());
    }

    if let Some(ref stats) = query.stats {
        for expr in stats {
            select.push(render_aggregate(&expr.call, &expr.alias, &mut params));
        }
    } else {
        // Bucketed projection without stats aggregates the entity's metric
        // value column.
        let value_field = schema.value_field.as_deref().ok_or_else(|| {
            CompileError::UnsupportedExpression(format!(
                "entity '{}' has no metric value column to bucket",
                query.entity
            ))
        })?;
        let agg = query.agg.unwrap_or(AggFn::Avg);
        let rendered = match agg {
            AggFn::Count => "count() AS value".to_string(),
            _ => format!("{}({value_field}) AS value", agg.sql()),
        };
        select.push(rendered);
    }

    let mut sql = format!("SELECT {} FROM {}", select.join(", "), schema.table);

    let mut predicates = Vec::new();
    render_filters(query, &mut predicates, &mut params);
    render_time(query, schema, &mut predicates, &mut params);
    if !predicates.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&predicates.join(" AND "));
    }

    if !group_by.is_empty() {
        sql.push_str(&format!(" GROUP BY {}", group_by.join(", ")));
        sql.push_str(&format!(" ORDER BY {} ASC", group_by.join(" ASC, ")));
    }

    sql.push_str(" LIMIT ?");
    params.push(SqlValue::Int(page_size));

    let compiled = CompiledQuery {
        sql,
        params,
        shape: CompiledShape::Aggregate,
    };
    debug_assert_eq!(placeholder_count(&compiled.sql), compiled.params.len());
    Ok(compiled)
}

fn render_filters(query: &Query, predicates: &mut Vec<String>, params: &mut Vec<SqlValue>) {
    for filter in &query.filters {
        predicates.push(render_predicate(filter, params));
    }
}

fn render_time(
    query: &Query,
    schema: &EntitySchema,
    predicates: &mut Vec<String>,
    params: &mut Vec<SqlValue>,
) {
    if let Some(ref window) = query.time_range {
        predicates.push(format!(
            "{} >= now() - toIntervalSecond(?)",
            schema.timestamp_field
        ));
        params.push(SqlValue::Int(window.as_seconds()));
    }
}

fn render_predicate(filter: &FilterClause, params: &mut Vec<SqlValue>) -> String {
    match filter.op {
        FilterOp::Eq => {
            params.push(SqlValue::Text(filter.values[0].clone()));
            format!("{} = ?", filter.field)
        }
        FilterOp::NotEq => {
            params.push(SqlValue::Text(filter.values[0].clone()));
            format!("{} != ?", filter.field)
        }
        FilterOp::In | FilterOp::NotIn => {
            let placeholders = vec!["?"; filter.values.len()].join(", ");
            for value in &filter.values {
                params.push(SqlValue::Text(value.clone()));
            }
            let negation = if matches!(filter.op, FilterOp::NotIn) {
                " NOT"
            } else {
                ""
            };
            format!("{}{negation} IN ({placeholders})", filter.field)
        }
        FilterOp::WildcardSuffix | FilterOp::WildcardPrefixSuffix => {
            params.push(SqlValue::Text(filter.values[0].clone()));
            format!("{} LIKE ?", filter.field)
        }
        FilterOp::Exists => {
            format!(
                "({field} IS NOT NULL AND {field} != '')",
                field = filter.field
            )
        }
    }
}

fn render_aggregate(call: &AggCall, alias: &str, params: &mut Vec<SqlValue>) -> String {
    match call {
        AggCall::Count => format!("count() AS {alias}"),
        AggCall::Sum(field) => format!("sum({field}) AS {alias}"),
        AggCall::Avg(field) => format!("avg({field}) AS {alias}"),
        AggCall::Min(field) => format!("min({field}) AS {alias}"),
        AggCall::Max(field) => format!("max({field}) AS {alias}"),
        AggCall::SumIf(cond) => {
            format!("sum(if({}, 1, 0)) AS {alias}", render_condition(cond, params))
        }
        AggCall::CountIf(cond) => {
            format!("countIf({}) AS {alias}", render_condition(cond, params))
        }
    }
}

fn render_condition(cond: &ConditionalExpr, params: &mut Vec<SqlValue>) -> String {
    let mut rendered = format!("{} = ?", cond.first.field);
    params.push(SqlValue::Text(cond.first.value.clone()));
    for (op, term) in &cond.rest {
        rendered.push_str(&format!(" {op} {} = ?", term.field));
        params.push(SqlValue::Text(term.value.clone()));
    }
    rendered
}

fn keyset_comparator(sort: SortDir, direction: Direction) -> &'static str {
    match (direction, sort) {
        (Direction::Next, SortDir::Desc) | (Direction::Prev, SortDir::Asc) => "<",
        (Direction::Next, SortDir::Asc) | (Direction::Prev, SortDir::Desc) => ">",
    }
}

/// Counts `?` placeholders outside single-quoted spans.
#[must_use]
pub fn placeholder_count(sql: &str) -> usize {
    let mut count = 0;
    let mut in_literal = false;
    for ch in sql.chars() {
        match ch {
            '\'' => in_literal = !in_literal,
            '?' if !in_literal => count += 1,
            _ => {}
        }
    }
    count
}
