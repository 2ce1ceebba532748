//! Abstract syntax tree for SRQL queries.
//!
//! A [`Query`] is an immutable value object; `Display` renders the canonical
//! SRQL text, which is what the interactive builder emits on "apply".

use super::time::{BucketSpan, RelativeWindow};
use super::token::quote_if_needed;
use serde::{Deserialize, Serialize};

/// Pagination direction for a query or cursor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Walk forward through the result set.
    #[default]
    Next,
    /// Walk backward through the result set.
    Prev,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Next => write!(f, "next"),
            Self::Prev => write!(f, "prev"),
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "next" => Ok(Self::Next),
            "prev" => Ok(Self::Prev),
            other => Err(format!("unknown direction '{other}'")),
        }
    }
}

/// Sort order for the `sort:` clause.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDir {
    /// Ascending (oldest first for timestamps).
    Asc,
    /// Descending (newest first for timestamps).
    #[default]
    Desc,
}

impl SortDir {
    /// The opposite direction; used when walking a page backward.
    #[must_use]
    pub fn flipped(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }

    /// SQL keyword for this direction.
    #[must_use]
    pub fn sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl std::fmt::Display for SortDir {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Asc => write!(f, "asc"),
            Self::Desc => write!(f, "desc"),
        }
    }
}

/// The `sort:<field>:<dir>` clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    /// The field to sort by.
    pub field: String,
    /// The sort direction.
    pub direction: SortDir,
}

impl std::fmt::Display for Sort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sort:{}:{}", self.field, self.direction)
    }
}

/// Operator of a field filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    /// Exact match against a single value.
    Eq,
    /// Negated exact match.
    NotEq,
    /// Match any value in the set.
    In,
    /// Match no value in the set.
    NotIn,
    /// Prefix match (`value%`).
    WildcardSuffix,
    /// Contains match (`%value%`).
    WildcardPrefixSuffix,
    /// Field is present (non-null, non-empty).
    Exists,
}

/// A single field filter (`severity_text:(fatal,error)`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterClause {
    /// The field name.
    pub field: String,
    /// The filter operator.
    pub op: FilterOp,
    /// Ordered value set. Wildcard patterns keep their `%` markers;
    /// `Exists` carries no values.
    pub values: Vec<String>,
}

impl std::fmt::Display for FilterClause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.op {
            FilterOp::Eq => write!(f, "{}:{}", self.field, quote_if_needed(&self.values[0])),
            FilterOp::NotEq => write!(f, "!{}:{}", self.field, quote_if_needed(&self.values[0])),
            FilterOp::In | FilterOp::NotIn => {
                if matches!(self.op, FilterOp::NotIn) {
                    write!(f, "!")?;
                }
                let rendered: Vec<String> =
                    self.values.iter().map(|v| quote_if_needed(v)).collect();
                write!(f, "{}:({})", self.field, rendered.join(","))
            }
            FilterOp::WildcardSuffix | FilterOp::WildcardPrefixSuffix => {
                write!(f, "{}:{}", self.field, self.values[0])
            }
            FilterOp::Exists => write!(f, "{}:*", self.field),
        }
    }
}

/// Aggregation function for the `agg:` clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggFn {
    /// Arithmetic mean.
    Avg,
    /// Sum.
    Sum,
    /// Minimum.
    Min,
    /// Maximum.
    Max,
    /// Row count.
    Count,
}

impl AggFn {
    /// SQL function name.
    #[must_use]
    pub fn sql(self) -> &'static str {
        match self {
            Self::Avg => "avg",
            Self::Sum => "sum",
            Self::Min => "min",
            Self::Max => "max",
            Self::Count => "count",
        }
    }
}

impl std::fmt::Display for AggFn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.sql())
    }
}

impl std::str::FromStr for AggFn {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "avg" => Ok(Self::Avg),
            "sum" => Ok(Self::Sum),
            "min" => Ok(Self::Min),
            "max" => Ok(Self::Max),
            "count" => Ok(Self::Count),
            other => Err(format!("unknown aggregation function '{other}'")),
        }
    }
}

/// Logical connective inside a conditional aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalOp {
    /// Logical AND.
    And,
    /// Logical OR.
    Or,
}

impl std::fmt::Display for LogicalOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::And => write!(f, "AND"),
            Self::Or => write!(f, "OR"),
        }
    }
}

/// One `field = 'literal'` term inside a conditional aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CondTerm {
    /// The field compared.
    pub field: String,
    /// The literal compared against; bound as a parameter at compile time.
    pub value: String,
}

impl std::fmt::Display for CondTerm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} = '{}'", self.field, self.value)
    }
}

/// A chain of equality terms joined by OR/AND, as written (no grouping).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionalExpr {
    /// The first term.
    pub first: CondTerm,
    /// Remaining terms with their joiners.
    pub rest: Vec<(LogicalOp, CondTerm)>,
}

impl ConditionalExpr {
    /// All terms in order.
    pub fn terms(&self) -> impl Iterator<Item = &CondTerm> {
        std::iter::once(&self.first).chain(self.rest.iter().map(|(_, t)| t))
    }
}

impl std::fmt::Display for ConditionalExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.first)?;
        for (op, term) in &self.rest {
            write!(f, " {op} {term}")?;
        }
        Ok(())
    }
}

/// One aggregate call from the closed stats grammar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggCall {
    /// `count()`
    Count,
    /// `sum(<field>)`
    Sum(String),
    /// `avg(<field>)`
    Avg(String),
    /// `min(<field>)`
    Min(String),
    /// `max(<field>)`
    Max(String),
    /// `sum(if(<cond>,1,0))`
    SumIf(ConditionalExpr),
    /// `count(if(<cond>,1,0))`
    CountIf(ConditionalExpr),
}

impl std::fmt::Display for AggCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Count => write!(f, "count()"),
            Self::Sum(field) => write!(f, "sum({field})"),
            Self::Avg(field) => write!(f, "avg({field})"),
            Self::Min(field) => write!(f, "min({field})"),
            Self::Max(field) => write!(f, "max({field})"),
            Self::SumIf(cond) => write!(f, "sum(if({cond}, 1, 0))"),
            Self::CountIf(cond) => write!(f, "count(if({cond}, 1, 0))"),
        }
    }
}

/// One `<expr> as <alias>` entry of a `stats:` clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateExpr {
    /// The aggregate call.
    pub call: AggCall,
    /// Result column alias; unique within the clause.
    pub alias: String,
}

impl std::fmt::Display for AggregateExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} as {}", self.call, self.alias)
    }
}

/// A parsed SRQL query.
///
/// `entity` is the only required clause; everything else is optional and
/// order-independent in the source text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// The logical dataset the query targets.
    pub entity: String,
    /// Field filters, ANDed across fields.
    pub filters: Vec<FilterClause>,
    /// Optional relative time window.
    pub time_range: Option<RelativeWindow>,
    /// Optional sort clause.
    pub sort: Option<Sort>,
    /// Optional row limit (clamped at compile time).
    pub limit: Option<i64>,
    /// Opaque pagination cursor, if resuming.
    pub cursor: Option<String>,
    /// Pagination direction.
    pub direction: Direction,
    /// Optional aggregate projections.
    pub stats: Option<Vec<AggregateExpr>>,
    /// Optional time-bucket span for aggregation.
    pub bucket: Option<BucketSpan>,
    /// Optional series dimension for aggregation.
    pub series_by: Option<String>,
    /// Optional per-bucket aggregation function.
    pub agg: Option<AggFn>,
    /// Whether the caller wants a live feed seeded from this query.
    pub stream: bool,
}

impl Query {
    /// Creates an empty query against the given entity.
    #[must_use]
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            filters: Vec::new(),
            time_range: None,
            sort: None,
            limit: None,
            cursor: None,
            direction: Direction::Next,
            stats: None,
            bucket: None,
            series_by: None,
            agg: None,
            stream: false,
        }
    }

    /// Adds a field filter.
    #[must_use]
    pub fn with_filter(mut self, filter: FilterClause) -> Self {
        self.filters.push(filter);
        self
    }

    /// Sets the sort clause.
    #[must_use]
    pub fn with_sort(mut self, field: impl Into<String>, direction: SortDir) -> Self {
        self.sort = Some(Sort {
            field: field.into(),
            direction,
        });
        self
    }

    /// Sets the row limit.
    #[must_use]
    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the relative time window.
    #[must_use]
    pub fn with_time_range(mut self, window: RelativeWindow) -> Self {
        self.time_range = Some(window);
        self
    }
}

impl std::fmt::Display for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "in:{}", self.entity)?;

        for filter in &self.filters {
            write!(f, " {filter}")?;
        }

        if let Some(ref window) = self.time_range {
            write!(f, " time:{window}")?;
        }

        if let Some(ref sort) = self.sort {
            write!(f, " {sort}")?;
        }

        if let Some(limit) = self.limit {
            write!(f, " limit:{limit}")?;
        }

        if let Some(ref cursor) = self.cursor {
            write!(f, " cursor:{cursor}")?;
        }

        if let Some(ref stats) = self.stats {
            let rendered: Vec<String> = stats.iter().map(ToString::to_string).collect();
            write!(f, " stats:\"{}\"", rendered.join(", "))?;
        }

        if let Some(ref bucket) = self.bucket {
            write!(f, " bucket:{bucket}")?;
        }

        if let Some(ref series) = self.series_by {
            write!(f, " series:{series}")?;
        }

        if let Some(agg) = self.agg {
            write!(f, " agg:{agg}")?;
        }

        if self.stream {
            write!(f, " stream:true")?;
        }

        Ok(())
    }
}
