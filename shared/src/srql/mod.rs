//! SRQL: the query language behind the Sightline dashboards.
//!
//! Every view assembles a compact textual query, hands it to this module,
//! and renders the rows that come back. The pipeline is:
//! tokenize → classify → parse → compile → execute → paginate.
//!
//! # Supported syntax
//!
//! ```text
//! in:logs severity_text:(fatal,error) time:last_24h sort:timestamp:desc limit:20
//! in:logs body:%refused% trace_id:*
//! in:logs stats:"count() as total, sum(if(severity_text = 'fatal', 1, 0)) as fatal"
//! in:metrics name:cpu_usage bucket:5m agg:avg series:service_name
//! ```
//!
//! # Example
//!
//! ```
//! use shared::srql::{parse_query, FilterOp};
//!
//! let query = parse_query("in:logs severity_text:(fatal,error) limit:20").unwrap();
//! assert_eq!(query.entity, "logs");
//! assert_eq!(query.filters[0].op, FilterOp::In);
//! assert_eq!(query.limit, Some(20));
//! ```

mod ast;
mod builder;
mod compiler;
mod cursor;
mod engine;
mod error;
mod exec;
mod filter;
mod parser;
mod schema;
mod stats;
mod time;
mod token;

pub use ast::{
    AggCall, AggFn, AggregateExpr, CondTerm, ConditionalExpr, Direction, FilterClause, FilterOp,
    LogicalOp, Query, Sort, SortDir,
};
pub use builder::{
    apply_event, BuilderError, BuilderEvent, BuilderFilter, BuilderOp, BuilderState,
};
pub use compiler::{
    compile, effective_sort, placeholder_count, translate, CompiledQuery, CompiledShape, Limits,
    SqlValue,
};
pub use cursor::{shape_fingerprint, Cursor};
pub use engine::{EngineError, PaginationMeta, QueryEngine, QueryRequest, QueryResponse};
pub use error::CompileError;
pub use exec::{ExecutionError, Executor, Row, StaticExecutor};
pub use parser::parse_query;
pub use schema::{EntitySchema, SchemaCatalog};
pub use stats::parse_stats;
pub use time::{parse_bucket, parse_window, BucketSpan, RelativeWindow, TimeUnit};
pub use token::{classify, tokenize, Clause, Token};
