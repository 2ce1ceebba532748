//! Sightline Shared Library
//!
//! This crate contains the SRQL query core shared across the Sightline
//! observability dashboards: the query language parser, the SQL compiler,
//! the keyset-pagination cursor codec, and the interactive query-builder
//! state machine.
//!
//! # Modules
//!
//! - [`srql`] - SRQL parsing, compilation, pagination, and builder state
//!
//! # Example
//!
//! ```
//! use shared::srql::{translate, Limits, SchemaCatalog};
//!
//! let catalog = SchemaCatalog::with_defaults();
//! let compiled = translate(
//!     "in:logs severity_text:error time:last_24h limit:20",
//!     None,
//!     None,
//!     None,
//!     &catalog,
//!     &Limits::default(),
//! )
//! .unwrap();
//!
//! assert!(compiled.sql.contains("FROM otel_logs"));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod srql;

/// Re-export common dependencies for convenience.
pub use chrono;
pub use serde;
pub use serde_json;
