//! HTTP route modules.

mod health;
mod query;

pub use health::health_routes;
pub use query::query_routes;
