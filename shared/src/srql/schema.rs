//! Entity schema catalog.
//!
//! Maps logical entities to physical relations and allow-listed field
//! vocabularies. The catalog is an immutable value passed into the
//! compiler, never a process-global, so tests can inject synthetic
//! schemas.

use std::collections::{BTreeMap, BTreeSet};

/// Schema of one queryable entity.
#[derive(Debug, Clone)]
pub struct EntitySchema {
    /// Physical relation name; spliced into SQL, so it never comes from
    /// user input.
    pub table: String,
    /// Allow-listed field names.
    pub fields: BTreeSet<String>,
    /// Column used for time filters and the default sort.
    pub timestamp_field: String,
    /// Stable unique column appended to every sort for deterministic
    /// keyset pagination.
    pub tie_break_field: String,
    /// Metric value column for bucketed aggregation, when the entity has
    /// one.
    pub value_field: Option<String>,
}

impl EntitySchema {
    /// Creates a schema; `timestamp_field` and `tie_break_field` are added
    /// to the field allow-list automatically.
    #[must_use]
    pub fn new(
        table: impl Into<String>,
        timestamp_field: impl Into<String>,
        tie_break_field: impl Into<String>,
        fields: &[&str],
    ) -> Self {
        let timestamp_field = timestamp_field.into();
        let tie_break_field = tie_break_field.into();
        let mut set: BTreeSet<String> = fields.iter().map(|f| (*f).to_string()).collect();
        set.insert(timestamp_field.clone());
        set.insert(tie_break_field.clone());

        Self {
            table: table.into(),
            fields: set,
            timestamp_field,
            tie_break_field,
            value_field: None,
        }
    }

    /// Sets the metric value column.
    #[must_use]
    pub fn with_value_field(mut self, field: impl Into<String>) -> Self {
        let field = field.into();
        self.fields.insert(field.clone());
        self.value_field = Some(field);
        self
    }

    /// Whether `field` is in the allow-list.
    #[must_use]
    pub fn has_field(&self, field: &str) -> bool {
        self.fields.contains(field)
    }
}

/// Immutable entity → schema map.
#[derive(Debug, Clone, Default)]
pub struct SchemaCatalog {
    entities: BTreeMap<String, EntitySchema>,
}

impl SchemaCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entity.
    #[must_use]
    pub fn with_entity(mut self, name: impl Into<String>, schema: EntitySchema) -> Self {
        self.entities.insert(name.into(), schema);
        self
    }

    /// Looks up an entity schema.
    #[must_use]
    pub fn entity(&self, name: &str) -> Option<&EntitySchema> {
        self.entities.get(name)
    }

    /// Entity names in the catalog.
    pub fn entity_names(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }

    /// The catalog used by the dashboards: OTel-shaped logs, traces, and
    /// metrics.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new()
            .with_entity(
                "logs",
                EntitySchema::new(
                    "otel_logs",
                    "timestamp",
                    "id",
                    &[
                        "trace_id",
                        "span_id",
                        "severity_text",
                        "severity_number",
                        "service_name",
                        "service_version",
                        "service_instance",
                        "scope_name",
                        "scope_version",
                        "body",
                    ],
                ),
            )
            .with_entity(
                "traces",
                EntitySchema::new(
                    "otel_traces",
                    "timestamp",
                    "span_id",
                    &[
                        "trace_id",
                        "parent_span_id",
                        "name",
                        "kind",
                        "status_code",
                        "status_message",
                        "duration_ms",
                        "service_name",
                    ],
                )
                .with_value_field("duration_ms"),
            )
            .with_entity(
                "metrics",
                EntitySchema::new(
                    "otel_metrics",
                    "timestamp",
                    "id",
                    &["name", "unit", "service_name"],
                )
                .with_value_field("value"),
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_entities() {
        let catalog = SchemaCatalog::with_defaults();
        let names: Vec<&str> = catalog.entity_names().collect();
        assert_eq!(names, vec!["logs", "metrics", "traces"]);
    }

    #[test]
    fn test_logs_schema_fields() {
        let catalog = SchemaCatalog::with_defaults();
        let logs = catalog.entity("logs").unwrap();

        assert_eq!(logs.table, "otel_logs");
        assert!(logs.has_field("severity_text"));
        assert!(logs.has_field("timestamp"));
        assert!(logs.has_field("id"));
        assert!(!logs.has_field("no_such_field"));
        assert!(logs.value_field.is_none());
    }

    #[test]
    fn test_metrics_schema_has_value_field() {
        let catalog = SchemaCatalog::with_defaults();
        let metrics = catalog.entity("metrics").unwrap();
        assert_eq!(metrics.value_field.as_deref(), Some("value"));
        assert!(metrics.has_field("value"));
    }

    #[test]
    fn test_unknown_entity_is_none() {
        let catalog = SchemaCatalog::with_defaults();
        assert!(catalog.entity("devices").is_none());
    }

    #[test]
    fn test_synthetic_catalog_injection() {
        let catalog = SchemaCatalog::new().with_entity(
            "widgets",
            EntitySchema::new("widget_table", "created_at", "widget_id", &["color"]),
        );

        let widgets = catalog.entity("widgets").unwrap();
        assert_eq!(widgets.table, "widget_table");
        assert!(widgets.has_field("color"));
        assert!(widgets.has_field("created_at"));
    }
}
