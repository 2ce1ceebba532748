//! Interactive query-builder state.
//!
//! A structural mirror of a query's entity and filters for an interactive
//! editing session. Mutation is a pure `(state, event) -> state` function,
//! so any concurrency model can serialize calls externally; the hosting
//! view owns the session lifecycle.
//!
//! Serialization is lossy-normalizing: fields keep insertion order, values
//! inside an `In` set are sorted, and identical filters collapse. For any
//! state reachable through the builder events,
//! `parse(serialize(state)) == state`.

use super::ast::{FilterOp, Query};
use super::error::CompileError;
use super::parser::parse_query;
use super::schema::SchemaCatalog;
use super::token::quote_if_needed;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Operators representable in the structured editor.
///
/// Wildcard and existence filters are read-only in the structured view;
/// importing a query that uses them yields [`BuilderError::RawOnly`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuilderOp {
    /// Exact match.
    Eq,
    /// Negated exact match.
    NotEq,
    /// Match any value in the set.
    In,
    /// Match no value in the set.
    NotIn,
}

impl BuilderOp {
    fn negated(self) -> bool {
        matches!(self, Self::NotEq | Self::NotIn)
    }

    fn set_style(self) -> Self {
        if self.negated() {
            Self::NotIn
        } else {
            Self::In
        }
    }
}

/// One editable filter row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuilderFilter {
    /// The field name.
    pub field: String,
    /// The operator.
    pub op: BuilderOp,
    /// Sorted, deduplicated values.
    pub values: Vec<String>,
}

/// Builder session state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuilderState {
    /// The entity being queried.
    pub entity: String,
    /// Filter rows in insertion order.
    pub filters: Vec<BuilderFilter>,
    /// Whether the structured editor is shown.
    pub editor_visible: bool,
}

/// Events delivered by the hosting view, one at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BuilderEvent {
    /// Show/hide the structured editor; no data change.
    Toggle,
    /// Switch entity; resets the filter list, since the field vocabulary
    /// changes with it.
    SetEntity {
        /// The new entity.
        entity: String,
    },
    /// Append a filter row.
    AddFilter {
        /// Field name.
        field: String,
        /// Operator.
        op: BuilderOp,
        /// Values (at least one).
        values: Vec<String>,
    },
    /// Remove the filter row at an index.
    RemoveFilter {
        /// Zero-based row index.
        index: usize,
    },
}

/// Errors from builder event application or query import.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuilderError {
    /// The entity is not in the catalog.
    #[error("unknown entity '{0}'")]
    UnknownEntity(String),

    /// The field is not in the target entity's schema.
    #[error("unknown field '{field}' for entity '{entity}'")]
    UnknownField {
        /// The rejected field.
        field: String,
        /// The target entity.
        entity: String,
    },

    /// A filter needs at least one value.
    #[error("filter values must not be empty")]
    EmptyValues,

    /// No filter row at the given index.
    #[error("no filter at index {0}")]
    NoSuchFilter(usize),

    /// The query uses syntax the structured editor cannot represent.
    #[error("query uses {0}; switch to raw mode to edit it")]
    RawOnly(String),

    /// The raw query did not parse.
    #[error(transparent)]
    Parse(#[from] CompileError),
}

impl BuilderState {
    /// Fresh state for a view session.
    #[must_use]
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            filters: Vec::new(),
            editor_visible: false,
        }
    }

    /// Imports a parsed query into builder state.
    ///
    /// # Errors
    ///
    /// Returns [`BuilderError::RawOnly`] when the query contains wildcard
    /// or existence filters, which the structured editor cannot edit.
    pub fn from_query(query: &Query) -> Result<Self, BuilderError> {
        let mut filters = Vec::with_capacity(query.filters.len());
        for clause in &query.filters {
            let op = match clause.op {
                FilterOp::Eq => BuilderOp::Eq,
                FilterOp::NotEq => BuilderOp::NotEq,
                FilterOp::In => BuilderOp::In,
                FilterOp::NotIn => BuilderOp::NotIn,
                FilterOp::WildcardSuffix | FilterOp::WildcardPrefixSuffix => {
                    return Err(BuilderError::RawOnly("wildcard filters".to_string()));
                }
                FilterOp::Exists => {
                    return Err(BuilderError::RawOnly("existence filters".to_string()));
                }
            };
            filters.push(BuilderFilter {
                field: clause.field.clone(),
                op,
                values: normalized_values(clause.values.clone()),
            });
        }

        Ok(Self {
            entity: query.entity.clone(),
            filters,
            editor_visible: false,
        })
    }

    /// Parses a raw SRQL string into builder state.
    ///
    /// # Errors
    ///
    /// Returns a parse error or [`BuilderError::RawOnly`].
    pub fn parse(input: &str) -> Result<Self, BuilderError> {
        let query = parse_query(input)?;
        Self::from_query(&query)
    }

    /// Serializes the state back into a canonical SRQL string ("apply").
    #[must_use]
    pub fn serialize(&self) -> String {
        let mut out = format!("in:{}", self.entity);
        let mut seen: Vec<&BuilderFilter> = Vec::new();

        for filter in &self.filters {
            if seen.contains(&filter) {
                continue;
            }
            seen.push(filter);

            let negation = if filter.op.negated() { "!" } else { "" };
            match filter.op {
                BuilderOp::Eq | BuilderOp::NotEq => {
                    out.push_str(&format!(
                        " {negation}{}:{}",
                        filter.field,
                        quote_if_needed(&filter.values[0])
                    ));
                }
                BuilderOp::In | BuilderOp::NotIn => {
                    let rendered: Vec<String> =
                        filter.values.iter().map(|v| quote_if_needed(v)).collect();
                    out.push_str(&format!(
                        " {negation}{}:({})",
                        filter.field,
                        rendered.join(",")
                    ));
                }
            }
        }

        out
    }
}

/// Applies one UI event, returning the next state.
///
/// # Errors
///
/// Returns a [`BuilderError`] for unknown entities/fields, empty value
/// lists, or out-of-range row indexes; the input state is untouched.
pub fn apply_event(
    state: &BuilderState,
    event: BuilderEvent,
    catalog: &SchemaCatalog,
) -> Result<BuilderState, BuilderError> {
    let mut next = state.clone();

    match event {
        BuilderEvent::Toggle => {
            next.editor_visible = !next.editor_visible;
        }
        BuilderEvent::SetEntity { entity } => {
            if catalog.entity(&entity).is_none() {
                return Err(BuilderError::UnknownEntity(entity));
            }
            next.entity = entity;
            next.filters.clear();
        }
        BuilderEvent::AddFilter { field, op, values } => {
            let schema = catalog
                .entity(&next.entity)
                .ok_or_else(|| BuilderError::UnknownEntity(next.entity.clone()))?;
            if !schema.has_field(&field) {
                return Err(BuilderError::UnknownField {
                    field,
                    entity: next.entity.clone(),
                });
            }
            let values = normalized_values(values);
            if values.is_empty() {
                return Err(BuilderError::EmptyValues);
            }
            merge_into(&mut next.filters, field, op, values);
        }
        BuilderEvent::RemoveFilter { index } => {
            if index >= next.filters.len() {
                return Err(BuilderError::NoSuchFilter(index));
            }
            next.filters.remove(index);
        }
    }

    Ok(next)
}

/// Same-field, same-polarity additions accumulate into one set clause,
/// mirroring how the parser merges repeated filter tokens.
fn merge_into(filters: &mut Vec<BuilderFilter>, field: String, op: BuilderOp, values: Vec<String>) {
    let negated = op.negated();
    if let Some(existing) = filters
        .iter_mut()
        .find(|f| f.field == field && f.op.negated() == negated)
    {
        for value in values {
            if !existing.values.contains(&value) {
                existing.values.push(value);
            }
        }
        existing.values.sort();
        if existing.values.len() > 1 {
            existing.op = existing.op.set_style();
        }
        return;
    }

    let op = if values.len() > 1 { op.set_style() } else { op };
    filters.push(BuilderFilter { field, op, values });
}

fn normalized_values(mut values: Vec<String>) -> Vec<String> {
    values.sort();
    values.dedup();
    values
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> SchemaCatalog {
        SchemaCatalog::with_defaults()
    }

    fn add(
        state: &BuilderState,
        field: &str,
        op: BuilderOp,
        values: &[&str],
    ) -> Result<BuilderState, BuilderError> {
        apply_event(
            state,
            BuilderEvent::AddFilter {
                field: field.to_string(),
                op,
                values: values.iter().map(ToString::to_string).collect(),
            },
            &catalog(),
        )
    }

    #[test]
    fn test_toggle_changes_only_visibility() {
        let state = BuilderState::new("logs");
        let toggled = apply_event(&state, BuilderEvent::Toggle, &catalog()).unwrap();
        assert!(toggled.editor_visible);
        assert_eq!(toggled.entity, state.entity);
        assert_eq!(toggled.filters, state.filters);

        let back = apply_event(&toggled, BuilderEvent::Toggle, &catalog()).unwrap();
        assert!(!back.editor_visible);
    }

    #[test]
    fn test_set_entity_resets_filters() {
        let state = BuilderState::new("logs");
        let state = add(&state, "severity_text", BuilderOp::Eq, &["error"]).unwrap();
        assert_eq!(state.filters.len(), 1);

        let state = apply_event(
            &state,
            BuilderEvent::SetEntity {
                entity: "traces".to_string(),
            },
            &catalog(),
        )
        .unwrap();
        assert_eq!(state.entity, "traces");
        assert!(state.filters.is_empty());
    }

    #[test]
    fn test_set_entity_rejects_unknown() {
        let state = BuilderState::new("logs");
        let err = apply_event(
            &state,
            BuilderEvent::SetEntity {
                entity: "devices".to_string(),
            },
            &catalog(),
        )
        .unwrap_err();
        assert_eq!(err, BuilderError::UnknownEntity("devices".to_string()));
    }

    #[test]
    fn test_add_filter_rejects_unknown_field() {
        let state = BuilderState::new("logs");
        let err = add(&state, "hostname", BuilderOp::Eq, &["web1"]).unwrap_err();
        assert!(matches!(err, BuilderError::UnknownField { .. }));
    }

    #[test]
    fn test_add_filter_rejects_empty_values() {
        let state = BuilderState::new("logs");
        let err = add(&state, "severity_text", BuilderOp::In, &[]).unwrap_err();
        assert_eq!(err, BuilderError::EmptyValues);
    }

    #[test]
    fn test_add_filter_sorts_and_dedupes_values() {
        let state = BuilderState::new("logs");
        let state = add(
            &state,
            "severity_text",
            BuilderOp::In,
            &["fatal", "error", "fatal"],
        )
        .unwrap();
        assert_eq!(state.filters[0].values, vec!["error", "fatal"]);
    }

    #[test]
    fn test_add_filter_merges_same_field() {
        let state = BuilderState::new("logs");
        let state = add(&state, "severity_text", BuilderOp::Eq, &["fatal"]).unwrap();
        let state = add(&state, "severity_text", BuilderOp::Eq, &["error"]).unwrap();

        assert_eq!(state.filters.len(), 1);
        assert_eq!(state.filters[0].op, BuilderOp::In);
        assert_eq!(state.filters[0].values, vec!["error", "fatal"]);
    }

    #[test]
    fn test_remove_filter() {
        let state = BuilderState::new("logs");
        let state = add(&state, "severity_text", BuilderOp::Eq, &["error"]).unwrap();
        let state = add(&state, "service_name", BuilderOp::Eq, &["api"]).unwrap();

        let state =
            apply_event(&state, BuilderEvent::RemoveFilter { index: 0 }, &catalog()).unwrap();
        assert_eq!(state.filters.len(), 1);
        assert_eq!(state.filters[0].field, "service_name");

        let err = apply_event(&state, BuilderEvent::RemoveFilter { index: 5 }, &catalog())
            .unwrap_err();
        assert_eq!(err, BuilderError::NoSuchFilter(5));
    }

    #[test]
    fn test_events_do_not_mutate_input_state() {
        let state = BuilderState::new("logs");
        let _ = add(&state, "severity_text", BuilderOp::Eq, &["error"]).unwrap();
        assert!(state.filters.is_empty());
    }

    #[test]
    fn test_serialize_canonical_form() {
        let state = BuilderState::new("logs");
        let state = add(
            &state,
            "severity_text",
            BuilderOp::In,
            &["fatal", "error"],
        )
        .unwrap();
        let state = add(&state, "service_name", BuilderOp::NotEq, &["smoketest"]).unwrap();

        assert_eq!(
            state.serialize(),
            "in:logs severity_text:(error,fatal) !service_name:smoketest"
        );
    }

    #[test]
    fn test_serialize_quotes_reserved_values() {
        let state = BuilderState::new("logs");
        let state = add(&state, "body", BuilderOp::Eq, &["connection refused"]).unwrap();
        assert_eq!(state.serialize(), "in:logs body:\"connection refused\"");
    }

    #[test]
    fn test_round_trip_for_reachable_states() {
        let state = BuilderState::new("logs");
        let state = add(
            &state,
            "severity_text",
            BuilderOp::In,
            &["fatal", "error"],
        )
        .unwrap();
        let state = add(&state, "service_name", BuilderOp::Eq, &["api"]).unwrap();
        let state = add(&state, "body", BuilderOp::NotIn, &["ping", "pong"]).unwrap();

        let reparsed = BuilderState::parse(&state.serialize()).unwrap();
        assert_eq!(reparsed.entity, state.entity);
        assert_eq!(reparsed.filters, state.filters);
    }

    #[test]
    fn test_serialize_idempotent() {
        let state = BuilderState::new("logs");
        let state = add(
            &state,
            "severity_text",
            BuilderOp::In,
            &["fatal", "error", "FATAL"],
        )
        .unwrap();

        let serialized = state.serialize();
        let reparsed = BuilderState::parse(&serialized).unwrap();
        assert_eq!(reparsed.serialize(), serialized);
    }

    #[test]
    fn test_hand_typed_wildcards_are_raw_only() {
        let err = BuilderState::parse("in:logs service_name:auth%").unwrap_err();
        assert!(matches!(err, BuilderError::RawOnly(_)));

        let err = BuilderState::parse("in:logs trace_id:*").unwrap_err();
        assert!(matches!(err, BuilderError::RawOnly(_)));
    }

    #[test]
    fn test_unparseable_query_propagates_parse_error() {
        let err = BuilderState::parse("in:logs time:").unwrap_err();
        assert!(matches!(err, BuilderError::Parse(_)));
    }
}
