//! Field-filter parsing.
//!
//! Parses the value portion of a `[!]field:<values>` token into a structured
//! predicate, and merges repeated same-field filters into a single
//! `In`-style clause.

use super::ast::{FilterClause, FilterOp};
use super::error::CompileError;
use super::token::unescape_quoted;

/// Parses a field-filter token into a [`FilterClause`].
///
/// # Errors
///
/// Returns a [`CompileError::Syntax`] for empty value lists, malformed
/// wildcard shapes, or negated wildcard/existence filters.
pub fn parse_filter(key: &str, rest: &str, offset: usize) -> Result<FilterClause, CompileError> {
    let (field_raw, negated) = match key.strip_prefix('!') {
        Some(stripped) => (stripped, true),
        None => (key, false),
    };

    let field = field_raw.trim().to_lowercase();
    if field.is_empty() {
        return Err(CompileError::syntax(offset, "missing field name"));
    }
    if !field
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
    {
        return Err(CompileError::syntax(
            offset,
            format!("invalid field name '{field}'"),
        ));
    }

    let trimmed = rest.trim();

    if let Some(inner) = trimmed
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
    {
        let items = split_csv(inner);
        return build_set_clause(field, items, negated, offset);
    }

    let items = split_csv(trimmed);
    if items.len() > 1 {
        return build_set_clause(field, items, negated, offset);
    }

    let Some((value, was_quoted)) = items.into_iter().next() else {
        return Err(CompileError::syntax(offset, "empty value list"));
    };

    if was_quoted {
        let op = if negated { FilterOp::NotEq } else { FilterOp::Eq };
        return Ok(FilterClause {
            field,
            op,
            values: vec![value],
        });
    }

    if value == "*" {
        if negated {
            return Err(CompileError::syntax(
                offset,
                "negated existence filters are not supported",
            ));
        }
        return Ok(FilterClause {
            field,
            op: FilterOp::Exists,
            values: vec![],
        });
    }

    if value.contains('%') {
        if negated {
            return Err(CompileError::syntax(
                offset,
                "negated wildcard filters are not supported",
            ));
        }
        let op = if value.len() >= 2 && value.starts_with('%') && value.ends_with('%') {
            FilterOp::WildcardPrefixSuffix
        } else if value.len() >= 2 && value.ends_with('%') {
            FilterOp::WildcardSuffix
        } else {
            return Err(CompileError::syntax(
                offset,
                format!("unsupported wildcard shape '{value}'; use 'v%' or '%v%'"),
            ));
        };
        return Ok(FilterClause {
            field,
            op,
            values: vec![value],
        });
    }

    let op = if negated { FilterOp::NotEq } else { FilterOp::Eq };
    Ok(FilterClause {
        field,
        op,
        values: vec![value],
    })
}

fn build_set_clause(
    field: String,
    items: Vec<(String, bool)>,
    negated: bool,
    offset: usize,
) -> Result<FilterClause, CompileError> {
    if items.is_empty() {
        return Err(CompileError::syntax(offset, "empty value list"));
    }

    let mut values = Vec::with_capacity(items.len());
    for (value, was_quoted) in items {
        if !was_quoted && value.contains('%') {
            return Err(CompileError::syntax(
                offset,
                "wildcards are not allowed inside value lists",
            ));
        }
        values.push(value);
    }

    let op = if negated { FilterOp::NotIn } else { FilterOp::In };
    Ok(FilterClause { field, op, values })
}

/// Splits on top-level commas, respecting quoted spans; empty items are
/// dropped, quoted items are unescaped.
fn split_csv(input: &str) -> Vec<(String, bool)> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut in_quote = false;
    let mut escaped = false;

    for ch in input.chars() {
        if in_quote {
            current.push(ch);
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_quote = false;
            }
            continue;
        }

        match ch {
            '"' => {
                in_quote = true;
                current.push(ch);
            }
            ',' => {
                push_item(&mut items, &mut current);
            }
            _ => current.push(ch),
        }
    }
    push_item(&mut items, &mut current);

    items
}

fn push_item(items: &mut Vec<(String, bool)>, current: &mut String) {
    let raw = std::mem::take(current);
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return;
    }
    match unescape_quoted(trimmed) {
        Some(value) => items.push((value, true)),
        None => items.push((trimmed.to_string(), false)),
    }
}

/// Merges repeated same-field filters.
///
/// Same-polarity `Eq`/`In` clauses on one field accumulate into a single
/// `In` clause (`NotEq`/`NotIn` into `NotIn`), preserving first-seen value
/// order and dropping duplicate values. Wildcard and `Exists` clauses are
/// never merged.
#[must_use]
pub fn merge_filters(filters: Vec<FilterClause>) -> Vec<FilterClause> {
    let mut merged: Vec<FilterClause> = Vec::with_capacity(filters.len());

    for filter in filters {
        let polarity = match filter.op {
            FilterOp::Eq | FilterOp::In => Some(false),
            FilterOp::NotEq | FilterOp::NotIn => Some(true),
            _ => None,
        };

        let Some(negated) = polarity else {
            merged.push(filter);
            continue;
        };

        let existing = merged.iter_mut().find(|candidate| {
            candidate.field == filter.field
                && matches!(
                    (negated, candidate.op),
                    (false, FilterOp::Eq | FilterOp::In) | (true, FilterOp::NotEq | FilterOp::NotIn)
                )
        });

        match existing {
            Some(clause) => {
                for value in filter.values {
                    if !clause.values.contains(&value) {
                        clause.values.push(value);
                    }
                }
                clause.op = if negated { FilterOp::NotIn } else { FilterOp::In };
            }
            None => merged.push(filter),
        }
    }

    merged
}
