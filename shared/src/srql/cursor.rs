//! Opaque keyset-pagination cursor codec.
//!
//! A cursor encodes the sort-key tuple of a boundary row, the direction it
//! was issued for, and a fingerprint of the query shape that produced it.
//! Replaying a cursor against a structurally different query fails closed
//! with [`CompileError::InvalidCursor`] instead of silently returning the
//! wrong page.

use super::ast::{Direction, Query, Sort};
use super::error::CompileError;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fmt::Write as _;
use std::hash::{Hash, Hasher};

/// Decoded pagination cursor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    /// Sort-field value of the boundary row.
    #[serde(rename = "s")]
    pub sort_value: String,
    /// Tie-break id of the boundary row.
    #[serde(rename = "t")]
    pub tie_break: String,
    /// Direction the cursor was issued for.
    #[serde(rename = "d")]
    pub direction: Direction,
    /// Fingerprint of the query shape that produced the cursor.
    #[serde(rename = "f")]
    pub fingerprint: String,
}

impl Cursor {
    /// Encodes the cursor as a URL-safe opaque string.
    ///
    /// # Panics
    ///
    /// Serialization of this plain struct cannot fail.
    #[must_use]
    pub fn encode(&self) -> String {
        let payload = serde_json::to_vec(self).expect("cursor serialization cannot fail");
        URL_SAFE_NO_PAD.encode(payload)
    }

    /// Decodes an opaque cursor string.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError::InvalidCursor`] when the string is not valid
    /// base64 or the payload does not match the cursor layout.
    pub fn decode(raw: &str) -> Result<Self, CompileError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(raw)
            .map_err(|_| CompileError::InvalidCursor("not valid base64".to_string()))?;
        serde_json::from_slice(&bytes)
            .map_err(|_| CompileError::InvalidCursor("payload does not decode".to_string()))
    }
}

/// Fingerprints the shape a cursor is valid for: entity, filters, and the
/// effective sort. Limits and time windows are deliberately excluded; a
/// view may change those without invalidating its position.
#[must_use]
pub fn shape_fingerprint(query: &Query, sort: &Sort) -> String {
    let mut shape = String::new();
    let _ = write!(shape, "{}", query.entity);
    for filter in &query.filters {
        let _ = write!(shape, "|{filter}");
    }
    let _ = write!(shape, "|{sort}");

    let mut hasher = DefaultHasher::new();
    shape.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::srql::ast::SortDir;
    use crate::srql::parse_query;

    fn sort() -> Sort {
        Sort {
            field: "timestamp".to_string(),
            direction: SortDir::Desc,
        }
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let cursor = Cursor {
            sort_value: "2026-08-06T12:00:00Z".to_string(),
            tie_break: "row-42".to_string(),
            direction: Direction::Next,
            fingerprint: "00aabbccddeeff11".to_string(),
        };

        let encoded = cursor.encode();
        let decoded = Cursor::decode(&encoded).unwrap();
        assert_eq!(decoded, cursor);
    }

    #[test]
    fn test_encoded_cursor_is_url_safe() {
        let cursor = Cursor {
            sort_value: "a value with spaces & symbols?/+".to_string(),
            tie_break: "id".to_string(),
            direction: Direction::Prev,
            fingerprint: "f".repeat(16),
        };

        let encoded = cursor.encode();
        assert!(encoded
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            Cursor::decode("!!!not base64!!!"),
            Err(CompileError::InvalidCursor(_))
        ));

        // Valid base64, wrong payload.
        let bogus = URL_SAFE_NO_PAD.encode(b"{\"nope\":1}");
        assert!(matches!(
            Cursor::decode(&bogus),
            Err(CompileError::InvalidCursor(_))
        ));
    }

    #[test]
    fn test_fingerprint_is_stable_for_equal_shapes() {
        let a = parse_query("in:logs severity_text:error sort:timestamp:desc").unwrap();
        let b = parse_query("in:logs severity_text:error sort:timestamp:desc limit:99").unwrap();
        assert_eq!(shape_fingerprint(&a, &sort()), shape_fingerprint(&b, &sort()));
    }

    #[test]
    fn test_fingerprint_ignores_time_window() {
        let a = parse_query("in:logs severity_text:error time:last_2h").unwrap();
        let b = parse_query("in:logs severity_text:error time:last_24h").unwrap();
        assert_eq!(shape_fingerprint(&a, &sort()), shape_fingerprint(&b, &sort()));
    }

    #[test]
    fn test_fingerprint_differs_across_shapes() {
        let base = parse_query("in:logs severity_text:error").unwrap();
        let other_filter = parse_query("in:logs severity_text:fatal").unwrap();
        let other_entity = parse_query("in:traces severity_text:error").unwrap();

        let fp = shape_fingerprint(&base, &sort());
        assert_ne!(fp, shape_fingerprint(&other_filter, &sort()));
        assert_ne!(fp, shape_fingerprint(&other_entity, &sort()));

        let flipped = Sort {
            field: "timestamp".to_string(),
            direction: SortDir::Asc,
        };
        assert_ne!(fp, shape_fingerprint(&base, &flipped));
    }
}
