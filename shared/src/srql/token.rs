//! Lexer and token classifier for SRQL.
//!
//! The lexer splits a raw query string on unquoted whitespace, keeping
//! double-quoted spans (with `\"` and `\\` escapes) and parenthesized value
//! lists inside a single token. The classifier maps each token to a clause
//! of a closed tagged union by its `prefix:` keyword; any unrecognized
//! prefix is a field filter.

use super::ast::{AggFn, AggregateExpr, FilterClause, Sort, SortDir};
use super::error::CompileError;
use super::filter;
use super::stats;
use super::time::{parse_bucket, parse_window, BucketSpan, RelativeWindow};

/// A raw token with its byte offset in the source query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Raw token text (quotes and escapes preserved).
    pub text: String,
    /// Byte offset of the token start in the query string.
    pub offset: usize,
}

/// One classified clause of an SRQL query.
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    /// `in:<entity>`
    Entity(String),
    /// `time:<relative_window>`
    Time(RelativeWindow),
    /// `sort:<field>:<asc|desc>`
    Sort(Sort),
    /// `limit:<n>`
    Limit(i64),
    /// `cursor:<opaque>`
    Cursor(String),
    /// `stats:"<expr> as <alias>[, ...]"`
    Stats(Vec<AggregateExpr>),
    /// `bucket:<duration>`
    Bucket(BucketSpan),
    /// `series:<field>`
    Series(String),
    /// `agg:<fn>`
    Agg(AggFn),
    /// `stream:<true|false>`
    Stream(bool),
    /// `[!]<field>:<values>`
    Filter(FilterClause),
}

impl Clause {
    /// The clause keyword, used for duplicate-clause diagnostics.
    #[must_use]
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Entity(_) => "in",
            Self::Time(_) => "time",
            Self::Sort(_) => "sort",
            Self::Limit(_) => "limit",
            Self::Cursor(_) => "cursor",
            Self::Stats(_) => "stats",
            Self::Bucket(_) => "bucket",
            Self::Series(_) => "series",
            Self::Agg(_) => "agg",
            Self::Stream(_) => "stream",
            Self::Filter(_) => "filter",
        }
    }
}

/// Splits a query string into raw tokens.
///
/// # Errors
///
/// Returns a [`CompileError::Syntax`] with the offending offset for an
/// unterminated quote or an unbalanced parenthesis.
pub fn tokenize(input: &str) -> Result<Vec<Token>, CompileError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut start = 0usize;
    let mut in_quote = false;
    let mut quote_offset = 0usize;
    let mut depth = 0usize;
    let mut paren_offset = 0usize;
    let mut escaped = false;

    for (i, ch) in input.char_indices() {
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

        if ch.is_whitespace() && depth == 0 {
            if !current.is_empty() {
                tokens.push(Token {
                    text: std::mem::take(&mut current),
                    offset: start,
                });
            }
            continue;
        }

        if current.is_empty() {
            start = i;
        }

        match ch {
            '"' => {
                in_quote = true;
                quote_offset = i;
                current.push(ch);
            }
            '(' => {
                depth += 1;
                paren_offset = i;
                current.push(ch);
            }
            ')' => {
                depth = depth.checked_sub(1).ok_or_else(|| {
                    CompileError::syntax(i, "unmatched closing parenthesis")
                })?;
                current.push(ch);
            }
            _ => current.push(ch),
        }
    }

    if in_quote {
        return Err(CompileError::syntax(quote_offset, "unterminated quote"));
    }
    if depth != 0 {
        return Err(CompileError::syntax(paren_offset, "unclosed parenthesis"));
    }

    if !current.is_empty() {
        tokens.push(Token {
            text: current,
            offset: start,
        });
    }

    Ok(tokens)
}

/// Classifies a single token into a [`Clause`].
///
/// # Errors
///
/// Returns a [`CompileError`] for tokens without a `prefix:` shape, empty
/// values, or unparseable clause payloads.
pub fn classify(token: &Token) -> Result<Clause, CompileError> {
    let Some((key, rest)) = token.text.split_once(':') else {
        return Err(CompileError::syntax(
            token.offset,
            format!("expected '<prefix>:<value>', found '{}'", token.text),
        ));
    };

    if key.is_empty() {
        return Err(CompileError::syntax(token.offset, "missing clause prefix"));
    }

    if rest.trim().is_empty() {
        return Err(CompileError::syntax(
            token.offset,
            format!("empty value for '{key}:'"),
        ));
    }

    let lowered = key.to_lowercase();
    match lowered.as_str() {
        "in" => Ok(Clause::Entity(strip_quotes(rest).trim().to_lowercase())),
        "time" => {
            let cleaned: String = strip_quotes(rest)
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect();
            parse_window(&cleaned)
                .map(Clause::Time)
                .ok_or_else(|| {
                    CompileError::syntax(
                        token.offset,
                        format!("unsupported time window '{rest}'"),
                    )
                })
        }
        "sort" => parse_sort(rest, token.offset).map(Clause::Sort),
        "limit" => rest
            .trim()
            .parse::<i64>()
            .map(Clause::Limit)
            .map_err(|_| {
                CompileError::syntax(token.offset, format!("invalid limit '{rest}'"))
            }),
        "cursor" => Ok(Clause::Cursor(rest.trim().to_string())),
        "stats" => {
            let inner = strip_quotes(rest);
            stats::parse_stats(&inner).map(Clause::Stats)
        }
        "bucket" => parse_bucket(rest).map(Clause::Bucket).ok_or_else(|| {
            CompileError::syntax(token.offset, format!("unsupported bucket span '{rest}'"))
        }),
        "series" => Ok(Clause::Series(rest.trim().to_lowercase())),
        "agg" => rest
            .trim()
            .parse::<AggFn>()
            .map(Clause::Agg)
            .map_err(|message| CompileError::syntax(token.offset, message)),
        "stream" => match rest.trim().to_lowercase().as_str() {
            "true" => Ok(Clause::Stream(true)),
            "false" => Ok(Clause::Stream(false)),
            other => Err(CompileError::syntax(
                token.offset,
                format!("stream expects true or false, found '{other}'"),
            )),
        },
        _ => filter::parse_filter(key, rest, token.offset).map(Clause::Filter),
    }
}

fn parse_sort(rest: &str, offset: usize) -> Result<Sort, CompileError> {
    let mut parts = rest.splitn(2, ':');
    let field = parts.next().unwrap_or("").trim().to_lowercase();
    if field.is_empty() {
        return Err(CompileError::syntax(offset, "sort requires a field"));
    }

    let direction = match parts.next().map(str::trim) {
        None => SortDir::default(),
        Some(dir) => match dir.to_lowercase().as_str() {
            "asc" => SortDir::Asc,
            "desc" => SortDir::Desc,
            other => {
                return Err(CompileError::syntax(
                    offset,
                    format!("sort direction must be asc or desc, found '{other}'"),
                ));
            }
        },
    };

    Ok(Sort { field, direction })
}

/// Unescapes a well-formed double-quoted span; `None` if `s` is not quoted.
#[must_use]
pub(crate) fn unescape_quoted(s: &str) -> Option<String> {
    let inner = s.strip_prefix('"')?.strip_suffix('"')?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some(next) => out.push(next),
                None => return None,
            }
        } else {
            out.push(ch);
        }
    }
    Some(out)
}

/// Unquotes if quoted, otherwise returns the raw text.
#[must_use]
pub(crate) fn strip_quotes(s: &str) -> String {
    let trimmed = s.trim();
    unescape_quoted(trimmed).unwrap_or_else(|| trimmed.to_string())
}

/// Quotes a value when it contains reserved characters, escaping `\` and `"`.
#[must_use]
pub(crate) fn quote_if_needed(value: &str) -> String {
    let reserved = value.is_empty()
        || value == "*"
        || value
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, ',' | ':' | '(' | ')' | '"' | '\\' | '%'));
    if !reserved {
        return value.to_string();
    }

    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        if ch == '"' || ch == '\\' {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(input: &str) -> Vec<String> {
        tokenize(input).unwrap().into_iter().map(|t| t.text).collect()
    }

    #[test]
    fn test_tokenize_splits_on_whitespace() {
        assert_eq!(
            texts("in:logs severity_text:error limit:20"),
            vec!["in:logs", "severity_text:error", "limit:20"]
        );
    }

    #[test]
    fn test_tokenize_keeps_quoted_spans_together() {
        assert_eq!(
            texts(r#"in:logs body:"connection refused" limit:5"#),
            vec!["in:logs", r#"body:"connection refused""#, "limit:5"]
        );
    }

    #[test]
    fn test_tokenize_keeps_paren_lists_together() {
        assert_eq!(
            texts("in:logs severity_text:(fatal, error) sort:timestamp:desc"),
            vec!["in:logs", "severity_text:(fatal, error)", "sort:timestamp:desc"]
        );
    }

    #[test]
    fn test_tokenize_preserves_escapes_inside_quotes() {
        assert_eq!(
            texts(r#"body:"say \"hi\"""#),
            vec![r#"body:"say \"hi\"""#]
        );
    }

    #[test]
    fn test_tokenize_unterminated_quote_reports_offset() {
        let err = tokenize(r#"in:logs body:"unfinished"#).unwrap_err();
        match err {
            CompileError::Syntax { offset, ref message } => {
                assert_eq!(offset, 13);
                assert!(message.contains("unterminated"));
            }
            other => panic!("expected syntax error, got {other:?}"),
        }
    }

    #[test]
    fn test_tokenize_unbalanced_parens() {
        assert!(matches!(
            tokenize("in:logs severity_text:(fatal"),
            Err(CompileError::Syntax { .. })
        ));
        assert!(matches!(
            tokenize("in:logs severity_text:fatal)"),
            Err(CompileError::Syntax { .. })
        ));
    }

    #[test]
    fn test_classify_entity_and_limit() {
        let clause = classify(&Token {
            text: "in:Logs".to_string(),
            offset: 0,
        })
        .unwrap();
        assert_eq!(clause, Clause::Entity("logs".to_string()));

        let clause = classify(&Token {
            text: "limit:50".to_string(),
            offset: 0,
        })
        .unwrap();
        assert_eq!(clause, Clause::Limit(50));
    }

    #[test]
    fn test_classify_sort_defaults_to_desc() {
        let clause = classify(&Token {
            text: "sort:timestamp".to_string(),
            offset: 0,
        })
        .unwrap();
        assert_eq!(
            clause,
            Clause::Sort(Sort {
                field: "timestamp".to_string(),
                direction: SortDir::Desc,
            })
        );
    }

    #[test]
    fn test_classify_sort_rejects_bad_direction() {
        let err = classify(&Token {
            text: "sort:timestamp:sideways".to_string(),
            offset: 3,
        })
        .unwrap_err();
        assert!(matches!(err, CompileError::Syntax { offset: 3, .. }));
    }

    #[test]
    fn test_classify_empty_value_is_syntax_error() {
        for text in ["time:", "limit:", "sort:", "severity_text:"] {
            let err = classify(&Token {
                text: text.to_string(),
                offset: 8,
            })
            .unwrap_err();
            assert!(
                matches!(err, CompileError::Syntax { offset: 8, .. }),
                "expected syntax error for '{text}'"
            );
        }
    }

    #[test]
    fn test_classify_bare_word_is_syntax_error() {
        let err = classify(&Token {
            text: "severity".to_string(),
            offset: 0,
        })
        .unwrap_err();
        assert!(matches!(err, CompileError::Syntax { .. }));
    }

    #[test]
    fn test_classify_time_accepts_quoted_spelled_windows() {
        let clause = classify(&Token {
            text: r#"time:"14 days""#.to_string(),
            offset: 0,
        })
        .unwrap();
        match clause {
            Clause::Time(window) => assert_eq!(window.as_seconds(), 14 * 86_400),
            other => panic!("expected time clause, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_stream() {
        let clause = classify(&Token {
            text: "stream:true".to_string(),
            offset: 0,
        })
        .unwrap();
        assert_eq!(clause, Clause::Stream(true));

        assert!(classify(&Token {
            text: "stream:yes".to_string(),
            offset: 0,
        })
        .is_err());
    }

    #[test]
    fn test_classify_unknown_prefix_is_field_filter() {
        let clause = classify(&Token {
            text: "service_name:api".to_string(),
            offset: 0,
        })
        .unwrap();
        assert!(matches!(clause, Clause::Filter(_)));
    }

    #[test]
    fn test_unescape_quoted() {
        assert_eq!(unescape_quoted(r#""a b""#), Some("a b".to_string()));
        assert_eq!(unescape_quoted(r#""say \"hi\"""#), Some(r#"say "hi""#.to_string()));
        assert_eq!(unescape_quoted(r#""back\\slash""#), Some(r"back\slash".to_string()));
        assert_eq!(unescape_quoted("plain"), None);
    }

    #[test]
    fn test_quote_if_needed() {
        assert_eq!(quote_if_needed("plain"), "plain");
        assert_eq!(quote_if_needed("a b"), "\"a b\"");
        assert_eq!(quote_if_needed("a,b"), "\"a,b\"");
        assert_eq!(quote_if_needed("100%"), "\"100%\"");
        assert_eq!(quote_if_needed("*"), "\"*\"");
        assert_eq!(quote_if_needed(r#"q"q"#), r#""q\"q""#);
    }
}
