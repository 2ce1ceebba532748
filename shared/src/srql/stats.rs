//! Parser for the `stats:"..."` aggregate mini-language.
//!
//! The grammar is closed on purpose: anything outside it is rejected
//! instead of being passed through to SQL, so the compiled output stays
//! injection-safe and statically analyzable.
//!
//! ```text
//! stats    := expr 'as' alias (',' expr 'as' alias)*
//! expr     := count '(' ')'
//!           | (sum|avg|min|max) '(' field ')'
//!           | (sum|count) '(' if '(' cond ',' 1 ',' 0 ')' ')'
//! cond     := term ((OR|AND) term)*
//! term     := field '=' '\'' literal '\''
//! ```

use super::ast::{AggCall, AggregateExpr, CondTerm, ConditionalExpr, LogicalOp};
use super::error::CompileError;
use nom::branch::alt;
use nom::bytes::complete::{tag_no_case, take_while, take_while1};
use nom::character::complete::{char, multispace0, multispace1};
use nom::combinator::value;
use nom::multi::{many0, separated_list1};
use nom::sequence::delimited;
use nom::{IResult, Parser};

/// Parses the contents of a `stats:"..."` clause.
///
/// # Errors
///
/// Returns [`CompileError::UnsupportedExpression`] for anything outside the
/// grammar, a missing `as <alias>`, or a duplicate alias.
pub fn parse_stats(input: &str) -> Result<Vec<AggregateExpr>, CompileError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(CompileError::UnsupportedExpression(
            "empty stats clause".to_string(),
        ));
    }

    let exprs = match stats_list(trimmed) {
        Ok((rest, exprs)) if rest.trim().is_empty() => exprs,
        Ok((rest, _)) => {
            return Err(CompileError::UnsupportedExpression(format!(
                "unexpected trailing content '{}'",
                rest.trim()
            )));
        }
        Err(_) => {
            return Err(CompileError::UnsupportedExpression(format!(
                "'{trimmed}' is not a supported aggregate expression"
            )));
        }
    };

    let mut seen = std::collections::BTreeSet::new();
    for expr in &exprs {
        if !seen.insert(expr.alias.as_str()) {
            return Err(CompileError::UnsupportedExpression(format!(
                "duplicate alias '{}'",
                expr.alias
            )));
        }
    }

    Ok(exprs)
}

fn stats_list(input: &str) -> IResult<&str, Vec<AggregateExpr>> {
    separated_list1(delimited(multispace0, char(','), multispace0), expr_alias).parse(input)
}

fn expr_alias(input: &str) -> IResult<&str, AggregateExpr> {
    let (input, call) = agg_call(input)?;
    let (input, _) = multispace1(input)?;
    let (input, _) = tag_no_case("as").parse(input)?;
    let (input, _) = multispace1(input)?;
    let (input, alias) = identifier(input)?;
    Ok((
        input,
        AggregateExpr {
            call,
            alias: alias.to_string(),
        },
    ))
}

fn agg_call(input: &str) -> IResult<&str, AggCall> {
    alt((
        sum_if, count_if, count_call, sum_call, avg_call, min_call, max_call,
    ))
    .parse(input)
}

fn count_call(input: &str) -> IResult<&str, AggCall> {
    let (input, _) = tag_no_case("count").parse(input)?;
    let (input, _) =
        (multispace0, char('('), multispace0, char(')')).parse(input)?;
    Ok((input, AggCall::Count))
}

fn sum_call(input: &str) -> IResult<&str, AggCall> {
    let (input, field) = field_call("sum", input)?;
    Ok((input, AggCall::Sum(field)))
}

fn avg_call(input: &str) -> IResult<&str, AggCall> {
    let (input, field) = field_call("avg", input)?;
    Ok((input, AggCall::Avg(field)))
}

fn min_call(input: &str) -> IResult<&str, AggCall> {
    let (input, field) = field_call("min", input)?;
    Ok((input, AggCall::Min(field)))
}

fn max_call(input: &str) -> IResult<&str, AggCall> {
    let (input, field) = field_call("max", input)?;
    Ok((input, AggCall::Max(field)))
}

fn field_call<'a>(name: &'static str, input: &'a str) -> IResult<&'a str, String> {
    let (input, _) = tag_no_case(name).parse(input)?;
    let (input, _) = (multispace0, char('('), multispace0).parse(input)?;
    let (input, field) = identifier(input)?;
    let (input, _) = (multispace0, char(')')).parse(input)?;
    Ok((input, field.to_lowercase()))
}

fn sum_if(input: &str) -> IResult<&str, AggCall> {
    let (input, cond) = conditional_call("sum", input)?;
    Ok((input, AggCall::SumIf(cond)))
}

fn count_if(input: &str) -> IResult<&str, AggCall> {
    let (input, cond) = conditional_call("count", input)?;
    Ok((input, AggCall::CountIf(cond)))
}

fn conditional_call<'a>(
    name: &'static str,
    input: &'a str,
) -> IResult<&'a str, ConditionalExpr> {
    let (input, _) = tag_no_case(name).parse(input)?;
    let (input, _) = (multispace0, char('('), multispace0).parse(input)?;
    let (input, cond) = if_expr(input)?;
    let (input, _) = (multispace0, char(')')).parse(input)?;
    Ok((input, cond))
}

fn if_expr(input: &str) -> IResult<&str, ConditionalExpr> {
    let (input, _) = tag_no_case("if").parse(input)?;
    let (input, _) = (multispace0, char('('), multispace0).parse(input)?;
    let (input, cond) = condition(input)?;
    let (input, _) = (
        multispace0,
        char(','),
        multispace0,
        char('1'),
        multispace0,
        char(','),
        multispace0,
        char('0'),
        multispace0,
        char(')'),
    )
        .parse(input)?;
    Ok((input, cond))
}

fn condition(input: &str) -> IResult<&str, ConditionalExpr> {
    let (input, first) = cond_term(input)?;
    let (input, rest) =
        many0((delimited(multispace1, logical_op, multispace1), cond_term)).parse(input)?;
    Ok((input, ConditionalExpr { first, rest }))
}

fn logical_op(input: &str) -> IResult<&str, LogicalOp> {
    alt((
        value(LogicalOp::Or, tag_no_case("OR")),
        value(LogicalOp::And, tag_no_case("AND")),
    ))
    .parse(input)
}

fn cond_term(input: &str) -> IResult<&str, CondTerm> {
    let (input, field) = identifier(input)?;
    let (input, _) = delimited(multispace0, char('='), multispace0).parse(input)?;
    let (input, literal) = quoted_literal(input)?;
    Ok((
        input,
        CondTerm {
            field: field.to_lowercase(),
            value: literal,
        },
    ))
}

fn quoted_literal(input: &str) -> IResult<&str, String> {
    let (input, inner) =
        delimited(char('\''), take_while(|c| c != '\''), char('\'')).parse(input)?;
    Ok((input, inner.to_string()))
}

fn identifier(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || c == '_').parse(input)
}
