//! nom parser for formula text.
//!
//! Precedence, loosest first: `+ -`, `* /`, unary `+ -`, then `^` / `**`
//! (right-associative, so `-2^2 == -4` and `2^3^2 == 512`).

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{alpha1, alphanumeric1, char, multispace0},
    combinator::recognize,
    error::ErrorKind,
    multi::many0,
    number::complete::double,
    sequence::pair,
    IResult, Parser,
};

use super::ast::{Ast, BinaryOp, UnaryOp};
use crate::error::{FitError, Result};

/// Parse a complete expression.
///
/// # Errors
///
/// * `FitError::EmptyExpression` for blank text
/// * `FitError::ParseError` with the byte offset of the problem otherwise
pub fn parse(text: &str) -> Result<Ast> {
    if text.trim().is_empty() {
        return Err(FitError::EmptyExpression);
    }
    let position = |rest: &str| text.len() - rest.len();
    match sum(text) {
        Ok((rest, ast)) => {
            let trailing = rest.trim_start();
            if trailing.is_empty() {
                Ok(ast)
            } else {
                Err(FitError::ParseError {
                    message: format!("unexpected input '{}'", trailing),
                    position: position(trailing),
                })
            }
        }
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(FitError::ParseError {
            message: if e.input.trim().is_empty() {
                "unexpected end of expression".to_string()
            } else {
                format!("unexpected input '{}'", e.input.trim())
            },
            position: position(e.input),
        }),
        Err(nom::Err::Incomplete(_)) => Err(FitError::ParseError {
            message: "unexpected end of expression".to_string(),
            position: text.len(),
        }),
    }
}

fn fail(input: &str, kind: ErrorKind) -> nom::Err<nom::error::Error<&str>> {
    nom::Err::Error(nom::error::Error::new(input, kind))
}

fn ws(input: &str) -> IResult<&str, &str> {
    multispace0.parse(input)
}

/// Parse an identifier (variable or function name)
fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0(alt((alphanumeric1, tag("_")))),
    ))
    .parse(input)
}

/// `term (('+' | '-') term)*`, folded to the left.
fn sum(input: &str) -> IResult<&str, Ast> {
    let (mut input, mut acc) = term(input)?;
    loop {
        let (rest, _) = ws(input)?;
        let op = match rest.chars().next() {
            Some('+') => BinaryOp::Add,
            Some('-') => BinaryOp::Sub,
            _ => return Ok((input, acc)),
        };
        let (rest, rhs) = term(&rest[1..])?;
        acc = Ast::Binary(op, Box::new(acc), Box::new(rhs));
        input = rest;
    }
}

/// `unary (('*' | '/') unary)*`, folded to the left.
fn term(input: &str) -> IResult<&str, Ast> {
    let (mut input, mut acc) = unary(input)?;
    loop {
        let (rest, _) = ws(input)?;
        let op = match rest.chars().next() {
            Some('*') if !rest.starts_with("**") => BinaryOp::Mul,
            Some('/') => BinaryOp::Div,
            _ => return Ok((input, acc)),
        };
        let (rest, rhs) = unary(&rest[1..])?;
        acc = Ast::Binary(op, Box::new(acc), Box::new(rhs));
        input = rest;
    }
}

/// Parse a unary expression (-expr, +expr)
fn unary(input: &str) -> IResult<&str, Ast> {
    let (input, _) = ws(input)?;
    if let Ok((rest, _)) = char::<_, nom::error::Error<_>>('-').parse(input) {
        let (rest, operand) = unary(rest)?;
        return Ok((rest, Ast::Unary(UnaryOp::Neg, Box::new(operand))));
    }
    if let Ok((rest, _)) = char::<_, nom::error::Error<_>>('+').parse(input) {
        return unary(rest);
    }
    power(input)
}

/// Parse a power expression (expr ^ expr, expr ** expr)
fn power(input: &str) -> IResult<&str, Ast> {
    let (input, base) = primary(input)?;
    let (rest, _) = ws(input)?;
    let after_op = alt((tag::<_, _, nom::error::Error<_>>("**"), tag("^"))).parse(rest);
    match after_op {
        Ok((rest, _)) => {
            let (rest, exponent) = unary(rest)?;
            Ok((
                rest,
                Ast::Binary(BinaryOp::Pow, Box::new(base), Box::new(exponent)),
            ))
        }
        Err(_) => Ok((input, base)),
    }
}

/// Number, string literal, identifier, call, or parenthesized expression
fn primary(input: &str) -> IResult<&str, Ast> {
    let (input, _) = ws(input)?;
    match input.chars().next() {
        Some('(') => {
            let (rest, inner) = sum(&input[1..])?;
            let (rest, _) = ws(rest)?;
            let (rest, _) = char::<_, nom::error::Error<_>>(')').parse(rest)?;
            Ok((rest, inner))
        }
        Some('"') => string_literal(input),
        Some(c) if c.is_alphabetic() || c == '_' => name_or_call(input),
        Some(_) => {
            let (rest, value) = double(input)?;
            Ok((rest, Ast::Number(value)))
        }
        None => Err(fail(input, ErrorKind::Eof)),
    }
}

fn string_literal(input: &str) -> IResult<&str, Ast> {
    let body = &input[1..];
    match body.find('"') {
        Some(end) => Ok((&body[end + 1..], Ast::Text(body[..end].to_string()))),
        None => Err(nom::Err::Failure(nom::error::Error::new(input, ErrorKind::Char))),
    }
}

fn name_or_call(input: &str) -> IResult<&str, Ast> {
    let (input, name) = identifier(input)?;
    let (rest, _) = ws(input)?;
    if char::<_, nom::error::Error<_>>('(').parse(rest).is_err() {
        return Ok((input, Ast::Identifier(name.to_string())));
    }
    let (rest, args) = arguments(&rest[1..])?;
    Ok((rest, Ast::Call(name.to_string(), args)))
}

/// Comma-separated arguments up to and including the closing parenthesis.
fn arguments(input: &str) -> IResult<&str, Vec<Ast>> {
    let (rest, _) = ws(input)?;
    if let Ok((rest, _)) = char::<_, nom::error::Error<_>>(')').parse(rest) {
        return Ok((rest, Vec::new()));
    }
    let mut args = Vec::new();
    let mut input = input;
    loop {
        let (rest, arg) = sum(input)?;
        args.push(arg);
        let (rest, _) = ws(rest)?;
        if let Ok((rest, _)) = char::<_, nom::error::Error<_>>(',').parse(rest) {
            input = rest;
            continue;
        }
        let (rest, _) = char::<_, nom::error::Error<_>>(')').parse(rest)?;
        return Ok((rest, args));
    }
}
