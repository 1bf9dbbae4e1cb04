//! Recursive-descent WHERE-clause parser (spec.md §4.4).
//!
//! Grounded in the teacher's `sql/tokenizer.rs` + `sql/parser.rs`: a
//! `VecDeque<String>` token stream consumed by `pop_token`/`expect_token`
//! helpers, one parse function per grammar rule. The teacher's tokenizer
//! keeps quoted text and parenthesised groups intact while splitting on
//! whitespace; this one keeps `(`/`)` and the comparison operators
//! (`=`,`!=`,`>`,`<`,`>=`,`<=`) as their own tokens even when written hard
//! against a column or literal (`(id<3`, `id>=48`), since the grammar has
//! no quoted-string literals — a literal is one bare token bounded by
//! whitespace or an operator.

use std::collections::VecDeque;

use super::ast::{Column, Comparison, Expr, Literal, Op};
use crate::error::{Error, Result};

pub fn parse(input: &str) -> Result<Expr> {
    let mut tokens = tokenize(input);
    let expr = parse_or(&mut tokens)?;
    if let Some(tok) = tokens.pop_front() {
        return Err(Error::Parse(format!(
            "unexpected token '{}' after WHERE expression",
            tok
        )));
    }
    Ok(expr)
}

fn tokenize(input: &str) -> VecDeque<String> {
    let mut tokens = VecDeque::new();
    let mut current = String::new();
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '(' | ')' => {
                if !current.is_empty() {
                    tokens.push_back(std::mem::take(&mut current));
                }
                tokens.push_back(c.to_string());
            }
            c if c.is_whitespace() => {
                if !current.is_empty() {
                    tokens.push_back(std::mem::take(&mut current));
                }
            }
            '!' | '>' | '<' => {
                if !current.is_empty() {
                    tokens.push_back(std::mem::take(&mut current));
                }
                let mut op = c.to_string();
                if chars.peek() == Some(&'=') {
                    op.push(chars.next().unwrap());
                }
                tokens.push_back(op);
            }
            '=' => {
                if !current.is_empty() {
                    tokens.push_back(std::mem::take(&mut current));
                }
                tokens.push_back("=".to_string());
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push_back(current);
    }
    tokens
}

fn pop_token(tokens: &mut VecDeque<String>, expected: &str) -> Result<String> {
    tokens
        .pop_front()
        .ok_or_else(|| Error::Parse(format!("unexpected end of WHERE clause, expected {}", expected)))
}

fn expect_token(tokens: &mut VecDeque<String>, expected: &str) -> Result<()> {
    match tokens.pop_front() {
        Some(t) if t == expected => Ok(()),
        Some(t) => Err(Error::Parse(format!(
            "expected '{}' but found '{}'",
            expected, t
        ))),
        None => Err(Error::Parse(format!(
            "expected '{}' but reached end of input",
            expected
        ))),
    }
}

fn is_keyword(tok: Option<&String>, keyword: &str) -> bool {
    tok.map(|t| t.eq_ignore_ascii_case(keyword)).unwrap_or(false)
}

fn parse_or(tokens: &mut VecDeque<String>) -> Result<Expr> {
    let mut left = parse_and(tokens)?;
    while is_keyword(tokens.front(), "OR") {
        tokens.pop_front();
        let right = parse_and(tokens)?;
        left = Expr::Or(Box::new(left), Box::new(right));
    }
    Ok(left)
}

fn parse_and(tokens: &mut VecDeque<String>) -> Result<Expr> {
    let mut left = parse_atom(tokens)?;
    while is_keyword(tokens.front(), "AND") {
        tokens.pop_front();
        let right = parse_atom(tokens)?;
        left = Expr::And(Box::new(left), Box::new(right));
    }
    Ok(left)
}

fn parse_atom(tokens: &mut VecDeque<String>) -> Result<Expr> {
    if tokens.front().map(|t| t.as_str()) == Some("(") {
        tokens.pop_front();
        let inner = parse_or(tokens)?;
        expect_token(tokens, ")")?;
        return Ok(inner);
    }
    parse_comparison(tokens).map(Expr::Comparison)
}

fn parse_comparison(tokens: &mut VecDeque<String>) -> Result<Comparison> {
    let column_tok = pop_token(tokens, "a column name")?;
    let column = Column::parse(&column_tok)
        .ok_or_else(|| Error::Parse(format!("unknown column '{}'", column_tok)))?;

    let op_tok = pop_token(tokens, "a comparison operator")?;
    let op = Op::parse(&op_tok)
        .ok_or_else(|| Error::Parse(format!("unknown comparison operator '{}'", op_tok)))?;

    let literal_tok = pop_token(tokens, "a literal")?;
    let literal = match column {
        Column::Id => {
            let value = literal_tok.parse::<u32>().map_err(|_| {
                Error::Type(format!(
                    "'{}' is not a valid integer for column 'id'",
                    literal_tok
                ))
            })?;
            Literal::Int(value)
        }
        Column::Username | Column::Email => Literal::Str(literal_tok),
    };

    Ok(Comparison { column, op, literal })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_comparison() {
        let expr = parse("id = 5").unwrap();
        assert_eq!(
            expr,
            Expr::Comparison(Comparison {
                column: Column::Id,
                op: Op::Eq,
                literal: Literal::Int(5)
            })
        );
    }

    #[test]
    fn and_binds_tighter_than_or() {
        // id > 1 AND id < 5 OR id = 10  =>  (id>1 AND id<5) OR (id=10)
        let expr = parse("id > 1 AND id < 5 OR id = 10").unwrap();
        match expr {
            Expr::Or(left, right) => {
                assert!(matches!(*left, Expr::And(_, _)));
                assert!(matches!(*right, Expr::Comparison(_)));
            }
            other => panic!("expected top-level Or, got {:?}", other),
        }
    }

    #[test]
    fn parentheses_override_precedence() {
        let expr = parse("(id < 3 OR id > 15) AND username = alice").unwrap();
        match expr {
            Expr::And(left, right) => {
                assert!(matches!(*left, Expr::Or(_, _)));
                assert!(matches!(*right, Expr::Comparison(_)));
            }
            other => panic!("expected top-level And, got {:?}", other),
        }
    }

    #[test]
    fn parens_glued_to_tokens_still_split() {
        let expr = parse("((id<3))").unwrap();
        assert!(matches!(expr, Expr::Comparison(_)));
    }

    #[test]
    fn rejects_unknown_column() {
        assert!(parse("age = 5").is_err());
    }

    #[test]
    fn rejects_non_integer_id_literal() {
        let err = parse("id = bob").unwrap_err();
        assert!(matches!(err, Error::Type(_)));
    }

    #[test]
    fn rejects_trailing_garbage() {
        assert!(parse("id = 5 garbage").is_err());
    }

    #[test]
    fn operators_glued_to_operands_still_split() {
        let expr = parse("(id<3 OR id>48) AND username!=user1").unwrap();
        match expr {
            Expr::And(left, right) => {
                assert!(matches!(*left, Expr::Or(_, _)));
                assert_eq!(
                    *right,
                    Expr::Comparison(Comparison {
                        column: Column::Username,
                        op: Op::Ne,
                        literal: Literal::Str("user1".into())
                    })
                );
            }
            other => panic!("expected top-level And, got {:?}", other),
        }
    }

    #[test]
    fn two_char_operators_glued_to_operands_still_split() {
        let expr = parse("id>=48").unwrap();
        assert_eq!(
            expr,
            Expr::Comparison(Comparison {
                column: Column::Id,
                op: Op::Ge,
                literal: Literal::Int(48)
            })
        );
    }

    #[test]
    fn bare_word_string_literal() {
        let expr = parse("email = eve@example.com").unwrap();
        assert_eq!(
            expr,
            Expr::Comparison(Comparison {
                column: Column::Email,
                op: Op::Eq,
                literal: Literal::Str("eve@example.com".into())
            })
        );
    }
}
