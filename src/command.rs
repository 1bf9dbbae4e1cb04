//! Line parser (spec.md §6): one statement per input line.
//!
//! Grounded in the teacher's `sql/parser.rs` token-consuming style, but
//! narrowed to this system's fixed command table instead of a general SQL
//! grammar — there is no `CREATE`/`DROP`/`SHOW`, and `WHERE` is always the
//! last clause, so each statement form has a fixed, checkable shape.

use crate::error::{Error, Result};
use crate::predicate::{self, Expr};

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Insert {
        id: u32,
        username: String,
        email: String,
    },
    Select {
        predicate: Option<Expr>,
    },
    UpdateById {
        id: u32,
        username: String,
        email: String,
    },
    UpdateWhere {
        username: String,
        email: String,
        predicate: Expr,
    },
    DeleteById(u32),
    DeleteWhere(Expr),
    Begin,
    Commit,
    Rollback,
    Analyze,
    Stats,
    Btree,
    Constants,
    Exit,
}

pub fn parse_line(line: &str) -> Result<Statement> {
    let line = line.trim();
    if line.is_empty() {
        return Err(Error::Parse("empty command".into()));
    }

    let mut tokens = line.split_whitespace();
    let keyword = tokens.next().expect("non-empty line has a first token");
    let rest: Vec<String> = tokens.map(str::to_string).collect();

    match keyword {
        ".exit" => Ok(Statement::Exit),
        ".stats" => Ok(Statement::Stats),
        ".btree" => Ok(Statement::Btree),
        ".constants" => Ok(Statement::Constants),
        ".analyze" => Ok(Statement::Analyze),
        "insert" => parse_insert(&rest),
        "select" => parse_select(&rest),
        "update" => parse_update(&rest),
        "delete" => parse_delete(&rest),
        _ if keyword.eq_ignore_ascii_case("BEGIN") => Ok(Statement::Begin),
        _ if keyword.eq_ignore_ascii_case("COMMIT") => Ok(Statement::Commit),
        _ if keyword.eq_ignore_ascii_case("ROLLBACK") => Ok(Statement::Rollback),
        _ if keyword.eq_ignore_ascii_case("ANALYZE") => Ok(Statement::Analyze),
        other => Err(Error::Parse(format!("unrecognized command '{}'", other))),
    }
}

fn parse_insert(rest: &[String]) -> Result<Statement> {
    match rest {
        [id, username, email] => Ok(Statement::Insert {
            id: parse_id(id)?,
            username: username.clone(),
            email: email.clone(),
        }),
        _ => Err(Error::Parse(
            "expected 'insert <id> <username> <email>'".into(),
        )),
    }
}

fn parse_select(rest: &[String]) -> Result<Statement> {
    if rest.is_empty() {
        return Ok(Statement::Select { predicate: None });
    }
    let predicate = parse_where_clause(rest)?;
    Ok(Statement::Select {
        predicate: Some(predicate),
    })
}

fn parse_update(rest: &[String]) -> Result<Statement> {
    if rest.len() >= 3 && rest[2].eq_ignore_ascii_case("where") {
        let predicate = parse_where_clause(&rest[3..])?;
        return Ok(Statement::UpdateWhere {
            username: rest[0].clone(),
            email: rest[1].clone(),
            predicate,
        });
    }
    match rest {
        [id, username, email] => Ok(Statement::UpdateById {
            id: parse_id(id)?,
            username: username.clone(),
            email: email.clone(),
        }),
        _ => Err(Error::Parse(
            "expected 'update <id> <username> <email>' or 'update <username> <email> where <expr>'"
                .into(),
        )),
    }
}

fn parse_delete(rest: &[String]) -> Result<Statement> {
    match rest {
        [] => Err(Error::Parse(
            "expected 'delete <id>' or 'delete where <expr>'".into(),
        )),
        [first, ..] if first.eq_ignore_ascii_case("where") => {
            let predicate = parse_where_clause(&rest[1..])?;
            Ok(Statement::DeleteWhere(predicate))
        }
        [id] => Ok(Statement::DeleteById(parse_id(id)?)),
        _ => Err(Error::Parse(
            "expected 'delete <id>' or 'delete where <expr>'".into(),
        )),
    }
}

fn parse_where_clause(rest: &[String]) -> Result<Expr> {
    let first = rest
        .first()
        .ok_or_else(|| Error::Parse("expected 'where' clause".into()))?;
    if !first.eq_ignore_ascii_case("where") {
        return Err(Error::Parse(format!(
            "expected 'where' but found '{}'",
            first
        )));
    }
    if rest.len() < 2 {
        return Err(Error::Parse("'where' with no expression".into()));
    }
    predicate::parse(&rest[1..].join(" "))
}

fn parse_id(token: &str) -> Result<u32> {
    token
        .parse::<u32>()
        .map_err(|_| Error::Type(format!("'{}' is not a valid integer id", token)))
}
