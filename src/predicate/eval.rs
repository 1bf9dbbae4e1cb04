//! WHERE-clause evaluation against a row (spec.md §4.4).

use std::cmp::Ordering;

use super::ast::{Column, Comparison, Expr, Literal, Op};
use crate::storage::row::compare_fixed_str;
use crate::storage::Row;

pub fn eval(expr: &Expr, row: &Row) -> bool {
    match expr {
        Expr::Or(left, right) => eval(left, row) || eval(right, row),
        Expr::And(left, right) => eval(left, row) && eval(right, row),
        Expr::Comparison(comparison) => eval_comparison(comparison, row),
    }
}

fn eval_comparison(comparison: &Comparison, row: &Row) -> bool {
    match (&comparison.column, &comparison.literal) {
        (Column::Id, Literal::Int(value)) => apply_int_op(row.id, *value, comparison.op),
        (Column::Username, Literal::Str(value)) => {
            apply_str_op(&row.username, value.as_bytes(), comparison.op)
        }
        (Column::Email, Literal::Str(value)) => {
            apply_str_op(&row.email, value.as_bytes(), comparison.op)
        }
        // The parser only ever pairs Id with Int and the string columns
        // with Str, so this never triggers on a predicate that parsed.
        _ => false,
    }
}

fn apply_int_op(field: u32, literal: u32, op: Op) -> bool {
    match op {
        Op::Eq => field == literal,
        Op::Ne => field != literal,
        Op::Gt => field > literal,
        Op::Lt => field < literal,
        Op::Ge => field >= literal,
        Op::Le => field <= literal,
    }
}

fn apply_str_op(field: &[u8], literal: &[u8], op: Op) -> bool {
    let ord = compare_fixed_str(field, literal);
    match op {
        Op::Eq => ord == Ordering::Equal,
        Op::Ne => ord != Ordering::Equal,
        Op::Gt => ord == Ordering::Greater,
        Op::Lt => ord == Ordering::Less,
        Op::Ge => ord != Ordering::Less,
        Op::Le => ord != Ordering::Greater,
    }
}
