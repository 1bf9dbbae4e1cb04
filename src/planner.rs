//! Access-path selection (spec.md §4.5).
//!
//! Inspects the predicate's top-level structure only: a bare comparison, or
//! a top-level conjunction of comparisons. Anything with a top-level `OR`
//! (or a conjunct that isn't itself a plain comparison — a parenthesised
//! sub-expression) falls back to a full scan, matching the design note that
//! a smarter OR-aware planner is deliberately out of scope.

use crate::predicate::{Column, Expr, Literal, Op};
use crate::storage::stats::{Stats, UNDEFINED};

/// An inclusive/exclusive bound on `id`: `(value, inclusive)`.
pub type Bound = (u32, bool);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    /// The predicate can never match given current statistics — no scan
    /// is needed at all.
    Empty,
    PointLookup(u32),
    RangeScan {
        lower: Option<Bound>,
        upper: Option<Bound>,
    },
    FullScan,
}

pub fn plan(predicate: Option<&Expr>, stats: &Stats) -> Plan {
    if stats.row_count == 0 {
        return Plan::Empty;
    }

    let expr = match predicate {
        Some(expr) => expr,
        None => return Plan::FullScan,
    };

    if matches!(expr, Expr::Or(_, _)) {
        return Plan::FullScan;
    }

    let mut conjuncts = Vec::new();
    if !flatten_and(expr, &mut conjuncts) {
        return Plan::FullScan;
    }

    for comparison in &conjuncts {
        if comparison.column == Column::Id && comparison.op == Op::Eq {
            if let Literal::Int(key) = comparison.literal {
                let known_bounds = stats.min_id != UNDEFINED && stats.max_id != UNDEFINED;
                if known_bounds && (key < stats.min_id || key > stats.max_id) {
                    return Plan::Empty;
                }
                return Plan::PointLookup(key);
            }
        }
    }

    let mut lower: Option<Bound> = None;
    let mut upper: Option<Bound> = None;
    for comparison in &conjuncts {
        if comparison.column != Column::Id {
            continue;
        }
        let Literal::Int(value) = comparison.literal else {
            continue;
        };
        match comparison.op {
            Op::Gt => lower = Some(tighter_lower(lower, (value, false))),
            Op::Ge => lower = Some(tighter_lower(lower, (value, true))),
            Op::Lt => upper = Some(tighter_upper(upper, (value, false))),
            Op::Le => upper = Some(tighter_upper(upper, (value, true))),
            _ => {}
        }
    }

    if lower.is_none() && upper.is_none() {
        return Plan::FullScan;
    }

    if let (Some((lo, _)), Some((hi, _))) = (lower, upper) {
        if lo > hi {
            return Plan::Empty;
        }
    }
    if let Some((lo, _)) = lower {
        if stats.max_id != UNDEFINED && lo > stats.max_id {
            return Plan::Empty;
        }
    }
    if let Some((hi, _)) = upper {
        if stats.min_id != UNDEFINED && hi < stats.min_id {
            return Plan::Empty;
        }
    }

    Plan::RangeScan { lower, upper }
}

/// Flattens a tree of top-level `And` nodes into a flat list of plain
/// comparisons. Returns `false` if any conjunct is itself an `Or` (a
/// parenthesised disjunction ANDed with something else), since that can't
/// be reduced to a simple `id` bound.
fn flatten_and(expr: &Expr, out: &mut Vec<crate::predicate::Comparison>) -> bool {
    match expr {
        Expr::Comparison(c) => {
            out.push(c.clone());
            true
        }
        Expr::And(left, right) => flatten_and(left, out) && flatten_and(right, out),
        Expr::Or(_, _) => false,
    }
}

fn tighter_lower(current: Option<Bound>, candidate: Bound) -> Bound {
    match current {
        Some(existing) if existing.0 > candidate.0 => existing,
        Some(existing) if existing.0 == candidate.0 => (existing.0, existing.1 && candidate.1),
        _ => candidate,
    }
}

fn tighter_upper(current: Option<Bound>, candidate: Bound) -> Bound {
    match current {
        Some(existing) if existing.0 < candidate.0 => existing,
        Some(existing) if existing.0 == candidate.0 => (existing.0, existing.1 && candidate.1),
        _ => candidate,
    }
}
