//! Statement execution (spec.md §4.5).
//!
//! Reads buffer every matching row before printing; writes collect the set
//! of matching keys first, then mutate in ascending key order, so a cursor
//! scan is never still open while the tree it walks is being rebalanced.

use crate::planner::{self, Plan};
use crate::predicate::{eval, Expr};
use crate::storage::{BTree, Pager, Row};
use crate::storage::stats::Stats;
use crate::error::Result;

/// "Leave this field unchanged" sentinel accepted by bulk `update`.
pub const UNCHANGED: &str = "-";

/// Rows matching `predicate` (or every row, if `predicate` is `None`), in
/// ascending id order.
pub fn select(
    pager: &mut Pager,
    tree: &BTree,
    stats: &Stats,
    predicate: Option<&Expr>,
) -> Result<Vec<Row>> {
    collect_matching(pager, tree, stats, predicate)
}

/// Inserts `row`, failing with `DuplicateKey` if its id is already present.
pub fn insert(pager: &mut Pager, tree: &mut BTree, stats: &mut Stats, row: Row) -> Result<()> {
    let id = row.id;
    tree.insert(pager, row)?;
    stats.on_insert(id);
    Ok(())
}

/// Replaces the row at `id` outright (the single-row `update <id> <u> <e>`
/// form); fails with `NotFound` if absent.
pub fn update_by_id(pager: &mut Pager, tree: &mut BTree, row: Row) -> Result<()> {
    tree.update(pager, row)
}

/// Bulk `update <username> <email> where <expr>`: collects matching keys,
/// then rewrites each row in ascending id order, leaving a field untouched
/// wherever its replacement is the `-` sentinel. Returns the number of rows
/// updated.
pub fn update_where(
    pager: &mut Pager,
    tree: &mut BTree,
    stats: &Stats,
    new_username: &str,
    new_email: &str,
    predicate: Option<&Expr>,
) -> Result<usize> {
    let matching = collect_matching(pager, tree, stats, predicate)?;
    for row in &matching {
        let username = if new_username == UNCHANGED {
            row.username_str()
        } else {
            new_username.to_string()
        };
        let email = if new_email == UNCHANGED {
            row.email_str()
        } else {
            new_email.to_string()
        };
        let updated = Row::new(row.id, &username, &email)?;
        tree.update(pager, updated)?;
    }
    Ok(matching.len())
}

/// Deletes the row at `id`; fails with `NotFound` if absent.
pub fn delete_by_id(pager: &mut Pager, tree: &mut BTree, stats: &mut Stats, id: u32) -> Result<()> {
    tree.delete(pager, id)?;
    stats.on_delete(id);
    Ok(())
}

/// Bulk `delete where <expr>`: collects matching keys first, then deletes
/// each in ascending order. Returns the number of rows deleted.
pub fn delete_where(
    pager: &mut Pager,
    tree: &mut BTree,
    stats: &mut Stats,
    predicate: Option<&Expr>,
) -> Result<usize> {
    let matching = collect_matching(pager, tree, stats, predicate)?;
    for row in &matching {
        tree.delete(pager, row.id)?;
        stats.on_delete(row.id);
    }
    Ok(matching.len())
}

/// Full recompute of statistics, as driven by `ANALYZE` / `.analyze`.
pub fn analyze(pager: &mut Pager, tree: &BTree, epoch: u32) -> Result<Stats> {
    let rows = collect_matching(pager, tree, &Stats::empty(), None)?;
    Ok(Stats::analyze(
        rows.iter().map(|r| (r.id, &r.username[..], &r.email[..])),
        epoch,
    ))
}

fn collect_matching(
    pager: &mut Pager,
    tree: &BTree,
    stats: &Stats,
    predicate: Option<&Expr>,
) -> Result<Vec<Row>> {
    let mut rows = Vec::new();
    let keep = |row: &Row| predicate.map_or(true, |e| eval(e, row));

    match planner::plan(predicate, stats) {
        Plan::Empty => {}
        Plan::PointLookup(key) => {
            if let Some(row) = tree.search(pager, key)? {
                if keep(&row) {
                    rows.push(row);
                }
            }
        }
        Plan::RangeScan { lower, upper } => {
            let start = match lower {
                Some((v, true)) => v,
                Some((v, false)) => v.saturating_add(1),
                None => 0,
            };
            let mut cursor = tree.seek(pager, start)?;
            while !cursor.is_end() {
                let key = cursor.key(pager)?;
                if let Some((bound, inclusive)) = upper {
                    let past_bound = if inclusive { key > bound } else { key >= bound };
                    if past_bound {
                        break;
                    }
                }
                let row = cursor.row(pager)?;
                if keep(&row) {
                    rows.push(row);
                }
                cursor.advance(pager)?;
            }
        }
        Plan::FullScan => {
            let mut cursor = tree.seek_start(pager)?;
            while !cursor.is_end() {
                let row = cursor.row(pager)?;
                if keep(&row) {
                    rows.push(row);
                }
                cursor.advance(pager)?;
            }
        }
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::parse;
    use tempfile::tempdir;

    fn open_tree() -> (Pager, BTree) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.db");
        let mut pager = Pager::open(&path).unwrap();
        pager.allocate_page().unwrap(); // header page
        let tree = BTree::create(&mut pager).unwrap();
        (pager, tree)
    }

    #[test]
    fn insert_select_update_delete_round_trip() {
        let (mut pager, mut tree) = open_tree();
        let mut stats = Stats::empty();

        insert(&mut pager, &mut tree, &mut stats, Row::new(1, "alice", "a@x").unwrap()).unwrap();
        insert(&mut pager, &mut tree, &mut stats, Row::new(2, "bob", "b@x").unwrap()).unwrap();

        let all = select(&mut pager, &tree, &stats, None).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, 1);
        assert_eq!(all[1].id, 2);

        update_by_id(&mut pager, &mut tree, Row::new(2, "bobby", "bb@x").unwrap()).unwrap();
        let expr = parse("id = 2").unwrap();
        let found = select(&mut pager, &tree, &stats, Some(&expr)).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].username_str(), "bobby");

        delete_by_id(&mut pager, &mut tree, &mut stats, 1).unwrap();
        let remaining = select(&mut pager, &tree, &stats, None).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, 2);
    }

    #[test]
    fn bulk_update_honors_unchanged_sentinel() {
        let (mut pager, mut tree) = open_tree();
        let mut stats = Stats::empty();
        insert(&mut pager, &mut tree, &mut stats, Row::new(1, "alice", "a@x").unwrap()).unwrap();

        let expr = parse("id = 1").unwrap();
        update_where(&mut pager, &mut tree, &stats, UNCHANGED, "new@x", Some(&expr)).unwrap();
        let row = tree.search(&mut pager, 1).unwrap().unwrap();
        assert_eq!(row.username_str(), "alice");
        assert_eq!(row.email_str(), "new@x");

        let expr = parse("id = 1").unwrap();
        update_where(&mut pager, &mut tree, &stats, "zed", UNCHANGED, Some(&expr)).unwrap();
        let row = tree.search(&mut pager, 1).unwrap().unwrap();
        assert_eq!(row.username_str(), "zed");
        assert_eq!(row.email_str(), "new@x");
    }

    #[test]
    fn bulk_delete_removes_all_matching() {
        let (mut pager, mut tree) = open_tree();
        let mut stats = Stats::empty();
        for id in 1..=5u32 {
            insert(
                &mut pager,
                &mut tree,
                &mut stats,
                Row::new(id, &format!("user{}", id), "x@x").unwrap(),
            )
            .unwrap();
        }
        let expr = parse("id > 2").unwrap();
        let deleted = delete_where(&mut pager, &mut tree, &mut stats, Some(&expr)).unwrap();
        assert_eq!(deleted, 3);
        let remaining = select(&mut pager, &tree, &stats, None).unwrap();
        assert_eq!(remaining.len(), 2);
    }
}
