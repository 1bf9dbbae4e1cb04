//! Single-table database session (spec.md §2, §4.9): owns the pager, the
//! B+ tree, the header/stats blob, and the transaction manager for one
//! open database file, and dispatches parsed statements against them.

use std::path::Path;

use crate::command::Statement;
use crate::error::Result;
use crate::executor;
use crate::storage::node::{
    INTERNAL_MAX_KEYS, INTERNAL_MIN_KEYS, LEAF_MAX_CELLS, LEAF_MIN_CELLS, PAGE_SIZE,
};
use crate::storage::row::ROW_SIZE;
use crate::storage::stats::Stats;
use crate::storage::{btree, BTree, Header, Pager, Row};
use crate::txn::TransactionManager;
use uuid::Uuid;

/// The result of executing one statement, for the REPL to render.
#[derive(Debug)]
pub enum Outcome {
    Rows(Vec<Row>),
    AffectedRows(usize),
    Message(String),
    Exit,
}

pub struct Session {
    /// Identifies this open session in log output; has no on-disk meaning.
    id: Uuid,
    pager: Pager,
    tree: BTree,
    header: Header,
    txn: TransactionManager,
}

impl Session {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut pager = Pager::open(path)?;
        let (header, tree) = if pager.num_pages() == 0 {
            pager.allocate_page()?; // page 0, the header
            let tree = BTree::create(&mut pager)?;
            let header = Header::new(PAGE_SIZE as u32, tree.root_page_id(), pager.num_pages());
            header.encode(pager.get_page_mut(0)?);
            pager.flush_all()?;
            (header, tree)
        } else {
            let header = {
                let page = pager.get_page(0)?;
                Header::decode(page, PAGE_SIZE as u32)?
            };
            let tree = BTree::new(header.root_page_id);
            (header, tree)
        };
        let id = Uuid::new_v4();
        tracing::debug!(
            session_id = %id,
            root = header.root_page_id,
            pages = header.num_pages,
            "session opened"
        );
        Ok(Session {
            id,
            pager,
            tree,
            header,
            txn: TransactionManager::new(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn close(&mut self) -> Result<()> {
        self.pager.flush_all()
    }

    pub fn execute(&mut self, statement: Statement) -> Result<Outcome> {
        match statement {
            Statement::Insert {
                id,
                username,
                email,
            } => {
                let row = Row::new(id, &username, &email)?;
                self.mutate(|pager, tree, stats| executor::insert(pager, tree, stats, row))?;
                Ok(Outcome::AffectedRows(1))
            }
            Statement::Select { predicate } => {
                let rows = executor::select(
                    &mut self.pager,
                    &self.tree,
                    &self.header.stats,
                    predicate.as_ref(),
                )?;
                Ok(Outcome::Rows(rows))
            }
            Statement::UpdateById {
                id,
                username,
                email,
            } => {
                let row = Row::new(id, &username, &email)?;
                self.mutate(|pager, tree, _stats| executor::update_by_id(pager, tree, row))?;
                Ok(Outcome::AffectedRows(1))
            }
            Statement::UpdateWhere {
                username,
                email,
                predicate,
            } => {
                let stats_snapshot = self.header.stats;
                let count = self.mutate(|pager, tree, _stats| {
                    executor::update_where(
                        pager,
                        tree,
                        &stats_snapshot,
                        &username,
                        &email,
                        Some(&predicate),
                    )
                })?;
                Ok(Outcome::AffectedRows(count))
            }
            Statement::DeleteById(id) => {
                self.mutate(|pager, tree, stats| executor::delete_by_id(pager, tree, stats, id))?;
                Ok(Outcome::AffectedRows(1))
            }
            Statement::DeleteWhere(predicate) => {
                let count = self.mutate(|pager, tree, stats| {
                    executor::delete_where(pager, tree, stats, Some(&predicate))
                })?;
                Ok(Outcome::AffectedRows(count))
            }
            Statement::Begin => {
                self.txn.begin(&mut self.pager)?;
                Ok(Outcome::Message("transaction started".into()))
            }
            Statement::Commit => {
                self.txn.commit(&mut self.pager)?;
                Ok(Outcome::Message("transaction committed".into()))
            }
            Statement::Rollback => {
                self.txn.rollback(&mut self.pager)?;
                self.resync_from_disk()?;
                Ok(Outcome::Message("transaction rolled back".into()))
            }
            Statement::Analyze => {
                let epoch = self.header.stats.last_analyze_epoch.wrapping_add(1);
                self.mutate(|pager, tree, stats| {
                    *stats = executor::analyze(pager, tree, epoch)?;
                    Ok(())
                })?;
                Ok(Outcome::Message("statistics refreshed".into()))
            }
            Statement::Stats => Ok(Outcome::Message(self.format_stats())),
            Statement::Btree => {
                let lines = btree::dump_pages(&mut self.pager)?;
                Ok(Outcome::Message(lines.join("\n")))
            }
            Statement::Constants => Ok(Outcome::Message(self.format_constants())),
            Statement::Exit => {
                self.close()?;
                Ok(Outcome::Exit)
            }
        }
    }

    /// Runs a mutation through the transaction manager's auto-commit
    /// wrapper (a no-op wrapper when an explicit transaction is already
    /// open), then re-derives the resident header/tree from page 0, which
    /// always holds the pager cache's latest logical state — committed,
    /// rolled back, or (on an error that never wrote anything) unchanged.
    fn mutate<T>(
        &mut self,
        body: impl FnOnce(&mut Pager, &mut BTree, &mut Stats) -> Result<T>,
    ) -> Result<T> {
        let mut tree = self.tree;
        let mut stats = self.header.stats;
        let page_size = self.header.page_size;

        let result = self.txn.auto_commit(&mut self.pager, |pager| {
            let value = body(pager, &mut tree, &mut stats)?;
            let header = Header {
                page_size,
                root_page_id: tree.root_page_id(),
                num_pages: pager.num_pages(),
                stats,
            };
            header.encode(pager.get_page_mut(0)?);
            Ok(value)
        });

        self.resync_from_disk()?;
        result
    }

    fn resync_from_disk(&mut self) -> Result<()> {
        let page_size = self.header.page_size;
        let page = self.pager.get_page(0)?;
        self.header = Header::decode(page, page_size)?;
        self.tree = BTree::new(self.header.root_page_id);
        Ok(())
    }

    fn format_stats(&self) -> String {
        let s = &self.header.stats;
        format!(
            "row_count: {}\nmin_id: {}\nmax_id: {}\ndistinct_username: {}\ndistinct_email: {}\nlast_analyze_epoch: {}",
            s.row_count, s.min_id, s.max_id, s.distinct_username, s.distinct_email, s.last_analyze_epoch
        )
    }

    fn format_constants(&self) -> String {
        format!(
            "ROW_SIZE: {}\nLEAF_MAX_CELLS: {}\nLEAF_MIN_CELLS: {}\nINTERNAL_MAX_KEYS: {}\nINTERNAL_MIN_KEYS: {}",
            ROW_SIZE, LEAF_MAX_CELLS, LEAF_MIN_CELLS, INTERNAL_MAX_KEYS, INTERNAL_MIN_KEYS
        )
    }
}
