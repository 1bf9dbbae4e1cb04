//! Transaction manager (spec.md §4.6): `BEGIN`/`COMMIT`/`ROLLBACK` and
//! auto-commit, layered over the pager's shadow-paging primitives.

use crate::error::{Error, Result};
use crate::storage::Pager;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Open,
}

/// Tracks whether an explicit transaction is open. The session consults
/// this before every statement: open ⇒ mutate in place and wait for
/// `COMMIT`/`ROLLBACK`; idle ⇒ auto-commit the single statement.
pub struct TransactionManager {
    state: State,
}

impl TransactionManager {
    pub fn new() -> Self {
        TransactionManager { state: State::Idle }
    }

    pub fn is_open(&self) -> bool {
        self.state == State::Open
    }

    /// `BEGIN`. Fails with `TransactionState` on a nested `BEGIN`.
    pub fn begin(&mut self, pager: &mut Pager) -> Result<()> {
        if self.state == State::Open {
            return Err(Error::TransactionState(
                "a transaction is already open".into(),
            ));
        }
        pager.begin_transaction();
        self.state = State::Open;
        tracing::debug!("transaction opened");
        Ok(())
    }

    /// `COMMIT`. Fails with `TransactionState` if no transaction is open.
    /// An I/O error here is fatal (spec.md §4.6): the caller must terminate
    /// the session rather than continue with an uncertain on-disk state.
    pub fn commit(&mut self, pager: &mut Pager) -> Result<()> {
        if self.state != State::Open {
            return Err(Error::TransactionState("no transaction is open".into()));
        }
        pager.commit_transaction()?;
        self.state = State::Idle;
        tracing::debug!("transaction committed");
        Ok(())
    }

    /// `ROLLBACK`. Fails with `TransactionState` if no transaction is open.
    pub fn rollback(&mut self, pager: &mut Pager) -> Result<()> {
        if self.state != State::Open {
            return Err(Error::TransactionState("no transaction is open".into()));
        }
        pager.rollback_transaction()?;
        self.state = State::Idle;
        tracing::debug!("transaction rolled back");
        Ok(())
    }

    /// Auto-commit wrapper: runs `body` inside an implicit transaction when
    /// none is already open, so a single statement's page writes are
    /// committed together. When an explicit transaction is open, `body`
    /// just runs against it directly — the caller decides `COMMIT` or
    /// `ROLLBACK` later.
    pub fn auto_commit<T>(
        &mut self,
        pager: &mut Pager,
        body: impl FnOnce(&mut Pager) -> Result<T>,
    ) -> Result<T> {
        if self.state == State::Open {
            return body(pager);
        }
        pager.begin_transaction();
        match body(pager) {
            Ok(value) => {
                pager.commit_transaction()?;
                Ok(value)
            }
            Err(err) => {
                let _ = pager.rollback_transaction();
                Err(err)
            }
        }
    }
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open_pager() -> (tempfile::TempDir, Pager) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.db");
        let pager = Pager::open(&path).unwrap();
        (dir, pager)
    }

    #[test]
    fn nested_begin_fails() {
        let (_dir, mut pager) = open_pager();
        let mut txn = TransactionManager::new();
        txn.begin(&mut pager).unwrap();
        assert!(matches!(
            txn.begin(&mut pager),
            Err(Error::TransactionState(_))
        ));
    }

    #[test]
    fn commit_without_begin_fails() {
        let (_dir, mut pager) = open_pager();
        let mut txn = TransactionManager::new();
        assert!(matches!(
            txn.commit(&mut pager),
            Err(Error::TransactionState(_))
        ));
    }

    #[test]
    fn auto_commit_rolls_back_on_error() {
        let (_dir, mut pager) = open_pager();
        let mut txn = TransactionManager::new();
        let id = pager.allocate_page().unwrap();
        pager.get_page_mut(id).unwrap()[0] = 1;
        pager.flush_all().unwrap();

        let result: Result<()> = txn.auto_commit(&mut pager, |p| {
            p.get_page_mut(id).unwrap()[0] = 2;
            Err(Error::Parse("boom".into()))
        });
        assert!(result.is_err());
        assert_eq!(pager.get_page(id).unwrap()[0], 1);
        assert!(!txn.is_open());
    }

    #[test]
    fn auto_commit_persists_on_success() {
        let (_dir, mut pager) = open_pager();
        let mut txn = TransactionManager::new();
        let id = pager.allocate_page().unwrap();

        txn.auto_commit::<()>(&mut pager, |p| {
            p.get_page_mut(id).unwrap()[0] = 7;
            Ok(())
        })
        .unwrap();
        assert_eq!(pager.get_page(id).unwrap()[0], 7);
    }
}
