//! `shelfdb`: a single-table embedded relational database. The storage and
//! execution core (pager, B+ tree, predicate engine, planner, executor,
//! transaction manager) lives here as a library; `main.rs` is a thin CLI
//! and REPL shell on top of it.

pub mod command;
pub mod error;
pub mod executor;
pub mod planner;
pub mod predicate;
pub mod repl;
pub mod session;
pub mod storage;
pub mod txn;
