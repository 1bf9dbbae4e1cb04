//! The line-oriented shell (spec.md §6) — out of core scope, a thin
//! collaborator that reads one statement per line and prints its outcome.

pub mod console;

pub use console::run;
