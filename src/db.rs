//! Submitted jobs are recorded in a SQLite database
//!
//! The ledger lets the command line tool poll or delete jobs submitted by an earlier invocation,
//! and resolve dependencies by local job ID.

/// Connect to a SQLite database
pub mod open;
/// Record, load and update submitted jobs
pub mod job;
