//! Job loading and updating
//!
//! A row is written once a job is accepted by its scheduler. Status queries update the stored
//! status so a job in error isn't polled again.

use crate::job::StatusCode;

pub mod load;
pub mod update;

/// One submitted job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRecord {
    pub local_id: String,
    pub backend: String,
    pub target: String,
    pub bin_path: String,
    pub scheduler_id: String,
    pub num_tasks: u32,
    pub status: StatusCode,
    pub submitted_at: String,
}
