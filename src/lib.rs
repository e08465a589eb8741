//! Submit, monitor and cancel jobs on batch schedulers
//!
//! One interface over Condor, PBS, LSF, SGE, SLURM, Moab and plain background processes ("fork").
//! Build a [`job::JobDescriptor`], get a [`manager::JobManager`] for a backend and target from a
//! [`registry::ManagerRegistry`], bind the two and call `submit`, `status` and `delete` on the job.
//!
//! ```no_run
//! use std::sync::Arc;
//! use hpcc::job::JobDescriptor;
//! use hpcc::registry::ManagerRegistry;
//!
//! # fn main() -> hpcc::error::Result<()> {
//! let registry = ManagerRegistry::new();
//! let manager = registry.get_or_create("SLURM", "hpc-login", "/opt/slurm/bin")?;
//! let job = JobDescriptor::builder().executable("run.sh", true, "--fast")?.tasks(4).build()?;
//! job.set_manager(Arc::clone(&manager));
//! let scheduler_id = job.submit(false, "--partition=short")?;
//! println!("{} is {}", scheduler_id, job.status()?.code());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;

/// Scheduler-specific command construction and output parsing
pub mod backend;
/// Submission ledger
pub mod db;
pub mod error;
/// Job descriptors and status
pub mod job;
/// Process execution, staging and the job lifecycle
pub mod manager;
/// Job managers shared by backend and target
pub mod registry;
/// JSON job requests
pub mod request;
/// Submit file rendering
pub mod template;

/// Directory holding the submission ledger
#[derive(Debug, Clone)]
pub struct WorkingDirectory {
    pub path: PathBuf,
}
