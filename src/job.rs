//! Job descriptions and the status model shared by every backend
//!
//! A [`JobDescriptor`] describes one unit of work. It is built once with a [`JobBuilder`], bound
//! to a [`crate::manager::JobManager`], submitted exactly once and then queried for status.

/// File references with an "already on the target host" flag
pub mod file;

/// Canonical status codes and status snapshots
pub mod status;

/// The job descriptor and its builder
pub mod descriptor;

pub use descriptor::{JobBuilder, JobDescriptor};
pub use file::FileRef;
pub use status::{JobStatus, StatusCode, StatusReport, TaskParallelJobStatus};
