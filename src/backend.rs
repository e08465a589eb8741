//! Batch scheduler backends
//!
//! Each backend turns a [`JobDescriptor`] into command strings for its scheduler and parses the
//! scheduler's text output back into job IDs and [`JobStatus`] values. Backends never run anything
//! themselves: [`crate::manager::JobManager`] executes the commands and hands the captured output
//! back for parsing.

use std::fmt;
use std::str::FromStr;

use crate::error::{JobError, Result};
use crate::job::{JobDescriptor, JobStatus, StatusCode, TaskParallelJobStatus};

pub mod condor;
pub mod fork;
pub mod lsf;
pub mod moab;
pub mod pbs;
pub mod sge;
pub mod slurm;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Backend {
    Condor,
    Fork,
    Lsf,
    Moab,
    Pbs,
    Sge,
    Slurm,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Backend::Condor => write!(f, "Condor"),
            Backend::Fork => write!(f, "Fork"),
            Backend::Lsf => write!(f, "LSF"),
            Backend::Moab => write!(f, "Moab"),
            Backend::Pbs => write!(f, "PBS"),
            Backend::Sge => write!(f, "SGE"),
            Backend::Slurm => write!(f, "SLURM"),
        }
    }
}

impl FromStr for Backend {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self> {
        Backend::ALL
            .into_iter()
            .find(|backend| backend.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| JobError::UnknownBackend(s.to_string()))
    }
}

impl Backend {
    pub const ALL: [Backend; 7] = [
        Backend::Condor,
        Backend::Fork,
        Backend::Lsf,
        Backend::Moab,
        Backend::Pbs,
        Backend::Sge,
        Backend::Slurm,
    ];

    pub fn adapter(self, bin_path: &str) -> Box<dyn BackendAdapter> {
        match self {
            Backend::Condor => Box::new(condor::CondorSupport::new(bin_path)),
            Backend::Fork => Box::new(fork::ForkSupport::new(bin_path)),
            Backend::Lsf => Box::new(lsf::LsfSupport::new(bin_path)),
            Backend::Moab => Box::new(moab::MoabSupport::new(bin_path)),
            Backend::Pbs => Box::new(pbs::PbsSupport::new(bin_path)),
            Backend::Sge => Box::new(sge::SgeSupport::new(bin_path)),
            Backend::Slurm => Box::new(slurm::SlurmSupport::new(bin_path)),
        }
    }
}

/// Command construction and output parsing for one scheduler family
///
/// Implementations are pure: no processes, no filesystem access.
pub trait BackendAdapter: fmt::Debug + Send + Sync {
    fn backend(&self) -> Backend;

    /// Extension of submit files rendered by [`BackendAdapter::render_submit_file`]
    fn submit_file_extension(&self) -> &'static str;

    fn render_submit_file(&self, job: &JobDescriptor) -> Result<String>;

    /// Command that submits the job, run from inside the job's working directory
    fn submit_command(&self, job: &JobDescriptor, options: &str) -> Result<String>;

    fn parse_submit_output(&self, stdout: &str, stderr: &str) -> Result<String>;

    fn status_command(&self, job_id: &str) -> String;

    fn parse_status_output(&self, job_id: &str, exit_code: i32, stdout: &str, stderr: &str) -> Result<JobStatus>;

    fn delete_command(&self, job_id: &str) -> String;

    fn parse_delete_output(&self, job_id: &str, exit_code: i32, stdout: &str, stderr: &str) -> bool;

    /// Scripts the backend's commands rely on, as file name and contents, installed into the bin
    /// path on first use
    fn helper_scripts(&self) -> &'static [(&'static str, &'static str)] {
        &[]
    }

    fn task_status_command(&self, _job_id: &str) -> Result<String> {
        Err(JobError::UnsupportedTaskStatus { backend: self.backend() })
    }

    fn parse_task_status_output(
        &self,
        _job_id: &str,
        _num_tasks: u32,
        _exit_code: i32,
        _stdout: &str,
        _stderr: &str,
    ) -> Result<TaskParallelJobStatus> {
        Err(JobError::UnsupportedTaskStatus { backend: self.backend() })
    }
}

/// Prefix a scheduler command with the bin path, if there is one
pub fn command_path(bin_path: &str, command: &str) -> String {
    let bin_path = bin_path.trim_end_matches('/');
    if bin_path.is_empty() {
        command.to_string()
    } else {
        format!("{}/{}", bin_path, command)
    }
}

pub(crate) fn join_command(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

pub(crate) fn reject_dependencies(job: &JobDescriptor, backend: Backend) -> Result<()> {
    if job.dependent_jobs().is_empty() {
        Ok(())
    } else {
        Err(JobError::UnsupportedDependency { backend })
    }
}

/// Status when the output has no line for the job
///
/// Silence from the backend means the job is gone, unless the command complained on stderr or
/// exited non-zero.
pub(crate) fn unlisted_status(job_id: &str, exit_code: i32, stderr: &str) -> JobStatus {
    if exit_code == 0 && stderr.trim().is_empty() {
        JobStatus::new(job_id, StatusCode::NotInQueue)
    } else {
        log::warn!("No status for job {} (exit code {}): {}", job_id, exit_code, stderr.trim());
        JobStatus::new(job_id, StatusCode::Error)
    }
}

/// Successful deletion: zero exit and nothing on stderr
pub(crate) fn clean_exit(exit_code: i32, stderr: &str) -> bool {
    exit_code == 0 && stderr.trim().is_empty()
}

pub(crate) fn first_line(stdout: &str) -> Option<&str> {
    stdout.lines().map(str::trim).find(|line| !line.is_empty())
}

pub(crate) fn submit_parse_error(stdout: &str, stderr: &str) -> JobError {
    JobError::SubmitParse { stdout: stdout.to_string(), stderr: stderr.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_names_are_case_insensitive() {
        assert_eq!("PBS".parse::<Backend>().unwrap(), Backend::Pbs);
        assert_eq!("slurm".parse::<Backend>().unwrap(), Backend::Slurm);
        assert!(matches!("torque".parse::<Backend>(), Err(JobError::UnknownBackend(_))));
    }

    #[test]
    fn command_path_prefixes_bin_path() {
        assert_eq!(command_path("", "qsub"), "qsub");
        assert_eq!(command_path("/opt/pbs/bin/", "qsub"), "/opt/pbs/bin/qsub");
    }

    #[test]
    fn join_command_skips_empty_parts() {
        assert_eq!(join_command(&["qsub", "", " -V ", "job.pbs"]), "qsub -V job.pbs");
    }

    #[test]
    fn every_backend_builds_an_adapter() {
        for backend in Backend::ALL {
            assert_eq!(backend.adapter("").backend(), backend);
            assert_eq!(backend.to_string().to_lowercase().parse::<Backend>().unwrap(), backend);
        }
    }
}
