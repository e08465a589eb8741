use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Canonical job states every backend status vocabulary is normalised into
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusCode {
    /// The backend has no information about the job: finished, removed or never seen
    NotInQueue,
    Wait,
    Running,
    Error,
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StatusCode::NotInQueue => write!(f, "NotInQueue"),
            StatusCode::Wait => write!(f, "Wait"),
            StatusCode::Running => write!(f, "Running"),
            StatusCode::Error => write!(f, "Error"),
        }
    }
}

#[derive(Error, Debug)]
#[error("Unknown status code: {0}")]
pub struct ParseStatusCodeError(String);

impl FromStr for StatusCode {
    type Err = ParseStatusCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NotInQueue" => Ok(StatusCode::NotInQueue),
            "Wait" => Ok(StatusCode::Wait),
            "Running" => Ok(StatusCode::Running),
            "Error" => Ok(StatusCode::Error),
            _ => Err(ParseStatusCodeError(s.to_string())),
        }
    }
}

/// Status snapshot for a single job, parsed from backend output
///
/// Submission time and run time are free-form strings in whatever format the backend prints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatus {
    pub job_id: String,
    pub code: StatusCode,
    pub owner: String,
    pub submit_time: String,
    pub run_time: String,
}

impl JobStatus {
    pub fn new(job_id: &str, code: StatusCode) -> JobStatus {
        JobStatus {
            job_id: job_id.to_string(),
            code,
            owner: String::new(),
            submit_time: String::new(),
            run_time: String::new(),
        }
    }
}

/// Status of an array job: the job-level status plus one entry per task index
///
/// Task indices run over `[0, num_tasks)`. An index the backend said nothing about stays
/// [`StatusCode::NotInQueue`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskParallelJobStatus {
    pub job: JobStatus,
    tasks: BTreeMap<u32, StatusCode>,
}

impl TaskParallelJobStatus {
    pub fn new(job: JobStatus, num_tasks: u32) -> TaskParallelJobStatus {
        let tasks = (0..num_tasks).map(|index| (index, StatusCode::NotInQueue)).collect();
        TaskParallelJobStatus { job, tasks }
    }

    /// Every task gets the job-level status, for backends that can't report tasks individually
    pub fn uniform(job: JobStatus, num_tasks: u32) -> TaskParallelJobStatus {
        let code = job.code;
        let tasks = (0..num_tasks).map(|index| (index, code)).collect();
        TaskParallelJobStatus { job, tasks }
    }

    /// Set the status of one task, ignoring indices outside the job's task range
    pub fn set_task(&mut self, index: u32, code: StatusCode) {
        if let Some(entry) = self.tasks.get_mut(&index) {
            *entry = code;
        }
    }

    /// Status of the task with the given decimal index
    pub fn task(&self, index: &str) -> StatusCode {
        index
            .trim()
            .parse::<u32>()
            .ok()
            .and_then(|index| self.tasks.get(&index).copied())
            .unwrap_or(StatusCode::NotInQueue)
    }

    pub fn tasks(&self) -> impl Iterator<Item = (u32, StatusCode)> + '_ {
        self.tasks.iter().map(|(index, code)| (*index, *code))
    }

    pub fn num_tasks(&self) -> usize {
        self.tasks.len()
    }
}

/// Result of a status query: plain jobs report one status, array jobs report per-task status too
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusReport {
    Job(JobStatus),
    Tasks(TaskParallelJobStatus),
}

impl StatusReport {
    pub fn job(&self) -> &JobStatus {
        match self {
            StatusReport::Job(status) => status,
            StatusReport::Tasks(status) => &status.job,
        }
    }

    pub fn code(&self) -> StatusCode {
        self.job().code
    }

    pub fn tasks(&self) -> Option<&TaskParallelJobStatus> {
        match self {
            StatusReport::Job(_) => None,
            StatusReport::Tasks(status) => Some(status),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_task_index_is_not_in_queue() {
        let status = TaskParallelJobStatus::new(JobStatus::new("7", StatusCode::Running), 2);
        assert_eq!(status.task("0"), StatusCode::NotInQueue);
        assert_eq!(status.task("5"), StatusCode::NotInQueue);
        assert_eq!(status.task("nope"), StatusCode::NotInQueue);
    }

    #[test]
    fn set_task_outside_range_is_ignored() {
        let mut status = TaskParallelJobStatus::new(JobStatus::new("7", StatusCode::Running), 2);
        status.set_task(1, StatusCode::Running);
        status.set_task(9, StatusCode::Running);
        assert_eq!(status.num_tasks(), 2);
        assert_eq!(status.task("1"), StatusCode::Running);
    }

    #[test]
    fn uniform_replicates_job_status() {
        let status = TaskParallelJobStatus::uniform(JobStatus::new("7", StatusCode::Wait), 3);
        assert!(status.tasks().all(|(_, code)| code == StatusCode::Wait));
    }

    #[test]
    fn status_code_round_trips_through_display() {
        for code in [StatusCode::NotInQueue, StatusCode::Wait, StatusCode::Running, StatusCode::Error] {
            assert_eq!(code.to_string().parse::<StatusCode>().unwrap(), code);
        }
    }
}
