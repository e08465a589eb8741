use log::debug;

use crate::backend::{
    clean_exit, command_path, first_line, join_command, submit_parse_error, unlisted_status, Backend,
    BackendAdapter,
};
use crate::error::Result;
use crate::job::{JobDescriptor, JobStatus, StatusCode, TaskParallelJobStatus};
use crate::template;

static TEMPLATE: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/templates/pbs.txt"));

/// `qstat` prints this for jobs the server has already forgotten
const UNKNOWN_JOB: &str = "qstat: Unknown Job Id";

#[derive(Debug)]
pub struct PbsSupport {
    qsub: String,
    qstat: String,
    qdel: String,
}

impl PbsSupport {
    pub fn new(bin_path: &str) -> PbsSupport {
        PbsSupport {
            qsub: command_path(bin_path, "qsub"),
            qstat: command_path(bin_path, "qstat"),
            qdel: command_path(bin_path, "qdel"),
        }
    }
}

/// Whether a `qstat` job ID column refers to the job
///
/// `qstat` truncates long server names, so IDs also match when the shorter one is a prefix of the
/// other that stops at a `.` or `[`, or that already carries part of the server name.
pub(crate) fn same_job(field: &str, job_id: &str) -> bool {
    if field == job_id {
        return true;
    }
    let (short, long) = if field.len() < job_id.len() { (field, job_id) } else { (job_id, field) };
    if !short.starts_with(|c: char| c.is_ascii_digit()) || !long.starts_with(short) {
        return false;
    }
    long[short.len()..].starts_with(|c: char| c == '.' || c == '[') || short.contains('.')
}

impl BackendAdapter for PbsSupport {
    fn backend(&self) -> Backend {
        Backend::Pbs
    }

    fn submit_file_extension(&self) -> &'static str {
        "pbs"
    }

    fn render_submit_file(&self, job: &JobDescriptor) -> Result<String> {
        template::render("pbs", TEMPLATE, job)
    }

    fn submit_command(&self, job: &JobDescriptor, options: &str) -> Result<String> {
        let ids = job.dependency_ids()?;
        let dependencies = if ids.is_empty() {
            String::new()
        } else {
            format!("-W depend=afterok:{}", ids.join(":"))
        };
        let tasks = if job.is_task_parallel() {
            format!("-t 0-{}", job.num_tasks() - 1)
        } else {
            String::new()
        };
        let submit_file = job.submit_file_name(self.submit_file_extension());
        Ok(join_command(&[&self.qsub, &dependencies, &tasks, options, &submit_file]))
    }

    /// `qsub` prints nothing but the job ID, e.g. `12345.server`
    fn parse_submit_output(&self, stdout: &str, stderr: &str) -> Result<String> {
        first_line(stdout)
            .filter(|line| line.starts_with(|c: char| c.is_ascii_digit()))
            .map(str::to_string)
            .ok_or_else(|| submit_parse_error(stdout, stderr))
    }

    fn status_command(&self, job_id: &str) -> String {
        format!("{} {}", self.qstat, job_id)
    }

    /// Parse `qstat` output
    ///
    /// ```text
    /// Job id            Name             User              Time Use S Queue
    /// ----------------  ---------------- ----------------  -------- - -----
    /// 12345.server      job-1            alice             00:00:01 R batch
    /// ```
    fn parse_status_output(&self, job_id: &str, exit_code: i32, stdout: &str, stderr: &str) -> Result<JobStatus> {
        let line = stdout
            .lines()
            .map(|line| line.split_whitespace().collect::<Vec<_>>())
            .find(|fields| fields.first().map_or(false, |field| same_job(field, job_id)));

        let Some(fields) = line else {
            if stderr.trim_start().starts_with(UNKNOWN_JOB) {
                debug!("PBS server no longer knows job {}", job_id);
                return Ok(JobStatus::new(job_id, StatusCode::NotInQueue));
            }
            return Ok(unlisted_status(job_id, exit_code, stderr));
        };

        let code = match fields.get(4).and_then(|state| state.chars().next()) {
            Some('C') => StatusCode::NotInQueue,
            Some('R') | Some('E') => StatusCode::Running,
            Some('Q') | Some('H') | Some('T') | Some('W') | Some('S') => StatusCode::Wait,
            _ => StatusCode::Wait,
        };
        let mut status = JobStatus::new(job_id, code);
        status.owner = fields.get(2).map(|s| s.to_string()).unwrap_or_default();
        status.run_time = fields.get(3).map(|s| s.to_string()).unwrap_or_default();
        Ok(status)
    }

    fn delete_command(&self, job_id: &str) -> String {
        format!("{} {}", self.qdel, job_id)
    }

    fn parse_delete_output(&self, _job_id: &str, exit_code: i32, _stdout: &str, stderr: &str) -> bool {
        clean_exit(exit_code, stderr)
    }

    /// PBS can't report tasks individually, so the job status is used for every task
    fn task_status_command(&self, job_id: &str) -> Result<String> {
        Ok(self.status_command(job_id))
    }

    fn parse_task_status_output(
        &self,
        job_id: &str,
        num_tasks: u32,
        exit_code: i32,
        stdout: &str,
        stderr: &str,
    ) -> Result<TaskParallelJobStatus> {
        let status = self.parse_status_output(job_id, exit_code, stdout, stderr)?;
        Ok(TaskParallelJobStatus::uniform(status, num_tasks))
    }
}
