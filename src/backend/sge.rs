use once_cell::sync::Lazy;
use regex::Regex;

use crate::backend::{
    clean_exit, command_path, join_command, submit_parse_error, unlisted_status, Backend, BackendAdapter,
};
use crate::error::Result;
use crate::job::{JobDescriptor, JobStatus, StatusCode};
use crate::template;

static TEMPLATE: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/templates/sge.txt"));

static SUBMITTED: Lazy<Regex> = Lazy::new(|| Regex::new(r"Your job(?:-array)? (\d+)\S* \(").unwrap());

#[derive(Debug)]
pub struct SgeSupport {
    qsub: String,
    qstat: String,
    qdel: String,
}

impl SgeSupport {
    pub fn new(bin_path: &str) -> SgeSupport {
        SgeSupport {
            qsub: command_path(bin_path, "qsub"),
            qstat: command_path(bin_path, "qstat"),
            qdel: command_path(bin_path, "qdel"),
        }
    }
}

/// Map an SGE state string such as `qw`, `hqw`, `Eqw` or `dr`
///
/// Any `E` means the job is in error; otherwise the last letter carries the state.
fn state_code(state: &str) -> StatusCode {
    if state.contains('E') {
        return StatusCode::Error;
    }
    match state.chars().last() {
        Some('r') | Some('R') | Some('t') | Some('d') => StatusCode::Running,
        Some('s') | Some('S') | Some('w') | Some('h') | Some('T') => StatusCode::Wait,
        _ => StatusCode::Wait,
    }
}

impl BackendAdapter for SgeSupport {
    fn backend(&self) -> Backend {
        Backend::Sge
    }

    fn submit_file_extension(&self) -> &'static str {
        "sge"
    }

    fn render_submit_file(&self, job: &JobDescriptor) -> Result<String> {
        template::render("sge", TEMPLATE, job)
    }

    fn submit_command(&self, job: &JobDescriptor, options: &str) -> Result<String> {
        let ids = job.dependency_ids()?;
        let dependencies = if ids.is_empty() {
            String::new()
        } else {
            format!("-hold_jid {}", ids.join(","))
        };
        // SGE task IDs start at 1
        let tasks = if job.is_task_parallel() {
            format!("-t 1-{}", job.num_tasks())
        } else {
            String::new()
        };
        let submit_file = job.submit_file_name(self.submit_file_extension());
        Ok(join_command(&[&self.qsub, &dependencies, &tasks, options, &submit_file]))
    }

    fn parse_submit_output(&self, stdout: &str, stderr: &str) -> Result<String> {
        SUBMITTED
            .captures(stdout)
            .map(|captures| captures[1].to_string())
            .ok_or_else(|| submit_parse_error(stdout, stderr))
    }

    /// Plain `qstat` lists all of the user's jobs; the job's own line is picked out when parsing
    fn status_command(&self, _job_id: &str) -> String {
        self.qstat.clone()
    }

    /// Parse `qstat` output
    ///
    /// ```text
    /// job-ID  prior   name       user         state submit/start at     queue          slots ja-task-ID
    /// -----------------------------------------------------------------------------------------------
    ///     100 0.55500 job-1      alice        r     10/16/2026 10:02:11 all.q@node01       1
    /// ```
    fn parse_status_output(&self, job_id: &str, exit_code: i32, stdout: &str, stderr: &str) -> Result<JobStatus> {
        let line = stdout
            .lines()
            .map(|line| line.split_whitespace().collect::<Vec<_>>())
            .find(|fields| fields.first() == Some(&job_id));

        let Some(fields) = line else {
            return Ok(unlisted_status(job_id, exit_code, stderr));
        };

        let code = fields.get(4).map(|state| state_code(state)).unwrap_or(StatusCode::Wait);
        let mut status = JobStatus::new(job_id, code);
        status.owner = fields.get(3).map(|s| s.to_string()).unwrap_or_default();
        if fields.len() >= 7 {
            status.submit_time = fields[5..7].join(" ");
        }
        Ok(status)
    }

    fn delete_command(&self, job_id: &str) -> String {
        format!("{} {}", self.qdel, job_id)
    }

    fn parse_delete_output(&self, _job_id: &str, exit_code: i32, _stdout: &str, stderr: &str) -> bool {
        clean_exit(exit_code, stderr)
    }
}
