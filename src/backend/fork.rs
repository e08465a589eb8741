use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::backend::{
    clean_exit, command_path, first_line, join_command, reject_dependencies, submit_parse_error, unlisted_status,
    Backend, BackendAdapter,
};
use crate::error::{JobError, Result};
use crate::job::{JobDescriptor, JobStatus, StatusCode};
use crate::template;

static TEMPLATE: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/templates/fork.txt"));

static SUBMITTED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^Submitted job (\d+)").unwrap());

/// Helper script that backgrounds the job script and prints its process ID
pub const HELPER_SCRIPT: &str = "jmgr-fork.sh";

const HELPER_SOURCE: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/scripts/jmgr-fork.sh"));

#[derive(Debug)]
pub struct ForkSupport {
    helper: String,
    ps: String,
    kill: String,
}

impl ForkSupport {
    pub fn new(bin_path: &str) -> ForkSupport {
        ForkSupport {
            helper: command_path(bin_path, HELPER_SCRIPT),
            ps: "ps".to_string(),
            kill: "kill".to_string(),
        }
    }
}

impl BackendAdapter for ForkSupport {
    fn backend(&self) -> Backend {
        Backend::Fork
    }

    fn submit_file_extension(&self) -> &'static str {
        "sh"
    }

    fn render_submit_file(&self, job: &JobDescriptor) -> Result<String> {
        template::render("fork", TEMPLATE, job)
    }

    fn submit_command(&self, job: &JobDescriptor, options: &str) -> Result<String> {
        reject_dependencies(job, Backend::Fork)?;
        if job.is_task_parallel() {
            return Err(JobError::UnsupportedTaskParallel { backend: Backend::Fork });
        }
        if !options.trim().is_empty() {
            warn!("Fork backend ignores submit options: {}", options);
        }
        let submit_file = job.submit_file_name(self.submit_file_extension());
        Ok(join_command(&["sh", &self.helper, &submit_file]))
    }

    fn helper_scripts(&self) -> &'static [(&'static str, &'static str)] {
        &[(HELPER_SCRIPT, HELPER_SOURCE)]
    }

    fn parse_submit_output(&self, stdout: &str, stderr: &str) -> Result<String> {
        first_line(stdout)
            .and_then(|line| SUBMITTED.captures(line))
            .map(|captures| captures[1].to_string())
            .ok_or_else(|| submit_parse_error(stdout, stderr))
    }

    fn status_command(&self, job_id: &str) -> String {
        format!("{} -p {} -o pid,user,etime,lstart", self.ps, job_id)
    }

    /// Parse `ps` output
    ///
    /// ```text
    ///   PID USER         ELAPSED                  STARTED
    ///  4242 alice          00:05 Fri Oct 16 10:02:11 2026
    /// ```
    ///
    /// `ps` exits 1 when the process is gone, which just means the job finished.
    fn parse_status_output(&self, job_id: &str, exit_code: i32, stdout: &str, stderr: &str) -> Result<JobStatus> {
        let line = stdout
            .lines()
            .map(|line| line.split_whitespace().collect::<Vec<_>>())
            .find(|fields| fields.first() == Some(&job_id));

        if let Some(fields) = line {
            let mut status = JobStatus::new(job_id, StatusCode::Running);
            status.owner = fields.get(1).map(|s| s.to_string()).unwrap_or_default();
            status.run_time = fields.get(2).map(|s| s.to_string()).unwrap_or_default();
            status.submit_time = fields.get(3..).map(|s| s.join(" ")).unwrap_or_default();
            return Ok(status);
        }

        if exit_code == 1 {
            debug!("Process {} is not running", job_id);
            return Ok(JobStatus::new(job_id, StatusCode::NotInQueue));
        }
        Ok(unlisted_status(job_id, exit_code, stderr))
    }

    fn delete_command(&self, job_id: &str) -> String {
        format!("{} -9 {}", self.kill, job_id)
    }

    fn parse_delete_output(&self, _job_id: &str, exit_code: i32, _stdout: &str, stderr: &str) -> bool {
        clean_exit(exit_code, stderr)
    }
}
