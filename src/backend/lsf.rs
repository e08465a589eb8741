use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::backend::{
    command_path, first_line, join_command, submit_parse_error, unlisted_status, Backend, BackendAdapter,
};
use crate::error::Result;
use crate::job::{JobDescriptor, JobStatus, StatusCode};
use crate::template;

static TEMPLATE: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/templates/lsf.txt"));

static SUBMITTED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^Job <(\d+)>").unwrap());

#[derive(Debug)]
pub struct LsfSupport {
    bsub: String,
    bjobs: String,
    bkill: String,
}

impl LsfSupport {
    pub fn new(bin_path: &str) -> LsfSupport {
        LsfSupport {
            bsub: command_path(bin_path, "bsub"),
            bjobs: command_path(bin_path, "bjobs"),
            bkill: command_path(bin_path, "bkill"),
        }
    }
}

impl BackendAdapter for LsfSupport {
    fn backend(&self) -> Backend {
        Backend::Lsf
    }

    fn submit_file_extension(&self) -> &'static str {
        "lsf"
    }

    fn render_submit_file(&self, job: &JobDescriptor) -> Result<String> {
        template::render("lsf", TEMPLATE, job)
    }

    /// `bsub` reads the job script from stdin
    fn submit_command(&self, job: &JobDescriptor, options: &str) -> Result<String> {
        let ids = job.dependency_ids()?;
        let dependencies = if ids.is_empty() {
            String::new()
        } else {
            let ended: Vec<String> = ids.iter().map(|id| format!("ended({})", id)).collect();
            format!("-w '{}'", ended.join("&&"))
        };
        let tasks = if job.is_task_parallel() {
            format!("-J \"{}[1-{}]\"", job.id(), job.num_tasks())
        } else {
            String::new()
        };
        let submit_file = format!("< {}", job.submit_file_name(self.submit_file_extension()));
        Ok(join_command(&[&self.bsub, &dependencies, &tasks, options, &submit_file]))
    }

    fn parse_submit_output(&self, stdout: &str, stderr: &str) -> Result<String> {
        first_line(stdout)
            .and_then(|line| SUBMITTED.captures(line))
            .map(|captures| captures[1].to_string())
            .ok_or_else(|| submit_parse_error(stdout, stderr))
    }

    fn status_command(&self, job_id: &str) -> String {
        format!("{} {}", self.bjobs, job_id)
    }

    /// Parse `bjobs` output
    ///
    /// ```text
    /// JOBID   USER    STAT  QUEUE      FROM_HOST   EXEC_HOST   JOB_NAME   SUBMIT_TIME
    /// 42      alice   RUN   normal     head        node01      run.sh     Oct 16 10:02
    /// ```
    ///
    /// Jobs that have aged out of `mbatchd` memory are reported as "not found", which is benign.
    fn parse_status_output(&self, job_id: &str, exit_code: i32, stdout: &str, stderr: &str) -> Result<JobStatus> {
        let line = stdout
            .lines()
            .map(|line| line.split_whitespace().collect::<Vec<_>>())
            .find(|fields| fields.first() == Some(&job_id));

        let Some(fields) = line else {
            if stderr.contains("is not found") {
                debug!("LSF no longer knows job {}", job_id);
                return Ok(JobStatus::new(job_id, StatusCode::NotInQueue));
            }
            return Ok(unlisted_status(job_id, exit_code, stderr));
        };

        let code = match fields.get(2).copied().unwrap_or_default() {
            "RUN" => StatusCode::Running,
            "PEND" => StatusCode::Wait,
            "EXIT" => StatusCode::Error,
            "DONE" => StatusCode::NotInQueue,
            _ => StatusCode::Wait,
        };
        let mut status = JobStatus::new(job_id, code);
        status.owner = fields.get(1).map(|s| s.to_string()).unwrap_or_default();
        if fields.len() >= 8 {
            status.submit_time = fields[fields.len() - 3..].join(" ");
        }
        Ok(status)
    }

    fn delete_command(&self, job_id: &str) -> String {
        format!("{} {}", self.bkill, job_id)
    }

    fn parse_delete_output(&self, _job_id: &str, exit_code: i32, stdout: &str, _stderr: &str) -> bool {
        exit_code == 0 && stdout.contains("is being terminated")
    }
}
