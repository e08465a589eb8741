use once_cell::sync::Lazy;
use regex::Regex;

use crate::backend::{
    clean_exit, command_path, join_command, reject_dependencies, submit_parse_error, unlisted_status, Backend,
    BackendAdapter,
};
use crate::error::Result;
use crate::job::{JobDescriptor, JobStatus, StatusCode, TaskParallelJobStatus};
use crate::template;

static TEMPLATE: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/templates/moab.txt"));

static SUBMITTED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(\d+)").unwrap());
static STATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"STATE=([^;]*);UNAME").unwrap());
static OWNER: Lazy<Regex> = Lazy::new(|| Regex::new(r"UNAME=([^;]*)").unwrap());

/// Moab states that mean the job hasn't started yet
const PENDING_STATES: [&str; 9] = [
    "PENDING",
    "IDLE",
    "STARTING",
    "BATCHHOLD",
    "SYSTEMHOLD",
    "USERHOLD",
    "DEFERRED",
    "MIGRATED",
    "STAGING",
];

#[derive(Debug)]
pub struct MoabSupport {
    msub: String,
    checkjob: String,
    showq: String,
    mjobctl: String,
}

impl MoabSupport {
    pub fn new(bin_path: &str) -> MoabSupport {
        MoabSupport {
            msub: command_path(bin_path, "msub"),
            checkjob: command_path(bin_path, "checkjob"),
            showq: command_path(bin_path, "showq"),
            mjobctl: command_path(bin_path, "mjobctl"),
        }
    }
}

fn state_code(state: &str) -> StatusCode {
    match state.trim().to_uppercase().as_str() {
        "RUNNING" => StatusCode::Running,
        "COMPLETED" | "REMOVED" => StatusCode::NotInQueue,
        pending if PENDING_STATES.contains(&pending) => StatusCode::Wait,
        // anything else Moab reports is treated as not started yet
        _ => StatusCode::Wait,
    }
}

/// Whether an attribute line is led by some other job's ID, e.g. `Moab.4712 AName=...`
fn names_other_job(line: &str, job_id: &str) -> bool {
    let Some((first, _)) = line.trim().split_once(char::is_whitespace) else {
        return false;
    };
    if first.contains('=') {
        return false;
    }
    first != job_id && !first.ends_with(&format!(".{}", job_id))
}

impl BackendAdapter for MoabSupport {
    fn backend(&self) -> Backend {
        Backend::Moab
    }

    fn submit_file_extension(&self) -> &'static str {
        "moab"
    }

    fn render_submit_file(&self, job: &JobDescriptor) -> Result<String> {
        template::render("moab", TEMPLATE, job)
    }

    fn submit_command(&self, job: &JobDescriptor, options: &str) -> Result<String> {
        reject_dependencies(job, Backend::Moab)?;
        let tasks = if job.is_task_parallel() {
            format!("-t {}[0-{}]", job.id(), job.num_tasks() - 1)
        } else {
            String::new()
        };
        let submit_file = job.submit_file_name(self.submit_file_extension());
        Ok(join_command(&[&self.msub, &tasks, options, &submit_file]))
    }

    /// `msub` prints the job ID on a line of its own, usually after a blank line
    fn parse_submit_output(&self, stdout: &str, stderr: &str) -> Result<String> {
        stdout
            .lines()
            .find_map(|line| SUBMITTED.captures(line))
            .map(|captures| captures[1].to_string())
            .ok_or_else(|| submit_parse_error(stdout, stderr))
    }

    fn status_command(&self, job_id: &str) -> String {
        format!("{} -A {}", self.checkjob, job_id)
    }

    /// Parse `checkjob -A` output, a `;` separated attribute list such as
    /// `AName=job-1;STATE=Running;UNAME=alice;...`, sometimes led by the job ID
    fn parse_status_output(&self, job_id: &str, exit_code: i32, stdout: &str, stderr: &str) -> Result<JobStatus> {
        if stdout.trim().is_empty() && stderr.trim().is_empty() {
            return Ok(JobStatus::new(job_id, StatusCode::NotInQueue));
        }

        let mut records = stdout.lines().filter(|line| STATE.is_match(line)).peekable();
        if records.peek().is_none() {
            return Ok(unlisted_status(job_id, exit_code, stderr));
        }
        let Some(record) = records.find(|line| !names_other_job(line, job_id)) else {
            return Ok(JobStatus::new(job_id, StatusCode::NotInQueue));
        };

        let state = STATE.captures(record).map(|captures| captures[1].trim().to_string()).unwrap_or_default();
        let code = if state.is_empty() { StatusCode::NotInQueue } else { state_code(&state) };
        let mut status = JobStatus::new(job_id, code);
        if let Some(owner) = OWNER.captures(record) {
            status.owner = owner[1].to_string();
        }
        Ok(status)
    }

    fn delete_command(&self, job_id: &str) -> String {
        format!("{} -c {}", self.mjobctl, job_id)
    }

    fn parse_delete_output(&self, _job_id: &str, exit_code: i32, _stdout: &str, stderr: &str) -> bool {
        clean_exit(exit_code, stderr)
    }

    /// The job's attributes followed by the list of running jobs, where array tasks show up as
    /// `<id>[<index>]`
    fn task_status_command(&self, job_id: &str) -> Result<String> {
        Ok(format!("{}; {} -r", self.status_command(job_id), self.showq))
    }

    fn parse_task_status_output(
        &self,
        job_id: &str,
        num_tasks: u32,
        exit_code: i32,
        stdout: &str,
        stderr: &str,
    ) -> Result<TaskParallelJobStatus> {
        let job = self.parse_status_output(job_id, exit_code, stdout, stderr)?;
        if job.code != StatusCode::Running {
            return Ok(TaskParallelJobStatus::uniform(job, num_tasks));
        }

        let task_prefix = format!("{}[", job_id);
        let mut status = TaskParallelJobStatus::new(job, num_tasks);
        for line in stdout.lines() {
            let Some(first) = line.split_whitespace().next() else { continue };
            let Some(index) = first.strip_prefix(&task_prefix).and_then(|rest| rest.strip_suffix(']')) else {
                continue;
            };
            if let Ok(index) = index.parse::<u32>() {
                status.set_task(index, StatusCode::Running);
            }
        }
        Ok(status)
    }
}
