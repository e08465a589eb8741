use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::backend::{
    clean_exit, command_path, join_command, submit_parse_error, unlisted_status, Backend, BackendAdapter,
};
use crate::error::Result;
use crate::job::{JobDescriptor, JobStatus, StatusCode, TaskParallelJobStatus};
use crate::template;

static TEMPLATE: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/templates/slurm.txt"));

static SUBMITTED: Lazy<Regex> = Lazy::new(|| Regex::new(r"Submitted batch job (\d+)").unwrap());

/// `squeue` prints this once a finished job has left the controller's memory
const INVALID_JOB: &str = "Invalid job id specified";

#[derive(Debug)]
pub struct SlurmSupport {
    sbatch: String,
    squeue: String,
    scancel: String,
}

impl SlurmSupport {
    pub fn new(bin_path: &str) -> SlurmSupport {
        SlurmSupport {
            sbatch: command_path(bin_path, "sbatch"),
            squeue: command_path(bin_path, "squeue"),
            scancel: command_path(bin_path, "scancel"),
        }
    }
}

impl BackendAdapter for SlurmSupport {
    fn backend(&self) -> Backend {
        Backend::Slurm
    }

    fn submit_file_extension(&self) -> &'static str {
        "slurm"
    }

    fn render_submit_file(&self, job: &JobDescriptor) -> Result<String> {
        template::render("slurm", TEMPLATE, job)
    }

    fn submit_command(&self, job: &JobDescriptor, options: &str) -> Result<String> {
        let ids = job.dependency_ids()?;
        let dependencies = if ids.is_empty() {
            String::new()
        } else {
            format!("--dependency=afterok:{}", ids.join(":"))
        };
        let tasks = if job.is_task_parallel() {
            format!("--array=0-{}", job.num_tasks() - 1)
        } else {
            String::new()
        };
        let submit_file = job.submit_file_name(self.submit_file_extension());
        Ok(join_command(&[&self.sbatch, &dependencies, &tasks, options, &submit_file]))
    }

    fn parse_submit_output(&self, stdout: &str, stderr: &str) -> Result<String> {
        SUBMITTED
            .captures(stdout)
            .map(|captures| captures[1].to_string())
            .ok_or_else(|| submit_parse_error(stdout, stderr))
    }

    fn status_command(&self, job_id: &str) -> String {
        format!("{} -j {}", self.squeue, job_id)
    }

    /// Parse `squeue` output
    ///
    /// ```text
    ///  JOBID PARTITION     NAME     USER ST       TIME  NODES NODELIST(REASON)
    ///   8125     debug    job-1    alice  R       0:05      1 node01
    ///   8126_[0-2] debug  job-2    alice PD       0:00      1 (Priority)
    /// ```
    ///
    /// Array tasks are listed as `<id>_<index>`; one running task makes the job running.
    fn parse_status_output(&self, job_id: &str, exit_code: i32, stdout: &str, stderr: &str) -> Result<JobStatus> {
        let task_prefix = format!("{}_", job_id);
        let mut status: Option<JobStatus> = None;

        for fields in stdout.lines().map(|line| line.split_whitespace().collect::<Vec<_>>()) {
            let Some(first) = fields.first() else { continue };
            if *first != job_id && !first.starts_with(&task_prefix) {
                continue;
            }

            let code = match fields.get(4).and_then(|state| state.chars().next()) {
                Some('C') => StatusCode::NotInQueue,
                Some('F') | Some('R') => StatusCode::Running,
                _ => StatusCode::Wait,
            };

            match status.as_mut() {
                Some(existing) => {
                    if code == StatusCode::Running {
                        existing.code = code;
                    }
                }
                None => {
                    let mut parsed = JobStatus::new(job_id, code);
                    parsed.owner = fields.get(3).map(|s| s.to_string()).unwrap_or_default();
                    parsed.run_time = fields.get(5).map(|s| s.to_string()).unwrap_or_default();
                    status = Some(parsed);
                }
            }
        }

        if let Some(status) = status {
            return Ok(status);
        }
        if stderr.contains(INVALID_JOB) {
            debug!("SLURM no longer knows job {}", job_id);
            return Ok(JobStatus::new(job_id, StatusCode::NotInQueue));
        }
        Ok(unlisted_status(job_id, exit_code, stderr))
    }

    fn delete_command(&self, job_id: &str) -> String {
        format!("{} {}", self.scancel, job_id)
    }

    fn parse_delete_output(&self, _job_id: &str, exit_code: i32, _stdout: &str, stderr: &str) -> bool {
        clean_exit(exit_code, stderr)
    }

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

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    static SQUEUE_OUTPUT: &str = " JOBID PARTITION     NAME     USER ST       TIME  NODES NODELIST(REASON)
  8125     debug    job-1    alice  R       0:05      1 node01
  8126_[0-2] debug  job-2    alice PD       0:00      1 (Priority)
  81250    debug    job-3    bob    R       1:00      1 node02
";

    #[test]
    fn submit_output_is_parsed() {
        let support = SlurmSupport::new("");
        assert_eq!(support.parse_submit_output("Submitted batch job 8125\n", "").unwrap(), "8125");
    }

    #[test]
    fn rejected_submission_keeps_stderr() {
        let support = SlurmSupport::new("");
        let err = support
            .parse_submit_output("", "sbatch: error: Batch job submission failed: Invalid account")
            .unwrap_err();
        assert!(err.to_string().contains("Invalid account"));
    }

    #[test]
    fn status_line_is_parsed() {
        let support = SlurmSupport::new("");
        let status = support.parse_status_output("8125", 0, SQUEUE_OUTPUT, "").unwrap();
        assert_eq!(status.code, StatusCode::Running);
        assert_eq!(status.owner, "alice");
        assert_eq!(status.run_time, "0:05");
    }

    #[test]
    fn pending_array_waits() {
        let support = SlurmSupport::new("");
        let status = support.parse_status_output("8126", 0, SQUEUE_OUTPUT, "").unwrap();
        assert_eq!(status.code, StatusCode::Wait);
    }

    #[test]
    fn unrelated_job_is_not_in_queue() {
        let support = SlurmSupport::new("");
        let status = support.parse_status_output("812", 0, SQUEUE_OUTPUT, "").unwrap();
        assert_eq!(status.code, StatusCode::NotInQueue);
    }

    #[test]
    fn forgotten_job_is_not_in_queue() {
        let support = SlurmSupport::new("");
        let stderr = "slurm_load_jobs error: Invalid job id specified\n";
        let status = support.parse_status_output("8125", 1, "", stderr).unwrap();
        assert_eq!(status.code, StatusCode::NotInQueue);
    }

    #[test]
    fn dependencies_use_sbatch_syntax() {
        let support = SlurmSupport::new("");
        let job = JobDescriptor::builder()
            .id("job-1")
            .executable("/bin/true", false, "")
            .unwrap()
            .depends_on(Arc::new(JobDescriptor::submitted("a", "100", StatusCode::Wait)))
            .depends_on(Arc::new(JobDescriptor::submitted("b", "101", StatusCode::Wait)))
            .tasks(4)
            .build()
            .unwrap();
        assert_eq!(
            support.submit_command(&job, "").unwrap(),
            "sbatch --dependency=afterok:100:101 --array=0-3 hpcc-job-1.slurm"
        );
    }

    #[test]
    fn task_status_replicates_job_status() {
        let support = SlurmSupport::new("");
        let status = support.parse_task_status_output("8126", 3, 0, SQUEUE_OUTPUT, "").unwrap();
        assert_eq!(status.task("2"), StatusCode::Wait);
    }
}
