use crate::backend::{
    clean_exit, command_path, join_command, reject_dependencies, submit_parse_error, unlisted_status, Backend,
    BackendAdapter,
};
use crate::error::Result;
use crate::job::{JobDescriptor, JobStatus, StatusCode};
use crate::template;

static TEMPLATE: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/templates/condor.txt"));

const SUBMITTED: &str = "submitted to cluster ";

#[derive(Debug)]
pub struct CondorSupport {
    submit: String,
    queue: String,
    remove: String,
}

impl CondorSupport {
    pub fn new(bin_path: &str) -> CondorSupport {
        CondorSupport {
            submit: command_path(bin_path, "condor_submit"),
            queue: command_path(bin_path, "condor_q"),
            remove: command_path(bin_path, "condor_rm"),
        }
    }
}

impl BackendAdapter for CondorSupport {
    fn backend(&self) -> Backend {
        Backend::Condor
    }

    fn submit_file_extension(&self) -> &'static str {
        "condor"
    }

    fn render_submit_file(&self, job: &JobDescriptor) -> Result<String> {
        template::render("condor", TEMPLATE, job)
    }

    fn submit_command(&self, job: &JobDescriptor, options: &str) -> Result<String> {
        reject_dependencies(job, Backend::Condor)?;
        let submit_file = job.submit_file_name(self.submit_file_extension());
        Ok(join_command(&[&self.submit, options, &submit_file]))
    }

    fn parse_submit_output(&self, stdout: &str, stderr: &str) -> Result<String> {
        stdout
            .lines()
            .filter_map(|line| line.split_once(SUBMITTED).map(|(_, rest)| rest))
            .filter_map(|rest| rest.split_whitespace().next())
            .map(|cluster| cluster.trim_end_matches('.'))
            .find(|cluster| !cluster.is_empty())
            .map(str::to_string)
            .ok_or_else(|| submit_parse_error(stdout, stderr))
    }

    /// `-nobatch` keeps one line per process; newer `condor_q` groups jobs into batches by default
    fn status_command(&self, job_id: &str) -> String {
        format!("{} -nobatch {}", self.queue, job_id)
    }

    /// Parse `condor_q -nobatch` output
    ///
    /// ```text
    ///  ID      OWNER            SUBMITTED     RUN_TIME ST PRI SIZE CMD
    ///  12.0   alice          10/16 10:02   0+00:00:05 R  0   0.0  run.sh
    /// ```
    ///
    /// Every process of the cluster has its own line; one running process makes the job running.
    fn parse_status_output(&self, job_id: &str, exit_code: i32, stdout: &str, stderr: &str) -> Result<JobStatus> {
        let prefix = format!("{}.", job_id);
        let mut status: Option<JobStatus> = None;

        for line in stdout.lines().map(str::trim).filter(|line| line.starts_with(&prefix)) {
            let fields: Vec<&str> = line.split_whitespace().collect();
            let code = match fields.get(5).and_then(|state| state.chars().next()) {
                Some('R') => StatusCode::Running,
                Some('I') => StatusCode::Wait,
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
                    if fields.len() >= 6 {
                        parsed.owner = fields[1].to_string();
                        parsed.submit_time = fields[2..4].join(" ");
                        parsed.run_time = fields[4].to_string();
                    }
                    status = Some(parsed);
                }
            }
        }

        Ok(status.unwrap_or_else(|| unlisted_status(job_id, exit_code, stderr)))
    }

    fn delete_command(&self, job_id: &str) -> String {
        format!("{} {}", self.remove, job_id)
    }

    fn parse_delete_output(&self, _job_id: &str, exit_code: i32, stdout: &str, stderr: &str) -> bool {
        clean_exit(exit_code, stderr) && stdout.contains("marked for removal")
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::error::JobError;

    static SUBMIT_OUTPUT: &str = "Submitting job(s).\n1 job(s) submitted to cluster 12.\n";

    static QUEUE_OUTPUT: &str = "\n\
-- Submitter: head.example.org : <10.0.0.1:9618> : head.example.org
 ID      OWNER            SUBMITTED     RUN_TIME ST PRI SIZE CMD
 12.0   alice          10/16 10:02   0+00:00:05 R  0   0.0  run.sh
 120.0  bob            10/16 10:03   0+00:00:00 I  0   0.0  other.sh

2 jobs; 0 completed, 0 removed, 1 idle, 1 running, 0 held, 0 suspended
";

    fn job() -> JobDescriptor {
        JobDescriptor::builder().id("job-1").executable("/bin/hostname", false, "").unwrap().build().unwrap()
    }

    #[test]
    fn submit_output_strips_trailing_dot() {
        let support = CondorSupport::new("");
        assert_eq!(support.parse_submit_output(SUBMIT_OUTPUT, "").unwrap(), "12");
    }

    #[test]
    fn submit_failure_keeps_backend_output() {
        let support = CondorSupport::new("");
        let err = support.parse_submit_output("", "ERROR: Can't open \"job.condor\"").unwrap_err();
        match err {
            JobError::SubmitParse { stderr, .. } => assert!(stderr.contains("Can't open")),
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn status_line_is_parsed() {
        let support = CondorSupport::new("");
        let status = support.parse_status_output("12", 0, QUEUE_OUTPUT, "").unwrap();
        assert_eq!(status.code, StatusCode::Running);
        assert_eq!(status.owner, "alice");
        assert_eq!(status.submit_time, "10/16 10:02");
        assert_eq!(status.run_time, "0+00:00:05");
    }

    #[test]
    fn idle_job_waits() {
        let support = CondorSupport::new("");
        let status = support.parse_status_output("120", 0, QUEUE_OUTPUT, "").unwrap();
        assert_eq!(status.code, StatusCode::Wait);
    }

    #[test]
    fn unrelated_job_is_not_in_queue() {
        let support = CondorSupport::new("");
        let status = support.parse_status_output("1", 0, QUEUE_OUTPUT, "").unwrap();
        assert_eq!(status.code, StatusCode::NotInQueue);
    }

    #[test]
    fn missing_line_with_stderr_is_error() {
        let support = CondorSupport::new("");
        let status = support.parse_status_output("12", 1, "", "Failed to fetch ads").unwrap();
        assert_eq!(status.code, StatusCode::Error);
    }

    #[test]
    fn dependencies_are_unsupported() {
        let support = CondorSupport::new("");
        let first = Arc::new(JobDescriptor::submitted("first", "100", StatusCode::Wait));
        let job = JobDescriptor::builder()
            .executable("/bin/hostname", false, "")
            .unwrap()
            .depends_on(first)
            .build()
            .unwrap();
        assert!(matches!(
            support.submit_command(&job, ""),
            Err(JobError::UnsupportedDependency { backend: Backend::Condor })
        ));
    }

    #[test]
    fn submit_command_uses_bin_path() {
        let support = CondorSupport::new("/opt/condor/bin");
        assert_eq!(support.submit_command(&job(), "").unwrap(), "/opt/condor/bin/condor_submit hpcc-job-1.condor");
    }

    #[test]
    fn status_query_lists_processes_not_batches() {
        let support = CondorSupport::new("/opt/condor/bin");
        assert_eq!(support.status_command("12"), "/opt/condor/bin/condor_q -nobatch 12");
    }

    #[test]
    fn rendered_submit_file_queues_every_task() {
        let support = CondorSupport::new("");
        let job = JobDescriptor::builder()
            .id("job-1")
            .executable("/bin/hostname", false, "-f")
            .unwrap()
            .tasks(4)
            .build()
            .unwrap();
        let rendered = support.render_submit_file(&job).unwrap();
        assert!(rendered.contains("executable = ./hostname"));
        assert!(rendered.contains("output = job-1.$(Process).out"));
        assert!(rendered.contains("queue 4"));
    }

    #[test]
    fn delete_checks_removal_message() {
        let support = CondorSupport::new("");
        assert!(support.parse_delete_output("12", 0, "All jobs in cluster 12 have been marked for removal\n", ""));
        assert!(!support.parse_delete_output("12", 1, "", "Couldn't find/remove all jobs in cluster 12"));
    }
}
