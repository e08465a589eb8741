use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, info};
use uuid::Uuid;

use crate::error::{JobError, Result};
use crate::job::file::FileRef;
use crate::job::status::{JobStatus, StatusCode, StatusReport};
use crate::manager::JobManager;

/// Remote working directories live under this directory, relative to the target's home
pub const REMOTE_BASE_DIR: &str = ".hpcc";

/// A description of one unit of work
///
/// Everything about the work itself is fixed at build time. The only thing that changes is the
/// submission state: the bound manager, the scheduler-assigned ID (set exactly once by
/// [`JobDescriptor::submit`]) and the last status seen.
#[derive(Debug)]
pub struct JobDescriptor {
    id: String,
    executable: Option<FileRef>,
    arguments: String,
    input_files: Vec<FileRef>,
    other_input_files: Vec<FileRef>,
    bin_file: Option<FileRef>,
    submit_file: Option<FileRef>,
    output_files: Vec<String>,
    local_workdir: Option<PathBuf>,
    workdir: Option<String>,
    unique_subdir: bool,
    num_tasks: u32,
    dependent_jobs: Vec<Arc<JobDescriptor>>,
    state: Mutex<SubmissionState>,
}

#[derive(Debug, Default)]
struct SubmissionState {
    manager: Option<Arc<JobManager>>,
    scheduler_id: Option<String>,
    status: Option<StatusReport>,
}

impl JobDescriptor {
    pub fn builder() -> JobBuilder {
        JobBuilder::new()
    }

    /// Recreate a descriptor for a job submitted earlier, e.g. to use it as a dependency
    pub fn submitted(local_id: &str, scheduler_id: &str, status: StatusCode) -> JobDescriptor {
        JobBuilder::new().id(local_id).already_submitted(scheduler_id, status).finish()
    }

    /// Locally unique key, distinct from the scheduler's job ID
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn executable(&self) -> Option<&FileRef> {
        self.executable.as_ref()
    }

    pub fn arguments(&self) -> &str {
        &self.arguments
    }

    pub fn input_files(&self) -> &[FileRef] {
        &self.input_files
    }

    pub fn other_input_files(&self) -> &[FileRef] {
        &self.other_input_files
    }

    pub fn bin_file(&self) -> Option<&FileRef> {
        self.bin_file.as_ref()
    }

    pub fn submit_file(&self) -> Option<&FileRef> {
        self.submit_file.as_ref()
    }

    pub fn output_files(&self) -> &[String] {
        &self.output_files
    }

    pub fn num_tasks(&self) -> u32 {
        self.num_tasks
    }

    pub fn is_task_parallel(&self) -> bool {
        self.num_tasks > 0
    }

    pub fn dependent_jobs(&self) -> &[Arc<JobDescriptor>] {
        &self.dependent_jobs
    }

    /// Local working directory, defaulting to a per-job directory under the user's home
    pub fn local_workdir(&self) -> PathBuf {
        match &self.local_workdir {
            Some(path) => path.clone(),
            None => {
                let home = home::home_dir().unwrap_or_else(|| PathBuf::from("."));
                if cfg!(windows) {
                    home.join("hpcc").join(&self.id)
                } else {
                    home.join(REMOTE_BASE_DIR).join(&self.id)
                }
            }
        }
    }

    /// Working directory on the target host
    ///
    /// Defaults to `.hpcc/<id>`, or plain `.hpcc` when unique subdirectories are turned off.
    pub fn workdir(&self) -> String {
        let base = self.workdir.as_deref().unwrap_or(REMOTE_BASE_DIR);
        let base = base.trim_end_matches('/');
        if self.unique_subdir {
            format!("{}/{}", base, self.id)
        } else {
            base.to_string()
        }
    }

    /// Name of the submit file inside the working directory
    pub fn submit_file_name(&self, extension: &str) -> String {
        match &self.submit_file {
            Some(file) => file.file_name(),
            None => format!("hpcc-{}.{}", self.id, extension),
        }
    }

    /// Scheduler IDs of every dependency, which must all be submitted already
    pub fn dependency_ids(&self) -> Result<Vec<String>> {
        self.dependent_jobs
            .iter()
            .map(|job| job.scheduler_id().ok_or_else(|| JobError::DependencyNotSubmitted(job.id().to_string())))
            .collect()
    }

    pub fn scheduler_id(&self) -> Option<String> {
        self.lock().scheduler_id.clone()
    }

    pub fn set_manager(&self, manager: Arc<JobManager>) {
        self.lock().manager = Some(manager);
    }

    pub fn manager(&self) -> Option<Arc<JobManager>> {
        self.lock().manager.clone()
    }

    /// Last status seen, without asking the backend
    pub fn last_status(&self) -> Option<StatusReport> {
        self.lock().status.clone()
    }

    /// Submit the job through its bound manager
    ///
    /// A descriptor can be submitted once. Retries need a fresh descriptor.
    pub fn submit(&self, overwrite: bool, options: &str) -> Result<String> {
        let manager = {
            let state = self.lock();
            if state.scheduler_id.is_some() {
                return Err(JobError::AlreadySubmitted(self.id.clone()));
            }
            state.manager.clone().ok_or_else(|| JobError::NoManager(self.id.clone()))?
        };

        let job_id = manager.submit(self, overwrite, options)?;
        info!("Job {} submitted with scheduler ID {}", self.id, job_id);

        let mut state = self.lock();
        state.scheduler_id = Some(job_id.clone());
        state.status = Some(StatusReport::Job(JobStatus::new(&job_id, StatusCode::Wait)));
        Ok(job_id)
    }

    /// Current status of the job
    ///
    /// Unsubmitted jobs are `NotInQueue`. Once `Error` has been recorded it is returned again
    /// without asking the backend; use [`JobDescriptor::refresh_status`] to poll anyway.
    pub fn status(&self) -> Result<StatusReport> {
        if let Some(report) = self.last_status() {
            if report.code() == StatusCode::Error {
                debug!("Job {} is in error state, skipping status query", self.id);
                return Ok(report);
            }
        }
        self.refresh_status()
    }

    /// Ask the backend for the job's status, even if an error was recorded before
    pub fn refresh_status(&self) -> Result<StatusReport> {
        let (manager, job_id) = {
            let state = self.lock();
            let Some(job_id) = state.scheduler_id.clone() else {
                return Ok(StatusReport::Job(JobStatus::new("", StatusCode::NotInQueue)));
            };
            let manager = state.manager.clone().ok_or_else(|| JobError::NoManager(self.id.clone()))?;
            (manager, job_id)
        };

        let report = manager.status(&job_id, self.num_tasks)?;
        self.lock().status = Some(report.clone());
        Ok(report)
    }

    /// Remove the job from the backend's queue
    pub fn delete(&self) -> Result<bool> {
        let (manager, job_id) = {
            let state = self.lock();
            let job_id = state.scheduler_id.clone().ok_or_else(|| JobError::NotSubmitted(self.id.clone()))?;
            let manager = state.manager.clone().ok_or_else(|| JobError::NoManager(self.id.clone()))?;
            (manager, job_id)
        };
        manager.delete(&job_id)
    }

    fn lock(&self) -> MutexGuard<'_, SubmissionState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Builds a [`JobDescriptor`], validating every file as it is added
///
/// Files marked local must exist when they are added, so a bad path fails here rather than at
/// submission time.
#[derive(Debug)]
pub struct JobBuilder {
    id: String,
    executable: Option<FileRef>,
    arguments: String,
    input_files: Vec<FileRef>,
    other_input_files: Vec<FileRef>,
    bin_file: Option<FileRef>,
    submit_file: Option<FileRef>,
    output_files: Vec<String>,
    local_workdir: Option<PathBuf>,
    workdir: Option<String>,
    unique_subdir: bool,
    num_tasks: u32,
    dependent_jobs: Vec<Arc<JobDescriptor>>,
    submitted: Option<(String, StatusCode)>,
}

impl Default for JobBuilder {
    fn default() -> Self {
        JobBuilder::new()
    }
}

impl JobBuilder {
    pub fn new() -> JobBuilder {
        JobBuilder {
            id: new_local_id(),
            executable: None,
            arguments: String::new(),
            input_files: Vec::new(),
            other_input_files: Vec::new(),
            bin_file: None,
            submit_file: None,
            output_files: Vec::new(),
            local_workdir: None,
            workdir: None,
            unique_subdir: true,
            num_tasks: 0,
            dependent_jobs: Vec::new(),
            submitted: None,
        }
    }

    pub fn id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    pub fn executable(mut self, path: impl Into<PathBuf>, local: bool, arguments: &str) -> Result<Self> {
        self.executable = Some(FileRef::new(path, local, "executable")?);
        self.arguments = arguments.to_string();
        Ok(self)
    }

    /// Input file named in the submit file
    pub fn input_file(mut self, path: impl Into<PathBuf>, local: bool) -> Result<Self> {
        self.input_files.push(FileRef::new(path, local, "input file")?);
        Ok(self)
    }

    /// Input file that is staged but not named in the submit file
    pub fn other_input_file(mut self, path: impl Into<PathBuf>, local: bool) -> Result<Self> {
        self.other_input_files.push(FileRef::new(path, local, "other input file")?);
        Ok(self)
    }

    /// Helper script staged into the manager's bin path
    pub fn bin_file(mut self, path: impl Into<PathBuf>, local: bool) -> Result<Self> {
        self.bin_file = Some(FileRef::new(path, local, "bin file")?);
        Ok(self)
    }

    /// User-supplied submit file; without one the backend renders a submit file
    pub fn submit_file(mut self, path: impl Into<PathBuf>, local: bool) -> Result<Self> {
        self.submit_file = Some(FileRef::new(path, local, "submit file")?);
        Ok(self)
    }

    pub fn output_file(mut self, name: &str) -> Self {
        self.output_files.push(name.to_string());
        self
    }

    pub fn local_workdir(mut self, path: impl Into<PathBuf>) -> Self {
        self.local_workdir = Some(path.into());
        self
    }

    /// Working directory on the target, with or without a per-job subdirectory
    pub fn workdir(mut self, path: &str, unique_subdir: bool) -> Result<Self> {
        if path.is_empty() {
            return Err(JobError::EmptyPath("working directory"));
        }
        self.workdir = Some(path.to_string());
        self.unique_subdir = unique_subdir;
        Ok(self)
    }

    /// Keep the default `.hpcc` working directory but skip the per-job subdirectory
    pub fn shared_workdir(mut self) -> Self {
        self.unique_subdir = false;
        self
    }

    /// Number of indexed subtasks, 0 for a plain job
    pub fn tasks(mut self, num_tasks: u32) -> Self {
        self.num_tasks = num_tasks;
        self
    }

    pub fn depends_on(mut self, job: Arc<JobDescriptor>) -> Self {
        self.dependent_jobs.push(job);
        self
    }

    /// Describe a job that a scheduler already accepted, so it can be queried or depended on
    pub fn already_submitted(mut self, scheduler_id: &str, status: StatusCode) -> Self {
        self.submitted = Some((scheduler_id.to_string(), status));
        self
    }

    pub fn build(self) -> Result<JobDescriptor> {
        if self.submitted.is_none() && self.executable.is_none() && self.submit_file.is_none() {
            return Err(JobError::EmptyPath("executable"));
        }
        Ok(self.finish())
    }

    fn finish(self) -> JobDescriptor {
        let state = match self.submitted {
            Some((scheduler_id, code)) => SubmissionState {
                manager: None,
                status: Some(StatusReport::Job(JobStatus::new(&scheduler_id, code))),
                scheduler_id: Some(scheduler_id),
            },
            None => SubmissionState::default(),
        };

        JobDescriptor {
            id: self.id,
            executable: self.executable,
            arguments: self.arguments,
            input_files: self.input_files,
            other_input_files: self.other_input_files,
            bin_file: self.bin_file,
            submit_file: self.submit_file,
            output_files: self.output_files,
            local_workdir: self.local_workdir,
            workdir: self.workdir,
            unique_subdir: self.unique_subdir,
            num_tasks: self.num_tasks,
            dependent_jobs: self.dependent_jobs,
            state: Mutex::new(state),
        }
    }
}

fn new_local_id() -> String {
    let uuid = Uuid::new_v4().simple().to_string();
    format!("job-{}", &uuid[..12])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_local_executable_fails_construction() {
        let result = JobDescriptor::builder().executable("/no/such/executable", true, "");
        assert!(matches!(result, Err(JobError::MissingLocalFile(_))));
    }

    #[test]
    fn job_needs_executable_or_submit_file() {
        let result = JobDescriptor::builder().build();
        assert!(matches!(result, Err(JobError::EmptyPath("executable"))));
    }

    #[test]
    fn default_workdir_is_unique_per_job() {
        let job = JobDescriptor::builder()
            .id("job-1")
            .executable("/bin/hostname", false, "")
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(job.workdir(), ".hpcc/job-1");
        assert!(job.local_workdir().ends_with("job-1"));
    }

    #[test]
    fn shared_workdir_skips_subdirectory() {
        let job = JobDescriptor::builder()
            .id("job-1")
            .executable("/bin/hostname", false, "")
            .unwrap()
            .shared_workdir()
            .build()
            .unwrap();
        assert_eq!(job.workdir(), ".hpcc");
    }

    #[test]
    fn custom_workdir_gets_subdirectory() {
        let job = JobDescriptor::builder()
            .id("job-1")
            .executable("/bin/hostname", false, "")
            .unwrap()
            .workdir("/scratch/me/", true)
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(job.workdir(), "/scratch/me/job-1");
    }

    #[test]
    fn local_ids_are_unique() {
        assert_ne!(JobBuilder::new().id, JobBuilder::new().id);
    }

    #[test]
    fn unsubmitted_dependency_is_reported() {
        let dependency = Arc::new(
            JobDescriptor::builder()
                .id("first")
                .executable("/bin/true", false, "")
                .unwrap()
                .build()
                .unwrap(),
        );
        let job = JobDescriptor::builder()
            .executable("/bin/true", false, "")
            .unwrap()
            .depends_on(dependency)
            .build()
            .unwrap();
        assert!(matches!(job.dependency_ids(), Err(JobError::DependencyNotSubmitted(id)) if id == "first"));
    }

    #[test]
    fn rehydrated_job_reports_scheduler_id() {
        let job = JobDescriptor::submitted("job-1", "100", StatusCode::Wait);
        assert_eq!(job.scheduler_id().as_deref(), Some("100"));
        assert!(matches!(job.submit(false, ""), Err(JobError::AlreadySubmitted(_))));
    }

    #[test]
    fn unsubmitted_job_is_not_in_queue() {
        let job = JobDescriptor::builder()
            .executable("/bin/true", false, "")
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(job.status().unwrap().code(), StatusCode::NotInQueue);
        assert!(matches!(job.delete(), Err(JobError::NotSubmitted(_))));
        assert!(matches!(job.submit(false, ""), Err(JobError::NoManager(_))));
    }
}
