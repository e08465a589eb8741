//! Drive the submit / status / delete lifecycle of jobs on one backend and target
//!
//! A [`JobManager`] pairs a backend adapter with a target host and a bin path. The adapter builds
//! commands and parses their output; the manager stages files and runs the commands.

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use log::{debug, info, warn};

use crate::backend::{Backend, BackendAdapter};
use crate::error::{JobError, Result};
use crate::job::{FileRef, JobDescriptor, StatusReport};

pub mod exec;
pub mod staging;

use exec::{quote, CommandOutput, Exec};
use staging::{StagingPlan, Stager};

pub struct JobManager {
    adapter: Box<dyn BackendAdapter>,
    target: String,
    bin_path: String,
    exec: Box<dyn Exec>,
    stager: Box<dyn Stager>,
}

impl fmt::Debug for JobManager {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("JobManager")
            .field("backend", &self.adapter.backend())
            .field("target", &self.target)
            .field("bin_path", &self.bin_path)
            .finish()
    }
}

impl JobManager {
    pub fn new(backend: Backend, target: &str, bin_path: &str) -> JobManager {
        JobManager::with_exec(backend, target, bin_path, exec::exec_for(target), staging::stager_for(target))
    }

    pub fn with_exec(
        backend: Backend,
        target: &str,
        bin_path: &str,
        exec: Box<dyn Exec>,
        stager: Box<dyn Stager>,
    ) -> JobManager {
        JobManager {
            adapter: backend.adapter(bin_path),
            target: target.to_string(),
            bin_path: bin_path.to_string(),
            exec,
            stager,
        }
    }

    pub fn backend(&self) -> Backend {
        self.adapter.backend()
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn bin_path(&self) -> &str {
        &self.bin_path
    }

    pub fn adapter(&self) -> &dyn BackendAdapter {
        self.adapter.as_ref()
    }

    /// Stage a job's files and submit it, returning the scheduler's job ID
    ///
    /// With `overwrite`, files already at the destination are removed before staging.
    pub fn submit(&self, job: &JobDescriptor, overwrite: bool, options: &str) -> Result<String> {
        // unsupported features fail before anything is touched
        let command = self.adapter.submit_command(job, options)?;

        let local_workdir = job.local_workdir();
        fs::create_dir_all(&local_workdir)?;
        let workdir = job.workdir();
        info!("Submitting job {} to {} on {} in {}", job.id(), self.backend(), self.target, workdir);

        let generated;
        let submit_file = match job.submit_file() {
            Some(file) => file,
            None => {
                let path = local_workdir.join(job.submit_file_name(self.adapter.submit_file_extension()));
                info!("Writing submit file to {}", path.display());
                fs::write(&path, self.adapter.render_submit_file(job)?)?;
                generated = FileRef::new(path, true, "submit file")?;
                &generated
            }
        };

        let plan = StagingPlan::for_job(job, Some(submit_file), &workdir, &self.bin_path);
        let mut directories = vec![workdir.clone()];
        for dir in plan.directories() {
            if !directories.contains(&dir) {
                directories.push(dir);
            }
        }
        let directories: Vec<String> = directories.iter().map(|dir| quote(dir)).collect();
        self.run_checked(&format!("mkdir -p {}", directories.join(" ")))?;
        self.stage(&plan, overwrite)?;
        for (name, contents) in self.adapter.helper_scripts() {
            self.install_helper(name, contents, &local_workdir, &workdir, overwrite)?;
        }

        let output = self.run(&format!("cd {} && {}", quote(&workdir), command))?;
        let job_id = self.adapter.parse_submit_output(&output.stdout, &output.stderr)?;
        info!("{} accepted job {} as {}", self.backend(), job.id(), job_id);
        Ok(job_id)
    }

    /// Ask the backend for a job's status, per task when `num_tasks` is positive
    pub fn status(&self, job_id: &str, num_tasks: u32) -> Result<StatusReport> {
        if num_tasks > 0 {
            let command = self.adapter.task_status_command(job_id)?;
            let output = self.run(&command)?;
            let status = self.adapter.parse_task_status_output(
                job_id,
                num_tasks,
                output.exit_code,
                &output.stdout,
                &output.stderr,
            )?;
            Ok(StatusReport::Tasks(status))
        } else {
            let output = self.run(&self.adapter.status_command(job_id))?;
            let status = self.adapter.parse_status_output(job_id, output.exit_code, &output.stdout, &output.stderr)?;
            Ok(StatusReport::Job(status))
        }
    }

    /// Remove a job from the backend, returning whether the backend confirmed it
    pub fn delete(&self, job_id: &str) -> Result<bool> {
        let output = self.run(&self.adapter.delete_command(job_id))?;
        let deleted = self.adapter.parse_delete_output(job_id, output.exit_code, &output.stdout, &output.stderr);
        if !deleted {
            warn!("{} did not confirm deletion of {}: {}", self.backend(), job_id, output.stderr.trim());
        }
        Ok(deleted)
    }

    pub fn stage(&self, plan: &StagingPlan, overwrite: bool) -> Result<()> {
        if plan.is_empty() {
            return Ok(());
        }
        if overwrite {
            let destinations: Vec<String> = plan.destinations().map(quote).collect();
            self.run_checked(&format!("rm -f {}", destinations.join(" ")))?;
        }
        for upload in &plan.uploads {
            self.stager.upload(&upload.source, &upload.destination)?;
        }
        for copy in &plan.remote_copies {
            self.run_checked(&format!("cp -p {} {}", quote(&copy.source), quote(&copy.destination)))?;
        }
        Ok(())
    }

    fn install_helper(
        &self,
        name: &str,
        contents: &str,
        local_workdir: &Path,
        workdir: &str,
        overwrite: bool,
    ) -> Result<()> {
        let dir = if self.bin_path.is_empty() { workdir } else { self.bin_path.trim_end_matches('/') };
        let destination = format!("{}/{}", dir, name);
        if !overwrite && self.run(&format!("test -f {}", quote(&destination)))?.success() {
            debug!("{} already installed", destination);
            return Ok(());
        }

        let source = local_workdir.join(name);
        fs::write(&source, contents)?;
        self.run_checked(&format!("mkdir -p {}", quote(dir)))?;
        self.stager.upload(&source, &destination)
    }

    fn run(&self, command: &str) -> Result<CommandOutput> {
        self.exec.run(command)
    }

    // housekeeping commands must succeed
    fn run_checked(&self, command: &str) -> Result<CommandOutput> {
        let output = self.run(command)?;
        if output.success() {
            Ok(output)
        } else {
            Err(JobError::Process {
                command: command.to_string(),
                source: io::Error::new(io::ErrorKind::Other, output.stderr.trim().to_string()),
            })
        }
    }
}
