use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use log::info;

use crate::error::{JobError, Result};
use crate::job::{FileRef, JobDescriptor};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub source: PathBuf,
    pub destination: String,
}

/// A file already on the target, to copy into the job's working directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCopy {
    pub source: String,
    pub destination: String,
}

/// Every file a job needs on the target before it can be submitted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagingPlan {
    pub uploads: Vec<Upload>,
    pub remote_copies: Vec<RemoteCopy>,
}

impl StagingPlan {
    /// Sort a job's files into uploads and in-place copies
    ///
    /// The executable, input files, other input files and submit file go to `workdir`. The helper
    /// script goes to `bin_path`, or `workdir` when there is no bin path.
    pub fn for_job(job: &JobDescriptor, submit_file: Option<&FileRef>, workdir: &str, bin_path: &str) -> StagingPlan {
        let mut plan = StagingPlan::default();
        let workdir_files = job
            .executable()
            .into_iter()
            .chain(job.input_files())
            .chain(job.other_input_files())
            .chain(submit_file);
        for file in workdir_files {
            plan.add(file, workdir);
        }

        if let Some(bin_file) = job.bin_file() {
            let bin_dir = if bin_path.is_empty() { workdir } else { bin_path };
            plan.add(bin_file, bin_dir);
        }
        plan
    }

    fn add(&mut self, file: &FileRef, dir: &str) {
        let destination = format!("{}/{}", dir.trim_end_matches('/'), file.file_name());
        if file.is_local() {
            self.uploads.push(Upload { source: file.path().to_path_buf(), destination });
        } else {
            self.remote_copies.push(RemoteCopy { source: file.path().to_string_lossy().to_string(), destination });
        }
    }

    pub fn destinations(&self) -> impl Iterator<Item = &str> {
        self.uploads
            .iter()
            .map(|upload| upload.destination.as_str())
            .chain(self.remote_copies.iter().map(|copy| copy.destination.as_str()))
    }

    /// Directories the destinations live in, each listed once
    pub fn directories(&self) -> Vec<String> {
        let mut directories: Vec<String> = Vec::new();
        for dir in self.destinations().filter_map(|destination| destination.rsplit_once('/')).map(|(dir, _)| dir) {
            if !directories.iter().any(|known| known == dir) {
                directories.push(dir.to_string());
            }
        }
        directories
    }

    pub fn is_empty(&self) -> bool {
        self.uploads.is_empty() && self.remote_copies.is_empty()
    }
}

/// Copies local files onto the target host
pub trait Stager: fmt::Debug + Send + Sync {
    fn upload(&self, source: &Path, destination: &str) -> Result<()>;
}

pub fn stager_for(target: &str) -> Box<dyn Stager> {
    if super::exec::is_local_target(target) {
        Box::new(LocalStager::new())
    } else {
        Box::new(ScpStager::new(target))
    }
}

/// Copies files on this machine, resolving relative destinations against the home directory
#[derive(Debug)]
pub struct LocalStager {
    base: PathBuf,
}

impl LocalStager {
    pub fn new() -> LocalStager {
        LocalStager { base: home::home_dir().unwrap_or_else(|| PathBuf::from(".")) }
    }

    pub fn with_base(base: impl Into<PathBuf>) -> LocalStager {
        LocalStager { base: base.into() }
    }
}

impl Default for LocalStager {
    fn default() -> Self {
        LocalStager::new()
    }
}

impl Stager for LocalStager {
    fn upload(&self, source: &Path, destination: &str) -> Result<()> {
        let destination = self.base.join(destination);
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }
        info!("Copying {} to {}", source.display(), destination.display());
        fs::copy(source, &destination)?;
        Ok(())
    }
}

#[derive(Debug)]
pub struct ScpStager {
    target: String,
}

impl ScpStager {
    pub fn new(target: &str) -> ScpStager {
        ScpStager { target: target.to_string() }
    }
}

impl Stager for ScpStager {
    fn upload(&self, source: &Path, destination: &str) -> Result<()> {
        let remote = format!("{}:{}", self.target, destination);
        let mut scp = Command::new("scp");
        let cmd = scp.arg("-q").arg("-B").arg(source).arg(&remote);
        info!("Uploading {} to {}", source.display(), remote);
        let command = format!("scp {} {}", source.display(), remote);
        let output = cmd.output().map_err(|source| JobError::Process { command: command.clone(), source })?;
        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            Err(JobError::Process { command, source: std::io::Error::new(std::io::ErrorKind::Other, stderr) })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn files_are_sorted_by_location() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("run.sh");
        fs::write(&script, "#!/bin/sh\n").unwrap();
        let helper = dir.path().join("helper.sh");
        fs::write(&helper, "#!/bin/sh\n").unwrap();

        let job = JobDescriptor::builder()
            .executable(&script, true, "")
            .unwrap()
            .input_file("/data/shared/input.csv", false)
            .unwrap()
            .bin_file(&helper, true)
            .unwrap()
            .build()
            .unwrap();
        let plan = StagingPlan::for_job(&job, None, ".hpcc/job-1", "bin");

        assert_eq!(
            plan.uploads,
            vec![
                Upload { source: script, destination: ".hpcc/job-1/run.sh".to_string() },
                Upload { source: helper, destination: "bin/helper.sh".to_string() },
            ]
        );
        assert_eq!(
            plan.remote_copies,
            vec![RemoteCopy {
                source: "/data/shared/input.csv".to_string(),
                destination: ".hpcc/job-1/input.csv".to_string(),
            }]
        );
        assert_eq!(plan.directories(), vec![".hpcc/job-1", "bin"]);
    }

    #[test]
    fn local_stager_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("input.txt");
        fs::write(&source, "42").unwrap();

        let stager = LocalStager::with_base(dir.path());
        stager.upload(&source, "work/job-1/input.txt").unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("work/job-1/input.txt")).unwrap(), "42");
    }
}
