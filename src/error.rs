//! Error types for job submission, status queries and deletion

use std::path::PathBuf;

use thiserror::Error;

use crate::backend::Backend;

/// Errors raised while describing, submitting or querying a job
#[derive(Error, Debug)]
pub enum JobError {
    #[error("Local file does not exist: {0}")]
    MissingLocalFile(PathBuf),

    #[error("Empty path given for {0}")]
    EmptyPath(&'static str),

    #[error("Job dependencies are not supported by the {backend} backend")]
    UnsupportedDependency { backend: Backend },

    #[error("Task status queries are not supported by the {backend} backend")]
    UnsupportedTaskStatus { backend: Backend },

    #[error("Task-parallel jobs are not supported by the {backend} backend")]
    UnsupportedTaskParallel { backend: Backend },

    #[error("No job ID found in submit output\nstdout: {stdout}\nstderr: {stderr}")]
    SubmitParse { stdout: String, stderr: String },

    #[error("Can't parse status of job {job_id}: {reason}")]
    StatusParse { job_id: String, reason: String },

    #[error("Dependency {0} has not been submitted yet")]
    DependencyNotSubmitted(String),

    #[error("Job {0} has already been submitted, create a new job to resubmit")]
    AlreadySubmitted(String),

    #[error("Job {0} has not been submitted")]
    NotSubmitted(String),

    #[error("Job {0} is not bound to a job manager")]
    NoManager(String),

    #[error("Unknown backend: {0}")]
    UnknownBackend(String),

    #[error("Failed to run `{command}`: {source}")]
    Process {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Template error: {0}")]
    Template(#[from] tinytemplate::error::Error),
}

/// Result type for job operations
pub type Result<T> = std::result::Result<T, JobError>;
