use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use jsonschema::JSONSchema;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::error::Result as JobResult;
use crate::job::{JobBuilder, JobDescriptor};

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("job request doesn't match the schema: {0}")]
    JSONValidationError(String),
    #[error("job request isn't valid JSON")]
    JSONDecodeError,
    #[error("job request can't be deserialised: {0}")]
    DeserialisationError(String),
    #[error("job request can't be read")]
    MessageReadError,
    #[error("job request schema is invalid: {0}")]
    SchemaError(String),
}

/// A job request file and the schema it must satisfy
pub struct Message {
    pub path: PathBuf,
    pub compiled_schema: JSONSchema,
}

impl Message {
    pub fn read(&self) -> Result<JobRequest, MessageError> {
        let json: Value = self.parse_untyped_json()?;

        match self.validate(&json) {
            Ok(_) => {
                info!("Job request is valid");
                self.parse_json(json)
            }
            Err(err) => {
                warn!("Job request fails validation");
                Err(err)
            }
        }
    }

    fn validate(&self, json: &Value) -> Result<(), MessageError> {
        info!("Validating job request against JSON schema");
        self.compiled_schema.validate(json).map_err(|errors| {
            let reasons: Vec<String> = errors.map(|err| format!("{} at {}", err, err.instance_path)).collect();
            MessageError::JSONValidationError(reasons.join("; "))
        })
    }

    fn read_file(&self) -> Result<String, MessageError> {
        let path: &Path = self.path.as_path();
        info!("Reading job request at {}", path.display());
        fs::read_to_string(path).map_err(|err| {
            warn!("Can't read job request at path {}: {}", path.display(), err);
            MessageError::MessageReadError
        })
    }

    fn parse_json(&self, value: Value) -> Result<JobRequest, MessageError> {
        info!("Deserialising valid JSON into a job request");
        serde_json::from_value::<JobRequest>(value).map_err(|err| MessageError::DeserialisationError(err.to_string()))
    }

    fn parse_untyped_json(&self) -> Result<Value, MessageError> {
        let json_string = self.read_file()?;
        serde_json::from_str::<Value>(&json_string).map_err(|_| MessageError::JSONDecodeError)
    }
}

/// Where to submit a job and what it is
#[derive(Debug, Deserialize, Serialize)]
pub struct JobRequest {
    pub backend: String,
    pub target: String,
    #[serde(default)]
    pub bin_path: String,
    #[serde(default)]
    pub options: String,
    #[serde(default)]
    pub overwrite: bool,
    pub job: JobSpec,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct FileSpec {
    pub path: PathBuf,
    #[serde(default = "local_by_default")]
    pub local: bool,
}

fn local_by_default() -> bool {
    true
}

fn unique_by_default() -> bool {
    true
}

#[derive(Debug, Deserialize, Serialize)]
pub struct JobSpec {
    pub id: Option<String>,
    pub executable: Option<FileSpec>,
    #[serde(default)]
    pub arguments: String,
    #[serde(default)]
    pub input_files: Vec<FileSpec>,
    #[serde(default)]
    pub other_input_files: Vec<FileSpec>,
    pub bin_file: Option<FileSpec>,
    pub submit_file: Option<FileSpec>,
    #[serde(default)]
    pub output_files: Vec<String>,
    pub local_workdir: Option<PathBuf>,
    pub workdir: Option<String>,
    #[serde(default = "unique_by_default")]
    pub unique_subdir: bool,
    #[serde(default)]
    pub tasks: u32,
    /// Local IDs of jobs submitted earlier
    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl JobSpec {
    /// Build a descriptor, with dependencies already resolved from `depends_on`
    pub fn descriptor(&self, dependencies: Vec<Arc<JobDescriptor>>) -> JobResult<JobDescriptor> {
        let mut builder = JobBuilder::new();
        if let Some(id) = &self.id {
            builder = builder.id(id);
        }
        if let Some(executable) = &self.executable {
            builder = builder.executable(&executable.path, executable.local, &self.arguments)?;
        }
        for file in &self.input_files {
            builder = builder.input_file(&file.path, file.local)?;
        }
        for file in &self.other_input_files {
            builder = builder.other_input_file(&file.path, file.local)?;
        }
        if let Some(file) = &self.bin_file {
            builder = builder.bin_file(&file.path, file.local)?;
        }
        if let Some(file) = &self.submit_file {
            builder = builder.submit_file(&file.path, file.local)?;
        }
        for name in &self.output_files {
            builder = builder.output_file(name);
        }
        if let Some(path) = &self.local_workdir {
            builder = builder.local_workdir(path);
        }
        builder = match &self.workdir {
            Some(workdir) => builder.workdir(workdir, self.unique_subdir)?,
            None if !self.unique_subdir => builder.shared_workdir(),
            None => builder,
        };
        for dependency in dependencies {
            builder = builder.depends_on(dependency);
        }
        builder.tasks(self.tasks).build()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::error::JobError;
    use crate::request::schema::load_schema;

    fn message(content: &str) -> (tempfile::NamedTempFile, Message) {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        let message = Message { path: file.path().to_path_buf(), compiled_schema: load_schema().unwrap() };
        (file, message)
    }

    #[test]
    fn valid_request_is_read() {
        let (_file, message) = message(
            r#"{
                "backend": "slurm",
                "target": "hpc-login",
                "bin_path": "/opt/slurm/bin",
                "job": {
                    "id": "job-7",
                    "executable": { "path": "/usr/bin/hostname", "local": false },
                    "arguments": "-f",
                    "tasks": 4,
                    "unique_subdir": false
                }
            }"#,
        );
        let request = message.read().unwrap();
        assert_eq!(request.backend, "slurm");
        assert!(!request.overwrite);

        let job = request.job.descriptor(Vec::new()).unwrap();
        assert_eq!(job.id(), "job-7");
        assert_eq!(job.arguments(), "-f");
        assert_eq!(job.num_tasks(), 4);
        assert_eq!(job.workdir(), ".hpcc");
    }

    #[test]
    fn invalid_request_fails_validation() {
        let (_file, message) = message(r#"{ "backend": "slurm", "job": {} }"#);
        assert!(matches!(message.read(), Err(MessageError::JSONValidationError(_))));
    }

    #[test]
    fn broken_json_is_a_decode_error() {
        let (_file, message) = message("{ not json");
        assert!(matches!(message.read(), Err(MessageError::JSONDecodeError)));
    }

    #[test]
    fn files_are_local_by_default() {
        let (_file, message) = message(
            r#"{ "backend": "pbs", "target": "host1", "job": { "executable": { "path": "/no/such/run.sh" } } }"#,
        );
        let request = message.read().unwrap();
        assert!(matches!(request.job.descriptor(Vec::new()), Err(JobError::MissingLocalFile(_))));
    }
}
