use std::path::{Path, PathBuf};

use crate::error::{JobError, Result};

/// A file used by a job
///
/// `local` files live on this machine and are uploaded to the target before submission. Files that
/// are not local already live on the target host and are copied in place into the job's working
/// directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRef {
    path: PathBuf,
    local: bool,
}

impl FileRef {
    /// Create a file reference, checking that local files exist right now
    pub fn new(path: impl Into<PathBuf>, local: bool, role: &'static str) -> Result<FileRef> {
        let path = path.into();
        if path.as_os_str().is_empty() {
            return Err(JobError::EmptyPath(role));
        }
        if local && !path.exists() {
            return Err(JobError::MissingLocalFile(path));
        }
        Ok(FileRef { path, local })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_local(&self) -> bool {
        self.local
    }

    /// File name without any directory component, used inside the job's working directory
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.to_string_lossy().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_local_file_is_rejected() {
        let result = FileRef::new("/definitely/not/here.sh", true, "executable");
        assert!(matches!(result, Err(JobError::MissingLocalFile(_))));
    }

    #[test]
    fn remote_file_is_not_checked() {
        let file = FileRef::new("/definitely/not/here.sh", false, "executable").unwrap();
        assert!(!file.is_local());
        assert_eq!(file.file_name(), "here.sh");
    }

    #[test]
    fn empty_path_is_rejected() {
        let result = FileRef::new("", false, "input file");
        assert!(matches!(result, Err(JobError::EmptyPath("input file"))));
    }
}
