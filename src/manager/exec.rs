use std::fmt;
use std::path::PathBuf;
use std::process::{Command, Output};

use log::{debug, info};

use crate::error::{JobError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

impl From<Output> for CommandOutput {
    fn from(output: Output) -> Self {
        CommandOutput {
            // killed by a signal
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        }
    }
}

/// Runs shell command lines on the target host, blocking until they finish
pub trait Exec: fmt::Debug + Send + Sync {
    fn run(&self, command: &str) -> Result<CommandOutput>;
}

pub fn is_local_target(target: &str) -> bool {
    matches!(target, "" | "local" | "localhost")
}

pub fn exec_for(target: &str) -> Box<dyn Exec> {
    if is_local_target(target) {
        Box::new(LocalExec::new())
    } else {
        Box::new(SshExec::new(target))
    }
}

/// Runs commands with `sh -c` from the user's home directory
///
/// Commands run from home so relative working directories mean the same thing locally and over
/// ssh.
#[derive(Debug)]
pub struct LocalExec {
    dir: PathBuf,
}

impl LocalExec {
    pub fn new() -> LocalExec {
        LocalExec { dir: home::home_dir().unwrap_or_else(|| PathBuf::from(".")) }
    }
}

impl Default for LocalExec {
    fn default() -> Self {
        LocalExec::new()
    }
}

impl Exec for LocalExec {
    fn run(&self, command: &str) -> Result<CommandOutput> {
        let mut sh = Command::new("sh");
        let cmd = sh.arg("-c").arg(command).current_dir(&self.dir);
        info!("Running local command: {}", command);
        let output = cmd
            .output()
            .map_err(|source| JobError::Process { command: command.to_string(), source })?;
        let output = CommandOutput::from(output);
        debug!("`{}` exited with {}", command, output.exit_code);
        Ok(output)
    }
}

#[derive(Debug)]
pub struct SshExec {
    target: String,
}

impl SshExec {
    pub fn new(target: &str) -> SshExec {
        SshExec { target: target.to_string() }
    }
}

impl Exec for SshExec {
    fn run(&self, command: &str) -> Result<CommandOutput> {
        let mut ssh = Command::new("ssh");
        let cmd = ssh.args(["-o", "BatchMode=yes", self.target.as_str(), command]);
        info!("Running on {}: {}", self.target, command);
        let output = cmd
            .output()
            .map_err(|source| JobError::Process { command: command.to_string(), source })?;
        let output = CommandOutput::from(output);
        debug!("`{}` on {} exited with {}", command, self.target, output.exit_code);
        Ok(output)
    }
}

pub fn quote(word: &str) -> String {
    if !word.is_empty() && word.chars().all(|c| c.is_ascii_alphanumeric() || "/._-+=:,@".contains(c)) {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_words_are_not_quoted() {
        assert_eq!(quote(".hpcc/job-1"), ".hpcc/job-1");
    }

    #[test]
    fn special_characters_are_quoted() {
        assert_eq!(quote("my dir"), "'my dir'");
        assert_eq!(quote("it's"), r"'it'\''s'");
        assert_eq!(quote(""), "''");
    }

    #[test]
    fn local_targets() {
        assert!(is_local_target("localhost"));
        assert!(is_local_target(""));
        assert!(!is_local_target("hpc-login.example.org"));
    }

    #[cfg(unix)]
    #[test]
    fn local_exec_captures_output() {
        let output = LocalExec::new().run("echo out; echo err >&2; exit 3").unwrap();
        assert_eq!(output.exit_code, 3);
        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
    }
}
