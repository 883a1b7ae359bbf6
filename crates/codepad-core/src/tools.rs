//! External command-line tools: pip, git and the Python interpreter.
//!
//! Every tool runs as a separate process with captured output and a
//! timeout. The child is killed if the timeout fires.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

/// Timeout for pip operations.
pub const PIP_TIMEOUT: Duration = Duration::from_secs(300);

/// Timeout for git operations.
pub const GIT_TIMEOUT: Duration = Duration::from_secs(120);

/// Timeout for running a script.
pub const SCRIPT_TIMEOUT: Duration = Duration::from_secs(10);

/// Captured result of a finished process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code; `None` if the process was killed by a signal
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

impl fmt::Display for ToolOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "--- OUTPUT ---\n{}\n--- ERRORS ---\n{}",
            self.stdout, self.stderr
        )
    }
}

/// Tool errors.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("{0}")]
    InvalidInput(&'static str),

    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} timed out after {}s", .timeout.as_secs())]
    Timeout { program: String, timeout: Duration },
}

/// Runs `program` with `args`, capturing stdout and stderr.
pub async fn run_tool<S: AsRef<str>>(
    program: &str,
    args: &[S],
    cwd: Option<&Path>,
    timeout: Duration,
) -> Result<ToolOutput, ToolError> {
    let mut command = Command::new(program);
    command
        .args(args.iter().map(|a| a.as_ref()))
        .stdin(Stdio::null())
        .kill_on_drop(true);
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }

    tracing::debug!(
        "Running {} {}",
        program,
        args.iter().map(|a| a.as_ref()).collect::<Vec<_>>().join(" ")
    );

    let output = match tokio::time::timeout(timeout, command.output()).await {
        Ok(result) => result.map_err(|source| ToolError::Spawn {
            program: program.to_string(),
            source,
        })?,
        Err(_) => {
            tracing::warn!("{} timed out after {:?}", program, timeout);
            return Err(ToolError::Timeout {
                program: program.to_string(),
                timeout,
            });
        }
    };

    let output = ToolOutput {
        status: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };
    if !output.success() {
        tracing::warn!("{} exited with {:?}", program, output.status);
    }
    Ok(output)
}

/// Runs a Python script.
pub async fn run_script(python: &str, script: &Path, timeout: Duration) -> Result<ToolOutput, ToolError> {
    let script = script.to_string_lossy().into_owned();
    run_tool(python, &[script], None, timeout).await
}

/// A pip operation on one package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipAction {
    Install,
    Uninstall,
    Upgrade,
}

/// `python -m pip` runner.
#[derive(Debug, Clone)]
pub struct Pip {
    python: String,
    timeout: Duration,
}

impl Pip {
    pub fn new(python: impl Into<String>) -> Self {
        Self {
            python: python.into(),
            timeout: PIP_TIMEOUT,
        }
    }

    /// Arguments passed to the interpreter for `action` on `package`.
    pub fn args(action: PipAction, package: &str) -> Result<Vec<String>, ToolError> {
        let package = package.trim();
        if package.is_empty() {
            return Err(ToolError::InvalidInput("Please enter a package name."));
        }

        let mut args = vec!["-m".to_string(), "pip".to_string()];
        match action {
            PipAction::Install => args.push("install".into()),
            PipAction::Uninstall => args.push("uninstall".into()),
            PipAction::Upgrade => args.extend(["install".to_string(), "--upgrade".to_string()]),
        }
        args.push(package.to_string());
        if action == PipAction::Uninstall {
            args.push("-y".into());
        }
        Ok(args)
    }

    pub async fn run(&self, action: PipAction, package: &str) -> Result<ToolOutput, ToolError> {
        let args = Self::args(action, package)?;
        run_tool(&self.python, args.as_slice(), None, self.timeout).await
    }
}

/// `git` runner for one repository directory.
#[derive(Debug, Clone)]
pub struct Git {
    repo: PathBuf,
    timeout: Duration,
}

impl Git {
    pub fn new(repo: impl Into<PathBuf>) -> Self {
        Self {
            repo: repo.into(),
            timeout: GIT_TIMEOUT,
        }
    }

    async fn git(&self, args: &[&str]) -> Result<ToolOutput, ToolError> {
        run_tool("git", args, Some(&self.repo), self.timeout).await
    }

    pub async fn init(&self) -> Result<ToolOutput, ToolError> {
        self.git(&["init"]).await
    }

    pub async fn status(&self) -> Result<ToolOutput, ToolError> {
        self.git(&["status"]).await
    }

    pub async fn pull(&self) -> Result<ToolOutput, ToolError> {
        self.git(&["pull"]).await
    }

    pub async fn push(&self) -> Result<ToolOutput, ToolError> {
        self.git(&["push"]).await
    }

    /// Stages everything and commits it. Stops after `git add` if that fails.
    pub async fn commit_all(&self, message: &str) -> Result<ToolOutput, ToolError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(ToolError::InvalidInput("Commit message cannot be empty."));
        }

        let added = self.git(&["add", "-A"]).await?;
        if !added.success() {
            return Ok(added);
        }
        self.git(&["commit", "-m", message]).await
    }
}
