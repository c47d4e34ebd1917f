use crate::config::ExecutionBackend;
use crate::traits::NotebookExecutor;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

const STDERR_TAIL_CHARS: usize = 2_000;

/// Executes notebooks by shelling out to papermill or `jupyter nbconvert`.
pub struct CommandExecutor {
    backend: ExecutionBackend,
    program: Option<String>,
    timeout: Option<Duration>,
    env: Vec<(String, String)>,
}

impl CommandExecutor {
    pub fn new(backend: ExecutionBackend) -> Self {
        Self {
            backend,
            program: None,
            timeout: None,
            env: Vec::new(),
        }
    }

    /// Overrides the executable, e.g. a virtualenv's `bin/papermill`.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = Some(program.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_env(mut self, env: Vec<(String, String)>) -> Self {
        self.env = env;
        self
    }

    fn command_line(&self, notebook: &Path) -> (String, Vec<String>) {
        let path = notebook.display().to_string();
        match self.backend {
            ExecutionBackend::Papermill => (
                self.program.clone().unwrap_or_else(|| "papermill".into()),
                vec![path.clone(), path],
            ),
            ExecutionBackend::Nbconvert => (
                self.program.clone().unwrap_or_else(|| "jupyter".into()),
                vec![
                    "nbconvert".into(),
                    "--to".into(),
                    "notebook".into(),
                    "--execute".into(),
                    "--inplace".into(),
                    path,
                ],
            ),
        }
    }
}

#[async_trait]
impl NotebookExecutor for CommandExecutor {
    fn name(&self) -> &str {
        match self.backend {
            ExecutionBackend::Papermill => "papermill",
            ExecutionBackend::Nbconvert => "nbconvert",
        }
    }

    async fn execute(&self, notebook: &Path) -> Result<()> {
        // The child runs inside the notebook's folder, so it is handed the bare
        // file name; the folder path may be relative to our own working dir.
        let (workdir, target) = match (
            notebook.parent().filter(|d| !d.as_os_str().is_empty()),
            notebook.file_name(),
        ) {
            (Some(dir), Some(name)) => (Some(dir), Path::new(name)),
            _ => (None, notebook),
        };

        let (program, args) = self.command_line(target);
        tracing::debug!(%program, ?args, workdir = ?workdir, "Spawning notebook executor");

        let mut command = Command::new(&program);
        command
            .args(&args)
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = workdir {
            command.current_dir(dir);
        }

        let child = command
            .spawn()
            .with_context(|| format!("Failed to start '{}'", program))?;

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| anyhow::anyhow!("Timed out after {}s", limit.as_secs()))??,
            None => child.wait_with_output().await?,
        };

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();
        let tail: String = {
            let count = stderr.chars().count();
            stderr.chars().skip(count.saturating_sub(STDERR_TAIL_CHARS)).collect()
        };

        if tail.is_empty() {
            anyhow::bail!("{} exited with {}", program, output.status)
        } else {
            anyhow::bail!("{} exited with {}: {}", program, output.status, tail)
        }
    }
}
