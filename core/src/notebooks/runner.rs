use crate::notebooks::{CREDENTIAL_CELL_NEW, CREDENTIAL_CELL_OLD, inject_parameters, replace_code};
use crate::traits::{NotebookExecutor, Notifier};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use walkdir::WalkDir;

const NOTEBOOK_EXTENSION: &str = "ipynb";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub passed: Vec<String>,
    pub failed: Vec<String>,
}

impl RunReport {
    pub fn all_passed(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failure_message(&self) -> Option<String> {
        if self.failed.is_empty() {
            None
        } else {
            Some(format!(
                "The following notebooks failed: {}",
                self.failed.join(", ")
            ))
        }
    }
}

/// Runs every notebook in a directory, one after another.
pub struct NotebookRunner {
    dir: PathBuf,
    executor: Arc<dyn NotebookExecutor>,
    notifier: Option<Arc<dyn Notifier>>,
    parameters: Vec<(String, String)>,
    delay: Duration,
}

impl NotebookRunner {
    pub fn new(dir: impl Into<PathBuf>, executor: Arc<dyn NotebookExecutor>) -> Self {
        Self {
            dir: dir.into(),
            executor,
            notifier: None,
            parameters: Vec::new(),
            delay: Duration::from_secs(10),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_parameters(mut self, parameters: Vec<(String, String)>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Notebooks directly inside the directory, sorted by file name. Paths
    /// are absolute so they stay valid whatever directory an executor runs in.
    pub fn discover(&self) -> Result<Vec<PathBuf>> {
        if !self.dir.is_dir() {
            anyhow::bail!("Notebook directory {} does not exist", self.dir.display());
        }
        let dir = std::path::absolute(&self.dir)
            .with_context(|| format!("Failed to resolve {}", self.dir.display()))?;

        let mut notebooks = Vec::new();
        for entry in WalkDir::new(&dir).min_depth(1).max_depth(1).sort_by_file_name() {
            let entry = entry.with_context(|| format!("Failed to list {}", dir.display()))?;
            let path = entry.path();
            if entry.file_type().is_file()
                && path.extension().and_then(|e| e.to_str()) == Some(NOTEBOOK_EXTENSION)
            {
                notebooks.push(path.to_path_buf());
            }
        }
        Ok(notebooks)
    }

    pub async fn run(&self) -> Result<RunReport> {
        let notebooks = self.discover()?;
        info!(
            count = notebooks.len(),
            dir = %self.dir.display(),
            executor = self.executor.name(),
            "Running notebooks"
        );

        let mut report = RunReport::default();

        for path in notebooks {
            let name = file_name(&path);

            match self.run_one(&path).await {
                Ok(()) => {
                    info!(notebook = %name, "Notebook passed");
                    report.passed.push(name);
                }
                Err(e) => {
                    error!(notebook = %name, error = %format!("{e:#}"), "Notebook failed");
                    report.failed.push(name);
                }
            }

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }

        if let Some(message) = report.failure_message() {
            match &self.notifier {
                Some(notifier) => {
                    if let Err(e) = notifier.notify(&message).await {
                        warn!(error = %e, "Failed to send failure notification");
                    }
                }
                None => warn!("No notifier configured, failure summary not sent"),
            }
        }

        Ok(report)
    }

    async fn run_one(&self, path: &Path) -> Result<()> {
        let patched = replace_code(path, CREDENTIAL_CELL_OLD, CREDENTIAL_CELL_NEW)?;
        tracing::debug!(notebook = %path.display(), patched, "Credential cell checked");

        let prepared = path.with_file_name(format!("{}_output.ipynb", file_name(path)));
        prepare(path, &prepared, path, &self.parameters)?;

        self.executor.execute(path).await
    }
}

/// Writes the parameterised copy to `prepared` and moves it to `dest`. The
/// intermediate file never outlives a failure.
fn prepare(
    source: &Path,
    prepared: &Path,
    dest: &Path,
    parameters: &[(String, String)],
) -> Result<()> {
    let result = inject_parameters(source, prepared, parameters).and_then(|()| {
        std::fs::rename(prepared, dest).with_context(|| {
            format!(
                "Failed to move {} over {}",
                prepared.display(),
                dest.display()
            )
        })
    });

    if result.is_err()
        && prepared.exists()
        && let Err(e) = std::fs::remove_file(prepared)
    {
        warn!(path = %prepared.display(), error = %e, "Failed to remove prepared notebook");
    }

    result
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Reads each named variable from the environment.
pub fn parameters_from_env(names: &[String]) -> Result<Vec<(String, String)>> {
    names
        .iter()
        .map(|name| {
            std::env::var(name)
                .map(|value| (name.clone(), value))
                .map_err(|_| anyhow::anyhow!("Environment variable {} not set", name))
        })
        .collect()
}
