use async_trait::async_trait;
use std::path::Path;

/// Runs a single notebook in place. Any `Err` marks the notebook as failed.
#[async_trait]
pub trait NotebookExecutor: Send + Sync {
    fn name(&self) -> &str;

    async fn execute(&self, notebook: &Path) -> anyhow::Result<()>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str) -> anyhow::Result<()>;
}
