use anyhow::Result;
use ragbench_core::config::NotebookConfig;
use ragbench_core::{CommandExecutor, NotebookRunner, SlackWebhook, parameters_from_env};
use std::sync::Arc;
use std::time::Duration;

pub async fn run(config: &NotebookConfig) -> Result<()> {
    let parameters = parameters_from_env(&config.parameter_env)?;

    let mut executor = CommandExecutor::new(config.backend)
        .with_timeout(config.timeout_secs.map(Duration::from_secs))
        .with_env(parameters.clone());
    if let Some(program) = &config.program {
        executor = executor.with_program(program.clone());
    }

    let mut runner = NotebookRunner::new(&config.dir, Arc::new(executor))
        .with_parameters(parameters)
        .with_delay(Duration::from_secs(config.delay_secs));

    match config.resolve_webhook_url() {
        Some(url) => runner = runner.with_notifier(Arc::new(SlackWebhook::new(url))),
        None => tracing::warn!(
            "No webhook URL configured; set {} to receive failure reports",
            ragbench_core::config::WEBHOOK_URL_ENV
        ),
    }

    let report = runner.run().await?;

    if report.all_passed() {
        println!(
            "All notebooks passed successfully at {}",
            chrono::Local::now().format("%d/%m/%Y_%H:%M:%S")
        );
        return Ok(());
    }

    for name in &report.failed {
        println!("{}", name);
    }
    anyhow::bail!("{} notebook(s) failed", report.failed.len())
}
