use anyhow::Result;
use clap::{Parser, Subcommand};
use ragbench_core::{agent, config, providers, rag, tools};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod notebooks;

#[derive(Parser)]
#[command(name = "ragbench")]
#[command(about = "ragbench - RAG chat with tool calls, and a notebook test harness", long_about = None)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file
    Init {
        #[arg(long)]
        force: bool,
    },
    /// Ask a question against the product context
    Ask {
        #[arg(short, long)]
        question: Option<String>,
    },
    /// Execute every notebook in a directory and report failures
    Notebooks {
        #[arg(short, long)]
        dir: Option<PathBuf>,
        #[arg(long)]
        delay_secs: Option<u64>,
        #[arg(long)]
        backend: Option<config::ExecutionBackend>,
    },
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Init { force } => {
            if config::config_exists() && !force {
                anyhow::bail!(
                    "Config already exists at {}. Pass --force to overwrite it.",
                    config::get_config_path().display()
                );
            }
            let path = config::save_config(&config::Config::default())?;
            println!("Wrote {}", path.display());
        }
        Commands::Ask { question } => {
            let config = config::Config::load_or_init()?;
            let pipeline = build_pipeline(&config)?;

            if let Some(question) = question {
                println!("{}", pipeline.answer(&question).await?);
            } else {
                interactive(&pipeline).await;
            }
        }
        Commands::Notebooks {
            dir,
            delay_secs,
            backend,
        } => {
            let mut config = config::Config::load_or_init()?;
            if let Some(dir) = dir {
                config.notebooks.dir = dir;
            }
            if let Some(delay) = delay_secs {
                config.notebooks.delay_secs = delay;
            }
            if let Some(backend) = backend {
                config.notebooks.backend = backend;
            }
            notebooks::run(&config.notebooks).await?;
        }
    }

    Ok(())
}

fn build_pipeline(config: &config::Config) -> Result<rag::RagPipeline> {
    let provider: Arc<dyn ragbench_core::Provider> = Arc::from(providers::create_provider(config)?);

    let tool_registry =
        agent::ToolRegistry::new().with_tool(Arc::new(tools::TodaysDateTool::new()));

    let chat = agent::ChatLoop::new(provider, Arc::new(tool_registry), config.model.clone())
        .with_temperature(config.temperature)
        .with_streaming(config.stream.enabled)
        .with_max_iterations(config.max_iterations);

    Ok(rag::RagPipeline::new(
        Arc::new(rag::StaticRetriever::default()),
        chat,
    ))
}

async fn interactive(pipeline: &rag::RagPipeline) {
    use std::io::BufRead;

    println!("Ask about the product (Ctrl+D to exit):\n");
    let stdin = std::io::stdin();

    loop {
        print!("> ");
        let _ = std::io::stdout().flush();

        let mut input = String::new();
        match stdin.lock().read_line(&mut input) {
            Ok(0) | Err(_) => {
                println!();
                break;
            }
            Ok(_) => {
                let input = input.trim();
                if input.is_empty() {
                    continue;
                }

                match pipeline.answer(input).await {
                    Ok(response) => println!("{}\n", response),
                    Err(e) => eprintln!("Error: {:#}\n", e),
                }
            }
        }
    }
}
