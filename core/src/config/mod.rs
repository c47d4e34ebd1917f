use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const RAGBENCH_DIR: &str = ".ragbench";

pub const WEBHOOK_URL_ENV: &str = "SLACK_WEB_HOOK_URL";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StreamConfig {
    pub enabled: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionBackend {
    #[default]
    Papermill,
    Nbconvert,
}

impl std::str::FromStr for ExecutionBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "papermill" => Ok(Self::Papermill),
            "nbconvert" => Ok(Self::Nbconvert),
            other => Err(anyhow::anyhow!(
                "Unknown execution backend: {}. Available: papermill, nbconvert",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NotebookConfig {
    pub dir: PathBuf,
    pub backend: ExecutionBackend,
    /// Executable to run instead of the backend's default one.
    pub program: Option<String>,
    pub delay_secs: u64,
    pub timeout_secs: Option<u64>,
    /// Environment variables injected into every notebook as parameters.
    pub parameter_env: Vec<String>,
    pub webhook_url: Option<String>,
}

impl Default for NotebookConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("cleanlab-studio-api"),
            backend: ExecutionBackend::default(),
            program: None,
            delay_secs: 10,
            timeout_secs: None,
            parameter_env: vec!["CLEANLAB_API_KEY".to_string()],
            webhook_url: None,
        }
    }
}

impl NotebookConfig {
    /// The environment wins over the config file.
    pub fn resolve_webhook_url(&self) -> Option<String> {
        std::env::var(WEBHOOK_URL_ENV)
            .ok()
            .filter(|url| !url.trim().is_empty())
            .or_else(|| self.webhook_url.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub provider: Option<String>,
    pub api_key: String,
    pub base_url: Option<String>,
    pub model: String,
    pub max_iterations: usize,
    pub temperature: f64,
    pub stream: StreamConfig,
    pub notebooks: NotebookConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            provider: None,
            api_key: String::new(),
            base_url: None,
            model: "gpt-4o".to_string(),
            max_iterations: 10,
            temperature: 0.0,
            stream: StreamConfig::default(),
            notebooks: NotebookConfig::default(),
        }
    }
}

pub fn get_ragbench_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(RAGBENCH_DIR)
}

pub fn get_config_path() -> PathBuf {
    get_ragbench_dir().join("config.toml")
}

pub fn config_exists() -> bool {
    get_config_path().exists()
}

impl Config {
    pub fn load_or_init() -> Result<Self> {
        if config_exists() {
            load_config_from(&get_config_path())
        } else {
            tracing::debug!(path = %get_config_path().display(), "No config file, using defaults");
            Ok(Config::default())
        }
    }
}

pub fn load_config_from(config_path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(config_path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            anyhow::anyhow!(
                "Config file not found at {}. Run 'ragbench init' to create one.",
                config_path.display()
            )
        } else {
            anyhow::anyhow!("Failed to read config from {}: {}", config_path.display(), e)
        }
    })?;

    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config from {}", config_path.display()))
}

pub fn save_config_to(config: &Config, config_path: &Path) -> Result<()> {
    if let Some(parent) = config_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory {}", parent.display()))?;
    }

    let content =
        toml::to_string_pretty(config).with_context(|| "Failed to serialize config to TOML")?;

    std::fs::write(config_path, content)
        .with_context(|| format!("Failed to write config to {}", config_path.display()))?;

    Ok(())
}

pub fn save_config(config: &Config) -> Result<PathBuf> {
    let path = get_config_path();
    save_config_to(config, &path)?;
    Ok(path)
}
