use crate::config::Config;
use crate::providers::OpenAIProvider;
use crate::providers::openai::{OPENAI_BASE_URL, OPENROUTER_BASE_URL};
use crate::traits::Provider;
use anyhow::{Result, anyhow};

const SHARED_API_KEY_ENV: &str = "RAGBENCH_API_KEY";

pub fn create_provider(config: &Config) -> Result<Box<dyn Provider>> {
    let provider_name = config.provider.as_deref().unwrap_or("openai");

    let (env_vars, default_base_url): (&[&str], &str) =
        match provider_name.to_lowercase().as_str() {
            "openai" => (&["OPENAI_API_KEY", SHARED_API_KEY_ENV], OPENAI_BASE_URL),
            "openrouter" => (&["OPENROUTER_API_KEY", SHARED_API_KEY_ENV], OPENROUTER_BASE_URL),
            _ => {
                return Err(anyhow!(
                    "Unknown provider: {}. Available: openai, openrouter",
                    provider_name
                ));
            }
        };

    let api_key = resolve_api_key_with_fallback(env_vars, &config.api_key)?;
    let base_url = config.base_url.as_deref().unwrap_or(default_base_url);

    tracing::debug!(provider = provider_name, base_url, "Creating chat provider");

    Ok(Box::new(OpenAIProvider::new(api_key).with_base_url(base_url)))
}

fn resolve_api_key_with_fallback(env_vars: &[&str], config_key: &str) -> Result<String> {
    for var_name in env_vars {
        if let Ok(key) = std::env::var(var_name)
            && !key.trim().is_empty()
        {
            return Ok(key);
        }
    }
    if !config_key.is_empty() {
        Ok(config_key.to_string())
    } else {
        Err(anyhow!(
            "No API key found. Set one of {} or api_key in the config file",
            env_vars.join(", ")
        ))
    }
}
