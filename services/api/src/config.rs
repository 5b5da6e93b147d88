use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::Level;
use tutor_core::llm_client::Provider;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
///
/// API keys are optional. A server without a key for its provider still
/// starts and answers every tutoring request with a configuration error.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub provider: Provider,
    pub anthropic_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub log_level: Level,
    pub prompts_path: PathBuf,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let provider = std::env::var("LLM_PROVIDER")
            .unwrap_or_else(|_| "anthropic".to_string())
            .parse::<Provider>()
            .map_err(|e| ConfigError::InvalidValue("LLM_PROVIDER".to_string(), e))?;

        let anthropic_api_key = non_empty_var("ANTHROPIC_API_KEY");
        let openai_api_key = non_empty_var("OPENAI_API_KEY");

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let prompts_path = std::env::var("PROMPTS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./prompts"));

        Ok(Self {
            bind_address,
            provider,
            anthropic_api_key,
            openai_api_key,
            log_level,
            prompts_path,
        })
    }

    /// The key for the selected provider, if one is configured.
    pub fn api_key(&self) -> Option<&str> {
        match self.provider {
            Provider::Anthropic => self.anthropic_api_key.as_deref(),
            Provider::OpenAI => self.openai_api_key.as_deref(),
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
