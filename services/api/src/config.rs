use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Defines the supported backends for dialogue generation and scoring.
///
/// `Offline` runs without any external service: canned dialogue and the
/// lexical scoring heuristic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Gemini,
    Offline,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub sessions_path: PathBuf,
    pub templates_path: PathBuf,
    pub provider: Provider,
    pub openai_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub chat_model: String,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let sessions_path = std::env::var("SESSIONS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data/sessions.json"));
        let templates_path = std::env::var("TEMPLATES_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data/templates.json"));

        let openai_api_key = std::env::var("OPENAI_API_KEY").ok();
        let gemini_api_key = std::env::var("GEMINI_API_KEY").ok();

        // Without an explicit PROVIDER, pick whichever backend has a key,
        // falling back to the deterministic offline mode.
        let provider = match std::env::var("PROVIDER") {
            Ok(value) => match value.to_lowercase().as_str() {
                "openai" => Provider::OpenAi,
                "gemini" => Provider::Gemini,
                "offline" => Provider::Offline,
                other => {
                    return Err(ConfigError::InvalidValue(
                        "PROVIDER".to_string(),
                        format!("'{other}' is not one of openai, gemini, offline"),
                    ));
                }
            },
            Err(_) => {
                if openai_api_key.is_some() {
                    Provider::OpenAi
                } else if gemini_api_key.is_some() {
                    Provider::Gemini
                } else {
                    Provider::Offline
                }
            }
        };

        let chat_model =
            std::env::var("CHAT_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        match provider {
            Provider::OpenAi => {
                if openai_api_key.is_none() {
                    return Err(ConfigError::MissingVar(
                        "OPENAI_API_KEY must be set for 'openai' provider".to_string(),
                    ));
                }
            }
            Provider::Gemini => {
                if gemini_api_key.is_none() {
                    return Err(ConfigError::MissingVar(
                        "GEMINI_API_KEY must be set for 'gemini' provider".to_string(),
                    ));
                }
            }
            Provider::Offline => {}
        }

        Ok(Self {
            bind_address,
            sessions_path,
            templates_path,
            provider,
            openai_api_key,
            gemini_api_key,
            chat_model,
            log_level,
        })
    }
}
