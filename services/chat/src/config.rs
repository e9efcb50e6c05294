use avatar_core::{
    prompt::{ContractPlacement, DEFAULT_PERSONA},
    reply::DecodePolicy,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
    #[error("Failed to read persona file {0}: {1}")]
    PersonaFile(PathBuf, std::io::Error),
}

/// How replies are written to the terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderFormat {
    Text,
    Json,
}

/// Vector-store settings. Present only when retrieval augmentation is on.
#[derive(Clone, Debug, PartialEq)]
pub struct RetrievalConfig {
    pub index_name: String,
    pub pinecone_api_key: String,
    pub index_host: Option<String>,
    pub embedding_model: String,
    pub timeout: Duration,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub openai_api_key: String,
    pub realtime_url: String,
    pub realtime_model: String,
    pub connect_timeout: Duration,
    pub temperature: f64,
    pub persona: String,
    pub contract_placement: ContractPlacement,
    pub greeting: Option<String>,
    pub retrieval: Option<RetrievalConfig>,
    pub render_format: RenderFormat,
    pub decode_policy: DecodePolicy,
    pub log_level: Level,
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_secs(name: &str, default: &str) -> Result<Duration, ConfigError> {
    let raw = var_or(name, default);
    raw.parse::<u64>()
        .ok()
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
        .ok_or_else(|| {
            ConfigError::InvalidValue(
                name.to_string(),
                format!("'{}' is not a positive number of seconds", raw),
            )
        })
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let openai_api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| ConfigError::MissingVar("OPENAI_API_KEY".to_string()))?;

        let realtime_url = var_or("REALTIME_URL", openai_realtime::client::DEFAULT_REALTIME_URL);
        let realtime_model =
            var_or("REALTIME_MODEL", openai_realtime::client::DEFAULT_REALTIME_MODEL);
        let connect_timeout = parse_secs("CONNECT_TIMEOUT_SECS", "15")?;

        let temperature_str = var_or("TEMPERATURE", "0.8");
        let temperature = temperature_str
            .parse::<f64>()
            .ok()
            .filter(|t| (0.6..=1.2).contains(t))
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "TEMPERATURE".to_string(),
                    format!("'{}' is not a number between 0.6 and 1.2", temperature_str),
                )
            })?;

        let persona = match std::env::var("PERSONA_PATH") {
            Ok(path) => {
                let path = PathBuf::from(path);
                std::fs::read_to_string(&path)
                    .map_err(|e| ConfigError::PersonaFile(path.clone(), e))?
                    .trim()
                    .to_string()
            }
            Err(_) => DEFAULT_PERSONA.to_string(),
        };

        let placement_str = var_or("CONTRACT_PLACEMENT", "session");
        let contract_placement = match placement_str.to_lowercase().as_str() {
            "session" => ContractPlacement::Session,
            "turn" => ContractPlacement::Turn,
            _ => {
                return Err(ConfigError::InvalidValue(
                    "CONTRACT_PLACEMENT".to_string(),
                    format!("'{}' must be 'session' or 'turn'", placement_str),
                ));
            }
        };

        let greeting = Some(var_or("GREETING", "Hello!"))
            .map(|g| g.trim().to_string())
            .filter(|g| !g.is_empty());

        let retrieval = match std::env::var("RETRIEVAL_INDEX") {
            Ok(index_name) if !index_name.trim().is_empty() => {
                let pinecone_api_key = std::env::var("PINECONE_API_KEY").map_err(|_| {
                    ConfigError::MissingVar(
                        "PINECONE_API_KEY must be set when RETRIEVAL_INDEX is set".to_string(),
                    )
                })?;
                Some(RetrievalConfig {
                    index_name: index_name.trim().to_string(),
                    pinecone_api_key,
                    index_host: std::env::var("PINECONE_INDEX_HOST").ok(),
                    embedding_model: var_or("EMBEDDING_MODEL", "text-embedding-3-small"),
                    timeout: parse_secs("RETRIEVAL_TIMEOUT_SECS", "10")?,
                })
            }
            _ => None,
        };

        let format_str = var_or("RENDER_FORMAT", "text");
        let render_format = match format_str.to_lowercase().as_str() {
            "text" => RenderFormat::Text,
            "json" => RenderFormat::Json,
            _ => {
                return Err(ConfigError::InvalidValue(
                    "RENDER_FORMAT".to_string(),
                    format!("'{}' must be 'text' or 'json'", format_str),
                ));
            }
        };

        let policy_str = var_or("DECODE_POLICY", "lenient");
        let decode_policy = match policy_str.to_lowercase().as_str() {
            "lenient" => DecodePolicy::Lenient,
            "strict" => DecodePolicy::Strict,
            _ => {
                return Err(ConfigError::InvalidValue(
                    "DECODE_POLICY".to_string(),
                    format!("'{}' must be 'lenient' or 'strict'", policy_str),
                ));
            }
        };

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            openai_api_key,
            realtime_url,
            realtime_model,
            connect_timeout,
            temperature,
            persona,
            contract_placement,
            greeting,
            retrieval,
            render_format,
            decode_policy,
            log_level,
        })
    }
}
