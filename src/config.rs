use std::env;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_API_URL: &str = "http://localhost:8000";
const DEFAULT_SUBMIT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_REPLACE_TIMEOUT_SECS: u64 = 300;
const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;
const DEFAULT_POLL_RETRY_MS: u64 = 3_000;
/// Result limit used when the limit input cannot be interpreted.
pub const DEFAULT_SEARCH_LIMIT: u32 = 5;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the ingestion client.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the ingestion and search service.
    pub api_url: String,
    /// Bearer credential supplied directly through the environment.
    pub token: Option<String>,
    /// Path to a file holding the bearer credential.
    pub token_file: Option<String>,
    /// Bounded wait applied to the initial submission.
    pub submit_timeout: Duration,
    /// Extended wait applied to replace calls and synchronous uploads.
    pub replace_timeout: Duration,
    /// Delay before the next status lookup while a job is still running.
    pub poll_interval: Duration,
    /// Delay before the next status lookup after a communication failure.
    pub poll_retry_delay: Duration,
    /// Optional ceiling on consecutive communication failures while polling.
    pub poll_max_transient_retries: Option<u32>,
    /// Result limit used when the limit input does not parse.
    pub search_default_limit: u32,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let api_url = read("INGEST_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        reqwest::Url::parse(&api_url)
            .map_err(|_| ConfigError::InvalidValue("INGEST_API_URL".into()))?;

        Ok(Self {
            api_url,
            token: read("INGEST_TOKEN").map(|value| value.trim().to_string()),
            token_file: read("INGEST_TOKEN_FILE"),
            submit_timeout: Duration::from_secs(
                parse_or("INGEST_SUBMIT_TIMEOUT_SECS", read("INGEST_SUBMIT_TIMEOUT_SECS"))?
                    .unwrap_or(DEFAULT_SUBMIT_TIMEOUT_SECS),
            ),
            replace_timeout: Duration::from_secs(
                parse_or("INGEST_REPLACE_TIMEOUT_SECS", read("INGEST_REPLACE_TIMEOUT_SECS"))?
                    .unwrap_or(DEFAULT_REPLACE_TIMEOUT_SECS),
            ),
            poll_interval: Duration::from_millis(
                parse_or("INGEST_POLL_INTERVAL_MS", read("INGEST_POLL_INTERVAL_MS"))?
                    .unwrap_or(DEFAULT_POLL_INTERVAL_MS),
            ),
            poll_retry_delay: Duration::from_millis(
                parse_or("INGEST_POLL_RETRY_MS", read("INGEST_POLL_RETRY_MS"))?
                    .unwrap_or(DEFAULT_POLL_RETRY_MS),
            ),
            poll_max_transient_retries: parse_or(
                "INGEST_POLL_MAX_TRANSIENT_RETRIES",
                read("INGEST_POLL_MAX_TRANSIENT_RETRIES"),
            )?,
            search_default_limit: parse_or(
                "INGEST_SEARCH_DEFAULT_LIMIT",
                read("INGEST_SEARCH_DEFAULT_LIMIT"),
            )?
            .unwrap_or(DEFAULT_SEARCH_LIMIT),
        })
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, value: Option<String>) -> Result<Option<T>, ConfigError> {
    value
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() -> Result<&'static Config, ConfigError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::debug!(
        api_url = %config.api_url,
        has_token = config.token.is_some(),
        token_file = ?config.token_file,
        submit_timeout = ?config.submit_timeout,
        replace_timeout = ?config.replace_timeout,
        poll_interval = ?config.poll_interval,
        poll_retry_delay = ?config.poll_retry_delay,
        poll_max_transient_retries = ?config.poll_max_transient_retries,
        "Loaded configuration"
    );
    Ok(CONFIG.get_or_init(|| config))
}
