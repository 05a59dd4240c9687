// Runtime configuration for the assistant
// Credentials come from the environment (optionally seeded from a .env file)

use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use thiserror::Error;

pub const GEMINI_API_KEY_VAR: &str = "GEMINI_API_KEY";
pub const RAPID_API_KEY_VAR: &str = "RAPID_API_KEY";
pub const GEMINI_MODEL_VAR: &str = "GEMINI_MODEL";
pub const HTTP_TIMEOUT_VAR: &str = "TRAVEL_HTTP_TIMEOUT_SECS";
pub const ATTRACTION_COOLDOWN_VAR: &str = "TRAVEL_ATTRACTION_COOLDOWN_SECS";
pub const GEMINI_BASE_URL_VAR: &str = "GEMINI_BASE_URL";
pub const FLIGHTS_BASE_URL_VAR: &str = "FLIGHTS_BASE_URL";
pub const HOTELS_BASE_URL_VAR: &str = "HOTELS_BASE_URL";
pub const SEARCH_BASE_URL_VAR: &str = "SEARCH_BASE_URL";

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
pub const FLIGHTS_HOST: &str = "sky-scanner3.p.rapidapi.com";
pub const HOTELS_HOST: &str = "tripadvisor16.p.rapidapi.com";
pub const DEFAULT_SEARCH_BASE_URL: &str = "https://html.duckduckgo.com";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_ATTRACTION_COOLDOWN_SECS: u64 = 5;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing credential `{0}`: set it in the environment or a .env file")]
    MissingCredential(&'static str),

    #[error("invalid value for `{key}`: `{value}`")]
    InvalidValue { key: &'static str, value: String },
}

// Connection settings for one RapidAPI-hosted provider
#[derive(Debug, Clone)]
pub struct ProviderEndpoint {
    pub base_url: String,
    pub host: String,
}

impl ProviderEndpoint {
    pub fn rapidapi(host: &str) -> Self {
        Self {
            base_url: format!("https://{}", host),
            host: host.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AssistantConfig {
    pub gemini_api_key: SecretString,
    pub rapid_api_key: SecretString,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub flights: ProviderEndpoint,
    pub hotels: ProviderEndpoint,
    pub search_base_url: String,
    pub http_timeout: Duration,
    pub attraction_cooldown: Duration,
}

impl AssistantConfig {
    /// Builds a config with default endpoints and timings around the two credentials.
    pub fn new(gemini_api_key: impl Into<String>, rapid_api_key: impl Into<String>) -> Self {
        Self {
            gemini_api_key: SecretString::from(gemini_api_key.into()),
            rapid_api_key: SecretString::from(rapid_api_key.into()),
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            gemini_base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            flights: ProviderEndpoint::rapidapi(FLIGHTS_HOST),
            hotels: ProviderEndpoint::rapidapi(HOTELS_HOST),
            search_base_url: DEFAULT_SEARCH_BASE_URL.to_string(),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            attraction_cooldown: Duration::from_secs(DEFAULT_ATTRACTION_COOLDOWN_SECS),
        }
    }

    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!(path = %path.display(), "loaded .env file"),
            Err(e) if e.not_found() => {}
            Err(e) => tracing::warn!(error = %e, "ignoring unreadable .env file"),
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    // Split out so tests can feed a fixed environment
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let gemini_key = required(&lookup, GEMINI_API_KEY_VAR)?;
        let rapid_key = required(&lookup, RAPID_API_KEY_VAR)?;
        let mut config = Self::new(gemini_key, rapid_key);

        if let Some(model) = optional(&lookup, GEMINI_MODEL_VAR) {
            config.gemini_model = model;
        }
        if let Some(url) = optional(&lookup, GEMINI_BASE_URL_VAR) {
            config.gemini_base_url = url;
        }
        if let Some(url) = optional(&lookup, FLIGHTS_BASE_URL_VAR) {
            config.flights.base_url = url;
        }
        if let Some(url) = optional(&lookup, HOTELS_BASE_URL_VAR) {
            config.hotels.base_url = url;
        }
        if let Some(url) = optional(&lookup, SEARCH_BASE_URL_VAR) {
            config.search_base_url = url;
        }
        if let Some(secs) = parse_secs(&lookup, HTTP_TIMEOUT_VAR)? {
            config.http_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_secs(&lookup, ATTRACTION_COOLDOWN_VAR)? {
            config.attraction_cooldown = Duration::from_secs(secs);
        }

        Ok(config)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.gemini_model = model.into();
        self
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    pub fn with_attraction_cooldown(mut self, cooldown: Duration) -> Self {
        self.attraction_cooldown = cooldown;
        self
    }

    pub(crate) fn rapid_api_key(&self) -> &str {
        self.rapid_api_key.expose_secret()
    }
}

fn optional<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required<F>(lookup: &F, key: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    optional(lookup, key).ok_or(ConfigError::MissingCredential(key))
}

fn parse_secs<F>(lookup: &F, key: &'static str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match optional(lookup, key) {
        None => Ok(None),
        Some(value) => value
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { key, value }),
    }
}
