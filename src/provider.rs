// Shared plumbing for the RapidAPI-hosted data providers

use crate::config::ProviderEndpoint;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    Transport(String),

    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    #[error("API error: {status_code} - {message}")]
    Status { status_code: u16, message: String },

    #[error("Error parsing API response: {0}")]
    Parse(String),

    #[error("Client error: {0}")]
    Client(String),
}

impl ProviderError {
    fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout(timeout.as_millis() as u64)
        } else {
            ProviderError::Transport(err.to_string())
        }
    }
}

/// GET-with-JSON-body transport that presents the static RapidAPI credential.
#[derive(Debug, Clone)]
pub struct RapidApiTransport {
    client: Client,
    endpoint: ProviderEndpoint,
    api_key: SecretString,
    timeout: Duration,
}

impl RapidApiTransport {
    pub fn new(
        endpoint: ProviderEndpoint,
        api_key: &str,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Client(e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            api_key: SecretString::from(api_key.to_string()),
            timeout,
        })
    }

    pub fn host(&self) -> &str {
        &self.endpoint.host
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ProviderError> {
        let url = format!("{}{}", self.endpoint.base_url.trim_end_matches('/'), path);
        debug!(host = %self.endpoint.host, path, ?query, "provider request");

        let response = self
            .client
            .get(&url)
            .header("x-rapidapi-key", self.api_key.expose_secret())
            .header("x-rapidapi-host", &self.endpoint.host)
            .query(query)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(e, self.timeout))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::from_reqwest(e, self.timeout))?;

        if !status.is_success() {
            warn!(host = %self.endpoint.host, path, %status, "provider returned error status");
            return Err(ProviderError::Status {
                status_code: status.as_u16(),
                message: body,
            });
        }

        decode_body(&body)
    }
}

pub fn decode_body<T: DeserializeOwned>(body: &str) -> Result<T, ProviderError> {
    serde_json::from_str(body).map_err(|e| ProviderError::Parse(e.to_string()))
}

// Treats an explicit `null` like an absent field
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
