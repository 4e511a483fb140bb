use reqwest::{Client, Response};
use std::time::Duration;
use tracing::warn;

use crate::{prelude::*, BaseUrl};

/// HTTP status codes that indicate transient server errors (retryable)
const RETRYABLE_STATUS_CODES: &[u16] = &[502, 503, 504];

/// Maximum number of retry attempts for transient errors
const MAX_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds (doubles with each retry)
const INITIAL_BACKOFF_MS: u64 = 100;

#[derive(Debug)]
pub struct HttpClient {
    pub client: Client,
    pub base_url: String,
    api_key: Option<String>,
}

async fn parse_response(response: Response) -> Result<String> {
    let status_code = response.status().as_u16();
    let text = response
        .text()
        .await
        .map_err(|e| Error::GenericRequest(e.to_string()))?;

    if status_code < 400 {
        return Ok(text);
    }
    if (400..500).contains(&status_code) {
        return Err(Error::ClientRequest {
            status_code,
            error_message: text,
        });
    }

    Err(Error::ServerRequest {
        status_code,
        error_message: text,
    })
}

impl HttpClient {
    pub fn new(client: Client, base_url: String, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url,
            api_key,
        }
    }

    /// Send a GET request with automatic retry for transient server errors
    /// (502, 503, 504), with exponential backoff between retries.
    pub async fn get(&self, url_path: &str, query: &[(&str, String)]) -> Result<String> {
        let full_url = format!("{}{url_path}", self.base_url);

        for attempt in 0..=MAX_RETRIES {
            let mut builder = self.client.get(&full_url).query(query);
            if let Some(key) = &self.api_key {
                builder = builder.header("X-API-KEY", key);
            }
            let result = builder
                .send()
                .await
                .map_err(|e| Error::GenericRequest(e.to_string()))?;

            let status = result.status().as_u16();
            if RETRYABLE_STATUS_CODES.contains(&status) && attempt < MAX_RETRIES {
                let backoff = Duration::from_millis(INITIAL_BACKOFF_MS * 2u64.pow(attempt));
                warn!(
                    status = status,
                    attempt = attempt + 1,
                    max_attempts = MAX_RETRIES + 1,
                    backoff_ms = backoff.as_millis(),
                    url = %url_path,
                    "Retryable HTTP error, backing off"
                );
                tokio::time::sleep(backoff).await;
                continue;
            }

            return parse_response(result).await;
        }

        Err(Error::GenericRequest(format!(
            "Max retries ({MAX_RETRIES}) exceeded for {url_path}"
        )))
    }

    /// Send a POST request with the same transient-error retry as `get`.
    pub async fn post(&self, url_path: &str, data: String) -> Result<String> {
        let full_url = format!("{}{url_path}", self.base_url);

        for attempt in 0..=MAX_RETRIES {
            let mut builder = self
                .client
                .post(&full_url)
                .header("Content-Type", "application/json")
                .body(data.clone());
            if let Some(key) = &self.api_key {
                builder = builder.header("X-API-KEY", key);
            }
            let result = builder
                .send()
                .await
                .map_err(|e| Error::GenericRequest(e.to_string()))?;

            let status = result.status().as_u16();
            if RETRYABLE_STATUS_CODES.contains(&status) && attempt < MAX_RETRIES {
                let backoff = Duration::from_millis(INITIAL_BACKOFF_MS * 2u64.pow(attempt));
                warn!(
                    status = status,
                    attempt = attempt + 1,
                    max_attempts = MAX_RETRIES + 1,
                    backoff_ms = backoff.as_millis(),
                    url = %url_path,
                    "Retryable HTTP error, backing off"
                );
                tokio::time::sleep(backoff).await;
                continue;
            }

            return parse_response(result).await;
        }

        Err(Error::GenericRequest(format!(
            "Max retries ({MAX_RETRIES}) exceeded for {url_path}"
        )))
    }

    pub fn is_mainnet(&self) -> bool {
        self.base_url == BaseUrl::Mainnet.get_url()
    }
}
