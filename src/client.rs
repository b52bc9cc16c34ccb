use std::time::Duration;

use anyhow::{Context, Result};
use tracing::debug;

use crate::error::FetchError;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Status and body of one response. Non-200 statuses are data, not errors;
/// each call site decides whether a bad status is retryable.
#[derive(Debug, Clone)]
pub struct PageResponse {
    pub status: u16,
    pub body: String,
}

impl PageResponse {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// The fetch seam between the collectors and the network. Collectors own one
/// implementation each and tests script it.
pub trait HttpFetch {
    fn get(&self, url: &str) -> Result<PageResponse, FetchError>;
}

/// Blocking reqwest session with a fixed per-request deadline.
pub struct WebClient {
    client: reqwest::blocking::Client,
}

impl WebClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }
}

impl HttpFetch for WebClient {
    fn get(&self, url: &str) -> Result<PageResponse, FetchError> {
        let response = self.client.get(url).send().map_err(classify)?;
        let status = response.status().as_u16();
        let body = response.text().map_err(classify)?;
        Ok(PageResponse { status, body })
    }
}

fn classify(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Transport(err)
    }
}

/// Runs `op` up to `attempts` times, retrying only retryable failures.
/// Retries are immediate; there is no backoff.
pub fn with_retries<T>(
    attempts: u32,
    mut op: impl FnMut() -> Result<T, FetchError>,
) -> Result<T, FetchError> {
    let attempts = attempts.max(1);
    let mut result = op();
    for attempt in 1..attempts {
        match &result {
            Ok(_) => break,
            Err(e) if e.is_retryable() => {
                debug!(attempt = attempt + 1, error = %e, "retrying request");
                result = op();
            }
            Err(_) => break,
        }
    }
    result
}
