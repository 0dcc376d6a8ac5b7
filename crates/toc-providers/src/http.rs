//! Blocking HTTP plumbing shared by the provider clients
//!
//! Every call builds a fresh agent with a global timeout. HTTP status codes
//! are not turned into transport errors by ureq; responses with status >= 400
//! become `TocError::Http` carrying the body verbatim. Nothing is retried.

use std::io::Read;
use std::time::Duration;
use toc_core::{Result, TocError};

/// Timeout for API requests (submit, poll, generate)
pub const REQUEST_TIMEOUT_SECS: u64 = 180;
/// Timeout for downloading generated media
pub const DOWNLOAD_TIMEOUT_SECS: u64 = 600;

/// Header name/value pairs
pub type Headers = Vec<(String, String)>;

pub fn header(name: &str, value: impl Into<String>) -> (String, String) {
    (name.to_string(), value.into())
}

/// A blocking JSON/bytes client with a fixed per-call timeout
#[derive(Debug, Clone, Copy)]
pub struct HttpClient {
    timeout: Duration,
}

impl HttpClient {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Client for ordinary API calls
    pub fn api() -> Self {
        Self::new(Duration::from_secs(REQUEST_TIMEOUT_SECS))
    }

    /// Client for large media downloads
    pub fn download() -> Self {
        Self::new(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
    }

    fn agent(&self) -> ureq::Agent {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(self.timeout))
            .http_status_as_error(false)
            .build();
        config.into()
    }

    /// POST a JSON payload and return the raw response body
    pub fn post_json_for_bytes(
        &self,
        url: &str,
        headers: &Headers,
        payload: &serde_json::Value,
    ) -> Result<Vec<u8>> {
        // send_json sets content-type itself
        let mut request = self.agent().post(url);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }
        tracing::debug!(url, "POST");
        finish(url, request.send_json(payload))
    }

    /// POST a JSON payload and parse the JSON response
    pub fn post_json(
        &self,
        url: &str,
        headers: &Headers,
        payload: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        let body = self.post_json_for_bytes(url, headers, payload)?;
        parse_json(url, &body)
    }

    /// GET and return the raw response body
    pub fn get_bytes(&self, url: &str, headers: &Headers) -> Result<Vec<u8>> {
        let mut request = self.agent().get(url);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }
        tracing::debug!(url, "GET");
        finish(url, request.call())
    }

    /// GET and parse the JSON response
    pub fn get_json(&self, url: &str, headers: &Headers) -> Result<serde_json::Value> {
        let body = self.get_bytes(url, headers)?;
        parse_json(url, &body)
    }
}

fn finish(
    url: &str,
    response: std::result::Result<ureq::http::Response<ureq::Body>, ureq::Error>,
) -> Result<Vec<u8>> {
    let response = response.map_err(|e| TocError::Transport {
        url: url.to_string(),
        message: e.to_string(),
    })?;

    let status = response.status();
    let mut bytes = Vec::new();
    response
        .into_body()
        .into_reader()
        .read_to_end(&mut bytes)
        .map_err(|e| TocError::Transport {
            url: url.to_string(),
            message: format!("failed to read response body: {}", e),
        })?;

    if status.as_u16() >= 400 {
        return Err(TocError::Http {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("").to_string(),
            url: url.to_string(),
            body: String::from_utf8_lossy(&bytes).into_owned(),
        });
    }
    Ok(bytes)
}

fn parse_json(url: &str, body: &[u8]) -> Result<serde_json::Value> {
    serde_json::from_slice(body).map_err(|e| {
        TocError::Provider(format!("Invalid JSON response from {}: {}", url, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_helper() {
        assert_eq!(
            header("xi-api-key", "k"),
            ("xi-api-key".to_string(), "k".to_string())
        );
    }

    #[test]
    fn test_parse_json_error_names_url() {
        let err = parse_json("https://api.example.com/x", b"<html>").unwrap_err();
        assert!(err.to_string().contains("https://api.example.com/x"));
        let ok = parse_json("u", br#"{"done":true}"#).unwrap();
        assert_eq!(ok["done"], serde_json::json!(true));
    }

    #[test]
    fn test_client_timeouts() {
        assert_eq!(HttpClient::api().timeout, Duration::from_secs(180));
        assert_eq!(HttpClient::download().timeout, Duration::from_secs(600));
    }
}
