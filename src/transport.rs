use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;

use crate::error::QcError;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Fetch-by-relative-URL capability of the instrument data service.
///
/// Every remote read in the pipeline goes through this seam, so tests can
/// substitute canned responses for a live instrument.
pub trait DataService: Send + Sync {
    fn get_json(&self, rel_url: &str) -> Result<Value, QcError>;
    fn get_text(&self, rel_url: &str) -> Result<String, QcError>;
}

#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    /// Normalized server address, scheme included, no trailing slash.
    pub server: String,
    pub username: String,
    pub password: String,
    pub accept_invalid_certs: bool,
    pub timeout: Duration,
}

#[derive(Clone)]
pub struct HttpDataService {
    client: Client,
    base_url: String,
    username: String,
    password: String,
}

impl HttpDataService {
    pub fn new(settings: &ConnectionSettings) -> Result<Self, QcError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("ampliqc/{}", env!("CARGO_PKG_VERSION"))).map_err(
                |err| QcError::Transport {
                    url: settings.server.clone(),
                    message: err.to_string(),
                },
            )?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(settings.timeout)
            .danger_accept_invalid_certs(settings.accept_invalid_certs)
            .build()
            .map_err(|err| QcError::Transport {
                url: settings.server.clone(),
                message: err.to_string(),
            })?;

        Ok(Self {
            client,
            base_url: settings.server.clone(),
            username: settings.username.clone(),
            password: settings.password.clone(),
        })
    }

    fn get(&self, rel_url: &str) -> Result<reqwest::blocking::Response, QcError> {
        let url = format!("{}{}", self.base_url, rel_url);
        tracing::debug!(%url, "GET");
        let response = self
            .client
            .get(&url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .map_err(|err| QcError::Transport {
                url: url.clone(),
                message: err.to_string(),
            })?;
        Self::handle_status(url, response)
    }

    fn handle_status(
        url: String,
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, QcError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let reason = response
            .text()
            .unwrap_or_else(|_| "request failed".to_string());
        Err(QcError::Status {
            url,
            status,
            reason,
        })
    }
}

impl DataService for HttpDataService {
    fn get_json(&self, rel_url: &str) -> Result<Value, QcError> {
        let url = format!("{}{}", self.base_url, rel_url);
        let response = self.get(rel_url)?;
        response.json().map_err(|err| QcError::Transport {
            url,
            message: err.to_string(),
        })
    }

    fn get_text(&self, rel_url: &str) -> Result<String, QcError> {
        let url = format!("{}{}", self.base_url, rel_url);
        let response = self.get(rel_url)?;
        response.text().map_err(|err| QcError::Transport {
            url,
            message: err.to_string(),
        })
    }
}

/// Accepts bare host names or full URLs; the original tool was pointed at
/// instruments by IP address.
pub fn normalize_server(server: &str) -> Result<String, QcError> {
    let trimmed = server.trim();
    if trimmed.is_empty() {
        return Err(QcError::InvalidServer(server.to_string()));
    }
    let mut normalized = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };
    while normalized.ends_with('/') {
        normalized.pop();
    }
    Ok(normalized)
}
