// file: src/client.rs
// version: 1.0.0
// guid: 8f4a1e6b-d2c9-47b3-a05e-39c7b1d8f026

//! Slave-side client for `POST /connect`

use crate::{KangarooError, Result};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Body sent to the master
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrationPayload {
    pub token: String,
    pub hostname: String,
    pub ip: String,
    pub ssh_port: u16,
    pub description: String,
}

/// Master's answer to a successful registration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegistrationReply {
    pub status: String,
    pub server: String,
    pub ip: String,
    pub port: u16,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: String,
}

pub struct RegistrationClient {
    http: reqwest::Client,
    base_url: String,
}

impl RegistrationClient {
    /// `master` is `host[:port]` or a full `http://` URL
    pub fn new(master: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| KangarooError::network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url(master),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn register(&self, payload: &RegistrationPayload) -> Result<RegistrationReply> {
        let url = format!("{}/connect", self.base_url);
        info!("Registering {} ({}) with {}", payload.hostname, payload.ip, url);

        let response = self
            .http
            .post(&url)
            .json(payload)
            .send()
            .await
            .map_err(|e| KangarooError::network(format!("Failed to reach {}: {}", url, e)))?;

        let status = response.status();
        debug!("Master answered {}", status);

        if status.is_success() {
            return response.json::<RegistrationReply>().await.map_err(|e| {
                KangarooError::network(format!("Failed to parse master response: {}", e))
            });
        }

        let body = response.json::<ErrorBody>().await.unwrap_or_default();
        Err(match status {
            StatusCode::FORBIDDEN => KangarooError::AuthRejected,
            StatusCode::BAD_REQUEST => KangarooError::validation(body.error),
            _ => KangarooError::network(format!("Master returned {}: {}", status, body.error)),
        })
    }
}

fn base_url(master: &str) -> String {
    let master = master.trim().trim_end_matches('/');
    if master.starts_with("http://") || master.starts_with("https://") {
        master.to_string()
    } else {
        format!("http://{}", master)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url() {
        assert_eq!(base_url("10.0.0.1:5000"), "http://10.0.0.1:5000");
        assert_eq!(base_url("http://master:5000/"), "http://master:5000");
        assert_eq!(base_url("https://master"), "https://master");
    }

    #[test]
    fn test_payload_shape() {
        let payload = RegistrationPayload {
            token: "t".into(),
            hostname: "web1".into(),
            ip: "10.0.0.5".into(),
            ssh_port: 22,
            description: "self-registered".into(),
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["ssh_port"], 22);
        assert_eq!(value["hostname"], "web1");
    }
}
