//! Shared HTTP plumbing for the Watcher and LOR clients.

use second_core::error::MemoryError;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// One JSON service reachable over HTTP.
pub(crate) struct ServiceClient {
    service: &'static str,
    base_url: String,
    client: reqwest::Client,
}

impl ServiceClient {
    pub(crate) fn new(service: &'static str, base_url: &str) -> Self {
        Self {
            service,
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST `body` to `path` and decode the JSON reply.
    pub(crate) async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
        timeout: Duration,
    ) -> Result<T, MemoryError> {
        let response = self.post(path, body, timeout).await?;
        response.json::<T>().await.map_err(|e| self.map_error(e))
    }

    /// POST `body` to `path`, discarding the reply body.
    pub(crate) async fn post(
        &self,
        path: &str,
        body: &serde_json::Value,
        timeout: Duration,
    ) -> Result<reqwest::Response, MemoryError> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MemoryError::Status {
                service: self.service.into(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    /// GET `path`; true on any 2xx.
    pub(crate) async fn get_ok(&self, path: &str, timeout: Duration) -> bool {
        match self
            .client
            .get(format!("{}{}", self.base_url, path))
            .timeout(timeout)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!(service = self.service, error = %e, "Health probe failed");
                false
            }
        }
    }

    fn map_error(&self, e: reqwest::Error) -> MemoryError {
        if e.is_timeout() {
            MemoryError::Timeout {
                service: self.service.into(),
            }
        } else if e.is_decode() {
            MemoryError::Decode {
                service: self.service.into(),
                reason: e.to_string(),
            }
        } else {
            MemoryError::Unreachable {
                service: self.service.into(),
                reason: e.to_string(),
            }
        }
    }
}
