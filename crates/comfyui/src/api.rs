//! REST API client for the ComfyUI HTTP endpoints.
//!
//! [`ComfyUIApi`] is stateless beyond its base URL, which is captured at
//! construction: a poll loop holds one instance for its whole run, so a
//! runtime URL change can never mix backends mid-job.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::resolver::OutputLocator;

/// Timeout for image downloads (source fetch and output retrieval).
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);
/// Timeout for multipart uploads.
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(60);
/// Timeout for control-plane calls (submit, queue, history).
const CONTROL_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from the ComfyUI REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum ComfyUIApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// ComfyUI returned a non-2xx status code.
    #[error("ComfyUI API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

/// Live queue contents, used as the completion oracle: a job is complete
/// when it appears in neither list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueueSnapshot {
    #[serde(default)]
    pub queue_pending: Vec<serde_json::Value>,
    #[serde(default)]
    pub queue_running: Vec<serde_json::Value>,
}

impl QueueSnapshot {
    /// Whether the job id appears in either the pending or running list.
    ///
    /// Queue entries are arrays whose second element is the prompt id.
    pub fn contains(&self, job_id: &str) -> bool {
        self.queue_pending
            .iter()
            .chain(self.queue_running.iter())
            .any(|item| item.get(1).and_then(|v| v.as_str()) == Some(job_id))
    }

    /// Total number of queued and running jobs.
    pub fn len(&self) -> usize {
        self.queue_pending.len() + self.queue_running.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The generation backend's primitive operations.
///
/// Implemented by [`ComfyUIApi`]; the orchestration engine and resolver
/// depend on this trait so tests can substitute a scripted backend.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Base HTTP URL of this backend instance.
    fn base_url(&self) -> &str;

    /// Upload image bytes into the backend's input folder.
    ///
    /// Non-2xx responses and transport errors both report `false`; the
    /// caller decides whether that aborts the job.
    async fn upload_image(&self, bytes: Vec<u8>, filename: &str) -> bool;

    /// Fetch an image from a URL (following redirects) and upload it.
    /// Fetch failures and upload failures are indistinguishable.
    async fn upload_image_from_url(&self, url: &str, filename: &str) -> bool;

    /// Submit a workflow graph. `None` means the job could not be
    /// started (non-2xx or transport failure), never "pending".
    async fn submit_workflow(&self, graph: &serde_json::Value) -> Option<String>;

    /// Fetch the live queue. Transport failures are errors, not empty
    /// snapshots: the resolver must be able to tell "fetch failed" from
    /// "job genuinely absent".
    async fn queue_snapshot(&self) -> Result<QueueSnapshot, ComfyUIApiError>;

    /// Fetch history for a job. `None` means "not yet available".
    async fn get_history(&self, job_id: &str) -> Option<serde_json::Value>;

    /// Download a finished output's bytes.
    async fn download_output(&self, locator: &OutputLocator) -> Option<Vec<u8>>;
}

/// HTTP client for a single ComfyUI instance.
pub struct ComfyUIApi {
    client: reqwest::Client,
    base_url: String,
}

impl ComfyUIApi {
    /// Create a new API client for a ComfyUI instance.
    ///
    /// * `base_url` - Base HTTP URL, e.g. `http://host:8188`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Create an API client reusing an existing [`reqwest::Client`]
    /// (connection pooling across requests).
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    async fn post_upload(&self, bytes: Vec<u8>, filename: &str) -> Result<(), ComfyUIApiError> {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str("image/png")?;
        let form = reqwest::multipart::Form::new()
            .part("image", part)
            .text("type", "input");

        let response = self
            .client
            .post(format!("{}/upload/image", self.base_url))
            .multipart(form)
            .timeout(UPLOAD_TIMEOUT)
            .send()
            .await?;

        Self::check_status(response).await
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code, or surface the
    /// status and body text as an [`ComfyUIApiError::ApiError`].
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ComfyUIApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ComfyUIApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn check_status(response: reqwest::Response) -> Result<(), ComfyUIApiError> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}

#[async_trait]
impl GenerationBackend for ComfyUIApi {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn upload_image(&self, bytes: Vec<u8>, filename: &str) -> bool {
        match self.post_upload(bytes, filename).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(filename, error = %e, "Image upload failed");
                false
            }
        }
    }

    async fn upload_image_from_url(&self, url: &str, filename: &str) -> bool {
        let bytes = match self
            .client
            .get(url)
            .timeout(DOWNLOAD_TIMEOUT)
            .send()
            .await
            .and_then(|r| r.error_for_status())
        {
            Ok(response) => match response.bytes().await {
                Ok(b) => b.to_vec(),
                Err(e) => {
                    tracing::warn!(url, error = %e, "Source image read failed");
                    return false;
                }
            },
            Err(e) => {
                tracing::warn!(url, error = %e, "Source image fetch failed");
                return false;
            }
        };
        self.upload_image(bytes, filename).await
    }

    async fn submit_workflow(&self, graph: &serde_json::Value) -> Option<String> {
        #[derive(Deserialize)]
        struct SubmitResponse {
            prompt_id: String,
        }

        let body = serde_json::json!({ "prompt": graph });
        let result = self
            .client
            .post(format!("{}/prompt", self.base_url))
            .json(&body)
            .timeout(CONTROL_TIMEOUT)
            .send()
            .await;

        match result {
            Ok(response) => match Self::ensure_success(response).await {
                Ok(ok) => match ok.json::<SubmitResponse>().await {
                    Ok(parsed) => Some(parsed.prompt_id),
                    Err(e) => {
                        tracing::warn!(error = %e, "Malformed /prompt response");
                        None
                    }
                },
                Err(e) => {
                    tracing::warn!(error = %e, "Job submission rejected");
                    None
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "Job submission failed");
                None
            }
        }
    }

    async fn queue_snapshot(&self) -> Result<QueueSnapshot, ComfyUIApiError> {
        let response = self
            .client
            .get(format!("{}/queue", self.base_url))
            .timeout(CONTROL_TIMEOUT)
            .send()
            .await?;
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<QueueSnapshot>().await?)
    }

    async fn get_history(&self, job_id: &str) -> Option<serde_json::Value> {
        let result = self
            .client
            .get(format!("{}/history/{}", self.base_url, job_id))
            .timeout(CONTROL_TIMEOUT)
            .send()
            .await;
        match result {
            Ok(response) if response.status().is_success() => response.json().await.ok(),
            Ok(_) | Err(_) => None,
        }
    }

    async fn download_output(&self, locator: &OutputLocator) -> Option<Vec<u8>> {
        let url = locator.public_url(&self.base_url);
        let result = self
            .client
            .get(&url)
            .timeout(UPLOAD_TIMEOUT)
            .send()
            .await
            .and_then(|r| r.error_for_status());
        match result {
            Ok(response) => response.bytes().await.ok().map(|b| b.to_vec()),
            Err(e) => {
                tracing::warn!(url, error = %e, "Output download failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn snapshot_matches_job_by_second_element() {
        let snap: QueueSnapshot = serde_json::from_value(json!({
            "queue_pending": [[0, "job-a", {}], [1, "job-b", {}]],
            "queue_running": [[2, "job-c", {}]],
        }))
        .unwrap();
        assert!(snap.contains("job-a"));
        assert!(snap.contains("job-c"));
        assert!(!snap.contains("job-z"));
        assert_eq!(snap.len(), 3);
    }

    #[test]
    fn snapshot_tolerates_missing_fields() {
        let snap: QueueSnapshot = serde_json::from_value(json!({})).unwrap();
        assert!(snap.is_empty());
        assert!(!snap.contains("anything"));
    }
}
