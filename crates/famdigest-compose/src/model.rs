//! The summarization-model client.
//!
//! The digest text comes from one deployed prompt endpoint. The call is a
//! single blocking external operation: a bounded timeout, no client-side
//! retries, exactly one output string extracted from the response.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{ComposeError, ComposeResult};
use crate::prompt::DigestRequest;

/// A boxed future for async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Anything that can turn a digest request into digest text.
///
/// The scheduler pipeline holds this as a trait object so tests can swap
/// in a scripted fake.
pub trait Summarizer: Send + Sync {
    fn summarize<'a>(&'a self, request: &'a DigestRequest) -> BoxFuture<'a, ComposeResult<String>>;
}

/// Settings for the deployed prompt endpoint.
#[derive(Debug, Clone)]
pub struct PromptEndpointConfig {
    /// Full URL of the deployed prompt.
    pub endpoint_url: String,
    /// Bearer token for the endpoint.
    pub api_key: String,
    /// Timeout for the summarization call.
    pub timeout: Duration,
}

impl PromptEndpointConfig {
    pub fn new(endpoint_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint_url: endpoint_url.into(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(60),
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// HTTP client for the deployed summarization prompt.
#[derive(Debug, Clone)]
pub struct PromptEndpointClient {
    http: reqwest::Client,
    config: PromptEndpointConfig,
}

impl PromptEndpointClient {
    pub fn new(config: PromptEndpointConfig) -> ComposeResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ComposeError::CallFailed(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, config })
    }

    async fn call(&self, request: &DigestRequest) -> ComposeResult<String> {
        let payload = serde_json::json!({ "input": request });

        debug!(
            recipient = %request.recipient_name,
            events = request.events.len(),
            "invoking summarization prompt"
        );

        let response = self
            .http
            .post(&self.config.endpoint_url)
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ComposeError::CallFailed(format!("request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ComposeError::CallFailed(format!("failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(ComposeError::CallFailed(format!(
                "endpoint error ({status}): {body}"
            )));
        }

        extract_output(&body)
    }
}

impl Summarizer for PromptEndpointClient {
    fn summarize<'a>(&'a self, request: &'a DigestRequest) -> BoxFuture<'a, ComposeResult<String>> {
        Box::pin(async move {
            let output = self.call(request).await?;
            info!(
                recipient = %request.recipient_name,
                chars = output.len(),
                "composed digest"
            );
            Ok(output)
        })
    }
}

/// Pulls the single output string out of the endpoint response.
///
/// Anything without a string `output` field is a malformed response, which
/// fails this recipient's iteration without touching the rest of the
/// batch.
fn extract_output(body: &str) -> ComposeResult<String> {
    let parsed: PromptResponse = serde_json::from_str(body)
        .map_err(|e| ComposeError::MalformedResponse(format!("unparseable body: {e}")))?;

    match parsed.output {
        Some(output) if !output.is_empty() => Ok(output),
        Some(_) => Err(ComposeError::MalformedResponse(
            "output field is empty".to_string(),
        )),
        None => Err(ComposeError::MalformedResponse(
            "missing output field".to_string(),
        )),
    }
}

#[derive(Debug, Deserialize)]
struct PromptResponse {
    output: Option<String>,
}
