//! HTTP analysis capability
//!
//! Posts `{"model": ..., "text": ...}` to a configured JSON endpoint and
//! expects an [`AnalysisOutput`] body back. Provider agnostic: any service
//! (typically a language-model gateway) speaking this shape works.
//!
//! Transport errors never escape; they come back as a failed output so the
//! resilient wrapper can retry and then fall back.

use crate::error::AnalysisError;
use crate::models::AnalysisOutput;
use crate::types::AnalysisCapability;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Serialize)]
struct AnalyzeRequest<'a> {
    model: &'a str,
    text: &'a str,
}

pub struct HttpAnalyzer {
    http_client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl HttpAnalyzer {
    /// Create a client for `endpoint`
    ///
    /// `request_timeout` bounds a single HTTP exchange; the pipeline's own
    /// per-call timeout still applies on top.
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        request_timeout: Duration,
    ) -> Result<Self, AnalysisError> {
        let endpoint = endpoint.into();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(AnalysisError::Config(format!(
                "endpoint must be an http(s) URL: {}",
                endpoint
            )));
        }

        let http_client = Client::builder().timeout(request_timeout).build()?;

        Ok(Self {
            http_client,
            endpoint,
            model: model.into(),
            api_key,
        })
    }

    async fn request(&self, text: &str) -> Result<AnalysisOutput, AnalysisError> {
        let mut request = self.http_client.post(&self.endpoint).json(&AnalyzeRequest {
            model: &self.model,
            text,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnalysisError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<AnalysisOutput>().await?)
    }
}

#[async_trait::async_trait]
impl AnalysisCapability for HttpAnalyzer {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn analyze(&self, text: &str) -> AnalysisOutput {
        match self.request(text).await {
            Ok(output) => {
                debug!(endpoint = %self.endpoint, "Analysis endpoint answered");
                output
            }
            Err(e) => {
                warn!(endpoint = %self.endpoint, error = %e, "Analysis endpoint call failed");
                AnalysisOutput::failed(e.to_string())
            }
        }
    }
}
