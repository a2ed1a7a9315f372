use crate::config::Settings;
use crate::inference::error::InferenceDiagnosticsError;
use crate::inference::{InferenceClient, InferenceOptions};
use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// JSON-over-HTTP completion client. The request carries the full sampling
/// configuration on every call so the service holds no per-client state.
#[derive(Debug, Clone)]
pub struct HttpInferenceClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    options: InferenceOptions,
}

impl HttpInferenceClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let base_url = settings.require_inference_base_url()?.to_string();
        let api_key = settings.inference_api_key.clone();
        let options = InferenceOptions::from_settings(settings);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.inference_timeout_secs))
            .build()
            .context("failed to build inference http client")?;

        Ok(Self {
            http,
            base_url,
            api_key,
            options,
        })
    }

    pub fn options(&self) -> &InferenceOptions {
        &self.options
    }
}

#[async_trait::async_trait]
impl InferenceClient for HttpInferenceClient {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
        let mut headers = HeaderMap::new();
        if let Some(api_key) = &self.api_key {
            headers.insert("x-api-key", HeaderValue::from_str(api_key)?);
        }

        let req = CompletionRequest {
            model: &self.options.model_id,
            prompt,
            max_tokens: self.options.max_tokens,
            temperature: self.options.temperature,
            top_p: self.options.top_p,
        };

        let url = format!("{}/v1/complete", self.base_url.trim_end_matches('/'));
        let res = self
            .http
            .post(url)
            .headers(headers)
            .json(&req)
            .send()
            .await
            .context("inference request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read inference response body")?;
        if !status.is_success() {
            return Err(InferenceDiagnosticsError {
                stage: "http",
                detail: format!("status={status}"),
                raw_output: Some(text),
            }
            .into());
        }

        let parsed = serde_json::from_str::<CompletionResponse>(&text).map_err(|err| {
            InferenceDiagnosticsError {
                stage: "decode",
                detail: format!("response is not a completion payload: {err}"),
                raw_output: Some(text),
            }
        })?;

        Ok(parsed.text)
    }
}

#[derive(Debug, Clone, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    max_tokens: u32,
    temperature: f64,
    top_p: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct CompletionResponse {
    text: String,
}
