pub mod error;
pub mod http;
pub mod json;

pub use http::HttpInferenceClient;

/// Sampling configuration shared by every inference call. Temperature stays
/// at 0.0 so reruns over unchanged inputs are reproducible.
#[derive(Debug, Clone)]
pub struct InferenceOptions {
    pub model_id: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub top_p: f64,
}

impl InferenceOptions {
    pub fn from_settings(settings: &crate::config::Settings) -> Self {
        Self {
            model_id: settings.inference_model_id.clone(),
            max_tokens: settings.inference_max_tokens,
            temperature: settings.inference_temperature,
            top_p: settings.inference_top_p,
        }
    }
}

/// Text-completion seam for the risk-profile and recommendation stages. One
/// call per work item; failures are isolated by the callers, not retried
/// here.
#[async_trait::async_trait]
pub trait InferenceClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String>;
}
