use crate::config::Settings;
use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmailMessage {
    pub sender: String,
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

/// Outbound email channel. A failed send is reported once; the next
/// scheduled digest supersedes it.
#[async_trait::async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> anyhow::Result<()>;
}

/// JSON relay implementation. Sender and recipient identities must be
/// pre-authorized on the relay side.
#[derive(Debug, Clone)]
pub struct HttpMailer {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpMailer {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let base_url = settings.require_mail_relay_base_url()?.to_string();
        let api_key = settings.mail_relay_api_key.clone();

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.mail_relay_timeout_secs))
            .build()
            .context("failed to build mail relay http client")?;

        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }
}

#[async_trait::async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, message: &EmailMessage) -> anyhow::Result<()> {
        let mut headers = HeaderMap::new();
        if let Some(api_key) = &self.api_key {
            headers.insert("x-api-key", HeaderValue::from_str(api_key)?);
        }

        let url = format!("{}/v1/send", self.base_url.trim_end_matches('/'));
        let res = self
            .http
            .post(url)
            .headers(headers)
            .json(message)
            .send()
            .await
            .context("mail relay request failed")?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            anyhow::bail!("mail relay HTTP {status}: {text}");
        }
        Ok(())
    }
}
