use crate::config::Settings;
use crate::market::types::{EarningsFetch, PriceBar, Quote};
use crate::market::MarketDataClient;
use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// JSON-over-HTTP market-data client. One attempt per call, bounded by the
/// client timeout.
#[derive(Debug, Clone)]
pub struct HttpMarketDataClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    history_range: String,
}

impl HttpMarketDataClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base_url = settings.require_market_data_base_url()?.to_string();
        let api_key = settings.market_data_api_key.clone();

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.market_data_timeout_secs))
            .build()
            .context("failed to build market data http client")?;

        Ok(Self {
            http,
            base_url,
            api_key,
            history_range: settings.market_data_history_range.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(api_key) = &self.api_key {
            headers.insert("x-api-key", HeaderValue::from_str(api_key)?);
        }
        Ok(headers)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let res = self
            .http
            .get(self.url(path))
            .headers(self.headers()?)
            .query(query)
            .send()
            .await
            .with_context(|| format!("market data request to {path} failed"))?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read market data response")?;
        if !status.is_success() {
            anyhow::bail!("market data HTTP {status} from {path}: {text}");
        }

        serde_json::from_str::<T>(&text)
            .with_context(|| format!("market data response from {path} is not valid: {text}"))
    }
}

#[async_trait::async_trait]
impl MarketDataClient for HttpMarketDataClient {
    fn provider_name(&self) -> &'static str {
        "market_http_json"
    }

    async fn fetch_quote(&self, stock_id: &str) -> Result<Quote> {
        self.get_json("/v1/quote", &[("symbol", stock_id)]).await
    }

    async fn fetch_history(&self, stock_id: &str) -> Result<Vec<PriceBar>> {
        #[derive(serde::Deserialize)]
        struct HistoryResponse {
            bars: Vec<PriceBar>,
        }

        let res: HistoryResponse = self
            .get_json(
                "/v1/history",
                &[("symbol", stock_id), ("range", &self.history_range)],
            )
            .await?;
        Ok(res.bars)
    }

    async fn fetch_earnings(&self, stock_id: &str) -> Result<EarningsFetch> {
        self.get_json("/v1/earnings", &[("symbol", stock_id)]).await
    }
}
