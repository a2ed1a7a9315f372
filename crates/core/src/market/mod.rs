pub mod http;
pub mod types;

pub use http::HttpMarketDataClient;
pub use types::{EarningsFetch, PriceBar, Quote};

/// External market-data source, one call per holding. Implementations make a
/// single bounded-timeout attempt; a failed fetch is retried by the next
/// scheduled or triggered run, never inside the current one.
#[async_trait::async_trait]
pub trait MarketDataClient: Send + Sync {
    fn provider_name(&self) -> &'static str;

    async fn fetch_quote(&self, stock_id: &str) -> anyhow::Result<Quote>;

    /// Historical daily bars, oldest first.
    async fn fetch_history(&self, stock_id: &str) -> anyhow::Result<Vec<PriceBar>>;

    async fn fetch_earnings(&self, stock_id: &str) -> anyhow::Result<EarningsFetch>;
}
