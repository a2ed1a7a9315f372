pub mod lock;
pub mod memory;
pub mod postgres;

pub use memory::MemStore;
pub use postgres::PgStore;

use crate::domain::{
    BiasReport, ChangeEvent, Earnings, Fundamentals, Holding, Recommendation, RiskProfile,
    StoredChange, Trend,
};
use anyhow::Context;

pub async fn migrate(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("sqlx migrations failed")?;
    Ok(())
}

/// Canonical and derived stores behind one seam: point upserts and
/// full-table scans per entity, plus the holding change feed.
///
/// Every upsert is idempotent and last-write-wins per key, which is what
/// lets the pipeline tolerate at-least-once triggering. Nothing here
/// deletes implicitly.
#[async_trait::async_trait]
pub trait PortfolioStore: Send + Sync {
    async fn upsert_holdings(&self, holdings: &[Holding]) -> anyhow::Result<u64>;
    async fn get_holding(&self, stock_id: &str) -> anyhow::Result<Option<Holding>>;
    async fn list_holdings(&self) -> anyhow::Result<Vec<Holding>>;

    async fn append_changes(&self, events: &[ChangeEvent]) -> anyhow::Result<()>;
    /// Oldest unprocessed changes, in feed order.
    async fn fetch_pending_changes(&self, limit: i64) -> anyhow::Result<Vec<StoredChange>>;
    async fn mark_changes_processed(&self, ids: &[i64]) -> anyhow::Result<u64>;

    async fn upsert_fundamentals(&self, fundamentals: &Fundamentals) -> anyhow::Result<()>;
    async fn get_fundamentals(&self, stock_id: &str) -> anyhow::Result<Option<Fundamentals>>;

    async fn upsert_trend(&self, trend: &Trend) -> anyhow::Result<()>;
    async fn get_trend(&self, stock_id: &str) -> anyhow::Result<Option<Trend>>;

    async fn upsert_earnings(&self, earnings: &Earnings) -> anyhow::Result<()>;
    async fn get_earnings(&self, stock_id: &str) -> anyhow::Result<Option<Earnings>>;

    async fn upsert_risk_profile(&self, profile: &RiskProfile) -> anyhow::Result<()>;
    async fn get_risk_profile(&self, user_id: &str) -> anyhow::Result<Option<RiskProfile>>;

    async fn upsert_bias_report(&self, report: &BiasReport) -> anyhow::Result<()>;
    async fn get_bias_report(&self, user_id: &str) -> anyhow::Result<Option<BiasReport>>;

    async fn upsert_recommendation(&self, rec: &Recommendation) -> anyhow::Result<()>;
    async fn get_recommendation(&self, stock_id: &str) -> anyhow::Result<Option<Recommendation>>;
    /// All current recommendations ordered by stock id.
    async fn list_recommendations(&self) -> anyhow::Result<Vec<Recommendation>>;
}
