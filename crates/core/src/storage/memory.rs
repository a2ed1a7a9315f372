use crate::domain::{
    BiasReport, ChangeEvent, Earnings, Fundamentals, Holding, Recommendation, RiskProfile,
    StoredChange, Trend,
};
use crate::storage::PortfolioStore;
use std::collections::BTreeMap;
use tokio::sync::Mutex;

/// In-memory store double with the same upsert/scan semantics as `PgStore`.
/// Used by the pipeline tests; not for production state.
#[derive(Debug, Default)]
pub struct MemStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    holdings: BTreeMap<String, Holding>,
    fundamentals: BTreeMap<String, Fundamentals>,
    trend: BTreeMap<String, Trend>,
    earnings: BTreeMap<String, Earnings>,
    profiles: BTreeMap<String, RiskProfile>,
    bias: BTreeMap<String, BiasReport>,
    recommendations: BTreeMap<String, Recommendation>,
    changes: Vec<ChangeRow>,
    next_change_id: i64,
}

#[derive(Debug, Clone)]
struct ChangeRow {
    id: i64,
    event: ChangeEvent,
    processed: bool,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of change rows ever appended (processed or not).
    pub async fn change_count(&self) -> usize {
        self.inner.lock().await.changes.len()
    }
}

#[async_trait::async_trait]
impl PortfolioStore for MemStore {
    async fn upsert_holdings(&self, holdings: &[Holding]) -> anyhow::Result<u64> {
        let mut inner = self.inner.lock().await;
        for h in holdings {
            inner.holdings.insert(h.stock_id.clone(), h.clone());
        }
        Ok(holdings.len() as u64)
    }

    async fn get_holding(&self, stock_id: &str) -> anyhow::Result<Option<Holding>> {
        Ok(self.inner.lock().await.holdings.get(stock_id).cloned())
    }

    async fn list_holdings(&self) -> anyhow::Result<Vec<Holding>> {
        Ok(self.inner.lock().await.holdings.values().cloned().collect())
    }

    async fn append_changes(&self, events: &[ChangeEvent]) -> anyhow::Result<()> {
        let mut inner = self.inner.lock().await;
        for event in events {
            inner.next_change_id += 1;
            let id = inner.next_change_id;
            inner.changes.push(ChangeRow {
                id,
                event: event.clone(),
                processed: false,
            });
        }
        Ok(())
    }

    async fn fetch_pending_changes(&self, limit: i64) -> anyhow::Result<Vec<StoredChange>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .changes
            .iter()
            .filter(|row| !row.processed)
            .take(limit.max(0) as usize)
            .map(|row| StoredChange {
                id: row.id,
                event: row.event.clone(),
            })
            .collect())
    }

    async fn mark_changes_processed(&self, ids: &[i64]) -> anyhow::Result<u64> {
        let mut inner = self.inner.lock().await;
        let mut affected = 0u64;
        for row in inner.changes.iter_mut() {
            if ids.contains(&row.id) && !row.processed {
                row.processed = true;
                affected += 1;
            }
        }
        Ok(affected)
    }

    async fn upsert_fundamentals(&self, fundamentals: &Fundamentals) -> anyhow::Result<()> {
        self.inner
            .lock()
            .await
            .fundamentals
            .insert(fundamentals.stock_id.clone(), fundamentals.clone());
        Ok(())
    }

    async fn get_fundamentals(&self, stock_id: &str) -> anyhow::Result<Option<Fundamentals>> {
        Ok(self.inner.lock().await.fundamentals.get(stock_id).cloned())
    }

    async fn upsert_trend(&self, trend: &Trend) -> anyhow::Result<()> {
        self.inner
            .lock()
            .await
            .trend
            .insert(trend.stock_id.clone(), trend.clone());
        Ok(())
    }

    async fn get_trend(&self, stock_id: &str) -> anyhow::Result<Option<Trend>> {
        Ok(self.inner.lock().await.trend.get(stock_id).cloned())
    }

    async fn upsert_earnings(&self, earnings: &Earnings) -> anyhow::Result<()> {
        self.inner
            .lock()
            .await
            .earnings
            .insert(earnings.stock_id.clone(), earnings.clone());
        Ok(())
    }

    async fn get_earnings(&self, stock_id: &str) -> anyhow::Result<Option<Earnings>> {
        Ok(self.inner.lock().await.earnings.get(stock_id).cloned())
    }

    async fn upsert_risk_profile(&self, profile: &RiskProfile) -> anyhow::Result<()> {
        self.inner
            .lock()
            .await
            .profiles
            .insert(profile.user_id.clone(), profile.clone());
        Ok(())
    }

    async fn get_risk_profile(&self, user_id: &str) -> anyhow::Result<Option<RiskProfile>> {
        Ok(self.inner.lock().await.profiles.get(user_id).cloned())
    }

    async fn upsert_bias_report(&self, report: &BiasReport) -> anyhow::Result<()> {
        self.inner
            .lock()
            .await
            .bias
            .insert(report.user_id.clone(), report.clone());
        Ok(())
    }

    async fn get_bias_report(&self, user_id: &str) -> anyhow::Result<Option<BiasReport>> {
        Ok(self.inner.lock().await.bias.get(user_id).cloned())
    }

    async fn upsert_recommendation(&self, rec: &Recommendation) -> anyhow::Result<()> {
        self.inner
            .lock()
            .await
            .recommendations
            .insert(rec.stock_id.clone(), rec.clone());
        Ok(())
    }

    async fn get_recommendation(&self, stock_id: &str) -> anyhow::Result<Option<Recommendation>> {
        Ok(self
            .inner
            .lock()
            .await
            .recommendations
            .get(stock_id)
            .cloned())
    }

    async fn list_recommendations(&self) -> anyhow::Result<Vec<Recommendation>> {
        Ok(self
            .inner
            .lock()
            .await
            .recommendations
            .values()
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ChangeKind;
    use chrono::Utc;

    fn holding(stock_id: &str, price: f64) -> Holding {
        Holding {
            stock_id: stock_id.to_string(),
            company_name: format!("{stock_id} Corp"),
            purchase_price: price,
            quantity: 1.0,
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn holding_upserts_are_last_write_wins() {
        let store = MemStore::new();
        store.upsert_holdings(&[holding("AAPL", 150.0)]).await.unwrap();
        store.upsert_holdings(&[holding("AAPL", 155.0)]).await.unwrap();

        let all = store.list_holdings().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].purchase_price, 155.0);
    }

    #[tokio::test]
    async fn change_feed_is_ordered_and_ack_is_idempotent() {
        let store = MemStore::new();
        let events: Vec<ChangeEvent> = ["AAPL", "MSFT"]
            .iter()
            .map(|id| ChangeEvent {
                stock_id: id.to_string(),
                kind: ChangeKind::Insert,
                occurred_at: Utc::now(),
            })
            .collect();
        store.append_changes(&events).await.unwrap();

        let pending = store.fetch_pending_changes(10).await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].event.stock_id, "AAPL");

        let ids: Vec<i64> = pending.iter().map(|c| c.id).collect();
        assert_eq!(store.mark_changes_processed(&ids).await.unwrap(), 2);
        assert_eq!(store.mark_changes_processed(&ids).await.unwrap(), 0);
        assert!(store.fetch_pending_changes(10).await.unwrap().is_empty());
    }
}
