use crate::domain::Earnings;
use crate::market::MarketDataClient;
use crate::pipeline::RunSummary;
use crate::storage::PortfolioStore;
use chrono::Utc;

/// Weekly earnings job: refreshes the earnings-calendar enrichment for every
/// holding. Same isolation contract as the trend job.
pub async fn run(
    store: &dyn PortfolioStore,
    market: &dyn MarketDataClient,
) -> anyhow::Result<RunSummary> {
    let holdings = store.list_holdings().await?;
    let mut summary = RunSummary::default();

    for holding in &holdings {
        match analyze_one(store, market, &holding.stock_id).await {
            Ok(()) => summary.record(true),
            Err(err) => {
                summary.record(false);
                tracing::warn!(stock_id = %holding.stock_id, error = %err, "earnings analysis failed");
            }
        }
    }

    tracing::info!(
        processed = summary.processed,
        succeeded = summary.succeeded,
        failed = summary.failed,
        "earnings run complete"
    );
    Ok(summary)
}

async fn analyze_one(
    store: &dyn PortfolioStore,
    market: &dyn MarketDataClient,
    stock_id: &str,
) -> anyhow::Result<()> {
    let fetch = market.fetch_earnings(stock_id).await?;

    let earnings = Earnings {
        stock_id: stock_id.to_string(),
        next_earnings_date: fetch.next_earnings_date,
        trailing_eps: fetch.trailing_eps,
        forward_eps: fetch.forward_eps,
        earnings_growth: fetch.earnings_growth,
        revenue_growth: fetch.revenue_growth,
        recent_quarters: fetch.quarters,
        last_updated: Utc::now(),
    };

    store.upsert_earnings(&earnings).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EarningsQuarter, Holding};
    use crate::market::{EarningsFetch, PriceBar, Quote};
    use crate::storage::MemStore;
    use chrono::NaiveDate;

    struct EarningsMarket;

    #[async_trait::async_trait]
    impl MarketDataClient for EarningsMarket {
        fn provider_name(&self) -> &'static str {
            "earnings"
        }

        async fn fetch_quote(&self, _stock_id: &str) -> anyhow::Result<Quote> {
            Ok(Quote::default())
        }

        async fn fetch_history(&self, _stock_id: &str) -> anyhow::Result<Vec<PriceBar>> {
            Ok(Vec::new())
        }

        async fn fetch_earnings(&self, stock_id: &str) -> anyhow::Result<EarningsFetch> {
            if stock_id == "FLAKY" {
                anyhow::bail!("symbol not covered");
            }
            Ok(EarningsFetch {
                next_earnings_date: NaiveDate::from_ymd_opt(2026, 10, 28),
                trailing_eps: Some(6.1),
                forward_eps: Some(6.8),
                earnings_growth: Some(0.12),
                revenue_growth: Some(0.08),
                quarters: vec![EarningsQuarter {
                    period_end: NaiveDate::from_ymd_opt(2026, 6, 30).unwrap(),
                    reported_eps: Some(1.6),
                    estimated_eps: Some(1.5),
                    surprise_pct: Some(6.67),
                }],
            })
        }
    }

    fn holding(stock_id: &str) -> Holding {
        Holding {
            stock_id: stock_id.to_string(),
            company_name: format!("{stock_id} Corp"),
            purchase_price: 100.0,
            quantity: 1.0,
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn upserts_earnings_and_isolates_failures() {
        let store = MemStore::new();
        store
            .upsert_holdings(&[holding("AAPL"), holding("FLAKY")])
            .await
            .unwrap();

        let summary = run(&store, &EarningsMarket).await.unwrap();
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);

        let earnings = store.get_earnings("AAPL").await.unwrap().unwrap();
        assert_eq!(
            earnings.next_earnings_date,
            NaiveDate::from_ymd_opt(2026, 10, 28)
        );
        assert_eq!(earnings.recent_quarters.len(), 1);
        assert!(store.get_earnings("FLAKY").await.unwrap().is_none());
    }
}
