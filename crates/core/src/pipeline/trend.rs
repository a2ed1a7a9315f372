use crate::analysis;
use crate::domain::Trend;
use crate::market::MarketDataClient;
use crate::pipeline::RunSummary;
use crate::storage::PortfolioStore;
use chrono::Utc;

/// Weekly trend job: recomputes technical indicators for every holding from
/// its historical close series. Holdings are independent; one failed fetch
/// or an empty history only marks that holding failed.
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
                tracing::warn!(stock_id = %holding.stock_id, error = %err, "trend analysis failed");
            }
        }
    }

    tracing::info!(
        processed = summary.processed,
        succeeded = summary.succeeded,
        failed = summary.failed,
        "trend run complete"
    );
    Ok(summary)
}

async fn analyze_one(
    store: &dyn PortfolioStore,
    market: &dyn MarketDataClient,
    stock_id: &str,
) -> anyhow::Result<()> {
    let bars = market.fetch_history(stock_id).await?;
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let Some(&last_close) = closes.last() else {
        anyhow::bail!("no historical data for {stock_id}");
    };

    let macd = analysis::macd(&closes, 12, 26, 9);
    let trend = Trend {
        stock_id: stock_id.to_string(),
        last_close,
        moving_avg_50: analysis::sma(&closes, 50),
        rsi: analysis::rsi(&closes, 14),
        macd: macd.map(|(line, _)| line),
        macd_signal: macd.map(|(_, signal)| signal),
        volume: bars.last().and_then(|b| b.volume),
        last_updated: Utc::now(),
    };

    store.upsert_trend(&trend).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Holding;
    use crate::market::{EarningsFetch, PriceBar, Quote};
    use crate::storage::MemStore;
    use chrono::NaiveDate;

    struct HistoryMarket;

    #[async_trait::async_trait]
    impl MarketDataClient for HistoryMarket {
        fn provider_name(&self) -> &'static str {
            "history"
        }

        async fn fetch_quote(&self, _stock_id: &str) -> anyhow::Result<Quote> {
            Ok(Quote::default())
        }

        async fn fetch_history(&self, stock_id: &str) -> anyhow::Result<Vec<PriceBar>> {
            if stock_id == "EMPTY" {
                return Ok(Vec::new());
            }
            let start = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
            Ok((0..60)
                .map(|i| PriceBar {
                    date: start + chrono::Days::new(i),
                    close: 100.0 + i as f64,
                    volume: Some(1_000.0 + i as f64),
                })
                .collect())
        }

        async fn fetch_earnings(&self, _stock_id: &str) -> anyhow::Result<EarningsFetch> {
            Ok(EarningsFetch::default())
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
    async fn computes_indicators_per_holding_and_isolates_failures() {
        let store = MemStore::new();
        store
            .upsert_holdings(&[holding("AAPL"), holding("EMPTY")])
            .await
            .unwrap();

        let summary = run(&store, &HistoryMarket).await.unwrap();
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);

        let trend = store.get_trend("AAPL").await.unwrap().unwrap();
        assert_eq!(trend.last_close, 159.0);
        assert!(trend.moving_avg_50.is_some());
        assert_eq!(trend.rsi, Some(100.0));
        assert!(trend.macd.unwrap() > 0.0);
        assert_eq!(trend.volume, Some(1_059.0));

        assert!(store.get_trend("EMPTY").await.unwrap().is_none());
    }
}
