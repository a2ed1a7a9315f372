use crate::analysis;
use crate::domain::Fundamentals;
use crate::market::MarketDataClient;
use crate::pipeline::RunSummary;
use crate::storage::PortfolioStore;
use chrono::Utc;

/// Weekly fundamentals sweep: refreshes every holding regardless of the
/// change feed. This is what supersedes a triggered enrichment whose fetch
/// failed after the change batch was already acknowledged.
pub async fn run(
    store: &dyn PortfolioStore,
    market: &dyn MarketDataClient,
) -> anyhow::Result<RunSummary> {
    let holdings = store.list_holdings().await?;
    let mut summary = RunSummary::default();

    for holding in &holdings {
        match enrich_fundamentals(store, market, &holding.stock_id).await {
            Ok(()) => summary.record(true),
            Err(err) => {
                summary.record(false);
                tracing::warn!(stock_id = %holding.stock_id, error = %err, "fundamentals refresh failed");
            }
        }
    }

    tracing::info!(
        processed = summary.processed,
        succeeded = summary.succeeded,
        failed = summary.failed,
        "fundamentals run complete"
    );
    Ok(summary)
}

/// Fetches the current quote for one holding and upserts its fundamentals.
///
/// On a fetch failure the error propagates to the caller and any existing
/// fundamentals record is left untouched; the next triggered or scheduled
/// run supersedes it. Re-running for the same quote converges to the same
/// record, so redelivered change events are harmless.
pub async fn enrich_fundamentals(
    store: &dyn PortfolioStore,
    market: &dyn MarketDataClient,
    stock_id: &str,
) -> anyhow::Result<()> {
    let quote = market.fetch_quote(stock_id).await?;

    let fundamentals = Fundamentals {
        stock_id: stock_id.to_string(),
        industry: quote.industry.clone(),
        market_cap: quote.market_cap,
        pe_ratio: quote.trailing_pe,
        eps: quote.trailing_eps,
        dividend_yield: analysis::yield_to_percent(quote.dividend_yield),
        fifty_two_week_high: quote.fifty_two_week_high,
        fifty_two_week_low: quote.fifty_two_week_low,
        fifty_day_ma: quote.fifty_day_average,
        two_hundred_day_ma: quote.two_hundred_day_average,
        debt_to_equity: quote.debt_to_equity,
        price_to_52w_high: analysis::price_to_high_ratio(
            quote.last_price,
            quote.fifty_two_week_high,
        ),
        last_updated: Utc::now(),
    };

    store.upsert_fundamentals(&fundamentals).await?;
    tracing::info!(%stock_id, "fundamentals enriched");
    Ok(())
}
