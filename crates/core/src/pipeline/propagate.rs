use crate::domain::{ChangeKind, StoredChange};
use crate::market::MarketDataClient;
use crate::pipeline::enrich;
use crate::storage::PortfolioStore;
use std::collections::BTreeMap;

pub const DEFAULT_BATCH_SIZE: i64 = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PropagateSummary {
    pub fetched: usize,
    pub enriched: usize,
    pub failed: usize,
    pub deletes_acked: usize,
}

/// Drains one batch of pending holding changes and triggers fundamentals
/// enrichment once per distinct stock id.
///
/// The whole batch is acknowledged after the enrichment loop, including ids
/// whose fetch failed: the enricher is an idempotent upsert and the next
/// scheduled run supersedes anything missed, so holding the batch hostage
/// buys nothing. A crash before the ack replays the batch (at-least-once),
/// which converges for the same reason.
pub async fn run(
    store: &dyn PortfolioStore,
    market: &dyn MarketDataClient,
    batch_size: i64,
) -> anyhow::Result<PropagateSummary> {
    // Negative batch sizes would reach Postgres as a negative LIMIT.
    let changes = store.fetch_pending_changes(batch_size.max(0)).await?;
    if changes.is_empty() {
        tracing::debug!("no pending holding changes");
        return Ok(PropagateSummary::default());
    }

    let mut summary = PropagateSummary {
        fetched: changes.len(),
        ..PropagateSummary::default()
    };

    for (stock_id, kind) in latest_kind_by_stock(&changes) {
        if kind == ChangeKind::Delete {
            // The holding is gone; there is nothing to enrich.
            summary.deletes_acked += 1;
            continue;
        }
        match enrich::enrich_fundamentals(store, market, &stock_id).await {
            Ok(()) => summary.enriched += 1,
            Err(err) => {
                summary.failed += 1;
                tracing::warn!(%stock_id, error = %err, "fundamentals enrichment failed; prior record kept");
            }
        }
    }

    let ids: Vec<i64> = changes.iter().map(|c| c.id).collect();
    store.mark_changes_processed(&ids).await?;

    tracing::info!(
        fetched = summary.fetched,
        enriched = summary.enriched,
        failed = summary.failed,
        deletes = summary.deletes_acked,
        "change batch propagated"
    );
    Ok(summary)
}

/// Collapses a batch to one entry per stock id, keeping the latest change
/// kind. Within-batch order is meaningful per id; across ids none is
/// guaranteed.
fn latest_kind_by_stock(changes: &[StoredChange]) -> BTreeMap<String, ChangeKind> {
    let mut out = BTreeMap::new();
    for change in changes {
        out.insert(change.event.stock_id.clone(), change.event.kind);
    }
    out
}
