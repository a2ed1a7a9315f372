use crate::domain::{ChangeEvent, ChangeKind};
use crate::ingest::parse_portfolio_csv;
use crate::storage::PortfolioStore;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub upserted: u64,
    pub row_errors: usize,
}

/// Processes one portfolio CSV upload: parse, upsert holdings, emit one
/// change event per upserted holding.
///
/// A file that fails header validation performs no writes at all. Individual
/// bad rows are skipped and surface only in `row_errors`. Re-running with
/// identical content converges to the same holding state (upserts are
/// last-write-wins) and simply re-emits change events, which the propagator
/// tolerates.
pub async fn ingest_portfolio(
    store: &dyn PortfolioStore,
    bytes: &[u8],
) -> anyhow::Result<IngestSummary> {
    let parsed = parse_portfolio_csv(bytes)?;
    if parsed.holdings.is_empty() {
        tracing::warn!(row_errors = parsed.row_errors, "upload contained no valid holdings");
        return Ok(IngestSummary {
            upserted: 0,
            row_errors: parsed.row_errors,
        });
    }

    // Classify insert vs update against the current holding set before the
    // write, so the change feed carries the right kind.
    let existing: BTreeSet<String> = store
        .list_holdings()
        .await?
        .into_iter()
        .map(|h| h.stock_id)
        .collect();

    let upserted = store.upsert_holdings(&parsed.holdings).await?;

    let events: Vec<ChangeEvent> = parsed
        .holdings
        .iter()
        .map(|h| ChangeEvent {
            stock_id: h.stock_id.clone(),
            kind: if existing.contains(&h.stock_id) {
                ChangeKind::Update
            } else {
                ChangeKind::Insert
            },
            occurred_at: h.updated_at,
        })
        .collect();
    store.append_changes(&events).await?;

    tracing::info!(
        upserted,
        row_errors = parsed.row_errors,
        changes = events.len(),
        "portfolio upload ingested"
    );

    Ok(IngestSummary {
        upserted,
        row_errors: parsed.row_errors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemStore;

    const CSV: &[u8] = b"stockId,companyName,price,quantity\n\
                         AAPL,Apple Inc.,150.00,10\n\
                         MSFT,Microsoft Corporation,300.00,5\n";

    #[tokio::test]
    async fn ingesting_twice_is_idempotent_on_holdings() {
        let store = MemStore::new();

        let first = ingest_portfolio(&store, CSV).await.unwrap();
        assert_eq!(first.upserted, 2);
        assert_eq!(first.row_errors, 0);

        let second = ingest_portfolio(&store, CSV).await.unwrap();
        assert_eq!(second.upserted, 2);

        let holdings = store.list_holdings().await.unwrap();
        assert_eq!(holdings.len(), 2);
        assert_eq!(holdings[0].stock_id, "AAPL");
        assert_eq!(holdings[0].purchase_price, 150.00);
        assert_eq!(holdings[0].quantity, 10.0);
        assert_eq!(holdings[1].stock_id, "MSFT");
        assert_eq!(holdings[1].purchase_price, 300.00);
        assert_eq!(holdings[1].quantity, 5.0);
    }

    #[tokio::test]
    async fn emits_insert_then_update_change_kinds() {
        let store = MemStore::new();
        ingest_portfolio(&store, CSV).await.unwrap();
        ingest_portfolio(&store, CSV).await.unwrap();

        let changes = store.fetch_pending_changes(10).await.unwrap();
        assert_eq!(changes.len(), 4);
        assert_eq!(changes[0].event.kind, ChangeKind::Insert);
        assert_eq!(changes[2].event.kind, ChangeKind::Update);
    }

    #[tokio::test]
    async fn one_bad_row_does_not_fail_the_file() {
        let csv = b"stockId,companyName,price,quantity\n\
                    AAPL,Apple Inc.,bad,10\n\
                    MSFT,Microsoft Corporation,300.00,5\n";
        let store = MemStore::new();
        let summary = ingest_portfolio(&store, csv).await.unwrap();
        assert_eq!(summary.upserted, 1);
        assert_eq!(summary.row_errors, 1);
        assert_eq!(store.list_holdings().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn header_failure_writes_nothing() {
        let csv = b"symbol,name\nAAPL,Apple Inc.\n";
        let store = MemStore::new();
        assert!(ingest_portfolio(&store, csv).await.is_err());
        assert!(store.list_holdings().await.unwrap().is_empty());
        assert_eq!(store.change_count().await, 0);
    }
}
