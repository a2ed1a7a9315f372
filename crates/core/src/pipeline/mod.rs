pub mod alert;
pub mod earnings;
pub mod enrich;
pub mod ingest;
pub mod profile;
pub mod propagate;
pub mod recommend;
pub mod trend;

/// Per-run tally for the batch stages. Item failures are counted here and
/// logged; they never abort sibling items in the same run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn record(&mut self, ok: bool) {
        self.processed += 1;
        if ok {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }
}
