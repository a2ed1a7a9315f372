pub mod change;
pub mod enrichment;
pub mod holding;
pub mod profile;
pub mod recommendation;

pub use change::{ChangeEvent, ChangeKind, StoredChange};
pub use enrichment::{Earnings, EarningsQuarter, Fundamentals, Trend};
pub use holding::Holding;
pub use profile::{BiasReport, RiskCategory, RiskProfile};
pub use recommendation::{Action, Recommendation};
