use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One portfolio position. Created or overwritten by ingestion, never
/// deleted implicitly; every other keyed table is a sparse join over this
/// set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub stock_id: String,
    pub company_name: String,
    pub purchase_price: f64,
    pub quantity: f64,
    pub updated_at: DateTime<Utc>,
}
