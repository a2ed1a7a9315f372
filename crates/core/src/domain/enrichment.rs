use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Fundamental metrics for one holding. Absent until the first successful
/// enrichment; individual fields stay `None` when the upstream quote did not
/// carry them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fundamentals {
    pub stock_id: String,
    pub industry: Option<String>,
    pub market_cap: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub eps: Option<f64>,
    /// Percentage, not a raw fraction.
    pub dividend_yield: Option<f64>,
    pub fifty_two_week_high: Option<f64>,
    pub fifty_two_week_low: Option<f64>,
    pub fifty_day_ma: Option<f64>,
    pub two_hundred_day_ma: Option<f64>,
    pub debt_to_equity: Option<f64>,
    /// Last price over the 52-week high, in (0, 1] for a stock below its high.
    pub price_to_52w_high: Option<f64>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trend {
    pub stock_id: String,
    pub last_close: f64,
    pub moving_avg_50: Option<f64>,
    pub rsi: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub volume: Option<f64>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Earnings {
    pub stock_id: String,
    pub next_earnings_date: Option<NaiveDate>,
    pub trailing_eps: Option<f64>,
    pub forward_eps: Option<f64>,
    pub earnings_growth: Option<f64>,
    pub revenue_growth: Option<f64>,
    pub recent_quarters: Vec<EarningsQuarter>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarningsQuarter {
    pub period_end: NaiveDate,
    pub reported_eps: Option<f64>,
    pub estimated_eps: Option<f64>,
    pub surprise_pct: Option<f64>,
}
