use crate::domain::EarningsQuarter;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Current quote and fundamental snapshot for one symbol. Every metric is
/// optional; providers routinely omit fields for thinly covered names.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Quote {
    pub industry: Option<String>,
    pub last_price: Option<f64>,
    pub market_cap: Option<f64>,
    pub trailing_pe: Option<f64>,
    pub trailing_eps: Option<f64>,
    /// Raw fraction as reported by the provider.
    pub dividend_yield: Option<f64>,
    pub fifty_two_week_high: Option<f64>,
    pub fifty_two_week_low: Option<f64>,
    pub fifty_day_average: Option<f64>,
    pub two_hundred_day_average: Option<f64>,
    pub debt_to_equity: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub close: f64,
    pub volume: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EarningsFetch {
    pub next_earnings_date: Option<NaiveDate>,
    pub trailing_eps: Option<f64>,
    pub forward_eps: Option<f64>,
    pub earnings_growth: Option<f64>,
    pub revenue_growth: Option<f64>,
    #[serde(default)]
    pub quarters: Vec<EarningsQuarter>,
}
