use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskCategory {
    Conservative,
    Balanced,
    Aggressive,
}

impl RiskCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskCategory::Conservative => "Conservative",
            RiskCategory::Balanced => "Balanced",
            RiskCategory::Aggressive => "Aggressive",
        }
    }

    /// Case-insensitive parse of the classification emitted by the model.
    pub fn parse(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "conservative" => Ok(RiskCategory::Conservative),
            "balanced" => Ok(RiskCategory::Balanced),
            "aggressive" => Ok(RiskCategory::Aggressive),
            other => anyhow::bail!("unknown risk classification: {other}"),
        }
    }
}

impl std::fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One profile per user, last-write-wins. Absence downstream means "assume
/// conservative".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskProfile {
    pub user_id: String,
    pub category: RiskCategory,
    pub reasoning: String,
    pub generated_at: DateTime<Utc>,
}

impl RiskProfile {
    pub fn conservative_default(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            category: RiskCategory::Conservative,
            reasoning: "No questionnaire profile on record; assuming a conservative stance."
                .to_string(),
            generated_at: Utc::now(),
        }
    }
}

/// Portfolio-level concentration/diversification assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiasReport {
    pub user_id: String,
    /// 1 (well balanced) through 10 (highly biased).
    pub bias_score: f64,
    pub volatility_risk: String,
    pub sector_concentration: String,
    pub recommendation: String,
    pub generated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_classification_case_insensitively() {
        assert_eq!(
            RiskCategory::parse("aggressive").unwrap(),
            RiskCategory::Aggressive
        );
        assert_eq!(
            RiskCategory::parse(" Balanced ").unwrap(),
            RiskCategory::Balanced
        );
        assert!(RiskCategory::parse("yolo").is_err());
    }
}
