use crate::domain::{Action, RiskCategory};
use anyhow::Context;
use serde::Deserialize;

/// Best-effort extraction of a JSON object from model output that may be
/// wrapped in markdown fences or surrounding prose.
pub fn extract_json(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.starts_with("```") {
        // Remove Markdown fences (```json ... ``` or ``` ... ```).
        let mut inner = trimmed;
        if let Some(after_first) = inner.splitn(2, '\n').nth(1) {
            inner = after_first;
        }
        if let Some(end) = inner.rfind("```") {
            inner = &inner[..end];
        }
        return Some(inner.trim().to_string());
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(trimmed[start..=end].trim().to_string())
}

fn parse_payload<T: serde::de::DeserializeOwned>(text: &str, what: &str) -> anyhow::Result<T> {
    let json_str = extract_json(text).unwrap_or_else(|| text.trim().to_string());
    serde_json::from_str::<T>(&json_str)
        .with_context(|| format!("model output is not valid JSON for the {what} schema: {json_str}"))
}

#[derive(Debug, Deserialize)]
struct RiskProfilePayload {
    classification: String,
    reasoning: String,
}

/// Parses the risk-questionnaire classification response.
pub fn parse_risk_profile(text: &str) -> anyhow::Result<(RiskCategory, String)> {
    let payload: RiskProfilePayload = parse_payload(text, "risk profile")?;
    let category = RiskCategory::parse(&payload.classification)?;
    let reasoning = payload.reasoning.trim().to_string();
    anyhow::ensure!(!reasoning.is_empty(), "reasoning must be non-empty");
    Ok((category, reasoning))
}

#[derive(Debug, Deserialize)]
struct RecommendationRaw {
    recommendation: String,
    confidence_score: f64,
    reasoning: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecommendationPayload {
    pub action: Action,
    pub confidence_score: f64,
    pub reasoning: String,
}

/// Parses a per-holding recommendation response and range-checks it.
pub fn parse_recommendation(text: &str) -> anyhow::Result<RecommendationPayload> {
    let raw: RecommendationRaw = parse_payload(text, "recommendation")?;
    let action = Action::parse(&raw.recommendation)?;
    anyhow::ensure!(
        (0.0..=100.0).contains(&raw.confidence_score),
        "confidence_score must be within 0..=100 (got {})",
        raw.confidence_score
    );
    let reasoning = raw.reasoning.trim().to_string();
    anyhow::ensure!(!reasoning.is_empty(), "reasoning must be non-empty");
    Ok(RecommendationPayload {
        action,
        confidence_score: raw.confidence_score,
        reasoning,
    })
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct BiasPayload {
    pub bias_score: f64,
    pub volatility_risk: String,
    pub sector_concentration: String,
    pub recommendation: String,
}

/// Parses the portfolio-bias analysis response.
pub fn parse_bias(text: &str) -> anyhow::Result<BiasPayload> {
    let payload: BiasPayload = parse_payload(text, "portfolio bias")?;
    anyhow::ensure!(
        (0.0..=10.0).contains(&payload.bias_score),
        "bias_score must be within 0..=10 (got {})",
        payload.bias_score
    );
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_json_handles_fenced_blocks() {
        let body = "{\"a\":1}";
        let fenced = format!("```json\n{body}\n```\n");
        assert_eq!(extract_json(&fenced), Some(body.to_string()));
    }

    #[test]
    fn extract_json_falls_back_to_braces() {
        let s = "prefix {\"a\":1} suffix";
        assert_eq!(extract_json(s), Some("{\"a\":1}".to_string()));
    }

    #[test]
    fn parses_a_risk_profile_payload() {
        let text = r#"{"classification": "Balanced", "reasoning": "Mixed answers."}"#;
        let (category, reasoning) = parse_risk_profile(text).unwrap();
        assert_eq!(category, RiskCategory::Balanced);
        assert_eq!(reasoning, "Mixed answers.");
    }

    #[test]
    fn rejects_an_unknown_classification() {
        let text = r#"{"classification": "Reckless", "reasoning": "..."}"#;
        assert!(parse_risk_profile(text).is_err());
    }

    #[test]
    fn parses_a_recommendation_payload_from_fenced_output() {
        let text = "```json\n{\"recommendation\": \"buy\", \"confidence_score\": 82, \"reasoning\": \"Strong momentum.\"}\n```";
        let payload = parse_recommendation(text).unwrap();
        assert_eq!(payload.action, Action::Buy);
        assert_eq!(payload.confidence_score, 82.0);
    }

    #[test]
    fn rejects_an_out_of_range_confidence() {
        let text = r#"{"recommendation": "HOLD", "confidence_score": 140, "reasoning": "x"}"#;
        assert!(parse_recommendation(text).is_err());
    }

    #[test]
    fn parses_a_bias_payload() {
        let text = r#"{"bias_score": 7, "volatility_risk": "High", "sector_concentration": "Tech heavy", "recommendation": "Diversify."}"#;
        let payload = parse_bias(text).unwrap();
        assert_eq!(payload.bias_score, 7.0);
        assert_eq!(payload.volatility_risk, "High");
    }

    #[test]
    fn rejects_bias_scores_off_the_scale() {
        let text = r#"{"bias_score": 42, "volatility_risk": "High", "sector_concentration": "x", "recommendation": "y"}"#;
        assert!(parse_bias(text).is_err());
    }
}
