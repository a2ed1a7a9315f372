use crate::domain::RiskProfile;
use crate::inference::{json, InferenceClient};
use crate::storage::PortfolioStore;
use chrono::Utc;

/// Turns parsed questionnaire answers into a stored risk profile for the
/// configured user.
///
/// One inference call per upload, deterministic sampling. If the call fails
/// or the output does not parse, nothing is written and any previous profile
/// stays in place; downstream consumers treat "no profile" as a conservative
/// default.
pub async fn process_questionnaire(
    store: &dyn PortfolioStore,
    inference: &dyn InferenceClient,
    user_id: &str,
    answers: &[(String, String)],
) -> anyhow::Result<RiskProfile> {
    anyhow::ensure!(
        !answers.is_empty(),
        "questionnaire upload contained no usable responses"
    );

    let prompt = classification_prompt(answers);
    let text = inference.complete(&prompt).await?;
    let (category, reasoning) = json::parse_risk_profile(&text)?;

    let profile = RiskProfile {
        user_id: user_id.to_string(),
        category,
        reasoning,
        generated_at: Utc::now(),
    };
    store.upsert_risk_profile(&profile).await?;

    tracing::info!(%user_id, category = %profile.category, "risk profile stored");
    Ok(profile)
}

fn classification_prompt(answers: &[(String, String)]) -> String {
    let responses: serde_json::Map<String, serde_json::Value> = answers
        .iter()
        .map(|(q, a)| (q.clone(), serde_json::Value::String(a.clone())))
        .collect();
    let responses =
        serde_json::to_string_pretty(&responses).unwrap_or_else(|_| "{}".to_string());

    format!(
        "Based on the following user responses, generate a personalized investment risk profile.\n\
         {responses}\n\
         Classify the user as:\n\
         - Conservative (Low risk, prefers stable stocks).\n\
         - Balanced (Moderate risk, mix of growth and value stocks).\n\
         - Aggressive (High risk, growth stocks).\n\
         Provide the recommendation in JSON format with:\n\
         - classification (Conservative/Balanced/Aggressive)\n\
         - reasoning (short explanation)\n\n\
         Respond with valid JSON only, without any additional text, explanations, or formatting.\n\
         Do not include markdown formatting or code blocks."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RiskCategory;
    use crate::storage::MemStore;

    struct CannedInference(&'static str);

    #[async_trait::async_trait]
    impl InferenceClient for CannedInference {
        async fn complete(&self, _prompt: &str) -> anyhow::Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct FailingInference;

    #[async_trait::async_trait]
    impl InferenceClient for FailingInference {
        async fn complete(&self, _prompt: &str) -> anyhow::Result<String> {
            anyhow::bail!("service unavailable")
        }
    }

    fn answers() -> Vec<(String, String)> {
        vec![
            ("How long is your horizon?".to_string(), "10 years".to_string()),
            ("Loss tolerance?".to_string(), "High".to_string()),
        ]
    }

    #[tokio::test]
    async fn stores_the_parsed_profile() {
        let store = MemStore::new();
        let inference = CannedInference(
            r#"{"classification": "Aggressive", "reasoning": "Long horizon, high tolerance."}"#,
        );

        let profile = process_questionnaire(&store, &inference, "user-default", &answers())
            .await
            .unwrap();
        assert_eq!(profile.category, RiskCategory::Aggressive);

        let stored = store.get_risk_profile("user-default").await.unwrap().unwrap();
        assert_eq!(stored.category, RiskCategory::Aggressive);
    }

    #[tokio::test]
    async fn a_failed_call_leaves_the_previous_profile() {
        let store = MemStore::new();
        let first = CannedInference(
            r#"{"classification": "Balanced", "reasoning": "Mixed answers."}"#,
        );
        process_questionnaire(&store, &first, "user-default", &answers())
            .await
            .unwrap();

        let err = process_questionnaire(&store, &FailingInference, "user-default", &answers())
            .await;
        assert!(err.is_err());

        let stored = store.get_risk_profile("user-default").await.unwrap().unwrap();
        assert_eq!(stored.category, RiskCategory::Balanced);
    }

    #[tokio::test]
    async fn rejects_an_empty_questionnaire() {
        let store = MemStore::new();
        let inference = CannedInference("{}");
        assert!(
            process_questionnaire(&store, &inference, "user-default", &[])
                .await
                .is_err()
        );
        assert!(store.get_risk_profile("user-default").await.unwrap().is_none());
    }

    #[test]
    fn prompt_serializes_the_answers() {
        let prompt = classification_prompt(&answers());
        assert!(prompt.contains("How long is your horizon?"));
        assert!(prompt.contains("10 years"));
        assert!(prompt.contains("classification (Conservative/Balanced/Aggressive)"));
    }
}
