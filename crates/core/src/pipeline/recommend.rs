use crate::domain::{Holding, Recommendation, RiskProfile};
use crate::inference::{json, InferenceClient};
use crate::pipeline::RunSummary;
use crate::storage::PortfolioStore;
use chrono::Utc;
use futures::{stream, StreamExt};
use serde::Serialize;

/// Cap on in-flight inference calls within one run, to stay under the
/// service's rate limits.
pub const DEFAULT_CONCURRENCY: usize = 2;

/// Weekly recommendation run: joins every holding with whatever enrichment
/// exists, conditions on the user's risk profile, and asks the inference
/// service for a per-holding verdict.
///
/// Holdings are processed independently under a bounded-concurrency pool. A
/// failed holding keeps its previous recommendation; missing enrichment
/// degrades the prompt, never blocks the row. With no stored risk profile
/// the run proceeds under a conservative default.
pub async fn run(
    store: &dyn PortfolioStore,
    inference: &dyn InferenceClient,
    user_id: &str,
    concurrency: usize,
) -> anyhow::Result<RunSummary> {
    let holdings = store.list_holdings().await?;
    if holdings.is_empty() {
        tracing::info!("no holdings; nothing to recommend");
        return Ok(RunSummary::default());
    }

    let profile = match store.get_risk_profile(user_id).await? {
        Some(profile) => profile,
        None => {
            tracing::warn!(%user_id, "no risk profile on record; assuming conservative");
            RiskProfile::conservative_default(user_id)
        }
    };

    // Portfolio-level bias analysis rides along with the per-holding run;
    // its failure must not cost the holdings their recommendations.
    if let Err(err) = analyze_portfolio_bias(store, inference, user_id, &holdings).await {
        tracing::warn!(%user_id, error = %err, "portfolio bias analysis failed");
    }

    let results: Vec<(String, anyhow::Result<()>)> = stream::iter(holdings.iter().map(|h| {
        let profile = &profile;
        async move {
            (
                h.stock_id.clone(),
                process_holding(store, inference, profile, h).await,
            )
        }
    }))
    .buffer_unordered(concurrency.max(1))
    .collect()
    .await;

    let mut summary = RunSummary::default();
    for (stock_id, result) in results {
        match result {
            Ok(()) => summary.record(true),
            Err(err) => {
                summary.record(false);
                tracing::warn!(%stock_id, error = %err, "recommendation failed; previous one kept");
            }
        }
    }

    tracing::info!(
        processed = summary.processed,
        succeeded = summary.succeeded,
        failed = summary.failed,
        "recommendation run complete"
    );
    Ok(summary)
}

async fn process_holding(
    store: &dyn PortfolioStore,
    inference: &dyn InferenceClient,
    profile: &RiskProfile,
    holding: &Holding,
) -> anyhow::Result<()> {
    let fundamentals = store.get_fundamentals(&holding.stock_id).await?;
    let trend = store.get_trend(&holding.stock_id).await?;
    let earnings = store.get_earnings(&holding.stock_id).await?;

    let prompt = analysis_prompt(
        holding,
        fundamentals.as_ref(),
        trend.as_ref(),
        earnings.as_ref(),
        profile,
    );
    let text = inference.complete(&prompt).await?;
    let payload = json::parse_recommendation(&text)?;

    store
        .upsert_recommendation(&Recommendation {
            stock_id: holding.stock_id.clone(),
            action: payload.action,
            confidence_score: payload.confidence_score,
            reasoning: payload.reasoning,
            generated_at: Utc::now(),
        })
        .await
}

async fn analyze_portfolio_bias(
    store: &dyn PortfolioStore,
    inference: &dyn InferenceClient,
    user_id: &str,
    holdings: &[Holding],
) -> anyhow::Result<()> {
    let mut fundamentals = serde_json::Map::new();
    let mut technicals = serde_json::Map::new();
    for holding in holdings {
        if let Some(f) = store.get_fundamentals(&holding.stock_id).await? {
            fundamentals.insert(holding.stock_id.clone(), serde_json::to_value(&f)?);
        }
        if let Some(t) = store.get_trend(&holding.stock_id).await? {
            technicals.insert(holding.stock_id.clone(), serde_json::to_value(&t)?);
        }
    }

    let portfolio_data = serde_json::json!({
        "holdings": holdings,
        "fundamentals": fundamentals,
        "technicals": technicals,
    });

    let prompt = bias_prompt(&portfolio_data);
    let text = inference.complete(&prompt).await?;
    let payload = json::parse_bias(&text)?;

    store
        .upsert_bias_report(&crate::domain::BiasReport {
            user_id: user_id.to_string(),
            bias_score: payload.bias_score,
            volatility_risk: payload.volatility_risk,
            sector_concentration: payload.sector_concentration,
            recommendation: payload.recommendation,
            generated_at: Utc::now(),
        })
        .await
}

fn section<T: Serialize>(value: Option<&T>) -> String {
    match value {
        Some(v) => serde_json::to_string_pretty(v).unwrap_or_else(|_| "not available".to_string()),
        None => "not available".to_string(),
    }
}

fn analysis_prompt(
    holding: &Holding,
    fundamentals: Option<&crate::domain::Fundamentals>,
    trend: Option<&crate::domain::Trend>,
    earnings: Option<&crate::domain::Earnings>,
    profile: &RiskProfile,
) -> String {
    format!(
        "Analyze the following stock data and provide a BUY, SELL, or HOLD recommendation:\n\n\
         Stock: {} ({}), purchased at {} for {} shares\n\
         Fundamentals: {}\n\
         Technicals: {}\n\
         Earnings: {}\n\
         RiskProfile: {}\n\n\
         Provide the recommendation in JSON format with:\n\
         - recommendation (BUY/SELL/HOLD)\n\
         - confidence_score (0-100)\n\
         - reasoning (brief explanation)\n\n\
         Respond with valid JSON only, without any additional text, explanations, or formatting.\n\
         Do not include markdown formatting or code blocks.",
        holding.stock_id,
        holding.company_name,
        holding.purchase_price,
        holding.quantity,
        section(fundamentals),
        section(trend),
        section(earnings),
        section(Some(profile)),
    )
}

fn bias_prompt(portfolio_data: &serde_json::Value) -> String {
    let data = serde_json::to_string_pretty(portfolio_data)
        .unwrap_or_else(|_| portfolio_data.to_string());
    format!(
        "Analyze the following stock portfolio and detect any biases:\n\
         {data}\n\n\
         Evaluate:\n\
         - Sector concentration risk\n\
         - Portfolio volatility\n\
         - Market capitalization balance (Small, Mid, Large-cap)\n\
         - Diversification across industries\n\
         - Recommendations to optimize for lower risk and better diversification.\n\
         Provide a summary with bias rating from 1 (well-balanced) to 10 (highly biased)\n\
         Provide the analysis in JSON format with:\n\
         - bias_score\n\
         - volatility_risk\n\
         - sector_concentration\n\
         - recommendation\n\
         Respond with valid JSON only, without any additional text, explanations, or formatting.\n\
         Do not include markdown formatting or code blocks."
    )
}
