use crate::domain::{BiasReport, Recommendation};
use crate::mail::{EmailMessage, Mailer};
use crate::storage::PortfolioStore;
use chrono::{DateTime, Utc};

const SUBJECT: &str = "Your Portfolio Analysis and Recommendations";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertOutcome {
    /// Digest sent, with the number of recommendations it listed.
    Sent(usize),
    /// Nothing to report yet; no mail was produced.
    Skipped,
}

/// Weekly digest: reads the current recommendation snapshot and sends one
/// aggregated message. Holdings without a recommendation are simply absent
/// from the digest. A send failure is reported to the caller once; the next
/// weekly run supersedes it.
pub async fn run(
    store: &dyn PortfolioStore,
    mailer: &dyn Mailer,
    sender: &str,
    recipient: &str,
    user_id: &str,
) -> anyhow::Result<AlertOutcome> {
    let mut recommendations = store.list_recommendations().await?;
    if recommendations.is_empty() {
        tracing::info!("no recommendations yet; skipping digest");
        return Ok(AlertOutcome::Skipped);
    }
    recommendations.sort_by(|a, b| a.stock_id.cmp(&b.stock_id));

    let bias = store.get_bias_report(user_id).await?;
    let body = format_digest(&recommendations, bias.as_ref(), Utc::now());

    mailer
        .send(&EmailMessage {
            sender: sender.to_string(),
            recipient: recipient.to_string(),
            subject: SUBJECT.to_string(),
            body,
        })
        .await?;

    tracing::info!(count = recommendations.len(), %recipient, "digest sent");
    Ok(AlertOutcome::Sent(recommendations.len()))
}

fn format_digest(
    recommendations: &[Recommendation],
    bias: Option<&BiasReport>,
    generated_at: DateTime<Utc>,
) -> String {
    let mut body = format!(
        "Portfolio Analysis and Recommendations\n\
         Generated on {}\n\n",
        generated_at.format("%Y-%m-%d %H:%M:%S")
    );

    if let Some(bias) = bias {
        body.push_str(&format!(
            "PORTFOLIO BIAS ANALYSIS\n\
             ----------------------\n\
             Bias Score: {}/10\n\
             Sector Concentration: {}\n\
             Volatility Risk: {}\n\
             Recommendation: {}\n\n",
            bias.bias_score, bias.sector_concentration, bias.volatility_risk, bias.recommendation
        ));
    }

    body.push_str(
        "STOCK-SPECIFIC RECOMMENDATIONS\n\
         ----------------------------\n",
    );
    for rec in recommendations {
        body.push_str(&format!(
            "\nStock Symbol: {}\n\
             Recommendation: {}\n\
             Confidence Score: {}%\n\
             Reasoning: {}\n\
             {}\n",
            rec.stock_id,
            rec.action,
            rec.confidence_score,
            rec.reasoning,
            "-".repeat(80)
        ));
    }

    body
}
