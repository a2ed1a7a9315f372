use crate::domain::{
    BiasReport, ChangeEvent, ChangeKind, Earnings, Fundamentals, Holding, Recommendation,
    RiskProfile, StoredChange, Trend,
};
use crate::storage::PortfolioStore;
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// PostgreSQL-backed store. All writes are `ON CONFLICT ... DO UPDATE`
/// upserts keyed by stock id (or user id), so redelivered work converges.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: sqlx::PgPool,
}

impl PgStore {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &sqlx::PgPool {
        &self.pool
    }

    async fn upsert_blob(
        &self,
        table: &str,
        stock_id: &str,
        data: Value,
        last_updated: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let sql = format!(
            "INSERT INTO {table} (stock_id, data, last_updated) VALUES ($1, $2, $3) \
             ON CONFLICT (stock_id) DO UPDATE \
               SET data = EXCLUDED.data, last_updated = EXCLUDED.last_updated"
        );
        sqlx::query(&sql)
            .persistent(false)
            .bind(stock_id)
            .bind(data)
            .bind(last_updated)
            .execute(&self.pool)
            .await
            .with_context(|| format!("upsert {table} failed"))?;
        Ok(())
    }

    async fn get_blob(&self, table: &str, stock_id: &str) -> anyhow::Result<Option<Value>> {
        let sql = format!("SELECT data FROM {table} WHERE stock_id = $1");
        let row: Option<(Value,)> = sqlx::query_as(&sql)
            .persistent(false)
            .bind(stock_id)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("select from {table} failed"))?;
        Ok(row.map(|(data,)| data))
    }
}

#[async_trait::async_trait]
impl PortfolioStore for PgStore {
    async fn upsert_holdings(&self, holdings: &[Holding]) -> anyhow::Result<u64> {
        if holdings.is_empty() {
            return Ok(0);
        }

        let mut qb = sqlx::QueryBuilder::new(
            "INSERT INTO holdings (stock_id, company_name, purchase_price, quantity, updated_at) ",
        );
        qb.push_values(holdings, |mut b, h| {
            b.push_bind(&h.stock_id)
                .push_bind(&h.company_name)
                .push_bind(h.purchase_price)
                .push_bind(h.quantity)
                .push_bind(h.updated_at);
        });
        qb.push(
            " ON CONFLICT (stock_id) DO UPDATE \
               SET company_name = EXCLUDED.company_name, \
                   purchase_price = EXCLUDED.purchase_price, \
                   quantity = EXCLUDED.quantity, \
                   updated_at = EXCLUDED.updated_at",
        );

        let res = qb
            .build()
            .persistent(false)
            .execute(&self.pool)
            .await
            .context("batch upsert holdings failed")?;
        Ok(res.rows_affected())
    }

    async fn get_holding(&self, stock_id: &str) -> anyhow::Result<Option<Holding>> {
        let row: Option<(String, String, f64, f64, DateTime<Utc>)> = sqlx::query_as(
            "SELECT stock_id, company_name, purchase_price, quantity, updated_at \
             FROM holdings WHERE stock_id = $1",
        )
        .persistent(false)
        .bind(stock_id)
        .fetch_optional(&self.pool)
        .await
        .context("select holding failed")?;

        Ok(row.map(holding_from_row))
    }

    async fn list_holdings(&self) -> anyhow::Result<Vec<Holding>> {
        let rows: Vec<(String, String, f64, f64, DateTime<Utc>)> = sqlx::query_as(
            "SELECT stock_id, company_name, purchase_price, quantity, updated_at \
             FROM holdings ORDER BY stock_id",
        )
        .persistent(false)
        .fetch_all(&self.pool)
        .await
        .context("scan holdings failed")?;

        Ok(rows.into_iter().map(holding_from_row).collect())
    }

    async fn append_changes(&self, events: &[ChangeEvent]) -> anyhow::Result<()> {
        if events.is_empty() {
            return Ok(());
        }

        let mut qb =
            sqlx::QueryBuilder::new("INSERT INTO holding_changes (stock_id, kind, occurred_at) ");
        qb.push_values(events, |mut b, e| {
            b.push_bind(&e.stock_id)
                .push_bind(e.kind.as_str())
                .push_bind(e.occurred_at);
        });

        qb.build()
            .persistent(false)
            .execute(&self.pool)
            .await
            .context("append holding_changes failed")?;
        Ok(())
    }

    async fn fetch_pending_changes(&self, limit: i64) -> anyhow::Result<Vec<StoredChange>> {
        let rows: Vec<(i64, String, String, DateTime<Utc>)> = sqlx::query_as(
            "SELECT id, stock_id, kind, occurred_at FROM holding_changes \
             WHERE processed_at IS NULL ORDER BY id LIMIT $1",
        )
        .persistent(false)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("fetch pending holding_changes failed")?;

        rows.into_iter()
            .map(|(id, stock_id, kind, occurred_at)| {
                Ok(StoredChange {
                    id,
                    event: ChangeEvent {
                        stock_id,
                        kind: ChangeKind::parse(&kind)?,
                        occurred_at,
                    },
                })
            })
            .collect()
    }

    async fn mark_changes_processed(&self, ids: &[i64]) -> anyhow::Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let res = sqlx::query(
            "UPDATE holding_changes SET processed_at = now() \
             WHERE id = ANY($1) AND processed_at IS NULL",
        )
        .persistent(false)
        .bind(ids)
        .execute(&self.pool)
        .await
        .context("mark holding_changes processed failed")?;
        Ok(res.rows_affected())
    }

    async fn upsert_fundamentals(&self, fundamentals: &Fundamentals) -> anyhow::Result<()> {
        let data = serde_json::to_value(fundamentals).context("serialize fundamentals failed")?;
        self.upsert_blob(
            "stock_fundamentals",
            &fundamentals.stock_id,
            data,
            fundamentals.last_updated,
        )
        .await
    }

    async fn get_fundamentals(&self, stock_id: &str) -> anyhow::Result<Option<Fundamentals>> {
        match self.get_blob("stock_fundamentals", stock_id).await? {
            Some(data) => Ok(Some(
                serde_json::from_value(data).context("decode fundamentals failed")?,
            )),
            None => Ok(None),
        }
    }

    async fn upsert_trend(&self, trend: &Trend) -> anyhow::Result<()> {
        let data = serde_json::to_value(trend).context("serialize trend failed")?;
        self.upsert_blob("stock_trend", &trend.stock_id, data, trend.last_updated)
            .await
    }

    async fn get_trend(&self, stock_id: &str) -> anyhow::Result<Option<Trend>> {
        match self.get_blob("stock_trend", stock_id).await? {
            Some(data) => Ok(Some(
                serde_json::from_value(data).context("decode trend failed")?,
            )),
            None => Ok(None),
        }
    }

    async fn upsert_earnings(&self, earnings: &Earnings) -> anyhow::Result<()> {
        let data = serde_json::to_value(earnings).context("serialize earnings failed")?;
        self.upsert_blob(
            "stock_earnings",
            &earnings.stock_id,
            data,
            earnings.last_updated,
        )
        .await
    }

    async fn get_earnings(&self, stock_id: &str) -> anyhow::Result<Option<Earnings>> {
        match self.get_blob("stock_earnings", stock_id).await? {
            Some(data) => Ok(Some(
                serde_json::from_value(data).context("decode earnings failed")?,
            )),
            None => Ok(None),
        }
    }

    async fn upsert_risk_profile(&self, profile: &RiskProfile) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO risk_profiles (user_id, category, reasoning, generated_at) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (user_id) DO UPDATE \
               SET category = EXCLUDED.category, \
                   reasoning = EXCLUDED.reasoning, \
                   generated_at = EXCLUDED.generated_at",
        )
        .persistent(false)
        .bind(&profile.user_id)
        .bind(profile.category.as_str())
        .bind(&profile.reasoning)
        .bind(profile.generated_at)
        .execute(&self.pool)
        .await
        .context("upsert risk_profiles failed")?;
        Ok(())
    }

    async fn get_risk_profile(&self, user_id: &str) -> anyhow::Result<Option<RiskProfile>> {
        let row: Option<(String, String, String, DateTime<Utc>)> = sqlx::query_as(
            "SELECT user_id, category, reasoning, generated_at \
             FROM risk_profiles WHERE user_id = $1",
        )
        .persistent(false)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .context("select risk_profiles failed")?;

        row.map(|(user_id, category, reasoning, generated_at)| {
            Ok(RiskProfile {
                user_id,
                category: crate::domain::RiskCategory::parse(&category)?,
                reasoning,
                generated_at,
            })
        })
        .transpose()
    }

    async fn upsert_bias_report(&self, report: &BiasReport) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO portfolio_bias \
               (user_id, bias_score, volatility_risk, sector_concentration, recommendation, generated_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (user_id) DO UPDATE \
               SET bias_score = EXCLUDED.bias_score, \
                   volatility_risk = EXCLUDED.volatility_risk, \
                   sector_concentration = EXCLUDED.sector_concentration, \
                   recommendation = EXCLUDED.recommendation, \
                   generated_at = EXCLUDED.generated_at",
        )
        .persistent(false)
        .bind(&report.user_id)
        .bind(report.bias_score)
        .bind(&report.volatility_risk)
        .bind(&report.sector_concentration)
        .bind(&report.recommendation)
        .bind(report.generated_at)
        .execute(&self.pool)
        .await
        .context("upsert portfolio_bias failed")?;
        Ok(())
    }

    async fn get_bias_report(&self, user_id: &str) -> anyhow::Result<Option<BiasReport>> {
        let row: Option<(String, f64, String, String, String, DateTime<Utc>)> = sqlx::query_as(
            "SELECT user_id, bias_score, volatility_risk, sector_concentration, recommendation, generated_at \
             FROM portfolio_bias WHERE user_id = $1",
        )
        .persistent(false)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .context("select portfolio_bias failed")?;

        Ok(row.map(
            |(user_id, bias_score, volatility_risk, sector_concentration, recommendation, generated_at)| {
                BiasReport {
                    user_id,
                    bias_score,
                    volatility_risk,
                    sector_concentration,
                    recommendation,
                    generated_at,
                }
            },
        ))
    }

    async fn upsert_recommendation(&self, rec: &Recommendation) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO recommendations (stock_id, action, confidence_score, reasoning, generated_at) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (stock_id) DO UPDATE \
               SET action = EXCLUDED.action, \
                   confidence_score = EXCLUDED.confidence_score, \
                   reasoning = EXCLUDED.reasoning, \
                   generated_at = EXCLUDED.generated_at",
        )
        .persistent(false)
        .bind(&rec.stock_id)
        .bind(rec.action.as_str())
        .bind(rec.confidence_score)
        .bind(&rec.reasoning)
        .bind(rec.generated_at)
        .execute(&self.pool)
        .await
        .context("upsert recommendations failed")?;
        Ok(())
    }

    async fn get_recommendation(&self, stock_id: &str) -> anyhow::Result<Option<Recommendation>> {
        let row: Option<(String, String, f64, String, DateTime<Utc>)> = sqlx::query_as(
            "SELECT stock_id, action, confidence_score, reasoning, generated_at \
             FROM recommendations WHERE stock_id = $1",
        )
        .persistent(false)
        .bind(stock_id)
        .fetch_optional(&self.pool)
        .await
        .context("select recommendations failed")?;

        row.map(recommendation_from_row).transpose()
    }

    async fn list_recommendations(&self) -> anyhow::Result<Vec<Recommendation>> {
        let rows: Vec<(String, String, f64, String, DateTime<Utc>)> = sqlx::query_as(
            "SELECT stock_id, action, confidence_score, reasoning, generated_at \
             FROM recommendations ORDER BY stock_id",
        )
        .persistent(false)
        .fetch_all(&self.pool)
        .await
        .context("scan recommendations failed")?;

        rows.into_iter().map(recommendation_from_row).collect()
    }
}

fn holding_from_row(
    (stock_id, company_name, purchase_price, quantity, updated_at): (
        String,
        String,
        f64,
        f64,
        DateTime<Utc>,
    ),
) -> Holding {
    Holding {
        stock_id,
        company_name,
        purchase_price,
        quantity,
        updated_at,
    }
}

fn recommendation_from_row(
    (stock_id, action, confidence_score, reasoning, generated_at): (
        String,
        String,
        f64,
        String,
        DateTime<Utc>,
    ),
) -> anyhow::Result<Recommendation> {
    Ok(Recommendation {
        stock_id,
        action: crate::domain::Action::parse(&action)?,
        confidence_score,
        reasoning,
        generated_at,
    })
}
