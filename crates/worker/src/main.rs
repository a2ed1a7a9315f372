use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use folio_core::config::Settings;
use folio_core::inference::HttpInferenceClient;
use folio_core::ingest::{self, UploadKind};
use folio_core::mail::HttpMailer;
use folio_core::market::HttpMarketDataClient;
use folio_core::pipeline::ingest::ingest_portfolio;
use folio_core::pipeline::{alert, earnings, enrich, profile, propagate, recommend, trend};
use folio_core::storage::{lock, PgStore};

#[derive(Debug, Parser)]
#[command(name = "folio_worker")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Process one uploaded CSV (portfolio or questionnaire).
    Ingest {
        /// Path to the uploaded file.
        file: std::path::PathBuf,

        /// Logical object key used to classify the upload. Defaults to the
        /// file path itself.
        #[arg(long)]
        key: Option<String>,

        /// Parse and report, but write nothing to the database.
        #[arg(long)]
        dry_run: bool,
    },

    /// Drain pending holding changes and refresh fundamentals.
    Propagate {
        #[arg(long, default_value_t = propagate::DEFAULT_BATCH_SIZE)]
        batch_size: i64,
    },

    /// Refresh fundamentals: every holding when no symbol is given (the
    /// weekly sweep), or just the named one.
    Enrich { stock_id: Option<String> },

    /// Recompute price-trend indicators for every holding.
    Trend,

    /// Refresh the earnings calendar for every holding.
    Earnings,

    /// Generate per-holding recommendations and the portfolio bias report.
    Recommend {
        #[arg(long, default_value_t = recommend::DEFAULT_CONCURRENCY)]
        concurrency: usize,
    },

    /// Send the digest email for the current recommendation snapshot.
    Alert,
}

impl Command {
    /// Scheduled jobs take an advisory lock so overlapping ticks never run
    /// concurrently. One-off commands (ingest, single enrich) do not.
    fn job_lock_name(&self) -> Option<&'static str> {
        match self {
            Command::Ingest { .. } | Command::Enrich { stock_id: Some(_) } => None,
            Command::Enrich { stock_id: None } => Some("enrich"),
            Command::Propagate { .. } => Some("propagate"),
            Command::Trend => Some("trend"),
            Command::Earnings => Some("earnings"),
            Command::Recommend { .. } => Some("recommend"),
            Command::Alert => Some("alert"),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    // --dry-run never touches the database, so handle it before connecting.
    if let Command::Ingest {
        file,
        key,
        dry_run: true,
    } = &args.command
    {
        return dry_run_ingest(file, key.as_deref()).await;
    }

    let db_url = settings.require_database_url()?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await
        .context("connect DATABASE_URL failed")?;
    folio_core::storage::migrate(&pool).await?;
    let store = PgStore::new(pool.clone());

    let run_id = uuid::Uuid::new_v4();
    tracing::info!(%run_id, command = ?args.command, "worker run starting");

    // The advisory lock lives on one dedicated connection for the whole run;
    // releasing through the pool could land on a different session.
    let job = args.command.job_lock_name();
    let mut lock_conn = None;
    if let Some(job) = job {
        let mut conn = pool
            .acquire()
            .await
            .context("acquire lock connection failed")?;
        if !lock::try_acquire_job_lock(&mut conn, job).await? {
            tracing::warn!(%job, "job lock not acquired; another run in progress");
            return Ok(());
        }
        lock_conn = Some(conn);
    }

    let result = dispatch(&args.command, &settings, &store).await;

    if let (Some(job), Some(mut conn)) = (job, lock_conn) {
        match lock::release_job_lock(&mut conn, job).await {
            Ok(true) => {}
            Ok(false) => tracing::warn!(%job, "advisory lock was not held at release"),
            Err(err) => tracing::warn!(%job, error = %err, "advisory lock release failed"),
        }
    }

    if let Err(err) = &result {
        sentry_anyhow::capture_anyhow(err);
        tracing::error!(error = %err, "worker command failed");
    }
    result
}

async fn dispatch(command: &Command, settings: &Settings, store: &PgStore) -> anyhow::Result<()> {
    match command {
        Command::Ingest { file, key, .. } => {
            let key = key
                .clone()
                .unwrap_or_else(|| file.to_string_lossy().into_owned());
            let bytes = tokio::fs::read(file)
                .await
                .with_context(|| format!("read upload {}", file.display()))?;

            match UploadKind::from_object_key(&key) {
                Some(UploadKind::Portfolio) => {
                    let summary = ingest_portfolio(store, &bytes).await?;
                    tracing::info!(
                        upserted = summary.upserted,
                        row_errors = summary.row_errors,
                        "portfolio upload processed"
                    );
                }
                Some(UploadKind::Questionnaire) => {
                    let answers = ingest::parse_questionnaire_csv(&bytes)?;
                    let inference = HttpInferenceClient::from_settings(settings)?;
                    let stored = profile::process_questionnaire(
                        store,
                        &inference,
                        &settings.default_user_id,
                        &answers,
                    )
                    .await?;
                    tracing::info!(category = %stored.category, "questionnaire processed");
                }
                None => anyhow::bail!("object key {key:?} is not a recognized upload"),
            }
        }
        Command::Propagate { batch_size } => {
            let market = HttpMarketDataClient::from_settings(settings)?;
            propagate::run(store, &market, *batch_size).await?;
        }
        Command::Enrich { stock_id } => {
            let market = HttpMarketDataClient::from_settings(settings)?;
            match stock_id {
                Some(stock_id) => {
                    enrich::enrich_fundamentals(store, &market, stock_id).await?;
                    tracing::info!(%stock_id, "fundamentals refreshed");
                }
                None => {
                    enrich::run(store, &market).await?;
                }
            }
        }
        Command::Trend => {
            let market = HttpMarketDataClient::from_settings(settings)?;
            trend::run(store, &market).await?;
        }
        Command::Earnings => {
            let market = HttpMarketDataClient::from_settings(settings)?;
            earnings::run(store, &market).await?;
        }
        Command::Recommend { concurrency } => {
            let inference = HttpInferenceClient::from_settings(settings)?;
            recommend::run(store, &inference, &settings.default_user_id, *concurrency).await?;
        }
        Command::Alert => {
            let mailer = HttpMailer::from_settings(settings)?;
            alert::run(
                store,
                &mailer,
                settings.require_sender_email()?,
                settings.require_recipient_email()?,
                &settings.default_user_id,
            )
            .await?;
        }
    }
    Ok(())
}

async fn dry_run_ingest(file: &std::path::Path, key: Option<&str>) -> anyhow::Result<()> {
    let key = key
        .map(str::to_owned)
        .unwrap_or_else(|| file.to_string_lossy().into_owned());
    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("read upload {}", file.display()))?;

    match UploadKind::from_object_key(&key) {
        Some(UploadKind::Portfolio) => {
            let parsed = ingest::parse_portfolio_csv(&bytes)?;
            tracing::info!(
                dry_run = true,
                holdings = parsed.holdings.len(),
                row_errors = parsed.row_errors,
                "portfolio upload parsed"
            );
        }
        Some(UploadKind::Questionnaire) => {
            let answers = ingest::parse_questionnaire_csv(&bytes)?;
            tracing::info!(dry_run = true, answers = answers.len(), "questionnaire parsed");
        }
        None => anyhow::bail!("object key {key:?} is not a recognized upload"),
    }
    Ok(())
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
