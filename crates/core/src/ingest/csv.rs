use crate::domain::Holding;
use anyhow::Context;
use chrono::Utc;
use serde::Deserialize;
use std::collections::BTreeMap;

const PORTFOLIO_COLUMNS: [&str; 4] = ["stockId", "companyName", "price", "quantity"];
const QUESTIONNAIRE_COLUMNS: [&str; 2] = ["question", "answer"];

#[derive(Debug, Deserialize)]
struct PortfolioRow {
    #[serde(rename = "stockId")]
    stock_id: String,
    #[serde(rename = "companyName")]
    company_name: String,
    price: String,
    quantity: String,
}

#[derive(Debug)]
pub struct PortfolioParse {
    /// Deduplicated by stock id; the last row for a given id wins.
    pub holdings: Vec<Holding>,
    pub row_errors: usize,
}

/// Parses a portfolio CSV upload. A missing/invalid header fails the whole
/// call; malformed data rows are skipped and counted.
pub fn parse_portfolio_csv(bytes: &[u8]) -> anyhow::Result<PortfolioParse> {
    let mut reader = csv::Reader::from_reader(bytes);
    validate_header(&mut reader, &PORTFOLIO_COLUMNS)?;

    let mut by_id = BTreeMap::new();
    let mut row_errors = 0usize;

    for (idx, record) in reader.deserialize::<PortfolioRow>().enumerate() {
        let line = idx + 2; // 1-based, after the header
        let row = match record {
            Ok(row) => row,
            Err(err) => {
                tracing::warn!(line, error = %err, "skipping malformed portfolio row");
                row_errors += 1;
                continue;
            }
        };

        match row_into_holding(row) {
            Ok(holding) => {
                by_id.insert(holding.stock_id.clone(), holding);
            }
            Err(err) => {
                tracing::warn!(line, error = %err, "skipping invalid portfolio row");
                row_errors += 1;
            }
        }
    }

    Ok(PortfolioParse {
        holdings: by_id.into_values().collect(),
        row_errors,
    })
}

fn row_into_holding(row: PortfolioRow) -> anyhow::Result<Holding> {
    let stock_id = row.stock_id.trim().to_ascii_uppercase();
    anyhow::ensure!(!stock_id.is_empty(), "stockId must be non-empty");

    let company_name = row.company_name.trim().to_string();
    anyhow::ensure!(!company_name.is_empty(), "companyName must be non-empty");

    let purchase_price = row
        .price
        .trim()
        .parse::<f64>()
        .with_context(|| format!("invalid price: {:?}", row.price))?;
    let quantity = row
        .quantity
        .trim()
        .parse::<f64>()
        .with_context(|| format!("invalid quantity: {:?}", row.quantity))?;
    anyhow::ensure!(
        purchase_price.is_finite() && quantity.is_finite(),
        "numeric fields must be finite"
    );

    Ok(Holding {
        stock_id,
        company_name,
        purchase_price,
        quantity,
        updated_at: Utc::now(),
    })
}

/// Parses a questionnaire CSV into `(question, answer)` pairs. Rows missing
/// an answer are skipped, matching the lenient shape of the uploads.
pub fn parse_questionnaire_csv(bytes: &[u8]) -> anyhow::Result<Vec<(String, String)>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(bytes);
    validate_header(&mut reader, &QUESTIONNAIRE_COLUMNS)?;

    let mut pairs = Vec::new();
    for record in reader.records() {
        let record = record.context("questionnaire CSV is malformed")?;
        let question = record.get(0).unwrap_or("").trim();
        let answer = record.get(1).unwrap_or("").trim();
        if question.is_empty() || answer.is_empty() {
            continue;
        }
        pairs.push((question.to_string(), answer.to_string()));
    }

    Ok(pairs)
}

fn validate_header<R: std::io::Read>(
    reader: &mut csv::Reader<R>,
    required: &[&str],
) -> anyhow::Result<()> {
    let headers = reader.headers().context("failed to read CSV header")?;
    let names: Vec<&str> = headers.iter().map(str::trim).collect();
    for column in required {
        anyhow::ensure!(
            names.contains(column),
            "CSV header is missing required column {column:?} (got {names:?})"
        );
    }
    Ok(())
}
