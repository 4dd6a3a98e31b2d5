//! Remit statement printer.
//!
//! Loads a JSON ledger dataset into the in-memory store and prints an aging
//! report and a counterparty statement.
//!
//! Usage: statement <dataset.json> <counterparty-uuid> <start> <end> [as-of]

use std::sync::Arc;

use anyhow::{Context, bail};
use chrono::NaiveDate;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use remit_core::ledger::LedgerSet;
use remit_db::{AgingService, MemoryStore, ReconciliationService};
use remit_shared::types::CounterpartyId;
use remit_shared::{AppConfig, SystemClock};

const USAGE: &str = "statement <dataset.json> <counterparty-uuid> <start> <end> [as-of]";

struct Args {
    dataset: String,
    counterparty_id: CounterpartyId,
    start: NaiveDate,
    end: NaiveDate,
    as_of: Option<NaiveDate>,
}

fn parse_date(value: &str, name: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("Invalid {name} date '{value}', expected YYYY-MM-DD"))
}

fn parse_args(mut args: impl Iterator<Item = String>) -> anyhow::Result<Args> {
    let (Some(dataset), Some(counterparty), Some(start), Some(end)) =
        (args.next(), args.next(), args.next(), args.next())
    else {
        bail!("Usage: {USAGE}");
    };
    let counterparty_id = Uuid::parse_str(&counterparty)
        .map(CounterpartyId::from_uuid)
        .with_context(|| format!("Invalid counterparty id '{counterparty}'"))?;

    Ok(Args {
        dataset,
        counterparty_id,
        start: parse_date(&start, "start")?,
        end: parse_date(&end, "end")?,
        as_of: args.next().map(|v| parse_date(&v, "as-of")).transpose()?,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log.filter.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = parse_args(std::env::args().skip(1))?;

    let raw = std::fs::read_to_string(&args.dataset)
        .with_context(|| format!("Failed to read dataset {}", args.dataset))?;
    let dataset: LedgerSet = serde_json::from_str(&raw).context("Failed to parse dataset")?;
    let store = Arc::new(MemoryStore::load(dataset).context("Dataset failed validation")?);
    info!(dataset = %args.dataset, "Loaded dataset");

    let aging = AgingService::new(Arc::clone(&store), Arc::new(SystemClock), &config.aging)?;
    let report = aging.report(Some(args.counterparty_id), args.as_of).await?;

    let reconciliation = ReconciliationService::new(store, &config.reconciliation);
    let statement = reconciliation
        .statement(args.counterparty_id, args.start, args.end)
        .await?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    println!("{}", serde_json::to_string_pretty(&statement)?);
    for row in statement.render_rows() {
        println!("{row}");
    }

    Ok(())
}
