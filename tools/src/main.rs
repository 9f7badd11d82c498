//! sentinel-runner: runs one account-health cycle. Meant to be invoked
//! by cron or another scheduler; it does not loop.
//!
//! Usage:
//!   sentinel-runner [--config sentinel.json] [--lock sentinel.lock]
//!   sentinel-runner --import accounts.json
//!   sentinel-runner --approve 7
//!   sentinel-runner --summary
//!
//! The store path comes from SENTINEL_STORE and the generator key from
//! OPENAI_API_KEY, either in the environment or in a .env file.

use anyhow::{bail, Context, Result};
use sentinel_core::{
    account::{AccountRecord, AccountStatus, Column},
    config::{Credentials, MonitorConfig, STORE_PATH_VAR},
    cycle::CycleController,
    draft::OpenAiDraftGenerator,
    engine::ActionEngine,
    lock::RunLock,
    store::{RecordStore, SqliteRecordStore},
    summary::StatusSummary,
    types::RowNumber,
};
use std::{
    env,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let config_path = arg_value(&args, "--config");
    let lock_path = arg_value(&args, "--lock").unwrap_or("sentinel.lock");

    if let Some(file) = arg_value(&args, "--import") {
        return import_accounts(&open_store()?, file);
    }
    if let Some(row) = arg_value(&args, "--approve") {
        let row: RowNumber = row.parse().with_context(|| format!("invalid row '{row}'"))?;
        return approve_row(&open_store()?, row);
    }
    if args.iter().any(|a| a == "--summary") {
        return print_summary(&open_store()?);
    }

    let config = match config_path {
        Some(path) => MonitorConfig::load(path)?,
        None => MonitorConfig::default(),
    };

    // Lock before any store access; a second runner must not race this one.
    let _lock = RunLock::acquire(lock_path)?;
    let credentials = Credentials::from_env()?;

    let store = SqliteRecordStore::open(&credentials.store_path)
        .with_context(|| format!("cannot open store {}", credentials.store_path))?;
    store.migrate()?;

    let generator = OpenAiDraftGenerator::new(&credentials.api_key, config.generator.clone())?;

    // Ctrl-C stops the cycle between records, never mid-write.
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    ctrlc::set_handler(move || {
        log::warn!("interrupt received, stopping after the current record");
        flag.store(true, Ordering::SeqCst);
    })
    .context("cannot install interrupt handler")?;

    let controller =
        CycleController::new(ActionEngine::new(store, generator, config)).with_cancel(cancel);

    let today = chrono::Local::now().date_naive();
    let report = controller.run_cycle(today)?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    if report.interrupted {
        bail!("cycle interrupted after {} records", report.scanned);
    }
    Ok(())
}

fn open_store() -> Result<SqliteRecordStore> {
    let _ = dotenvy::dotenv();
    let path = env::var(STORE_PATH_VAR).with_context(|| format!("{STORE_PATH_VAR} is not set"))?;
    let store = SqliteRecordStore::open(&path)?;
    store.migrate()?;
    Ok(store)
}

/// Append accounts from a JSON array. Stands in for the sign-up feed.
fn import_accounts(store: &SqliteRecordStore, file: &str) -> Result<()> {
    let content =
        std::fs::read_to_string(file).with_context(|| format!("cannot read {file}"))?;
    let records: Vec<AccountRecord> = serde_json::from_str(&content)?;
    for record in &records {
        let handle = store.insert_account(record)?;
        log::info!("import: {} at row {}", record.company_name, handle.row_number);
    }
    println!("imported {} accounts", records.len());
    Ok(())
}

/// The human approval step: RISK → APPROVED.
fn approve_row(store: &SqliteRecordStore, row: RowNumber) -> Result<()> {
    let Some(handle) = store.handle_at(row)? else {
        bail!("no account at row {row}");
    };
    let record = store
        .account_at(row)?
        .with_context(|| format!("no account at row {row}"))?;
    if record.status != Some(AccountStatus::Risk) {
        bail!(
            "row {row} ({}) is {}, only RISK rows can be approved",
            record.company_name,
            record.status.map(|s| s.as_str()).unwrap_or("unclassified"),
        );
    }
    store.write_cell(&handle, Column::Status, AccountStatus::Approved.into())?;
    println!("approved row {row} ({})", record.company_name);
    Ok(())
}

fn print_summary(store: &SqliteRecordStore) -> Result<()> {
    let summary = StatusSummary::from_records(&store.read_all()?);

    println!("=== PORTFOLIO SUMMARY ===");
    println!("  accounts:     {}", summary.total);
    for status in AccountStatus::ALL {
        println!("  {:<13} {}", format!("{}:", status.as_str().to_lowercase()), summary.count(status));
    }
    println!("  unclassified: {}", summary.unclassified);

    println!();
    println!("=== PENDING REVIEW ===");
    if summary.pending.is_empty() {
        println!("  (No critical risks detected)");
    }
    for item in &summary.pending {
        println!(
            "  row {:>4} | {} | unanswered: {}{}",
            item.row,
            item.company_name,
            item.unanswered_outreach_count,
            if item.draft_failed { " | DRAFT FAILED" } else { "" },
        );
        println!("           {}", item.headline);
        if let Some(context) = store.risk_context_at(item.row)? {
            println!("           context: {}", serde_json::to_string(&context)?);
        }
    }
    Ok(())
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}
