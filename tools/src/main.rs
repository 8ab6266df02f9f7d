//! settlement-runner: normalizes partner settlement files and appends new
//! rows to the ledger spreadsheet.
//!
//! Usage:
//!   settlement-runner --sheet-url <URL> 2024-05_뮤직앤뉴.xls 2024-05_미러볼뮤직.xlsx
//!   settlement-runner --ledger-db ledger.db --sheet-url <URL> files...
//!   settlement-runner --dry-run files...
//!   settlement-runner --dump-config ./data

use anyhow::{bail, Context, Result};
use clap::Parser;
use settlement_core::{
    batch::{BatchOutcome, BatchProcessor, FileStage, FileStatus, ProgressSink},
    config::{IngestConfig, DEFAULT_WORKSHEET},
    decode::UploadedFile,
    error::SettlementError,
    ledger::{extract_spreadsheet_id, sync_to_ledger, SpreadsheetService},
    record::CanonicalField,
    sheets_api::GoogleSheetsService,
    store::SqliteLedger,
};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "settlement-runner")]
#[command(about = "Normalize partner settlement files and append them to the ledger")]
#[command(version)]
struct Args {
    /// Settlement files named YYYY-MM_<partner>[ (N)].xls|.xlsx
    files: Vec<PathBuf>,

    /// Ledger spreadsheet URL (must contain /spreadsheets/d/<ID>/)
    #[arg(long, env = "SETTLEMENT_SHEET_URL")]
    sheet_url: Option<String>,

    /// Worksheet holding the ledger rows
    #[arg(long, default_value = DEFAULT_WORKSHEET, env = "SETTLEMENT_WORKSHEET")]
    worksheet: String,

    /// Directory with JSON overrides for partner profiles and alias tables
    #[arg(long, env = "SETTLEMENT_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Use a local SQLite ledger instead of Google Sheets
    #[arg(long)]
    ledger_db: Option<String>,

    /// OAuth bearer token for the Google Sheets API
    #[arg(long, env = "GOOGLE_SHEETS_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    /// Normalize and print the table without touching the ledger
    #[arg(long)]
    dry_run: bool,

    /// Write the effective configuration as a data directory and exit
    #[arg(long, value_name = "DIR")]
    dump_config: Option<PathBuf>,
}

struct ConsoleProgress;

impl ProgressSink for ConsoleProgress {
    fn message(&mut self, file_name: &str, message: &str) {
        println!("  [{file_name}] {message}");
    }

    fn rejected(&mut self, file_name: &str, at: FileStage, error: &SettlementError) {
        eprintln!("  [{file_name}] SKIPPED at {at:?}: {error}");
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.data_dir {
        Some(dir) => IngestConfig::load(dir)
            .with_context(|| format!("loading configuration from {}", dir.display()))?,
        None => {
            log::info!("no --data-dir given; using built-in profiles and aliases");
            IngestConfig::builtin()
        }
    };

    if let Some(dir) = &args.dump_config {
        return dump_config(&config, dir);
    }

    if args.files.is_empty() {
        bail!("no settlement files given");
    }
    let sheet_url = match (&args.sheet_url, args.dry_run) {
        (Some(url), _) => Some(url.as_str()),
        (None, true) => None,
        (None, false) => bail!("--sheet-url is required unless --dry-run is set"),
    };

    let files = args
        .files
        .iter()
        .map(|path| {
            UploadedFile::from_path(path).with_context(|| format!("reading {}", path.display()))
        })
        .collect::<Result<Vec<_>>>()?;

    println!("settlement-runner");
    println!("  files:     {}", files.len());
    println!("  worksheet: {}", args.worksheet);
    println!();

    let mut outcome = BatchProcessor::new(&config)
        .process(&files, &mut ConsoleProgress)
        .context("processing settlement files")?;

    match sheet_url {
        Some(url) if !args.dry_run => {
            let service = open_service(&args, url)?;
            let report = sync_to_ledger(&outcome.table, service.as_ref(), url, &args.worksheet)
                .context("appending to ledger")?;
            outcome.mark_appended();
            println!();
            if report.appended > 0 {
                println!("{} new rows appended", report.appended);
            } else {
                println!("no new rows to append");
            }
        }
        _ => print_table(&outcome),
    }

    print_summary(&outcome);
    Ok(())
}

fn open_service(args: &Args, sheet_url: &str) -> Result<Box<dyn SpreadsheetService>> {
    if let Some(path) = &args.ledger_db {
        let ledger = SqliteLedger::open(path).with_context(|| format!("opening ledger {path}"))?;
        ledger.migrate()?;
        // A fresh local ledger gets the spreadsheet and worksheet on first use.
        let spreadsheet_id = extract_spreadsheet_id(sheet_url)?;
        ledger.create_spreadsheet(&spreadsheet_id, &spreadsheet_id)?;
        ledger.add_worksheet(&spreadsheet_id, &args.worksheet)?;
        return Ok(Box::new(ledger));
    }
    let Some(token) = &args.access_token else {
        bail!("--access-token (or GOOGLE_SHEETS_ACCESS_TOKEN) is required for Google Sheets");
    };
    Ok(Box::new(GoogleSheetsService::new(token.clone())))
}

fn dump_config(config: &IngestConfig, dir: &std::path::Path) -> Result<()> {
    for (relative, json) in config.to_files()? {
        let path = dir.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        std::fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
        println!("wrote {}", path.display());
    }
    Ok(())
}

fn print_table(outcome: &BatchOutcome) {
    println!();
    println!("{}", CanonicalField::headers().join("\t"));
    for row in outcome.table.rows() {
        let cells: Vec<String> = row.iter().map(|c| c.render()).collect();
        println!("{}", cells.join("\t"));
    }
}

fn print_summary(outcome: &BatchOutcome) {
    println!();
    println!("=== RUN SUMMARY ===");
    for report in &outcome.reports {
        match &report.status {
            FileStatus::Normalized { rows } => {
                println!("  {:<40} normalized ({rows} rows)", report.file_name)
            }
            FileStatus::Appended { rows } => {
                println!("  {:<40} appended ({rows} rows)", report.file_name)
            }
            FileStatus::Rejected { at, reason } => {
                println!("  {:<40} rejected at {at:?}: {reason}", report.file_name)
            }
        }
    }
    println!("  total rows: {}", outcome.table.len());
    println!("  rejected:   {}", outcome.rejected().count());
}
