use bankledger::application::Bank;
use bankledger::config::LedgerConfig;
use bankledger::domain::ports::LedgerStoreRef;
use bankledger::infrastructure::clock::SystemClock;
use bankledger::infrastructure::in_memory::{InMemoryCache, InMemoryLedgerStore};
#[cfg(feature = "storage-rocksdb")]
use bankledger::infrastructure::rocksdb::RocksDBStore;
use bankledger::interfaces::csv::account_writer::AccountWriter;
use bankledger::interfaces::csv::batch::BatchRunner;
use bankledger::interfaces::csv::command_reader::CommandReader;
use bankledger::logging::init_logging;
use clap::{Parser, ValueEnum};
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Report {
    /// Final balances of every account the batch touched, as CSV
    Accounts,
    /// Bank-wide totals, as JSON
    Statistics,
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input commands CSV file
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// JSON file overriding the default limits
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = Report::Accounts)]
    report: Report,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[arg(long)]
    log_json: bool,
}

#[cfg(feature = "storage-rocksdb")]
fn open_store(db_path: Option<&Path>) -> Result<LedgerStoreRef> {
    match db_path {
        Some(path) => {
            let store = RocksDBStore::open(path).into_diagnostic()?;
            info!(path = %path.display(), "using RocksDB ledger");
            Ok(Arc::new(store))
        }
        None => Ok(Arc::new(InMemoryLedgerStore::new())),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_store(db_path: Option<&Path>) -> Result<LedgerStoreRef> {
    if db_path.is_some() {
        eprintln!(
            "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
        );
    }
    info!("using in-memory ledger");
    Ok(Arc::new(InMemoryLedgerStore::new()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_json);

    let config = match &cli.config {
        Some(path) => LedgerConfig::load(path).into_diagnostic()?,
        None => LedgerConfig::default(),
    };
    let store = open_store(cli.db_path.as_deref())?;
    let bank = Bank::new(
        store,
        Arc::new(InMemoryCache::new()),
        Arc::new(SystemClock),
        config,
    );

    let file = File::open(&cli.input).into_diagnostic()?;
    let mut runner = BatchRunner::new(bank.clone());
    for (index, command) in CommandReader::new(file).commands().enumerate() {
        // Line 1 is the header.
        let line = index + 2;
        let outcome = match command {
            Ok(command) => runner.apply(command).await,
            Err(e) => Err(e),
        };
        if let Err(e) = outcome {
            warn!(line, error = %e, "command rejected");
        }
    }

    match cli.report {
        Report::Accounts => {
            let rows = runner.account_rows().await.into_diagnostic()?;
            let stdout = io::stdout();
            let mut writer = AccountWriter::new(stdout.lock());
            writer.write_accounts(rows).into_diagnostic()?;
        }
        Report::Statistics => {
            let stats = bank.reporting.bank_statistics().await.into_diagnostic()?;
            let json = serde_json::to_string_pretty(&stats).into_diagnostic()?;
            println!("{json}");
        }
    }

    Ok(())
}
