#![forbid(unsafe_code)]

use chrono::Utc;
use error_iter::ErrorIter as _;
use fifocount::basis::{reconcile_fifo, ReviewList};
use fifocount::export::{transactions_file_name, write_outputs, write_transactions};
use fifocount::imports::{coinbase, manual, robinhood, strike};
use fifocount::model::{sort_by_time, State, Stats, Transaction};
use fifocount::util::year_ext::{retain_years, CheckYearsExt as _};
use is_terminal::IsTerminal as _;
use onlyargs::{CliError, OnlyArgs as _};
use onlyargs_derive::OnlyArgs;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::{env, num::ParseIntError, process::ExitCode};
use thiserror::Error;
use tracing::{debug, info, warn};
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::prelude::*;

#[derive(Debug, OnlyArgs)]
#[footer = "Additional environment variables:"]
#[footer = "  - RUST_LOG sets the log filter, e.g. `RUST_LOG=debug` to print every parsed row"]
#[footer = "      default is \"info\""]
#[footer = "  - TERM_COLOR accepts \"always\" to override automatic terminal sensing"]
struct Args {
    /// Read Coinbase Pro fills CSV from a file.
    #[long]
    input_coinbase: Vec<PathBuf>,

    /// Read Robinhood crypto orders JSON from a file.
    #[long]
    input_robinhood: Vec<PathBuf>,

    /// Read Strike annual statement CSV from a file.
    #[long]
    input_strike: Vec<PathBuf>,

    /// Read manual transactions CSV from a file.
    ///   Columns: utc_time,exchange,symbol,side,price,quantity,fee,txn_id
    ///
    #[long]
    input_manual: Vec<PathBuf>,

    /// Read checkpoint with open purchases from a previous run.
    #[long]
    input_checkpoint: Option<PathBuf>,

    /// Write checkpoint with open purchases for the next run.
    ///
    #[long]
    output_checkpoint: Option<PathBuf>,

    /// Write disposals, disposed purchases, open purchases, and the
    ///   normalized transaction list to this output directory.
    #[short('o')]
    output_path: Option<PathBuf>,

    /// Only reconcile transactions from this year.
    ///   May be given more than once. Purchases from earlier years
    ///   should be carried forward with a checkpoint.
    ///
    #[short('y')]
    year: Vec<String>,

    /// Enable verbose output.
    /// Prints the sums table even when written to a file.
    verbose: bool,
}

#[derive(Debug, Error)]
enum Error {
    #[error("Failed to import {0:?}")]
    Import(PathBuf, #[source] fifocount::errors::ImportError),

    #[error("Argument parsing error")]
    Args(#[from] CliError),

    #[error("I/O error")]
    Io(#[from] std::io::Error),

    #[error("Invalid year `{0}`")]
    Year(String, #[source] ParseIntError),

    #[error("Checkpoint error, unable to read {0:?}")]
    InputCheckpoint(PathBuf, #[source] Box<fifocount::errors::CheckpointError>),

    #[error("Checkpoint error, unable to write {0:?}")]
    OutputCheckpoint(PathBuf, #[source] Box<fifocount::errors::CheckpointError>),

    #[error("Reconciliation error")]
    Basis(#[from] fifocount::errors::BasisError),

    #[error("Unable to write outputs")]
    Export(#[from] fifocount::errors::ExportError),

    #[error("No input transactions or checkpoint were provided")]
    NoInput,
}

fn main() -> ExitCode {
    // Initialize the tracing subscriber for instrumentation.
    // Uses the `RUST_LOG` environment var for configuration. E.g. `RUST_LOG=debug cargo run`
    // This is very useful to see the input row that caused a malformed record error.
    //
    // See: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/struct.EnvFilter.html#directives
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    let term_color = env::var("TERM_COLOR")
        .map(|color| color == "always")
        .unwrap_or_else(|_| std::io::stdout().is_terminal());
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_ansi(term_color))
        .with(env_filter)
        .init();

    match run(onlyargs::parse()) {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            if matches!(err, Error::Args(_)) {
                eprintln!("{}", Args::HELP);
            }
            eprintln!("Error: {err}");
            for source in err.sources().skip(1) {
                eprintln!("  Caused by: {source}");
            }

            ExitCode::FAILURE
        }
    }
}

fn run(args: Result<Args, CliError>) -> Result<(), Error> {
    let args = args?;

    let years = args
        .year
        .iter()
        .map(|year| year.parse().map_err(|err| Error::Year(year.clone(), err)))
        .collect::<Result<BTreeSet<i32>, _>>()?;

    let mut stats = Stats::default();

    // Load state from checkpoint if a path is provided.
    let state = args
        .input_checkpoint
        .as_ref()
        .map(|path| {
            debug!("Loading checkpoint from {path:?}");

            State::load(path)
        })
        .transpose()
        .map_err(|e| {
            let path = args.input_checkpoint.clone().unwrap_or_default();
            Error::InputCheckpoint(path, Box::new(e))
        })?
        .unwrap_or_default();
    stats.add_carried(state.open_purchases.len());

    let mut transactions: Vec<Transaction> = Vec::new();
    for path in args.input_coinbase {
        let txs = coinbase::read_fills(&mut stats, &path).map_err(|e| Error::Import(path, e))?;
        transactions.extend(txs);
    }
    for path in args.input_robinhood {
        let txs =
            robinhood::read_orders(&mut stats, &path).map_err(|e| Error::Import(path, e))?;
        transactions.extend(txs);
    }
    for path in args.input_strike {
        let txs =
            strike::read_statement(&mut stats, &path).map_err(|e| Error::Import(path, e))?;
        transactions.extend(txs);
    }
    for path in args.input_manual {
        let txs =
            manual::read_transactions(&mut stats, &path).map_err(|e| Error::Import(path, e))?;
        transactions.extend(txs);
    }

    if transactions.is_empty() && state.open_purchases.is_empty() {
        return Err(Error::NoInput);
    }

    // Report and drop transactions outside of the requested years.
    if let Err(found) = transactions.check_years(&years) {
        warn!("Input data has multiple years: Expected {years:?}, found {found:?}");
    }
    stats.add_dropped(retain_years(&mut transactions, &years));

    sort_by_time(&mut transactions);
    for tx in &transactions {
        if tx.is_buy() {
            stats.inc_buys();
        } else {
            stats.inc_sells();
        }
    }

    info!(
        "Reconciling {} transactions with {} carried-forward lots",
        transactions.len(),
        state.open_purchases.len(),
    );
    let reconciliation = reconcile_fifo(transactions.clone(), state.open_purchases)?;

    // Nothing is written until reconciliation has succeeded.
    let today = Utc::now().date_naive();
    if let Some(dir) = args.output_path.as_ref() {
        std::fs::create_dir_all(dir)?;

        let path = dir.join(transactions_file_name(today));
        write_transactions(&path, &transactions)?;
        println!("Normalized transactions written to {}", path.display());
    }

    println!("{}", ReviewList::new(&reconciliation));
    if let Some(record) = reconciliation.first_review_required() {
        println!(
            "First disposal requiring review: `{}` at {}",
            record.sale.txn_id, record.sale.time,
        );
        println!();
    }

    let sums = reconciliation.sums();
    if let Some(dir) = args.output_path.as_ref() {
        let paths = write_outputs(dir, today, &reconciliation)?;

        for path in [
            &paths.disposals,
            &paths.disposed_purchases,
            &paths.open_purchases,
        ] {
            println!("Written to {}", path.display());
        }
        println!();
    }
    if args.output_path.is_none() || args.verbose {
        println!("Disposal Sums");
        println!("======== ====");
        println!();
        println!("{sums}");
    }

    if let Some(path) = args.output_checkpoint {
        debug!("Writing checkpoint to {path:?}");

        reconciliation
            .checkpoint()
            .save(&path)
            .map_err(|e| Error::OutputCheckpoint(path, Box::new(e)))?;
    }

    stats.pretty_print();

    Ok(())
}
