#![forbid(unsafe_code)]

use error_iter::ErrorIter as _;
use fifocount::basis::LotLedger;
use fifocount::errors::MalformedRecord;
use fifocount::imports::{normalize, parse_quantity, KeyMapping, RawRecord};
use fifocount::model::{State, Transaction, UndisposedPurchase};
use onlyargs::{CliError, OnlyArgs as _};
use onlyargs_derive::OnlyArgs;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use thiserror::Error;

#[derive(Debug, Error)]
enum Error {
    #[error("CLI error")]
    Cli(#[from] CliError),

    #[error("CSV parsing error")]
    Csv(#[from] csv::Error),

    #[error("Malformed open purchase at row {0}")]
    Malformed(usize, #[source] MalformedRecord),

    #[error("Invalid open purchase")]
    Ledger(#[from] fifocount::errors::LedgerError),

    #[error("Checkpoint save error")]
    Checkpoint(#[from] fifocount::errors::CheckpointError),
}

/// Bootstrap fifocount by creating a checkpoint of open purchases.
#[derive(Debug, OnlyArgs)]
#[footer = "Bootstrap CSV columns:"]
#[footer = "  utc_time,exchange,symbol,txn_id,price,quantity,quantity_remaining,fee"]
#[footer = "  - utc_time is RFC 3339, e.g. \"2021-05-04T12:30:00Z\""]
#[footer = "  - quantity is the original purchase quantity, quantity_remaining is what is left"]
struct Args {
    /// Path to bootstrap CSV.
    input_bootstrap: PathBuf,

    /// Path for checkpoint file to create.
    output_checkpoint: PathBuf,
}

/// Bootstrap rows are purchases, so they go through the same checks as imported buys.
const MAPPING: KeyMapping = KeyMapping {
    utc_time: "utc_time",
    symbol: "symbol",
    side: "side",
    price: "price",
    quantity: "quantity",
    txn_id: "txn_id",
    fee: "fee",
};

#[derive(Debug, Deserialize)]
struct BootstrapCsvRow {
    utc_time: String,
    exchange: String,
    symbol: String,
    txn_id: String,
    price: String,
    quantity: String,
    quantity_remaining: String,
    fee: String,
}

fn main() -> ExitCode {
    match run() {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            if matches!(err, Error::Cli(_)) {
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

fn run() -> Result<(), Error> {
    let args: Args = onlyargs::parse()?;

    let open_purchases = read_csv(args.input_bootstrap)?
        .into_iter()
        .enumerate()
        .map(|(index, row)| create_open_purchase(row).map_err(|e| Error::Malformed(index + 1, e)))
        .collect::<Result<Vec<_>, _>>()?;

    // Reject lots that a later run would refuse to carry forward.
    let no_transactions = std::iter::empty::<&Transaction>();
    LotLedger::carry_forward(open_purchases.iter().cloned(), no_transactions)?;

    let count = open_purchases.len();
    State::new(open_purchases).save(&args.output_checkpoint)?;
    println!(
        "Wrote {count} open purchases to {}",
        args.output_checkpoint.display()
    );

    Ok(())
}

fn read_csv<P: AsRef<Path>>(path: P) -> Result<Vec<BootstrapCsvRow>, Error> {
    let mut reader = csv::ReaderBuilder::new()
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_path(path)?;
    let rows: Result<Vec<BootstrapCsvRow>, _> = reader.deserialize().collect();

    Ok(rows?)
}

fn create_open_purchase(row: BootstrapCsvRow) -> Result<UndisposedPurchase, MalformedRecord> {
    let raw: RawRecord = [
        ("utc_time", row.utc_time),
        ("symbol", row.symbol),
        ("side", "buy".to_string()),
        ("price", row.price),
        ("quantity", row.quantity),
        ("txn_id", row.txn_id),
        ("fee", row.fee),
    ]
    .into_iter()
    .map(|(key, value)| (key.to_string(), value))
    .collect();
    let purchase = normalize(&raw, &MAPPING, &row.exchange, None)?;
    let quantity_remaining = parse_quantity("quantity_remaining", &row.quantity_remaining)?;

    Ok(UndisposedPurchase {
        cost_basis: purchase.cost_basis(),
        symbol: purchase.symbol,
        exchange: purchase.exchange,
        time: purchase.time,
        txn_id: purchase.txn_id,
        price: purchase.price,
        quantity: purchase.quantity,
        quantity_remaining,
        fee: purchase.fee,
    })
}
