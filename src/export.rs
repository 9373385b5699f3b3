//! Output files for a reconciliation run.

use crate::basis::Reconciliation;
use crate::model::transaction::Transaction;
use chrono::NaiveDate;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write as _};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error writing `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("JSON error writing `{0}`")]
    Json(PathBuf, #[source] serde_json::Error),

    #[error("CSV error")]
    Csv(#[from] csv::Error),
}

/// Paths of the files written by [`write_outputs`].
#[derive(Debug)]
pub struct OutputPaths {
    pub disposals: PathBuf,
    pub disposed_purchases: PathBuf,
    pub open_purchases: PathBuf,
}

impl OutputPaths {
    pub fn new(dir: impl AsRef<Path>, date: NaiveDate) -> Self {
        let dir = dir.as_ref();
        let date = date.format("%Y-%m-%d");

        Self {
            disposals: dir.join(format!("disposals_{date}.json")),
            disposed_purchases: dir.join(format!("disposed_purchases_{date}.json")),
            open_purchases: dir.join(format!("open_purchases_{date}.json")),
        }
    }
}

/// Write the three output sets as pretty-printed JSON files into `dir`, named by `date`.
pub fn write_outputs(
    dir: impl AsRef<Path>,
    date: NaiveDate,
    reconciliation: &Reconciliation,
) -> Result<OutputPaths, ExportError> {
    let paths = OutputPaths::new(dir, date);

    write_json(&paths.disposals, &reconciliation.disposals)?;
    write_json(&paths.disposed_purchases, &reconciliation.disposed_purchases)?;
    write_json(&paths.open_purchases, &reconciliation.undisposed_purchases)?;

    Ok(paths)
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), ExportError> {
    let io_err = |err| ExportError::Io(path.to_path_buf(), err);

    let mut writer = BufWriter::new(File::create(path).map_err(io_err)?);
    serde_json::to_writer_pretty(&mut writer, value)
        .map_err(|err| ExportError::Json(path.to_path_buf(), err))?;
    writer.write_all(b"\n").map_err(io_err)?;
    writer.flush().map_err(io_err)?;
    info!("Wrote `{}`", path.display());

    Ok(())
}

/// The normalized transaction list file name for `date`.
pub fn transactions_file_name(date: NaiveDate) -> String {
    format!("tax_info_{}.csv", date.format("%Y-%m-%d"))
}

#[derive(Debug, Serialize)]
struct TransactionCSVRow<'a> {
    utc_time: String,
    exchange: &'a str,
    symbol: &'a str,
    side: String,
    price: String,
    quantity: String,
    fee: String,
    txn_id: &'a str,
}

impl<'a> From<&'a Transaction> for TransactionCSVRow<'a> {
    fn from(tx: &'a Transaction) -> Self {
        Self {
            utc_time: tx.time.format("%F %T%.f").to_string(),
            exchange: &tx.exchange,
            symbol: &tx.symbol,
            side: tx.side.to_string(),
            price: tx.price.to_string(),
            quantity: tx.quantity.to_string(),
            fee: tx.fee.to_string(),
            txn_id: &tx.txn_id,
        }
    }
}

/// Write normalized transactions as CSV, in the layout read by
/// [`crate::imports::manual::read_transactions`].
pub fn write_transactions(
    path: impl AsRef<Path>,
    transactions: &[Transaction],
) -> Result<(), ExportError> {
    let path = path.as_ref();
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Necessary)
        .from_path(path)?;
    for tx in transactions {
        writer.serialize(TransactionCSVRow::from(tx))?;
    }
    writer
        .flush()
        .map_err(|err| ExportError::Io(path.to_path_buf(), err))?;
    info!("Wrote `{}`", path.display());

    Ok(())
}
