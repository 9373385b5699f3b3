//! Strike annual transaction statement.
//!
//! Only `Trade` rows are transactions. Each trade swaps two currencies, and the sign of the BTC
//! leg gives the side.

use super::{normalize, ImportError, KeyMapping, MalformedRecord, RawRecord};
use crate::model::amount::Quantity;
use crate::model::transaction::{Side, Transaction};
use crate::model::Stats;
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

pub const EXCHANGE: &str = "Strike";
pub const TIME_FORMAT: &str = "%b %d %Y %H:%M:%S";

const MAPPING: KeyMapping = KeyMapping {
    utc_time: "Time (UTC)",
    symbol: "symbol",
    side: "side",
    price: "BTC Price",
    quantity: "quantity",
    txn_id: "Transaction ID",
    fee: "fee",
};

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct StrikeCSVRow {
    #[serde(rename = "Transaction ID")]
    pub(crate) txn_id: String,
    #[serde(rename = "Time (UTC)")]
    pub(crate) time: String,
    #[serde(rename = "Transaction Type")]
    pub(crate) tx_type: String,
    #[serde(rename = "Currency 1")]
    pub(crate) currency_1: String,
    #[serde(rename = "Amount 1")]
    pub(crate) amount_1: String,
    #[serde(rename = "Currency 2")]
    pub(crate) currency_2: String,
    #[serde(rename = "Amount 2")]
    pub(crate) amount_2: String,
    #[serde(rename = "BTC Price")]
    pub(crate) btc_price: String,
}

pub fn read_statement(
    s: &mut Stats,
    path: impl AsRef<Path>,
) -> Result<Vec<Transaction>, ImportError> {
    let path = path.as_ref();
    let mut rows = Vec::new();
    let mut reader = csv::ReaderBuilder::new()
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_path(path)?;

    debug!("Parsing Strike statement");
    for (index, result) in reader.deserialize().enumerate() {
        let record: StrikeCSVRow = result?;
        debug!("Deserialized: {record:?}");

        if record.tx_type != "Trade" {
            continue;
        }

        let tx = trade_parse(record).map_err(|source| ImportError::Malformed {
            path: path.to_path_buf(),
            row: index + 1,
            source,
        })?;
        debug!("Parsed: {tx:?}");

        rows.push(tx);
    }
    s.add_strike(rows.len());

    Ok(rows)
}

fn trade_parse(row: StrikeCSVRow) -> Result<Transaction, MalformedRecord> {
    let btc_amount = if row.currency_1 == "BTC" {
        &row.amount_1
    } else if row.currency_2 == "BTC" {
        &row.amount_2
    } else {
        return Err(MalformedRecord::MissingField("BTC amount".to_string()));
    };
    let btc: Quantity = btc_amount
        .trim()
        .parse()
        .map_err(|source| MalformedRecord::InvalidNumber {
            field: "BTC amount".to_string(),
            value: btc_amount.clone(),
            source,
        })?;
    let side = if btc.is_positive() {
        Side::Buy
    } else {
        Side::Sell
    };

    let record = RawRecord::from([
        (MAPPING.utc_time.to_string(), row.time),
        (MAPPING.symbol.to_string(), "BTCUSD".to_string()),
        (MAPPING.side.to_string(), side.to_string()),
        (MAPPING.price.to_string(), row.btc_price),
        (MAPPING.quantity.to_string(), btc.abs().to_string()),
        (MAPPING.txn_id.to_string(), row.txn_id),
        (MAPPING.fee.to_string(), "0".to_string()),
    ]);

    normalize(&record, &MAPPING, EXCHANGE, Some(TIME_FORMAT))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    #[traced_test]
    fn test_read_statement() {
        let mut stats = Stats::default();
        let txs = read_statement(&mut stats, "./fixtures/imports/strike-statement.csv").unwrap();

        // Deposits and withdrawals are skipped.
        assert_eq!(txs.len(), 2);

        assert_eq!(txs[0].side, Side::Buy);
        assert_eq!(txs[0].symbol, "BTCUSD");
        assert_eq!(txs[0].quantity, "0.00215731".parse().unwrap());
        assert_eq!(txs[0].price, "46352.27".parse().unwrap());
        assert_eq!(txs[0].time.to_string(), "2022-01-03 14:22:10 UTC");

        assert_eq!(txs[1].side, Side::Sell);
        assert_eq!(txs[1].quantity, "0.001".parse().unwrap());
        assert_eq!(txs[1].txn_id, "b7c9e4d2-3f3a-4e55-9d1c-6b7c1a2f0003");
    }

    #[test]
    #[traced_test]
    fn test_trade_without_btc() {
        let row = StrikeCSVRow {
            txn_id: "x".to_string(),
            time: "Jan 03 2022 14:22:10".to_string(),
            tx_type: "Trade".to_string(),
            currency_1: "USD".to_string(),
            amount_1: "-100".to_string(),
            currency_2: "EUR".to_string(),
            amount_2: "88".to_string(),
            btc_price: "46352.27".to_string(),
        };

        let err = trade_parse(row).unwrap_err();
        assert!(matches!(err, MalformedRecord::MissingField(_)));
    }
}
