//! Manually authored transactions in the canonical column layout:
//! `utc_time,exchange,symbol,side,price,quantity,fee,txn_id`.
//!
//! This is also the layout written by [`crate::export::write_transactions`], so an exported
//! transaction list can be fed back in.

use super::{normalize, ImportError, KeyMapping, RawRecord};
use crate::model::transaction::Transaction;
use crate::model::Stats;
use std::path::Path;
use tracing::debug;

pub const EXCHANGE: &str = "Manual";

pub(crate) const MAPPING: KeyMapping = KeyMapping {
    utc_time: "utc_time",
    symbol: "symbol",
    side: "side",
    price: "price",
    quantity: "quantity",
    txn_id: "txn_id",
    fee: "fee",
};

pub fn read_transactions(
    s: &mut Stats,
    path: impl AsRef<Path>,
) -> Result<Vec<Transaction>, ImportError> {
    let path = path.as_ref();
    let mut rows = Vec::new();
    let mut reader = csv::ReaderBuilder::new()
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_path(path)?;

    debug!("Parsing manual transactions");
    for (index, result) in reader.deserialize().enumerate() {
        let record: RawRecord = result?;
        debug!("Deserialized: {record:?}");

        let exchange = record
            .get("exchange")
            .map(String::as_str)
            .filter(|exchange| !exchange.is_empty())
            .unwrap_or(EXCHANGE);

        let tx = normalize(&record, &MAPPING, exchange, None).map_err(|source| {
            ImportError::Malformed {
                path: path.to_path_buf(),
                row: index + 1,
                source,
            }
        })?;
        debug!("Parsed: {tx:?}");

        rows.push(tx);
    }
    s.add_manual(rows.len());

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imports::MalformedRecord;
    use crate::model::transaction::Side;
    use tracing_test::traced_test;

    #[test]
    #[traced_test]
    fn test_read_transactions() {
        let mut stats = Stats::default();
        let txs = read_transactions(&mut stats, "./fixtures/imports/manual.csv").unwrap();

        assert_eq!(txs.len(), 3);
        assert_eq!(txs[0].exchange, "Cold Storage");
        assert_eq!(txs[0].side, Side::Buy);
        assert_eq!(txs[0].fee, "1.25".parse().unwrap());

        // Missing exchange, fee and txn_id fall back to defaults.
        assert_eq!(txs[1].exchange, EXCHANGE);
        assert!(txs[1].fee.is_zero());
        assert_eq!(txs[1].txn_id, "");

        // Zero-quantity sells are accepted.
        assert_eq!(txs[2].side, Side::Sell);
        assert!(txs[2].quantity.is_zero());
    }

    #[test]
    #[traced_test]
    fn test_read_transactions_rejects_negative() {
        let mut stats = Stats::default();
        let err = read_transactions(&mut stats, "./fixtures/imports/manual-negative.csv")
            .unwrap_err();

        assert!(matches!(
            err,
            ImportError::Malformed {
                row: 1,
                source: MalformedRecord::Negative { .. },
                ..
            }
        ));
    }
}
