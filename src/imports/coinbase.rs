//! Coinbase Pro fills report.
//!
//! Columns: `portfolio,trade id,product,side,created at,size,size unit,price,fee,total,
//! price/fee/total unit`.

use super::{normalize, ImportError, KeyMapping, RawRecord};
use crate::model::transaction::Transaction;
use crate::model::Stats;
use std::path::Path;
use tracing::debug;

pub const EXCHANGE: &str = "Coinbase Pro";

const MAPPING: KeyMapping = KeyMapping {
    utc_time: "created at",
    symbol: "product",
    side: "side",
    price: "price",
    quantity: "size",
    txn_id: "trade id",
    fee: "fee",
};

pub fn read_fills(s: &mut Stats, path: impl AsRef<Path>) -> Result<Vec<Transaction>, ImportError> {
    let path = path.as_ref();
    let mut rows = Vec::new();
    let mut reader = csv::ReaderBuilder::new()
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_path(path)?;

    debug!("Parsing Coinbase Pro fills");
    for (index, result) in reader.deserialize().enumerate() {
        let record: RawRecord = result?;
        debug!("Deserialized: {record:?}");

        let tx = normalize(&record, &MAPPING, EXCHANGE, None).map_err(|source| {
            ImportError::Malformed {
                path: path.to_path_buf(),
                row: index + 1,
                source,
            }
        })?;
        debug!("Parsed: {tx:?}");

        rows.push(tx);
    }
    s.add_coinbase(rows.len());

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
    fn test_read_fills() {
        let mut stats = Stats::default();
        let txs = read_fills(&mut stats, "./fixtures/imports/coinbase-fills.csv").unwrap();

        assert_eq!(txs.len(), 3);
        assert!(txs.iter().all(|tx| tx.symbol == "BTCUSD"));
        assert!(txs.iter().all(|tx| tx.exchange == EXCHANGE));

        assert_eq!(txs[0].side, Side::Buy);
        assert_eq!(txs[0].txn_id, "12345678");
        assert_eq!(txs[0].quantity, "0.00032793".parse().unwrap());
        assert_eq!(txs[0].fee, "0.0656".parse().unwrap());
        assert_eq!(txs[0].time.to_string(), "2021-01-04 16:04:31.497 UTC");

        assert_eq!(txs[2].side, Side::Sell);
        assert!(logs_contain("Parsing Coinbase Pro fills"));
    }

    #[test]
    #[traced_test]
    fn test_read_fills_malformed() {
        let mut stats = Stats::default();
        let err = read_fills(&mut stats, "./fixtures/imports/coinbase-fills-malformed.csv")
            .unwrap_err();

        match err {
            ImportError::Malformed { row, source, .. } => {
                assert_eq!(row, 2);
                assert!(matches!(source, MalformedRecord::InvalidNumber { .. }));
            }
            err => panic!("Unexpected error: {err:?}"),
        }
    }
}
