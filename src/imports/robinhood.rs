//! Robinhood crypto order history, as a JSON array of order objects.
//!
//! Only filled orders are transactions. Robinhood reports no separate fee, and `created_at`
//! carries a timezone offset which is converted to UTC.

use super::{normalize, ImportError, KeyMapping, RawRecord};
use crate::model::transaction::Transaction;
use crate::model::Stats;
use serde_json::{Map, Value};
use std::path::Path;
use tracing::debug;

pub const EXCHANGE: &str = "Robinhood";

const MAPPING: KeyMapping = KeyMapping {
    utc_time: "created_at",
    symbol: "symbol",
    side: "side",
    price: "price",
    quantity: "quantity",
    txn_id: "id",
    fee: "fee",
};

pub fn read_orders(s: &mut Stats, path: impl AsRef<Path>) -> Result<Vec<Transaction>, ImportError> {
    let path = path.as_ref();
    let orders: Vec<Map<String, Value>> = serde_json::from_reader(std::fs::File::open(path)?)?;

    debug!("Parsing Robinhood orders");
    let mut rows = Vec::new();
    for (index, order) in orders.into_iter().enumerate() {
        let mut record = to_raw_record(order);
        debug!("Deserialized: {record:?}");

        if record.get("state").map(String::as_str) != Some("filled") {
            debug!("Skipping unfilled order");
            continue;
        }
        record.insert(MAPPING.fee.to_string(), "0".to_string());

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
    s.add_robinhood(rows.len());

    Ok(rows)
}

/// Flatten the scalar fields of a JSON object into strings. Nulls and nested values are dropped.
fn to_raw_record(order: Map<String, Value>) -> RawRecord {
    order
        .into_iter()
        .filter_map(|(key, value)| match value {
            Value::String(s) => Some((key, s)),
            Value::Number(n) => Some((key, n.to_string())),
            Value::Bool(b) => Some((key, b.to_string())),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        })
        .collect()
}
