//! Source adapters and the normalizer that turns their records into canonical transactions.

use crate::model::amount::{ParseAmountError, Quantity, UsdAmount};
use crate::model::transaction::{Side, Transaction};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

pub mod coinbase;
pub mod manual;
pub mod robinhood;
pub mod strike;

/// One source row, keyed by the source's own column names.
pub type RawRecord = BTreeMap<String, String>;

#[derive(Debug, Error)]
pub enum MalformedRecord {
    #[error("Missing required field `{0}`")]
    MissingField(String),

    #[error("Invalid number in field `{field}`: `{value}`")]
    InvalidNumber {
        field: String,
        value: String,
        #[source]
        source: ParseAmountError,
    },

    #[error("Negative value in field `{field}`: `{value}`")]
    Negative { field: String, value: String },

    #[error("Invalid side in field `{field}`: `{value}`, expected `buy` or `sell`")]
    InvalidSide { field: String, value: String },

    #[error("Invalid timestamp in field `{field}`: `{value}`")]
    InvalidTimestamp {
        field: String,
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("Buy quantity must be greater than zero in field `{field}`: `{value}`")]
    NonPositiveQuantity { field: String, value: String },

    #[error("Transaction value out of range in field `{field}`: `{value}`")]
    Overflow { field: String, value: String },
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("CSV Error")]
    Csv(#[from] csv::Error),

    #[error("JSON Error")]
    Json(#[from] serde_json::Error),

    #[error("FS Error")]
    Fs(#[from] std::io::Error),

    #[error("Malformed record at row {row} of `{path}`")]
    Malformed {
        path: PathBuf,
        row: usize,
        #[source]
        source: MalformedRecord,
    },
}

/// Maps canonical field names to a source's column names.
#[derive(Copy, Clone, Debug)]
pub struct KeyMapping {
    pub utc_time: &'static str,
    pub symbol: &'static str,
    pub side: &'static str,
    pub price: &'static str,
    pub quantity: &'static str,
    pub txn_id: &'static str,
    pub fee: &'static str,
}

/// Timestamp formats tried, in order, when a source does not name its own.
const FALLBACK_TIME_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.fZ", "%F %T%.f", "%FT%T%.f"];

/// Convert a raw source record into a canonical [`Transaction`].
///
/// Missing `fee` defaults to zero and missing `txn_id` defaults to empty. Every other field is
/// required. Empty values count as missing.
///
/// When `time_format` is `None`, RFC 3339 (with any offset, converted to UTC) is tried first,
/// followed by a few common naive UTC formats.
pub fn normalize(
    raw: &RawRecord,
    mapping: &KeyMapping,
    exchange: &str,
    time_format: Option<&str>,
) -> Result<Transaction, MalformedRecord> {
    let time = parse_time(mapping.utc_time, required(raw, mapping.utc_time)?, time_format)?;
    let symbol = normalize_symbol(required(raw, mapping.symbol)?);
    let side = parse_side(mapping.side, required(raw, mapping.side)?)?;
    let price: UsdAmount = parse_amount(mapping.price, required(raw, mapping.price)?)?;
    let quantity: Quantity = parse_amount(mapping.quantity, required(raw, mapping.quantity)?)?;
    let fee: UsdAmount = optional(raw, mapping.fee)
        .map(|value| parse_amount(mapping.fee, value))
        .transpose()?
        .unwrap_or_default();
    let txn_id = optional(raw, mapping.txn_id).unwrap_or_default().to_string();

    // Zero-quantity sells are degenerate but valid. A zero-quantity buy can never be drawn from.
    if side == Side::Buy && quantity.is_zero() {
        return Err(MalformedRecord::NonPositiveQuantity {
            field: mapping.quantity.to_string(),
            value: quantity.to_string(),
        });
    }

    // Cost basis and proceeds are derived from these later and must be representable.
    let total = price.checked_mul_quantity(quantity).and_then(|value| match side {
        Side::Buy => value.checked_add(fee),
        Side::Sell => value.checked_sub(fee),
    });
    if total.is_none() {
        return Err(MalformedRecord::Overflow {
            field: mapping.price.to_string(),
            value: price.to_string(),
        });
    }

    Ok(Transaction {
        symbol,
        exchange: exchange.to_string(),
        side,
        time,
        price,
        quantity,
        fee,
        txn_id,
    })
}

/// Normalize a trading pair so the same pair matches across exchanges, e.g. `BTC-USD` becomes
/// `BTCUSD`.
pub fn normalize_symbol(symbol: &str) -> String {
    symbol
        .chars()
        .filter(|ch| !matches!(ch, '-' | '/'))
        .flat_map(char::to_uppercase)
        .collect()
}

fn optional<'a>(raw: &'a RawRecord, key: &str) -> Option<&'a str> {
    raw.get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

fn required<'a>(raw: &'a RawRecord, key: &str) -> Result<&'a str, MalformedRecord> {
    optional(raw, key).ok_or_else(|| MalformedRecord::MissingField(key.to_string()))
}

fn parse_amount<T>(field: &str, value: &str) -> Result<T, MalformedRecord>
where
    T: std::str::FromStr<Err = ParseAmountError> + Copy + IsNegative,
{
    let amount: T = value
        .parse()
        .map_err(|source| MalformedRecord::InvalidNumber {
            field: field.to_string(),
            value: value.to_string(),
            source,
        })?;

    if amount.is_negative_amount() {
        return Err(MalformedRecord::Negative {
            field: field.to_string(),
            value: value.to_string(),
        });
    }

    Ok(amount)
}

/// Parse a non-negative asset quantity from `field`.
pub fn parse_quantity(field: &str, value: &str) -> Result<Quantity, MalformedRecord> {
    parse_amount(field, value)
}

/// Sign check shared by the amount newtypes for generic parsing.
trait IsNegative {
    fn is_negative_amount(self) -> bool;
}

impl IsNegative for Quantity {
    fn is_negative_amount(self) -> bool {
        self.is_negative()
    }
}

impl IsNegative for UsdAmount {
    fn is_negative_amount(self) -> bool {
        self.is_negative()
    }
}

fn parse_side(field: &str, value: &str) -> Result<Side, MalformedRecord> {
    if value.eq_ignore_ascii_case("buy") {
        Ok(Side::Buy)
    } else if value.eq_ignore_ascii_case("sell") {
        Ok(Side::Sell)
    } else {
        Err(MalformedRecord::InvalidSide {
            field: field.to_string(),
            value: value.to_string(),
        })
    }
}

fn parse_time(
    field: &str,
    value: &str,
    time_format: Option<&str>,
) -> Result<DateTime<Utc>, MalformedRecord> {
    let invalid = |source| MalformedRecord::InvalidTimestamp {
        field: field.to_string(),
        value: value.to_string(),
        source,
    };

    if let Some(format) = time_format {
        return NaiveDateTime::parse_from_str(value, format)
            .map(|time| time.and_utc())
            .map_err(invalid);
    }

    let mut last_err = match DateTime::parse_from_rfc3339(value) {
        Ok(time) => return Ok(time.with_timezone(&Utc)),
        Err(err) => err,
    };
    for format in FALLBACK_TIME_FORMATS {
        match NaiveDateTime::parse_from_str(value, format) {
            Ok(time) => return Ok(time.and_utc()),
            Err(err) => last_err = err,
        }
    }

    Err(invalid(last_err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    const MAPPING: KeyMapping = KeyMapping {
        utc_time: "time",
        symbol: "pair",
        side: "type",
        price: "price",
        quantity: "size",
        txn_id: "id",
        fee: "fee",
    };

    fn raw(fields: &[(&str, &str)]) -> RawRecord {
        fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn complete() -> RawRecord {
        raw(&[
            ("time", "2021-03-04T05:06:07.123Z"),
            ("pair", "btc-usd"),
            ("type", "SELL"),
            ("price", "50000.5"),
            ("size", "5.161e-05"),
            ("id", "abc"),
            ("fee", "0.25"),
        ])
    }

    #[test]
    #[traced_test]
    fn test_normalize() {
        let tx = normalize(&complete(), &MAPPING, "Coinbase Pro", None).unwrap();

        assert_eq!(tx.symbol, "BTCUSD");
        assert_eq!(tx.exchange, "Coinbase Pro");
        assert_eq!(tx.side, Side::Sell);
        assert_eq!(tx.time.to_rfc3339(), "2021-03-04T05:06:07.123+00:00");
        assert_eq!(tx.price, "50000.5".parse().unwrap());
        assert_eq!(tx.quantity, "0.00005161".parse().unwrap());
        assert_eq!(tx.fee, "0.25".parse().unwrap());
        assert_eq!(tx.txn_id, "abc");
    }

    #[test]
    #[traced_test]
    fn test_normalize_defaults() {
        let mut record = complete();
        record.remove("fee");
        record.insert("id".to_string(), "".to_string());

        let tx = normalize(&record, &MAPPING, "Test", None).unwrap();
        assert_eq!(tx.fee, UsdAmount::ZERO);
        assert_eq!(tx.txn_id, "");
    }

    #[test]
    #[traced_test]
    fn test_normalize_time_formats() {
        let cases = [
            ("2021-03-04T00:06:07-05:00", "2021-03-04 05:06:07 UTC"),
            ("2021-03-04 05:06:07", "2021-03-04 05:06:07 UTC"),
            ("2021-03-04T05:06:07.5", "2021-03-04 05:06:07.500 UTC"),
        ];
        for (input, expected) in cases {
            let mut record = complete();
            record.insert("time".to_string(), input.to_string());

            let tx = normalize(&record, &MAPPING, "Test", None).unwrap();
            assert_eq!(tx.time.to_string(), expected);
        }

        let mut record = complete();
        record.insert("time".to_string(), "Mar 04 2021 05:06:07".to_string());
        let tx = normalize(&record, &MAPPING, "Test", Some("%b %d %Y %H:%M:%S")).unwrap();
        assert_eq!(tx.time.to_string(), "2021-03-04 05:06:07 UTC");
    }

    #[test]
    #[traced_test]
    fn test_normalize_rejects_malformed() {
        let cases: [(&str, &str, fn(&MalformedRecord) -> bool); 10] = [
            ("time", "", |err| matches!(err, MalformedRecord::MissingField(f) if f == "time")),
            ("pair", "", |err| matches!(err, MalformedRecord::MissingField(f) if f == "pair")),
            ("type", " ", |err| matches!(err, MalformedRecord::MissingField(f) if f == "type")),
            ("price", "", |err| {
                matches!(err, MalformedRecord::MissingField(f) if f == "price")
            }),
            ("size", "", |err| matches!(err, MalformedRecord::MissingField(f) if f == "size")),
            ("price", "ten", |err| {
                matches!(err, MalformedRecord::InvalidNumber { .. })
            }),
            ("size", "-1", |err| matches!(err, MalformedRecord::Negative { .. })),
            ("fee", "-0.01", |err| matches!(err, MalformedRecord::Negative { .. })),
            ("type", "short", |err| {
                matches!(err, MalformedRecord::InvalidSide { .. })
            }),
            ("time", "yesterday", |err| {
                matches!(err, MalformedRecord::InvalidTimestamp { .. })
            }),
        ];

        for (field, value, check) in cases {
            let mut record = complete();
            record.insert(field.to_string(), value.to_string());

            let err = normalize(&record, &MAPPING, "Test", None).unwrap_err();
            assert!(check(&err), "{field}={value:?} gave {err:?}");
        }
    }

    #[test]
    #[traced_test]
    fn test_normalize_zero_quantity() {
        let mut record = complete();
        record.insert("size".to_string(), "0".to_string());
        let tx = normalize(&record, &MAPPING, "Test", None).unwrap();
        assert!(tx.quantity.is_zero());

        record.insert("type".to_string(), "buy".to_string());
        let err = normalize(&record, &MAPPING, "Test", None).unwrap_err();
        assert!(matches!(err, MalformedRecord::NonPositiveQuantity { .. }));
    }

    #[test]
    #[traced_test]
    fn test_normalize_missing_column() {
        for field in ["time", "pair", "type", "price", "size"] {
            let mut record = complete();
            record.remove(field);

            let err = normalize(&record, &MAPPING, "Test", None).unwrap_err();
            assert!(
                matches!(&err, MalformedRecord::MissingField(f) if f == field),
                "{field} gave {err:?}"
            );
        }
    }

    #[test]
    #[traced_test]
    fn test_normalize_rejects_overflowing_value() {
        let max = "79228162514264337593543950335";

        let mut record = complete();
        record.insert("type".to_string(), "buy".to_string());
        record.insert("price".to_string(), max.to_string());
        record.insert("size".to_string(), "2".to_string());
        let err = normalize(&record, &MAPPING, "Test", None).unwrap_err();
        assert!(matches!(err, MalformedRecord::Overflow { ref field, .. } if field == "price"));

        // The product fits, but adding the fee does not.
        record.insert("size".to_string(), "1".to_string());
        record.insert("fee".to_string(), "1".to_string());
        let err = normalize(&record, &MAPPING, "Test", None).unwrap_err();
        assert!(matches!(err, MalformedRecord::Overflow { .. }));

        // Nothing downstream panics on the largest accepted buy.
        record.insert("fee".to_string(), "0".to_string());
        let buy = normalize(&record, &MAPPING, "Test", None).unwrap();
        let reconciliation = crate::basis::reconcile_fifo(vec![buy], vec![]).unwrap();
        assert_eq!(reconciliation.undisposed_purchases.len(), 1);
    }

    #[test]
    #[traced_test]
    fn test_normalize_symbol() {
        assert_eq!(normalize_symbol("BTC-USD"), "BTCUSD");
        assert_eq!(normalize_symbol("eth/usd"), "ETHUSD");
        assert_eq!(normalize_symbol("BTCUSD"), "BTCUSD");
    }
}
