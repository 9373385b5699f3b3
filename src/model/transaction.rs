use crate::model::amount::{Quantity, UsdAmount};
use crate::util::year_ext::GetYear;
use chrono::{DateTime, Datelike as _, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Copy, Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

/// The canonical transaction, produced by the normalizer for every source.
///
/// Transactions are immutable once created. Buys become purchase lots in the
/// [`LotLedger`](crate::basis::LotLedger) and sells become disposals.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Transaction {
    pub symbol: String,
    pub exchange: String,
    pub side: Side,
    pub time: DateTime<Utc>, // total order for processing
    pub price: UsdAmount,    // unit price, quote currency
    pub quantity: Quantity,  // asset units
    pub fee: UsdAmount,      // quote currency
    pub txn_id: String,      // not unique across exchanges
}

/// Enable consistency checks on years.
impl GetYear for Transaction {
    fn get_year(&self) -> i32 {
        self.time.year()
    }
}

impl Transaction {
    pub fn is_buy(&self) -> bool {
        self.side == Side::Buy
    }

    pub fn is_sell(&self) -> bool {
        self.side == Side::Sell
    }

    /// Gross value of the transaction, `price * quantity`.
    pub fn value(&self) -> UsdAmount {
        self.price.mul_quantity(self.quantity)
    }

    /// Cost basis of a buy: `price * quantity + fee`.
    pub fn cost_basis(&self) -> UsdAmount {
        self.value() + self.fee
    }

    /// Proceeds of a sell: `price * quantity - fee`.
    pub fn proceeds(&self) -> UsdAmount {
        self.value() - self.fee
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        })
    }
}

/// Sort transactions by timestamp.
///
/// The sort is stable, so transactions with equal timestamps keep their input order.
pub fn sort_by_time(txs: &mut [Transaction]) {
    txs.sort_by_key(|tx| tx.time);
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use tracing_test::traced_test;

    /// Build a transaction for tests. Time format is `%F %T`.
    pub(crate) fn tx(
        side: Side,
        time: &str,
        price: &str,
        quantity: &str,
        fee: &str,
    ) -> Transaction {
        Transaction {
            symbol: "BTCUSD".to_string(),
            exchange: "Test".to_string(),
            side,
            time: NaiveDateTime::parse_from_str(time, "%F %T")
                .unwrap()
                .and_utc(),
            price: price.parse().unwrap(),
            quantity: quantity.parse().unwrap(),
            fee: fee.parse().unwrap(),
            txn_id: format!("{side}-{time}"),
        }
    }

    #[test]
    #[traced_test]
    fn test_derived_values() {
        let buy = tx(Side::Buy, "2022-01-01 00:00:00", "40000", "0.5", "10");
        assert_eq!(buy.cost_basis(), "20010".parse().unwrap());

        let sell = tx(Side::Sell, "2022-02-01 00:00:00", "50000", "0.5", "10");
        assert_eq!(sell.proceeds(), "24990".parse().unwrap());
        assert_eq!(sell.get_year(), 2022);
    }

    #[test]
    #[traced_test]
    fn test_sort_is_stable() {
        let mut txs = vec![
            tx(Side::Sell, "2022-02-01 00:00:00", "1", "1", "0"),
            tx(Side::Buy, "2022-01-01 00:00:00", "1", "1", "0"),
            tx(Side::Buy, "2022-01-01 00:00:00", "2", "1", "0"),
        ];
        sort_by_time(&mut txs);

        assert!(txs[0].is_buy() && txs[0].price == "1".parse().unwrap());
        assert!(txs[1].is_buy() && txs[1].price == "2".parse().unwrap());
        assert!(txs[2].is_sell());
    }
}
