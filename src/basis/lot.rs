use crate::model::amount::{Quantity, UsdAmount};
use crate::model::records::UndisposedPurchase;
use crate::model::transaction::{Side, Transaction};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Index of a [`PurchaseLot`] in the ledger arena.
#[derive(Copy, Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct LotId(pub(crate) usize);

/// A buy transaction tracked with its remaining undisposed quantity.
///
/// Everything except `quantity_remaining` and `full_disposal` is fixed at creation. Lots are never
/// removed from the ledger; an exhausted lot is only marked with `full_disposal`.
#[derive(Clone, Debug)]
pub struct PurchaseLot {
    purchase: Transaction,
    cost_basis: UsdAmount,
    pub(crate) quantity_remaining: Quantity,
    pub(crate) full_disposal: bool,
}

impl PurchaseLot {
    /// Create a fresh lot from a buy transaction.
    pub(crate) fn from_purchase(purchase: Transaction) -> Self {
        debug_assert!(purchase.is_buy());

        Self {
            cost_basis: purchase.cost_basis(),
            quantity_remaining: purchase.quantity,
            full_disposal: purchase.quantity.is_zero(),
            purchase,
        }
    }

    /// Recreate a lot that was left open by a previous run.
    ///
    /// The original quantity, cost basis and fee are restored as recorded, so prorating against
    /// this lot gives the same answers it would have given in the earlier run.
    pub(crate) fn from_carried(carried: UndisposedPurchase) -> Self {
        let purchase = Transaction {
            symbol: carried.symbol,
            exchange: carried.exchange,
            side: Side::Buy,
            time: carried.time,
            price: carried.price,
            quantity: carried.quantity,
            fee: carried.fee,
            txn_id: carried.txn_id,
        };

        Self {
            purchase,
            cost_basis: carried.cost_basis,
            quantity_remaining: carried.quantity_remaining,
            full_disposal: carried.quantity_remaining.is_zero(),
        }
    }

    pub fn purchase(&self) -> &Transaction {
        &self.purchase
    }

    pub fn symbol(&self) -> &str {
        &self.purchase.symbol
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.purchase.time
    }

    /// Original quantity purchased.
    pub fn quantity(&self) -> Quantity {
        self.purchase.quantity
    }

    pub fn quantity_remaining(&self) -> Quantity {
        self.quantity_remaining
    }

    /// Quantity drawn from this lot so far, including draws made by earlier runs.
    pub fn quantity_disposed(&self) -> Quantity {
        self.purchase.quantity - self.quantity_remaining
    }

    /// Original cost basis of the whole lot.
    pub fn cost_basis(&self) -> UsdAmount {
        self.cost_basis
    }

    /// Original fee of the whole lot.
    pub fn fee(&self) -> UsdAmount {
        self.purchase.fee
    }

    pub fn full_disposal(&self) -> bool {
        self.full_disposal
    }

    pub fn is_available(&self) -> bool {
        self.quantity_remaining.is_positive()
    }

    /// Report this lot as an open position for carry-forward.
    pub(crate) fn to_undisposed(&self) -> UndisposedPurchase {
        UndisposedPurchase {
            symbol: self.purchase.symbol.clone(),
            exchange: self.purchase.exchange.clone(),
            time: self.purchase.time,
            txn_id: self.purchase.txn_id.clone(),
            price: self.purchase.price,
            quantity: self.purchase.quantity,
            quantity_remaining: self.quantity_remaining,
            cost_basis: self.cost_basis,
            fee: self.purchase.fee,
        }
    }
}
