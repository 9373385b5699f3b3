//! Output record shapes produced by reconciliation.

use crate::model::amount::{Quantity, UsdAmount};
use crate::model::transaction::Transaction;
use crate::util::year_ext::GetYear;
use chrono::{DateTime, Datelike as _, Utc};
use serde::{Deserialize, Serialize};

/// One portion of a purchase lot consumed by a specific sale.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct DisposalAssociation {
    /// Position of the lot in the ledger for this run.
    pub lot_index: usize,

    pub symbol: String,
    pub exchange: String,
    pub time: DateTime<Utc>,
    pub txn_id: String,
    pub price: UsdAmount,

    /// The lot's original quantity, not the quantity remaining at the time of the draw.
    pub quantity: Quantity,

    pub qty_disposed: Quantity,

    /// Lot cost basis prorated by `qty_disposed / quantity`.
    pub cost_basis: UsdAmount,

    /// Lot fee prorated by `qty_disposed / quantity`.
    pub fee: UsdAmount,

    /// True iff this association alone consumed the lot's entire original quantity.
    pub full_disposal: bool,
}

/// A sell transaction with the purchase lots it was matched against.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct DisposalRecord {
    #[serde(flatten)]
    pub sale: Transaction,

    pub proceeds: UsdAmount,
    pub quantity_reconciled: Quantity,

    /// Oldest lot first.
    pub associated_purchases: Vec<DisposalAssociation>,

    pub reconciled: bool,
    pub review_required: bool,

    /// Sum of the associations' prorated cost basis.
    pub cost_basis: UsdAmount,
}

/// A disposal association flattened for the disposed purchases output, with a reference back to
/// the sale that consumed it.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct DisposedPurchase {
    #[serde(flatten)]
    pub association: DisposalAssociation,

    pub disposal_exchange: String,
    pub disposal_time: DateTime<Utc>,
    pub disposal_txn_id: String,
}

/// A purchase lot that still holds some quantity at the end of a run.
///
/// The original `quantity`, `cost_basis` and `fee` are retained so the lot can be carried forward
/// into the next run unchanged.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct UndisposedPurchase {
    pub symbol: String,
    pub exchange: String,
    pub time: DateTime<Utc>,
    pub txn_id: String,
    pub price: UsdAmount,
    pub quantity: Quantity,
    pub quantity_remaining: Quantity,
    pub cost_basis: UsdAmount,
    pub fee: UsdAmount,
}

impl DisposalRecord {
    /// Quantity of the sale that could not be matched to any purchase.
    pub fn quantity_unreconciled(&self) -> Quantity {
        self.sale.quantity - self.quantity_reconciled
    }

    /// Realized gain, only known when the sale is fully reconciled.
    pub fn gain(&self) -> Option<UsdAmount> {
        self.reconciled.then(|| self.proceeds - self.cost_basis)
    }
}

/// Enable consistency checks on years.
impl GetYear for DisposalRecord {
    fn get_year(&self) -> i32 {
        self.sale.time.year()
    }
}

impl DisposedPurchase {
    pub(crate) fn new(association: &DisposalAssociation, sale: &Transaction) -> Self {
        Self {
            association: association.clone(),
            disposal_exchange: sale.exchange.clone(),
            disposal_time: sale.time,
            disposal_txn_id: sale.txn_id.clone(),
        }
    }
}
