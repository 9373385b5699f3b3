use super::ledger::{LedgerError, LotLedger};
use super::lot::LotId;
use crate::model::amount::{Quantity, UsdAmount};
use crate::model::records::{DisposalAssociation, DisposalRecord};
use crate::model::transaction::Transaction;
use thiserror::Error;
use tracing::{debug, trace, warn};

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Ledger error while reconciling sale `{txn_id}`")]
    Ledger {
        txn_id: String,
        #[source]
        source: LedgerError,
    },

    #[error("Transaction `{0}` is not a sale")]
    NotASale(String),
}

/// Matches sales against the oldest available purchase lots.
///
/// The engine borrows the ledger for the duration of a run. Sales must be fed in ascending
/// timestamp order, since every match depends on the quantity left behind by earlier sales.
pub struct Reconciler<'a> {
    ledger: &'a mut LotLedger,
}

impl<'a> Reconciler<'a> {
    pub fn new(ledger: &'a mut LotLedger) -> Self {
        Self { ledger }
    }

    /// Reconcile every sale, in timestamp order.
    ///
    /// Ties keep their input order. Sales that cannot be fully matched are returned with
    /// `review_required` set; this is not an error.
    pub fn reconcile_all<I>(&mut self, sales: I) -> Result<Vec<DisposalRecord>, ReconcileError>
    where
        I: IntoIterator<Item = Transaction>,
    {
        let mut sales: Vec<_> = sales.into_iter().collect();
        crate::model::transaction::sort_by_time(&mut sales);

        sales.into_iter().map(|sale| self.dispose(sale)).collect()
    }

    /// Reconcile a single sale against the ledger.
    pub fn dispose(&mut self, sale: Transaction) -> Result<DisposalRecord, ReconcileError> {
        if !sale.is_sell() {
            return Err(ReconcileError::NotASale(sale.txn_id));
        }

        let mut remaining_to_cover = sale.quantity;
        let mut associated_purchases = Vec::new();

        while remaining_to_cover.is_positive() {
            let Some(id) = self.ledger.oldest_available(&sale.symbol, sale.time) else {
                break;
            };

            let association = self.draw(id, remaining_to_cover).map_err(|source| {
                ReconcileError::Ledger {
                    txn_id: sale.txn_id.clone(),
                    source,
                }
            })?;
            remaining_to_cover -= association.qty_disposed;
            associated_purchases.push(association);
        }

        let quantity_reconciled = sale.quantity - remaining_to_cover;
        let reconciled = remaining_to_cover.is_zero();
        let cost_basis: UsdAmount = associated_purchases
            .iter()
            .map(|association| association.cost_basis)
            .sum();

        if reconciled {
            debug!(
                "Reconciled sale `{}` of {} {} against {} lots",
                sale.txn_id,
                sale.quantity,
                sale.symbol,
                associated_purchases.len(),
            );
        } else {
            warn!(
                "Sale `{}` at {} needs review: {remaining_to_cover} of {} {} has no prior purchase",
                sale.txn_id, sale.time, sale.quantity, sale.symbol,
            );
        }

        Ok(DisposalRecord {
            proceeds: sale.proceeds(),
            quantity_reconciled,
            associated_purchases,
            reconciled,
            review_required: !reconciled,
            cost_basis,
            sale,
        })
    }

    /// Consume up to `wanted` from a lot and describe the draw.
    fn draw(&mut self, id: LotId, wanted: Quantity) -> Result<DisposalAssociation, LedgerError> {
        let lot = self.ledger.get(id).ok_or(LedgerError::UnknownLot(id))?;
        let qty_disposed = lot.quantity_remaining().min(wanted);

        let ratio = qty_disposed.ratio_of(lot.quantity());
        let purchase = lot.purchase();
        let association = DisposalAssociation {
            lot_index: id.0,
            symbol: purchase.symbol.clone(),
            exchange: purchase.exchange.clone(),
            time: purchase.time,
            txn_id: purchase.txn_id.clone(),
            price: purchase.price,
            quantity: lot.quantity(),
            qty_disposed,
            cost_basis: lot.cost_basis().prorate(ratio),
            fee: lot.fee().prorate(ratio),
            full_disposal: qty_disposed == lot.quantity(),
        };
        trace!(
            "Drawing {qty_disposed} from lot `{}` purchased at {}",
            association.txn_id,
            association.time,
        );

        self.ledger.consume(id, qty_disposed)?;

        Ok(association)
    }
}
