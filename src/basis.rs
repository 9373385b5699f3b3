pub use self::aggregate::Reconciliation;
pub use self::engine::{ReconcileError, Reconciler};
pub use self::ledger::{LedgerError, LotLedger};
pub use self::lot::{LotId, PurchaseLot};
use crate::model::records::{DisposalRecord, UndisposedPurchase};
use crate::model::transaction::{sort_by_time, Transaction};
use std::fmt::Display;
use thiserror::Error;
use tracing::info;

mod aggregate;
mod engine;
mod ledger;
mod lot;


#[derive(Debug, Error)]
pub enum BasisError {
    #[error("Unable to load carried-forward lots")]
    CarryForward(#[from] LedgerError),

    #[error("Reconciliation failed")]
    Reconcile(#[from] ReconcileError),
}

/// Reconcile every sale in `transactions` against prior purchases, oldest first.
///
/// `carried` holds open lots from a previous run. They are reconciled exactly as if the full
/// history had been processed in a single run. The ledger is scoped to this call.
pub fn reconcile_fifo(
    mut transactions: Vec<Transaction>,
    carried: Vec<UndisposedPurchase>,
) -> Result<Reconciliation, BasisError> {
    sort_by_time(&mut transactions);

    let mut ledger = LotLedger::carry_forward(carried, &transactions)?;
    info!("Reconciling against {} purchase lots", ledger.len());

    let sales = transactions.into_iter().filter(|tx| tx.is_sell());
    let disposals = Reconciler::new(&mut ledger).reconcile_all(sales)?;

    Ok(Reconciliation::aggregate(&ledger, disposals))
}

/// A display of every disposal that needs manual review.
pub struct ReviewList<'a> {
    pending: Vec<&'a DisposalRecord>,
}

impl Display for ReviewList<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Review List")?;
        writeln!(f, "====== ====")?;
        writeln!(f)?;

        if self.is_passing() {
            writeln!(f, "All disposals reconciled! 🎉")?;
        } else {
            for record in &self.pending {
                let sale = &record.sale;
                writeln!(
                    f,
                    "❌ {time} {symbol} sale `{txn_id}` on {exchange}: {short} of {quantity} \
                    has no prior purchase",
                    time = sale.time.format("%F %T%.f"),
                    symbol = sale.symbol,
                    txn_id = sale.txn_id,
                    exchange = sale.exchange,
                    short = record.quantity_unreconciled(),
                    quantity = sale.quantity,
                )?;
            }
        }

        Ok(())
    }
}

impl<'a> ReviewList<'a> {
    pub fn new(reconciliation: &'a Reconciliation) -> Self {
        Self {
            pending: reconciliation.review_required().collect(),
        }
    }

    pub fn is_passing(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
