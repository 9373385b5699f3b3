use super::ledger::LotLedger;
use crate::model::checkpoint::State;
use crate::model::records::{DisposalRecord, DisposedPurchase, UndisposedPurchase};
use crate::model::Sums;
use tracing::info;

/// The three output sets of a reconciliation run.
#[derive(Debug, Default)]
pub struct Reconciliation {
    /// Every sale, reconciled or not, in timestamp order.
    pub disposals: Vec<DisposalRecord>,

    /// One entry per disposal association. A lot split across several sales appears once per
    /// sale.
    pub disposed_purchases: Vec<DisposedPurchase>,

    /// Lots with quantity remaining at the end of the run, in purchase-time order.
    pub undisposed_purchases: Vec<UndisposedPurchase>,
}

impl Reconciliation {
    /// Partition the final ledger state and disposal records into output sets.
    pub fn aggregate(ledger: &LotLedger, disposals: Vec<DisposalRecord>) -> Self {
        let disposed_purchases: Vec<_> = disposals
            .iter()
            .flat_map(|record| {
                record
                    .associated_purchases
                    .iter()
                    .map(|association| DisposedPurchase::new(association, &record.sale))
            })
            .collect();

        let undisposed_purchases: Vec<_> = ledger
            .undisposed()
            .map(|lot| lot.to_undisposed())
            .collect();

        info!(
            "Aggregated {} disposals, {} disposed purchases, {} open purchases",
            disposals.len(),
            disposed_purchases.len(),
            undisposed_purchases.len(),
        );

        Self {
            disposals,
            disposed_purchases,
            undisposed_purchases,
        }
    }

    /// The earliest disposal that needs manual review, if any.
    pub fn first_review_required(&self) -> Option<&DisposalRecord> {
        self.disposals.iter().find(|record| record.review_required)
    }

    /// Iterate over all disposals that need manual review, in timestamp order.
    pub fn review_required(&self) -> impl Iterator<Item = &DisposalRecord> + '_ {
        self.disposals.iter().filter(|record| record.review_required)
    }

    pub fn sums(&self) -> Sums {
        Sums::new(&self.disposals)
    }

    /// Create a checkpoint holding the open lots, for carrying forward into the next run.
    pub fn checkpoint(&self) -> State {
        let mut state = State::new(self.undisposed_purchases.clone());
        let latest = self
            .disposals
            .iter()
            .map(|record| record.sale.time)
            .chain(self.undisposed_purchases.iter().map(|lot| lot.time))
            .max();
        if let Some(time) = latest {
            state.latest_row_time(time.format("%F %T").to_string());
        }

        state
    }
}
