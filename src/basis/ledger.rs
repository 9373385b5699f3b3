use super::lot::{LotId, PurchaseLot};
use crate::model::amount::Quantity;
use crate::model::records::UndisposedPurchase;
use crate::model::transaction::Transaction;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, trace};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(
        "FATAL: Invariant violation, tried to consume {requested} from lot `{txn_id}` \
        with only {remaining} remaining"
    )]
    InvariantViolation {
        txn_id: String,
        requested: Quantity,
        remaining: Quantity,
    },

    #[error("FATAL: Unknown lot index {0:?}")]
    UnknownLot(LotId),

    #[error(
        "Carried lot `{txn_id}` has {remaining} remaining, \
        expected more than zero and at most {quantity}"
    )]
    InvalidCarry {
        txn_id: String,
        quantity: Quantity,
        remaining: Quantity,
    },
}

/// The oldest-first traversal state for a single symbol.
///
/// `ids` is sorted by purchase time. Lots are always consumed from the oldest available, so the
/// exhausted lots form a prefix of `ids` and `cursor` only moves forward.
#[derive(Debug, Default)]
struct SymbolQueue {
    ids: Vec<LotId>,
    cursor: usize,
}

/// All purchase lots for one reconciliation run.
///
/// Lots live in an arena indexed by [`LotId`], sorted ascending by purchase time. Ties keep their
/// input order, with carried-forward lots ahead of new purchases.
#[derive(Debug, Default)]
pub struct LotLedger {
    lots: Vec<PurchaseLot>,
    queues: HashMap<String, SymbolQueue>,
}

impl LotLedger {
    /// Create a ledger from every buy in `transactions`.
    ///
    /// Sells are ignored. An empty ledger is valid; every sale will then require review.
    pub fn load<'a, I>(transactions: I) -> Self
    where
        I: IntoIterator<Item = &'a Transaction>,
    {
        let lots = transactions
            .into_iter()
            .filter(|tx| tx.is_buy())
            .cloned()
            .map(PurchaseLot::from_purchase)
            .collect();

        Self::from_lots(lots)
    }

    /// Create a ledger from the open lots of a previous run followed by every buy in
    /// `transactions`.
    pub fn carry_forward<'a, C, I>(carried: C, transactions: I) -> Result<Self, LedgerError>
    where
        C: IntoIterator<Item = UndisposedPurchase>,
        I: IntoIterator<Item = &'a Transaction>,
    {
        let mut lots = Vec::new();
        for lot in carried {
            if !lot.quantity_remaining.is_positive() || lot.quantity_remaining > lot.quantity {
                return Err(LedgerError::InvalidCarry {
                    txn_id: lot.txn_id,
                    quantity: lot.quantity,
                    remaining: lot.quantity_remaining,
                });
            }
            lots.push(PurchaseLot::from_carried(lot));
        }
        let carried_count = lots.len();

        lots.extend(
            transactions
                .into_iter()
                .filter(|tx| tx.is_buy())
                .cloned()
                .map(PurchaseLot::from_purchase),
        );
        debug!(
            "Loading ledger with {carried_count} carried lots and {} new lots",
            lots.len() - carried_count
        );

        Ok(Self::from_lots(lots))
    }

    fn from_lots(mut lots: Vec<PurchaseLot>) -> Self {
        // `sort_by_key` is stable, preserving input order for equal timestamps.
        lots.sort_by_key(|lot| lot.time());

        let mut queues = HashMap::<_, SymbolQueue>::new();
        for (index, lot) in lots.iter().enumerate() {
            queues
                .entry(lot.symbol().to_string())
                .or_default()
                .ids
                .push(LotId(index));
        }

        Self { lots, queues }
    }

    pub fn len(&self) -> usize {
        self.lots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lots.is_empty()
    }

    /// Get a lot by index.
    pub fn get(&self, id: LotId) -> Option<&PurchaseLot> {
        self.lots.get(id.0)
    }

    /// Iterate over all lots in purchase-time order.
    pub fn iter(&self) -> impl Iterator<Item = (LotId, &PurchaseLot)> + '_ {
        self.lots
            .iter()
            .enumerate()
            .map(|(index, lot)| (LotId(index), lot))
    }

    /// Find the oldest lot for `symbol` with quantity remaining that was purchased no later than
    /// `as_of`.
    ///
    /// Lots purchased after `as_of` are never returned, even if nothing older is left. Callers
    /// must query with non-decreasing `as_of` times for a given symbol.
    pub fn oldest_available(&mut self, symbol: &str, as_of: DateTime<Utc>) -> Option<LotId> {
        let queue = self.queues.get_mut(symbol)?;

        while let Some(&id) = queue.ids.get(queue.cursor) {
            let lot = &self.lots[id.0];
            if lot.is_available() {
                return (lot.time() <= as_of).then_some(id);
            }
            queue.cursor += 1;
        }

        None
    }

    /// Iterate over every lot that [`LotLedger::oldest_available`] could return for `symbol` at
    /// `as_of`, oldest first.
    #[cfg(test)]
    pub(crate) fn available<'a>(
        &'a self,
        symbol: &str,
        as_of: DateTime<Utc>,
    ) -> impl Iterator<Item = (LotId, &'a PurchaseLot)> + 'a {
        self.queues
            .get(symbol)
            .map(|queue| &queue.ids[queue.cursor..])
            .unwrap_or_default()
            .iter()
            .map(move |&id| (id, &self.lots[id.0]))
            .filter(|(_, lot)| lot.is_available())
            .take_while(move |(_, lot)| lot.time() <= as_of)
    }

    /// Draw `quantity` from a lot.
    ///
    /// Drawing more than the lot has remaining is an engine bug, reported as
    /// [`LedgerError::InvariantViolation`].
    pub fn consume(&mut self, id: LotId, quantity: Quantity) -> Result<(), LedgerError> {
        let lot = self.lots.get_mut(id.0).ok_or(LedgerError::UnknownLot(id))?;

        if quantity.is_negative() || quantity > lot.quantity_remaining {
            return Err(LedgerError::InvariantViolation {
                txn_id: lot.purchase().txn_id.clone(),
                requested: quantity,
                remaining: lot.quantity_remaining,
            });
        }

        lot.quantity_remaining -= quantity;
        if lot.quantity_remaining.is_zero() {
            lot.full_disposal = true;
        }
        trace!(
            "Consumed {quantity} from lot `{}`, {} remaining",
            lot.purchase().txn_id,
            lot.quantity_remaining,
        );

        Ok(())
    }

    /// Iterate over lots that still hold some quantity, in purchase-time order.
    pub fn undisposed(&self) -> impl Iterator<Item = &PurchaseLot> + '_ {
        self.lots.iter().filter(|lot| lot.is_available())
    }
}
