use crate::model::amount::{Quantity, UsdAmount};
use crate::model::records::DisposalRecord;
use std::fmt::Display;

/// Totals over a set of disposals.
#[derive(Debug, Default, Eq, PartialEq)]
pub struct Sums {
    /// Proceeds of every disposal, reconciled or not.
    pub proceeds: UsdAmount,

    /// Cost basis matched to every disposal, reconciled or not.
    pub cost_basis: UsdAmount,

    /// Gains of reconciled disposals only.
    pub reconciled_gain: UsdAmount,

    pub n_reconciled: usize,
    pub n_review_required: usize,

    /// Sale quantity with no matching purchase, summed across all symbols.
    pub quantity_unreconciled: Quantity,
}

impl Sums {
    pub fn new(disposals: &[DisposalRecord]) -> Self {
        disposals.iter().fold(Self::default(), |mut sums, record| {
            sums.proceeds += record.proceeds;
            sums.cost_basis += record.cost_basis;
            if let Some(gain) = record.gain() {
                sums.reconciled_gain += gain;
                sums.n_reconciled += 1;
            }
            if record.review_required {
                sums.n_review_required += 1;
                sums.quantity_unreconciled += record.quantity_unreconciled();
            }

            sums
        })
    }
}

impl Display for Sums {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Write the CSV header
        writeln!(f, r#""","Total""#)?;

        writeln!(f, r#""Proceeds","{}""#, self.proceeds)?;
        writeln!(f, r#""Cost Basis","{}""#, self.cost_basis)?;
        writeln!(f, r#""Reconciled Gain","{}""#, self.reconciled_gain)?;
        writeln!(f, r#""Reconciled Disposals","{}""#, self.n_reconciled)?;
        writeln!(f, r#""Review Required","{}""#, self.n_review_required)?;
        writeln!(
            f,
            r#""Unreconciled Quantity","{}""#,
            self.quantity_unreconciled,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basis::{LotLedger, Reconciler};
    use crate::model::transaction::tests::tx;
    use crate::model::transaction::Side;
    use tracing_test::traced_test;

    #[test]
    #[traced_test]
    fn test_sums() {
        let txs = [tx(Side::Buy, "2022-01-01 00:00:00", "100", "1", "1")];
        let mut ledger = LotLedger::load(&txs);
        let sales = [
            tx(Side::Sell, "2022-02-01 00:00:00", "150", "0.5", "1"),
            tx(Side::Sell, "2022-03-01 00:00:00", "200", "1", "0"),
        ];
        let disposals = Reconciler::new(&mut ledger).reconcile_all(sales).unwrap();

        let sums = Sums::new(&disposals);

        // First sale: proceeds 74, basis 50.5. Second sale: proceeds 200, basis 50.5 for half.
        assert_eq!(sums.proceeds, "274".parse().unwrap());
        assert_eq!(sums.cost_basis, "101".parse().unwrap());
        assert_eq!(sums.reconciled_gain, "23.5".parse().unwrap());
        assert_eq!(sums.n_reconciled, 1);
        assert_eq!(sums.n_review_required, 1);
        assert_eq!(sums.quantity_unreconciled, "0.5".parse().unwrap());

        let table = sums.to_string();
        assert!(table.contains(r#""Reconciled Gain","23.5""#));
    }
}
