use crate::model::transaction::Transaction;
use std::collections::BTreeSet;
use tracing::warn;

pub(crate) trait GetYear {
    fn get_year(&self) -> i32;
}

pub trait CheckYearsExt {
    fn check_years(&self, years: &BTreeSet<i32>) -> Result<(), BTreeSet<i32>>;
}

/// Blanket implementation for every slice whose items implement `GetYear`.
impl<T> CheckYearsExt for [T]
where
    T: GetYear,
{
    fn check_years(&self, years: &BTreeSet<i32>) -> Result<(), BTreeSet<i32>> {
        if years.is_empty() {
            return Ok(());
        }

        let errors: BTreeSet<_> = self
            .iter()
            .filter_map(|item| {
                let item_year = item.get_year();

                (!years.contains(&item_year)).then_some(item_year)
            })
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Keep only transactions whose UTC year is in `years`.
///
/// An empty set keeps everything. Returns the number of transactions dropped.
pub fn retain_years(txs: &mut Vec<Transaction>, years: &BTreeSet<i32>) -> usize {
    if years.is_empty() {
        return 0;
    }

    let before = txs.len();
    txs.retain(|tx| years.contains(&tx.get_year()));
    let dropped = before - txs.len();

    if dropped > 0 {
        warn!("Dropped {dropped} transactions outside of years {years:?}");
    }

    dropped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::transaction::tests::tx;
    use crate::model::transaction::Side;
    use tracing_test::traced_test;

    fn txs() -> Vec<Transaction> {
        vec![
            tx(Side::Buy, "2020-12-31 23:59:59", "1", "1", "0"),
            tx(Side::Buy, "2021-01-01 00:00:00", "1", "1", "0"),
            tx(Side::Sell, "2022-06-01 12:00:00", "1", "1", "0"),
        ]
    }

    #[test]
    #[traced_test]
    fn test_retain_years() {
        let mut all = txs();
        assert_eq!(retain_years(&mut all, &BTreeSet::new()), 0);
        assert_eq!(all.len(), 3);

        let years = BTreeSet::from([2021, 2022]);
        assert_eq!(retain_years(&mut all, &years), 1);
        assert_eq!(all.first().map(|tx| tx.get_year()), Some(2021));
        assert!(logs_contain("Dropped 1 transactions"));
    }

    #[test]
    #[traced_test]
    fn test_check_years() {
        let all = txs();

        assert_eq!(all.check_years(&BTreeSet::new()), Ok(()));
        assert_eq!(
            all.check_years(&BTreeSet::from([2021])),
            Err(BTreeSet::from([2020, 2022]))
        );
    }
}
