//! Batch Builder Module
//!
//! This module groups a drained set of transactions into size-capped batches
//! using the First-Fit-Decreasing bin-packing heuristic.
//!
//! Amounts are aggregated by absolute value: credits and debits both add to a
//! batch's volume. A batch never exceeds the cap unless it holds a single
//! transaction whose own absolute amount is already above the cap.

use crate::{Batch, Error, Result, Transaction};
use rust_decimal::Decimal;

/// First-Fit-Decreasing batch builder
///
/// Holds the configured cap. Building is pure and deterministic: the same
/// input list and cap always give the same batches in the same order.
#[derive(Debug, Clone)]
pub struct BatchBuilder {
    /// Maximum absolute aggregate per batch
    max_aggregate_per_batch: Decimal,
}

impl BatchBuilder {
    /// Creates a new batch builder
    ///
    /// # Arguments
    /// * `max_aggregate_per_batch` - Cap on a batch's absolute aggregate (must be positive)
    pub fn new(max_aggregate_per_batch: Decimal) -> Result<Self> {
        if max_aggregate_per_batch <= Decimal::ZERO {
            return Err(Error::InvalidConfig(format!(
                "max aggregate per batch must be positive, got {}",
                max_aggregate_per_batch
            )));
        }
        Ok(Self {
            max_aggregate_per_batch,
        })
    }

    pub fn cap(&self) -> Decimal {
        self.max_aggregate_per_batch
    }

    /// Partition transactions into batches
    ///
    /// 1. Stable-sort by absolute amount, descending (ties keep input order)
    /// 2. Place each transaction into the first open batch it fits in
    /// 3. Open a new batch when none fits
    ///
    /// # Returns
    /// Batches in the order they were opened. Empty input gives no batches.
    pub fn build_batches(&self, transactions: &[Transaction]) -> Vec<Batch> {
        let cap = self.max_aggregate_per_batch;

        let mut ordered: Vec<&Transaction> = transactions.iter().collect();
        // `sort_by` is stable
        ordered.sort_by(|a, b| b.absolute_amount().cmp(&a.absolute_amount()));

        let mut batches: Vec<Batch> = Vec::new();
        for tx in ordered {
            let amount = tx.absolute_amount();
            match batches.iter_mut().find(|batch| batch.fits(amount, cap)) {
                Some(batch) => batch.push(amount),
                None => batches.push(Batch::open(tx)),
            }
        }

        batches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn tx(id: &str, amount: &str) -> Transaction {
        Transaction::new(id, dec(amount))
    }

    #[test]
    fn test_mixed_credits_and_debits() {
        let builder = BatchBuilder::new(dec("500")).unwrap();
        let txs = vec![
            tx("CRE123", "250"),
            tx("CRE124", "250"),
            tx("DEB125", "-300"),
            tx("CRE126", "200"),
            tx("DEB127", "-100.63"),
        ];

        let batches = builder.build_batches(&txs);

        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].total_absolute_value, dec("500"));
        assert_eq!(batches[0].count, 2); // 300 + 200
        assert_eq!(batches[1].total_absolute_value, dec("500"));
        assert_eq!(batches[1].count, 2); // 250 + 250
        assert_eq!(batches[2].total_absolute_value, dec("100.63"));
        assert_eq!(batches[2].count, 1);
    }

    #[test]
    fn test_empty_transaction_list() {
        let builder = BatchBuilder::new(dec("500")).unwrap();
        assert!(builder.build_batches(&[]).is_empty());
    }

    #[test]
    fn test_oversized_transaction_forms_singleton() {
        let builder = BatchBuilder::new(dec("500")).unwrap();
        let txs = vec![tx("CRE1", "100"), tx("DEB2", "-750"), tx("CRE3", "400")];

        let batches = builder.build_batches(&txs);

        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].total_absolute_value, dec("750"));
        assert_eq!(batches[0].count, 1);
        assert_eq!(batches[1].total_absolute_value, dec("500"));
        assert_eq!(batches[1].count, 2);
    }

    #[test]
    fn test_first_fit_reuses_earlier_batch() {
        let builder = BatchBuilder::new(dec("10")).unwrap();
        // sorted: 7, 6, 3, 2 -> [7+3], [6+2]
        let txs = vec![tx("a", "3"), tx("b", "7"), tx("c", "-2"), tx("d", "6")];

        let batches = builder.build_batches(&txs);

        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].total_absolute_value, dec("10"));
        assert_eq!(batches[1].total_absolute_value, dec("8"));
    }

    #[test]
    fn test_exact_fit_is_allowed() {
        let builder = BatchBuilder::new(dec("1")).unwrap();
        let batches = builder.build_batches(&[tx("a", "0.5"), tx("b", "-0.5")]);
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].total_absolute_value, dec("1"));
    }

    #[test]
    fn test_non_positive_cap_rejected() {
        assert!(BatchBuilder::new(Decimal::ZERO).is_err());
        assert!(BatchBuilder::new(dec("-5")).is_err());
    }

    fn amounts_strategy() -> impl Strategy<Value = Vec<Decimal>> {
        prop::collection::vec(
            (-100_000i64..100_000i64).prop_map(|cents| Decimal::new(cents, 2)),
            0..60,
        )
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Property: batches conserve volume and count, and respect the cap
        #[test]
        fn prop_batches_conserve_volume(amounts in amounts_strategy(), cap_cents in 1i64..200_000i64) {
            let cap = Decimal::new(cap_cents, 2);
            let builder = BatchBuilder::new(cap).unwrap();
            let txs: Vec<Transaction> = amounts
                .iter()
                .enumerate()
                .map(|(i, a)| Transaction::new(format!("tx-{}", i), *a))
                .collect();

            let batches = builder.build_batches(&txs);

            let expected_volume = amounts.iter().fold(Decimal::ZERO, |acc, a| acc + a.abs());
            let volume = batches.iter().fold(Decimal::ZERO, |acc, b| acc + b.total_absolute_value);
            prop_assert_eq!(volume, expected_volume);

            let count: usize = batches.iter().map(|b| b.count).sum();
            prop_assert_eq!(count, txs.len());

            for batch in &batches {
                prop_assert!(batch.count >= 1);
                prop_assert!(batch.total_absolute_value <= cap || batch.count == 1);
            }
        }

        /// Property: identical input and cap give identical output
        #[test]
        fn prop_deterministic(amounts in amounts_strategy()) {
            let builder = BatchBuilder::new(Decimal::new(500, 0)).unwrap();
            let txs: Vec<Transaction> = amounts
                .iter()
                .enumerate()
                .map(|(i, a)| Transaction::new(format!("tx-{}", i), *a))
                .collect();

            prop_assert_eq!(builder.build_batches(&txs), builder.build_batches(&txs));
        }
    }
}
