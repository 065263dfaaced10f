//! Pending Pool Module
//!
//! This module implements the in-process log of transactions awaiting audit.
//! Transactions are stored in a lock-free FIFO queue and drained by the
//! threshold trigger.

use crate::Transaction;
use crossbeam::queue::SegQueue;

/// Pool of applied transactions not yet drained for audit
///
/// Appends never block. Removal is only ever done by the holder of the drain
/// critical section, so a length observed under that section can only grow
/// until the holder pops.
#[derive(Debug, Default)]
pub struct PendingPool {
    transactions: SegQueue<Transaction>,
}

impl PendingPool {
    /// Creates a new empty pending pool
    pub fn new() -> Self {
        Self {
            transactions: SegQueue::new(),
        }
    }

    /// Append an applied transaction to the back of the queue
    pub fn push(&self, tx: Transaction) {
        self.transactions.push(tx);
    }

    /// Number of transactions currently waiting
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Remove up to `max` transactions from the front of the queue
    ///
    /// # Returns
    /// The oldest transactions in enqueue order (may be fewer if the pool has less)
    pub fn take(&self, max: usize) -> Vec<Transaction> {
        let mut taken = Vec::with_capacity(max.min(self.len()));
        while taken.len() < max {
            match self.transactions.pop() {
                Some(tx) => taken.push(tx),
                None => break,
            }
        }
        taken
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_take_is_fifo_and_bounded() {
        let pool = PendingPool::new();
        for i in 0..5 {
            pool.push(Transaction::new(format!("CRE-{}", i), Decimal::ONE));
        }

        let taken = pool.take(3);
        let ids: Vec<&str> = taken.iter().map(|t| t.transaction_id.as_str()).collect();
        assert_eq!(ids, vec!["CRE-0", "CRE-1", "CRE-2"]);
        assert_eq!(pool.len(), 2);

        let rest = pool.take(10);
        assert_eq!(rest.len(), 2);
        assert!(pool.is_empty());
    }
}
