//! Pending transaction pool

use crate::error::{ChainError, Result};
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};

/// Default cap on pool entries.
pub const DEFAULT_MAX_POOL_SIZE: usize = 10_000;

/// Unordered collection of transactions awaiting inclusion in a sealed
/// block, deduplicated by signature.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PendingPool {
    transactions: Vec<Transaction>,
    #[serde(default = "default_capacity")]
    capacity: usize,
}

fn default_capacity() -> usize {
    DEFAULT_MAX_POOL_SIZE
}

impl PendingPool {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_POOL_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        PendingPool {
            transactions: Vec::new(),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transaction> {
        self.transactions.iter()
    }

    pub fn contains_signature(&self, signature: &[u8]) -> bool {
        self.transactions
            .iter()
            .any(|tx| tx.signature.as_deref() == Some(signature))
    }

    /// Inserts a signed transaction. Duplicates (by signature) are dropped
    /// silently; an unsigned transaction is rejected.
    pub fn insert(&mut self, tx: Transaction) -> Result<()> {
        let signature = tx.signature.as_deref().ok_or_else(|| {
            ChainError::InvalidTransaction("cannot pool an unsigned transaction".to_string())
        })?;
        if self.contains_signature(signature) {
            return Ok(());
        }
        if self.transactions.len() >= self.capacity {
            return Err(ChainError::PoolFull);
        }
        self.transactions.push(tx);
        Ok(())
    }

    /// In-place filter used by pool validation.
    pub fn retain<F>(&mut self, keep: F)
    where
        F: FnMut(&Transaction) -> bool,
    {
        self.transactions.retain(keep);
    }

    /// Purges every pooled transaction that appears (by signature) in the
    /// given block transaction list.
    pub fn remove_included(&mut self, included: &[Transaction]) {
        self.transactions.retain(|pooled| {
            !included
                .iter()
                .any(|tx| tx.signature == pooled.signature && pooled.signature.is_some())
        });
    }

    pub fn clear(&mut self) {
        self.transactions.clear();
    }

    /// Snapshot of the current pool contents.
    pub fn transactions(&self) -> Vec<Transaction> {
        self.transactions.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{Address, KeyPair};
    use crate::transaction::Amount;

    fn signed_tx(keypair: &KeyPair, amount: u32) -> Transaction {
        let mut tx = Transaction::new(
            keypair.address(),
            Address::ZERO,
            Amount::from_num(amount),
            Amount::ZERO,
        );
        tx.sign(keypair).unwrap();
        tx
    }

    #[test]
    fn test_insert_deduplicates_by_signature() {
        let keypair = KeyPair::generate().unwrap();
        let tx = signed_tx(&keypair, 5);

        let mut pool = PendingPool::new();
        pool.insert(tx.clone()).unwrap();
        pool.insert(tx).unwrap();
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_unsigned_rejected() {
        let keypair = KeyPair::generate().unwrap();
        let tx = Transaction::new(
            keypair.address(),
            Address::ZERO,
            Amount::from_num(5),
            Amount::ZERO,
        );

        let mut pool = PendingPool::new();
        assert!(pool.insert(tx).is_err());
    }

    #[test]
    fn test_capacity_limit() {
        let keypair = KeyPair::generate().unwrap();
        let mut pool = PendingPool::with_capacity(1);

        pool.insert(signed_tx(&keypair, 1)).unwrap();
        let overflow = pool.insert(signed_tx(&keypair, 2));
        assert!(matches!(overflow, Err(ChainError::PoolFull)));
    }

    #[test]
    fn test_remove_included() {
        let keypair = KeyPair::generate().unwrap();
        let tx1 = signed_tx(&keypair, 1);
        let tx2 = signed_tx(&keypair, 2);

        let mut pool = PendingPool::new();
        pool.insert(tx1.clone()).unwrap();
        pool.insert(tx2).unwrap();

        pool.remove_included(std::slice::from_ref(&tx1));
        assert_eq!(pool.len(), 1);
        assert!(!pool.contains_signature(tx1.signature.as_deref().unwrap()));
    }
}
