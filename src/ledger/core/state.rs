use crate::crypto::Address;
use crate::error::{ChainError, Result};
use crate::transaction::{Amount, Transaction};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Registered public keys and account balances for one ledger.
///
/// The address book is populated only through explicit registration and
/// entries are never removed. The reserved source address lives in the
/// balance book alone: it has no key pair, and its balance goes negative by
/// exactly the total emission (the accounting side of minted rewards).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountState {
    pub address_book: HashMap<Address, Vec<u8>>,
    pub balance_book: HashMap<Address, Amount>,
}

impl AccountState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a public key for an address and zero-initializes its balance.
    pub fn register(&mut self, address: Address, public_key: &[u8]) {
        self.address_book.insert(address, public_key.to_vec());
        self.balance_book.entry(address).or_insert(Amount::ZERO);
    }

    /// Zero-initializes a balance entry without registering a key. Used for
    /// the reserved source address.
    pub fn track_balance(&mut self, address: Address) {
        self.balance_book.entry(address).or_insert(Amount::ZERO);
    }

    pub fn public_key_of(&self, address: &Address) -> Option<&[u8]> {
        self.address_book.get(address).map(|k| k.as_slice())
    }

    pub fn is_registered(&self, address: &Address) -> bool {
        self.address_book.contains_key(address)
    }

    pub fn balance_of(&self, address: &Address) -> Amount {
        *self.balance_book.get(address).unwrap_or(&Amount::ZERO)
    }

    /// Applies one accepted transaction: the sender is debited amount + fee,
    /// the receiver credited the amount. The fee itself is not credited here;
    /// it reaches the miner folded into the block's reward transaction.
    pub fn apply_transaction(&mut self, tx: &Transaction) -> Result<()> {
        let total = tx.amount + tx.fee;

        let sender = self.balance_book.entry(tx.from).or_insert(Amount::ZERO);
        let available = *sender;
        *sender -= total;
        if tx.from != Address::ZERO && *sender < Amount::ZERO {
            // A correctly validated mutation never drives a real account
            // negative; only the reserved source address carries emission debt.
            *sender += total;
            return Err(ChainError::InsufficientBalance {
                address: tx.from,
                needed: total,
                available,
            });
        }

        let receiver = self.balance_book.entry(tx.to).or_insert(Amount::ZERO);
        *receiver += tx.amount;
        Ok(())
    }

    /// Replays every transaction of an accepted block.
    pub fn apply_block(&mut self, transactions: &[Transaction]) -> Result<()> {
        for tx in transactions {
            self.apply_transaction(tx)?;
        }
        Ok(())
    }

    /// Stable, address-sorted snapshot of the balance book. Two nodes holding
    /// identical logical state produce identical snapshots, and therefore
    /// identical block hashes.
    pub fn snapshot(&self) -> Vec<(Address, Amount)> {
        let mut entries: Vec<(Address, Amount)> = self
            .balance_book
            .iter()
            .map(|(address, balance)| (*address, *balance))
            .collect();
        entries.sort_unstable_by_key(|(address, _)| *address);
        entries
    }
}
