//! Signed transfer records

use crate::crypto::{self, Address, KeyPair};
use crate::error::{ChainError, Result};
use fixed::types::I64F64;
use serde::{Deserialize, Serialize};

/// Monetary amount in fixed-point representation.
///
/// Balances and fees use deterministic fixed-point arithmetic so that two
/// nodes replaying the same history always agree bit-for-bit on every
/// balance, and validation can compare amounts with exact equality.
pub type Amount = I64F64;

/// Maximum serialized transaction size in bytes to prevent DoS.
pub const MAX_TRANSACTION_SIZE: usize = 100_000;

/// A transfer of funds from one account to another, immutable once signed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Creation time in milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
    pub from: Address,
    pub to: Address,
    pub amount: Amount,
    pub fee: Amount,
    /// Compact ECDSA signature over [`Transaction::signable_message`];
    /// `None` until signed.
    pub signature: Option<Vec<u8>>,
}

impl Transaction {
    /// Constructs an unsigned transaction stamped with the current time.
    pub fn new(from: Address, to: Address, amount: Amount, fee: Amount) -> Self {
        Transaction {
            timestamp_ms: chrono::Utc::now().timestamp_millis() as u64,
            from,
            to,
            amount,
            fee,
            signature: None,
        }
    }

    /// Whether this transaction originates from the reserved source address
    /// (system-minted rewards).
    pub fn is_reward(&self) -> bool {
        self.from == Address::ZERO
    }

    /// The deterministic byte sequence covered by the signature:
    /// (timestamp, from, to, amount, fee) in fixed order.
    pub fn signable_message(&self) -> Vec<u8> {
        let mut message = Vec::new();
        message.extend_from_slice("TRANSFER:".as_bytes());
        message.extend_from_slice(&self.timestamp_ms.to_le_bytes());
        message.extend_from_slice(self.from.as_bytes());
        message.extend_from_slice(self.to.as_bytes());
        message.extend_from_slice(&self.amount.to_le_bytes());
        message.extend_from_slice(&self.fee.to_le_bytes());
        message
    }

    /// Signs the transaction with the given key pair. A signing failure
    /// surfaces as an error, never as a silently absent signature.
    pub fn sign(&mut self, keypair: &KeyPair) -> Result<()> {
        let signature = keypair.sign(&self.signable_message())?;
        self.signature = Some(signature.to_vec());
        Ok(())
    }

    /// Recomputes the signable message and checks the signature against the
    /// given public key. A missing or malformed signature is `false`, never
    /// an error.
    pub fn verify(&self, public_key_bytes: &[u8]) -> bool {
        match &self.signature {
            Some(signature) => {
                crypto::verify_signature(public_key_bytes, &self.signable_message(), signature)
                    .is_ok()
            }
            None => false,
        }
    }

    /// Validate serialized transaction size to prevent DoS.
    pub fn validate_size(&self, max_bytes: usize) -> Result<()> {
        let serialized = bincode::serialize(self)?;
        if serialized.len() > max_bytes {
            return Err(ChainError::InvalidTransaction(format!(
                "Transaction too large: {} bytes (max: {})",
                serialized.len(),
                max_bytes
            )));
        }
        Ok(())
    }
}
