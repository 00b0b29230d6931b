//! Error types for ledgermesh

use crate::crypto::Address;
use crate::transaction::Amount;
use std::fmt;

#[derive(Debug, Clone)]
pub enum ChainError {
    InvalidAddress(String),
    InsufficientBalance {
        address: Address,
        needed: Amount,
        available: Amount,
    },
    InvalidSignature(String),
    ChainIntegrity(String),
    ForkDetected,
    InvalidTransaction(String),
    InvalidBlock(String),
    CryptoError(String),
    MiningCancelled,
    PoolFull,
    ConfigError(String),
    IoError(String),
    BincodeError(String),
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ChainError::InvalidAddress(msg) => write!(f, "Invalid address: {}", msg),
            ChainError::InsufficientBalance {
                address,
                needed,
                available,
            } => write!(
                f,
                "Insufficient balance: {} holds {} but needs {}",
                address, available, needed
            ),
            ChainError::InvalidSignature(msg) => write!(f, "Invalid signature: {}", msg),
            ChainError::ChainIntegrity(msg) => write!(f, "Chain integrity violation: {}", msg),
            ChainError::ForkDetected => write!(f, "Blockchain fork detected"),
            ChainError::InvalidTransaction(msg) => write!(f, "Invalid transaction: {}", msg),
            ChainError::InvalidBlock(msg) => write!(f, "Invalid block: {}", msg),
            ChainError::CryptoError(msg) => write!(f, "Cryptographic error: {}", msg),
            ChainError::MiningCancelled => write!(f, "Mining cancelled"),
            ChainError::PoolFull => write!(f, "Pending transaction pool is full"),
            ChainError::ConfigError(msg) => write!(f, "Config error: {}", msg),
            ChainError::IoError(msg) => write!(f, "IO error: {}", msg),
            ChainError::BincodeError(msg) => write!(f, "Bincode error: {}", msg),
        }
    }
}

impl std::error::Error for ChainError {}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> Self {
        ChainError::IoError(err.to_string())
    }
}

impl From<Box<bincode::ErrorKind>> for ChainError {
    fn from(err: Box<bincode::ErrorKind>) -> Self {
        ChainError::BincodeError(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;
