//! Cryptographic primitives and address derivation for ledgermesh

use crate::error::ChainError;
use once_cell::sync::Lazy;
use rand::rngs::OsRng;
use secp256k1::{
    constants::{COMPACT_SIGNATURE_SIZE, PUBLIC_KEY_SIZE, SECRET_KEY_SIZE},
    ecdsa::Signature,
    All, Message, PublicKey, Secp256k1, SecretKey,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// A thread-safe, lazily initialized Secp256k1 context.
/// This prevents repeated, unnecessary context creation.
static SECP256K1_CONTEXT: Lazy<Secp256k1<All>> = Lazy::new(Secp256k1::new);

/// Fixed textual prefix every ledgermesh address carries.
pub const ADDRESS_PREFIX: &str = "0x00";

/// Length of the address digest in bytes (40 hex characters when rendered).
pub const ADDRESS_DIGEST_LEN: usize = 20;

/// An account address: a 20-byte digest of the compressed public key,
/// rendered as `0x00` followed by 40 hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Address([u8; ADDRESS_DIGEST_LEN]);

impl Address {
    /// The reserved source address used for reward emission.
    pub const ZERO: Address = Address([0u8; ADDRESS_DIGEST_LEN]);

    /// Derives an address from compressed public key bytes: the first 20
    /// bytes of the SHA-256 digest.
    pub fn from_public_key(public_key_bytes: &[u8]) -> Self {
        let digest = Sha256::digest(public_key_bytes);
        let mut bytes = [0u8; ADDRESS_DIGEST_LEN];
        bytes.copy_from_slice(&digest[..ADDRESS_DIGEST_LEN]);
        Address(bytes)
    }

    /// Raw digest bytes, used for deterministic hashing.
    pub fn as_bytes(&self) -> &[u8; ADDRESS_DIGEST_LEN] {
        &self.0
    }

    /// Structural check for a textual address. Never consults the network.
    pub fn is_valid(s: &str) -> bool {
        s.parse::<Address>().is_ok()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", ADDRESS_PREFIX, hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let suffix = s.strip_prefix(ADDRESS_PREFIX).ok_or_else(|| {
            ChainError::InvalidAddress(format!("address must start with {}", ADDRESS_PREFIX))
        })?;
        if suffix.len() != ADDRESS_DIGEST_LEN * 2 {
            return Err(ChainError::InvalidAddress(format!(
                "address digest must be {} hex characters, got {}",
                ADDRESS_DIGEST_LEN * 2,
                suffix.len()
            )));
        }
        let bytes = hex::decode(suffix)
            .map_err(|e| ChainError::InvalidAddress(format!("invalid hex digits: {}", e)))?;
        let mut digest = [0u8; ADDRESS_DIGEST_LEN];
        digest.copy_from_slice(&bytes);
        Ok(Address(digest))
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.to_string()
    }
}

impl TryFrom<String> for Address {
    type Error = ChainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

#[derive(Debug, Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Generates a new random KeyPair using the OS random number generator.
    pub fn generate() -> Result<Self, ChainError> {
        let secret_key = SecretKey::new(&mut OsRng);
        let public_key = PublicKey::from_secret_key(&SECP256K1_CONTEXT, &secret_key);

        Ok(KeyPair {
            secret_key,
            public_key,
        })
    }

    /// Creates a KeyPair from an existing SecretKey.
    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let public_key = PublicKey::from_secret_key(&SECP256K1_CONTEXT, &secret_key);
        KeyPair {
            secret_key,
            public_key,
        }
    }

    /// Creates a KeyPair from raw secret key bytes.
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self, ChainError> {
        let secret_key = SecretKey::from_slice(bytes).map_err(|e| {
            if bytes.len() != SECRET_KEY_SIZE {
                ChainError::CryptoError(format!(
                    "Secret key must be {} bytes, got {}",
                    SECRET_KEY_SIZE,
                    bytes.len()
                ))
            } else {
                ChainError::CryptoError(format!("Invalid secret key bytes: {}", e))
            }
        })?;

        Ok(Self::from_secret_key(secret_key))
    }

    /// Computes the account address for this key pair.
    pub fn address(&self) -> Address {
        Address::from_public_key(&self.public_key_bytes())
    }

    /// Returns the KeyPair's public key as a compressed byte array.
    pub fn public_key_bytes(&self) -> [u8; PUBLIC_KEY_SIZE] {
        self.public_key.serialize()
    }

    /// Signs a message (which is first hashed using SHA-256) and returns the compact signature bytes.
    pub fn sign(&self, message: &[u8]) -> Result<[u8; COMPACT_SIGNATURE_SIZE], ChainError> {
        let digest = Sha256::digest(message);

        let message = Message::from_digest_slice(&digest)
            .map_err(|e| ChainError::CryptoError(format!("Failed to create message: {}", e)))?;

        let signature = SECP256K1_CONTEXT.sign_ecdsa(&message, &self.secret_key);

        let compact_sig_bytes: [u8; COMPACT_SIGNATURE_SIZE] = signature.serialize_compact();
        Ok(compact_sig_bytes)
    }
}

/// Verifies an ECDSA signature given the raw public key bytes, message, and signature bytes.
pub fn verify_signature(
    public_key_bytes: &[u8],
    message: &[u8],
    signature_bytes: &[u8],
) -> Result<(), ChainError> {
    if public_key_bytes.len() != PUBLIC_KEY_SIZE {
        return Err(ChainError::CryptoError(format!(
            "Public key must be exactly {} bytes (compressed), got {}",
            PUBLIC_KEY_SIZE,
            public_key_bytes.len()
        )));
    }
    if signature_bytes.len() != COMPACT_SIGNATURE_SIZE {
        return Err(ChainError::CryptoError(format!(
            "Signature must be exactly {} bytes (compact), got {}",
            COMPACT_SIGNATURE_SIZE,
            signature_bytes.len()
        )));
    }

    let public_key = PublicKey::from_slice(public_key_bytes)
        .map_err(|e| ChainError::CryptoError(format!("Invalid public key: {}", e)))?;

    let digest = Sha256::digest(message);

    let message = Message::from_digest_slice(&digest)
        .map_err(|e| ChainError::CryptoError(format!("Failed to create message: {}", e)))?;

    let signature = Signature::from_compact(signature_bytes)
        .map_err(|e| ChainError::CryptoError(format!("Invalid signature: {}", e)))?;

    SECP256K1_CONTEXT
        .verify_ecdsa(&message, &signature, &public_key)
        .map_err(|_| ChainError::CryptoError("Signature verification failed".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_generation() {
        let keypair = KeyPair::generate().unwrap();
        assert_eq!(keypair.public_key_bytes().len(), PUBLIC_KEY_SIZE);
        assert_eq!(keypair.secret_key.as_ref().len(), SECRET_KEY_SIZE);
    }

    #[test]
    fn test_address_derivation() {
        let keypair = KeyPair::generate().unwrap();
        let address = keypair.address();
        let rendered = address.to_string();

        assert!(rendered.starts_with(ADDRESS_PREFIX));
        assert_eq!(rendered.len(), ADDRESS_PREFIX.len() + ADDRESS_DIGEST_LEN * 2);
        // Round-trip through the textual form
        assert_eq!(rendered.parse::<Address>().unwrap(), address);
    }

    #[test]
    fn test_address_format_validation() {
        assert!(Address::is_valid(
            "0x001111111111111111111111111111111111111111"
        ));
        // Wrong prefix
        assert!(!Address::is_valid(
            "0x011111111111111111111111111111111111111111"
        ));
        // Too short
        assert!(!Address::is_valid("0x0011"));
        // Non-hex digits
        assert!(!Address::is_valid(
            "0x00zz11111111111111111111111111111111111111"
        ));
        // The reserved source address is structurally valid
        assert!(Address::is_valid(&Address::ZERO.to_string()));
    }

    #[test]
    fn test_signing_and_verification() {
        let keypair = KeyPair::generate().unwrap();
        let message = b"Hello, ledgermesh!";

        let signature = keypair.sign(message).unwrap();
        let pubkey_bytes = keypair.public_key_bytes();

        let result = verify_signature(&pubkey_bytes, message, &signature);
        assert!(result.is_ok());
        assert_eq!(signature.len(), COMPACT_SIGNATURE_SIZE);
    }

    #[test]
    fn test_invalid_signature() {
        let keypair1 = KeyPair::generate().unwrap();
        let keypair2 = KeyPair::generate().unwrap();

        let message = b"Test message";
        let signature = keypair1.sign(message).unwrap();
        let pubkey2_bytes = keypair2.public_key_bytes();

        let result = verify_signature(&pubkey2_bytes, message, &signature);
        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().to_string(),
            "Cryptographic error: Signature verification failed"
        );
    }

    #[test]
    fn test_tampered_message() {
        let keypair = KeyPair::generate().unwrap();
        let message = b"Original message";
        let tampered = b"Tampered message";

        let signature = keypair.sign(message).unwrap();
        let pubkey_bytes = keypair.public_key_bytes();

        let result = verify_signature(&pubkey_bytes, tampered, &signature);
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_key_or_sig_length_check() {
        let keypair = KeyPair::generate().unwrap();
        let message = b"Test";
        let signature = keypair.sign(message).unwrap();
        let pubkey_bytes = keypair.public_key_bytes();

        let result = verify_signature(&pubkey_bytes[1..], message, &signature);
        assert!(result.is_err());

        let result = verify_signature(&pubkey_bytes, message, &signature[1..]);
        assert!(result.is_err());
    }
}
