use crate::error::{ChainError, Result};
use crate::ledger::core::chain::Ledger;
use tracing::debug;

impl Ledger {
    /// Sequential scan of the whole chain. Stops at the first violation and
    /// reports its reason: non-increasing timestamps, broken hash linkage, a
    /// stored hash that no longer matches the block contents, or a
    /// transaction whose signature fails against the registered source key.
    /// Reward transactions from the reserved source address are exempt from
    /// the registry lookup.
    pub fn validate_chain(&self) -> Result<()> {
        let genesis = self.chain.first().ok_or_else(|| {
            ChainError::ChainIntegrity("chain is missing its genesis block".to_string())
        })?;
        if genesis.hash != genesis.compute_hash() {
            return Err(ChainError::ChainIntegrity(
                "genesis hash does not match recomputed contents".to_string(),
            ));
        }

        for i in 1..self.chain.len() {
            let current = &self.chain[i];
            let previous = &self.chain[i - 1];

            if current.timestamp_ms <= previous.timestamp_ms {
                return Err(ChainError::ChainIntegrity(format!(
                    "block {} timestamp {} is not greater than predecessor's {}",
                    i, current.timestamp_ms, previous.timestamp_ms
                )));
            }

            if current.previous_hash != previous.hash {
                return Err(ChainError::ChainIntegrity(format!(
                    "block {} previous hash {} does not link to {}",
                    i,
                    hex::encode(current.previous_hash),
                    hex::encode(previous.hash)
                )));
            }

            if current.hash != current.compute_hash() {
                return Err(ChainError::ChainIntegrity(format!(
                    "block {} stored hash does not match recomputed contents",
                    i
                )));
            }

            for tx in &current.transactions {
                if tx.is_reward() {
                    continue;
                }
                let verified = self
                    .state
                    .public_key_of(&tx.from)
                    .is_some_and(|key| tx.verify(key));
                if !verified {
                    return Err(ChainError::InvalidSignature(format!(
                        "block {} carries a transaction from {} that fails verification",
                        i, tx.from
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn is_chain_valid(&self) -> bool {
        match self.validate_chain() {
            Ok(()) => true,
            Err(reason) => {
                debug!("chain validation failed: {}", reason);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::ChainConfig;
    use crate::crypto::KeyPair;
    use crate::ledger::core::chain::Ledger;
    use crate::transaction::Amount;

    fn mined_ledger() -> (KeyPair, Ledger) {
        let alice = KeyPair::generate().unwrap();
        let config = ChainConfig {
            difficulty: 1,
            ..ChainConfig::default()
        };
        let mut ledger = Ledger::with_config(&alice, config).unwrap();
        let bob = ledger.create_keypair().unwrap();

        let tx = ledger
            .create_transaction(
                &alice,
                alice.address(),
                bob.address(),
                Amount::from_num(10),
                Amount::from_num(1),
            )
            .unwrap();
        ledger.receive_transaction(tx).unwrap();
        let block = ledger
            .mine_pending_transactions(&alice, alice.address())
            .unwrap();
        ledger.try_append_block(block).unwrap();
        (alice, ledger)
    }

    #[test]
    fn test_valid_chain_passes() {
        let (_, ledger) = mined_ledger();
        assert!(ledger.is_chain_valid());
    }

    #[test]
    fn test_flipped_amount_detected() {
        let (_, mut ledger) = mined_ledger();
        ledger.chain[1].transactions[0].amount = Amount::from_num(9999);
        assert!(!ledger.is_chain_valid());
    }

    #[test]
    fn test_flipped_previous_hash_detected() {
        let (_, mut ledger) = mined_ledger();
        ledger.chain[1].previous_hash = [9u8; 32];
        assert!(!ledger.is_chain_valid());
    }

    #[test]
    fn test_flipped_stored_hash_detected() {
        let (_, mut ledger) = mined_ledger();
        ledger.chain[1].hash = [9u8; 32];
        assert!(!ledger.is_chain_valid());
    }

    #[test]
    fn test_tampered_genesis_detected() {
        let (_, mut ledger) = mined_ledger();
        ledger.chain[0].nonce += 1;
        assert!(!ledger.is_chain_valid());
    }

    #[test]
    fn test_non_increasing_timestamp_detected() {
        let (_, mut ledger) = mined_ledger();
        let genesis_ts = ledger.chain[0].timestamp_ms;
        ledger.chain[1].timestamp_ms = genesis_ts;
        // Reseal so only the timestamp rule trips, not the hash check
        ledger.chain[1].hash = ledger.chain[1].compute_hash();
        assert!(!ledger.is_chain_valid());
    }
}
