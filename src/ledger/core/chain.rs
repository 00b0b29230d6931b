use crate::config::ChainConfig;
use crate::crypto::{Address, KeyPair};
use crate::error::{ChainError, Result};
use crate::ledger::core::state::AccountState;
use crate::mempool::PendingPool;
use crate::miner::{mine_block, CancelFlag};
use crate::transaction::{Amount, Transaction};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;

pub type Sha256Hash = [u8; 32];

/// All-zero predecessor hash of the genesis block.
pub const ZERO_HASH: Sha256Hash = [0u8; 32];

/// An ordered batch of transactions sealed against the previous block and a
/// snapshot of account balances. Immutable once sealed; mining only advances
/// the nonce and recomputes the hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub timestamp_ms: u64,
    pub previous_hash: Sha256Hash,
    pub transactions: Vec<Transaction>,
    /// Address-sorted balances at sealing time, fixed for reproducible hashing.
    pub balance_snapshot: Vec<(Address, Amount)>,
    pub nonce: u64,
    pub hash: Sha256Hash,
}

impl Block {
    /// Builds the immutable fields and computes the content hash once.
    /// The snapshot is sorted by address before hashing.
    pub fn seal(
        timestamp_ms: u64,
        previous_hash: Sha256Hash,
        transactions: Vec<Transaction>,
        mut balance_snapshot: Vec<(Address, Amount)>,
    ) -> Self {
        balance_snapshot.sort_unstable_by_key(|(address, _)| *address);
        let mut block = Block {
            timestamp_ms,
            previous_hash,
            transactions,
            balance_snapshot,
            nonce: 0,
            hash: ZERO_HASH,
        };
        block.hash = block.compute_hash();
        block
    }

    /// Recomputes the content hash over
    /// (timestamp, previous hash, transactions, nonce, sorted snapshot).
    pub fn compute_hash(&self) -> Sha256Hash {
        let mut hasher = Sha256::new();
        hasher.update(self.timestamp_ms.to_le_bytes());
        hasher.update(self.previous_hash);
        for tx in &self.transactions {
            hasher.update(tx.signable_message());
            if let Some(signature) = &tx.signature {
                hasher.update(signature);
            }
        }
        hasher.update(self.nonce.to_le_bytes());
        for (address, balance) in &self.balance_snapshot {
            hasher.update(address.as_bytes());
            hasher.update(balance.to_le_bytes());
        }
        hasher.finalize().into()
    }

    /// Proof-of-work target check: the hash must start with `difficulty`
    /// zero hex digits (nibbles, not bits).
    pub fn meets_difficulty(hash: &Sha256Hash, difficulty: u32) -> bool {
        let mut remaining = difficulty as usize;
        for byte in hash {
            if remaining == 0 {
                return true;
            }
            if remaining >= 2 {
                if *byte != 0 {
                    return false;
                }
                remaining -= 2;
            } else {
                return byte >> 4 == 0;
            }
        }
        remaining == 0
    }
}

/// One participant's ledger: the chain of blocks, the account registry and
/// balances, and the pending transaction pool.
///
/// `Clone` is a structural deep copy of every container, so cloned ledgers
/// never share mutable state. The chain always contains at least the genesis
/// block; fork handling replaces a contiguous suffix, never the genesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ledger {
    pub chain: Vec<Block>,
    pub difficulty: u32,
    pub mining_reward: Amount,
    pub source_address: Address,
    pub state: AccountState,
    pub pending_pool: PendingPool,
    max_transaction_bytes: usize,
}

impl Ledger {
    /// Creates a ledger with default parameters, registering the creator's
    /// key pair and minting the genesis reward to its address.
    pub fn new(keypair: &KeyPair) -> Result<Self> {
        Self::with_config(keypair, ChainConfig::default())
    }

    pub fn with_config(keypair: &KeyPair, config: ChainConfig) -> Result<Self> {
        config.validate()?;
        let mut ledger = Ledger {
            chain: Vec::new(),
            difficulty: config.difficulty,
            mining_reward: config.reward_amount()?,
            source_address: Address::ZERO,
            state: AccountState::new(),
            pending_pool: PendingPool::with_capacity(config.max_pool_size),
            max_transaction_bytes: config.max_transaction_bytes,
        };
        ledger.state.track_balance(ledger.source_address);
        ledger.register_keypair(keypair);

        let genesis = ledger.create_genesis_block(keypair, keypair.address())?;
        ledger.chain.push(genesis);
        Ok(ledger)
    }

    /// Mints the initial reward and seals block 0 with the zero-hash
    /// predecessor. Fails on a non-empty chain.
    pub fn create_genesis_block(
        &mut self,
        keypair: &KeyPair,
        reward_address: Address,
    ) -> Result<Block> {
        if !self.chain.is_empty() {
            return Err(ChainError::InvalidBlock(
                "genesis can only be created on an empty chain".to_string(),
            ));
        }

        let mut reward = Transaction::new(
            self.source_address,
            reward_address,
            self.mining_reward,
            Amount::ZERO,
        );
        reward.sign(keypair)?;
        self.state.apply_transaction(&reward)?;

        Ok(Block::seal(
            chrono::Utc::now().timestamp_millis() as u64,
            ZERO_HASH,
            vec![reward],
            self.state.snapshot(),
        ))
    }

    /// Registers an address given in textual form. A format failure is
    /// log-only: the registry is left untouched.
    pub fn register_address(&mut self, public_key: &[u8], address: &str) {
        match address.parse::<Address>() {
            Ok(parsed) => self.state.register(parsed, public_key),
            Err(e) => warn!("rejected address registration: {}", e),
        }
    }

    pub fn register_keypair(&mut self, keypair: &KeyPair) {
        self.state
            .register(keypair.address(), &keypair.public_key_bytes());
    }

    /// Generates a fresh key pair and registers its address.
    pub fn create_keypair(&mut self) -> Result<KeyPair> {
        let keypair = KeyPair::generate()?;
        self.register_keypair(&keypair);
        Ok(keypair)
    }

    pub fn last_block(&self) -> &Block {
        self.chain
            .last()
            .expect("chain always contains the genesis block")
    }

    pub fn chain_len(&self) -> usize {
        self.chain.len()
    }

    pub fn contains_block(&self, hash: &Sha256Hash) -> bool {
        self.chain.iter().any(|block| block.hash == *hash)
    }

    pub fn contains_pending_signature(&self, signature: &[u8]) -> bool {
        self.pending_pool.contains_signature(signature)
    }

    pub fn balance_of(&self, address: &Address) -> Amount {
        self.state.balance_of(address)
    }

    /// Block timestamps must be strictly increasing, so back-to-back mining
    /// within one millisecond bumps the clock by one.
    fn next_block_timestamp(&self) -> u64 {
        let now = chrono::Utc::now().timestamp_millis() as u64;
        now.max(self.last_block().timestamp_ms + 1)
    }

    /// Builds and signs a transfer. Pool insertion and propagation are the
    /// caller's (the node's) responsibility, keeping validation decoupled
    /// from gossip.
    pub fn create_transaction(
        &self,
        keypair: &KeyPair,
        from: Address,
        to: Address,
        amount: Amount,
        fee: Amount,
    ) -> Result<Transaction> {
        if amount < Amount::ZERO || fee < Amount::ZERO {
            return Err(ChainError::InvalidTransaction(
                "amount and fee must be non-negative".to_string(),
            ));
        }

        if from != self.source_address {
            let balance = self.state.balance_of(&from);
            if balance < amount + fee {
                return Err(ChainError::InsufficientBalance {
                    address: from,
                    needed: amount + fee,
                    available: balance,
                });
            }
        }

        let mut tx = Transaction::new(from, to, amount, fee);
        tx.sign(keypair)?;
        tx.validate_size(self.max_transaction_bytes)?;
        Ok(tx)
    }

    /// Validates a gossiped transaction against the registry and balances,
    /// then enqueues it into the pending pool.
    pub fn receive_transaction(&mut self, tx: Transaction) -> Result<()> {
        tx.validate_size(self.max_transaction_bytes)?;

        let balance = self.state.balance_of(&tx.from);
        if balance < tx.amount + tx.fee {
            return Err(ChainError::InsufficientBalance {
                address: tx.from,
                needed: tx.amount + tx.fee,
                available: balance,
            });
        }

        let public_key = self.state.public_key_of(&tx.from).ok_or_else(|| {
            ChainError::InvalidSignature(format!("no registered key for {}", tx.from))
        })?;
        if !tx.verify(public_key) {
            return Err(ChainError::InvalidSignature(format!(
                "signature does not match registered key for {}",
                tx.from
            )));
        }

        self.pending_pool.insert(tx)
    }

    /// Filters the pending pool in place, keeping only transactions whose
    /// signature verifies against the registry and whose source balance
    /// covers amount + fee.
    pub fn validate_pending_pool(&mut self) {
        let state = &self.state;
        self.pending_pool.retain(|tx| {
            let covered = state.balance_of(&tx.from) >= tx.amount + tx.fee;
            let verified = state
                .public_key_of(&tx.from)
                .is_some_and(|key| tx.verify(key));
            if covered && verified {
                true
            } else {
                warn!("dropping invalid pooled transaction from {} to {}", tx.from, tx.to);
                false
            }
        });
    }

    pub fn total_pending_fees(&self) -> Amount {
        self.pending_pool
            .iter()
            .fold(Amount::ZERO, |acc, tx| acc + tx.fee)
    }

    /// Validates the pool, mints a reward of `mining_reward + total fees`
    /// from the source address, and seals a block over pool ∪ {reward} and
    /// the current balances. No proof-of-work is run; callers that want to
    /// keep serving gossip can run the nonce search without holding the
    /// ledger.
    pub fn prepare_block(&mut self, keypair: &KeyPair, reward_address: Address) -> Result<Block> {
        self.validate_pending_pool();
        let total_fees = self.total_pending_fees();

        let reward = self.create_transaction(
            keypair,
            self.source_address,
            reward_address,
            self.mining_reward + total_fees,
            Amount::ZERO,
        )?;

        let mut transactions = self.pending_pool.transactions();
        transactions.push(reward);

        Ok(Block::seal(
            self.next_block_timestamp(),
            self.last_block().hash,
            transactions,
            self.state.snapshot(),
        ))
    }

    /// [`Self::prepare_block`] plus the proof-of-work search.
    ///
    /// The chain is not appended and the pool not cleared here; the caller
    /// commits the block through the same acceptance path as a received one.
    pub fn mine_pending_transactions(
        &mut self,
        keypair: &KeyPair,
        reward_address: Address,
    ) -> Result<Block> {
        let block = self.prepare_block(keypair, reward_address)?;
        mine_block(block, self.difficulty, &CancelFlag::new())
    }

    /// Appends a received block after integrity checks.
    ///
    /// A previous-hash mismatch against the local tip is a fork, reported as
    /// [`ChainError::ForkDetected`] so the caller can trigger resolution. A
    /// post-append validation failure rolls the append back.
    pub fn try_append_block(&mut self, block: Block) -> Result<()> {
        if block.hash != block.compute_hash() {
            return Err(ChainError::InvalidBlock(
                "stored hash does not match recomputed contents".to_string(),
            ));
        }

        if block.previous_hash != self.last_block().hash {
            return Err(ChainError::ForkDetected);
        }

        let transactions = block.transactions.clone();
        self.chain.push(block);
        if let Err(reason) = self.validate_chain() {
            self.chain.pop();
            return Err(reason);
        }

        // Replay balances on a scratch copy so a replay failure cannot leave
        // the book half-updated.
        let mut next_state = self.state.clone();
        if let Err(reason) = next_state.apply_block(&transactions) {
            self.chain.pop();
            return Err(reason);
        }
        self.state = next_state;

        self.pending_pool.remove_included(&transactions);
        Ok(())
    }

    /// Every transaction touching the address, in chain order.
    pub fn transaction_history(&self, address: &Address) -> Vec<Transaction> {
        self.chain
            .iter()
            .flat_map(|block| block.transactions.iter())
            .filter(|tx| tx.from == *address || tx.to == *address)
            .cloned()
            .collect()
    }
}
