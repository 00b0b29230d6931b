//! Proof-of-work search
//!
//! Mining is the only CPU-bound long-running operation in the crate. The
//! nonce search is cancelable at any point and never touches a ledger; the
//! caller commits a mined block through the normal acceptance path.

use crate::error::{ChainError, Result};
use crate::ledger::core::chain::Block;
use crossbeam_channel::{bounded, Receiver};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

/// How many nonces to try between cancellation checks.
const CANCEL_CHECK_INTERVAL: u64 = 1024;

/// Shared cancellation flag for an in-flight proof-of-work search.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Increments the nonce and recomputes the hash until it meets the
/// difficulty target. On nonce overflow the timestamp is bumped, reseeding
/// the search space. Returns [`ChainError::MiningCancelled`] if the flag is
/// raised mid-search; the block is dropped, so cancellation at any nonce is
/// safe.
pub fn mine_block(mut block: Block, difficulty: u32, cancel: &CancelFlag) -> Result<Block> {
    let mut since_check = 0u64;
    loop {
        if Block::meets_difficulty(&block.hash, difficulty) {
            return Ok(block);
        }

        since_check += 1;
        if since_check >= CANCEL_CHECK_INTERVAL {
            since_check = 0;
            if cancel.is_cancelled() {
                return Err(ChainError::MiningCancelled);
            }
        }

        block.nonce = block.nonce.wrapping_add(1);
        if block.nonce == 0 {
            block.timestamp_ms += 1;
        }
        block.hash = block.compute_hash();
    }
}

/// Runs the nonce search on a worker thread so the caller can keep
/// processing gossip. The result arrives on the returned channel; raising
/// the flag makes the worker report [`ChainError::MiningCancelled`].
pub fn spawn_miner(
    block: Block,
    difficulty: u32,
) -> (CancelFlag, Receiver<Result<Block>>) {
    let cancel = CancelFlag::new();
    let worker_cancel = cancel.clone();
    let (sender, receiver) = bounded(1);

    thread::spawn(move || {
        let outcome = mine_block(block, difficulty, &worker_cancel);
        // The receiver may have gone away; nothing to do then.
        let _ = sender.send(outcome);
    });

    (cancel, receiver)
}
