//! Peer gossip and fork resolution
//!
//! A [`Node`] wraps one [`Ledger`] behind a single mutual-exclusion domain
//! and talks to peers through [`PeerLink`] handles. Links here are in-process
//! object references; a real transport only has to swap the link type, not
//! the gossip or fork logic.
//!
//! Propagation is an idempotent flood-fill: a node that already holds a
//! transaction (by signature) or block (by hash) stops forwarding, which is
//! what bounds gossip in cyclic peer graphs. The ledger lock is never held
//! across a peer call.

use crate::crypto::{Address, KeyPair};
use crate::error::{ChainError, Result};
use crate::ledger::core::chain::{Block, Ledger};
use crate::miner::{mine_block, spawn_miner, CancelFlag};
use crate::transaction::{Amount, Transaction};
use crossbeam_channel::{bounded, Receiver};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use tracing::{debug, info, warn};

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(0);

/// A unit of gossip between peers.
#[derive(Debug, Clone)]
pub enum GossipMessage {
    Transaction(Transaction),
    Block(Block),
    /// A full candidate ledger offered during fork resolution.
    Chain(Box<Ledger>),
}

/// One directed edge to a peer. The in-process implementation is
/// [`LocalLink`]; a networked deployment would implement this over a wire
/// protocol instead.
pub trait PeerLink: Send + Sync {
    /// Best-effort delivery; a dead peer drops the message.
    fn deliver(&self, message: GossipMessage);

    /// Deep copy of the peer's current ledger, used when scanning for the
    /// longest valid chain.
    fn ledger_snapshot(&self) -> Option<Ledger>;

    /// Stable identity of the peer behind this link, when still reachable.
    fn peer_id(&self) -> Option<u64>;
}

/// Direct in-process reference to another node. Holds a weak back-reference:
/// peers are not kept alive (or destroyed) by the nodes pointing at them.
pub struct LocalLink {
    peer: Weak<Node>,
}

impl LocalLink {
    pub fn new(node: &Arc<Node>) -> Self {
        LocalLink {
            peer: Arc::downgrade(node),
        }
    }
}

impl PeerLink for LocalLink {
    fn deliver(&self, message: GossipMessage) {
        let Some(node) = self.peer.upgrade() else {
            return;
        };
        match message {
            GossipMessage::Transaction(tx) => {
                node.broadcast_transaction(tx);
            }
            GossipMessage::Block(block) => {
                node.broadcast_block(block);
            }
            GossipMessage::Chain(candidate) => node.propagate_blockchain(&candidate),
        }
    }

    fn ledger_snapshot(&self) -> Option<Ledger> {
        self.peer.upgrade().map(|node| node.ledger.lock().clone())
    }

    fn peer_id(&self) -> Option<u64> {
        self.peer.upgrade().map(|node| node.id)
    }
}

/// A network participant: one ledger plus a set of peer links.
pub struct Node {
    id: u64,
    ledger: Mutex<Ledger>,
    peers: Mutex<Vec<Arc<dyn PeerLink>>>,
}

impl Node {
    pub fn new(ledger: Ledger) -> Arc<Self> {
        Arc::new(Node {
            id: NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed),
            ledger: Mutex::new(ledger),
            peers: Mutex::new(Vec::new()),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Connects two nodes symmetrically. Self-connections and duplicate
    /// links are ignored.
    pub fn connect(a: &Arc<Node>, b: &Arc<Node>) {
        if a.id == b.id {
            return;
        }
        a.add_peer_link(Arc::new(LocalLink::new(b)));
        b.add_peer_link(Arc::new(LocalLink::new(a)));
    }

    pub fn add_peer_link(&self, link: Arc<dyn PeerLink>) {
        let mut peers = self.peers.lock();
        if let Some(id) = link.peer_id() {
            if id == self.id || peers.iter().any(|peer| peer.peer_id() == Some(id)) {
                return;
            }
        }
        peers.push(link);
    }

    pub fn peer_count(&self) -> usize {
        self.peers.lock().len()
    }

    /// Snapshot of the peer list. Taken before every forwarding pass, so a
    /// peer added mid-broadcast may or may not see that message.
    fn peer_links(&self) -> Vec<Arc<dyn PeerLink>> {
        self.peers.lock().clone()
    }

    /// New participant joining with the same history: a deep copy of the
    /// ledger and an empty peer set.
    pub fn clone_node(&self) -> Arc<Node> {
        Node::new(self.ledger.lock().clone())
    }

    pub fn with_ledger<R>(&self, f: impl FnOnce(&Ledger) -> R) -> R {
        f(&self.ledger.lock())
    }

    /// Direct mutable ledger access, for simulation harnesses and tests
    /// (e.g. popping a block to fake a stale node).
    pub fn with_ledger_mut<R>(&self, f: impl FnOnce(&mut Ledger) -> R) -> R {
        f(&mut self.ledger.lock())
    }

    pub fn chain_len(&self) -> usize {
        self.ledger.lock().chain_len()
    }

    pub fn balance_of(&self, address: &Address) -> Amount {
        self.ledger.lock().balance_of(address)
    }

    /// Builds and signs a transfer through the ledger, then gossips it.
    pub fn create_transaction(
        &self,
        keypair: &KeyPair,
        from: Address,
        to: Address,
        amount: Amount,
        fee: Amount,
    ) -> Result<Transaction> {
        let tx = self
            .ledger
            .lock()
            .create_transaction(keypair, from, to, amount, fee)?;
        self.broadcast_transaction(tx.clone());
        Ok(tx)
    }

    /// Assembles and seals a block under the lock, runs proof-of-work with
    /// the lock released (gossip keeps flowing while the search runs), then
    /// commits the block locally and gossips it.
    pub fn mine_pending_transactions(
        &self,
        keypair: &KeyPair,
        reward_address: Address,
    ) -> Result<Block> {
        self.mine_with_cancel(keypair, reward_address, &CancelFlag::new())
    }

    pub fn mine_with_cancel(
        &self,
        keypair: &KeyPair,
        reward_address: Address,
        cancel: &CancelFlag,
    ) -> Result<Block> {
        let (prepared, difficulty) = {
            let mut ledger = self.ledger.lock();
            let block = ledger.prepare_block(keypair, reward_address)?;
            (block, ledger.difficulty)
        };

        let mined = mine_block(prepared, difficulty, cancel)?;

        if !self.broadcast_block(mined.clone()) {
            return Err(ChainError::InvalidBlock(
                "mined block was not accepted locally".to_string(),
            ));
        }
        Ok(mined)
    }

    /// Runs the nonce search on a worker thread and commits the mined block
    /// through the broadcast path once it lands, so the node keeps serving
    /// gossip for the whole search. The committed block (or the search
    /// failure) arrives on the returned channel; raising the flag aborts
    /// the search. The worker holds only a weak node reference, so dropping
    /// the node abandons the search instead of keeping it alive.
    pub fn mine_in_background(
        self: &Arc<Self>,
        keypair: &KeyPair,
        reward_address: Address,
    ) -> Result<(CancelFlag, Receiver<Result<Block>>)> {
        let (prepared, difficulty) = {
            let mut ledger = self.ledger.lock();
            let block = ledger.prepare_block(keypair, reward_address)?;
            (block, ledger.difficulty)
        };

        let (cancel, mined_rx) = spawn_miner(prepared, difficulty);
        let (sender, receiver) = bounded(1);
        let node = Arc::downgrade(self);
        thread::spawn(move || {
            let outcome = match mined_rx.recv() {
                Ok(Ok(mined)) => match node.upgrade() {
                    Some(node) if node.broadcast_block(mined.clone()) => Ok(mined),
                    Some(_) => Err(ChainError::InvalidBlock(
                        "mined block was not accepted locally".to_string(),
                    )),
                    None => Err(ChainError::MiningCancelled),
                },
                Ok(Err(reason)) => Err(reason),
                Err(_) => Err(ChainError::MiningCancelled),
            };
            let _ = sender.send(outcome);
        });

        Ok((cancel, receiver))
    }

    /// Idempotent transaction flood-fill: stops if the pool already holds
    /// the signature, forwards only after successful local acceptance.
    pub fn broadcast_transaction(&self, tx: Transaction) -> bool {
        let accepted = {
            let mut ledger = self.ledger.lock();
            if let Some(signature) = &tx.signature {
                if ledger.contains_pending_signature(signature) {
                    debug!("transaction already pooled; gossip stops here");
                    return false;
                }
            }
            match ledger.receive_transaction(tx.clone()) {
                Ok(()) => true,
                Err(reason) => {
                    warn!("rejected gossiped transaction: {}", reason);
                    false
                }
            }
        };

        if accepted {
            for link in self.peer_links() {
                link.deliver(GossipMessage::Transaction(tx.clone()));
            }
        }
        accepted
    }

    /// Idempotent block flood-fill, mirroring [`Self::broadcast_transaction`]
    /// with chain containment as the stop condition.
    pub fn broadcast_block(&self, block: Block) -> bool {
        if self.ledger.lock().contains_block(&block.hash) {
            debug!("block already on chain; gossip stops here");
            return false;
        }

        if !self.receive_block(block.clone()) {
            return false;
        }

        for link in self.peer_links() {
            link.deliver(GossipMessage::Block(block.clone()));
        }
        true
    }

    /// Validates and appends a gossiped block. A previous-hash mismatch
    /// against the local tip means a fork: resolution runs instead of an
    /// outright rejection, and the block itself is not kept.
    pub fn receive_block(&self, block: Block) -> bool {
        let outcome = { self.ledger.lock().try_append_block(block) };
        match outcome {
            Ok(()) => true,
            Err(ChainError::ForkDetected) => {
                warn!("blockchain fork detected; resolving against peers");
                self.resolve_conflicts();
                false
            }
            Err(reason) => {
                warn!("rejected gossiped block: {}", reason);
                false
            }
        }
    }

    /// Validates a gossiped transaction and enqueues it. Failures are not
    /// retried.
    pub fn receive_transaction(&self, tx: Transaction) -> bool {
        match self.ledger.lock().receive_transaction(tx) {
            Ok(()) => true,
            Err(reason) => {
                warn!("rejected gossiped transaction: {}", reason);
                false
            }
        }
    }

    /// Scans all peers for the strictly longest internally valid chain and
    /// adopts it. Equal-length competitors are never adopted.
    pub fn resolve_conflicts(&self) {
        let mut best: Option<Ledger> = None;
        let mut best_len = self.ledger.lock().chain_len();

        for link in self.peer_links() {
            let Some(candidate) = link.ledger_snapshot() else {
                continue;
            };
            if candidate.chain_len() > best_len && candidate.is_chain_valid() {
                best_len = candidate.chain_len();
                best = Some(candidate);
            }
        }

        if let Some(winner) = best {
            info!("replacing chain with the longest valid chain ({} blocks)", best_len);
            self.propagate_blockchain(&winner);
        }
    }

    /// Adopts the candidate if it wins locally, then offers it onward.
    /// Recursing only after a successful replacement bounds propagation to
    /// once per node per adopted chain: every adoption strictly grows the
    /// local chain, so the flood terminates even in cyclic peer graphs.
    pub fn propagate_blockchain(&self, candidate: &Ledger) {
        if self.synchronize_blockchain(candidate) {
            for link in self.peer_links() {
                link.deliver(GossipMessage::Chain(Box::new(candidate.clone())));
            }
        }
    }

    /// Replaces the local ledger with a deep copy of the candidate, but only
    /// when the candidate is strictly longer and independently valid.
    pub fn synchronize_blockchain(&self, candidate: &Ledger) -> bool {
        let mut ledger = self.ledger.lock();
        if candidate.chain_len() <= ledger.chain_len() {
            return false;
        }
        if !candidate.is_chain_valid() {
            warn!("refusing to adopt an invalid candidate chain");
            return false;
        }
        *ledger = candidate.clone();
        true
    }
}
