use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::block::{Block, BlockHash};
use super::crypto::{DigitalSignature, PublicKey};
use super::pool::TransactionPool;
use super::pow::{proof_of_work, validate_proof};
use super::transaction::{Transaction, ValidTransactionRequest};
use super::wallet::Address;

/// Leading zero hex digits required in a block hash
pub const DEFAULT_DIFFICULTY: u8 = 3;

/// Amount credited to the miner of each block
pub const DEFAULT_MINING_REWARD: f64 = 1.0;

/// Consensus parameters every node on a network must share
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChainParams {
    pub difficulty: u8,
    pub mining_reward: f64,
}

impl Default for ChainParams {
    fn default() -> Self {
        ChainParams {
            difficulty: DEFAULT_DIFFICULTY,
            mining_reward: DEFAULT_MINING_REWARD,
        }
    }
}

/// Everything a client or peer needs to see about a node's ledger
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChainSnapshot {
    pub chain: Vec<Block>,
    pub pool: Vec<Transaction>,
    #[schema(value_type = String)]
    pub address: Address,
    pub port: u16,
}

/// Checks that `blocks` is a chain this node would accept.
///
/// It must start at the shared genesis block, every block must point at the
/// hash of its predecessor, and every block after genesis must carry a valid
/// proof at `difficulty`.
pub fn is_valid_chain(blocks: &[Block], difficulty: u8) -> bool {
    let Some(first) = blocks.first() else {
        debug!("Rejecting empty chain");
        return false;
    };

    if *first != Block::genesis() {
        debug!("Rejecting chain with foreign genesis block");
        return false;
    }

    for (height, pair) in blocks.windows(2).enumerate() {
        let (previous, block) = (&pair[0], &pair[1]);

        if block.prev_hash != previous.hash() {
            debug!("Rejecting chain: block {} does not link to its predecessor", height + 1);
            return false;
        }

        if !validate_proof(block.nonce, &block.prev_hash, &block.transactions, difficulty) {
            debug!("Rejecting chain: block {} has an invalid proof", height + 1);
            return false;
        }
    }

    true
}

/// A node's ledger: the chain of mined blocks plus the pool of pending transactions.
///
/// Shared between request handlers and background tasks behind an `Arc`.
/// Lock order is mining, then chain, then pool.
#[derive(Debug)]
pub struct Blockchain {
    /// The chain of blocks, genesis first
    chain: RwLock<Vec<Block>>,

    /// Transactions waiting for the next block
    pool: Mutex<TransactionPool>,

    /// Held for the whole of a mining round
    mining: Mutex<()>,

    /// Chain replacements waiting for the mining lock
    pending_replacements: AtomicUsize,

    /// Set once on shutdown
    halted: AtomicBool,

    /// Address credited with mining rewards
    address: Address,

    /// Port this node serves on, reported in snapshots
    port: u16,

    params: ChainParams,
}

impl Blockchain {
    /// Creates a blockchain holding only the genesis block
    pub fn new(address: Address, port: u16, params: ChainParams) -> Self {
        Blockchain {
            chain: RwLock::new(vec![Block::genesis()]),
            pool: Mutex::new(TransactionPool::new()),
            mining: Mutex::new(()),
            pending_replacements: AtomicUsize::new(0),
            halted: AtomicBool::new(false),
            address,
            port,
            params,
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn params(&self) -> ChainParams {
        self.params
    }

    /// Gets the last block in the chain
    pub fn last_block(&self) -> Block {
        self.chain
            .read()
            .last()
            .cloned()
            .expect("chain always holds the genesis block")
    }

    /// Number of blocks, genesis included
    pub fn len(&self) -> usize {
        self.chain.read().len()
    }

    /// Validates the node's own chain with the rules applied to peers
    pub fn is_valid(&self) -> bool {
        is_valid_chain(&self.chain.read(), self.params.difficulty)
    }

    /// Admits a transaction into the pool.
    ///
    /// Rewards skip verification; everything else needs a key and a signature
    /// that verifies over the transaction. Sender balance is not checked.
    pub fn add_transaction(
        &self,
        sender: Address,
        recipient: Address,
        amount: f64,
        sender_public_key: Option<&PublicKey>,
        signature: Option<&DigitalSignature>,
    ) -> bool {
        let transaction = Transaction::new(sender, recipient, amount);

        if !transaction.is_reward() {
            let verified = match (sender_public_key, signature) {
                (Some(public_key), Some(signature)) => transaction.verify(public_key, signature),
                _ => false,
            };

            if !verified {
                warn!("Invalid transaction from {}", transaction.sender_address);
                return false;
            }
        }

        let mut pool = self.pool.lock();
        debug!(
            "Admitted transaction {} -> {} ({}), {} pending",
            transaction.sender_address,
            transaction.recipient_address,
            transaction.amount,
            pool.len() + 1
        );
        pool.push(transaction);
        true
    }

    /// Admits a submission that already passed request validation
    pub fn submit(&self, request: &ValidTransactionRequest) -> bool {
        let transaction = &request.transaction;
        self.add_transaction(
            transaction.sender_address.clone(),
            transaction.recipient_address.clone(),
            transaction.amount,
            Some(&request.sender_public_key),
            Some(&request.signature),
        )
    }

    /// Returns an independent copy of the pending transactions
    pub fn copy_pool(&self) -> Vec<Transaction> {
        self.pool.lock().snapshot()
    }

    /// Drops every pending transaction
    pub fn clear_pool(&self) {
        self.pool.lock().clear();
    }

    fn should_stop(&self) -> bool {
        self.halted.load(Ordering::Relaxed) || self.pending_replacements.load(Ordering::Relaxed) > 0
    }

    /// Runs one mining round.
    ///
    /// Returns false without doing anything when the pool is empty or another
    /// round is already running, and false after the search when it was
    /// cancelled or the chain tip moved underneath it.
    pub fn mine(&self) -> bool {
        let Some(_mining) = self.mining.try_lock() else {
            debug!("Mining already in progress");
            return false;
        };

        let pending = {
            let pool = self.pool.lock();
            if pool.is_empty() {
                debug!("No transactions to mine");
                return false;
            }
            pool.snapshot()
        };

        let prev_hash = self.tip();

        let mut transactions = pending.clone();
        transactions.push(Transaction::reward(self.address.clone(), self.params.mining_reward));

        let Some(nonce) = proof_of_work(&prev_hash, &transactions, self.params.difficulty, || self.should_stop()) else {
            info!("Mining cancelled");
            return false;
        };

        let mut chain = self.chain.write();
        let tip = chain.last().map(Block::hash);
        if tip != Some(prev_hash) {
            warn!("Chain changed during mining, discarding nonce {}", nonce);
            return false;
        }

        chain.push(Block::new(nonce, prev_hash, transactions));
        self.pool.lock().remove_sealed(&pending);

        info!(
            "Mined block {} with {} transactions (nonce {})",
            chain.len() - 1,
            pending.len() + 1,
            nonce
        );
        true
    }

    /// Gets the balance of `address` by replaying every sealed transaction
    pub fn get_balance(&self, address: &Address) -> f64 {
        let chain = self.chain.read();

        let mut balance = 0.0;
        for transaction in chain.iter().flat_map(|block| block.transactions.iter()) {
            if &transaction.sender_address == address {
                balance -= transaction.amount;
            }
            if &transaction.recipient_address == address {
                balance += transaction.amount;
            }
        }
        balance
    }

    /// Replaces the whole chain with `candidate` if it is valid and strictly longer.
    ///
    /// An in-flight mining round is cancelled first. The pool is cleared on
    /// replacement.
    pub fn replace_chain(&self, candidate: Vec<Block>) -> bool {
        if candidate.len() <= self.len() {
            return false;
        }

        if !is_valid_chain(&candidate, self.params.difficulty) {
            warn!("Refusing to adopt an invalid chain of {} blocks", candidate.len());
            return false;
        }

        self.pending_replacements.fetch_add(1, Ordering::Relaxed);
        let _mining = self.mining.lock();
        self.pending_replacements.fetch_sub(1, Ordering::Relaxed);

        let mut chain = self.chain.write();
        if candidate.len() <= chain.len() {
            return false;
        }

        info!("Replacing chain of {} blocks with chain of {} blocks", chain.len(), candidate.len());
        *chain = candidate;
        self.pool.lock().clear();
        true
    }

    /// Cancels any running search and every future one. Used on shutdown.
    pub fn halt(&self) {
        self.halted.store(true, Ordering::Relaxed);
    }

    /// Captures the chain and pool at one instant
    pub fn snapshot(&self) -> ChainSnapshot {
        let chain = self.chain.read();
        let pool = self.pool.lock();

        ChainSnapshot {
            chain: chain.clone(),
            pool: pool.snapshot(),
            address: self.address.clone(),
            port: self.port,
        }
    }

    /// Hash of the last block
    pub fn tip(&self) -> BlockHash {
        self.last_block().hash()
    }
}
