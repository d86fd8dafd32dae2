// Blockchain module
//
// This module contains the ledger core:
// - Key and signature codec
// - Wallets and addresses
// - Transactions and submission requests
// - Blocks and the hash chain
// - Pending transaction pool
// - Proof of work
// - Longest-chain consensus

pub mod block;
pub mod chain;
pub mod consensus;
pub mod crypto;
pub mod pool;
pub mod pow;
pub mod transaction;
pub mod wallet;

// Re-export main components for easier access
pub use block::Block;
pub use chain::{Blockchain, ChainParams, ChainSnapshot};
pub use consensus::{ConsensusResolver, PeerClient, PeerError};
pub use crypto::CryptoError;
pub use transaction::{RequestError, Transaction, TransactionRequest};
pub use wallet::{Address, Wallet};
