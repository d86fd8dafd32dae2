use async_trait::async_trait;
use futures::future::join_all;
use log::{debug, info, warn};
use thiserror::Error;

use std::sync::Arc;

use super::block::Block;
use super::chain::{is_valid_chain, Blockchain};
use super::transaction::TransactionRequest;

/// Errors that can occur while talking to a peer
#[derive(Debug, Error)]
pub enum PeerError {
    #[error("Peer {peer} is unreachable: {reason}")]
    Unreachable { peer: String, reason: String },

    #[error("Peer {peer} answered with status {status}")]
    Status { peer: String, status: u16 },

    #[error("Malformed response from peer {peer}: {reason}")]
    Malformed { peer: String, reason: String },
}

/// Everything this node asks of its peers.
///
/// Peers are named by `host:port`. How the request travels is up to the
/// implementation; the consensus rule only needs `fetch_chain`.
#[async_trait]
pub trait PeerClient: Send + Sync {
    /// Fetches the peer's full chain, genesis first
    async fn fetch_chain(&self, peer: &str) -> Result<Vec<Block>, PeerError>;

    /// Forwards a signed transaction for admission into the peer's pool
    async fn relay_transaction(&self, peer: &str, request: &TransactionRequest) -> Result<(), PeerError>;

    /// Asks the peer to run conflict resolution
    async fn request_consensus(&self, peer: &str) -> Result<(), PeerError>;
}

/// Longest-valid-chain conflict resolution.
///
/// A peer chain is adopted only when it is valid and strictly longer than
/// both the local chain and every other valid peer chain seen before it.
/// Unreachable peers and invalid chains are skipped.
pub struct ConsensusResolver {
    blockchain: Arc<Blockchain>,
    client: Arc<dyn PeerClient>,
}

impl ConsensusResolver {
    pub fn new(blockchain: Arc<Blockchain>, client: Arc<dyn PeerClient>) -> Self {
        ConsensusResolver { blockchain, client }
    }

    /// Fetches every peer's chain and adopts the longest valid one if it beats ours.
    ///
    /// Returns true when the local chain was replaced.
    pub async fn resolve(&self, peers: &[String]) -> bool {
        let difficulty = self.blockchain.params().difficulty;
        let local_len = self.blockchain.len();

        let fetches = peers.iter().map(|peer| async move { (peer, self.client.fetch_chain(peer).await) });
        let results = join_all(fetches).await;

        let mut best: Option<(&String, Vec<Block>)> = None;
        for (peer, result) in results {
            let chain = match result {
                Ok(chain) => chain,
                Err(err) => {
                    warn!("Skipping peer during consensus: {}", err);
                    continue;
                }
            };

            let best_len = best.as_ref().map_or(local_len, |(_, chain)| chain.len());
            if chain.len() <= best_len {
                debug!("Peer {} has {} blocks, not longer than {}", peer, chain.len(), best_len);
                continue;
            }

            if !is_valid_chain(&chain, difficulty) {
                warn!("Peer {} sent an invalid chain of {} blocks", peer, chain.len());
                continue;
            }

            best = Some((peer, chain));
        }

        let Some((peer, chain)) = best else {
            debug!("No peer has a longer valid chain");
            return false;
        };

        info!("Adopting chain of {} blocks from {}", chain.len(), peer);
        let blockchain = Arc::clone(&self.blockchain);
        match tokio::task::spawn_blocking(move || blockchain.replace_chain(chain)).await {
            Ok(replaced) => replaced,
            Err(err) => {
                warn!("Chain replacement task failed: {}", err);
                false
            }
        }
    }
}
