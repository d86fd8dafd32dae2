//! The running node: one ledger, its neighbors, and the background tasks
//! that mine and synchronize on timers.

use futures::future::join_all;
use log::{debug, info, warn};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use std::sync::Arc;
use std::time::Duration;

use crate::blockchain::{Blockchain, ConsensusResolver, PeerClient, RequestError, TransactionRequest};
use crate::network::Neighbors;

/// Wires the ledger to its peers and owns the periodic tasks.
///
/// Handlers and tasks only reach the ledger through [`Blockchain`]'s own
/// locked operations.
pub struct Node {
    blockchain: Arc<Blockchain>,
    neighbors: Arc<Neighbors>,
    client: Arc<dyn PeerClient>,
    resolver: Arc<ConsensusResolver>,
    mining_interval: Duration,
    sync_interval: Duration,
    miner: Mutex<Option<JoinHandle<()>>>,
    sync: Mutex<Option<JoinHandle<()>>>,
}

impl Node {
    pub fn new(
        blockchain: Arc<Blockchain>,
        neighbors: Arc<Neighbors>,
        client: Arc<dyn PeerClient>,
        mining_interval: Duration,
        sync_interval: Duration,
    ) -> Self {
        let resolver = Arc::new(ConsensusResolver::new(Arc::clone(&blockchain), Arc::clone(&client)));

        Node {
            blockchain,
            neighbors,
            client,
            resolver,
            mining_interval,
            sync_interval,
            miner: Mutex::new(None),
            sync: Mutex::new(None),
        }
    }

    pub fn blockchain(&self) -> &Arc<Blockchain> {
        &self.blockchain
    }

    /// Validates and admits a submission.
    ///
    /// `Err` means the request itself was incomplete or malformed; `Ok(false)`
    /// means it was well formed but the signature did not verify. Accepted
    /// client submissions are relayed to every neighbor when `relay` is set.
    pub async fn submit_transaction(&self, request: &TransactionRequest, relay: bool) -> Result<bool, RequestError> {
        let valid = request.validate()?;

        if !self.blockchain.submit(&valid) {
            return Ok(false);
        }

        if relay {
            let relayed = TransactionRequest::signed(&valid.transaction, &valid.sender_public_key, &valid.signature);
            let peers = self.neighbors.current();
            let sends = peers.iter().map(|peer| self.client.relay_transaction(peer, &relayed));
            for result in join_all(sends).await {
                if let Err(err) = result {
                    warn!("Failed to relay transaction: {}", err);
                }
            }
        }

        Ok(true)
    }

    /// Runs one mining round off the async runtime
    pub async fn mine(&self) -> bool {
        mining_round(&self.blockchain, &self.neighbors, &self.client).await
    }

    /// Starts mining on a timer. Returns false if it was already running.
    pub fn start_mining(&self) -> bool {
        let mut miner = self.miner.lock();
        if miner.as_ref().is_some_and(|task| !task.is_finished()) {
            return false;
        }

        let blockchain = Arc::clone(&self.blockchain);
        let neighbors = Arc::clone(&self.neighbors);
        let client = Arc::clone(&self.client);
        let period = self.mining_interval;

        *miner = Some(tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                mining_round(&blockchain, &neighbors, &client).await;
            }
        }));

        info!("Continuous mining started (every {:?})", period);
        true
    }

    /// Stops the mining timer. A round already searching runs to completion.
    pub fn stop_mining(&self) -> bool {
        match self.miner.lock().take() {
            Some(task) => {
                task.abort();
                info!("Continuous mining stopped");
                true
            }
            None => false,
        }
    }

    pub fn is_mining(&self) -> bool {
        self.miner.lock().as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Runs conflict resolution against the current neighbors
    pub async fn resolve_conflicts(&self) -> bool {
        let peers = self.neighbors.current();
        self.resolver.resolve(&peers).await
    }

    /// Starts the neighbor refresh + consensus timer
    pub fn start_sync(&self) {
        let mut sync = self.sync.lock();
        if sync.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }

        let neighbors = Arc::clone(&self.neighbors);
        let resolver = Arc::clone(&self.resolver);
        let period = self.sync_interval;

        *sync = Some(tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let peers = neighbors.refresh().await;
                if resolver.resolve(&peers).await {
                    info!("Chain replaced during periodic sync");
                }
            }
        }));
    }

    /// Stops every task and cancels any search in progress
    pub fn shutdown(&self) {
        self.stop_mining();
        if let Some(task) = self.sync.lock().take() {
            task.abort();
        }
        self.blockchain.halt();
        info!("Node stopped");
    }
}

/// Mines once on the blocking pool and, on success, asks neighbors to reconcile
async fn mining_round(blockchain: &Arc<Blockchain>, neighbors: &Neighbors, client: &Arc<dyn PeerClient>) -> bool {
    let worker = Arc::clone(blockchain);
    let mined = match tokio::task::spawn_blocking(move || worker.mine()).await {
        Ok(mined) => mined,
        Err(err) => {
            warn!("Mining task failed: {}", err);
            false
        }
    };

    if mined {
        let peers = neighbors.current();
        let requests = peers.iter().map(|peer| client.request_consensus(peer));
        for result in join_all(requests).await {
            if let Err(err) = result {
                debug!("Neighbor did not take the consensus request: {}", err);
            }
        }
    }

    mined
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::consensus::tests::MockPeers;
    use crate::blockchain::transaction::MINING_SENDER;
    use crate::blockchain::{Address, ChainParams, Transaction, Wallet};

    use tokio::net::TcpListener;

    const TEST_PARAMS: ChainParams = ChainParams {
        difficulty: 1,
        mining_reward: 1.0,
    };

    struct Harness {
        node: Node,
        peers: Arc<MockPeers>,
        neighbor: String,
        _listener: TcpListener,
    }

    /// A node with one reachable neighbor whose traffic lands in `MockPeers`
    async fn harness(mining_interval: Duration) -> Harness {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let neighbor = listener.local_addr().unwrap().to_string();

        let neighbors = Arc::new(Neighbors::new(vec![neighbor.clone()], Duration::from_secs(1)));
        neighbors.refresh().await;

        let peers = Arc::new(MockPeers::default());
        let blockchain = Arc::new(Blockchain::new(Wallet::new().address().clone(), 3000, TEST_PARAMS));
        let node = Node::new(
            blockchain,
            neighbors,
            peers.clone(),
            mining_interval,
            Duration::from_secs(60),
        );

        Harness {
            node,
            peers,
            neighbor,
            _listener: listener,
        }
    }

    fn signed_request(amount: f64) -> TransactionRequest {
        let sender = Wallet::new();
        let transaction = Transaction::new(sender.address().clone(), Address::from("bob"), amount);
        let signature = sender.sign(&transaction).unwrap();
        TransactionRequest::signed(&transaction, sender.public_key(), &signature)
    }

    #[tokio::test]
    async fn test_submission_is_relayed() {
        let h = harness(Duration::from_secs(60)).await;

        assert!(h.node.submit_transaction(&signed_request(2.0), true).await.unwrap());

        assert_eq!(h.node.blockchain().copy_pool().len(), 1);
        let relayed = h.peers.relayed.lock();
        assert_eq!(relayed.len(), 1);
        assert_eq!(relayed[0].0, h.neighbor);
        assert_eq!(relayed[0].1.amount, Some(2.0));
    }

    #[tokio::test]
    async fn test_peer_submission_is_not_relayed() {
        let h = harness(Duration::from_secs(60)).await;

        assert!(h.node.submit_transaction(&signed_request(2.0), false).await.unwrap());
        assert!(h.peers.relayed.lock().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_submissions() {
        let h = harness(Duration::from_secs(60)).await;

        let mut incomplete = signed_request(1.0);
        incomplete.sender_public_key = None;
        let result = h.node.submit_transaction(&incomplete, true).await;
        assert!(matches!(result, Err(RequestError::MissingField("senderPublicKey"))));

        let mut forged = signed_request(1.0);
        forged.amount = Some(100.0);
        assert!(!h.node.submit_transaction(&forged, true).await.unwrap());

        assert!(h.node.blockchain().copy_pool().is_empty());
        assert!(h.peers.relayed.lock().is_empty());
    }

    #[tokio::test]
    async fn test_mining_notifies_neighbors() {
        let h = harness(Duration::from_secs(60)).await;

        assert!(!h.node.mine().await);
        assert!(h.peers.consensus_requests.lock().is_empty());

        assert!(h.node.submit_transaction(&signed_request(1.0), false).await.unwrap());
        assert!(h.node.mine().await);

        assert_eq!(h.node.blockchain().len(), 2);
        assert_eq!(*h.peers.consensus_requests.lock(), vec![h.neighbor.clone()]);
    }

    #[tokio::test]
    async fn test_continuous_mining() {
        let h = harness(Duration::from_millis(20)).await;

        assert!(h.node.start_mining());
        assert!(!h.node.start_mining());
        assert!(h.node.is_mining());

        assert!(h.node.submit_transaction(&signed_request(1.0), false).await.unwrap());

        let mined = tokio::time::timeout(Duration::from_secs(10), async {
            while h.node.blockchain().len() < 2 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(mined.is_ok());

        assert!(h.node.stop_mining());
        assert!(!h.node.stop_mining());
        assert!(!h.node.is_mining());
    }

    #[tokio::test]
    async fn test_resolve_conflicts_uses_neighbors() {
        let h = harness(Duration::from_secs(60)).await;

        let remote = Blockchain::new(Wallet::new().address().clone(), 3001, TEST_PARAMS);
        assert!(remote.add_transaction(Address::from(MINING_SENDER), Address::from("x"), 1.0, None, None));
        assert!(remote.mine());
        h.peers.chains.lock().insert(h.neighbor.clone(), remote.snapshot().chain);

        assert!(h.node.resolve_conflicts().await);
        assert_eq!(h.node.blockchain().snapshot().chain, remote.snapshot().chain);
        assert!(!h.node.resolve_conflicts().await);
    }

    #[tokio::test]
    async fn test_shutdown_halts_mining() {
        let h = harness(Duration::from_secs(60)).await;
        assert!(h.node.submit_transaction(&signed_request(1.0), false).await.unwrap());

        h.node.start_sync();
        h.node.shutdown();

        assert!(!h.node.mine().await);
        assert_eq!(h.node.blockchain().len(), 1);
    }
}
