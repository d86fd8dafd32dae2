use futures::future::join_all;
use log::{debug, info};
use parking_lot::RwLock;
use tokio::net::TcpStream;
use tokio::time::timeout;

use std::time::Duration;

/// Returns true if a TCP connection to `peer` opens within `wait`
pub async fn probe(peer: &str, wait: Duration) -> bool {
    matches!(timeout(wait, TcpStream::connect(peer)).await, Ok(Ok(_)))
}

/// The configured candidate peers and the subset that answered the last probe
#[derive(Debug)]
pub struct Neighbors {
    candidates: Vec<String>,
    reachable: RwLock<Vec<String>>,
    probe_timeout: Duration,
}

impl Neighbors {
    pub fn new(candidates: Vec<String>, probe_timeout: Duration) -> Self {
        Neighbors {
            candidates,
            reachable: RwLock::new(Vec::new()),
            probe_timeout,
        }
    }

    /// Probes every candidate and keeps the ones that answered, in configured order
    pub async fn refresh(&self) -> Vec<String> {
        let probes = self
            .candidates
            .iter()
            .map(|peer| async move { (peer, probe(peer, self.probe_timeout).await) });

        let reachable: Vec<String> = join_all(probes)
            .await
            .into_iter()
            .filter_map(|(peer, up)| up.then(|| peer.clone()))
            .collect();

        let mut current = self.reachable.write();
        if *current != reachable {
            info!("Neighbors: {:?}", reachable);
        } else {
            debug!("Neighbors unchanged: {:?}", reachable);
        }
        *current = reachable.clone();
        reachable
    }

    /// Neighbors found by the last refresh
    pub fn current(&self) -> Vec<String> {
        self.reachable.read().clone()
    }
}
