use async_trait::async_trait;
use reqwest::{Client, Response};

use std::time::Duration;

use crate::blockchain::{Block, ChainSnapshot, PeerClient, PeerError, TransactionRequest};

/// Talks to peers over their HTTP API
#[derive(Clone)]
pub struct HttpPeerClient {
    client: Client,
}

impl HttpPeerClient {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
        })
    }

    fn url(peer: &str, path: &str) -> String {
        format!("http://{}/api/v1{}", peer, path)
    }

    fn check(peer: &str, response: Result<Response, reqwest::Error>) -> Result<Response, PeerError> {
        let response = response.map_err(|e| PeerError::Unreachable {
            peer: peer.to_string(),
            reason: e.to_string(),
        })?;

        if !response.status().is_success() {
            return Err(PeerError::Status {
                peer: peer.to_string(),
                status: response.status().as_u16(),
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl PeerClient for HttpPeerClient {
    async fn fetch_chain(&self, peer: &str) -> Result<Vec<Block>, PeerError> {
        let response = Self::check(peer, self.client.get(Self::url(peer, "/chain")).send().await)?;

        let snapshot: ChainSnapshot = response.json().await.map_err(|e| PeerError::Malformed {
            peer: peer.to_string(),
            reason: e.to_string(),
        })?;

        Ok(snapshot.chain)
    }

    async fn relay_transaction(&self, peer: &str, request: &TransactionRequest) -> Result<(), PeerError> {
        let sent = self
            .client
            .put(Self::url(peer, "/transactions"))
            .json(request)
            .send()
            .await;
        Self::check(peer, sent)?;
        Ok(())
    }

    async fn request_consensus(&self, peer: &str) -> Result<(), PeerError> {
        let sent = self.client.put(Self::url(peer, "/consensus")).send().await;
        Self::check(peer, sent)?;
        Ok(())
    }
}
