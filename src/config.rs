//! Node configuration.
//!
//! Every option can be given as a flag or as a `LEDGER_*` environment
//! variable; `main` loads a `.env` file first so both work from one place.

use clap::Parser;
use thiserror::Error;

use std::time::Duration;

use crate::blockchain::chain::{DEFAULT_DIFFICULTY, DEFAULT_MINING_REWARD};
use crate::blockchain::pow::MAX_DIFFICULTY;
use crate::blockchain::{ChainParams, CryptoError, Wallet};

/// Errors in a node configuration that clap cannot catch on its own
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Mining reward must be a non-negative number, got {0}")]
    InvalidReward(f64),

    #[error("{0} interval must be at least one second")]
    ZeroInterval(&'static str),

    #[error("Invalid miner private key: {0}")]
    InvalidMinerKey(#[from] CryptoError),
}

/// A proof-of-work ledger node.
#[derive(Parser, Debug, Clone)]
#[command(name = "powledger", about = "Proof-of-work ledger node", version)]
pub struct NodeConfig {
    /// Interface the HTTP API binds to.
    #[arg(long, env = "LEDGER_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port for the HTTP API. Also reported to peers in chain snapshots.
    #[arg(long, short = 'p', env = "LEDGER_PORT", default_value_t = 3000)]
    pub port: u16,

    /// Candidate peer as `host:port`. Repeat the flag or pass a comma-separated list.
    #[arg(long = "peer", env = "LEDGER_PEERS", value_delimiter = ',')]
    pub peers: Vec<String>,

    /// Leading zero hex digits required in a block hash.
    #[arg(
        long,
        env = "LEDGER_DIFFICULTY",
        default_value_t = DEFAULT_DIFFICULTY,
        value_parser = clap::value_parser!(u8).range(0..=MAX_DIFFICULTY as i64)
    )]
    pub difficulty: u8,

    /// Amount credited to this node for each mined block.
    #[arg(long, env = "LEDGER_MINING_REWARD", default_value_t = DEFAULT_MINING_REWARD)]
    pub mining_reward: f64,

    /// Seconds between rounds when continuous mining is on.
    #[arg(long, env = "LEDGER_MINING_INTERVAL", default_value_t = 15)]
    pub mining_interval_secs: u64,

    /// Seconds between neighbor refresh and consensus rounds.
    #[arg(long, env = "LEDGER_SYNC_INTERVAL", default_value_t = 15)]
    pub sync_interval_secs: u64,

    /// Hex private key of the miner wallet. A fresh wallet is generated when omitted.
    #[arg(long, env = "LEDGER_MINER_KEY", hide_env_values = true)]
    pub miner_private_key: Option<String>,

    /// Start continuous mining at boot.
    #[arg(long, env = "LEDGER_AUTO_MINE")]
    pub auto_mine: bool,
}

impl NodeConfig {
    /// Checks the values clap's parsers do not cover
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.mining_reward.is_finite() || self.mining_reward < 0.0 {
            return Err(ConfigError::InvalidReward(self.mining_reward));
        }
        if self.mining_interval_secs == 0 {
            return Err(ConfigError::ZeroInterval("Mining"));
        }
        if self.sync_interval_secs == 0 {
            return Err(ConfigError::ZeroInterval("Sync"));
        }
        Ok(())
    }

    pub fn chain_params(&self) -> ChainParams {
        ChainParams {
            difficulty: self.difficulty,
            mining_reward: self.mining_reward,
        }
    }

    /// Loads the configured miner wallet, or creates a new one
    pub fn miner_wallet(&self) -> Result<Wallet, ConfigError> {
        match &self.miner_private_key {
            Some(key) => Ok(Wallet::from_private_key_hex(key)?),
            None => Ok(Wallet::new()),
        }
    }

    /// `host:port` this node answers on
    pub fn self_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Configured peers, minus this node and duplicates
    pub fn candidate_peers(&self) -> Vec<String> {
        let own = self.self_address();
        let mut peers: Vec<String> = Vec::new();
        for peer in &self.peers {
            let peer = peer.trim();
            if peer.is_empty() || peer == own || peers.iter().any(|p| p == peer) {
                continue;
            }
            peers.push(peer.to_string());
        }
        peers
    }

    pub fn mining_interval(&self) -> Duration {
        Duration::from_secs(self.mining_interval_secs)
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }
}
