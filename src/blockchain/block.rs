use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use utoipa::ToSchema;

use std::fmt;
use std::str::FromStr;

use super::transaction::Transaction;

/// A SHA-256 block digest. Travels as exactly 64 lowercase hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BlockHash(pub [u8; 32]);

impl BlockHash {
    /// Number of leading `'0'` hex digits
    pub fn leading_zero_digits(&self) -> usize {
        let mut count = 0;
        for byte in self.0 {
            if byte == 0 {
                count += 2;
                continue;
            }
            if byte >> 4 == 0 {
                count += 1;
            }
            break;
        }
        count
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for BlockHash {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(BlockHash(bytes))
    }
}

impl Serialize for BlockHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for BlockHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Represents a block in the blockchain
#[derive(Debug, Clone, PartialEq, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    /// Hash of the previous block
    #[schema(value_type = String, example = "00a3f1...")]
    pub prev_hash: BlockHash,

    /// Creation time in nanoseconds since the Unix epoch
    pub timestamp: i64,

    /// Transactions sealed in this block, in order
    pub transactions: Vec<Transaction>,

    /// Proof of work (nonce)
    pub nonce: u64,
}

/// Borrowed view of a block's fields in canonical order.
///
/// Both the wire encoding and the hash preimage go through this type, so a
/// peer that decodes a block and re-encodes it gets the same bytes back.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CanonicalBlock<'a> {
    prev_hash: &'a BlockHash,
    timestamp: i64,
    transactions: &'a [Transaction],
    nonce: u64,
}

impl CanonicalBlock<'_> {
    fn hash(&self) -> BlockHash {
        let encoded = serde_json::to_vec(self).expect("block encoding is infallible");
        BlockHash(Sha256::digest(encoded).into())
    }
}

impl Serialize for Block {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.canonical().serialize(serializer)
    }
}

impl Block {
    /// Creates a new block stamped with the current time.
    ///
    /// Nothing is validated here; callers check proof and linkage.
    pub fn new(nonce: u64, prev_hash: BlockHash, transactions: Vec<Transaction>) -> Self {
        Block {
            prev_hash,
            timestamp: Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX),
            transactions,
            nonce,
        }
    }

    /// The all-zero block whose hash anchors the genesis block
    pub fn zero() -> Self {
        Block {
            prev_hash: BlockHash::default(),
            timestamp: 0,
            transactions: Vec::new(),
            nonce: 0,
        }
    }

    /// The first block of every chain. Identical on every node.
    pub fn genesis() -> Self {
        Block {
            prev_hash: Block::zero().hash(),
            timestamp: 0,
            transactions: Vec::new(),
            nonce: 0,
        }
    }

    fn canonical(&self) -> CanonicalBlock<'_> {
        CanonicalBlock {
            prev_hash: &self.prev_hash,
            timestamp: self.timestamp,
            transactions: &self.transactions,
            nonce: self.nonce,
        }
    }

    /// Calculates the SHA-256 hash of the block's canonical encoding
    pub fn hash(&self) -> BlockHash {
        self.canonical().hash()
    }

    /// Hashes a block assembled from borrowed parts, without cloning the transactions
    pub fn hash_parts(prev_hash: &BlockHash, timestamp: i64, transactions: &[Transaction], nonce: u64) -> BlockHash {
        CanonicalBlock {
            prev_hash,
            timestamp,
            transactions,
            nonce,
        }
        .hash()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::Address;

    fn sample_transactions() -> Vec<Transaction> {
        vec![
            Transaction::new(Address::from("alice"), Address::from("bob"), 10.0),
            Transaction::reward(Address::from("miner"), 1.0),
        ]
    }

    #[test]
    fn test_new_block() {
        let prev_hash = Block::genesis().hash();
        let block = Block::new(100, prev_hash, sample_transactions());

        assert_eq!(block.nonce, 100);
        assert_eq!(block.prev_hash, prev_hash);
        assert_eq!(block.transactions.len(), 2);
        assert!(block.timestamp > 0);
    }

    #[test]
    fn test_hash_is_deterministic() {
        let block = Block::new(7, Block::genesis().hash(), sample_transactions());

        assert_eq!(block.hash(), block.hash());
        assert_eq!(block.clone().hash(), block.hash());
        assert_eq!(
            Block::hash_parts(&block.prev_hash, block.timestamp, &block.transactions, block.nonce),
            block.hash()
        );
    }

    #[test]
    fn test_hash_depends_on_every_field() {
        let block = Block::new(7, Block::genesis().hash(), sample_transactions());
        let base = block.hash();

        let mut changed = block.clone();
        changed.nonce += 1;
        assert_ne!(changed.hash(), base);

        let mut changed = block.clone();
        changed.timestamp += 1;
        assert_ne!(changed.hash(), base);

        let mut changed = block.clone();
        changed.transactions.reverse();
        assert_ne!(changed.hash(), base);

        let mut changed = block;
        changed.prev_hash = BlockHash::default();
        assert_ne!(changed.hash(), base);
    }

    #[test]
    fn test_genesis_is_fixed() {
        assert_eq!(Block::genesis(), Block::genesis());
        assert_eq!(Block::genesis().hash(), Block::genesis().hash());
        assert_eq!(Block::genesis().prev_hash, Block::zero().hash());
    }

    #[test]
    fn test_wire_encoding_preserves_hash() {
        let block = Block::new(42, Block::genesis().hash(), sample_transactions());

        let json = serde_json::to_string(&block).unwrap();
        assert!(json.starts_with(r#"{"prevHash":""#));

        let decoded: Block = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, block);
        assert_eq!(decoded.hash(), block.hash());
    }

    #[test]
    fn test_decoded_amounts_keep_block_hash() {
        let prev_hash = Block::genesis().hash();
        let amounts = (1..=20_000u32)
            .map(|k| k as f64 / 3.0 / 1000.0)
            .chain([90568.48833333333, 0.1 + 0.2]);

        for amount in amounts {
            let transactions = vec![Transaction::new(Address::from("alice"), Address::from("bob"), amount)];
            let block = Block::new(1, prev_hash, transactions);

            let decoded: Block = serde_json::from_str(&serde_json::to_string(&block).unwrap()).unwrap();
            assert_eq!(decoded.transactions[0].amount, amount);
            assert_eq!(decoded.hash(), block.hash());
        }
    }

    #[test]
    fn test_block_hash_hex_keeps_leading_zeros() {
        let mut bytes = [0u8; 32];
        bytes[2] = 0x0f;
        let hash = BlockHash(bytes);

        let encoded = hash.to_string();
        assert_eq!(encoded.len(), 64);
        assert!(encoded.starts_with("00000f"));
        assert_eq!(encoded.parse::<BlockHash>().unwrap(), hash);
        assert_eq!(hash.leading_zero_digits(), 5);

        assert!("abcd".parse::<BlockHash>().is_err());
    }
}
