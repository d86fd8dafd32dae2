use ripemd::Ripemd160;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use utoipa::ToSchema;

use std::fmt;

use super::crypto::{CryptoError, DigitalSignature, PrivateKey, PublicKey};
use super::transaction::Transaction;

/// Version byte prepended to the public key hash
pub const ADDRESS_VERSION: u8 = 0x00;

const CHECKSUM_SIZE: usize = 4;
const PAYLOAD_SIZE: usize = 1 + 20;

/// A ledger address.
///
/// Addresses are opaque strings to the chain. Wallet-derived addresses are
/// `Base58(version ‖ RIPEMD160(SHA256(x ‖ y)) ‖ checksum)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct Address(pub String);

impl Address {
    /// Derives the address of a public key
    pub fn from_public_key(public_key: &PublicKey) -> Self {
        let sha = Sha256::digest(public_key.coordinates());
        let ripemd = Ripemd160::digest(sha);

        let mut payload = Vec::with_capacity(PAYLOAD_SIZE + CHECKSUM_SIZE);
        payload.push(ADDRESS_VERSION);
        payload.extend_from_slice(&ripemd);

        let checksum = checksum(&payload);
        payload.extend_from_slice(&checksum);

        Address(bs58::encode(payload).into_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Address(s.to_string())
    }
}

impl From<String> for Address {
    fn from(s: String) -> Self {
        Address(s)
    }
}

/// First four bytes of the double SHA-256 of `payload`
fn checksum(payload: &[u8]) -> [u8; CHECKSUM_SIZE] {
    let first = Sha256::digest(payload);
    let second = Sha256::digest(first);

    let mut out = [0u8; CHECKSUM_SIZE];
    out.copy_from_slice(&second[..CHECKSUM_SIZE]);
    out
}

/// A key pair together with its derived address
#[derive(Debug, Clone)]
pub struct Wallet {
    private_key: PrivateKey,
    public_key: PublicKey,
    address: Address,
}

impl Wallet {
    /// Creates a new wallet with a random keypair
    pub fn new() -> Self {
        Self::from_private_key(PrivateKey::generate())
    }

    /// Restores a wallet from a hex-encoded private key
    pub fn from_private_key_hex(private_key_hex: &str) -> Result<Self, CryptoError> {
        Ok(Self::from_private_key(PrivateKey::from_hex(private_key_hex)?))
    }

    fn from_private_key(private_key: PrivateKey) -> Self {
        let public_key = private_key.public_key();
        let address = Address::from_public_key(&public_key);

        Wallet {
            private_key,
            public_key,
            address,
        }
    }

    /// Gets the wallet's address
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Gets the wallet's public key
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Exports the private key as hex
    pub fn private_key_hex(&self) -> String {
        self.private_key.to_hex()
    }

    /// Signs a transaction with the wallet's private key
    pub fn sign(&self, transaction: &Transaction) -> Result<DigitalSignature, CryptoError> {
        transaction.generate_signature(&self.private_key)
    }
}

impl Default for Wallet {
    fn default() -> Self {
        Self::new()
    }
}
