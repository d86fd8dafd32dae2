use p256::ecdsa::signature::hazmat::{PrehashVerifier, RandomizedPrehashSigner};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use thiserror::Error;

use std::fmt;
use std::str::FromStr;

/// Width in bytes of a P-256 scalar or affine coordinate
pub const SCALAR_SIZE: usize = 32;

/// Errors that can occur during cryptographic operations
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Failed to sign message: {0}")]
    SigningError(String),

    #[error("Decoding error: {0}")]
    DecodingError(String),
}

/// Decodes a hex string that must encode exactly `N` bytes.
fn decode_fixed<const N: usize>(s: &str) -> Result<[u8; N], CryptoError> {
    if s.len() != N * 2 {
        return Err(CryptoError::DecodingError(format!(
            "expected {} hex characters, got {}",
            N * 2,
            s.len()
        )));
    }

    let bytes = hex::decode(s).map_err(|e| CryptoError::DecodingError(e.to_string()))?;

    let mut out = [0u8; N];
    out.copy_from_slice(&bytes);
    Ok(out)
}

/// A P-256 public key.
///
/// The hex form is the two affine coordinates `x ‖ y`, each zero-padded to
/// 32 bytes, for a total of 128 hex characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey(VerifyingKey);

impl PublicKey {
    /// Returns the 64 raw bytes `x ‖ y`
    pub fn coordinates(&self) -> [u8; SCALAR_SIZE * 2] {
        let point = self.0.to_encoded_point(false);
        // Uncompressed SEC1 points are 0x04 ‖ x ‖ y.
        let mut out = [0u8; SCALAR_SIZE * 2];
        out.copy_from_slice(&point.as_bytes()[1..]);
        out
    }

    /// Encodes the key as 128 lowercase hex characters
    pub fn to_hex(&self) -> String {
        hex::encode(self.coordinates())
    }

    /// Decodes a key from its 128-character hex form
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let coordinates: [u8; SCALAR_SIZE * 2] = decode_fixed(s)
            .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;

        let mut sec1 = Vec::with_capacity(1 + coordinates.len());
        sec1.push(0x04);
        sec1.extend_from_slice(&coordinates);

        VerifyingKey::from_sec1_bytes(&sec1)
            .map(PublicKey)
            .map_err(|_| CryptoError::InvalidPublicKey("point is not on the P-256 curve".to_string()))
    }

    fn verifying_key(&self) -> &VerifyingKey {
        &self.0
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for PublicKey {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PublicKey::from_hex(s)
    }
}

/// A P-256 private key. Never serialized except on explicit export.
#[derive(Clone)]
pub struct PrivateKey(SigningKey);

impl PrivateKey {
    /// Generates a fresh key from the operating system's CSPRNG
    pub fn generate() -> Self {
        PrivateKey(SigningKey::random(&mut OsRng))
    }

    /// Decodes a key from its 64-character hex form
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let bytes: [u8; SCALAR_SIZE] =
            decode_fixed(s).map_err(|e| CryptoError::InvalidPrivateKey(e.to_string()))?;

        SigningKey::from_slice(&bytes)
            .map(PrivateKey)
            .map_err(|_| CryptoError::InvalidPrivateKey("scalar out of range".to_string()))
    }

    /// Encodes the key as 64 lowercase hex characters
    pub fn to_hex(&self) -> String {
        hex::encode(self.0.to_bytes())
    }

    /// The matching public key
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.0.verifying_key().clone())
    }

    /// Signs a 32-byte digest with fresh randomness mixed into the nonce.
    pub fn sign_digest(&self, digest: &[u8; 32]) -> Result<DigitalSignature, CryptoError> {
        let signature: Signature = self
            .0
            .sign_prehash_with_rng(&mut OsRng, digest)
            .map_err(|e| CryptoError::SigningError(e.to_string()))?;

        Ok(DigitalSignature(signature))
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(..)")
    }
}

/// An ECDSA signature `(r, s)`.
///
/// The hex form is `r ‖ s`, each zero-padded to 32 bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigitalSignature(Signature);

impl DigitalSignature {
    /// Encodes the signature as 128 lowercase hex characters
    pub fn to_hex(&self) -> String {
        hex::encode(self.0.to_bytes())
    }

    /// Decodes a signature from its 128-character hex form
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let bytes: [u8; SCALAR_SIZE * 2] =
            decode_fixed(s).map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;

        Signature::from_slice(&bytes)
            .map(DigitalSignature)
            .map_err(|_| CryptoError::InvalidSignature("r or s out of range".to_string()))
    }
}

impl fmt::Display for DigitalSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for DigitalSignature {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DigitalSignature::from_hex(s)
    }
}

/// Checks a signature over a 32-byte digest.
///
/// Returns false on any failure; a bad signature is an ordinary outcome.
pub fn verify_digest(digest: &[u8; 32], signature: &DigitalSignature, public_key: &PublicKey) -> bool {
    public_key
        .verifying_key()
        .verify_prehash(digest, &signature.0)
        .is_ok()
}
