use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use utoipa::ToSchema;

use super::crypto::{verify_digest, CryptoError, DigitalSignature, PrivateKey, PublicKey};
use super::wallet::Address;

/// Sender identity of mining rewards. Not valid base58, so no wallet owns it.
pub const MINING_SENDER: &str = "0";

/// Errors that can occur while validating a transaction submission
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Invalid amount: {0}")]
    InvalidAmount(f64),

    #[error("Invalid sender public key: {0}")]
    InvalidPublicKey(CryptoError),

    #[error("Invalid signature: {0}")]
    InvalidSignature(CryptoError),
}

/// Represents a transfer of `amount` from one address to another.
///
/// The serialized form is also the canonical encoding that gets hashed for
/// signing and for block hashes, so the field order here is load-bearing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Sender's address
    #[schema(value_type = String)]
    pub sender_address: Address,

    /// Recipient's address
    #[schema(value_type = String)]
    pub recipient_address: Address,

    /// Amount being transferred
    pub amount: f64,
}

impl Transaction {
    /// Creates a new transaction. No balance or signature checks happen here.
    pub fn new(sender_address: Address, recipient_address: Address, amount: f64) -> Self {
        Transaction {
            sender_address,
            recipient_address,
            amount,
        }
    }

    /// Creates a mining reward paid to `recipient`
    pub fn reward(recipient: Address, amount: f64) -> Self {
        Transaction::new(Address::from(MINING_SENDER), recipient, amount)
    }

    /// Checks if the transaction is a mining reward
    pub fn is_reward(&self) -> bool {
        self.sender_address.as_str() == MINING_SENDER
    }

    /// The canonical byte encoding shared by signing, verification and block hashing.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("transaction encoding is infallible")
    }

    /// SHA-256 of the canonical encoding
    pub fn hash(&self) -> [u8; 32] {
        Sha256::digest(self.canonical_bytes()).into()
    }

    /// Signs the transaction. Only the holder of `private_key` should call this.
    pub fn generate_signature(&self, private_key: &PrivateKey) -> Result<DigitalSignature, CryptoError> {
        private_key.sign_digest(&self.hash())
    }

    /// Checks `signature` against this transaction and the claimed key
    pub fn verify(&self, public_key: &PublicKey, signature: &DigitalSignature) -> bool {
        verify_digest(&self.hash(), signature, public_key)
    }
}

/// A transaction submission as it arrives over the wire.
///
/// Every field is optional so that a partially filled request can be told
/// apart from a malformed body; [`TransactionRequest::validate`] says which
/// field is missing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    pub sender_address: Option<String>,
    pub recipient_address: Option<String>,
    pub amount: Option<f64>,
    /// Hex `x ‖ y`, 128 characters
    pub sender_public_key: Option<String>,
    /// Hex `r ‖ s`, 128 characters
    pub signature: Option<String>,
}

/// A submission whose fields are all present and decoded
#[derive(Debug, Clone)]
pub struct ValidTransactionRequest {
    pub transaction: Transaction,
    pub sender_public_key: PublicKey,
    pub signature: DigitalSignature,
}

impl TransactionRequest {
    /// Builds the request that relays a signed transaction to a peer
    pub fn signed(transaction: &Transaction, public_key: &PublicKey, signature: &DigitalSignature) -> Self {
        TransactionRequest {
            sender_address: Some(transaction.sender_address.0.clone()),
            recipient_address: Some(transaction.recipient_address.0.clone()),
            amount: Some(transaction.amount),
            sender_public_key: Some(public_key.to_hex()),
            signature: Some(signature.to_hex()),
        }
    }

    /// Checks presence and shape of every field. No signature verification happens here.
    pub fn validate(&self) -> Result<ValidTransactionRequest, RequestError> {
        let sender = self
            .sender_address
            .as_deref()
            .ok_or(RequestError::MissingField("senderAddress"))?;
        let recipient = self
            .recipient_address
            .as_deref()
            .ok_or(RequestError::MissingField("recipientAddress"))?;
        let amount = self.amount.ok_or(RequestError::MissingField("amount"))?;
        let public_key = self
            .sender_public_key
            .as_deref()
            .ok_or(RequestError::MissingField("senderPublicKey"))?;
        let signature = self
            .signature
            .as_deref()
            .ok_or(RequestError::MissingField("signature"))?;

        if !amount.is_finite() || amount < 0.0 {
            return Err(RequestError::InvalidAmount(amount));
        }

        let sender_public_key = PublicKey::from_hex(public_key).map_err(RequestError::InvalidPublicKey)?;
        let signature = DigitalSignature::from_hex(signature).map_err(RequestError::InvalidSignature)?;

        Ok(ValidTransactionRequest {
            transaction: Transaction::new(Address::from(sender), Address::from(recipient), amount),
            sender_public_key,
            signature,
        })
    }
}
