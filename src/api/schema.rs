use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Body of every error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

/// Response for an accepted transaction
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SubmitResponse {
    pub message: String,
}

/// Response for the mine endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MineResponse {
    pub message: String,

    /// False when the pool was empty
    pub mined: bool,

    /// Chain length after mining
    pub length: usize,
}

/// Response for the continuous mining endpoints
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MiningStatusResponse {
    pub message: String,

    /// Whether continuous mining is running after the request
    pub mining: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BalanceResponse {
    pub address: String,
    pub amount: f64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ConsensusResponse {
    /// Whether a longer peer chain replaced the local one
    pub replaced: bool,
    pub length: usize,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ValidateResponse {
    pub valid: bool,
    pub length: usize,
}

/// A freshly generated wallet.
///
/// The private key is not kept by the node and must be stored by the caller.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WalletResponse {
    /// Hex, 64 characters
    pub private_key: String,

    /// Hex `x ‖ y`, 128 characters
    pub public_key: String,

    pub address: String,
}

/// Request for the sign endpoint. The sender is the key's own address.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignRequest {
    pub private_key: String,
    pub recipient_address: String,
    pub amount: f64,
}
