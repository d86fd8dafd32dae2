use actix_web::{web, HttpResponse, Responder};
use log::{info, warn};

use super::schema::{
    BalanceResponse, ConsensusResponse, ErrorResponse, MineResponse, MiningStatusResponse, SignRequest,
    SubmitResponse, ValidateResponse, WalletResponse,
};
use crate::blockchain::{Address, RequestError, Transaction, TransactionRequest, Wallet};
use crate::node::Node;

/// Shared node state handed to every handler
pub type NodeData = web::Data<Node>;

fn bad_request(error: impl ToString) -> HttpResponse {
    HttpResponse::BadRequest().json(ErrorResponse {
        error: error.to_string(),
    })
}

async fn submit(node: NodeData, request: web::Json<TransactionRequest>, relay: bool) -> HttpResponse {
    match node.submit_transaction(&request, relay).await {
        Ok(true) => HttpResponse::Created().json(SubmitResponse {
            message: "Transaction added to the pool".to_string(),
        }),
        Ok(false) => {
            warn!("Rejected transaction with a bad signature");
            bad_request("Signature verification failed")
        }
        Err(err) => bad_request(err),
    }
}

/// Get the chain
///
/// Returns every block, the pending pool and this node's address and port
#[utoipa::path(
    get,
    path = "/api/v1/chain",
    responses(
        (status = 200, description = "Chain retrieved successfully", body = crate::blockchain::ChainSnapshot)
    )
)]
pub async fn get_chain(node: NodeData) -> impl Responder {
    HttpResponse::Ok().json(node.blockchain().snapshot())
}

/// Get pending transactions
///
/// Returns the transactions waiting to be mined, in arrival order
#[utoipa::path(
    get,
    path = "/api/v1/transactions",
    responses(
        (status = 200, description = "Pending transactions retrieved successfully", body = Vec<Transaction>)
    )
)]
pub async fn get_transactions(node: NodeData) -> impl Responder {
    HttpResponse::Ok().json(node.blockchain().copy_pool())
}

/// Submit a transaction
///
/// Verifies the signature, adds the transaction to the pool and relays it to
/// every neighbor
#[utoipa::path(
    post,
    path = "/api/v1/transactions",
    request_body = TransactionRequest,
    responses(
        (status = 201, description = "Transaction accepted", body = SubmitResponse),
        (status = 400, description = "Missing field, malformed key or bad signature", body = ErrorResponse)
    )
)]
pub async fn create_transaction(node: NodeData, request: web::Json<TransactionRequest>) -> impl Responder {
    submit(node, request, true).await
}

/// Accept a relayed transaction
///
/// Same checks as a client submission, without relaying any further
#[utoipa::path(
    put,
    path = "/api/v1/transactions",
    request_body = TransactionRequest,
    responses(
        (status = 201, description = "Transaction accepted", body = SubmitResponse),
        (status = 400, description = "Missing field, malformed key or bad signature", body = ErrorResponse)
    )
)]
pub async fn relay_transaction(node: NodeData, request: web::Json<TransactionRequest>) -> impl Responder {
    submit(node, request, false).await
}

/// Clear pending transactions
#[utoipa::path(
    delete,
    path = "/api/v1/transactions",
    responses(
        (status = 200, description = "Pool cleared")
    )
)]
pub async fn clear_transactions(node: NodeData) -> impl Responder {
    node.blockchain().clear_pool();
    HttpResponse::Ok().json(SubmitResponse {
        message: "Pool cleared".to_string(),
    })
}

/// Mine a block
///
/// Seals the pending pool plus the mining reward into a new block. An empty
/// pool is not an error: nothing is mined and `mined` is false.
#[utoipa::path(
    post,
    path = "/api/v1/mine",
    responses(
        (status = 200, description = "Block mined, or nothing to mine", body = MineResponse),
        (status = 409, description = "Another round is running or the round was cancelled", body = ErrorResponse)
    )
)]
pub async fn mine(node: NodeData) -> impl Responder {
    let mined = node.mine().await;
    let blockchain = node.blockchain();

    if mined {
        HttpResponse::Ok().json(MineResponse {
            message: "New block mined".to_string(),
            mined,
            length: blockchain.len(),
        })
    } else if blockchain.copy_pool().is_empty() {
        HttpResponse::Ok().json(MineResponse {
            message: "No pending transactions".to_string(),
            mined,
            length: blockchain.len(),
        })
    } else {
        HttpResponse::Conflict().json(ErrorResponse {
            error: "Mining is busy or was cancelled".to_string(),
        })
    }
}

/// Start continuous mining
#[utoipa::path(
    post,
    path = "/api/v1/mine/start",
    responses(
        (status = 200, description = "Continuous mining running", body = MiningStatusResponse)
    )
)]
pub async fn start_mining(node: NodeData) -> impl Responder {
    let message = if node.start_mining() {
        "Mining started"
    } else {
        "Mining already running"
    };

    HttpResponse::Ok().json(MiningStatusResponse {
        message: message.to_string(),
        mining: node.is_mining(),
    })
}

/// Stop continuous mining
#[utoipa::path(
    post,
    path = "/api/v1/mine/stop",
    responses(
        (status = 200, description = "Continuous mining stopped", body = MiningStatusResponse)
    )
)]
pub async fn stop_mining(node: NodeData) -> impl Responder {
    let message = if node.stop_mining() {
        "Mining stopped"
    } else {
        "Mining was not running"
    };

    HttpResponse::Ok().json(MiningStatusResponse {
        message: message.to_string(),
        mining: node.is_mining(),
    })
}

/// Get the balance of an address
///
/// Replays the chain; pending transactions are not counted
#[utoipa::path(
    get,
    path = "/api/v1/amount/{address}",
    params(
        ("address" = String, Path, description = "Address to query")
    ),
    responses(
        (status = 200, description = "Balance retrieved successfully", body = BalanceResponse)
    )
)]
pub async fn get_amount(node: NodeData, address: web::Path<String>) -> impl Responder {
    let address = Address(address.into_inner());
    let amount = node.blockchain().get_balance(&address);

    HttpResponse::Ok().json(BalanceResponse {
        address: address.0,
        amount,
    })
}

/// Resolve conflicts
///
/// Adopts the longest valid chain among the neighbors if it beats the local one
#[utoipa::path(
    put,
    path = "/api/v1/consensus",
    responses(
        (status = 200, description = "Consensus round finished", body = ConsensusResponse)
    )
)]
pub async fn consensus(node: NodeData) -> impl Responder {
    let replaced = node.resolve_conflicts().await;
    if replaced {
        info!("Chain replaced by consensus request");
    }

    HttpResponse::Ok().json(ConsensusResponse {
        replaced,
        length: node.blockchain().len(),
    })
}

/// Check if the chain is valid
#[utoipa::path(
    get,
    path = "/api/v1/validate",
    responses(
        (status = 200, description = "Validation result", body = ValidateResponse)
    )
)]
pub async fn validate_chain(node: NodeData) -> impl Responder {
    let blockchain = node.blockchain();
    HttpResponse::Ok().json(ValidateResponse {
        valid: blockchain.is_valid(),
        length: blockchain.len(),
    })
}

/// Create a new wallet
///
/// Creates a new wallet with a random keypair
///
/// The private key must be stored by your own
#[utoipa::path(
    post,
    path = "/api/v1/wallet",
    responses(
        (status = 201, description = "Wallet created successfully", body = WalletResponse)
    )
)]
pub async fn create_wallet() -> impl Responder {
    let wallet = Wallet::new();

    HttpResponse::Created().json(WalletResponse {
        private_key: wallet.private_key_hex(),
        public_key: wallet.public_key().to_hex(),
        address: wallet.address().0.clone(),
    })
}

/// Sign a transaction
///
/// Builds a ready-to-submit transaction request from the key's own address
#[utoipa::path(
    post,
    path = "/api/v1/wallet/sign",
    request_body = SignRequest,
    responses(
        (status = 200, description = "Signed transaction request", body = TransactionRequest),
        (status = 400, description = "Invalid private key or amount", body = ErrorResponse)
    )
)]
pub async fn sign_transaction(request: web::Json<SignRequest>) -> impl Responder {
    if !request.amount.is_finite() || request.amount < 0.0 {
        return bad_request(RequestError::InvalidAmount(request.amount));
    }

    let wallet = match Wallet::from_private_key_hex(&request.private_key) {
        Ok(wallet) => wallet,
        Err(err) => return bad_request(err),
    };

    let transaction = Transaction::new(
        wallet.address().clone(),
        Address::from(request.recipient_address.as_str()),
        request.amount,
    );

    match wallet.sign(&transaction) {
        Ok(signature) => {
            HttpResponse::Ok().json(TransactionRequest::signed(&transaction, wallet.public_key(), &signature))
        }
        Err(err) => HttpResponse::InternalServerError().json(ErrorResponse {
            error: err.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::configure_routes;
    use crate::blockchain::consensus::tests::MockPeers;
    use crate::blockchain::{Blockchain, ChainParams, ChainSnapshot};
    use crate::network::Neighbors;

    use actix_web::{http::StatusCode, test, App};
    use serde_json::Value;

    use std::sync::Arc;
    use std::time::Duration;

    fn node() -> NodeData {
        let params = ChainParams {
            difficulty: 1,
            mining_reward: 1.0,
        };
        let blockchain = Arc::new(Blockchain::new(Address::from("miner"), 3000, params));
        let neighbors = Arc::new(Neighbors::new(Vec::new(), Duration::from_secs(1)));

        web::Data::new(Node::new(
            blockchain,
            neighbors,
            Arc::new(MockPeers::default()),
            Duration::from_secs(60),
            Duration::from_secs(60),
        ))
    }

    fn signed_request(amount: f64) -> TransactionRequest {
        let sender = Wallet::new();
        let transaction = Transaction::new(sender.address().clone(), Address::from("bob"), amount);
        let signature = sender.sign(&transaction).unwrap();
        TransactionRequest::signed(&transaction, sender.public_key(), &signature)
    }

    macro_rules! app {
        ($node:expr) => {
            test::init_service(App::new().app_data($node.clone()).configure(configure_routes)).await
        };
    }

    #[actix_web::test]
    async fn test_submit_then_mine() {
        let node = node();
        let app = app!(node);

        let req = test::TestRequest::post()
            .uri("/api/v1/transactions")
            .set_json(signed_request(10.0))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let req = test::TestRequest::get().uri("/api/v1/transactions").to_request();
        let pending: Vec<Transaction> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(pending.len(), 1);

        let req = test::TestRequest::post().uri("/api/v1/mine").to_request();
        let mined: MineResponse = test::call_and_read_body_json(&app, req).await;
        assert!(mined.mined);
        assert_eq!(mined.length, 2);

        let req = test::TestRequest::get().uri("/api/v1/amount/miner").to_request();
        let balance: BalanceResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(balance.amount, 1.0);

        let req = test::TestRequest::get().uri("/api/v1/amount/bob").to_request();
        let balance: BalanceResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(balance.amount, 10.0);
    }

    #[actix_web::test]
    async fn test_submit_missing_field() {
        let node = node();
        let app = app!(node);

        let mut request = signed_request(1.0);
        request.signature = None;

        let req = test::TestRequest::post()
            .uri("/api/v1/transactions")
            .set_json(request)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Missing field: signature");
        assert!(node.blockchain().copy_pool().is_empty());
    }

    #[actix_web::test]
    async fn test_relay_with_bad_signature() {
        let node = node();
        let app = app!(node);

        let mut request = signed_request(1.0);
        request.recipient_address = Some("mallory".to_string());

        let req = test::TestRequest::put()
            .uri("/api/v1/transactions")
            .set_json(request)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(node.blockchain().copy_pool().is_empty());
    }

    #[actix_web::test]
    async fn test_mine_empty_pool() {
        let node = node();
        let app = app!(node);

        let req = test::TestRequest::post().uri("/api/v1/mine").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let outcome: MineResponse = test::read_body_json(resp).await;
        assert!(!outcome.mined);
        assert_eq!(outcome.length, 1);
        assert_eq!(node.blockchain().len(), 1);
    }

    #[actix_web::test]
    async fn test_chain_snapshot() {
        let node = node();
        let app = app!(node);

        let req = test::TestRequest::get().uri("/api/v1/chain").to_request();
        let snapshot: ChainSnapshot = test::call_and_read_body_json(&app, req).await;

        assert_eq!(snapshot.chain, node.blockchain().snapshot().chain);
        assert!(snapshot.pool.is_empty());
        assert_eq!(snapshot.address, Address::from("miner"));
        assert_eq!(snapshot.port, 3000);

        let req = test::TestRequest::get().uri("/api/v1/validate").to_request();
        let validity: ValidateResponse = test::call_and_read_body_json(&app, req).await;
        assert!(validity.valid);
    }

    #[actix_web::test]
    async fn test_clear_pool() {
        let node = node();
        let app = app!(node);

        let req = test::TestRequest::put()
            .uri("/api/v1/transactions")
            .set_json(signed_request(1.0))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

        let req = test::TestRequest::delete().uri("/api/v1/transactions").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
        assert!(node.blockchain().copy_pool().is_empty());
    }

    #[actix_web::test]
    async fn test_wallet_sign_round_trip() {
        let node = node();
        let app = app!(node);

        let req = test::TestRequest::post().uri("/api/v1/wallet").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let wallet: WalletResponse = test::read_body_json(resp).await;
        assert_eq!(wallet.private_key.len(), 64);
        assert_eq!(wallet.public_key.len(), 128);

        let req = test::TestRequest::post()
            .uri("/api/v1/wallet/sign")
            .set_json(SignRequest {
                private_key: wallet.private_key.clone(),
                recipient_address: "bob".to_string(),
                amount: 3.0,
            })
            .to_request();
        let signed: TransactionRequest = test::call_and_read_body_json(&app, req).await;
        assert_eq!(signed.sender_address.as_deref(), Some(wallet.address.as_str()));

        let req = test::TestRequest::post()
            .uri("/api/v1/transactions")
            .set_json(signed)
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

        let req = test::TestRequest::post()
            .uri("/api/v1/wallet/sign")
            .set_json(SignRequest {
                private_key: "zz".to_string(),
                recipient_address: "bob".to_string(),
                amount: 3.0,
            })
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_mining_toggle_and_consensus() {
        let node = node();
        let app = app!(node);

        let req = test::TestRequest::post().uri("/api/v1/mine/start").to_request();
        let status: MiningStatusResponse = test::call_and_read_body_json(&app, req).await;
        assert!(status.mining);
        assert!(node.is_mining());

        let req = test::TestRequest::post().uri("/api/v1/mine/start").to_request();
        let status: MiningStatusResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(status.message, "Mining already running");
        assert!(status.mining);

        let req = test::TestRequest::post().uri("/api/v1/mine/stop").to_request();
        let status: MiningStatusResponse = test::call_and_read_body_json(&app, req).await;
        assert!(!status.mining);
        assert!(!node.is_mining());

        let req = test::TestRequest::put().uri("/api/v1/consensus").to_request();
        let outcome: ConsensusResponse = test::call_and_read_body_json(&app, req).await;
        assert!(!outcome.replaced);
        assert_eq!(outcome.length, 1);
    }
}
