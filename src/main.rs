use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use clap::Parser;
use log::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use std::sync::Arc;
use std::time::Duration;

mod api;
mod blockchain;
mod config;
mod network;
mod node;

use config::NodeConfig;

/// Timeout for every HTTP call made to a peer
const PEER_TIMEOUT: Duration = Duration::from_secs(5);

/// Timeout for a neighbor reachability probe
const PROBE_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::get_chain,
        api::handlers::get_transactions,
        api::handlers::create_transaction,
        api::handlers::relay_transaction,
        api::handlers::clear_transactions,
        api::handlers::mine,
        api::handlers::start_mining,
        api::handlers::stop_mining,
        api::handlers::get_amount,
        api::handlers::consensus,
        api::handlers::validate_chain,
        api::handlers::create_wallet,
        api::handlers::sign_transaction
    ),
    components(
        schemas(
            blockchain::Block,
            blockchain::Transaction,
            blockchain::TransactionRequest,
            blockchain::ChainSnapshot,
            api::schema::ErrorResponse,
            api::schema::SubmitResponse,
            api::schema::MineResponse,
            api::schema::MiningStatusResponse,
            api::schema::BalanceResponse,
            api::schema::ConsensusResponse,
            api::schema::ValidateResponse,
            api::schema::WalletResponse,
            api::schema::SignRequest
        )
    ),
    tags(
        (name = "ledger", description = "Proof-of-work ledger node API")
    ),
    info(
        title = "Ledger Node API",
        version = "1.0.0",
        description = "A proof-of-work ledger node",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    )
)]
struct ApiDoc;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = NodeConfig::parse();
    config.validate()?;

    let wallet = config.miner_wallet()?;
    let blockchain = Arc::new(blockchain::Blockchain::new(
        wallet.address().clone(),
        config.port,
        config.chain_params(),
    ));
    info!("Miner address: {}", blockchain.address());

    let client = network::HttpPeerClient::new(PEER_TIMEOUT).context("Failed to build peer client")?;
    let neighbors = Arc::new(network::Neighbors::new(config.candidate_peers(), PROBE_TIMEOUT));

    let node = web::Data::new(node::Node::new(
        blockchain,
        neighbors,
        Arc::new(client),
        config.mining_interval(),
        config.sync_interval(),
    ));

    node.start_sync();
    if config.auto_mine {
        node.start_mining();
    }

    info!("Starting HTTP server at http://{}", config.self_address());

    let app_node = node.clone();
    let result = HttpServer::new(move || {
        // Configure CORS
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        // Configure OpenAPI documentation
        let openapi = ApiDoc::openapi();

        App::new()
            .wrap(middleware::Logger::default())
            .wrap(cors)
            .app_data(app_node.clone())
            // API routes
            .configure(api::configure_routes)
            // Swagger UI
            .service(SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", openapi.clone()))
    })
    .bind((config.host.as_str(), config.port))
    .with_context(|| format!("Failed to bind {}", config.self_address()))?
    .run()
    .await;

    node.shutdown();
    result.context("HTTP server failed")
}
