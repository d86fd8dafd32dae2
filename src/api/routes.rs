use actix_web::web;

use super::handlers;

/// Configures the API routes
///
/// # Arguments
///
/// * `cfg` - The service configuration
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/chain", web::get().to(handlers::get_chain))
            .route("/transactions", web::get().to(handlers::get_transactions))
            .route("/transactions", web::post().to(handlers::create_transaction))
            .route("/transactions", web::put().to(handlers::relay_transaction))
            .route("/transactions", web::delete().to(handlers::clear_transactions))
            .route("/mine", web::post().to(handlers::mine))
            .route("/mine/start", web::post().to(handlers::start_mining))
            .route("/mine/stop", web::post().to(handlers::stop_mining))
            .route("/amount/{address}", web::get().to(handlers::get_amount))
            .route("/consensus", web::put().to(handlers::consensus))
            .route("/validate", web::get().to(handlers::validate_chain))
            .route("/wallet", web::post().to(handlers::create_wallet))
            .route("/wallet/sign", web::post().to(handlers::sign_transaction)),
    );
}
