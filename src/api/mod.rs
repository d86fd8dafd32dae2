// API module
//
// HTTP surface of a node: handlers, routes and the request/response bodies
// that only exist on the wire

pub mod handlers;
pub mod routes;
pub mod schema;

pub use routes::configure_routes;
