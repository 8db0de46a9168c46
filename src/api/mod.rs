// Web API module: Axum server, routes, and handlers

pub mod handlers;
pub mod routes;
pub mod server;
pub mod state;

pub use server::ApiServer;
pub use state::AppState;
