//! Loyalty API module - customers, accruals, and program stats

mod handler;

use axum::routing::{get, post};
use axum::Router;

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/loyalty", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/customers", get(handler::list_customers))
        .route("/customers/{phone}", get(handler::get_customer))
        .route(
            "/customers/{phone}/transactions",
            get(handler::list_transactions),
        )
        .route("/customers/{phone}/credit", post(handler::credit))
        .route("/customers/{phone}/deduct", post(handler::deduct))
        .route("/customers/{phone}/redeem", post(handler::redeem))
        .route("/accrue", post(handler::accrue))
        .route("/stats", get(handler::stats))
}
