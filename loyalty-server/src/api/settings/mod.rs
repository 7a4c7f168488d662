//! Loyalty settings API module

mod handler;

use axum::routing::get;
use axum::Router;

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().route(
        "/api/loyalty/settings",
        get(handler::get_settings).put(handler::update_settings),
    )
}
