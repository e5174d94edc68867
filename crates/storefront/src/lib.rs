//! DaniThur storefront checkout library.
//!
//! Backend-for-frontend for the dealership storefront SPA: holds the
//! per-visitor checkout state, talks to the dealership API and the postal
//! code service, and follows Pix payments until they settle.
//!
//! The binary in `main.rs` only wires configuration, tracing and Sentry
//! around [`app`]; everything else lives here so it can be tested.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod backend;
pub mod checkout;
pub mod config;
pub mod error;
pub mod filters;
pub mod middleware;
pub mod postal;
pub mod routes;
pub mod state;
pub mod store;

use axum::{Router, body::Body, http::Request};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the application router.
///
/// Sentry layers are added by the binary, outside this router, so tests run
/// without a Sentry hub.
pub fn app(state: AppState) -> Router {
    let session_layer = middleware::create_session_layer(state.config());

    Router::new()
        .merge(routes::routes())
        .layer(session_layer)
        .with_state(state)
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
}
