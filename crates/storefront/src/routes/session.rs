//! App store routes.
//!
//! The SPA reports the signed-in buyer and the cart it is about to check out;
//! every tab of the same visitor can follow changes over SSE.

use std::convert::Infallible;

use axum::{
    Json,
    extract::State,
    response::{
        Sse,
        sse::{Event, KeepAlive},
    },
};
use danithur_core::{CartSnapshot, UserId};
use futures::Stream;
use serde::Deserialize;
use tracing::instrument;

use crate::error::{Result, set_sentry_user};
use crate::middleware::Visitor;
use crate::state::AppState;
use crate::store::StoreSnapshot;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetBuyerRequest {
    /// `null` on logout.
    pub buyer_id: Option<UserId>,
}

#[derive(Debug, Deserialize)]
pub struct SetCartRequest {
    /// `null` once the cart is emptied.
    pub cart: Option<CartSnapshot>,
}

/// GET /session
pub async fn show(State(state): State<AppState>, Visitor(visitor): Visitor) -> Json<StoreSnapshot> {
    Json(state.store().snapshot(visitor).await)
}

/// PUT /session/buyer
#[instrument(skip_all, fields(%visitor))]
pub async fn set_buyer(
    State(state): State<AppState>,
    Visitor(visitor): Visitor,
    Json(request): Json<SetBuyerRequest>,
) -> Json<StoreSnapshot> {
    set_sentry_user(request.buyer_id.as_ref());
    state.store().set_buyer_id(visitor, request.buyer_id).await;
    Json(state.store().snapshot(visitor).await)
}

/// PUT /session/cart
#[instrument(skip_all, fields(%visitor))]
pub async fn set_cart(
    State(state): State<AppState>,
    Visitor(visitor): Visitor,
    Json(request): Json<SetCartRequest>,
) -> Result<Json<StoreSnapshot>> {
    state.store().set_cart(visitor, request.cart).await?;
    Ok(Json(state.store().snapshot(visitor).await))
}

/// GET /session/events
///
/// Sends the current snapshot immediately, then one `store` event per change.
pub async fn events(
    State(state): State<AppState>,
    Visitor(visitor): Visitor,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let mut rx = state.store().subscribe(visitor).await;

    let stream = async_stream::stream! {
        loop {
            let snapshot = rx.borrow_and_update().clone();
            let json = serde_json::to_string(&snapshot)
                .unwrap_or_else(|_| r#"{"error":"serialization"}"#.to_string());
            yield Ok(Event::default().event("store").data(json));

            if rx.changed().await.is_err() {
                break;
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}
