//! HTTP route handlers for the storefront checkout.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                       - Health check
//!
//! # App store (per visitor)
//! GET    /session                      - Buyer and cart snapshot
//! PUT    /session/buyer                - Set or clear the signed-in buyer
//! PUT    /session/cart                 - Set or clear the cart being checked out
//! GET    /session/events               - Snapshot changes (SSE)
//!
//! # Checkout
//! POST   /checkout                     - Start (or restart) checkout
//! GET    /checkout                     - Current checkout view
//! DELETE /checkout                     - Abandon checkout
//! POST   /checkout/postal-code         - Resolve a postal code into the address
//! PATCH  /checkout/form                - Update form fields (masked on input)
//! POST   /checkout/submit              - Validate and place the order
//!
//! # Payment
//! POST   /checkout/payment/check       - Pix "I already paid"
//! POST   /checkout/payment/confirm     - Boleto "I already paid", card "continue"
//! GET    /checkout/payment/events      - Pix countdown and status (SSE)
//! GET    /checkout/payment/pix-qr.png  - Pix QR code image
//!
//! # Confirmation
//! GET    /checkout/confirmation        - Confirmation summary
//! GET    /checkout/receipt             - Printable receipt (HTML)
//! ```

pub mod checkout;
pub mod session;

use axum::{
    Router,
    routing::{get, patch, post, put},
};

use crate::state::AppState;

/// Create the app store routes router.
pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(session::show))
        .route("/buyer", put(session::set_buyer))
        .route("/cart", put(session::set_cart))
        .route("/events", get(session::events))
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            post(checkout::start)
                .get(checkout::show)
                .delete(checkout::abandon),
        )
        .route("/postal-code", post(checkout::postal_code))
        .route("/form", patch(checkout::update_form))
        .route("/submit", post(checkout::submit))
        .route("/payment/check", post(checkout::check_payment))
        .route("/payment/confirm", post(checkout::confirm_payment))
        .route("/payment/events", get(checkout::payment_events))
        .route("/payment/pix-qr.png", get(checkout::pix_qr_code))
        .route("/confirmation", get(checkout::confirmation))
        .route("/receipt", get(checkout::receipt))
}

/// Create all storefront routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .nest("/session", session_routes())
        .nest("/checkout", checkout_routes())
}

/// Liveness health check endpoint.
async fn health() -> &'static str {
    "ok"
}
