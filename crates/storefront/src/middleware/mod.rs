//! HTTP middleware stack for the storefront.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (hub per request, transaction per route)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (correlation id on span, Sentry scope and response)
//! 4. Session layer (tower-sessions memory store, visitor cookie)

pub mod request_id;
pub mod session;

pub use request_id::request_id_middleware;
pub use session::{SESSION_COOKIE_NAME, Visitor, create_session_layer};
