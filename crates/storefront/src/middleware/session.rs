//! Visitor sessions.
//!
//! The cookie only carries an opaque visitor id; checkout state and the app
//! store live in process memory keyed by that id.

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use tower_sessions::{Expiry, MemoryStore, Session, SessionManagerLayer};
use uuid::Uuid;

use crate::config::StorefrontConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "dt_session";

/// Session key holding the visitor id.
const VISITOR_ID_KEY: &str = "visitor_id";

/// Create the session layer backed by an in-memory store.
#[must_use]
pub fn create_session_layer(config: &StorefrontConfig) -> SessionManagerLayer<MemoryStore> {
    let is_secure = config.base_url.starts_with("https://");
    let idle = i64::try_from(config.checkout.idle_timeout.as_secs()).unwrap_or(i64::MAX);

    SessionManagerLayer::new(MemoryStore::default())
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(idle),
        ))
        .with_secure(is_secure)
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
}

/// Extractor for the current visitor's id, minting one on first contact.
///
/// ```rust,ignore
/// async fn handler(Visitor(visitor): Visitor) -> impl IntoResponse {
///     format!("hello {visitor}")
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Visitor(pub Uuid);

/// The session layer is missing or its store failed.
#[derive(Debug)]
pub struct VisitorRejection;

impl IntoResponse for VisitorRejection {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, "Session unavailable").into_response()
    }
}

impl<S> FromRequestParts<S> for Visitor
where
    S: Send + Sync,
{
    type Rejection = VisitorRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or(VisitorRejection)?;

        if let Some(visitor) = session
            .get::<Uuid>(VISITOR_ID_KEY)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to read visitor id from session");
                VisitorRejection
            })?
        {
            return Ok(Self(visitor));
        }

        let visitor = Uuid::new_v4();
        session
            .insert(VISITOR_ID_KEY, visitor)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to store visitor id in session");
                VisitorRejection
            })?;
        tracing::debug!(%visitor, "New visitor");
        Ok(Self(visitor))
    }
}
