//! Unified error handling with Sentry integration.
//!
//! Route handlers return `Result<T, AppError>`. Errors render as JSON:
//!
//! ```json
//! {"error": "validation_error", "message": "...", "fields": {"street": "..."}}
//! ```
//!
//! Failures on our side or a collaborator's are captured to Sentry before
//! responding; mistakes by the client are not.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::checkout::{CheckoutError, FieldErrors};

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Checkout operation failed.
    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorResponse<'a> {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<&'a FieldErrors>,
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Checkout(err) => match err {
                CheckoutError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
                CheckoutError::LookupNotFound(_) | CheckoutError::NoActiveCheckout => {
                    StatusCode::NOT_FOUND
                }
                CheckoutError::Network(_) => StatusCode::SERVICE_UNAVAILABLE,
                CheckoutError::Server { .. } => StatusCode::BAD_GATEWAY,
                CheckoutError::PaymentExpired => StatusCode::GONE,
                CheckoutError::InvalidStep { .. } | CheckoutError::EmptyCart => {
                    StatusCode::CONFLICT
                }
                CheckoutError::NotSignedIn => StatusCode::UNAUTHORIZED,
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code for the SPA.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Checkout(err) => match err {
                CheckoutError::Validation(_) => "validation_error",
                CheckoutError::LookupNotFound(_) => "lookup_not_found",
                CheckoutError::Network(_) => "network_error",
                CheckoutError::Server { .. } => "server_error",
                CheckoutError::PaymentExpired => "payment_expired",
                CheckoutError::NoActiveCheckout => "no_active_checkout",
                CheckoutError::InvalidStep { .. } => "invalid_step",
                CheckoutError::EmptyCart => "empty_cart",
                CheckoutError::NotSignedIn => "not_signed_in",
            },
            Self::NotFound(_) => "not_found",
            Self::Internal(_) => "internal_error",
        }
    }

    const fn is_server_side(&self) -> bool {
        matches!(
            self,
            Self::Internal(_)
                | Self::Checkout(CheckoutError::Network(_) | CheckoutError::Server { .. })
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.is_server_side() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Checkout(err) => err.user_message(),
            Self::Internal(_) => "Erro interno. Tente novamente.".to_string(),
            Self::NotFound(_) => self.to_string(),
        };
        let fields = match &self {
            Self::Checkout(CheckoutError::Validation(fields)) => Some(fields),
            _ => None,
        };

        let body = ErrorResponse {
            error: self.code(),
            message,
            fields,
        };
        (self.status(), Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Associate Sentry events with the signed-in buyer.
pub fn set_sentry_user(buyer_id: Option<&impl ToString>) {
    sentry::configure_scope(|scope| {
        scope.set_user(buyer_id.map(|id| sentry::User {
            id: Some(id.to_string()),
            ..Default::default()
        }));
    });
}

/// Add a breadcrumb for a checkout action.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("checkout", "Order submitted", Some(&[("method", "pix")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    for (key, value) in data.unwrap_or_default() {
        breadcrumb.data.insert(
            (*key).to_string(),
            serde_json::Value::String((*value).to_string()),
        );
    }

    sentry::add_breadcrumb(breadcrumb);
}
