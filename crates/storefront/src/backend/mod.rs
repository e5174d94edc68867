//! Dealership backend REST API client.
//!
//! # Architecture
//!
//! - [`DealershipApi`] is the seam the checkout engine talks to; the
//!   production implementation is [`BackendClient`] (`reqwest`), tests use
//!   in-memory fakes.
//! - The backend is the source of truth for orders and payments. Nothing is
//!   cached here.
//!
//! # Endpoints
//!
//! ```text
//! POST /orders                                 - create an order
//! GET  /payments/pix/{transactionId}/status    - Pix payment status
//! ```

mod client;
pub mod types;

pub use client::BackendClient;
pub use types::*;

use async_trait::async_trait;
use thiserror::Error;

/// Message shown when the backend fails without saying why.
pub const GENERIC_ORDER_FAILURE: &str = "Erro ao finalizar compra";

/// Errors that can occur when talking to the dealership backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The request never produced a response (connect, timeout, TLS).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("API error: {status} - {message}")]
    Api {
        status: u16,
        message: String,
        /// Individual field-level validation messages, when provided.
        field_errors: Vec<String>,
    },

    /// The response body could not be understood.
    #[error("Parse error: {0}")]
    Parse(String),
}

impl BackendError {
    /// Message suitable for showing to the buyer.
    ///
    /// Field-level validation messages are joined when present; otherwise the
    /// backend's own message is used.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Api {
                field_errors,
                message,
                ..
            } => {
                if field_errors.is_empty() {
                    message.clone()
                } else {
                    field_errors.join("; ")
                }
            }
            Self::Http(_) => {
                "Não foi possível conectar ao servidor. Tente novamente.".to_string()
            }
            Self::Parse(_) => GENERIC_ORDER_FAILURE.to_string(),
        }
    }
}

/// Operations the checkout needs from the dealership backend.
#[async_trait]
pub trait DealershipApi: Send + Sync {
    /// Create an order and generate its payment artifact.
    async fn create_order(
        &self,
        request: &CreateOrderRequest,
    ) -> Result<CreateOrderResponse, BackendError>;

    /// Ask whether a Pix charge has been paid.
    async fn pix_payment_status(
        &self,
        transaction_id: &str,
    ) -> Result<PixPaymentStatus, BackendError>;
}

/// Build an [`BackendError::Api`] from a failed response body.
///
/// JSON bodies are searched for field-level errors, then `message`,
/// `detail` and `title`. Plain-text bodies are used as-is after stripping
/// .NET exception noise.
#[must_use]
pub fn api_error(status: u16, body: &str) -> BackendError {
    let parsed = serde_json::from_str::<ErrorBody>(body).ok();

    let field_errors = parsed
        .as_ref()
        .map(ErrorBody::field_messages)
        .unwrap_or_default()
        .into_iter()
        .map(|m| humanize_server_message(&m))
        .collect();

    let message = parsed
        .and_then(|b| b.message.or(b.detail).or(b.title))
        .or_else(|| {
            let trimmed = body.trim();
            (!trimmed.is_empty() && !trimmed.starts_with('{')).then(|| trimmed.to_string())
        })
        .map_or_else(
            || GENERIC_ORDER_FAILURE.to_string(),
            |m| humanize_server_message(&m),
        );

    BackendError::Api {
        status,
        message,
        field_errors,
    }
}

/// Strip .NET exception names and stack traces from a backend message.
///
/// ```text
/// "System.InvalidOperationException: Carro já vendido\n   at ..." -> "Operação inválida: Carro já vendido"
/// "System.Exception: falha at Foo.Bar()"                          -> "System.Exception: falha"
/// ```
#[must_use]
pub fn humanize_server_message(raw: &str) -> String {
    let first_line = raw.lines().next().unwrap_or_default().trim();

    if first_line.contains("System.InvalidOperationException") {
        let detail = first_line
            .split_once(':')
            .map(|(_, rest)| rest.split(" at ").next().unwrap_or_default().trim())
            .unwrap_or_default();
        if detail.is_empty() {
            return "Operação inválida. Por favor, verifique os dados e tente novamente".to_string();
        }
        return format!("Operação inválida: {detail}");
    }

    if first_line.contains("System.") {
        return first_line
            .split(" at ")
            .next()
            .unwrap_or_default()
            .trim()
            .to_string();
    }

    raw.trim().to_string()
}
