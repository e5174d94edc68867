//! Checkout engine.
//!
//! # Flow
//!
//! ```text
//! Address (1) ──submit──> Payment (2) ──paid / confirm──> Confirmation (3)
//! ```
//!
//! - [`CheckoutSession`] owns the form, the cart snapshot taken at entry and,
//!   once submitted, the [`PlacedOrder`] with its [`PaymentFlow`].
//! - Pix payments are watched by a [`PixMonitor`]: one tokio task owning the
//!   countdown and the status poll. Dropping the flow aborts it.
//! - Sessions live in a [`CheckoutRegistry`] keyed by visitor id and are
//!   evicted after a period of inactivity.

mod confirmation;
mod form;
pub mod mask;
mod payment;
mod pix;
mod registry;
mod session;
mod view;

pub use confirmation::{ConfirmationSummary, InstallmentBreakdown};
pub use form::{CardDetails, CheckoutForm, FieldErrors, FormPatch, ValidatedForm};
pub use payment::{PaymentArtifact, PaymentFlow, PlacedOrder};
pub use pix::{PixCheck, PixMonitor, PixState};
pub use registry::{CheckoutRegistry, SharedSession};
pub use session::CheckoutSession;
pub use view::{CheckoutView, FormView, InstallmentOption, OrderView};

use danithur_core::{CartSnapshot, CheckoutStep, Price};
use thiserror::Error;

use crate::backend::{BackendError, GENERIC_ORDER_FAILURE};
use crate::postal::PostalLookupError;

/// Errors surfaced by checkout operations.
///
/// Everything except [`CheckoutError::PaymentExpired`] is recoverable: the
/// buyer fixes the input or retries.
#[derive(Debug, Clone, Error)]
pub enum CheckoutError {
    /// One or more form fields are missing or malformed.
    #[error("Validation failed: {} field(s)", .0.len())]
    Validation(FieldErrors),

    /// The postal code service does not know the code.
    #[error("Postal code not found: {0}")]
    LookupNotFound(String),

    /// A collaborator could not be reached.
    #[error("Network error: {0}")]
    Network(String),

    /// The backend rejected the request.
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// The Pix charge expired; the checkout must be restarted.
    #[error("Pix payment expired")]
    PaymentExpired,

    /// The visitor has no checkout in progress.
    #[error("No active checkout")]
    NoActiveCheckout,

    /// The action is not available at the current step.
    #[error("Action not allowed at step {step:?}: {action}")]
    InvalidStep {
        step: CheckoutStep,
        action: &'static str,
    },

    /// Checkout was started with nothing in the cart.
    #[error("Cart is empty")]
    EmptyCart,

    /// No buyer is signed in for this visitor.
    #[error("Buyer not signed in")]
    NotSignedIn,
}

/// Badge count and total of a client-supplied cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartTotals {
    pub item_count: u32,
    pub total: Price,
}

impl CartTotals {
    /// Sum the cart, refusing quantities or amounts out of range.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::Validation`] keyed on `cart` when the sum
    /// overflows.
    pub fn of(cart: &CartSnapshot) -> Result<Self, CheckoutError> {
        match (cart.item_count(), cart.total()) {
            (Some(item_count), Some(total)) => Ok(Self { item_count, total }),
            _ => Err(CheckoutError::Validation(FieldErrors::from([(
                "cart",
                "Valores do carrinho fora do limite".to_string(),
            )]))),
        }
    }
}

impl CheckoutError {
    /// Message suitable for inline display.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(_) => "Preencha os campos obrigatórios".to_string(),
            Self::LookupNotFound(_) => "CEP não encontrado".to_string(),
            Self::Network(message) | Self::Server { message, .. } => message.clone(),
            Self::PaymentExpired => {
                "O QR Code Pix expirou. Reinicie a compra para gerar um novo.".to_string()
            }
            Self::NoActiveCheckout => "Nenhuma compra em andamento".to_string(),
            Self::InvalidStep { .. } => "Ação indisponível nesta etapa".to_string(),
            Self::EmptyCart => "Seu carrinho está vazio".to_string(),
            Self::NotSignedIn => "Faça login para finalizar a compra".to_string(),
        }
    }
}

impl From<BackendError> for CheckoutError {
    fn from(err: BackendError) -> Self {
        match &err {
            BackendError::Http(_) => Self::Network(err.user_message()),
            BackendError::Api { status, .. } => Self::Server {
                status: *status,
                message: err.user_message(),
            },
            BackendError::Parse(_) => Self::Server {
                status: 502,
                message: GENERIC_ORDER_FAILURE.to_string(),
            },
        }
    }
}

impl From<PostalLookupError> for CheckoutError {
    fn from(err: PostalLookupError) -> Self {
        match err {
            PostalLookupError::NotFound(code) => Self::LookupNotFound(code),
            PostalLookupError::Http(_) | PostalLookupError::Service(_) => {
                Self::Network("Não foi possível consultar o CEP. Preencha o endereço manualmente.".to_string())
            }
        }
    }
}
