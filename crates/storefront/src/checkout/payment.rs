//! Placed orders and their method-specific payment flows.

use chrono::{DateTime, Days, NaiveDate, Utc};
use danithur_core::{DeliveryAddress, OrderId, PaymentMethod, PaymentStatus, Price};
use serde::Serialize;

use super::CheckoutError;
use super::pix::PixMonitor;
use crate::backend::{BoletoDocument, CreateOrderResponse, PixCharge};

/// What the buyer needs to pay, as returned at order creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum PaymentArtifact {
    #[serde(rename_all = "camelCase")]
    Pix {
        qr_code_base64: Option<String>,
        copy_paste: String,
        transaction_id: String,
        expires_in_seconds: u64,
    },
    #[serde(rename_all = "camelCase")]
    Boleto {
        document_url: String,
        due_date: NaiveDate,
    },
    #[serde(rename_all = "camelCase")]
    CreditCard {
        installments: u8,
        installment_value: Price,
    },
}

impl PaymentArtifact {
    #[must_use]
    pub const fn method(&self) -> PaymentMethod {
        match self {
            Self::Pix { .. } => PaymentMethod::Pix,
            Self::Boleto { .. } => PaymentMethod::Boleto,
            Self::CreditCard { .. } => PaymentMethod::CreditCard,
        }
    }
}

/// Live payment state for a placed order.
///
/// Dropping a `Pix` flow stops its monitor.
#[derive(Debug)]
pub enum PaymentFlow {
    Pix {
        charge: PixCharge,
        expires_in_seconds: u64,
        monitor: PixMonitor,
    },
    Boleto {
        document: BoletoDocument,
        due_date: NaiveDate,
    },
    CreditCard {
        installments: u8,
        installment_value: Price,
    },
}

impl PaymentFlow {
    /// Current payment status.
    ///
    /// Boleto stays awaiting payment since it is never confirmed server-side;
    /// card payments settle at order creation.
    #[must_use]
    pub fn status(&self) -> PaymentStatus {
        match self {
            Self::Pix { monitor, .. } => monitor.state().status,
            Self::Boleto { .. } => PaymentStatus::AwaitingPayment,
            Self::CreditCard { .. } => PaymentStatus::Paid,
        }
    }

    /// Serializable copy of the artifact.
    #[must_use]
    pub fn artifact(&self) -> PaymentArtifact {
        match self {
            Self::Pix {
                charge,
                expires_in_seconds,
                ..
            } => PaymentArtifact::Pix {
                qr_code_base64: charge.qr_code_base64.clone(),
                copy_paste: charge.copy_paste.clone(),
                transaction_id: charge.transaction_id.clone(),
                expires_in_seconds: *expires_in_seconds,
            },
            Self::Boleto { document, due_date } => PaymentArtifact::Boleto {
                document_url: document.document_url.clone(),
                due_date: *due_date,
            },
            Self::CreditCard {
                installments,
                installment_value,
            } => PaymentArtifact::CreditCard {
                installments: *installments,
                installment_value: *installment_value,
            },
        }
    }

    #[must_use]
    pub const fn method(&self) -> PaymentMethod {
        match self {
            Self::Pix { .. } => PaymentMethod::Pix,
            Self::Boleto { .. } => PaymentMethod::Boleto,
            Self::CreditCard { .. } => PaymentMethod::CreditCard,
        }
    }

    #[must_use]
    pub const fn pix_monitor(&self) -> Option<&PixMonitor> {
        match self {
            Self::Pix { monitor, .. } => Some(monitor),
            _ => None,
        }
    }
}

/// Boleto due date: generation date plus `due_days`.
#[must_use]
pub fn boleto_due_date(generated_on: NaiveDate, due_days: u32) -> NaiveDate {
    generated_on
        .checked_add_days(Days::new(u64::from(due_days)))
        .unwrap_or(generated_on)
}

/// An order accepted by the backend.
#[derive(Debug)]
pub struct PlacedOrder {
    pub order_id: OrderId,
    pub total: Price,
    pub address: DeliveryAddress,
    pub placed_at: DateTime<Utc>,
    pub flow: PaymentFlow,
}

impl PlacedOrder {
    #[must_use]
    pub const fn method(&self) -> PaymentMethod {
        self.flow.method()
    }
}

/// Pieces of a creation response, checked against the chosen method.
pub(super) enum AcceptedArtifact {
    Pix(PixCharge),
    Boleto(BoletoDocument),
    CreditCard,
}

impl AcceptedArtifact {
    /// Pick the artifact for `method` out of the response.
    ///
    /// # Errors
    ///
    /// Returns a server error when the backend omitted it.
    pub(super) fn from_response(
        method: PaymentMethod,
        response: &CreateOrderResponse,
    ) -> Result<Self, CheckoutError> {
        let missing = || CheckoutError::Server {
            status: 502,
            message: format!(
                "Pedido {} criado sem dados de pagamento ({})",
                response.order_id,
                method.label()
            ),
        };
        match method {
            PaymentMethod::Pix => response.pix.clone().map(Self::Pix).ok_or_else(missing),
            PaymentMethod::Boleto => response
                .boleto
                .clone()
                .map(Self::Boleto)
                .ok_or_else(missing),
            PaymentMethod::CreditCard => Ok(Self::CreditCard),
        }
    }
}
