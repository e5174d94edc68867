//! Order summary for the confirmation step and the printed receipt.

use chrono::{DateTime, FixedOffset, Utc};
use danithur_core::{DeliveryAddress, OrderId, PaymentMethod, Price, VehicleSummary};
use serde::Serialize;

use super::payment::{PaymentArtifact, PlacedOrder};
use crate::config::MerchantInfo;

/// Brasília time (UTC-3, no daylight saving).
const BRT_OFFSET_SECS: i32 = -3 * 60 * 60;

/// Card installment plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallmentBreakdown {
    pub count: u8,
    pub value: Price,
    /// `3x de R$ 53.300,00 sem juros`
    pub label: String,
}

impl InstallmentBreakdown {
    #[must_use]
    pub fn new(total: Price, count: u8) -> Self {
        let value = total.installment(count);
        Self {
            count,
            value,
            label: format!("{count}x de {value} sem juros"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationSummary {
    pub order_id: OrderId,
    pub total: Price,
    pub total_display: String,
    pub payment_method: PaymentMethod,
    pub payment_method_label: &'static str,
    pub installments: Option<InstallmentBreakdown>,
    pub delivery_address: DeliveryAddress,
    pub delivery_address_line: String,
    pub placed_at: DateTime<Utc>,
    /// `dd/mm/yyyy hh:mm`, Brasília time.
    pub placed_at_display: String,
    pub vehicle: Option<VehicleSummary>,
    pub merchant: MerchantInfo,
}

impl ConfirmationSummary {
    #[must_use]
    pub fn new(
        order: &PlacedOrder,
        vehicle: Option<VehicleSummary>,
        merchant: &MerchantInfo,
    ) -> Self {
        let installments = match order.flow.artifact() {
            PaymentArtifact::CreditCard { installments, .. } => {
                Some(InstallmentBreakdown::new(order.total, installments))
            }
            PaymentArtifact::Pix { .. } | PaymentArtifact::Boleto { .. } => None,
        };

        Self {
            order_id: order.order_id,
            total: order.total,
            total_display: order.total.display(),
            payment_method: order.method(),
            payment_method_label: order.method().label(),
            installments,
            delivery_address: order.address.clone(),
            delivery_address_line: order.address.one_line(),
            placed_at: order.placed_at,
            placed_at_display: format_brasilia(order.placed_at),
            vehicle,
            merchant: merchant.clone(),
        }
    }
}

fn format_brasilia(at: DateTime<Utc>) -> String {
    FixedOffset::east_opt(BRT_OFFSET_SECS).map_or_else(
        || at.format("%d/%m/%Y %H:%M").to_string(),
        |offset| at.with_timezone(&offset).format("%d/%m/%Y %H:%M").to_string(),
    )
}
