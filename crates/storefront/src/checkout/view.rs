//! JSON view of a checkout session for the SPA.

use danithur_core::{
    CheckoutStep, OrderId, PaymentMethod, PaymentStatus, Price, VehicleSummary,
};
use serde::Serialize;

use super::confirmation::InstallmentBreakdown;
use super::mask::{self, MAX_INSTALLMENTS, MIN_INSTALLMENTS};
use super::payment::PaymentArtifact;
use super::session::CheckoutSession;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutView {
    pub step: CheckoutStep,
    pub step_number: u8,
    pub step_label: &'static str,
    pub total: Price,
    pub total_display: String,
    pub item_count: u32,
    pub vehicle: Option<VehicleSummary>,
    pub form: FormView,
    pub address_notice: Option<String>,
    pub payment_methods: Vec<PaymentMethodOption>,
    pub installment_options: Vec<InstallmentOption>,
    pub order: Option<OrderView>,
}

/// Form values echoed back after masking. The CVV is never echoed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormView {
    pub postal_code: String,
    pub street: String,
    pub number: String,
    pub complement: String,
    pub neighborhood: String,
    pub city: String,
    pub region: String,
    pub payment_method: PaymentMethod,
    pub card_number: String,
    pub card_expiry: String,
    pub card_cvv_filled: bool,
    pub card_holder_name: String,
    pub installments: u8,
    pub observations: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethodOption {
    pub method: PaymentMethod,
    pub code: u8,
    pub label: &'static str,
}

pub type InstallmentOption = InstallmentBreakdown;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    pub order_id: OrderId,
    pub payment_method: PaymentMethod,
    pub status: PaymentStatus,
    pub artifact: PaymentArtifact,
    /// Pix only: seconds until the charge expires.
    pub seconds_left: Option<u64>,
    /// Pix only: `MM:SS`.
    pub countdown: Option<String>,
}

impl CheckoutView {
    #[must_use]
    pub fn from_session(session: &CheckoutSession) -> Self {
        let step = session.step();
        let form = session.form();
        let total = session.total();

        let order = session.order().map(|order| {
            let pix_state = order.flow.pix_monitor().map(super::PixMonitor::state);
            OrderView {
                order_id: order.order_id,
                payment_method: order.method(),
                status: order.flow.status(),
                artifact: order.flow.artifact(),
                seconds_left: pix_state.map(|s| s.seconds_left),
                countdown: pix_state.map(|s| mask::format_countdown(s.seconds_left)),
            }
        });

        Self {
            step,
            step_number: step.number(),
            step_label: step.label(),
            total,
            total_display: total.display(),
            item_count: session.item_count(),
            vehicle: session.vehicle(),
            form: FormView {
                postal_code: form.postal_code.clone(),
                street: form.street.clone(),
                number: form.number.clone(),
                complement: form.complement.clone(),
                neighborhood: form.neighborhood.clone(),
                city: form.city.clone(),
                region: form.region.clone(),
                payment_method: form.payment_method,
                card_number: form.card_number.clone(),
                card_expiry: form.card_expiry.clone(),
                card_cvv_filled: !form.card_cvv.is_empty(),
                card_holder_name: form.card_holder_name.clone(),
                installments: form.installments,
                observations: form.observations.clone(),
            },
            address_notice: session.address_notice().map(str::to_string),
            payment_methods: PaymentMethod::ALL
                .iter()
                .map(|method| PaymentMethodOption {
                    method: *method,
                    code: method.code(),
                    label: method.label(),
                })
                .collect(),
            installment_options: (MIN_INSTALLMENTS..=MAX_INSTALLMENTS)
                .map(|count| InstallmentBreakdown::new(total, count))
                .collect(),
            order,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use danithur_core::{CartId, CartItem, CartSnapshot, UserId, VehicleId};
    use rust_decimal::Decimal;

    use super::*;
    use crate::checkout::FormPatch;

    fn session() -> CheckoutSession {
        CheckoutSession::start(
            Some(UserId::new(1)),
            Some(CartSnapshot {
                cart_id: CartId::new(2),
                items: vec![CartItem {
                    vehicle_id: VehicleId::new(3),
                    name: "Fiat Toro Volcano".to_string(),
                    unit_price: Price::new(Decimal::new(12_000_000, 2)),
                    quantity: 1,
                    color: None,
                    image_url: None,
                    model_year: Some(2023),
                    plate: None,
                }],
            }),
        )
        .unwrap()
    }

    #[test]
    fn test_view_before_submission() {
        let view = session().view();
        assert_eq!(view.step_number, 1);
        assert_eq!(view.total_display, "R$ 120.000,00");
        assert_eq!(view.installment_options.len(), 12);
        assert_eq!(view.installment_options[11].count, 12);
        assert_eq!(view.installment_options[11].value.amount, Decimal::new(1_000_000, 2));
        assert!(view.order.is_none());
        assert_eq!(view.payment_methods[2].code, 2);
    }

    #[test]
    fn test_view_never_echoes_cvv() {
        let mut session = session();
        session
            .update_form(FormPatch {
                payment_method: Some(PaymentMethod::CreditCard),
                card_cvv: Some("987".to_string()),
                ..FormPatch::default()
            })
            .unwrap();
        let json = serde_json::to_string(&session.view()).unwrap();
        assert!(!json.contains("987"));
        assert!(json.contains("\"cardCvvFilled\":true"));
    }
}
