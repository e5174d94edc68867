//! Request and response shapes for the dealership backend REST API.
//!
//! The backend owns these schemas; field names are camelCase on the wire.

use danithur_core::{CartId, DeliveryAddress, OrderId, UserId, VehicleId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// =============================================================================
// Order Creation
// =============================================================================

/// Body of `POST /orders`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub buyer_id: UserId,
    pub vehicle_id: VehicleId,
    pub cart_id: CartId,
    pub total_price: Decimal,
    /// Numeric payment method code (`PaymentMethod::code`).
    pub payment_method: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observations: Option<String>,
    pub delivery_address: DeliveryAddressPayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installments: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card: Option<CardDetailsPayload>,
}

/// Structured delivery address as the backend expects it.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryAddressPayload {
    pub postal_code: String,
    pub street: String,
    pub number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complement: Option<String>,
    pub neighborhood: String,
    pub city: String,
    pub region: String,
}

impl From<&DeliveryAddress> for DeliveryAddressPayload {
    fn from(address: &DeliveryAddress) -> Self {
        Self {
            postal_code: address.postal_code.digits().to_string(),
            street: address.street.clone(),
            number: address.number.clone(),
            complement: address.complement.clone(),
            neighborhood: address.neighborhood.clone(),
            city: address.city.clone(),
            region: address.region.to_string(),
        }
    }
}

/// Card details forwarded for simulated processing only.
///
/// Implements `Debug` manually so card data never reaches logs.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardDetailsPayload {
    /// Bare digits, no grouping spaces.
    pub number: String,
    /// `MM/YY`
    pub expiry: String,
    pub cvv: String,
    pub holder_name: String,
}

impl std::fmt::Debug for CardDetailsPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let last_four = self
            .number
            .get(self.number.len().saturating_sub(4)..)
            .unwrap_or_default();
        f.debug_struct("CardDetailsPayload")
            .field("number", &format!("**** {last_four}"))
            .field("expiry", &self.expiry)
            .field("cvv", &"[REDACTED]")
            .field("holder_name", &self.holder_name)
            .finish()
    }
}

/// Response of `POST /orders`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderResponse {
    pub order_id: OrderId,
    #[serde(default)]
    pub pix: Option<PixCharge>,
    #[serde(default)]
    pub boleto: Option<BoletoDocument>,
}

/// Pix charge generated for an order.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PixCharge {
    /// PNG image of the QR code, base64 encoded.
    #[serde(default)]
    pub qr_code_base64: Option<String>,
    /// "Pix copia e cola" payload.
    pub copy_paste: String,
    pub transaction_id: String,
    #[serde(default)]
    pub expires_in_seconds: Option<u64>,
}

/// Boleto generated for an order.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BoletoDocument {
    pub document_url: String,
}

// =============================================================================
// Payment Status
// =============================================================================

/// Response of `GET /payments/pix/{transactionId}/status`.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct PixPaymentStatus {
    pub paid: bool,
}

// =============================================================================
// Error Bodies
// =============================================================================

/// Error payload returned by the backend on 4xx/5xx.
///
/// Covers both the plain `{"message": ...}` shape and ASP.NET validation
/// problem details (`{"title": ..., "errors": {"Field": ["msg"]}}`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub errors: Option<serde_json::Value>,
}

impl ErrorBody {
    /// Flatten field-level error lists into individual messages.
    #[must_use]
    pub fn field_messages(&self) -> Vec<String> {
        let mut messages = Vec::new();
        match &self.errors {
            Some(serde_json::Value::Object(fields)) => {
                for value in fields.values() {
                    collect_strings(value, &mut messages);
                }
            }
            Some(value) => collect_strings(value, &mut messages),
            None => {}
        }
        messages
    }
}

fn collect_strings(value: &serde_json::Value, out: &mut Vec<String>) {
    match value {
        serde_json::Value::String(s) if !s.trim().is_empty() => out.push(s.trim().to_string()),
        serde_json::Value::Array(items) => {
            for item in items {
                collect_strings(item, out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_card_debug_masks_number_and_cvv() {
        let card = CardDetailsPayload {
            number: "4111111111111111".to_string(),
            expiry: "12/25".to_string(),
            cvv: "123".to_string(),
            holder_name: "ANA SOUZA".to_string(),
        };
        let debug_output = format!("{card:?}");
        assert!(debug_output.contains("**** 1111"));
        assert!(!debug_output.contains("4111111111111111"));
        assert!(!debug_output.contains("\"123\""));
    }

    #[test]
    fn test_field_messages_from_problem_details() {
        let body: ErrorBody = serde_json::from_str(
            r#"{"title": "One or more validation errors occurred.",
                "errors": {"Numero": ["Número é obrigatório"], "Uf": ["UF inválida", "UF deve ter 2 letras"]}}"#,
        )
        .unwrap();
        let mut messages = body.field_messages();
        messages.sort();
        assert_eq!(
            messages,
            vec!["Número é obrigatório", "UF deve ter 2 letras", "UF inválida"]
        );
    }

    #[test]
    fn test_field_messages_from_list() {
        let body: ErrorBody =
            serde_json::from_str(r#"{"errors": ["Carro indisponível"]}"#).unwrap();
        assert_eq!(body.field_messages(), vec!["Carro indisponível"]);
    }

    #[test]
    fn test_create_order_request_omits_card_fields_when_absent() {
        let request = CreateOrderRequest {
            buyer_id: UserId::new(1),
            vehicle_id: VehicleId::new(2),
            cart_id: CartId::new(3),
            total_price: Decimal::new(8_999_000, 2),
            payment_method: 0,
            observations: None,
            delivery_address: DeliveryAddressPayload {
                postal_code: "01310930".to_string(),
                street: "Avenida Paulista".to_string(),
                number: "1578".to_string(),
                complement: None,
                neighborhood: "Bela Vista".to_string(),
                city: "São Paulo".to_string(),
                region: "SP".to_string(),
            },
            installments: None,
            card: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["buyerId"], 1);
        assert_eq!(json["paymentMethod"], 0);
        assert_eq!(json["deliveryAddress"]["postalCode"], "01310930");
        assert!(json.get("installments").is_none());
        assert!(json.get("card").is_none());
    }

    #[test]
    fn test_create_order_response_pix() {
        let response: CreateOrderResponse = serde_json::from_str(
            r#"{"orderId": 77, "pix": {"copyPaste": "000201...", "transactionId": "tx-1", "expiresInSeconds": 900}}"#,
        )
        .unwrap();
        assert_eq!(response.order_id, OrderId::new(77));
        let pix = response.pix.unwrap();
        assert_eq!(pix.expires_in_seconds, Some(900));
        assert!(pix.qr_code_base64.is_none());
        assert!(response.boleto.is_none());
    }
}
