//! Cart snapshot carried into checkout.
//!
//! The cart itself is owned by the dealership backend. Checkout only sees a
//! read-only copy taken when the buyer leaves the cart page.

use serde::{Deserialize, Serialize};

use crate::{CartId, Price, VehicleId};

/// One line of the cart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub vehicle_id: VehicleId,
    pub name: String,
    pub unit_price: Price,
    pub quantity: u32,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub model_year: Option<u16>,
    #[serde(default)]
    pub plate: Option<String>,
}

impl CartItem {
    /// Unit price times quantity, `None` on overflow.
    #[must_use]
    pub fn line_total(&self) -> Option<Price> {
        self.unit_price.checked_times(self.quantity)
    }
}

/// Read-only copy of the cart at the moment checkout begins.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CartSnapshot {
    pub cart_id: CartId,
    pub items: Vec<CartItem>,
}

impl CartSnapshot {
    /// Sum of all line totals.
    ///
    /// `None` when a line or the sum leaves the decimal range. The cart comes
    /// from the client, so callers reject such a cart instead of trusting it.
    #[must_use]
    pub fn total(&self) -> Option<Price> {
        self.items
            .iter()
            .try_fold(Price::zero(), |acc, item| acc.checked_plus(&item.line_total()?))
    }

    /// Total quantity across lines (the navbar badge count), `None` on overflow.
    #[must_use]
    pub fn item_count(&self) -> Option<u32> {
        self.items
            .iter()
            .try_fold(0_u32, |acc, item| acc.checked_add(item.quantity))
    }

    /// The vehicle being purchased: the first line of the cart.
    #[must_use]
    pub fn vehicle(&self) -> Option<VehicleSummary> {
        self.items.first().map(VehicleSummary::from)
    }
}

/// Vehicle details shown on the checkout and confirmation screens.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VehicleSummary {
    pub vehicle_id: VehicleId,
    pub model: String,
    pub year: Option<u16>,
    pub plate: Option<String>,
    pub color: Option<String>,
}

impl From<&CartItem> for VehicleSummary {
    fn from(item: &CartItem) -> Self {
        Self {
            vehicle_id: item.vehicle_id,
            model: item.name.clone(),
            year: item.model_year,
            plate: item.plate.clone(),
            color: item.color.clone(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use rust_decimal::Decimal;

    use super::*;

    const HUGE: &str = "50000000000000000000000000000";

    fn item(name: &str, price: &str, quantity: u32) -> CartItem {
        CartItem {
            vehicle_id: VehicleId::new(10),
            name: name.to_string(),
            unit_price: Price::new(Decimal::from_str(price).unwrap()),
            quantity,
            color: Some("Prata".to_string()),
            image_url: None,
            model_year: Some(2022),
            plate: None,
        }
    }

    #[test]
    fn test_total_sums_lines() {
        let cart = CartSnapshot {
            cart_id: CartId::new(1),
            items: vec![item("Onix LT", "89990.00", 1), item("Tapete", "150.25", 2)],
        };
        assert_eq!(
            cart.total(),
            Some(Price::new(Decimal::from_str("90290.50").unwrap()))
        );
        assert_eq!(cart.item_count(), Some(3));
    }

    #[test]
    fn test_empty_cart_total_is_zero() {
        let cart = CartSnapshot {
            cart_id: CartId::new(1),
            items: vec![],
        };
        assert_eq!(cart.total(), Some(Price::zero()));
        assert_eq!(cart.item_count(), Some(0));
        assert!(cart.vehicle().is_none());
    }

    #[test]
    fn test_oversized_cart_has_no_total() {
        let cart = CartSnapshot {
            cart_id: CartId::new(1),
            items: vec![item("Onix LT", HUGE, 2)],
        };
        assert_eq!(cart.total(), None);

        let cart = CartSnapshot {
            cart_id: CartId::new(1),
            items: vec![item("Onix LT", HUGE, 1), item("Tracker", HUGE, 1)],
        };
        assert_eq!(cart.total(), None);
        assert_eq!(cart.item_count(), Some(2));
    }

    #[test]
    fn test_item_count_overflow_is_none() {
        let cart = CartSnapshot {
            cart_id: CartId::new(1),
            items: vec![item("Tapete", "1", u32::MAX), item("Tapete", "1", 1)],
        };
        assert_eq!(cart.item_count(), None);
    }

    #[test]
    fn test_vehicle_summary_from_first_line() {
        let cart = CartSnapshot {
            cart_id: CartId::new(1),
            items: vec![item("Corolla XEi", "150000", 1)],
        };
        let vehicle = cart.vehicle().unwrap();
        assert_eq!(vehicle.model, "Corolla XEi");
        assert_eq!(vehicle.year, Some(2022));
    }

    #[test]
    fn test_deserializes_camel_case() {
        let json = r#"{
            "cartId": 4,
            "items": [{
                "vehicleId": 9,
                "name": "HB20",
                "unitPrice": {"amount": "70000.00"},
                "quantity": 1
            }]
        }"#;
        let cart: CartSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(cart.cart_id, CartId::new(4));
        assert_eq!(cart.items[0].color, None);
    }
}
