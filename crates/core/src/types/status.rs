//! Status enums for the checkout flow.

use serde::{Deserialize, Serialize};

/// Payment method chosen at checkout.
///
/// The backend identifies methods by a numeric code (see [`Self::code`]);
/// the storefront API uses the snake-case names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Brazilian instant payment (QR code or copy-paste payload).
    #[default]
    Pix,
    /// Bank payment slip with a due date.
    Boleto,
    /// Simulated credit card, optionally in installments.
    CreditCard,
}

impl PaymentMethod {
    /// All methods in selector order.
    pub const ALL: [Self; 3] = [Self::Pix, Self::Boleto, Self::CreditCard];

    /// Numeric code sent to the order-creation endpoint.
    #[must_use]
    pub const fn code(&self) -> u8 {
        match self {
            Self::Pix => 0,
            Self::Boleto => 1,
            Self::CreditCard => 2,
        }
    }

    /// Resolve a backend numeric code.
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Pix),
            1 => Some(Self::Boleto),
            2 => Some(Self::CreditCard),
            _ => None,
        }
    }

    /// Customer-facing label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Pix => "Pix",
            Self::Boleto => "Boleto Bancário",
            Self::CreditCard => "Cartão de Crédito",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pix => write!(f, "pix"),
            Self::Boleto => write!(f, "boleto"),
            Self::CreditCard => write!(f, "credit_card"),
        }
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pix" => Ok(Self::Pix),
            "boleto" => Ok(Self::Boleto),
            "credit_card" => Ok(Self::CreditCard),
            _ => Err(format!("invalid payment method: {s}")),
        }
    }
}

/// Pix payment status.
///
/// ```text
/// Pending -> AwaitingPayment -> Paid
///                            -> Expired
/// ```
///
/// `Paid` and `Expired` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    AwaitingPayment,
    Paid,
    Expired,
}

impl PaymentStatus {
    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Paid | Self::Expired)
    }

    /// Whether moving from `self` to `next` is a legal transition.
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::AwaitingPayment)
                | (Self::AwaitingPayment, Self::Paid | Self::Expired)
        )
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::AwaitingPayment => write!(f, "awaiting_payment"),
            Self::Paid => write!(f, "paid"),
            Self::Expired => write!(f, "expired"),
        }
    }
}

/// Step of the checkout flow shown to the buyer.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStep {
    /// Step 1: delivery address and payment method.
    #[default]
    Address,
    /// Step 2: method-specific payment screen.
    Payment,
    /// Step 3: order summary.
    Confirmation,
}

impl CheckoutStep {
    /// 1-based position used by the progress indicator.
    #[must_use]
    pub const fn number(&self) -> u8 {
        match self {
            Self::Address => 1,
            Self::Payment => 2,
            Self::Confirmation => 3,
        }
    }

    /// Progress indicator label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Address => "Endereço",
            Self::Payment => "Pagamento",
            Self::Confirmation => "Confirmação",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_method_codes_round_trip() {
        for method in PaymentMethod::ALL {
            assert_eq!(PaymentMethod::from_code(method.code()), Some(method));
        }
        assert_eq!(PaymentMethod::from_code(9), None);
    }

    #[test]
    fn test_payment_method_from_str() {
        assert_eq!(
            "credit_card".parse::<PaymentMethod>(),
            Ok(PaymentMethod::CreditCard)
        );
        assert!("cash".parse::<PaymentMethod>().is_err());
    }

    #[test]
    fn test_payment_method_serde_names() {
        let json = serde_json::to_string(&PaymentMethod::CreditCard).unwrap();
        assert_eq!(json, "\"credit_card\"");
    }

    #[test]
    fn test_payment_status_transitions() {
        use PaymentStatus::{AwaitingPayment, Expired, Paid, Pending};

        assert!(Pending.can_transition_to(AwaitingPayment));
        assert!(AwaitingPayment.can_transition_to(Paid));
        assert!(AwaitingPayment.can_transition_to(Expired));

        assert!(!Pending.can_transition_to(Paid));
        assert!(!Paid.can_transition_to(Expired));
        assert!(!Expired.can_transition_to(Paid));
        assert!(!AwaitingPayment.can_transition_to(Pending));
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(PaymentStatus::Paid.is_terminal());
        assert!(PaymentStatus::Expired.is_terminal());
        assert!(!PaymentStatus::AwaitingPayment.is_terminal());
    }

    #[test]
    fn test_checkout_step_order() {
        assert!(CheckoutStep::Address < CheckoutStep::Payment);
        assert!(CheckoutStep::Payment < CheckoutStep::Confirmation);
        assert_eq!(CheckoutStep::Confirmation.number(), 3);
    }
}
