//! Type-safe price representation using decimal arithmetic.
//!
//! The storefront sells in Brazilian reais only, so [`CurrencyCode`] has a
//! single variant. Display formatting follows pt-BR conventions
//! (`R$ 1.234,56`).

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// A price with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit (reais, not centavos).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    #[serde(default)]
    pub currency_code: CurrencyCode,
}

impl Price {
    /// Create a new price in reais.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self {
            amount,
            currency_code: CurrencyCode::BRL,
        }
    }

    /// A zero price.
    #[must_use]
    pub const fn zero() -> Self {
        Self::new(Decimal::ZERO)
    }

    /// Multiply by a line quantity, `None` past the decimal range.
    #[must_use]
    pub fn checked_times(&self, quantity: u32) -> Option<Self> {
        Some(Self {
            amount: self.amount.checked_mul(Decimal::from(quantity))?,
            currency_code: self.currency_code,
        })
    }

    /// Add another price of the same currency, `None` past the decimal range.
    #[must_use]
    pub fn checked_plus(&self, other: &Self) -> Option<Self> {
        Some(Self {
            amount: self.amount.checked_add(other.amount)?,
            currency_code: self.currency_code,
        })
    }

    /// Value of one installment when this price is split `count` ways.
    ///
    /// Rounded half away from zero to the centavo. A count of zero is
    /// treated as a single installment.
    #[must_use]
    pub fn installment(&self, count: u8) -> Self {
        let divisor = Decimal::from(count.max(1));
        Self {
            amount: (self.amount / divisor)
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
            currency_code: self.currency_code,
        }
    }

    /// Format for display, e.g. `R$ 1.234,56`.
    #[must_use]
    pub fn display(&self) -> String {
        format!("{} {}", self.currency_code.symbol(), format_amount(self.amount))
    }
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.display())
    }
}

impl Default for Price {
    fn default() -> Self {
        Self::zero()
    }
}

/// ISO 4217 currency codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    BRL,
}

impl CurrencyCode {
    /// Display symbol for the currency.
    #[must_use]
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::BRL => "R$",
        }
    }
}

/// Format an amount with `.` thousands separators and `,` decimal comma.
fn format_amount(amount: Decimal) -> String {
    let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    let text = rounded.abs().to_string();
    let (whole, cents) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let digits: Vec<char> = whole.chars().collect();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(*c);
    }

    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{sign}{grouped},{cents}")
}
