//! Input masks applied to checkout form fields as they are typed.
//!
//! Every mask is idempotent: feeding a masked value back in yields the same
//! value, so the SPA can send whatever is in the input box.

/// Longest card number accepted, in digits.
pub const CARD_NUMBER_MAX_DIGITS: usize = 16;
/// Longest CVV accepted, in digits.
pub const CVV_MAX_DIGITS: usize = 4;
/// Installment bounds (inclusive).
pub const MIN_INSTALLMENTS: u8 = 1;
pub const MAX_INSTALLMENTS: u8 = 12;

/// Keep only ASCII digits, up to `max` of them.
#[must_use]
pub fn digits_only(raw: &str, max: usize) -> String {
    raw.chars().filter(char::is_ascii_digit).take(max).collect()
}

/// `01310930` -> `01310-930`.
#[must_use]
pub fn mask_postal_code(raw: &str) -> String {
    let digits = digits_only(raw, 8);
    match digits.split_at_checked(5) {
        Some((head, tail)) if !tail.is_empty() => format!("{head}-{tail}"),
        _ => digits,
    }
}

/// `4111111111111111` -> `4111 1111 1111 1111`.
#[must_use]
pub fn mask_card_number(raw: &str) -> String {
    let digits = digits_only(raw, CARD_NUMBER_MAX_DIGITS);
    let mut masked = String::with_capacity(digits.len() + digits.len() / 4);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && i % 4 == 0 {
            masked.push(' ');
        }
        masked.push(c);
    }
    masked
}

/// `1225` -> `12/25`.
#[must_use]
pub fn mask_card_expiry(raw: &str) -> String {
    let digits = digits_only(raw, 4);
    match digits.split_at_checked(2) {
        Some((month, year)) if !year.is_empty() => format!("{month}/{year}"),
        _ => digits,
    }
}

/// Digits only, at most four.
#[must_use]
pub fn mask_cvv(raw: &str) -> String {
    digits_only(raw, CVV_MAX_DIGITS)
}

/// Clamp an installment count into `[1, 12]`.
#[must_use]
pub fn clamp_installments(requested: i64) -> u8 {
    let clamped = requested.clamp(i64::from(MIN_INSTALLMENTS), i64::from(MAX_INSTALLMENTS));
    u8::try_from(clamped).unwrap_or(MIN_INSTALLMENTS)
}

/// Parse a free-form installment input; anything unparseable counts as 1.
#[must_use]
pub fn parse_installments(raw: &str) -> u8 {
    raw.trim()
        .parse::<i64>()
        .map_or(MIN_INSTALLMENTS, clamp_installments)
}

/// Seconds to `MM:SS` for the Pix countdown.
#[must_use]
pub fn format_countdown(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}
