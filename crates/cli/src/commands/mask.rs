//! Input mask preview command.

use clap::ValueEnum;
use danithur_storefront::checkout::mask;

/// Checkout fields that are masked while typing.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum MaskField {
    PostalCode,
    CardNumber,
    CardExpiry,
    CardCvv,
    Installments,
}

/// Masked form of `raw` for `field`.
#[must_use]
pub fn apply(field: MaskField, raw: &str) -> String {
    match field {
        MaskField::PostalCode => mask::mask_postal_code(raw),
        MaskField::CardNumber => mask::mask_card_number(raw),
        MaskField::CardExpiry => mask::mask_card_expiry(raw),
        MaskField::CardCvv => mask::mask_cvv(raw),
        MaskField::Installments => mask::parse_installments(raw).to_string(),
    }
}

#[allow(clippy::print_stdout)]
pub fn preview(field: MaskField, raw: &str) {
    println!("{}", apply(field, raw));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_postal_code() {
        assert_eq!(apply(MaskField::PostalCode, "01310930"), "01310-930");
    }

    #[test]
    fn test_apply_installments_clamps() {
        assert_eq!(apply(MaskField::Installments, "48"), "12");
    }
}
