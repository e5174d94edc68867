//! Checkout form state and validation.

use std::collections::BTreeMap;

use danithur_core::{DeliveryAddress, PaymentMethod, PostalCode, Region};
use serde::Deserialize;

use super::mask;
use crate::postal::ResolvedAddress;

/// Field name -> message, in stable order.
pub type FieldErrors = BTreeMap<&'static str, String>;

const REQUIRED: &str = "Campo obrigatório";

/// Raw form state as typed by the buyer, masks already applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckoutForm {
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
    pub card_cvv: String,
    pub card_holder_name: String,
    pub installments: u8,
    pub observations: String,
}

/// Partial update sent by the SPA; absent fields are left alone.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FormPatch {
    pub postal_code: Option<String>,
    pub street: Option<String>,
    pub number: Option<String>,
    pub complement: Option<String>,
    pub neighborhood: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub payment_method: Option<PaymentMethod>,
    pub card_number: Option<String>,
    pub card_expiry: Option<String>,
    pub card_cvv: Option<String>,
    pub card_holder_name: Option<String>,
    pub installments: Option<i64>,
    pub observations: Option<String>,
}

/// Card data that passed validation.
#[derive(Clone, PartialEq, Eq)]
pub struct CardDetails {
    /// Bare digits.
    pub number: String,
    pub expiry: String,
    pub cvv: String,
    pub holder_name: String,
    pub installments: u8,
}

impl std::fmt::Debug for CardDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CardDetails")
            .field("number", &"[REDACTED]")
            .field("installments", &self.installments)
            .finish_non_exhaustive()
    }
}

/// A form that can be turned into an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedForm {
    pub address: DeliveryAddress,
    pub payment_method: PaymentMethod,
    pub card: Option<CardDetails>,
    pub observations: Option<String>,
}

impl CheckoutForm {
    /// Empty form with a single installment selected.
    #[must_use]
    pub fn new() -> Self {
        Self {
            installments: mask::MIN_INSTALLMENTS,
            ..Self::default()
        }
    }

    /// Merge a patch, masking each field on the way in.
    ///
    /// Switching away from credit card clears every card field.
    pub fn apply(&mut self, patch: FormPatch) {
        if let Some(v) = patch.postal_code {
            self.postal_code = mask::mask_postal_code(&v);
        }
        if let Some(v) = patch.street {
            self.street = v;
        }
        if let Some(v) = patch.number {
            self.number = v;
        }
        if let Some(v) = patch.complement {
            self.complement = v;
        }
        if let Some(v) = patch.neighborhood {
            self.neighborhood = v;
        }
        if let Some(v) = patch.city {
            self.city = v;
        }
        if let Some(v) = patch.region {
            self.region = v.trim().to_ascii_uppercase().chars().take(2).collect();
        }
        if let Some(v) = patch.observations {
            self.observations = v;
        }
        if let Some(method) = patch.payment_method {
            self.select_method(method);
        }

        if self.payment_method == PaymentMethod::CreditCard {
            if let Some(v) = patch.card_number {
                self.card_number = mask::mask_card_number(&v);
            }
            if let Some(v) = patch.card_expiry {
                self.card_expiry = mask::mask_card_expiry(&v);
            }
            if let Some(v) = patch.card_cvv {
                self.card_cvv = mask::mask_cvv(&v);
            }
            if let Some(v) = patch.card_holder_name {
                self.card_holder_name = v;
            }
            if let Some(v) = patch.installments {
                self.installments = mask::clamp_installments(v);
            }
        }
    }

    fn select_method(&mut self, method: PaymentMethod) {
        if method != PaymentMethod::CreditCard {
            self.card_number.clear();
            self.card_expiry.clear();
            self.card_cvv.clear();
            self.card_holder_name.clear();
            self.installments = mask::MIN_INSTALLMENTS;
        }
        self.payment_method = method;
    }

    /// Fill address fields from a postal code lookup.
    ///
    /// Number and complement are never touched. Empty values from the
    /// service leave whatever the buyer typed.
    pub fn apply_lookup(&mut self, resolved: &ResolvedAddress) {
        let fill = |field: &mut String, value: &str| {
            if !value.trim().is_empty() {
                *field = value.trim().to_string();
            }
        };
        fill(&mut self.street, &resolved.street);
        fill(&mut self.neighborhood, &resolved.neighborhood);
        fill(&mut self.city, &resolved.city);
        fill(&mut self.region, &resolved.region.to_ascii_uppercase());
    }

    /// Check every field and report all problems at once.
    ///
    /// # Errors
    ///
    /// Returns the field error map when anything required is missing or
    /// malformed.
    pub fn validate(&self) -> Result<ValidatedForm, FieldErrors> {
        let mut errors = FieldErrors::new();

        let postal_code = if self.postal_code.trim().is_empty() {
            errors.insert("postalCode", REQUIRED.to_string());
            None
        } else {
            match PostalCode::parse(&self.postal_code) {
                Ok(code) => Some(code),
                Err(_) => {
                    errors.insert("postalCode", "CEP inválido".to_string());
                    None
                }
            }
        };

        let street = required(&mut errors, "street", &self.street);
        let number = required(&mut errors, "number", &self.number);
        let neighborhood = required(&mut errors, "neighborhood", &self.neighborhood);
        let city = required(&mut errors, "city", &self.city);

        let region = if self.region.trim().is_empty() {
            errors.insert("region", REQUIRED.to_string());
            None
        } else {
            match Region::parse(&self.region) {
                Ok(region) => Some(region),
                Err(_) => {
                    errors.insert("region", "Use a sigla do estado (ex: SP)".to_string());
                    None
                }
            }
        };

        let card = (self.payment_method == PaymentMethod::CreditCard)
            .then(|| self.validate_card(&mut errors));

        if !errors.is_empty() {
            return Err(errors);
        }

        let (Some(postal_code), Some(region)) = (postal_code, region) else {
            return Err(errors);
        };

        Ok(ValidatedForm {
            address: DeliveryAddress {
                postal_code,
                street,
                number,
                complement: non_empty(&self.complement),
                neighborhood,
                city,
                region,
            },
            payment_method: self.payment_method,
            card,
            observations: non_empty(&self.observations),
        })
    }

    fn validate_card(&self, errors: &mut FieldErrors) -> CardDetails {
        let number = mask::digits_only(&self.card_number, mask::CARD_NUMBER_MAX_DIGITS);
        if number.is_empty() {
            errors.insert("cardNumber", REQUIRED.to_string());
        } else if number.len() < 13 {
            errors.insert("cardNumber", "Número do cartão incompleto".to_string());
        }

        if self.card_expiry.is_empty() {
            errors.insert("cardExpiry", REQUIRED.to_string());
        } else if !is_valid_expiry(&self.card_expiry) {
            errors.insert("cardExpiry", "Use o formato MM/AA".to_string());
        }

        if self.card_cvv.is_empty() {
            errors.insert("cardCvv", REQUIRED.to_string());
        } else if self.card_cvv.len() < 3 {
            errors.insert("cardCvv", "CVV inválido".to_string());
        }

        let holder_name = self.card_holder_name.trim();
        if holder_name.is_empty() {
            errors.insert("cardHolderName", REQUIRED.to_string());
        }

        CardDetails {
            number,
            expiry: self.card_expiry.clone(),
            cvv: self.card_cvv.clone(),
            holder_name: holder_name.to_string(),
            installments: self
                .installments
                .clamp(mask::MIN_INSTALLMENTS, mask::MAX_INSTALLMENTS),
        }
    }
}

fn required(errors: &mut FieldErrors, field: &'static str, value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        errors.insert(field, REQUIRED.to_string());
    }
    trimmed.to_string()
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// `MM/YY` with a month between 01 and 12.
fn is_valid_expiry(expiry: &str) -> bool {
    let Some((month, year)) = expiry.split_once('/') else {
        return false;
    };
    year.len() == 2
        && year.chars().all(|c| c.is_ascii_digit())
        && month.len() == 2
        && month.parse::<u8>().is_ok_and(|m| (1..=12).contains(&m))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn filled_form() -> CheckoutForm {
        let mut form = CheckoutForm::new();
        form.apply(FormPatch {
            postal_code: Some("01310930".to_string()),
            street: Some("Avenida Paulista".to_string()),
            number: Some("1578".to_string()),
            neighborhood: Some("Bela Vista".to_string()),
            city: Some("São Paulo".to_string()),
            region: Some("sp".to_string()),
            ..FormPatch::default()
        });
        form
    }

    fn card_patch() -> FormPatch {
        FormPatch {
            payment_method: Some(PaymentMethod::CreditCard),
            card_number: Some("4111111111111111".to_string()),
            card_expiry: Some("1225".to_string()),
            card_cvv: Some("123".to_string()),
            card_holder_name: Some("ANA SOUZA".to_string()),
            installments: Some(3),
            ..FormPatch::default()
        }
    }

    #[test]
    fn test_patch_applies_masks() {
        let mut form = filled_form();
        form.apply(card_patch());
        assert_eq!(form.postal_code, "01310-930");
        assert_eq!(form.region, "SP");
        assert_eq!(form.card_number, "4111 1111 1111 1111");
        assert_eq!(form.card_expiry, "12/25");
        assert_eq!(form.installments, 3);
    }

    #[test]
    fn test_installments_clamped_on_patch() {
        let mut form = filled_form();
        form.apply(FormPatch {
            installments: Some(15),
            ..card_patch()
        });
        assert_eq!(form.installments, 12);

        form.apply(FormPatch {
            installments: Some(0),
            ..FormPatch::default()
        });
        assert_eq!(form.installments, 1);
    }

    #[test]
    fn test_card_fields_ignored_for_other_methods() {
        let mut form = filled_form();
        form.apply(FormPatch {
            card_number: Some("4111111111111111".to_string()),
            ..FormPatch::default()
        });
        assert!(form.card_number.is_empty());
    }

    #[test]
    fn test_switching_away_from_card_clears_card_fields() {
        let mut form = filled_form();
        form.apply(card_patch());
        form.apply(FormPatch {
            payment_method: Some(PaymentMethod::Pix),
            ..FormPatch::default()
        });
        assert!(form.card_number.is_empty());
        assert!(form.card_cvv.is_empty());
        assert_eq!(form.installments, 1);
    }

    #[test]
    fn test_lookup_keeps_number_and_complement() {
        let mut form = CheckoutForm::new();
        form.apply(FormPatch {
            number: Some("1578".to_string()),
            complement: Some("Apto 12".to_string()),
            street: Some("Rua antiga".to_string()),
            ..FormPatch::default()
        });
        form.apply_lookup(&ResolvedAddress {
            street: "Avenida Paulista".to_string(),
            neighborhood: "Bela Vista".to_string(),
            city: "São Paulo".to_string(),
            region: "SP".to_string(),
        });
        assert_eq!(form.street, "Avenida Paulista");
        assert_eq!(form.city, "São Paulo");
        assert_eq!(form.region, "SP");
        assert_eq!(form.number, "1578");
        assert_eq!(form.complement, "Apto 12");
    }

    #[test]
    fn test_lookup_with_empty_street_keeps_typed_street() {
        let mut form = CheckoutForm::new();
        form.street = "Rua das Flores".to_string();
        form.apply_lookup(&ResolvedAddress {
            city: "Sabará".to_string(),
            region: "MG".to_string(),
            ..ResolvedAddress::default()
        });
        assert_eq!(form.street, "Rua das Flores");
        assert_eq!(form.city, "Sabará");
    }

    #[test]
    fn test_empty_form_reports_every_required_field() {
        let errors = CheckoutForm::new().validate().unwrap_err();
        for field in ["postalCode", "street", "number", "neighborhood", "city", "region"] {
            assert!(errors.contains_key(field), "missing error for {field}");
        }
        assert!(!errors.contains_key("complement"));
    }

    #[test]
    fn test_valid_pix_form() {
        let validated = filled_form().validate().unwrap();
        assert_eq!(validated.payment_method, PaymentMethod::Pix);
        assert_eq!(validated.address.postal_code.digits(), "01310930");
        assert_eq!(validated.address.region.as_str(), "SP");
        assert!(validated.address.complement.is_none());
        assert!(validated.card.is_none());
    }

    #[test]
    fn test_card_requires_all_four_fields() {
        for missing in ["number", "expiry", "cvv", "holder"] {
            let mut patch = card_patch();
            match missing {
                "number" => patch.card_number = None,
                "expiry" => patch.card_expiry = None,
                "cvv" => patch.card_cvv = None,
                _ => patch.card_holder_name = None,
            }
            let mut form = filled_form();
            form.apply(patch);
            let errors = form.validate().unwrap_err();
            assert_eq!(errors.len(), 1, "only {missing} should fail: {errors:?}");
        }
    }

    #[test]
    fn test_valid_card_form() {
        let mut form = filled_form();
        form.apply(card_patch());
        let card = form.validate().unwrap().card.unwrap();
        assert_eq!(card.number, "4111111111111111");
        assert_eq!(card.expiry, "12/25");
        assert_eq!(card.installments, 3);
    }

    #[test]
    fn test_expiry_format() {
        assert!(is_valid_expiry("12/25"));
        assert!(is_valid_expiry("01/30"));
        assert!(!is_valid_expiry("13/25"));
        assert!(!is_valid_expiry("00/25"));
        assert!(!is_valid_expiry("12/2"));
        assert!(!is_valid_expiry("1225"));
    }
}
