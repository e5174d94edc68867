//! Delivery address types.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing address components.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// The postal code does not contain exactly 8 digits.
    #[error("postal code must have 8 digits (got {0})")]
    PostalCodeLength(usize),
    /// The region is not a two-letter state abbreviation.
    #[error("region must be a two-letter state abbreviation")]
    InvalidRegion,
}

/// A Brazilian postal code (CEP).
///
/// Stored as 8 bare digits; [`fmt::Display`] renders the `00000-000` mask.
///
/// ```
/// use danithur_core::PostalCode;
///
/// let cep = PostalCode::parse("01310-930").unwrap();
/// assert_eq!(cep.digits(), "01310930");
/// assert_eq!(cep.to_string(), "01310-930");
///
/// assert!(PostalCode::parse("0131").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct PostalCode(String);

impl PostalCode {
    /// Number of digits in a CEP.
    pub const LENGTH: usize = 8;

    /// Parse a postal code, ignoring any non-digit characters.
    ///
    /// # Errors
    ///
    /// Returns [`AddressError::PostalCodeLength`] unless exactly 8 digits remain.
    pub fn parse(s: &str) -> Result<Self, AddressError> {
        let digits: String = s.chars().filter(char::is_ascii_digit).collect();
        if digits.len() != Self::LENGTH {
            return Err(AddressError::PostalCodeLength(digits.len()));
        }
        Ok(Self(digits))
    }

    /// The 8 bare digits.
    #[must_use]
    pub fn digits(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PostalCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (head, tail) = self.0.split_at(5);
        write!(f, "{head}-{tail}")
    }
}

impl TryFrom<String> for PostalCode {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PostalCode> for String {
    fn from(code: PostalCode) -> Self {
        code.0
    }
}

/// A Brazilian state abbreviation (UF), e.g. `SP`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Region(String);

impl Region {
    /// Parse a region, trimming whitespace and upper-casing.
    ///
    /// # Errors
    ///
    /// Returns [`AddressError::InvalidRegion`] unless the input is two ASCII letters.
    pub fn parse(s: &str) -> Result<Self, AddressError> {
        let trimmed = s.trim();
        if trimmed.len() != 2 || !trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(AddressError::InvalidRegion);
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    /// The two-letter code.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Region {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Region> for String {
    fn from(region: Region) -> Self {
        region.0
    }
}

/// A validated delivery address.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeliveryAddress {
    pub postal_code: PostalCode,
    pub street: String,
    pub number: String,
    pub complement: Option<String>,
    pub neighborhood: String,
    pub city: String,
    pub region: Region,
}

impl DeliveryAddress {
    /// Single-line rendering used on the confirmation screen.
    ///
    /// `Av. Paulista, 1578 - Apto 12 - Bela Vista, São Paulo/SP`
    #[must_use]
    pub fn one_line(&self) -> String {
        let complement = self
            .complement
            .as_deref()
            .map(|c| format!(" - {c}"))
            .unwrap_or_default();
        format!(
            "{}, {}{} - {}, {}/{}",
            self.street, self.number, complement, self.neighborhood, self.city, self.region
        )
    }
}
