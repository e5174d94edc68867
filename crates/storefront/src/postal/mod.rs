//! Postal code (CEP) resolution.
//!
//! Lookups go to ViaCEP by default and are cached in memory via `moka`
//! (24-hour TTL); street names for a CEP do not change within a session.

mod viacep;

pub use viacep::ViaCepClient;

use async_trait::async_trait;
use danithur_core::PostalCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when resolving a postal code.
#[derive(Debug, Error)]
pub enum PostalLookupError {
    /// The service does not know this postal code.
    #[error("Postal code not found: {0}")]
    NotFound(String),

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with something unexpected.
    #[error("Lookup service error: {0}")]
    Service(String),
}

/// Address fields a postal code resolves to.
///
/// Any field may be empty: some CEPs cover a whole city and carry no street.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedAddress {
    pub street: String,
    pub neighborhood: String,
    pub city: String,
    pub region: String,
}

/// Resolves a postal code to street, neighborhood, city and region.
#[async_trait]
pub trait PostalCodeLookup: Send + Sync {
    async fn lookup(&self, code: &PostalCode) -> Result<ResolvedAddress, PostalLookupError>;
}
