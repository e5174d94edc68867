//! Postal code lookup command.

use danithur_core::PostalCode;
use danithur_storefront::config::PostalLookupConfig;
use danithur_storefront::postal::{PostalCodeLookup, ViaCepClient};
use tracing::info;

/// Resolve `code` and print the address as JSON.
///
/// # Errors
///
/// Returns an error if the code does not have 8 digits, the configuration is
/// invalid, or the lookup fails (including "not found").
#[allow(clippy::print_stdout)]
pub async fn lookup(code: &str) -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let code = PostalCode::parse(code)?;
    let config = PostalLookupConfig::from_env()?;
    info!(%code, service = %config.base_url, "Looking up postal code");

    let client = ViaCepClient::new(&config)?;
    let address = client.lookup(&code).await?;

    println!("{}", serde_json::to_string_pretty(&address)?);
    Ok(())
}
