//! Pix payment status command.

use danithur_storefront::backend::{BackendClient, DealershipApi};
use danithur_storefront::config::BackendApiConfig;
use tracing::info;

/// Query the backend once for `transaction_id` and print `paid` or `pending`.
///
/// # Errors
///
/// Returns an error if `DANITHUR_API_URL` is missing or the request fails.
#[allow(clippy::print_stdout)]
pub async fn status(transaction_id: &str) -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let config = BackendApiConfig::from_env()?;
    info!(transaction_id, api = %config.base_url, "Checking Pix payment");

    let client = BackendClient::new(&config)?;
    let status = client.pix_payment_status(transaction_id).await?;

    println!("{}", if status.paid { "paid" } else { "pending" });
    Ok(())
}
