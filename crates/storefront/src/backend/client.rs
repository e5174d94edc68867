//! `reqwest` implementation of [`DealershipApi`].

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use super::{
    BackendError, CreateOrderRequest, CreateOrderResponse, DealershipApi, PixPaymentStatus,
    api_error,
};
use crate::config::BackendApiConfig;

/// Client for the dealership backend REST API.
#[derive(Clone)]
pub struct BackendClient {
    inner: Arc<BackendClientInner>,
}

struct BackendClientInner {
    client: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    /// Create a new backend API client.
    ///
    /// # Errors
    ///
    /// Returns error if the token is not a valid header value or the HTTP
    /// client fails to build.
    pub fn new(config: &BackendApiConfig) -> Result<Self, BackendError> {
        let mut headers = HeaderMap::new();
        headers.insert("Accept", HeaderValue::from_static("application/json"));

        if let Some(token) = &config.api_token {
            let auth_value = format!("Bearer {}", token.expose_secret());
            let mut value = HeaderValue::from_str(&auth_value)
                .map_err(|e| BackendError::Parse(format!("Invalid API token format: {e}")))?;
            value.set_sensitive(true);
            headers.insert("Authorization", value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(BackendClientInner {
                client,
                base_url: config.base_url.clone(),
            }),
        })
    }

    /// Turn a response into `T`, or into [`BackendError::Api`] on failure.
    async fn read_json<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, BackendError> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::warn!(
                status = %status,
                body = %body.chars().take(500).collect::<String>(),
                "Backend returned non-success status"
            );
            return Err(api_error(status.as_u16(), &body));
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %body.chars().take(500).collect::<String>(),
                "Failed to parse backend response"
            );
            BackendError::Parse(e.to_string())
        })
    }
}

#[async_trait]
impl DealershipApi for BackendClient {
    #[instrument(skip(self, request), fields(
        vehicle_id = %request.vehicle_id,
        payment_method = request.payment_method,
    ))]
    async fn create_order(
        &self,
        request: &CreateOrderRequest,
    ) -> Result<CreateOrderResponse, BackendError> {
        let url = format!("{}/orders", self.inner.base_url);
        let response = self.inner.client.post(&url).json(request).send().await?;
        let order: CreateOrderResponse = Self::read_json(response).await?;
        debug!(order_id = %order.order_id, "Order created");
        Ok(order)
    }

    #[instrument(skip(self))]
    async fn pix_payment_status(
        &self,
        transaction_id: &str,
    ) -> Result<PixPaymentStatus, BackendError> {
        let url = format!(
            "{}/payments/pix/{}/status",
            self.inner.base_url,
            urlencoding::encode(transaction_id)
        );
        let response = self.inner.client.get(&url).send().await?;
        Self::read_json(response).await
    }
}
