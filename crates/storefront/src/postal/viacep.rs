//! ViaCEP client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use danithur_core::PostalCode;
use moka::future::Cache;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::{PostalCodeLookup, PostalLookupError, ResolvedAddress};
use crate::config::PostalLookupConfig;

/// Client for `https://viacep.com.br/ws/{cep}/json/`.
#[derive(Clone)]
pub struct ViaCepClient {
    inner: Arc<ViaCepClientInner>,
}

struct ViaCepClientInner {
    client: reqwest::Client,
    base_url: String,
    cache: Cache<String, ResolvedAddress>,
}

/// Raw ViaCEP payload.
///
/// Unknown codes come back as `{"erro": true}` (older deployments send the
/// string `"true"`).
#[derive(Debug, Deserialize)]
struct ViaCepResponse {
    #[serde(default)]
    logradouro: String,
    #[serde(default)]
    bairro: String,
    #[serde(default)]
    localidade: String,
    #[serde(default)]
    uf: String,
    #[serde(default)]
    erro: Option<serde_json::Value>,
}

impl ViaCepResponse {
    fn is_not_found(&self) -> bool {
        match &self.erro {
            Some(serde_json::Value::Bool(flag)) => *flag,
            Some(serde_json::Value::String(s)) => s.eq_ignore_ascii_case("true"),
            _ => false,
        }
    }
}

impl From<ViaCepResponse> for ResolvedAddress {
    fn from(response: ViaCepResponse) -> Self {
        Self {
            street: response.logradouro,
            neighborhood: response.bairro,
            city: response.localidade,
            region: response.uf,
        }
    }
}

impl ViaCepClient {
    /// Create a new ViaCEP client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &PostalLookupConfig) -> Result<Self, PostalLookupError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;

        let cache = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(Duration::from_secs(24 * 60 * 60))
            .build();

        Ok(Self {
            inner: Arc::new(ViaCepClientInner {
                client,
                base_url: config.base_url.clone(),
                cache,
            }),
        })
    }
}

#[async_trait]
impl PostalCodeLookup for ViaCepClient {
    #[instrument(skip(self), fields(cep = %code))]
    async fn lookup(&self, code: &PostalCode) -> Result<ResolvedAddress, PostalLookupError> {
        if let Some(address) = self.inner.cache.get(code.digits()).await {
            debug!("Cache hit for postal code");
            return Ok(address);
        }

        let url = format!("{}/{}/json/", self.inner.base_url, code.digits());
        let response = self.inner.client.get(&url).send().await?;
        let status = response.status();

        // ViaCEP answers 400 for malformed codes
        if status == reqwest::StatusCode::BAD_REQUEST || status == reqwest::StatusCode::NOT_FOUND
        {
            return Err(PostalLookupError::NotFound(code.digits().to_string()));
        }
        if !status.is_success() {
            return Err(PostalLookupError::Service(format!("HTTP {status}")));
        }

        let payload: ViaCepResponse = response
            .json()
            .await
            .map_err(|e| PostalLookupError::Service(e.to_string()))?;

        if payload.is_not_found() {
            return Err(PostalLookupError::NotFound(code.digits().to_string()));
        }

        let address = ResolvedAddress::from(payload);
        self.inner
            .cache
            .insert(code.digits().to_string(), address.clone())
            .await;
        Ok(address)
    }
}
