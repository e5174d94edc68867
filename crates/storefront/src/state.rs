//! Application state shared across handlers.

use std::sync::Arc;

use crate::backend::{BackendClient, BackendError, DealershipApi};
use crate::checkout::CheckoutRegistry;
use crate::config::StorefrontConfig;
use crate::postal::{PostalCodeLookup, PostalLookupError, ViaCepClient};
use crate::store::AppStore;

/// Error building the production collaborators.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("backend client: {0}")]
    Backend(#[from] BackendError),
    #[error("postal lookup client: {0}")]
    PostalLookup(#[from] PostalLookupError),
}

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    api: Arc<dyn DealershipApi>,
    postal: Arc<dyn PostalCodeLookup>,
    store: AppStore,
    checkouts: CheckoutRegistry,
}

impl AppState {
    /// Create the state with the HTTP clients built from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if either HTTP client fails to build.
    pub fn new(config: StorefrontConfig) -> Result<Self, StateError> {
        let api = Arc::new(BackendClient::new(&config.api)?);
        let postal = Arc::new(ViaCepClient::new(&config.postal)?);
        Ok(Self::with_services(config, api, postal))
    }

    /// Create the state around the given collaborators.
    #[must_use]
    pub fn with_services(
        config: StorefrontConfig,
        api: Arc<dyn DealershipApi>,
        postal: Arc<dyn PostalCodeLookup>,
    ) -> Self {
        let idle = config.checkout.idle_timeout;
        Self {
            inner: Arc::new(AppStateInner {
                config,
                api,
                postal,
                store: AppStore::new(idle),
                checkouts: CheckoutRegistry::new(idle),
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Dealership backend API.
    #[must_use]
    pub fn api(&self) -> &Arc<dyn DealershipApi> {
        &self.inner.api
    }

    /// Postal code lookup service.
    #[must_use]
    pub fn postal(&self) -> &dyn PostalCodeLookup {
        self.inner.postal.as_ref()
    }

    #[must_use]
    pub fn store(&self) -> &AppStore {
        &self.inner.store
    }

    #[must_use]
    pub fn checkouts(&self) -> &CheckoutRegistry {
        &self.inner.checkouts
    }
}
