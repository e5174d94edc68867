//! Per-visitor application store.
//!
//! Holds the signed-in buyer and the cart snapshot the SPA hands over before
//! checkout. Every change is published on a `watch` channel so other tabs of
//! the same visitor can follow along (see `GET /session/events`).

use std::sync::Arc;
use std::time::Duration;

use danithur_core::{CartSnapshot, UserId};
use moka::future::Cache;
use serde::Serialize;
use tokio::sync::watch;
use uuid::Uuid;

use crate::checkout::{CartTotals, CheckoutError};

/// Everything the store knows about one visitor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    pub buyer_id: Option<UserId>,
    pub cart: Option<CartSnapshot>,
    /// Navbar badge count.
    pub cart_count: u32,
}

/// Typed store keyed by visitor id.
#[derive(Clone)]
pub struct AppStore {
    visitors: Cache<Uuid, Arc<watch::Sender<StoreSnapshot>>>,
}

impl AppStore {
    #[must_use]
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            visitors: Cache::builder()
                .max_capacity(100_000)
                .time_to_idle(idle_timeout)
                .build(),
        }
    }

    async fn channel(&self, visitor: Uuid) -> Arc<watch::Sender<StoreSnapshot>> {
        self.visitors
            .get_with(visitor, async {
                Arc::new(watch::channel(StoreSnapshot::default()).0)
            })
            .await
    }

    /// Apply `change` and notify subscribers only if something changed.
    async fn update(&self, visitor: Uuid, change: impl FnOnce(&mut StoreSnapshot)) {
        self.channel(visitor).await.send_if_modified(|snapshot| {
            let before = snapshot.clone();
            change(snapshot);
            snapshot.cart_count = snapshot
                .cart
                .as_ref()
                .and_then(CartSnapshot::item_count)
                .unwrap_or(0);
            *snapshot != before
        });
    }

    pub async fn snapshot(&self, visitor: Uuid) -> StoreSnapshot {
        self.channel(visitor).await.borrow().clone()
    }

    pub async fn buyer_id(&self, visitor: Uuid) -> Option<UserId> {
        self.channel(visitor).await.borrow().buyer_id
    }

    /// Set or clear (on logout) the signed-in buyer.
    pub async fn set_buyer_id(&self, visitor: Uuid, buyer_id: Option<UserId>) {
        self.update(visitor, |s| s.buyer_id = buyer_id).await;
    }

    pub async fn cart(&self, visitor: Uuid) -> Option<CartSnapshot> {
        self.channel(visitor).await.borrow().cart.clone()
    }

    /// Replace the cart snapshot; the badge count follows.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::Validation`] for a cart whose count or total
    /// is out of range. The stored cart is left untouched.
    pub async fn set_cart(
        &self,
        visitor: Uuid,
        cart: Option<CartSnapshot>,
    ) -> Result<(), CheckoutError> {
        if let Some(cart) = &cart {
            CartTotals::of(cart)?;
        }
        self.update(visitor, |s| s.cart = cart).await;
        Ok(())
    }

    pub async fn cart_count(&self, visitor: Uuid) -> u32 {
        self.channel(visitor).await.borrow().cart_count
    }

    /// Receiver notified on every change for this visitor.
    pub async fn subscribe(&self, visitor: Uuid) -> watch::Receiver<StoreSnapshot> {
        self.channel(visitor).await.subscribe()
    }
}
