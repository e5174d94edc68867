//! In-memory checkout sessions keyed by visitor.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::debug;
use uuid::Uuid;

use super::session::CheckoutSession;

/// A session shared between concurrent requests from the same visitor.
pub type SharedSession = Arc<Mutex<CheckoutSession>>;

const MAX_SESSIONS: u64 = 100_000;

/// Checkout sessions, evicted after `idle_timeout` without access.
///
/// Eviction drops the session, which stops any Pix monitor it owns. The
/// cache only evicts while doing housekeeping, so the server runs
/// [`CheckoutRegistry::spawn_sweeper`] to keep idle monitors from polling.
#[derive(Clone)]
pub struct CheckoutRegistry {
    sessions: Cache<Uuid, SharedSession>,
}

impl CheckoutRegistry {
    #[must_use]
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            sessions: Cache::builder()
                .max_capacity(MAX_SESSIONS)
                .time_to_idle(idle_timeout)
                .build(),
        }
    }

    pub async fn get(&self, visitor: Uuid) -> Option<SharedSession> {
        self.sessions.get(&visitor).await
    }

    /// Store a new session, replacing (and dropping) any previous one.
    pub async fn insert(&self, visitor: Uuid, session: CheckoutSession) -> SharedSession {
        let shared = Arc::new(Mutex::new(session));
        self.sessions.insert(visitor, Arc::clone(&shared)).await;
        shared
    }

    /// Discard the visitor's session. Returns whether one existed.
    pub async fn remove(&self, visitor: Uuid) -> bool {
        self.sessions.remove(&visitor).await.is_some()
    }

    /// Drop every session idle past the timeout now.
    pub async fn sweep(&self) {
        self.sessions.run_pending_tasks().await;
    }

    /// Sweep idle sessions every `every` for the life of the process.
    #[must_use = "dropping the handle detaches the sweeper"]
    pub fn spawn_sweeper(&self, every: Duration) -> JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut interval = time::interval(every);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                registry.sweep().await;
                debug!(sessions = registry.sessions.entry_count(), "Checkout sessions swept");
            }
        })
    }
}
