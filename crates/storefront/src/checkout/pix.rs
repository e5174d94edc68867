//! Pix payment monitor.
//!
//! A single task owns the 1-second countdown and the status poll, and
//! serves manual "I already paid" checks through a command channel. Every
//! status transition happens inside that task, so `paid` and `expired` are
//! each published at most once and nothing fires after the task ends.

use std::sync::Arc;
use std::time::Duration;

use danithur_core::PaymentStatus;
use futures::future::BoxFuture;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{info, warn};

use super::CheckoutError;
use crate::backend::DealershipApi;
use crate::config::CheckoutConfig;

/// Snapshot published by the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PixState {
    pub status: PaymentStatus,
    pub seconds_left: u64,
}

/// Result of a status check that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PixCheck {
    Paid,
    NotYetConfirmed,
}

enum Command {
    CheckNow(oneshot::Sender<Result<PixCheck, CheckoutError>>),
}

/// Handle to a running Pix monitor. Dropping it stops the task.
#[derive(Debug)]
pub struct PixMonitor {
    state: watch::Receiver<PixState>,
    commands: mpsc::Sender<Command>,
    task: JoinHandle<()>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CheckNow")
    }
}

impl PixMonitor {
    /// Start watching a charge that expires in `expires_in_seconds`.
    ///
    /// A charge that is already at zero starts (and stays) expired.
    #[must_use]
    pub fn spawn(
        api: Arc<dyn DealershipApi>,
        transaction_id: String,
        expires_in_seconds: u64,
        config: &CheckoutConfig,
    ) -> Self {
        let status = if expires_in_seconds == 0 {
            PaymentStatus::Expired
        } else {
            PaymentStatus::AwaitingPayment
        };
        let (state_tx, state_rx) = watch::channel(PixState {
            status,
            seconds_left: expires_in_seconds,
        });
        let (command_tx, command_rx) = mpsc::channel(4);

        let worker = Worker {
            api,
            transaction_id,
            state: state_tx,
            commands: command_rx,
            tick: config.countdown_tick,
            poll_every: config.pix_poll_interval,
        };

        Self {
            state: state_rx,
            commands: command_tx,
            task: tokio::spawn(worker.run()),
        }
    }

    /// Latest published state.
    #[must_use]
    pub fn state(&self) -> PixState {
        *self.state.borrow()
    }

    /// Receiver that wakes on every countdown tick and status change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<PixState> {
        self.state.clone()
    }

    /// Whether the monitor task has stopped.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Check the payment status right away.
    ///
    /// Once the charge is settled this answers from the final state without
    /// contacting the backend.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::PaymentExpired`] for an expired charge, or the
    /// backend failure when the check could not be made.
    pub async fn check_now(&self) -> Result<PixCheck, CheckoutError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.commands.send(Command::CheckNow(reply_tx)).await.is_err() {
            return self.settled_outcome();
        }
        // The task drops pending requests when it stops
        reply_rx.await.unwrap_or_else(|_| self.settled_outcome())
    }

    fn settled_outcome(&self) -> Result<PixCheck, CheckoutError> {
        match self.state().status {
            PaymentStatus::Paid => Ok(PixCheck::Paid),
            PaymentStatus::Expired => Err(CheckoutError::PaymentExpired),
            PaymentStatus::Pending | PaymentStatus::AwaitingPayment => {
                Ok(PixCheck::NotYetConfirmed)
            }
        }
    }
}

impl Drop for PixMonitor {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Status request running alongside the countdown.
type StatusQuery = BoxFuture<'static, Result<PixCheck, CheckoutError>>;

type Reply = oneshot::Sender<Result<PixCheck, CheckoutError>>;

struct Worker {
    api: Arc<dyn DealershipApi>,
    transaction_id: String,
    state: watch::Sender<PixState>,
    commands: mpsc::Receiver<Command>,
    tick: Duration,
    poll_every: Duration,
}

impl Worker {
    async fn run(mut self) {
        let mut seconds_left = {
            let initial = self.state.borrow();
            if initial.status.is_terminal() {
                return;
            }
            initial.seconds_left
        };

        let start = Instant::now();
        let mut countdown = time::interval_at(start + self.tick, self.tick);
        let mut poll = time::interval_at(start + self.poll_every, self.poll_every);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // At most one status request at a time; manual checks join it
        let mut in_flight: Option<StatusQuery> = None;
        let mut waiting: Vec<Reply> = Vec::new();

        loop {
            tokio::select! {
                biased;

                _ = countdown.tick() => {
                    seconds_left = seconds_left.saturating_sub(1);
                    if seconds_left == 0 {
                        info!(transaction_id = %self.transaction_id, "Pix charge expired");
                        self.settle(PaymentStatus::Expired, 0);
                        answer(waiting, &Err(CheckoutError::PaymentExpired));
                        break;
                    }
                    self.state.send_modify(|s| s.seconds_left = seconds_left);
                }

                command = self.commands.recv() => {
                    let Some(Command::CheckNow(reply)) = command else {
                        break;
                    };
                    waiting.push(reply);
                    if in_flight.is_none() {
                        in_flight = Some(self.query());
                    }
                    poll.reset();
                }

                result = finish(&mut in_flight) => {
                    in_flight = None;
                    poll.reset();
                    let paid = matches!(result, Ok(PixCheck::Paid));
                    if paid {
                        info!(transaction_id = %self.transaction_id, "Pix payment confirmed");
                        self.settle(PaymentStatus::Paid, seconds_left);
                    }
                    // Callers may have given up waiting
                    answer(std::mem::take(&mut waiting), &result);
                    if paid {
                        break;
                    }
                }

                _ = poll.tick(), if in_flight.is_none() => {
                    in_flight = Some(self.query());
                }
            }
        }
    }

    fn query(&self) -> StatusQuery {
        let api = Arc::clone(&self.api);
        let transaction_id = self.transaction_id.clone();
        Box::pin(async move {
            match api.pix_payment_status(&transaction_id).await {
                Ok(status) if status.paid => Ok(PixCheck::Paid),
                Ok(_) => Ok(PixCheck::NotYetConfirmed),
                Err(e) => {
                    warn!(%transaction_id, error = %e, "Pix status check failed");
                    Err(e.into())
                }
            }
        })
    }

    fn settle(&self, status: PaymentStatus, seconds_left: u64) {
        self.state.send_if_modified(|s| {
            if !s.status.can_transition_to(status) {
                return false;
            }
            s.status = status;
            s.seconds_left = seconds_left;
            true
        });
    }
}

/// Completes with the in-flight request, or never when there is none.
async fn finish(query: &mut Option<StatusQuery>) -> Result<PixCheck, CheckoutError> {
    match query {
        Some(query) => query.await,
        None => std::future::pending().await,
    }
}

fn answer(waiting: Vec<Reply>, result: &Result<PixCheck, CheckoutError>) {
    for reply in waiting {
        let _ = reply.send(result.clone());
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::backend::{BackendError, CreateOrderRequest, CreateOrderResponse, PixPaymentStatus};

    #[derive(Default)]
    struct FakeApi {
        checks: AtomicU32,
        paid: AtomicBool,
        /// How long each status request takes to answer.
        latency: Duration,
    }

    impl FakeApi {
        fn checks(&self) -> u32 {
            self.checks.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DealershipApi for FakeApi {
        async fn create_order(
            &self,
            _request: &CreateOrderRequest,
        ) -> Result<CreateOrderResponse, BackendError> {
            Err(BackendError::Parse("not used".to_string()))
        }

        async fn pix_payment_status(
            &self,
            _transaction_id: &str,
        ) -> Result<PixPaymentStatus, BackendError> {
            self.checks.fetch_add(1, Ordering::SeqCst);
            time::sleep(self.latency).await;
            Ok(PixPaymentStatus {
                paid: self.paid.load(Ordering::SeqCst),
            })
        }
    }

    fn start(api: &Arc<FakeApi>, expires_in: u64) -> PixMonitor {
        let api: Arc<dyn DealershipApi> = api.clone();
        PixMonitor::spawn(api, "tx-1".to_string(), expires_in, &CheckoutConfig::default())
    }

    async fn sleep_secs(secs: f64) {
        time::sleep(Duration::from_secs_f64(secs)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_expires_after_n_ticks() {
        let api = Arc::new(FakeApi::default());
        let monitor = start(&api, 3);

        sleep_secs(2.5).await;
        let state = monitor.state();
        assert_eq!(state.status, PaymentStatus::AwaitingPayment);
        assert_eq!(state.seconds_left, 1);

        sleep_secs(1.0).await;
        let state = monitor.state();
        assert_eq!(state.status, PaymentStatus::Expired);
        assert_eq!(state.seconds_left, 0);
        assert!(monitor.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_published_once_and_polling_stops() {
        let api = Arc::new(FakeApi::default());
        let monitor = start(&api, 20);
        let mut rx = monitor.subscribe();

        let watcher = tokio::spawn(async move {
            let mut expired_seen = 0;
            while rx.changed().await.is_ok() {
                if rx.borrow_and_update().status == PaymentStatus::Expired {
                    expired_seen += 1;
                }
            }
            expired_seen
        });

        sleep_secs(120.0).await;
        assert_eq!(watcher.await.unwrap(), 1);
        // Polls at 15s only; nothing after expiry at 20s
        assert_eq!(api.checks(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_at_most_one_poll_per_interval() {
        let api = Arc::new(FakeApi::default());
        let monitor = start(&api, 40);

        sleep_secs(14.5).await;
        assert_eq!(api.checks(), 0);
        sleep_secs(1.0).await;
        assert_eq!(api.checks(), 1);

        sleep_secs(60.0).await;
        assert_eq!(api.checks(), 2);
        assert_eq!(monitor.state().status, PaymentStatus::Expired);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_detects_payment() {
        let api = Arc::new(FakeApi::default());
        api.paid.store(true, Ordering::SeqCst);
        let monitor = start(&api, 1800);

        sleep_secs(16.0).await;
        let state = monitor.state();
        assert_eq!(state.status, PaymentStatus::Paid);
        assert_eq!(state.seconds_left, 1785);
        assert!(monitor.is_finished());

        sleep_secs(60.0).await;
        assert_eq!(api.checks(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_check_not_yet_confirmed_keeps_state() {
        let api = Arc::new(FakeApi::default());
        let monitor = start(&api, 1800);

        sleep_secs(5.0).await;
        let result = monitor.check_now().await.unwrap();
        assert_eq!(result, PixCheck::NotYetConfirmed);
        assert_eq!(monitor.state().status, PaymentStatus::AwaitingPayment);
        assert_eq!(api.checks(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_check_resets_poll_timer() {
        let api = Arc::new(FakeApi::default());
        let monitor = start(&api, 1800);

        sleep_secs(10.0).await;
        monitor.check_now().await.unwrap();
        assert_eq!(api.checks(), 1);

        // Next automatic poll is a full interval after the manual check
        sleep_secs(14.0).await;
        assert_eq!(api.checks(), 1);
        sleep_secs(2.0).await;
        assert_eq!(api.checks(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_check_paid_settles_once() {
        let api = Arc::new(FakeApi::default());
        let monitor = start(&api, 1800);

        api.paid.store(true, Ordering::SeqCst);
        assert_eq!(monitor.check_now().await.unwrap(), PixCheck::Paid);
        assert_eq!(monitor.state().status, PaymentStatus::Paid);

        sleep_secs(60.0).await;
        assert!(monitor.is_finished());
        assert_eq!(api.checks(), 1);

        // Settled: answered locally
        assert_eq!(monitor.check_now().await.unwrap(), PixCheck::Paid);
        assert_eq!(api.checks(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_expiry_is_expired_immediately() {
        let api = Arc::new(FakeApi::default());
        let monitor = start(&api, 0);

        assert_eq!(monitor.state().status, PaymentStatus::Expired);
        assert!(matches!(
            monitor.check_now().await,
            Err(CheckoutError::PaymentExpired)
        ));
        sleep_secs(30.0).await;
        assert_eq!(api.checks(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_polling() {
        let api = Arc::new(FakeApi::default());
        let monitor = start(&api, 1800);
        drop(monitor);

        sleep_secs(60.0).await;
        assert_eq!(api.checks(), 0);
    }

    fn slow_api(latency_secs: u64) -> Arc<FakeApi> {
        Arc::new(FakeApi {
            latency: Duration::from_secs(latency_secs),
            ..FakeApi::default()
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_keeps_running_during_slow_poll() {
        let api = slow_api(8);
        api.paid.store(true, Ordering::SeqCst);
        let monitor = start(&api, 20);

        // Poll started at 15s and is still waiting on the backend
        sleep_secs(18.5).await;
        assert_eq!(api.checks(), 1);
        assert_eq!(
            monitor.state(),
            PixState {
                status: PaymentStatus::AwaitingPayment,
                seconds_left: 2,
            }
        );

        // The answer would land at 23s, after expiry at 20s
        sleep_secs(5.0).await;
        assert_eq!(
            monitor.state(),
            PixState {
                status: PaymentStatus::Expired,
                seconds_left: 0,
            }
        );
        assert!(monitor.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_poll_paid_before_expiry_settles() {
        let api = slow_api(8);
        api.paid.store(true, Ordering::SeqCst);
        let monitor = start(&api, 60);

        sleep_secs(23.5).await;
        let state = monitor.state();
        assert_eq!(state.status, PaymentStatus::Paid);
        assert_eq!(state.seconds_left, 37);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_manual_check_reports_expiry() {
        let api = slow_api(8);
        api.paid.store(true, Ordering::SeqCst);
        let monitor = start(&api, 5);

        let started = Instant::now();
        assert!(matches!(
            monitor.check_now().await,
            Err(CheckoutError::PaymentExpired)
        ));
        assert_eq!(started.elapsed(), Duration::from_secs(5));
        assert_eq!(monitor.state().status, PaymentStatus::Expired);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_check_joins_poll_in_flight() {
        let api = slow_api(4);
        let monitor = start(&api, 1800);

        // Poll in flight from 15s to 19s
        sleep_secs(16.0).await;
        assert_eq!(monitor.check_now().await.unwrap(), PixCheck::NotYetConfirmed);
        assert_eq!(api.checks(), 1);
    }
}
