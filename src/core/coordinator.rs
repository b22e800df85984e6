//! Shared quote poller.
//!
//! One [`QuoteCoordinator`] owns the scan interval and the latest [`QuoteSnapshot`]. Every
//! refresh is a single batched request for all tracked symbols; concurrent refresh requests
//! are coalesced into the one already in flight. After each completed attempt the registered
//! listeners are notified synchronously, in subscription order.

use crate::core::error::{CoordinatorError, RefreshFailure};
use crate::core::quote::{QuoteProvider, QuoteSnapshot};
use crate::core::symbols::TrackedSymbols;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

pub type ListenerId = u64;

pub type RefreshResult = Result<Arc<QuoteSnapshot>, RefreshFailure>;

type InFlight = Shared<BoxFuture<'static, RefreshResult>>;

/// Callback invoked after every completed refresh attempt, successful or not.
pub trait RefreshListener: Send + Sync {
    fn on_refresh(&self, coordinator: &QuoteCoordinator);
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct QuoteCoordinator {
    provider: Arc<dyn QuoteProvider>,
    symbols: TrackedSymbols,
    currency: String,
    interval: Duration,
    snapshot: RwLock<Option<Arc<QuoteSnapshot>>>,
    last_success: AtomicBool,
    last_error: Mutex<Option<RefreshFailure>>,
    in_flight: Mutex<Option<(u64, InFlight)>>,
    generation: AtomicU64,
    listeners: Mutex<Vec<(ListenerId, Weak<dyn RefreshListener>)>>,
    next_listener: AtomicU64,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl QuoteCoordinator {
    pub fn new(
        provider: Arc<dyn QuoteProvider>,
        symbols: TrackedSymbols,
        currency: &str,
        interval: Duration,
    ) -> Result<Arc<Self>, CoordinatorError> {
        if symbols.is_empty() {
            return Err(CoordinatorError::NoSymbols);
        }
        if interval.is_zero() {
            return Err(CoordinatorError::InvalidInterval);
        }

        Ok(Arc::new(Self {
            provider,
            symbols,
            currency: currency.trim().to_uppercase(),
            interval,
            snapshot: RwLock::new(None),
            last_success: AtomicBool::new(false),
            last_error: Mutex::new(None),
            in_flight: Mutex::new(None),
            generation: AtomicU64::new(0),
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(1),
            timer: Mutex::new(None),
        }))
    }

    pub fn symbols(&self) -> &TrackedSymbols {
        &self.symbols
    }

    pub fn display_currency(&self) -> &str {
        &self.currency
    }

    /// Latest successful snapshot. Survives failed refreshes.
    pub fn snapshot(&self) -> Option<Arc<QuoteSnapshot>> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn last_refresh_succeeded(&self) -> bool {
        self.last_success.load(Ordering::SeqCst)
    }

    pub fn last_error(&self) -> Option<RefreshFailure> {
        lock(&self.last_error).clone()
    }

    /// Performs the first refresh, waits for it to complete, then schedules the recurring one.
    pub async fn start(self: &Arc<Self>) -> RefreshResult {
        let first = self.refresh().await;

        let coordinator = Arc::downgrade(self);
        let interval = self.interval;
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(coordinator) = coordinator.upgrade() else {
                    break;
                };
                // Failures are already logged and reported to listeners.
                let _ = coordinator.refresh().await;
            }
        });

        if let Some(previous) = lock(&self.timer).replace(handle) {
            previous.abort();
        }
        info!(
            interval_secs = interval.as_secs(),
            symbols = %self.symbols,
            "Quote coordinator started"
        );
        first
    }

    /// Stops the timer and releases every listener and in-flight refresh.
    pub fn shutdown(&self) {
        if let Some(handle) = lock(&self.timer).take() {
            handle.abort();
        }
        lock(&self.in_flight).take();
        lock(&self.listeners).clear();
        debug!("Quote coordinator shut down");
    }

    /// Refreshes now, joining the refresh already in flight if there is one.
    pub async fn refresh(self: &Arc<Self>) -> RefreshResult {
        let pending = {
            let mut slot = lock(&self.in_flight);
            match slot.as_ref() {
                Some((_, pending)) => {
                    debug!("Refresh already in flight, joining it");
                    pending.clone()
                }
                None => {
                    let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
                    let this = Arc::clone(self);
                    let pending = async move { this.run_refresh(generation).await }
                        .boxed()
                        .shared();
                    *slot = Some((generation, pending.clone()));
                    pending
                }
            }
        };
        pending.await
    }

    /// Out-of-cycle refresh request. The outcome reaches readings through their listeners.
    pub async fn request_refresh(self: &Arc<Self>) {
        let _ = self.refresh().await;
    }

    #[instrument(name = "QuoteRefresh", skip(self), fields(currency = %self.currency))]
    async fn run_refresh(&self, generation: u64) -> RefreshResult {
        let symbols: Vec<String> = self.symbols.iter().map(str::to_string).collect();
        let result = self
            .provider
            .fetch_quotes(&symbols, &self.currency)
            .await
            .map(|prices| Arc::new(QuoteSnapshot::new(prices, &self.currency)));

        match &result {
            Ok(snapshot) => {
                debug!(count = snapshot.prices.len(), "Quotes refreshed");
                *self
                    .snapshot
                    .write()
                    .unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(snapshot));
                lock(&self.last_error).take();
                self.last_success.store(true, Ordering::SeqCst);
            }
            Err(e) => {
                warn!(error = %e, "Quote refresh failed");
                *lock(&self.last_error) = Some(e.clone());
                self.last_success.store(false, Ordering::SeqCst);
            }
        }

        {
            let mut slot = lock(&self.in_flight);
            if matches!(slot.as_ref(), Some((current, _)) if *current == generation) {
                slot.take();
            }
        }

        self.notify_listeners();
        result
    }

    pub fn subscribe(&self, listener: Weak<dyn RefreshListener>) -> ListenerId {
        let id = self.next_listener.fetch_add(1, Ordering::SeqCst);
        lock(&self.listeners).push((id, listener));
        id
    }

    pub fn unsubscribe(&self, id: ListenerId) {
        lock(&self.listeners).retain(|(listener_id, _)| *listener_id != id);
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.listeners)
            .iter()
            .filter(|(_, listener)| listener.strong_count() > 0)
            .count()
    }

    fn is_subscribed(&self, id: ListenerId) -> bool {
        lock(&self.listeners)
            .iter()
            .any(|(listener_id, _)| *listener_id == id)
    }

    fn notify_listeners(&self) {
        let listeners = {
            let mut guard = lock(&self.listeners);
            guard.retain(|(_, listener)| listener.strong_count() > 0);
            guard.clone()
        };

        for (id, listener) in listeners {
            // Skip listeners removed by an earlier callback in this round.
            if !self.is_subscribed(id) {
                continue;
            }
            if let Some(listener) = listener.upgrade() {
                listener.on_refresh(self);
            }
        }
    }
}

impl Drop for QuoteCoordinator {
    fn drop(&mut self) {
        if let Some(handle) = lock(&self.timer).take() {
            handle.abort();
        }
    }
}
