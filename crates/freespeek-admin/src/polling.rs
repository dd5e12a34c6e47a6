//! Polling Data Controller
//!
//! [`PollingResource`] is the fetch / poll / refresh state machine every
//! data page shares:
//!
//! - `start` fetches immediately, then on a fixed interval
//! - `refresh` asks for one extra fetch; while a fetch is in flight it joins
//!   that fetch instead of issuing another
//! - `supersede` always issues a new fetch (parameters changed) and the
//!   older in-flight result is thrown away when it lands
//! - `stop` cancels the timer and retires whatever is still in flight
//!
//! Every fetch carries a sequence number. Only the completion of the most
//! recently issued fetch may touch the state; anything else is discarded.
//! A failed fetch records an error and keeps the previous data.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::{self, BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};

/// Default upper bound for one fetch
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(15);

type Fetcher<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T>> + Send + Sync>;

/// Resolves once the fetch it stands for has settled. Cloneable; every
/// coalesced caller holds the same one.
pub type PendingFetch = Shared<BoxFuture<'static, FetchOutcome>>;

/// Why a fetch was issued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    Initial,
    Scheduled,
    Manual,
    Superseding,
}

/// How a fetch ended, from the controller's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Data replaced, error cleared
    Applied,
    /// Error recorded, previous data kept
    Failed,
    /// A newer fetch was issued (or the resource stopped) first
    Discarded,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceState<T> {
    pub data: Option<T>,
    /// A fetch is in flight
    pub is_loading: bool,
    /// The in-flight fetch was asked for by the user
    pub is_refreshing: bool,
    pub error: Option<String>,
    pub last_updated_at: Option<DateTime<Utc>>,
}

impl<T> Default for ResourceState<T> {
    fn default() -> Self {
        Self {
            data: None,
            is_loading: false,
            is_refreshing: false,
            error: None,
            last_updated_at: None,
        }
    }
}

impl<T> ResourceState<T> {
    /// First load still running: nothing to show yet
    pub fn is_initial_load(&self) -> bool {
        self.is_loading && self.data.is_none()
    }
}

/// One polled data source
pub struct PollingResource<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for PollingResource<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct Inner<T> {
    name: String,
    fetcher: Fetcher<T>,
    timeout: Duration,
    state: watch::Sender<ResourceState<T>>,
    /// Sequence number of the most recently issued fetch
    latest: AtomicU64,
    in_flight: Mutex<Option<(u64, PendingFetch)>>,
    timer: Mutex<Option<JoinHandle<()>>>,
    stopped: AtomicBool,
}

impl<T> PollingResource<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new<F, Fut>(name: impl Into<String>, fetcher: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        Self::with_timeout(name, DEFAULT_FETCH_TIMEOUT, fetcher)
    }

    pub fn with_timeout<F, Fut>(name: impl Into<String>, timeout: Duration, fetcher: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let (state, _) = watch::channel(ResourceState::default());
        let fetcher: Fetcher<T> = Arc::new(move || fetcher().boxed());
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                fetcher,
                timeout,
                state,
                latest: AtomicU64::new(0),
                in_flight: Mutex::new(None),
                timer: Mutex::new(None),
                stopped: AtomicBool::new(false),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Fetch now, then every `interval`. A zero interval fetches once and
    /// never schedules. Dropping the returned handle stops the resource.
    pub fn start(&self, interval: Duration) -> PollHandle {
        self.inner.stopped.store(false, Ordering::SeqCst);
        if let Some(previous) = self.inner.timer.lock().take() {
            previous.abort();
        }

        debug!(resource = %self.inner.name, interval_ms = interval.as_millis() as u64, "Polling started");
        drop(self.inner.trigger(FetchKind::Initial));

        if !interval.is_zero() {
            let weak = Arc::downgrade(&self.inner);
            let task = tokio::spawn(async move {
                let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    ticker.tick().await;
                    let Some(inner) = weak.upgrade() else { break };
                    if inner.stopped.load(Ordering::SeqCst) {
                        break;
                    }
                    drop(inner.trigger(FetchKind::Scheduled));
                }
            });
            *self.inner.timer.lock() = Some(task);
        }

        let target: Weak<dyn Stoppable> = Arc::downgrade(&self.inner) as Weak<dyn Stoppable>;
        PollHandle { target: Some(target) }
    }

    /// One extra fetch outside the timer cadence. Joins the in-flight
    /// fetch if there is one.
    pub fn refresh(&self) -> PendingFetch {
        self.inner.trigger(FetchKind::Manual)
    }

    /// Issue a new fetch even if one is in flight; the older one will be
    /// discarded. Use after changing what the fetcher asks for.
    pub fn supersede(&self) -> PendingFetch {
        self.inner.trigger(FetchKind::Superseding)
    }

    /// Cancel the timer and retire any in-flight fetch. Idempotent.
    pub fn stop(&self) {
        self.inner.stop();
    }

    /// A timer is scheduled and the resource has not been stopped
    pub fn is_running(&self) -> bool {
        !self.inner.stopped.load(Ordering::SeqCst) && self.inner.timer.lock().is_some()
    }

    /// Wait for the in-flight fetch, if any
    pub async fn settled(&self) -> Option<FetchOutcome> {
        let pending = self.inner.in_flight.lock().as_ref().map(|(_, p)| p.clone());
        match pending {
            Some(pending) => Some(pending.await),
            None => None,
        }
    }

    pub fn state(&self) -> ResourceState<T> {
        self.inner.state.borrow().clone()
    }

    pub fn data(&self) -> Option<T> {
        self.inner.state.borrow().data.clone()
    }

    pub fn error(&self) -> Option<String> {
        self.inner.state.borrow().error.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ResourceState<T>> {
        self.inner.state.subscribe()
    }
}

impl<T> Inner<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn trigger(self: &Arc<Self>, kind: FetchKind) -> PendingFetch {
        if self.stopped.load(Ordering::SeqCst) {
            trace!(resource = %self.name, ?kind, "Resource stopped, fetch ignored");
            return future::ready(FetchOutcome::Discarded).boxed().shared();
        }

        let mut slot = self.in_flight.lock();

        if kind != FetchKind::Superseding {
            if let Some((seq, pending)) = slot.as_ref() {
                trace!(resource = %self.name, ?kind, seq, "Fetch in flight, coalescing");
                if kind == FetchKind::Manual {
                    self.state.send_modify(|s| s.is_refreshing = true);
                }
                return pending.clone();
            }
        }

        let seq = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.send_modify(|s| {
            s.is_loading = true;
            if kind == FetchKind::Manual {
                s.is_refreshing = true;
            }
        });

        trace!(resource = %self.name, ?kind, seq, "Fetch issued");
        let fetch = (self.fetcher)();
        let handle = tokio::spawn(Inner::run(self.clone(), seq, fetch));
        let pending = async move { handle.await.unwrap_or(FetchOutcome::Discarded) }
            .boxed()
            .shared();
        *slot = Some((seq, pending.clone()));
        pending
    }

    async fn run(self: Arc<Self>, seq: u64, fetch: BoxFuture<'static, Result<T>>) -> FetchOutcome {
        let result = match tokio::time::timeout(self.timeout, fetch).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(self.timeout)),
        };
        self.settle(seq, result)
    }

    fn settle(&self, seq: u64, result: Result<T>) -> FetchOutcome {
        let mut slot = self.in_flight.lock();
        if slot.as_ref().map(|(s, _)| *s) == Some(seq) {
            *slot = None;
        }

        if self.latest.load(Ordering::SeqCst) != seq {
            debug!(resource = %self.name, seq, "Stale fetch result discarded");
            return FetchOutcome::Discarded;
        }

        match result {
            Ok(data) => {
                self.state.send_modify(|s| {
                    s.data = Some(data);
                    s.error = None;
                    s.last_updated_at = Some(Utc::now());
                    s.is_loading = false;
                    s.is_refreshing = false;
                });
                trace!(resource = %self.name, seq, "Fetch applied");
                FetchOutcome::Applied
            }
            Err(e) => {
                warn!(resource = %self.name, seq, error = %e, "Fetch failed, keeping last data");
                self.state.send_modify(|s| {
                    s.error = Some(e.to_string());
                    s.is_loading = false;
                    s.is_refreshing = false;
                });
                FetchOutcome::Failed
            }
        }
    }
}

impl<T> Drop for Inner<T> {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.get_mut().take() {
            timer.abort();
        }
    }
}

trait Stoppable: Send + Sync {
    fn stop(&self);
}

impl<T> Stoppable for Inner<T>
where
    T: Send + Sync,
{
    fn stop(&self) {
        let was_running = !self.stopped.swap(true, Ordering::SeqCst);
        if let Some(timer) = self.timer.lock().take() {
            timer.abort();
        }

        // Hold the slot while retiring so no completion applies in between.
        let mut slot = self.in_flight.lock();
        self.latest.fetch_add(1, Ordering::SeqCst);
        *slot = None;
        self.state.send_if_modified(|s| {
            let changed = s.is_loading || s.is_refreshing;
            s.is_loading = false;
            s.is_refreshing = false;
            changed
        });
        drop(slot);

        if was_running {
            debug!(resource = %self.name, "Polling stopped");
        }
    }
}

/// Cancellation handle returned by [`PollingResource::start`]
#[must_use = "dropping the handle stops polling"]
pub struct PollHandle {
    target: Option<Weak<dyn Stoppable>>,
}

impl PollHandle {
    /// Stop polling now
    pub fn cancel(mut self) {
        self.stop_target();
    }

    /// Let the resource keep polling after this handle is gone; it then has
    /// to be stopped through [`PollingResource::stop`].
    pub fn detach(mut self) {
        self.target = None;
    }

    fn stop_target(&mut self) {
        if let Some(inner) = self.target.take().and_then(|weak| weak.upgrade()) {
            inner.stop();
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.stop_target();
    }
}

impl std::fmt::Debug for PollHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollHandle")
            .field("attached", &self.target.is_some())
            .finish()
    }
}
