//! Request-scoped batching loaders.
//!
//! A loader collects keys requested during one evaluation phase and resolves
//! them with a single bulk store call.
//!
//! # Flush triggers
//!
//! - **Capacity**: the batch is flushed as soon as it holds
//!   `max_batch_size` distinct keys.
//! - **Window**: otherwise, the first key of a batch starts a timer and the
//!   batch is flushed `wait` later.
//!
//! Flushes run on spawned tasks. The window timer only holds a weak handle
//! to the loader, so dropping the loader drops every unflushed slot and its
//! waiters resolve to [`LoadError::Cancelled`].
//!
//! # Caching
//!
//! Every requested key keeps its result slot for the loader's lifetime,
//! including failures. A key reaches the store at most once.

mod config;
mod fetch;


use std::collections::HashMap;
use std::fmt;
use std::future::IntoFuture;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use futures::future::{join_all, BoxFuture};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::{LoadError, LoadResult};

pub use config::{LoaderConfig, DEFAULT_MAX_BATCH_SIZE, DEFAULT_WAIT};
pub use fetch::{ActivityCodeFetcher, BatchFetch, CompanyFetcher, PartnersFetcher};

/// Single-assignment result slot shared by every waiter of a key.
type Slot<V> = Option<LoadResult<V>>;

/// A load that resolves when its batch is flushed.
///
/// Obtained from [`BatchLoader::load`]; await it to get the result. The key
/// is already enqueued by the time a `Pending` exists, so awaiting loads in
/// sequence does not split them across batches.
#[must_use = "a pending load does nothing unless awaited"]
pub struct Pending<V> {
    rx: watch::Receiver<Slot<V>>,
}

impl<V: Clone> Pending<V> {
    /// Returns the result if the batch has already been flushed.
    pub fn try_get(&self) -> Option<LoadResult<V>> {
        self.rx.borrow().clone()
    }
}

impl<V> fmt::Debug for Pending<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pending")
            .field("resolved", &self.rx.borrow().is_some())
            .finish()
    }
}

impl<V: Clone + Send + Sync + 'static> IntoFuture for Pending<V> {
    type Output = LoadResult<V>;
    type IntoFuture = BoxFuture<'static, LoadResult<V>>;

    fn into_future(mut self) -> Self::IntoFuture {
        Box::pin(async move {
            loop {
                let current = self.rx.borrow_and_update().clone();
                if let Some(result) = current {
                    return result;
                }
                if self.rx.changed().await.is_err() {
                    // Sender gone: the slot was either filled just before the
                    // drop or abandoned with its batch.
                    let last = self.rx.borrow().clone();
                    return last.unwrap_or(Err(LoadError::Cancelled));
                }
            }
        })
    }
}

/// Awaits several pending loads, preserving their order.
pub async fn join_pending<V>(pending: Vec<Pending<V>>) -> Vec<LoadResult<V>>
where
    V: Clone + Send + Sync + 'static,
{
    join_all(pending.into_iter().map(IntoFuture::into_future)).await
}

/// Counters for loader activity.
#[derive(Debug, Default)]
struct LoaderMetrics {
    requested: AtomicU64,
    cache_hits: AtomicU64,
    dispatched_keys: AtomicU64,
    flushes: AtomicU64,
}

/// A point-in-time snapshot of loader activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoaderStats {
    /// Calls to `load`, including those served from the cache.
    pub requested: u64,
    /// Loads answered by an existing slot (resolved or still pending).
    pub cache_hits: u64,
    /// Keys sent to the store across all flushes.
    pub dispatched_keys: u64,
    /// Store calls made.
    pub flushes: u64,
}

struct LoaderState<K, V> {
    cache: HashMap<K, watch::Receiver<Slot<V>>>,
    /// Keys enqueued since the last flush, in first-appearance order.
    batch: Vec<(K, watch::Sender<Slot<V>>)>,
    /// Bumped on every flush so a stale window timer leaves the next batch alone.
    generation: u64,
}

struct LoaderInner<F: BatchFetch> {
    fetcher: F,
    config: LoaderConfig,
    state: Mutex<LoaderState<F::Key, F::Value>>,
    metrics: LoaderMetrics,
}

impl<F: BatchFetch> LoaderInner<F> {
    fn lock_state(&self) -> MutexGuard<'_, LoaderState<F::Key, F::Value>> {
        // The state is consistent between statements, so a poisoned lock is
        // still safe to use.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Batching, caching loader for one entity type.
///
/// Cloning is cheap and yields a handle to the same cache and batch. Must be
/// used from within a Tokio runtime.
pub struct BatchLoader<F: BatchFetch> {
    inner: Arc<LoaderInner<F>>,
}

impl<F: BatchFetch> Clone for BatchLoader<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F: BatchFetch> fmt::Debug for BatchLoader<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchLoader")
            .field("name", &self.inner.fetcher.name())
            .field("config", &self.inner.config)
            .field("stats", &self.stats())
            .finish()
    }
}

impl<F: BatchFetch> BatchLoader<F> {
    /// Creates a loader with an empty cache.
    pub fn new(fetcher: F, config: LoaderConfig) -> Self {
        let config = LoaderConfig {
            max_batch_size: config.max_batch_size.max(1),
            ..config
        };
        Self {
            inner: Arc::new(LoaderInner {
                fetcher,
                config,
                state: Mutex::new(LoaderState {
                    cache: HashMap::new(),
                    batch: Vec::new(),
                    generation: 0,
                }),
                metrics: LoaderMetrics::default(),
            }),
        }
    }

    /// Returns the loader configuration.
    pub fn config(&self) -> &LoaderConfig {
        &self.inner.config
    }

    /// Requests one key.
    ///
    /// Returns immediately. A key seen before shares the existing slot;
    /// a new key joins the open batch.
    pub fn load(&self, key: F::Key) -> Pending<F::Value> {
        let metrics = &self.inner.metrics;
        metrics.requested.fetch_add(1, Ordering::Relaxed);

        let mut state = self.inner.lock_state();
        if let Some(rx) = state.cache.get(&key) {
            metrics.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Pending { rx: rx.clone() };
        }

        let (tx, rx) = watch::channel(None);
        state.cache.insert(key.clone(), rx.clone());
        state.batch.push((key, tx));

        if state.batch.len() >= self.inner.config.max_batch_size {
            let batch = std::mem::take(&mut state.batch);
            state.generation += 1;
            drop(state);
            let inner = Arc::clone(&self.inner);
            tokio::spawn(async move { flush(&inner, batch).await });
        } else if state.batch.len() == 1 {
            let generation = state.generation;
            drop(state);
            self.schedule_window(generation);
        }

        Pending { rx }
    }

    /// Requests several keys; one pending load per key, in input order.
    pub fn load_many<I>(&self, keys: I) -> Vec<Pending<F::Value>>
    where
        I: IntoIterator<Item = F::Key>,
    {
        keys.into_iter().map(|key| self.load(key)).collect()
    }

    /// Returns a snapshot of the loader counters.
    pub fn stats(&self) -> LoaderStats {
        let metrics = &self.inner.metrics;
        LoaderStats {
            requested: metrics.requested.load(Ordering::Relaxed),
            cache_hits: metrics.cache_hits.load(Ordering::Relaxed),
            dispatched_keys: metrics.dispatched_keys.load(Ordering::Relaxed),
            flushes: metrics.flushes.load(Ordering::Relaxed),
        }
    }

    fn schedule_window(&self, generation: u64) {
        let weak: Weak<LoaderInner<F>> = Arc::downgrade(&self.inner);
        let wait = self.inner.config.wait;
        tokio::spawn(async move {
            tokio::time::sleep(wait).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let batch = {
                let mut state = inner.lock_state();
                if state.generation != generation || state.batch.is_empty() {
                    return;
                }
                state.generation += 1;
                std::mem::take(&mut state.batch)
            };
            flush(&inner, batch).await;
        });
    }
}

/// Runs one store call for a batch and fills every slot in it.
async fn flush<F: BatchFetch>(
    inner: &LoaderInner<F>,
    batch: Vec<(F::Key, watch::Sender<Slot<F::Value>>)>,
) {
    let keys: Vec<F::Key> = batch.iter().map(|(key, _)| key.clone()).collect();
    let loader = inner.fetcher.name();

    inner.metrics.flushes.fetch_add(1, Ordering::Relaxed);
    inner
        .metrics
        .dispatched_keys
        .fetch_add(keys.len() as u64, Ordering::Relaxed);
    debug!(loader, keys = keys.len(), "Flushing batch");

    match inner.fetcher.fetch_many(&keys).await {
        Ok(mut found) => {
            for (key, tx) in batch {
                let result = match found.remove(&key) {
                    Some(value) => Ok(value),
                    None => inner.fetcher.on_missing(&key),
                };
                tx.send_replace(Some(result));
            }
        }
        Err(e) => {
            warn!(loader, keys = keys.len(), error = %e, "Batch store call failed");
            let err = LoadError::StoreFailure(Arc::new(e));
            for (_, tx) in batch {
                tx.send_replace(Some(Err(err.clone())));
            }
        }
    }
}
