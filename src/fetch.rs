//! Cached data-fetch layer between the HTTP handlers and the Record Store.
//!
//! Per query key it guarantees:
//! - a staleness window during which repeated fetches are served from cache;
//! - at most one outstanding request (concurrent callers share the result);
//! - generation tagging so a superseded in-flight request can never
//!   overwrite the result of a newer one after an invalidation;
//! - up to three attempts with backoff for transient backend failures,
//!   while "not found" fails immediately.
//!
//! Values are cached as `serde_json::Value` and deserialized per call.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures::future::{BoxFuture, FutureExt, Shared};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;
use tracing::{debug, warn};

use crate::store::StoreError;

const MAX_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_BASE: Duration = Duration::from_millis(50);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Hierarchical cache key; invalidation matches on segment prefixes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey(Vec<String>);

impl QueryKey {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        prefix.0.len() <= self.0.len() && self.0[..prefix.0.len()] == prefix.0[..]
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

/// Failures surfaced to callers of `fetch`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("resource not found")]
    NotFound,
    #[error("query failed after {attempts} attempt(s): {message}")]
    LoadFailed { attempts: u32, message: String },
    #[error("cached value did not match the requested shape: {0}")]
    Shape(String),
}

type SharedFetch = Shared<BoxFuture<'static, Result<Value, FetchError>>>;

struct Cached {
    value: Value,
    fetched_at: Instant,
}

#[derive(Default)]
struct Slot {
    /// Bumped on every invalidation; requests tagged with an older
    /// generation may not install their result.
    generation: u64,
    cached: Option<Cached>,
    inflight: Option<(u64, SharedFetch)>,
}

type SlotMap = HashMap<QueryKey, Slot>;

/// Keyed cache with staleness, coalescing, retry, and generation tagging.
pub struct FetchLayer {
    slots: Arc<Mutex<SlotMap>>,
    staleness: Duration,
    retry_base: Duration,
}

impl FetchLayer {
    pub fn new(staleness: Duration) -> Self {
        Self::with_retry_base(staleness, DEFAULT_RETRY_BASE)
    }

    pub fn with_retry_base(staleness: Duration, retry_base: Duration) -> Self {
        Self {
            slots: Arc::new(Mutex::new(HashMap::new())),
            staleness,
            retry_base,
        }
    }

    /// Fetch the value under `key`, running `query` only when the cache
    /// holds nothing fresh and no identical request is already in flight.
    pub async fn fetch<T, F, Fut>(&self, key: QueryKey, query: F) -> Result<T, FetchError>
    where
        T: DeserializeOwned,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<Value, StoreError>> + Send + 'static,
    {
        let shared = {
            let mut slots = self.slots.lock().expect("fetch slot map poisoned");
            let slot = slots.entry(key.clone()).or_default();

            if let Some(cached) = &slot.cached {
                if cached.fetched_at.elapsed() < self.staleness {
                    let value = cached.value.clone();
                    drop(slots);
                    return serde_json::from_value(value)
                        .map_err(|e| FetchError::Shape(e.to_string()));
                }
            }

            match &slot.inflight {
                Some((generation, inflight)) if *generation == slot.generation => {
                    inflight.clone()
                }
                _ => {
                    let generation = slot.generation;
                    let inflight = self.spawn_query(key.clone(), generation, query);
                    slot.inflight = Some((generation, inflight.clone()));
                    inflight
                }
            }
        };

        let value = shared.await?;
        serde_json::from_value(value).map_err(|e| FetchError::Shape(e.to_string()))
    }

    fn spawn_query<F, Fut>(&self, key: QueryKey, generation: u64, query: F) -> SharedFetch
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<Value, StoreError>> + Send + 'static,
    {
        let slots = Arc::clone(&self.slots);
        let retry_factor = (self.retry_base.as_millis() as u64) / 2;

        async move {
            let strategy = ExponentialBackoff::from_millis(2)
                .factor(retry_factor)
                .max_delay(MAX_RETRY_DELAY)
                .map(jitter)
                .take(MAX_ATTEMPTS as usize - 1);

            let mut attempts = 0u32;
            let outcome = RetryIf::spawn(
                strategy,
                || {
                    attempts += 1;
                    query()
                },
                StoreError::is_retryable,
            )
            .await;

            match outcome {
                Ok(value) => {
                    let mut slots = slots.lock().expect("fetch slot map poisoned");
                    if let Some(slot) = slots.get_mut(&key) {
                        if slot.generation == generation {
                            slot.cached = Some(Cached {
                                value: value.clone(),
                                fetched_at: Instant::now(),
                            });
                            slot.inflight = None;
                        } else {
                            debug!(key = %key, "discarding superseded fetch result");
                        }
                    }
                    Ok(value)
                }
                Err(err) => {
                    let mut slots = slots.lock().expect("fetch slot map poisoned");
                    if let Some(slot) = slots.get_mut(&key) {
                        if matches!(&slot.inflight, Some((g, _)) if *g == generation) {
                            slot.inflight = None;
                        }
                    }
                    drop(slots);
                    warn!(key = %key, attempts, error = %err, "fetch failed");
                    Err(match err {
                        StoreError::NotFound => FetchError::NotFound,
                        StoreError::Shape(e) => FetchError::Shape(e.to_string()),
                        StoreError::Query(e) => FetchError::LoadFailed {
                            attempts,
                            message: e.to_string(),
                        },
                    })
                }
            }
        }
        .boxed()
        .shared()
    }

    /// Drop every cached value under `prefix` and supersede any in-flight
    /// request for those keys. Returns the number of slots touched.
    pub fn invalidate(&self, prefix: &QueryKey) -> usize {
        let mut slots = self.slots.lock().expect("fetch slot map poisoned");
        let mut touched = 0;
        for (key, slot) in slots.iter_mut() {
            if key.starts_with(prefix) {
                slot.generation += 1;
                slot.cached = None;
                touched += 1;
            }
        }
        if touched > 0 {
            debug!(prefix = %prefix, touched, "cache invalidated");
        }
        touched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::sync::Notify;

    fn layer() -> Arc<FetchLayer> {
        Arc::new(FetchLayer::with_retry_base(
            Duration::from_secs(300),
            Duration::ZERO,
        ))
    }

    fn key(segments: &[&str]) -> QueryKey {
        QueryKey::new(segments.iter().copied())
    }

    fn counting_query(
        calls: &Arc<AtomicU32>,
        value: Value,
    ) -> impl Fn() -> BoxFuture<'static, Result<Value, StoreError>> + Send + Sync + 'static {
        let calls = Arc::clone(calls);
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            let value = value.clone();
            async move { Ok(value) }.boxed()
        }
    }

    #[test]
    fn key_prefix_matching() {
        let full = key(&["screenings", "funnel", "mammography"]);
        assert!(full.starts_with(&key(&["screenings"])));
        assert!(full.starts_with(&key(&["screenings", "funnel"])));
        assert!(full.starts_with(&full.clone()));
        assert!(!full.starts_with(&key(&["visits"])));
        assert!(!key(&["screenings"]).starts_with(&full));
    }

    #[tokio::test]
    async fn second_fetch_within_window_hits_cache() {
        let layer = layer();
        let calls = Arc::new(AtomicU32::new(0));

        let a: u32 = layer
            .fetch(key(&["overview"]), counting_query(&calls, json!(7)))
            .await
            .unwrap();
        let b: u32 = layer
            .fetch(key(&["overview"]), counting_query(&calls, json!(7)))
            .await
            .unwrap();

        assert_eq!((a, b), (7, 7));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_cache_refetches() {
        let layer = Arc::new(FetchLayer::with_retry_base(Duration::ZERO, Duration::ZERO));
        let calls = Arc::new(AtomicU32::new(0));

        let _: u32 = layer
            .fetch(key(&["overview"]), counting_query(&calls, json!(1)))
            .await
            .unwrap();
        let _: u32 = layer
            .fetch(key(&["overview"]), counting_query(&calls, json!(1)))
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn invalidate_forces_refetch_inside_window() {
        let layer = layer();
        let calls = Arc::new(AtomicU32::new(0));

        let _: u32 = layer
            .fetch(key(&["visits", "channels"]), counting_query(&calls, json!(1)))
            .await
            .unwrap();
        assert_eq!(layer.invalidate(&key(&["visits"])), 1);
        let _: u32 = layer
            .fetch(key(&["visits", "channels"]), counting_query(&calls, json!(1)))
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn concurrent_identical_fetches_coalesce() {
        let layer = layer();
        let calls = Arc::new(AtomicU32::new(0));
        let gate = Arc::new(Notify::new());

        let query = {
            let calls = Arc::clone(&calls);
            let gate = Arc::clone(&gate);
            move || {
                calls.fetch_add(1, Ordering::SeqCst);
                let gate = Arc::clone(&gate);
                async move {
                    gate.notified().await;
                    Ok(json!("shared"))
                }
                .boxed()
            }
        };

        let f1 = layer.fetch::<String, _, _>(key(&["demographics", "sex"]), query.clone());
        let f2 = layer.fetch::<String, _, _>(key(&["demographics", "sex"]), query);
        let release = async {
            tokio::task::yield_now().await;
            tokio::task::yield_now().await;
            gate.notify_one();
        };

        let (a, b, _) = tokio::join!(f1, f2, release);
        assert_eq!(a.unwrap(), "shared");
        assert_eq!(b.unwrap(), "shared");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn superseded_generation_never_overwrites_newer_result() {
        let layer = layer();
        let calls = Arc::new(AtomicU32::new(0));
        let gate_a = Arc::new(Notify::new());
        let started_a = Arc::new(Notify::new());
        let k = key(&["coverage", "linkage"]);

        let slow_query = {
            let calls = Arc::clone(&calls);
            let gate_a = Arc::clone(&gate_a);
            let started_a = Arc::clone(&started_a);
            move || {
                calls.fetch_add(1, Ordering::SeqCst);
                started_a.notify_one();
                let gate_a = Arc::clone(&gate_a);
                async move {
                    gate_a.notified().await;
                    Ok(json!("stale"))
                }
                .boxed()
            }
        };

        let fetch_a = tokio::spawn({
            let layer = Arc::clone(&layer);
            let k = k.clone();
            async move { layer.fetch::<String, _, _>(k, slow_query).await }
        });
        started_a.notified().await;

        layer.invalidate(&key(&["coverage"]));

        let b: String = layer
            .fetch(k.clone(), counting_query(&calls, json!("fresh")))
            .await
            .unwrap();
        assert_eq!(b, "fresh");

        // Resolve A after B: its caller still gets A's value, but the
        // cache must keep reflecting B.
        gate_a.notify_one();
        let a = fetch_a.await.unwrap().unwrap();
        assert_eq!(a, "stale");

        let calls_before = calls.load(Ordering::SeqCst);
        let c: String = layer
            .fetch(k, counting_query(&calls, json!("unused")))
            .await
            .unwrap();
        assert_eq!(c, "fresh");
        assert_eq!(calls.load(Ordering::SeqCst), calls_before);
    }

    #[tokio::test]
    async fn not_found_fails_without_retry() {
        let layer = layer();
        let calls = Arc::new(AtomicU32::new(0));

        let query = {
            let calls = Arc::clone(&calls);
            move || {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Err::<Value, _>(StoreError::NotFound) }.boxed()
            }
        };

        let err = layer
            .fetch::<Value, _, _>(key(&["screenings", "birads"]), query)
            .await
            .unwrap_err();
        assert_eq!(err, FetchError::NotFound);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transient_failures_retry_then_succeed() {
        let layer = layer();
        let calls = Arc::new(AtomicU32::new(0));

        let query = {
            let calls = Arc::clone(&calls);
            move || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(StoreError::Query(sqlx::Error::PoolTimedOut))
                    } else {
                        Ok(json!(41))
                    }
                }
                .boxed()
            }
        };

        let v: u32 = layer.fetch(key(&["labs", "types"]), query).await.unwrap();
        assert_eq!(v, 41);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausted_retries_surface_load_failure() {
        let layer = layer();
        let calls = Arc::new(AtomicU32::new(0));

        let query = {
            let calls = Arc::clone(&calls);
            move || {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Err::<Value, _>(StoreError::Query(sqlx::Error::PoolTimedOut)) }
                    .boxed()
            }
        };

        let err = layer
            .fetch::<Value, _, _>(key(&["visits", "outcomes"]), query)
            .await
            .unwrap_err();
        match err {
            FetchError::LoadFailed { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("expected LoadFailed, got: {other}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        // A failed fetch leaves nothing cached; the next call queries again.
        let calls_before = calls.load(Ordering::SeqCst);
        let _ = layer
            .fetch::<Value, _, _>(
                key(&["visits", "outcomes"]),
                counting_query(&calls, json!(0)),
            )
            .await;
        assert!(calls.load(Ordering::SeqCst) > calls_before);
    }

    #[tokio::test]
    async fn shape_mismatch_reports_shape_error() {
        let layer = layer();
        let calls = Arc::new(AtomicU32::new(0));

        let err = layer
            .fetch::<u32, _, _>(key(&["overview"]), counting_query(&calls, json!("text")))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Shape(_)));
    }
}
