use std::collections::HashMap;
use std::sync::Arc;
use chrono::{DateTime, Duration, Utc};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use fareline_core::{CarrierCode, Clock, CoreResult, TrendKey};
use crate::aggregator::ResultAggregator;
use crate::observer::{NoopObserver, SearchObserver, TrendLookup};
use crate::query::CarrierQuery;

/// Cheapest fare for one route and day, as shown in the price strip.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TrendPrice {
    Available { amount: i64, currency: String },
    /// Every carrier answered (or failed) without a priced flight.
    Unavailable,
    /// The day is already behind us; never priced.
    Past,
}

#[derive(Debug, Clone)]
struct TrendEntry {
    value: TrendPrice,
    fetched_at: DateTime<Utc>,
}

impl TrendEntry {
    fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.fetched_at < ttl
    }
}

type InFlight = Shared<BoxFuture<'static, TrendPrice>>;

/// Entries and in-flight fetches live under one lock, so the
/// lookup-then-register step cannot race.
#[derive(Default)]
struct TrendState {
    entries: HashMap<TrendKey, TrendEntry>,
    loading: HashMap<TrendKey, InFlight>,
}

/// Short-lived cache of cheapest fares with one outstanding fetch per key.
pub struct FareTrendCache {
    query: Arc<CarrierQuery>,
    carriers: Arc<[CarrierCode]>,
    aggregator: ResultAggregator,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    observer: Arc<dyn SearchObserver>,
    state: Arc<Mutex<TrendState>>,
}

impl FareTrendCache {
    pub fn new(
        query: Arc<CarrierQuery>,
        carriers: Vec<CarrierCode>,
        aggregator: ResultAggregator,
        clock: Arc<dyn Clock>,
        ttl: Duration,
    ) -> Self {
        Self {
            query,
            carriers: carriers.into(),
            aggregator,
            clock,
            ttl,
            observer: Arc::new(NoopObserver),
            state: Arc::new(Mutex::new(TrendState::default())),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn SearchObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn today(&self) -> chrono::NaiveDate {
        self.clock.today()
    }

    /// Cheapest fare for `key`, from cache when fresh, otherwise from a
    /// single fan-out shared by every concurrent caller.
    pub async fn get(&self, key: &TrendKey) -> CoreResult<TrendPrice> {
        key.to_request().validate()?;

        if key.date < self.clock.today() {
            self.record(key, TrendLookup::Past);
            return Ok(TrendPrice::Past);
        }

        let fetch = {
            let mut state = self.state.lock().await;
            let now = self.clock.now();

            let cached = state
                .entries
                .get(key)
                .map(|entry| (entry.is_fresh(now, self.ttl), entry.value.clone()));

            let lookup = match cached {
                Some((true, value)) => {
                    drop(state);
                    self.record(key, TrendLookup::Hit);
                    return Ok(value);
                }
                Some((false, _)) => {
                    state.entries.remove(key);
                    TrendLookup::Expired
                }
                None => TrendLookup::Miss,
            };

            match state.loading.get(key) {
                Some(in_flight) => {
                    self.record(key, TrendLookup::Coalesced);
                    in_flight.clone()
                }
                None => {
                    self.record(key, lookup);
                    let in_flight = self.spawn_fetch(key.clone());
                    state.loading.insert(key.clone(), in_flight.clone());
                    in_flight
                }
            }
        };

        Ok(fetch.await)
    }

    /// Fresh cached value without triggering a fetch.
    pub async fn peek(&self, key: &TrendKey) -> Option<TrendPrice> {
        let state = self.state.lock().await;
        state
            .entries
            .get(key)
            .filter(|entry| entry.is_fresh(self.clock.now(), self.ttl))
            .map(|entry| entry.value.clone())
    }

    pub async fn is_loading(&self, key: &TrendKey) -> bool {
        self.state.lock().await.loading.contains_key(key)
    }

    /// Number of stored entries, stale ones included until next touched.
    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn invalidate(&self, key: &TrendKey) {
        self.state.lock().await.entries.remove(key);
    }

    fn record(&self, key: &TrendKey, lookup: TrendLookup) {
        debug!(
            "Trend {} for {}-{} on {} ({} pax)",
            lookup.as_str(), key.origin, key.destination, key.date, key.passengers.total()
        );
        self.observer.on_trend_lookup(lookup);
    }

    /// Runs on its own task so the fetch completes, and the marker clears,
    /// even if every waiter goes away. A fetch that dies is not cached; the
    /// marker is cleared so the next lookup fetches again.
    fn spawn_fetch(&self, key: TrendKey) -> InFlight {
        let query = self.query.clone();
        let carriers = self.carriers.clone();
        let aggregator = self.aggregator;
        let clock = self.clock.clone();
        let state = self.state.clone();

        let task = tokio::spawn(async move {
            let fetch_key = key.clone();
            let fetched = tokio::spawn(async move {
                let outcomes = query.fan_out(&fetch_key.to_request(), &carriers).await;
                let flights: Vec<_> = outcomes
                    .into_iter()
                    .filter_map(|outcome| outcome.result.ok())
                    .flatten()
                    .collect();

                match aggregator.cheapest(&flights, &fetch_key.passengers) {
                    Some(fare) => TrendPrice::Available { amount: fare.amount, currency: fare.currency },
                    None => TrendPrice::Unavailable,
                }
            })
            .await;

            let mut state = state.lock().await;
            state.loading.remove(&key);
            match fetched {
                Ok(value) => {
                    state.entries.insert(key, TrendEntry { value: value.clone(), fetched_at: clock.now() });
                    value
                }
                Err(e) => {
                    warn!("Trend fetch for {}-{} on {} died: {}", key.origin, key.destination, key.date, e);
                    TrendPrice::Unavailable
                }
            }
        });

        task.map(|joined| joined.unwrap_or(TrendPrice::Unavailable)).boxed().shared()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{carriers, date, flight, request, Script, ScriptedSource};
    use chrono::TimeZone;
    use fareline_core::ManualClock;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 30, 3, 0, 0).unwrap()
    }

    fn cache(source: Arc<ScriptedSource>, clock: Arc<ManualClock>) -> FareTrendCache {
        let query = CarrierQuery::new(source, std::time::Duration::from_secs(20));
        FareTrendCache::new(
            Arc::new(query),
            carriers(&["VN", "VJ", "QH"]),
            ResultAggregator::default(),
            clock,
            Duration::minutes(30),
        )
    }

    fn source() -> Arc<ScriptedSource> {
        Arc::new(
            ScriptedSource::new()
                .with("VN", 100, Script::Flights(vec![flight("VN", "VN207", 500_000, 6)]))
                .with("VJ", 300, Script::Flights(vec![flight("VJ", "VJ121", 450_000, 5)]))
                .with("QH", 200, Script::Fail),
        )
    }

    fn cheapest() -> TrendPrice {
        TrendPrice::Available { amount: 450_000, currency: "VND".into() }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_gets_share_one_fetch() {
        let source = source();
        let cache = cache(source.clone(), Arc::new(ManualClock::new(start())));
        let key = request().trend_key();

        let (a, b) = tokio::join!(cache.get(&key), cache.get(&key));
        assert_eq!(a.unwrap(), cheapest());
        assert_eq!(b.unwrap(), cheapest());
        assert_eq!(source.calls(), 3);
        assert_eq!(source.calls_for("VJ"), 1);
        assert!(!cache.is_loading(&key).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_entry_skips_network() {
        let source = source();
        let clock = Arc::new(ManualClock::new(start()));
        let cache = cache(source.clone(), clock.clone());
        let key = request().trend_key();

        cache.get(&key).await.unwrap();
        clock.advance(Duration::minutes(29));
        assert_eq!(cache.get(&key).await.unwrap(), cheapest());
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_refetches_once() {
        let source = source();
        let clock = Arc::new(ManualClock::new(start()));
        let cache = cache(source.clone(), clock.clone());
        let key = request().trend_key();

        cache.get(&key).await.unwrap();
        clock.advance(Duration::minutes(30));
        assert_eq!(cache.peek(&key).await, None);

        let (a, b) = tokio::join!(cache.get(&key), cache.get(&key));
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(source.calls(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_past_dates_never_fetch() {
        let source = source();
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 11, 3, 1, 0, 0).unwrap()));
        let cache = cache(source.clone(), clock);
        let key = request().trend_key();
        assert_eq!(key.date, date());

        assert_eq!(cache.get(&key).await.unwrap(), TrendPrice::Past);
        assert_eq!(source.calls(), 0);
        assert!(cache.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_flights_is_unavailable_and_cached() {
        let source = Arc::new(
            ScriptedSource::new()
                .with("VN", 10, Script::Flights(vec![]))
                .with("VJ", 10, Script::Fail)
                .with("QH", 10, Script::Flights(vec![])),
        );
        let cache = cache(source.clone(), Arc::new(ManualClock::new(start())));
        let key = request().trend_key();

        assert_eq!(cache.get(&key).await.unwrap(), TrendPrice::Unavailable);
        assert_eq!(cache.get(&key).await.unwrap(), TrendPrice::Unavailable);
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_differ_by_passenger_mix() {
        let source = source();
        let cache = cache(source.clone(), Arc::new(ManualClock::new(start())));
        let solo = request().trend_key();
        let mut family = solo.clone();
        family.passengers.children = 2;

        cache.get(&solo).await.unwrap();
        cache.get(&family).await.unwrap();
        assert_eq!(source.calls(), 6);
        assert_eq!(cache.len().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_fetch_still_completes() {
        let source = source();
        let cache = cache(source.clone(), Arc::new(ManualClock::new(start())));
        let key = request().trend_key();

        let abandoned = tokio::time::timeout(std::time::Duration::from_millis(50), cache.get(&key)).await;
        assert!(abandoned.is_err());
        assert!(cache.is_loading(&key).await);

        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        assert_eq!(cache.peek(&key).await, Some(cheapest()));
        assert!(!cache.is_loading(&key).await);
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test]
    async fn test_invalid_key_is_rejected() {
        let cache = cache(source(), Arc::new(ManualClock::new(start())));
        let mut key = request().trend_key();
        key.origin = "SAIGON".into();
        assert!(cache.get(&key).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_crashed_carrier_does_not_pin_the_key() {
        let source = Arc::new(
            ScriptedSource::new()
                .with("VN", 10, Script::Panic)
                .with("VJ", 30, Script::Flights(vec![flight("VJ", "VJ121", 450_000, 5)])),
        );
        let clock = Arc::new(ManualClock::new(start()));
        let cache = cache(source.clone(), clock.clone());
        let key = request().trend_key();

        assert_eq!(cache.get(&key).await.unwrap(), cheapest());
        assert!(!cache.is_loading(&key).await);
        assert_eq!(source.calls(), 3);

        clock.advance(Duration::hours(5));
        assert_eq!(cache.get(&key).await.unwrap(), cheapest());
        assert!(!cache.is_loading(&key).await);
        assert_eq!(source.calls(), 6);
    }
}
