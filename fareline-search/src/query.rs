use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use futures_util::future::join_all;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};
use fareline_core::{CarrierCode, CarrierError, CarrierSource, CarrierStatus, Flight, SearchRequest};
use crate::breaker::CircuitBreaker;
use crate::observer::{NoopObserver, SearchObserver};

/// Settled answer of one carrier for one request.
#[derive(Debug, Clone)]
pub struct CarrierOutcome {
    pub carrier: CarrierCode,
    pub result: Result<Vec<Flight>, CarrierError>,
    pub elapsed: Duration,
}

impl CarrierOutcome {
    pub fn status(&self) -> CarrierStatus {
        CarrierStatus::settled(&self.result)
    }
}

/// Asks one carrier for fares. Failures come back as values, never as panics
/// or early returns, so callers can keep going with the other carriers.
pub struct CarrierQuery {
    source: Arc<dyn CarrierSource>,
    timeout: Duration,
    breakers: HashMap<CarrierCode, Arc<CircuitBreaker>>,
    observer: Arc<dyn SearchObserver>,
}

impl CarrierQuery {
    pub fn new(source: Arc<dyn CarrierSource>, timeout: Duration) -> Self {
        Self {
            source,
            timeout,
            breakers: HashMap::new(),
            observer: Arc::new(NoopObserver),
        }
    }

    /// Guard each of `carriers` with its own breaker.
    pub fn with_breakers(mut self, carriers: &[CarrierCode], threshold: usize, reset_timeout: Duration) -> Self {
        for carrier in carriers {
            self.breakers.insert(
                carrier.clone(),
                Arc::new(CircuitBreaker::new(carrier.as_str(), threshold, reset_timeout)),
            );
        }
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn SearchObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn breaker(&self, carrier: &CarrierCode) -> Option<&Arc<CircuitBreaker>> {
        self.breakers.get(carrier)
    }

    pub async fn execute(&self, request: &SearchRequest, carrier: &CarrierCode) -> CarrierOutcome {
        let started = Instant::now();
        let result = self.call(request, carrier).await;
        let elapsed = started.elapsed();

        match &result {
            Ok(flights) => debug!(
                "Carrier {} returned {} flights for {}-{} on {} in {:?}",
                carrier, flights.len(), request.origin, request.destination, request.date, elapsed
            ),
            Err(e) => warn!(
                "Carrier {} failed for {}-{} on {}: {}",
                carrier, request.origin, request.destination, request.date, e
            ),
        }

        let outcome = CarrierOutcome { carrier: carrier.clone(), result, elapsed };
        self.observer.on_carrier_settled(carrier, outcome.status(), elapsed);
        outcome
    }

    /// Run [`execute`](Self::execute) on its own task. A source that panics
    /// settles only its own carrier, as an error.
    pub fn spawn(self: &Arc<Self>, request: &SearchRequest, carrier: &CarrierCode) -> CarrierTask {
        let query = self.clone();
        let task_request = request.clone();
        let task_carrier = carrier.clone();
        let handle = tokio::spawn(async move { query.execute(&task_request, &task_carrier).await });

        CarrierTask {
            carrier: carrier.clone(),
            started: Instant::now(),
            handle,
            observer: self.observer.clone(),
        }
    }

    /// Query every carrier at once and wait for all of them.
    pub async fn fan_out(self: &Arc<Self>, request: &SearchRequest, carriers: &[CarrierCode]) -> Vec<CarrierOutcome> {
        join_all(carriers.iter().map(|carrier| self.spawn(request, carrier))).await
    }

    async fn call(&self, request: &SearchRequest, carrier: &CarrierCode) -> Result<Vec<Flight>, CarrierError> {
        let breaker = self.breakers.get(carrier);
        if let Some(cb) = breaker {
            if !cb.check().await {
                return Err(CarrierError::CircuitOpen(carrier.clone()));
            }
        }

        let result = match tokio::time::timeout(self.timeout, self.source.search_by_carrier(request, carrier)).await {
            Ok(result) => result,
            Err(_) => Err(CarrierError::Timeout(self.timeout)),
        };

        if let Some(cb) = breaker {
            match &result {
                Ok(_) => cb.record_success().await,
                Err(_) => cb.record_failure().await,
            }
        }

        result
    }
}

/// A carrier query running on its own task. Dropping it aborts the query.
pub struct CarrierTask {
    carrier: CarrierCode,
    started: Instant,
    handle: JoinHandle<CarrierOutcome>,
    observer: Arc<dyn SearchObserver>,
}

impl CarrierTask {
    pub fn carrier(&self) -> &CarrierCode {
        &self.carrier
    }
}

impl Future for CarrierTask {
    type Output = CarrierOutcome;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.handle).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(e)) => {
                warn!("Carrier {} query died: {}", this.carrier, e);
                let outcome = CarrierOutcome {
                    carrier: this.carrier.clone(),
                    result: Err(CarrierError::Unavailable(format!("{} query aborted: {}", this.carrier, e))),
                    elapsed: this.started.elapsed(),
                };
                this.observer.on_carrier_settled(&this.carrier, outcome.status(), outcome.elapsed);
                Poll::Ready(outcome)
            }
        }
    }
}

impl Drop for CarrierTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
