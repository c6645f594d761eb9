use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use futures_util::stream::{FuturesUnordered, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use uuid::Uuid;
use fareline_core::{CarrierCode, CoreResult, SearchRequest};
use crate::aggregator::ResultAggregator;
use crate::observer::{NoopObserver, SearchObserver};
use crate::query::{CarrierQuery, CarrierTask};
use crate::session::{SearchSession, SearchSnapshot};

/// Cancels a session. Cloneable so it can be kept apart from the stream.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub session_id: Uuid,
    token: CancellationToken,
}

impl SessionHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// True once the session was cancelled or superseded.
    pub fn is_stale(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Progressive results of one session: one snapshot per settled carrier,
/// the last one authoritative. Ends early, without further items, once the
/// session goes stale. Dropping it cancels the session.
pub struct SearchSubscription {
    initial: SearchSnapshot,
    rx: mpsc::UnboundedReceiver<SearchSnapshot>,
    handle: SessionHandle,
}

impl SearchSubscription {
    pub fn session_id(&self) -> Uuid {
        self.handle.session_id
    }

    /// State right after fan-out: every carrier loading, no flights.
    pub fn initial(&self) -> &SearchSnapshot {
        &self.initial
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    pub fn cancel(&self) {
        self.handle.cancel();
    }

    pub fn is_stale(&self) -> bool {
        self.handle.is_stale()
    }

    /// Drain the stream and return the last snapshot seen, which is the
    /// final result unless the session went stale first.
    pub async fn last(mut self) -> SearchSnapshot {
        let mut latest = self.initial.clone();
        while let Some(snapshot) = self.next().await {
            latest = snapshot;
        }
        latest
    }
}

impl Stream for SearchSubscription {
    type Item = SearchSnapshot;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        // Snapshots already queued for a stale session are never delivered.
        if self.handle.is_stale() {
            return Poll::Ready(None);
        }
        self.rx.poll_recv(cx)
    }
}

impl Drop for SearchSubscription {
    fn drop(&mut self) {
        self.handle.cancel();
    }
}

struct ActiveSession {
    id: Uuid,
    request: SearchRequest,
    token: CancellationToken,
}

/// Fans a search out to every configured carrier and streams merged results
/// back as carriers answer.
pub struct SearchOrchestrator {
    query: Arc<CarrierQuery>,
    carriers: Arc<[CarrierCode]>,
    aggregator: ResultAggregator,
    observer: Arc<dyn SearchObserver>,
    current: Arc<Mutex<Option<ActiveSession>>>,
}

impl SearchOrchestrator {
    pub fn new(query: Arc<CarrierQuery>, carriers: Vec<CarrierCode>, aggregator: ResultAggregator) -> Self {
        Self {
            query,
            carriers: carriers.into(),
            aggregator,
            observer: Arc::new(NoopObserver),
            current: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn SearchObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn carriers(&self) -> &[CarrierCode] {
        &self.carriers
    }

    pub fn aggregator(&self) -> ResultAggregator {
        self.aggregator
    }

    /// Start a session that supersedes this orchestrator's previous one.
    pub fn run(&self, request: SearchRequest) -> CoreResult<SearchSubscription> {
        request.validate()?;
        let subscription = self.spawn_session(request.clone());

        let previous = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(ActiveSession {
                id: subscription.session_id(),
                request,
                token: subscription.handle.token.clone(),
            });
        if let Some(previous) = previous {
            if !previous.token.is_cancelled() {
                info!(
                    "Session {} for {}-{} on {} superseded by {}",
                    previous.id,
                    previous.request.origin,
                    previous.request.destination,
                    previous.request.date,
                    subscription.session_id()
                );
                previous.token.cancel();
            }
        }
        Ok(subscription)
    }

    /// Start a session that nothing else supersedes; only its own handle
    /// (or dropping the subscription) cancels it.
    pub fn run_detached(&self, request: SearchRequest) -> CoreResult<SearchSubscription> {
        request.validate()?;
        Ok(self.spawn_session(request))
    }

    /// Callback flavour of [`run`](Self::run): `on_update` receives every
    /// snapshot in completion order until the session ends or goes stale.
    pub fn subscribe<F>(&self, request: SearchRequest, mut on_update: F) -> CoreResult<SessionHandle>
    where
        F: FnMut(SearchSnapshot) + Send + 'static,
    {
        let mut subscription = self.run(request)?;
        let handle = subscription.handle();
        tokio::spawn(async move {
            while let Some(snapshot) = subscription.next().await {
                on_update(snapshot);
            }
        });
        Ok(handle)
    }

    /// Run a detached session to completion and return the final result.
    pub async fn search(&self, request: SearchRequest) -> CoreResult<SearchSnapshot> {
        Ok(self.run_detached(request)?.last().await)
    }

    fn spawn_session(&self, request: SearchRequest) -> SearchSubscription {
        let mut session = SearchSession::new(request, &self.carriers);
        if let Err(e) = session.start() {
            error!("Fresh session refused to start: {}", e);
        }
        let initial = session.snapshot();
        let token = CancellationToken::new();
        let (tx, rx) = mpsc::unbounded_channel();

        info!(
            "Session {} searching {}-{} on {} ({} adults, {} children, {} infants) across {} carriers",
            session.id(),
            session.request().origin,
            session.request().destination,
            session.request().date,
            session.request().passengers.adults,
            session.request().passengers.children,
            session.request().passengers.infants,
            self.carriers.len()
        );

        let driver = SessionDriver {
            session,
            query: self.query.clone(),
            carriers: self.carriers.clone(),
            aggregator: self.aggregator,
            observer: self.observer.clone(),
            current: self.current.clone(),
            token: token.clone(),
            tx,
        };
        tokio::spawn(driver.drive());

        SearchSubscription {
            handle: SessionHandle { session_id: initial.session_id, token },
            initial,
            rx,
        }
    }
}

struct SessionDriver {
    session: SearchSession,
    query: Arc<CarrierQuery>,
    carriers: Arc<[CarrierCode]>,
    aggregator: ResultAggregator,
    observer: Arc<dyn SearchObserver>,
    current: Arc<Mutex<Option<ActiveSession>>>,
    token: CancellationToken,
    tx: mpsc::UnboundedSender<SearchSnapshot>,
}

impl SessionDriver {
    async fn drive(mut self) {
        let id = self.session.id();
        let request = self.session.request().clone();

        // One task per carrier; dropping `pending` aborts whatever is left.
        let mut pending: FuturesUnordered<CarrierTask> = self
            .carriers
            .iter()
            .map(|carrier| self.query.spawn(&request, carrier))
            .collect();

        loop {
            let outcome = tokio::select! {
                biased;
                _ = self.token.cancelled() => {
                    debug!("Session {} is stale, dropping {} outstanding carriers", id, pending.len());
                    self.release(id);
                    return;
                }
                next = pending.next() => match next {
                    Some(outcome) => outcome,
                    None => break,
                },
            };

            if let Err(e) = self.session.settle(outcome, &self.aggregator) {
                error!("Session {} could not settle carrier: {}", id, e);
                continue;
            }
            if self.token.is_cancelled() {
                self.release(id);
                return;
            }
            if self.tx.send(self.session.snapshot()).is_err() {
                debug!("Session {} has no listener left", id);
                self.release(id);
                return;
            }
        }

        let outcome = self.session.outcome();
        info!("Session {} finished: {:?}", id, outcome);
        self.observer.on_session_finished(&outcome);
        self.release(id);
    }

    fn release(&self, id: Uuid) {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if current.as_ref().map(|active| active.id) == Some(id) {
            *current = None;
        }
    }
}
