use std::convert::Infallible;
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::post,
    Json, Router,
};
use chrono::NaiveDate;
use fareline_core::{CabinClass, PassengerMix, SearchRequest};
use fareline_search::SearchSnapshot;
use futures_util::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct FlightSearchBody {
    pub origin: String,
    pub destination: String,
    pub date: NaiveDate,
    #[serde(flatten)]
    pub passengers: PassengerMix,
    #[serde(default)]
    pub cabin_class: CabinClass,
}

impl FlightSearchBody {
    pub fn to_request(&self) -> SearchRequest {
        SearchRequest::new(&self.origin, &self.destination, self.date, self.passengers)
            .with_cabin(self.cabin_class)
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/flights/search", post(search_flights))
        .route("/v1/flights/search/stream", post(search_stream))
}

/// POST /v1/flights/search
/// Waits for every carrier and returns the final merged result.
pub async fn search_flights(
    State(state): State<AppState>,
    Json(body): Json<FlightSearchBody>,
) -> Result<Json<SearchSnapshot>, AppError> {
    let snapshot = state.orchestrator.search(body.to_request()).await?;
    info!(
        "Search {} finished with {} flights",
        snapshot.session_id,
        snapshot.flights.len()
    );
    Ok(Json(snapshot))
}

/// POST /v1/flights/search/stream
/// One `snapshot` event per settled carrier, then `complete`. Closing the
/// connection cancels the session.
pub async fn search_stream(
    State(state): State<AppState>,
    Json(body): Json<FlightSearchBody>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let subscription = state.orchestrator.run_detached(body.to_request())?;
    let initial = subscription.initial().clone();

    let events = stream::once(async move { initial })
        .chain(subscription)
        .flat_map(|snapshot| stream::iter(snapshot_events(&snapshot)))
        .map(Ok);

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

fn snapshot_events(snapshot: &SearchSnapshot) -> Vec<Event> {
    let mut events = Vec::with_capacity(2);
    match Event::default().event("snapshot").json_data(snapshot) {
        Ok(event) => events.push(event),
        Err(e) => warn!("Dropping snapshot {} of {}: {}", snapshot.sequence, snapshot.session_id, e),
    }
    if snapshot.is_complete() {
        let done = json!({ "session_id": snapshot.session_id, "outcome": snapshot.outcome });
        match Event::default().event("complete").json_data(done) {
            Ok(event) => events.push(event),
            Err(e) => warn!("Dropping completion of {}: {}", snapshot.session_id, e),
        }
    }
    events
}
