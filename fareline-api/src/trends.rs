use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use fareline_core::{PassengerMix, SearchRequest};
use fareline_search::{PriceTrendStrip, TrendCell, TrendPrice};
use serde::{Deserialize, Serialize};
use crate::error::AppError;
use crate::state::AppState;

fn one() -> u32 { 1 }

/// Query-string form of a trend key. Kept flat because query strings
/// cannot carry numbers through a flattened struct.
#[derive(Debug, Deserialize)]
pub struct FareQuery {
    pub origin: String,
    pub destination: String,
    pub date: NaiveDate,
    #[serde(default = "one")]
    pub adults: u32,
    #[serde(default)]
    pub children: u32,
    #[serde(default)]
    pub infants: u32,
}

impl FareQuery {
    pub fn to_request(&self) -> SearchRequest {
        SearchRequest::new(
            &self.origin,
            &self.destination,
            self.date,
            PassengerMix::new(self.adults, self.children, self.infants),
        )
    }
}

#[derive(Debug, Serialize)]
pub struct TrendResponse {
    pub selected: NaiveDate,
    pub window_start: NaiveDate,
    pub cells: Vec<TrendCell>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/fares/cheapest", get(cheapest_fare))
        .route("/v1/fares/trend", get(fare_trend))
}

/// GET /v1/fares/cheapest
/// Cheapest fare for one route and day, served from the trend cache.
pub async fn cheapest_fare(
    State(state): State<AppState>,
    Query(query): Query<FareQuery>,
) -> Result<Json<TrendPrice>, AppError> {
    let key = query.to_request().trend_key();
    let price = state.trends.get(&key).await?;
    Ok(Json(price))
}

/// GET /v1/fares/trend
/// The strip of days around the selected `date`. Neighbouring days come
/// from the trend cache while the selected day, unless already past, is
/// priced by a live search run alongside.
pub async fn fare_trend(
    State(state): State<AppState>,
    Query(query): Query<FareQuery>,
) -> Result<Json<TrendResponse>, AppError> {
    let request = query.to_request();
    request.validate()?;

    let mut strip = PriceTrendStrip::new(
        request.trend_key(),
        state.trends.today(),
        state.trend.window_days,
        state.trend.shift_days,
        state.orchestrator.aggregator(),
    );

    if request.date < state.trends.today() {
        // The selected day renders as past; no live search for it.
        strip.load(&state.trends).await?;
    } else {
        let (loaded, live) = tokio::join!(strip.load(&state.trends), state.orchestrator.search(request));
        loaded?;
        strip.apply_search(&live?);
    }

    Ok(Json(TrendResponse {
        selected: strip.selected(),
        window_start: strip.window_start(),
        cells: strip.cells(),
    }))
}
