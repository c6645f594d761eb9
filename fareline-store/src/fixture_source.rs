use async_trait::async_trait;
use chrono::{Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Utc};
use fareline_core::{
    CarrierCode, CarrierError, CarrierSource, Flight, PassengerFare, PassengerType, SearchRequest,
    Segment,
};
use rand::Rng;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use tracing::debug;
use crate::app_config::MockConfig;

/// Canned schedule used when no live reservation backend is wired in.
#[derive(Debug, Deserialize, Clone)]
pub struct FixtureSet {
    pub currency: String,
    #[serde(default = "default_utc_offset")]
    pub utc_offset_hours: i32,
    pub carriers: HashMap<String, Vec<FlightTemplate>>,
}

fn default_utc_offset() -> i32 { 7 }

#[derive(Debug, Deserialize, Clone)]
pub struct FlightTemplate {
    pub flight_number: String,
    pub departs: NaiveTime, // Local time at origin
    pub duration_minutes: i64,
    #[serde(default = "default_fare_class")]
    pub fare_class: String,
    pub operating_carrier: Option<String>,
    /// "SGN-HAN" style filters; empty means the flight serves every route.
    #[serde(default)]
    pub routes: Vec<String>,
    pub adult: FareTemplate,
    pub child: Option<FareTemplate>,
    pub infant: Option<FareTemplate>,
}

fn default_fare_class() -> String { "Y".to_string() }

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct FareTemplate {
    pub base_fare: i64,
    pub tax: i64,
    pub fee: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    #[error("Failed to read fixtures from {path}: {source}")]
    Io { path: String, source: std::io::Error },
    #[error("Malformed fixtures: {0}")]
    Parse(#[from] serde_json::Error),
}

impl FlightTemplate {
    fn serves(&self, origin: &str, destination: &str) -> bool {
        self.routes.is_empty()
            || self.routes.iter().any(|r| r.eq_ignore_ascii_case(&format!("{}-{}", origin, destination)))
    }

    fn materialise(
        &self,
        carrier: &CarrierCode,
        request: &SearchRequest,
        offset: &FixedOffset,
        currency: &str,
    ) -> Option<Flight> {
        let local = request.date.and_time(self.departs);
        let departure_time = offset.from_local_datetime(&local).single()?.with_timezone(&Utc);
        let arrival_time = departure_time + Duration::minutes(self.duration_minutes);
        let factor = weekday_factor(request.date);

        let quote = |passenger_type, fare: &FareTemplate| PassengerFare {
            passenger_type,
            base_fare: fare.base_fare * factor / 100,
            tax: fare.tax,
            fee: fare.fee,
            currency: currency.to_string(),
        };

        let mut fares = vec![quote(PassengerType::Adult, &self.adult)];
        if let Some(child) = &self.child {
            fares.push(quote(PassengerType::Child, child));
        }
        if let Some(infant) = &self.infant {
            fares.push(quote(PassengerType::Infant, infant));
        }

        Some(Flight {
            carrier: carrier.clone(),
            flight_number: self.flight_number.clone(),
            segments: vec![Segment {
                departure_airport: request.origin.clone(),
                arrival_airport: request.destination.clone(),
                departure_time,
                arrival_time,
                fare_class: self.fare_class.clone(),
                operating_carrier: self
                    .operating_carrier
                    .as_deref()
                    .map(CarrierCode::new)
                    .unwrap_or_else(|| carrier.clone()),
            }],
            fares,
        })
    }
}

/// Weekend departures price higher, midweek lower, in percent.
fn weekday_factor(date: NaiveDate) -> i64 {
    100 + 5 * date.weekday().num_days_from_monday() as i64
}

/// Fixture-backed stand-in for the reservation backend, with simulated
/// latency and configurable outages.
pub struct FixtureCarrierSource {
    fixtures: FixtureSet,
    offset: FixedOffset,
    min_latency_ms: u64,
    max_latency_ms: u64,
    failing: HashSet<CarrierCode>,
}

impl FixtureCarrierSource {
    pub fn new(fixtures: FixtureSet) -> Self {
        let offset = FixedOffset::east_opt(fixtures.utc_offset_hours * 3600)
            .unwrap_or_else(|| Utc.fix());
        Self {
            fixtures,
            offset,
            min_latency_ms: 0,
            max_latency_ms: 0,
            failing: HashSet::new(),
        }
    }

    pub fn from_config(config: &MockConfig) -> Result<Self, FixtureError> {
        let raw = std::fs::read_to_string(&config.fixtures_path).map_err(|source| FixtureError::Io {
            path: config.fixtures_path.clone(),
            source,
        })?;
        let fixtures: FixtureSet = serde_json::from_str(&raw)?;

        Ok(Self::new(fixtures)
            .with_latency(config.min_latency_ms, config.max_latency_ms)
            .with_failing_carriers(config.failing_carriers.iter().map(|c| CarrierCode::new(c))))
    }

    pub fn with_latency(mut self, min_ms: u64, max_ms: u64) -> Self {
        self.min_latency_ms = min_ms.min(max_ms);
        self.max_latency_ms = max_ms.max(min_ms);
        self
    }

    pub fn with_failing_carriers(mut self, carriers: impl IntoIterator<Item = CarrierCode>) -> Self {
        self.failing.extend(carriers);
        self
    }

    fn latency(&self) -> std::time::Duration {
        let ms = if self.max_latency_ms > self.min_latency_ms {
            rand::thread_rng().gen_range(self.min_latency_ms..=self.max_latency_ms)
        } else {
            self.min_latency_ms
        };
        std::time::Duration::from_millis(ms)
    }
}

#[async_trait]
impl CarrierSource for FixtureCarrierSource {
    async fn search_by_carrier(
        &self,
        request: &SearchRequest,
        carrier: &CarrierCode,
    ) -> Result<Vec<Flight>, CarrierError> {
        let latency = self.latency();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        if self.failing.contains(carrier) {
            return Err(CarrierError::Unavailable(format!("{} fixture outage", carrier)));
        }

        let flights: Vec<Flight> = self
            .fixtures
            .carriers
            .get(carrier.as_str())
            .map(|templates| {
                templates
                    .iter()
                    .filter(|t| t.serves(&request.origin, &request.destination))
                    .filter_map(|t| t.materialise(carrier, request, &self.offset, &self.fixtures.currency))
                    .collect()
            })
            .unwrap_or_default();

        debug!(
            "Fixture carrier {} answered {}-{} on {} with {} flights after {:?}",
            carrier, request.origin, request.destination, request.date, flights.len(), latency
        );
        Ok(flights)
    }
}
