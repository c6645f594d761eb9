use serde::Serialize;
use uuid::Uuid;
use fareline_core::{CarrierCode, CarrierStatus, CoreError, CoreResult, Flight, SearchRequest};
use crate::aggregator::ResultAggregator;
use crate::query::CarrierOutcome;

/// Where a search stands, as the UI must present it.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SearchOutcome {
    /// Some carriers have not answered yet; zero flights here means nothing yet.
    Searching { settled: usize, total: usize },
    /// Every carrier answered and none had seats.
    NoAvailability,
    /// Every carrier failed.
    Failed,
    Available { count: usize },
}

impl SearchOutcome {
    pub fn is_complete(&self) -> bool {
        !matches!(self, SearchOutcome::Searching { .. })
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CarrierProgress {
    pub carrier: CarrierCode,
    pub status: CarrierStatus,
    pub flight_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Immutable view of a session handed to consumers after each settlement.
#[derive(Debug, Clone, Serialize)]
pub struct SearchSnapshot {
    pub session_id: Uuid,
    pub request: SearchRequest,
    /// Number of carriers settled when the snapshot was taken.
    pub sequence: usize,
    pub carriers: Vec<CarrierProgress>,
    pub flights: Vec<Flight>,
    pub outcome: SearchOutcome,
}

impl SearchSnapshot {
    pub fn is_complete(&self) -> bool {
        self.outcome.is_complete()
    }

    pub fn status_of(&self, carrier: &CarrierCode) -> Option<CarrierStatus> {
        self.carriers.iter().find(|p| &p.carrier == carrier).map(|p| p.status)
    }
}

/// One logical search: its request, each carrier's progress and the merged result.
#[derive(Debug)]
pub struct SearchSession {
    id: Uuid,
    request: SearchRequest,
    carriers: Vec<CarrierProgress>,
    flights: Vec<Flight>,
    settled: usize,
}

impl SearchSession {
    pub fn new(request: SearchRequest, carriers: &[CarrierCode]) -> Self {
        Self {
            id: Uuid::new_v4(),
            request,
            carriers: carriers
                .iter()
                .map(|carrier| CarrierProgress {
                    carrier: carrier.clone(),
                    status: CarrierStatus::Pending,
                    flight_count: 0,
                    error: None,
                })
                .collect(),
            flights: Vec::new(),
            settled: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn request(&self) -> &SearchRequest {
        &self.request
    }

    pub fn flights(&self) -> &[Flight] {
        &self.flights
    }

    /// Mark every carrier as in flight.
    pub fn start(&mut self) -> CoreResult<()> {
        for progress in &mut self.carriers {
            progress.status.advance(CarrierStatus::Loading)?;
        }
        Ok(())
    }

    /// Record one carrier's answer and fold its flights into the result.
    pub fn settle(&mut self, outcome: CarrierOutcome, aggregator: &ResultAggregator) -> CoreResult<()> {
        let status = outcome.status();
        let progress = self
            .carriers
            .iter_mut()
            .find(|p| p.carrier == outcome.carrier)
            .ok_or_else(|| CoreError::InternalError(format!("carrier {} is not part of this session", outcome.carrier)))?;
        progress.status.advance(status)?;
        self.settled += 1;

        match outcome.result {
            Ok(flights) => {
                progress.flight_count = flights.len();
                self.flights = aggregator.merge(&self.flights, flights, &self.request.passengers);
            }
            Err(e) => progress.error = Some(e.to_string()),
        }
        Ok(())
    }

    pub fn outcome(&self) -> SearchOutcome {
        let total = self.carriers.len();
        if self.carriers.iter().any(|p| !p.status.is_terminal()) {
            return SearchOutcome::Searching { settled: self.settled, total };
        }
        if !self.flights.is_empty() {
            SearchOutcome::Available { count: self.flights.len() }
        } else if total > 0 && self.carriers.iter().all(|p| p.status == CarrierStatus::Error) {
            SearchOutcome::Failed
        } else {
            SearchOutcome::NoAvailability
        }
    }

    pub fn is_complete(&self) -> bool {
        self.outcome().is_complete()
    }

    pub fn snapshot(&self) -> SearchSnapshot {
        SearchSnapshot {
            session_id: self.id,
            request: self.request.clone(),
            sequence: self.settled,
            carriers: self.carriers.clone(),
            flights: self.flights.clone(),
            outcome: self.outcome(),
        }
    }
}
