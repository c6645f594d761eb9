//! Scripted carrier doubles shared by the engine's unit tests.

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use fareline_core::{
    CarrierCode, CarrierError, CarrierSource, Flight, PassengerFare, PassengerMix, PassengerType,
    SearchRequest, Segment,
};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Clone)]
pub(crate) enum Script {
    Flights(Vec<Flight>),
    Fail,
    Hang,
    Panic,
}

pub(crate) struct ScriptedSource {
    scripts: HashMap<CarrierCode, (Duration, Script)>,
    calls: Mutex<Vec<(CarrierCode, NaiveDate)>>,
}

impl ScriptedSource {
    pub(crate) fn new() -> Self {
        Self { scripts: HashMap::new(), calls: Mutex::new(Vec::new()) }
    }

    pub(crate) fn with(mut self, carrier: &str, delay_ms: u64, script: Script) -> Self {
        self.scripts
            .insert(CarrierCode::new(carrier), (Duration::from_millis(delay_ms), script));
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub(crate) fn calls_for(&self, carrier: &str) -> usize {
        let code = CarrierCode::new(carrier);
        self.calls.lock().unwrap().iter().filter(|(c, _)| *c == code).count()
    }
}

#[async_trait]
impl CarrierSource for ScriptedSource {
    async fn search_by_carrier(
        &self,
        request: &SearchRequest,
        carrier: &CarrierCode,
    ) -> Result<Vec<Flight>, CarrierError> {
        self.calls.lock().unwrap().push((carrier.clone(), request.date));
        let (delay, script) = self
            .scripts
            .get(carrier)
            .cloned()
            .unwrap_or((Duration::ZERO, Script::Flights(vec![])));
        tokio::time::sleep(delay).await;
        match script {
            Script::Flights(flights) => Ok(flights),
            Script::Fail => Err(CarrierError::Unavailable(format!("{} returned 502", carrier))),
            Script::Hang => std::future::pending().await,
            Script::Panic => panic!("{} source crashed", carrier),
        }
    }
}

pub(crate) fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 11, 2).unwrap()
}

pub(crate) fn request() -> SearchRequest {
    SearchRequest::new("SGN", "HAN", date(), PassengerMix::default())
}

pub(crate) fn carriers(codes: &[&str]) -> Vec<CarrierCode> {
    codes.iter().map(|c| CarrierCode::new(c)).collect()
}

/// One-segment SGN-HAN flight whose adult fare totals `total`.
pub(crate) fn flight(carrier: &str, number: &str, total: i64, hour: u32) -> Flight {
    let departure_time = Utc.with_ymd_and_hms(2026, 11, 2, hour, 0, 0).unwrap();
    Flight {
        carrier: CarrierCode::new(carrier),
        flight_number: number.to_string(),
        segments: vec![Segment {
            departure_airport: "SGN".into(),
            arrival_airport: "HAN".into(),
            departure_time,
            arrival_time: departure_time + chrono::Duration::minutes(130),
            fare_class: "Y".into(),
            operating_carrier: CarrierCode::new(carrier),
        }],
        fares: vec![PassengerFare {
            passenger_type: PassengerType::Adult,
            base_fare: total - 100_000,
            tax: 80_000,
            fee: 20_000,
            currency: "VND".into(),
        }],
    }
}
