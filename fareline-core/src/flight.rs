use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use crate::carrier::CarrierCode;
use crate::search::{PassengerMix, PriceBasis};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PassengerType {
    Adult,
    Child,
    Infant,
}

/// Per-passenger price quoted by a carrier, in minor-less units of `currency` (e.g. VND).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PassengerFare {
    pub passenger_type: PassengerType,
    pub base_fare: i64,
    pub tax: i64,
    pub fee: i64,
    pub currency: String,
}

impl PassengerFare {
    pub fn total(&self) -> i64 {
        self.base_fare + self.tax + self.fee
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Segment {
    pub departure_airport: String,
    pub arrival_airport: String,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    pub fare_class: String,
    pub operating_carrier: CarrierCode,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Flight {
    pub carrier: CarrierCode,
    pub flight_number: String,
    pub segments: Vec<Segment>,
    pub fares: Vec<PassengerFare>,
}

/// What makes two quotes the same flight.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FlightIdentity {
    pub carrier: CarrierCode,
    pub flight_number: String,
    pub departure_time: Option<DateTime<Utc>>,
}

impl Flight {
    pub fn identity(&self) -> FlightIdentity {
        FlightIdentity {
            carrier: self.carrier.clone(),
            flight_number: self.flight_number.clone(),
            departure_time: self.departure_time(),
        }
    }

    pub fn departure_time(&self) -> Option<DateTime<Utc>> {
        self.segments.first().map(|s| s.departure_time)
    }

    pub fn arrival_time(&self) -> Option<DateTime<Utc>> {
        self.segments.last().map(|s| s.arrival_time)
    }

    pub fn fare(&self, passenger_type: PassengerType) -> Option<&PassengerFare> {
        self.fares.iter().find(|f| f.passenger_type == passenger_type)
    }

    pub fn currency(&self) -> Option<&str> {
        self.fare(PassengerType::Adult).map(|f| f.currency.as_str())
    }

    /// Base + tax + fee for one adult. Flights without an adult quote are unpriced.
    pub fn adult_total(&self) -> Option<i64> {
        self.fare(PassengerType::Adult).map(PassengerFare::total)
    }

    /// Whole-party price. Child and infant quotes fall back to the adult fare
    /// when the carrier omitted them.
    pub fn trip_total(&self, passengers: &PassengerMix) -> Option<i64> {
        let adult = self.adult_total()?;
        let child = self.fare(PassengerType::Child).map(PassengerFare::total).unwrap_or(adult);
        let infant = self.fare(PassengerType::Infant).map(PassengerFare::total).unwrap_or(adult);
        Some(
            adult * passengers.adults as i64
                + child * passengers.children as i64
                + infant * passengers.infants as i64,
        )
    }

    pub fn price(&self, basis: PriceBasis, passengers: &PassengerMix) -> Option<i64> {
        match basis {
            PriceBasis::AdultFare => self.adult_total(),
            PriceBasis::TripTotal => self.trip_total(passengers),
        }
    }
}
