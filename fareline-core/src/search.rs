use serde::{Deserialize, Serialize};
use chrono::{Duration, NaiveDate};
use crate::{CoreError, CoreResult};

/// Upper bound on seats a single booking may request.
pub const MAX_PASSENGERS: u32 = 9;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CabinClass {
    #[default]
    Economy,
    PremiumEconomy,
    Business,
    First,
}

/// Which fare the engine ranks and caches by.
///
/// Carriers quote per passenger type; the storefront historically compares
/// the adult fare alone even when children or infants travel.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PriceBasis {
    #[default]
    AdultFare,
    TripTotal,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct PassengerMix {
    pub adults: u32,
    #[serde(default)]
    pub children: u32,
    #[serde(default)]
    pub infants: u32,
}

impl PassengerMix {
    pub fn new(adults: u32, children: u32, infants: u32) -> Self {
        Self { adults, children, infants }
    }

    pub fn total(&self) -> u32 {
        self.adults + self.children + self.infants
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.adults == 0 {
            return Err(CoreError::ValidationError("at least one adult is required".into()));
        }
        if self.infants > self.adults {
            return Err(CoreError::ValidationError(format!(
                "{} infants exceed {} adults",
                self.infants, self.adults
            )));
        }
        if self.total() > MAX_PASSENGERS {
            return Err(CoreError::ValidationError(format!(
                "{} passengers exceed the limit of {}",
                self.total(),
                MAX_PASSENGERS
            )));
        }
        Ok(())
    }
}

impl Default for PassengerMix {
    fn default() -> Self {
        Self::new(1, 0, 0)
    }
}

/// A one-way search for a single calendar day.
///
/// Equality covers every field, so a request doubles as a coalescing key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SearchRequest {
    pub origin: String,
    pub destination: String,
    pub date: NaiveDate, // Calendar day only, carriers resolve local times
    #[serde(flatten)]
    pub passengers: PassengerMix,
    #[serde(default)]
    pub cabin_class: CabinClass,
}

impl SearchRequest {
    pub fn new(origin: &str, destination: &str, date: NaiveDate, passengers: PassengerMix) -> Self {
        Self {
            origin: origin.trim().to_ascii_uppercase(),
            destination: destination.trim().to_ascii_uppercase(),
            date,
            passengers,
            cabin_class: CabinClass::default(),
        }
    }

    pub fn with_cabin(mut self, cabin_class: CabinClass) -> Self {
        self.cabin_class = cabin_class;
        self
    }

    pub fn validate(&self) -> CoreResult<()> {
        validate_airport(&self.origin)?;
        validate_airport(&self.destination)?;
        if self.origin == self.destination {
            return Err(CoreError::ValidationError(format!(
                "origin and destination are both {}",
                self.origin
            )));
        }
        self.passengers.validate()
    }

    pub fn trend_key(&self) -> TrendKey {
        TrendKey {
            origin: self.origin.clone(),
            destination: self.destination.clone(),
            date: self.date,
            passengers: self.passengers,
        }
    }
}

fn validate_airport(code: &str) -> CoreResult<()> {
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_uppercase()) {
        Ok(())
    } else {
        Err(CoreError::ValidationError(format!("invalid airport code '{}'", code)))
    }
}

/// Cache key for the cheapest fare of a route on one day. Cabin is not part
/// of the key; trend lookups always price the default cabin.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct TrendKey {
    pub origin: String,
    pub destination: String,
    pub date: NaiveDate,
    #[serde(flatten)]
    pub passengers: PassengerMix,
}

impl TrendKey {
    pub fn on(&self, date: NaiveDate) -> Self {
        Self { date, ..self.clone() }
    }

    pub fn shifted(&self, days: i64) -> Self {
        self.on(self.date + Duration::days(days))
    }

    pub fn to_request(&self) -> SearchRequest {
        SearchRequest {
            origin: self.origin.clone(),
            destination: self.destination.clone(),
            date: self.date,
            passengers: self.passengers,
            cabin_class: CabinClass::default(),
        }
    }
}
