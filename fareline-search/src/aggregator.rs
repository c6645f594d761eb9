use std::cmp::Ordering;
use std::collections::HashSet;
use serde::{Deserialize, Serialize};
use fareline_core::{Flight, PassengerMix, PriceBasis};

/// A single price in one currency.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Fare {
    pub amount: i64,
    pub currency: String,
}

/// Merges per-carrier flight lists into one cheapest-first collection.
///
/// Holds no state of its own; the running collection belongs to the session.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultAggregator {
    basis: PriceBasis,
}

impl ResultAggregator {
    pub fn new(basis: PriceBasis) -> Self {
        Self { basis }
    }

    pub fn basis(&self) -> PriceBasis {
        self.basis
    }

    /// Union `incoming` into `current`, dropping flights already present
    /// (first write wins), and return the re-ranked collection.
    pub fn merge(&self, current: &[Flight], incoming: Vec<Flight>, passengers: &PassengerMix) -> Vec<Flight> {
        let mut seen: HashSet<_> = current.iter().map(Flight::identity).collect();
        let mut merged = current.to_vec();
        for flight in incoming {
            if seen.insert(flight.identity()) {
                merged.push(flight);
            }
        }
        self.rank(&mut merged, passengers);
        merged
    }

    /// Price ascending, then departure ascending, then carrier and flight
    /// number so that equal fares never swap between emissions. Unpriced
    /// flights sink to the end.
    pub fn rank(&self, flights: &mut [Flight], passengers: &PassengerMix) {
        flights.sort_by(|a, b| self.compare(a, b, passengers));
    }

    pub fn compare(&self, a: &Flight, b: &Flight, passengers: &PassengerMix) -> Ordering {
        let price_a = a.price(self.basis, passengers);
        let price_b = b.price(self.basis, passengers);
        last_if_none(price_a, price_b)
            .then_with(|| last_if_none(a.departure_time(), b.departure_time()))
            .then_with(|| a.carrier.cmp(&b.carrier))
            .then_with(|| a.flight_number.cmp(&b.flight_number))
    }

    pub fn cheapest<'a, I>(&self, flights: I, passengers: &PassengerMix) -> Option<Fare>
    where
        I: IntoIterator<Item = &'a Flight>,
    {
        flights
            .into_iter()
            .filter_map(|f| {
                let amount = f.price(self.basis, passengers)?;
                Some(Fare { amount, currency: f.currency().unwrap_or_default().to_string() })
            })
            .min_by_key(|fare| fare.amount)
    }
}

fn last_if_none<T: Ord>(a: Option<T>, b: Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
