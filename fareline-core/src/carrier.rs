use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use crate::{CoreError, CoreResult};

/// IATA two-character airline designator (VN, VJ, QH, ...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct CarrierCode(String);

impl CarrierCode {
    pub fn new(code: &str) -> Self {
        Self(code.trim().to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CarrierCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CarrierCode {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

/// Progress of one carrier within one search session.
///
/// Moves forward only: `Pending -> Loading -> {Success | Empty | Error}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CarrierStatus {
    Pending,
    Loading,
    Success,
    Empty,
    Error,
}

impl CarrierStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CarrierStatus::Success | CarrierStatus::Empty | CarrierStatus::Error)
    }

    pub fn can_advance_to(&self, next: CarrierStatus) -> bool {
        match (self, next) {
            (CarrierStatus::Pending, CarrierStatus::Loading) => true,
            (CarrierStatus::Loading, next) => next.is_terminal(),
            _ => false,
        }
    }

    pub fn advance(&mut self, next: CarrierStatus) -> CoreResult<()> {
        if !self.can_advance_to(next) {
            return Err(CoreError::InternalError(format!(
                "illegal carrier status transition {:?} -> {:?}",
                self, next
            )));
        }
        *self = next;
        Ok(())
    }

    /// Terminal status for a settled query.
    pub fn settled<T>(result: &Result<Vec<T>, CarrierError>) -> Self {
        match result {
            Ok(flights) if flights.is_empty() => CarrierStatus::Empty,
            Ok(_) => CarrierStatus::Success,
            Err(_) => CarrierStatus::Error,
        }
    }
}

/// Why a single carrier produced no answer. Never fatal to a search.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CarrierError {
    #[error("Carrier unavailable: {0}")]
    Unavailable(String),
    #[error("Carrier did not answer within {0:?}")]
    Timeout(Duration),
    #[error("Circuit open for carrier {0}")]
    CircuitOpen(CarrierCode),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_moves_forward_only() {
        let mut status = CarrierStatus::Pending;
        assert!(status.advance(CarrierStatus::Success).is_err());
        status.advance(CarrierStatus::Loading).unwrap();
        status.advance(CarrierStatus::Empty).unwrap();
        assert!(status.is_terminal());
        assert!(status.advance(CarrierStatus::Loading).is_err());
        assert!(status.advance(CarrierStatus::Success).is_err());
        assert_eq!(status, CarrierStatus::Empty);
    }

    #[test]
    fn test_settled_distinguishes_empty_from_error() {
        let empty: Result<Vec<u8>, CarrierError> = Ok(vec![]);
        let some: Result<Vec<u8>, CarrierError> = Ok(vec![1]);
        let failed: Result<Vec<u8>, CarrierError> = Err(CarrierError::Unavailable("502".into()));
        assert_eq!(CarrierStatus::settled(&empty), CarrierStatus::Empty);
        assert_eq!(CarrierStatus::settled(&some), CarrierStatus::Success);
        assert_eq!(CarrierStatus::settled(&failed), CarrierStatus::Error);
    }

    #[test]
    fn test_carrier_code_serializes_as_string() {
        let code = CarrierCode::new("vj");
        assert_eq!(serde_json::to_string(&code).unwrap(), "\"VJ\"");
        assert_eq!(serde_json::to_string(&CarrierStatus::Loading).unwrap(), "\"loading\"");
    }
}
