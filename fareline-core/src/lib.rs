pub mod search;
pub mod flight;
pub mod carrier;
pub mod supplier;
pub mod clock;

pub use carrier::{CarrierCode, CarrierError, CarrierStatus};
pub use clock::{Clock, ManualClock, SystemClock};
pub use flight::{Flight, FlightIdentity, PassengerFare, PassengerType, Segment};
pub use search::{CabinClass, PassengerMix, PriceBasis, SearchRequest, TrendKey};
pub use supplier::CarrierSource;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
