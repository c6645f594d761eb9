pub mod observer;
pub mod breaker;
pub mod query;
pub mod aggregator;
pub mod session;
pub mod orchestrator;
pub mod trend_cache;
pub mod trend_strip;

#[cfg(test)]
pub(crate) mod testing;

pub use observer::{NoopObserver, SearchObserver, TrendLookup};
pub use breaker::{CircuitBreaker, CircuitState};
pub use query::{CarrierOutcome, CarrierQuery, CarrierTask};
pub use aggregator::{Fare, ResultAggregator};
pub use session::{CarrierProgress, SearchOutcome, SearchSession, SearchSnapshot};
pub use orchestrator::{SearchOrchestrator, SearchSubscription, SessionHandle};
pub use trend_cache::{FareTrendCache, TrendPrice};
pub use trend_strip::{CellPrice, PriceTrendStrip, TrendCell};
