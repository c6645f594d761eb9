use async_trait::async_trait;
use crate::carrier::{CarrierCode, CarrierError};
use crate::flight::Flight;
use crate::search::SearchRequest;

/// Remote reservation backend, queried one carrier at a time.
#[async_trait]
pub trait CarrierSource: Send + Sync {
    /// Fares `carrier` offers for `request`. An empty list means no availability,
    /// which is a valid answer and distinct from an error.
    async fn search_by_carrier(
        &self,
        request: &SearchRequest,
        carrier: &CarrierCode,
    ) -> Result<Vec<Flight>, CarrierError>;
}
