use std::time::Duration;
use serde::Serialize;
use fareline_core::{CarrierCode, CarrierStatus};
use crate::session::SearchOutcome;

/// How a trend-cache lookup was answered.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TrendLookup {
    Hit,
    Miss,
    Expired,
    Coalesced,
    Past,
}

impl TrendLookup {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendLookup::Hit => "hit",
            TrendLookup::Miss => "miss",
            TrendLookup::Expired => "expired",
            TrendLookup::Coalesced => "coalesced",
            TrendLookup::Past => "past",
        }
    }
}

/// Hook for metrics. Every method defaults to doing nothing.
pub trait SearchObserver: Send + Sync {
    fn on_carrier_settled(&self, _carrier: &CarrierCode, _status: CarrierStatus, _elapsed: Duration) {}

    fn on_session_finished(&self, _outcome: &SearchOutcome) {}

    fn on_trend_lookup(&self, _lookup: TrendLookup) {}
}

pub struct NoopObserver;

impl SearchObserver for NoopObserver {}
