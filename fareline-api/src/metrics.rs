use std::time::Duration;
use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    Json,
};
use fareline_core::{CarrierCode, CarrierStatus};
use fareline_search::{SearchObserver, SearchOutcome, TrendLookup};
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use serde_json::json;
use crate::error::AppError;
use crate::state::AppState;

/// Prometheus collectors fed by the search engine's observer hook.
pub struct Metrics {
    registry: Registry,
    carrier_responses: IntCounterVec,
    carrier_latency: HistogramVec,
    sessions: IntCounterVec,
    trend_lookups: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("fareline".into()), None)?;

        let carrier_responses = IntCounterVec::new(
            Opts::new("carrier_responses_total", "Carrier queries by settled status"),
            &["carrier", "status"],
        )?;
        let carrier_latency = HistogramVec::new(
            HistogramOpts::new("carrier_latency_seconds", "Time for a carrier query to settle")
                .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0]),
            &["carrier"],
        )?;
        let sessions = IntCounterVec::new(
            Opts::new("search_sessions_total", "Completed search sessions by outcome"),
            &["outcome"],
        )?;
        let trend_lookups = IntCounterVec::new(
            Opts::new("trend_lookups_total", "Trend cache lookups by result"),
            &["lookup"],
        )?;

        registry.register(Box::new(carrier_responses.clone()))?;
        registry.register(Box::new(carrier_latency.clone()))?;
        registry.register(Box::new(sessions.clone()))?;
        registry.register(Box::new(trend_lookups.clone()))?;

        Ok(Self { registry, carrier_responses, carrier_latency, sessions, trend_lookups })
    }

    pub fn render(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

fn status_label(status: CarrierStatus) -> &'static str {
    match status {
        CarrierStatus::Pending => "pending",
        CarrierStatus::Loading => "loading",
        CarrierStatus::Success => "success",
        CarrierStatus::Empty => "empty",
        CarrierStatus::Error => "error",
    }
}

fn outcome_label(outcome: &SearchOutcome) -> &'static str {
    match outcome {
        SearchOutcome::Searching { .. } => "searching",
        SearchOutcome::NoAvailability => "no_availability",
        SearchOutcome::Failed => "failed",
        SearchOutcome::Available { .. } => "available",
    }
}

impl SearchObserver for Metrics {
    fn on_carrier_settled(&self, carrier: &CarrierCode, status: CarrierStatus, elapsed: Duration) {
        self.carrier_responses
            .with_label_values(&[carrier.as_str(), status_label(status)])
            .inc();
        self.carrier_latency
            .with_label_values(&[carrier.as_str()])
            .observe(elapsed.as_secs_f64());
    }

    fn on_session_finished(&self, outcome: &SearchOutcome) {
        self.sessions.with_label_values(&[outcome_label(outcome)]).inc();
    }

    fn on_trend_lookup(&self, lookup: TrendLookup) {
        self.trend_lookups.with_label_values(&[lookup.as_str()]).inc();
    }
}

/// GET /metrics
pub async fn export(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let body = state.metrics.render()?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body))
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "carriers": state.orchestrator.carriers(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observer_feeds_counters() {
        let metrics = Metrics::new().unwrap();
        let vn = CarrierCode::new("VN");
        metrics.on_carrier_settled(&vn, CarrierStatus::Success, Duration::from_millis(300));
        metrics.on_carrier_settled(&vn, CarrierStatus::Error, Duration::from_secs(20));
        metrics.on_session_finished(&SearchOutcome::NoAvailability);
        metrics.on_trend_lookup(TrendLookup::Coalesced);

        let text = metrics.render().unwrap();
        assert!(text.contains(r#"fareline_carrier_responses_total{carrier="VN",status="success"} 1"#));
        assert!(text.contains(r#"fareline_carrier_responses_total{carrier="VN",status="error"} 1"#));
        assert!(text.contains(r#"fareline_search_sessions_total{outcome="no_availability"} 1"#));
        assert!(text.contains(r#"fareline_trend_lookups_total{lookup="coalesced"} 1"#));
    }
}
