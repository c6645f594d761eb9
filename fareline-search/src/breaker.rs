use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CircuitState {
    Closed,   // Normal operation
    Open,     // Carrier keeps failing, skip it
    HalfOpen, // One probe call decides
}

#[derive(Debug)]
struct BreakerState {
    circuit: CircuitState,
    consecutive_failures: usize,
    opened_at: Option<Instant>,
    /// When the outstanding half-open probe was let through.
    probe_started: Option<Instant>,
}

/// Consecutive-failure breaker guarding one carrier.
///
/// After `reset_timeout` in the open state exactly one call is let through.
/// Its result closes or reopens the circuit. A probe that never reports back
/// (its session was cancelled) is given up on after another `reset_timeout`.
#[derive(Debug)]
pub struct CircuitBreaker {
    carrier: String,
    failure_threshold: usize,
    reset_timeout: Duration,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(carrier: &str, failure_threshold: usize, reset_timeout: Duration) -> Self {
        Self {
            carrier: carrier.to_string(),
            failure_threshold: failure_threshold.max(1),
            reset_timeout,
            state: Mutex::new(BreakerState {
                circuit: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                probe_started: None,
            }),
        }
    }

    pub async fn current(&self) -> CircuitState {
        self.state.lock().await.circuit
    }

    pub async fn consecutive_failures(&self) -> usize {
        self.state.lock().await.consecutive_failures
    }

    /// Whether a call to the carrier may go out right now.
    pub async fn check(&self) -> bool {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        match state.circuit {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let cooled = state
                    .opened_at
                    .map_or(true, |opened| now.duration_since(opened) >= self.reset_timeout);
                if cooled {
                    info!("Carrier {} breaker half-open, sending one probe", self.carrier);
                    state.circuit = CircuitState::HalfOpen;
                    state.probe_started = Some(now);
                }
                cooled
            }
            CircuitState::HalfOpen => {
                let abandoned = state
                    .probe_started
                    .map_or(true, |started| now.duration_since(started) >= self.reset_timeout);
                if abandoned {
                    state.probe_started = Some(now);
                }
                abandoned
            }
        }
    }

    pub async fn record_success(&self) {
        let mut state = self.state.lock().await;
        if state.circuit != CircuitState::Closed {
            info!("Carrier {} breaker closed again", self.carrier);
        }
        state.circuit = CircuitState::Closed;
        state.consecutive_failures = 0;
        state.opened_at = None;
        state.probe_started = None;
    }

    pub async fn record_failure(&self) {
        let mut state = self.state.lock().await;
        state.consecutive_failures += 1;

        let trips = match state.circuit {
            CircuitState::HalfOpen => true,
            CircuitState::Closed => state.consecutive_failures >= self.failure_threshold,
            CircuitState::Open => false,
        };
        if trips {
            error!(
                "Carrier {} breaker open after {} consecutive failures",
                self.carrier, state.consecutive_failures
            );
            state.circuit = CircuitState::Open;
            state.opened_at = Some(Instant::now());
            state.probe_started = None;
        }
    }
}
