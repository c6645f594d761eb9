use serde::Deserialize;
use std::env;
use std::time::Duration;
use fareline_core::{CarrierCode, PriceBasis};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub search: SearchConfig,
    #[serde(default)]
    pub trend: TrendConfig,
    #[serde(default)]
    pub breaker: BreakerConfig,
    pub mock: MockConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    /// Carriers fanned out to, in display order.
    pub carriers: Vec<String>,
    #[serde(default = "default_carrier_timeout")]
    pub carrier_timeout_seconds: u64,
    #[serde(default)]
    pub price_basis: PriceBasis,
}

fn default_carrier_timeout() -> u64 { 20 }

impl SearchConfig {
    pub fn carrier_codes(&self) -> Vec<CarrierCode> {
        self.carriers.iter().map(|c| CarrierCode::new(c)).collect()
    }

    pub fn carrier_timeout(&self) -> Duration {
        Duration::from_secs(self.carrier_timeout_seconds)
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            carriers: ["VN", "VJ", "QH", "BL", "VU"].iter().map(|c| c.to_string()).collect(),
            carrier_timeout_seconds: default_carrier_timeout(),
            price_basis: PriceBasis::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TrendConfig {
    pub ttl_seconds: u64,
    pub window_days: u32,
    pub shift_days: u32,
}

impl TrendConfig {
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.ttl_seconds as i64)
    }
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self { ttl_seconds: 30 * 60, window_days: 7, shift_days: 3 }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BreakerConfig {
    pub failure_threshold: usize,
    pub reset_timeout_seconds: u64,
}

impl BreakerConfig {
    pub fn reset_timeout(&self) -> Duration {
        Duration::from_secs(self.reset_timeout_seconds)
    }
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self { failure_threshold: 5, reset_timeout_seconds: 30 }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct MockConfig {
    pub fixtures_path: String,
    #[serde(default)]
    pub min_latency_ms: u64,
    #[serde(default)]
    pub max_latency_ms: u64,
    #[serde(default)]
    pub failing_carriers: Vec<String>,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides are optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Untracked developer overrides
            .add_source(config::File::with_name("config/local").required(false))
            // Eg.. `FARELINE__SERVER__PORT=8081`
            .add_source(config::Environment::with_prefix("FARELINE").separator("__"))
            .build()?;

        s.try_deserialize()
    }

    pub fn from_toml(source: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}
