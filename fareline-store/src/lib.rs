pub mod app_config;
pub mod fixture_source;

pub use app_config::Config;
pub use fixture_source::{FixtureCarrierSource, FixtureError, FixtureSet};
