use std::sync::Arc;
use fareline_core::{CarrierSource, Clock};
use fareline_search::{CarrierQuery, FareTrendCache, ResultAggregator, SearchObserver, SearchOrchestrator};
use fareline_store::app_config::{Config, TrendConfig};
use crate::metrics::Metrics;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<SearchOrchestrator>,
    pub trends: Arc<FareTrendCache>,
    pub trend: TrendConfig,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    /// Wire the engine over `source`; every carrier query, session and
    /// trend lookup reports into the shared metrics registry.
    pub fn build(config: &Config, source: Arc<dyn CarrierSource>, clock: Arc<dyn Clock>) -> anyhow::Result<Self> {
        let metrics = Arc::new(Metrics::new()?);
        let observer: Arc<dyn SearchObserver> = metrics.clone();

        let carriers = config.search.carrier_codes();
        let aggregator = ResultAggregator::new(config.search.price_basis);
        let query = Arc::new(
            CarrierQuery::new(source, config.search.carrier_timeout())
                .with_breakers(&carriers, config.breaker.failure_threshold, config.breaker.reset_timeout())
                .with_observer(observer.clone()),
        );

        let orchestrator = SearchOrchestrator::new(query.clone(), carriers.clone(), aggregator)
            .with_observer(observer.clone());
        let trends = FareTrendCache::new(query, carriers, aggregator, clock, config.trend.ttl())
            .with_observer(observer);

        Ok(Self {
            orchestrator: Arc::new(orchestrator),
            trends: Arc::new(trends),
            trend: config.trend.clone(),
            metrics,
        })
    }
}
