use crate::{
    cache::{FileCache, MemoryCache, PhaseCache},
    calculator::TimeOfDayCalculator,
    clock::{Clock, SystemClock},
    config::AppConfig,
    context::{ContextBuilder, PhaseContext},
    ephemeris::Ephemeris,
    error::Result,
};
use prometheus::{opts, IntCounterVec, Registry};
use std::sync::Arc;
use tracing::info;

/// Holds the application state.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub metrics: Metrics,
    pub calculator: Arc<TimeOfDayCalculator<Ephemeris>>,
    pub context: ContextBuilder,
}

impl AppState {
    /// Creates `AppState` from config and metrics.
    pub fn new(config: AppConfig, metrics: Metrics) -> Result<AppState> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let ephemeris = Ephemeris::new(
            &config.api_url,
            config.latitude,
            config.longitude,
            config.request_timeout(),
        )?;

        let cache: Arc<dyn PhaseCache> = match &config.cache_path {
            Some(path) => {
                let cache = FileCache::new(path, clock.clone());
                info!(path = ?cache.path(), "persisting day phases to file");
                Arc::new(cache)
            }
            None => Arc::new(MemoryCache::new(clock.clone())),
        };

        let calculator = TimeOfDayCalculator::new(ephemeris, cache, clock, config.cache_ttl());
        let context = ContextBuilder::new(&config.time_zone, &config.time_format)?;

        Ok(AppState {
            config,
            metrics,
            calculator: Arc::new(calculator),
            context,
        })
    }

    /// Returns the template context for the current day phase.
    pub async fn phase_context(&self, force_refresh: bool) -> Result<PhaseContext> {
        let phase = self.calculator.get_or_compute(force_refresh).await?;

        self.metrics
            .phase_requests
            .with_label_values(&[phase.phase_label().as_str()])
            .inc();

        self.context.build(&phase)
    }
}

/// Container type for all custom application metrics.
#[derive(Clone, Debug)]
pub struct Metrics {
    /// Counter for the total number of phase requests by resulting phase label.
    pub phase_requests: IntCounterVec,
}

impl Metrics {
    /// Creates metrics using the given namespace and registers them to the prometheus registry.
    pub fn new(namespace: &str, registry: &Registry) -> Result<Metrics> {
        let phase_requests = IntCounterVec::new(
            opts!("phase_requests_total", "Total number of day phase requests").namespace(namespace),
            &["phase"],
        )?;

        registry.register(Box::new(phase_requests.clone()))?;

        Ok(Metrics { phase_requests })
    }
}
