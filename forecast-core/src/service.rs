//! Request orchestrator: the provider-agnostic lifecycle around one adapter.
//!
//! validate parameters → normalize coordinates → cache-or-fetch → validate
//! output → instrument. Validation never gates delivery; only missing
//! parameters and unexpected internal failures surface as errors.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::warn;

use crate::{
    cache::{CacheKey, ForecastCache},
    error::ForecastError,
    metrics::{MetricsSink, Outcome, Stage},
    model::CanonicalForecast,
    provider::ForecastProvider,
    validate,
};

/// Round raw coordinates to the 2-decimal strings used everywhere downstream.
/// Idempotent, which keeps cache keys stable for nearby repeated queries.
pub fn normalize_coordinates(latitude: f64, longitude: f64) -> (String, String) {
    (format!("{latitude:.2}"), format!("{longitude:.2}"))
}

/// One service instance per provider. Holds the query cache and a
/// constructor-injected metrics sink; nothing here is process-global.
#[derive(Debug)]
pub struct ForecastService {
    provider: Box<dyn ForecastProvider>,
    cache: ForecastCache,
    metrics: Arc<dyn MetricsSink>,
}

impl ForecastService {
    pub fn new(provider: Box<dyn ForecastProvider>, metrics: Arc<dyn MetricsSink>) -> Self {
        Self::with_cache(provider, ForecastCache::new(), metrics)
    }

    pub fn with_cache(
        provider: Box<dyn ForecastProvider>,
        cache: ForecastCache,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self { provider, cache, metrics }
    }

    pub fn source(&self) -> &'static str {
        self.provider.source()
    }

    /// Fetch the normalized forecast for raw coordinates.
    ///
    /// Required parameters are checked before anything else; a missing one
    /// fails without touching the cache or the network. A degraded upstream
    /// response is returned as a `success = "false"` forecast, not an error.
    pub async fn get_forecast(
        &self,
        latitude: f64,
        longitude: f64,
        parameters: &BTreeMap<String, String>,
    ) -> Result<Arc<CanonicalForecast>, ForecastError> {
        for required in self.provider.required_parameters() {
            if !parameters.contains_key(*required) {
                return Err(ForecastError::MissingParameter((*required).to_string()));
            }
        }

        match self.get_forecast_inner(latitude, longitude, parameters).await {
            Ok(forecast) => Ok(forecast),
            Err(err) => {
                self.metrics.incr(Stage::GetForecast, Outcome::Error, self.source());
                Err(ForecastError::Internal(err))
            }
        }
    }

    async fn get_forecast_inner(
        &self,
        latitude: f64,
        longitude: f64,
        parameters: &BTreeMap<String, String>,
    ) -> anyhow::Result<Arc<CanonicalForecast>> {
        let (lat, lon) = normalize_coordinates(latitude, longitude);
        let key = CacheKey::new(self.source(), &lat, &lon, parameters);

        let forecast = self
            .cache
            .get_or_fetch(key, || self.fetch_instrumented(lat.clone(), lon.clone(), parameters))
            .await?;

        let report = validate::validate(&serde_json::to_value(forecast.as_ref())?);
        self.metrics.incr(Stage::GetForecast, Outcome::Success, self.source());
        if !report.is_valid {
            self.metrics.incr(Stage::GetForecast, Outcome::Invalid, self.source());
        }

        Ok(forecast)
    }

    /// The cached fetch path: adapter fetch plus its own validation and
    /// counters. Runs only on cache misses.
    async fn fetch_instrumented(
        &self,
        latitude: String,
        longitude: String,
        parameters: &BTreeMap<String, String>,
    ) -> anyhow::Result<CanonicalForecast> {
        let source = self.source();
        let stage = Stage::GetForecastImplementation;

        let result: anyhow::Result<CanonicalForecast> = async {
            let forecast = self.provider.fetch(&latitude, &longitude, parameters).await?;
            let report = validate::validate(&serde_json::to_value(&forecast)?);
            self.metrics.incr(stage, Outcome::Success, source);
            if !report.is_valid {
                warn!(source, errors = ?report.errors, "adapter produced non-conforming output");
                self.metrics.incr(stage, Outcome::Invalid, source);
            }
            Ok(forecast)
        }
        .await;

        if result.is_err() {
            self.metrics.incr(stage, Outcome::Error, source);
        }
        result
    }
}
