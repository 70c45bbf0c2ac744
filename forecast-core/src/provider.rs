use crate::{
    model::CanonicalForecast,
    provider::{openweathermap::OpenWeatherMapProvider, weathergov::WeatherGovProvider},
};
use async_trait::async_trait;
use std::{collections::BTreeMap, convert::TryFrom, fmt::Debug};

pub mod openweathermap;
pub mod weathergov;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    WeatherGov,
    OpenWeatherMap,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::WeatherGov => "weathergov",
            ProviderId::OpenWeatherMap => "openweathermap",
        }
    }

    pub const fn all() -> &'static [ProviderId] {
        &[ProviderId::WeatherGov, ProviderId::OpenWeatherMap]
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "weathergov" => Ok(ProviderId::WeatherGov),
            "openweathermap" => Ok(ProviderId::OpenWeatherMap),
            _ => Err(anyhow::anyhow!(
                "Unknown provider '{value}'. Supported providers: weathergov, openweathermap."
            )),
        }
    }
}

/// A forecast source that maps its upstream payload into the canonical
/// schema.
///
/// `fetch` receives coordinates already rounded by the orchestrator and a
/// parameter map already checked to contain [`required_parameters`]; values
/// are not validated. A non-2xx upstream response is NOT an error: the
/// adapter returns a degraded forecast with `status.success = "false"` and
/// empty data. Every URL it attempts must land in `metadata.request_urls`
/// in call order.
///
/// [`required_parameters`]: ForecastProvider::required_parameters
#[async_trait]
pub trait ForecastProvider: Send + Sync + Debug {
    fn source(&self) -> &'static str;

    fn required_parameters(&self) -> &'static [&'static str];

    async fn fetch(
        &self,
        latitude: &str,
        longitude: &str,
        parameters: &BTreeMap<String, String>,
    ) -> anyhow::Result<CanonicalForecast>;
}

/// Construct the adapter for an explicit ProviderId.
pub fn provider_for(id: ProviderId) -> Box<dyn ForecastProvider> {
    match id {
        ProviderId::WeatherGov => Box::new(WeatherGovProvider::new()),
        ProviderId::OpenWeatherMap => Box::new(OpenWeatherMapProvider::new()),
    }
}
