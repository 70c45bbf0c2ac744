//! Counter sink for the request pipeline.
//!
//! The orchestrator owns a sink handle and reports per-stage outcomes; no
//! component mutates a counter it does not own. The production sink emits
//! through the `metrics` facade, so whichever exporter the host process
//! installs (or none) decides where the counters go.

use std::fmt::Debug;

/// Pipeline stage a counter belongs to: the outer request path or the
/// cached fetch path beneath it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    GetForecast,
    GetForecastImplementation,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::GetForecast => "get_forecast",
            Stage::GetForecastImplementation => "get_forecast_implementation",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Success,
    Invalid,
    Error,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Invalid => "invalid",
            Outcome::Error => "error",
        }
    }
}

pub trait MetricsSink: Send + Sync + Debug {
    /// Increment `weather_service_<stage>_<outcome>_total{source}` by one.
    fn incr(&self, stage: Stage, outcome: Outcome, source: &str);
}

/// Sink backed by the `metrics` crate facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct FacadeMetrics;

impl MetricsSink for FacadeMetrics {
    fn incr(&self, stage: Stage, outcome: Outcome, source: &str) {
        let name = format!("weather_service_{}_{}_total", stage.as_str(), outcome.as_str());
        metrics::counter!(name, "source" => source.to_string()).increment(1);
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_and_outcome_names_match_counter_scheme() {
        assert_eq!(Stage::GetForecast.as_str(), "get_forecast");
        assert_eq!(Stage::GetForecastImplementation.as_str(), "get_forecast_implementation");
        assert_eq!(Outcome::Success.as_str(), "success");
        assert_eq!(Outcome::Invalid.as_str(), "invalid");
        assert_eq!(Outcome::Error.as_str(), "error");
    }

    #[test]
    fn recording_sink_counts_per_label() {
        let sink = testing::RecordingSink::default();
        sink.incr(Stage::GetForecast, Outcome::Success, "weather.gov");
        sink.incr(Stage::GetForecast, Outcome::Success, "weather.gov");
        sink.incr(Stage::GetForecast, Outcome::Invalid, "weather.gov");
        assert_eq!(sink.count(Stage::GetForecast, Outcome::Success, "weather.gov"), 2);
        assert_eq!(sink.count(Stage::GetForecast, Outcome::Invalid, "weather.gov"), 1);
        assert_eq!(sink.count(Stage::GetForecast, Outcome::Error, "weather.gov"), 0);
    }
}
