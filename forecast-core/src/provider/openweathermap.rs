use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Number, Value};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::{
    model::{CanonicalForecast, HourRecord, Measurement},
    units,
};

use super::ForecastProvider;

const API_BASE: &str = "https://api.openweathermap.org";

/// openweathermap.org adapter: one onecall request, 1:1 hourly mapping.
///
/// The upstream already reports metric units, so fields carry fixed
/// canonical uoms with no conversion.
#[derive(Debug, Clone)]
pub struct OpenWeatherMapProvider {
    http: Client,
    base_url: String,
}

impl Default for OpenWeatherMapProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenWeatherMapProvider {
    pub fn new() -> Self {
        Self::with_base_url(API_BASE.to_string())
    }

    pub fn with_base_url(base_url: String) -> Self {
        Self { http: Client::new(), base_url }
    }
}

#[derive(Debug, Deserialize)]
struct OneCallResponse {
    hourly: Vec<HourlySample>,
}

/// Scalars stay `Number` so integer upstream values (e.g. `humidity: 80`)
/// pass through unchanged instead of being coerced to floats.
#[derive(Debug, Deserialize)]
struct HourlySample {
    dt: i64,
    temp: Option<Number>,
    feels_like: Option<Number>,
    dew_point: Option<Number>,
    humidity: Option<Number>,
    clouds: Option<Number>,
    wind_deg: Option<Number>,
    wind_speed: Option<Number>,
    wind_gust: Option<Number>,
    pop: Option<f64>,
    snow: Option<PrecipVolume>,
    rain: Option<PrecipVolume>,
    pressure: Option<Number>,
    visibility: Option<Number>,
    weather: Option<Vec<WeatherCondition>>,
}

#[derive(Debug, Deserialize)]
struct PrecipVolume {
    #[serde(rename = "1h")]
    one_hour: Option<Number>,
}

#[derive(Debug, Deserialize)]
struct WeatherCondition {
    description: Option<String>,
}

#[async_trait]
impl ForecastProvider for OpenWeatherMapProvider {
    fn source(&self) -> &'static str {
        "openweathermap.org"
    }

    fn required_parameters(&self) -> &'static [&'static str] {
        &["apikey"]
    }

    async fn fetch(
        &self,
        latitude: &str,
        longitude: &str,
        parameters: &BTreeMap<String, String>,
    ) -> Result<CanonicalForecast> {
        // presence already checked by the orchestrator
        let apikey = parameters.get("apikey").map(String::as_str).unwrap_or_default();

        let url = format!(
            "{}/data/3.0/onecall?appid={apikey}&lat={latitude}&lon={longitude}\
             &exclude=minutely,daily,current&units=metric",
            self.base_url
        );
        let mut output = CanonicalForecast::new(self.source(), latitude, longitude, url.clone());

        debug!("requesting openweathermap.org onecall forecast");
        let res = self
            .http
            .get(&url)
            .send()
            .await
            .context("Failed to send request to openweathermap.org (onecall)")?;

        let status = res.status();
        let body =
            res.text().await.context("Failed to read openweathermap.org response body")?;

        if !status.is_success() {
            warn!(%status, body = %truncate_body(&body), "openweathermap.org request failed");
            output.mark_http_failure(status.as_u16(), &url);
            return Ok(output);
        }

        let parsed: OneCallResponse =
            serde_json::from_str(&body).context("Failed to parse openweathermap.org JSON")?;

        for sample in &parsed.hourly {
            let Some(valid_time) = unix_to_utc(sample.dt) else {
                continue;
            };
            let key = units::output_date(valid_time, 0);
            output.data.insert(key, map_sample(sample));
        }

        output.mark_responded();
        Ok(output)
    }
}

/// Map one hourly sample into a canonical hour record. Present, non-null
/// fields only; each carries the provider's fixed unit.
fn map_sample(sample: &HourlySample) -> HourRecord {
    let mut hour = HourRecord::new();

    let measure = |value: &Number, uom: &str| Measurement {
        value: Value::Number(value.clone()),
        uom: Some(uom.to_string()),
    };

    if let Some(v) = &sample.temp {
        hour.insert("temperature".to_string(), measure(v, "celsius"));
    }
    if let Some(v) = &sample.feels_like {
        hour.insert("apparentTemperature".to_string(), measure(v, "celsius"));
    }
    if let Some(v) = &sample.dew_point {
        hour.insert("dewpoint".to_string(), measure(v, "celsius"));
    }
    if let Some(v) = &sample.humidity {
        hour.insert("relativeHumidity".to_string(), measure(v, "percent"));
    }
    if let Some(v) = &sample.clouds {
        hour.insert("skyCover".to_string(), measure(v, "percent"));
    }
    if let Some(v) = &sample.wind_deg {
        hour.insert("windDirection".to_string(), measure(v, "degrees"));
    }
    if let Some(v) = &sample.wind_speed {
        hour.insert("windSpeed".to_string(), measure(v, "kph"));
    }
    if let Some(v) = &sample.wind_gust {
        hour.insert("windGust".to_string(), measure(v, "kph"));
    }
    if let Some(v) = sample.pop {
        hour.insert(
            "probabilityOfPrecipitation".to_string(),
            Measurement::scalar(v * 100.0, "percent"),
        );
    }
    // rain is mapped after snow on purpose: when both report an amount for
    // the hour, rain overwrites. Downstream depends on this ordering.
    if let Some(v) = sample.snow.as_ref().and_then(|s| s.one_hour.as_ref()) {
        hour.insert("quantitativePrecipitation".to_string(), measure(v, "mm"));
    }
    if let Some(v) = sample.rain.as_ref().and_then(|r| r.one_hour.as_ref()) {
        hour.insert("quantitativePrecipitation".to_string(), measure(v, "mm"));
    }
    if let Some(v) = &sample.pressure {
        hour.insert("pressure".to_string(), measure(v, "millibars"));
    }
    if let Some(v) = &sample.visibility {
        hour.insert("visibility".to_string(), measure(v, "meters"));
    }
    if let Some(conditions) = &sample.weather {
        let mut description = String::new();
        for condition in conditions {
            if let Some(text) = &condition.description {
                description.push_str(text);
                description.push(' ');
            }
        }
        hour.insert("weather".to_string(), Measurement::text(description.trim()));
    }

    hour
}

fn unix_to_utc(ts: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0)
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() <= MAX {
        return body.to_string();
    }
    // upstream error pages are not ASCII-only; back up to a char boundary
    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
