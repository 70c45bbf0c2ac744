use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::{
    model::{CanonicalForecast, HourRecord, Measurement},
    units, validate,
};

use super::ForecastProvider;

const API_BASE: &str = "https://api.weather.gov";

/// weather.gov adapter: interval-expansion mapping.
///
/// Two upstream calls per fetch: `/points/{lat},{lon}` resolves the grid
/// location, then the returned `forecastGridData` URL carries the raw grid
/// properties. Each property value covers an interval (`start/PnDTnH`) that
/// is expanded into discrete hourly records.
#[derive(Debug, Clone)]
pub struct WeatherGovProvider {
    http: Client,
    base_url: String,
}

impl Default for WeatherGovProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl WeatherGovProvider {
    pub fn new() -> Self {
        Self::with_base_url(API_BASE.to_string())
    }

    pub fn with_base_url(base_url: String) -> Self {
        Self { http: Client::new(), base_url }
    }
}

#[derive(Debug, Deserialize)]
struct PointsResponse {
    properties: PointsProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PointsProperties {
    forecast_grid_data: String,
}

#[derive(Debug, Deserialize)]
struct GridResponse {
    properties: serde_json::Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct GridProperty {
    uom: Option<String>,
    values: Option<Vec<GridInterval>>,
}

#[derive(Debug, Deserialize)]
struct GridInterval {
    #[serde(rename = "validTime")]
    valid_time: String,
    /// Scalar for most fields; an array of condition objects for `weather`.
    value: Value,
}

#[async_trait]
impl ForecastProvider for WeatherGovProvider {
    fn source(&self) -> &'static str {
        "weather.gov"
    }

    fn required_parameters(&self) -> &'static [&'static str] {
        &[]
    }

    async fn fetch(
        &self,
        latitude: &str,
        longitude: &str,
        _parameters: &BTreeMap<String, String>,
    ) -> Result<CanonicalForecast> {
        let points_url = format!("{}/points/{latitude},{longitude}", self.base_url);
        let mut output =
            CanonicalForecast::new(self.source(), latitude, longitude, points_url.clone());

        debug!(url = %points_url, "requesting weather.gov grid location");
        let res = self
            .http
            .get(&points_url)
            .send()
            .await
            .context("Failed to send request to weather.gov (points)")?;

        let status = res.status();
        let body = res.text().await.context("Failed to read weather.gov points response body")?;

        if !status.is_success() {
            warn!(%status, body = %truncate_body(&body), "weather.gov points request failed");
            output.mark_http_failure(status.as_u16(), &points_url);
            return Ok(output);
        }

        let points: PointsResponse =
            serde_json::from_str(&body).context("Failed to parse weather.gov points JSON")?;
        let grid_url = points.properties.forecast_grid_data;
        output.metadata.request_urls.push(grid_url.clone());

        debug!(url = %grid_url, "requesting weather.gov raw grid data");
        let res = self
            .http
            .get(&grid_url)
            .send()
            .await
            .context("Failed to send request to weather.gov (grid data)")?;

        let status = res.status();
        let body = res.text().await.context("Failed to read weather.gov grid response body")?;

        if !status.is_success() {
            warn!(%status, body = %truncate_body(&body), "weather.gov grid request failed");
            output.mark_http_failure(status.as_u16(), &grid_url);
            return Ok(output);
        }

        let grid: GridResponse =
            serde_json::from_str(&body).context("Failed to parse weather.gov grid JSON")?;

        for field in validate::CANONICAL_FIELDS {
            let Some(raw) = grid.properties.get(field) else {
                continue;
            };
            let prop: GridProperty = serde_json::from_value(raw.clone())
                .with_context(|| format!("Failed to parse weather.gov grid property '{field}'"))?;
            expand_property(&mut output.data, field, &prop)?;
        }

        output.mark_responded();
        Ok(output)
    }
}

/// Expand one grid property's intervals into hourly records. Intervals are
/// processed in upstream order; when two cover the same hour, the last
/// writer wins.
fn expand_property(
    data: &mut BTreeMap<String, HourRecord>,
    field: &str,
    prop: &GridProperty,
) -> Result<()> {
    let Some(values) = &prop.values else {
        // no data for this property, skip it entirely
        return Ok(());
    };
    let uom = prop.uom.as_deref().map(units::normalize_grid_uom).unwrap_or_default();

    for interval in values {
        let (start, duration_hours) = parse_valid_time(&interval.valid_time)?;

        let measurement = if field == "weather" {
            let Some(elements) = interval.value.as_array() else {
                continue;
            };
            Some(Measurement::text(join_weather(elements)))
        } else if field == "pressure" {
            // comes in inches of mercury
            interval.value.as_f64().map(|hg| {
                Measurement::scalar(units::convert_hg_to_millibars(hg), "millibars")
            })
        } else if interval.value.is_null() {
            // leave any prior value for these hours untouched
            None
        } else {
            Some(Measurement { value: interval.value.clone(), uom: Some(uom.clone()) })
        };
        let Some(measurement) = measurement else {
            continue;
        };

        for offset in 0..duration_hours {
            let key = units::output_date(start, offset);
            let hour = data.entry(key).or_default();
            hour.insert(field.to_string(), measurement.clone());
        }
    }

    Ok(())
}

/// Split `start/duration` and resolve both halves.
fn parse_valid_time(valid_time: &str) -> Result<(DateTime<Utc>, i64)> {
    let (start, duration) = valid_time
        .split_once('/')
        .ok_or_else(|| anyhow!("Invalid weather.gov validTime '{valid_time}'"))?;

    let start = DateTime::parse_from_str(start, "%Y-%m-%dT%H:%M:%S%z")
        .with_context(|| format!("Invalid weather.gov interval start '{start}'"))?
        .with_timezone(&Utc);

    Ok((start, parse_duration_hours(duration)?))
}

/// Whole-hour count of an ISO-8601 period. Only day and hour components
/// occur in grid data: `PnD`, `PTnH`, or `PnDTnH`.
fn parse_duration_hours(duration: &str) -> Result<i64> {
    let invalid = || anyhow!("Invalid weather.gov interval duration '{duration}'");

    let rest = duration.strip_prefix('P').ok_or_else(invalid)?;
    let (days_part, hours_part) = match rest.split_once('T') {
        Some((days, hours)) => (days, hours),
        None => (rest, ""),
    };

    let mut hours = 0i64;
    if !days_part.is_empty() {
        let days: i64 = days_part
            .strip_suffix('D')
            .and_then(|n| n.parse().ok())
            .ok_or_else(invalid)?;
        hours += days * 24;
    }
    if !hours_part.is_empty() {
        let h: i64 = hours_part
            .strip_suffix('H')
            .and_then(|n| n.parse().ok())
            .ok_or_else(invalid)?;
        hours += h;
    }

    Ok(hours)
}

/// Join condition elements into one description: non-null coverage,
/// intensity, and weather separated by spaces, elements joined with "and ",
/// underscores replaced with spaces.
fn join_weather(elements: &[Value]) -> String {
    let mut joined = String::new();
    for element in elements {
        if !joined.is_empty() {
            joined.push_str("and ");
        }
        for part in ["coverage", "intensity", "weather"] {
            if let Some(text) = element.get(part).and_then(Value::as_str) {
                joined.push_str(text);
                joined.push(' ');
            }
        }
    }
    joined.replace('_', " ").trim().to_string()
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
