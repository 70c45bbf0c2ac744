//! Canonical forecast schema.
//!
//! The serialized JSON shape is bit-exact with the legacy consumer contract:
//! `status.success` is the literal string `"true"`/`"false"`, measurement
//! entries carry `value` and an optional `uom`, and `data` keys are the
//! string timestamps produced by [`crate::units::output_date`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::units;

/// One hour of normalized data: canonical field name → measurement.
pub type HourRecord = BTreeMap<String, Measurement>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Measurement {
    pub value: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uom: Option<String>,
}

impl Measurement {
    pub fn scalar(value: f64, uom: &str) -> Self {
        Self { value: Value::from(value), uom: Some(uom.to_string()) }
    }

    /// A unit-less measurement; only the `weather` field uses this.
    pub fn text(value: impl Into<String>) -> Self {
        Self { value: Value::String(value.into()), uom: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    pub source: String,
    /// Every upstream URL contacted for this forecast, in call order, even
    /// when a call failed.
    pub request_urls: Vec<String>,
    /// The [lat, lon] pair exactly as normalized upstream.
    pub coordinates: [String; 2],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Status {
    /// "true" or "false" (string on the wire, legacy contract).
    pub success: String,
    pub requested: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub responded: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_response_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_request_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalForecast {
    pub metadata: Metadata,
    pub data: BTreeMap<String, HourRecord>,
    pub status: Status,
}

impl CanonicalForecast {
    /// Start a forecast for one fetch attempt. `first_url` is recorded up
    /// front so a failed first call still lists it.
    pub fn new(source: &str, latitude: &str, longitude: &str, first_url: String) -> Self {
        Self {
            metadata: Metadata {
                source: source.to_string(),
                request_urls: vec![first_url],
                coordinates: [latitude.to_string(), longitude.to_string()],
            },
            data: BTreeMap::new(),
            status: Status {
                success: "true".to_string(),
                requested: units::now_string(),
                responded: None,
                http_response_code: None,
                http_request_url: None,
            },
        }
    }

    /// Record a non-2xx upstream response. The forecast stays structurally
    /// valid; `data` is left empty and no error is raised.
    pub fn mark_http_failure(&mut self, code: u16, url: &str) {
        self.status.success = "false".to_string();
        self.status.http_response_code = Some(code);
        self.status.http_request_url = Some(url.to_string());
        self.status.responded = Some(units::now_string());
    }

    pub fn mark_responded(&mut self) {
        self.status.responded = Some(units::now_string());
    }

    pub fn is_success(&self) -> bool {
        self.status.success == "true"
    }

    pub fn to_pretty_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
