//! Structural validation of canonical forecast output.
//!
//! Validation is observability, not an enforcement gate: the caller still
//! receives the forecast, the orchestrator only counts the failure.

use serde_json::Value;

/// The fixed canonical measurement vocabulary.
pub const CANONICAL_FIELDS: [&str; 13] = [
    "temperature",
    "apparentTemperature",
    "dewpoint",
    "relativeHumidity",
    "skyCover",
    "windDirection",
    "windSpeed",
    "windGust",
    "probabilityOfPrecipitation",
    "quantitativePrecipitation",
    "pressure",
    "visibility",
    "weather",
];

/// The only keys permitted inside a measurement entry.
pub const MEASUREMENT_KEYS: [&str; 2] = ["value", "uom"];

#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

/// Check a serialized forecast against the canonical schema.
///
/// Accumulates every error rather than short-circuiting, and never fails
/// itself. The `DATE` token in the error text is literal (legacy message
/// format), not the offending timestamp.
pub fn validate(output: &Value) -> ValidationResult {
    let mut errors = Vec::new();

    for top in ["metadata", "data", "status"] {
        if output.get(top).is_none() {
            errors.push(format!("missing {top}"));
        }
    }

    if let Some(data) = output.get("data").and_then(Value::as_object) {
        for hour in data.values() {
            let Some(hour) = hour.as_object() else {
                continue;
            };
            for (field, measurement) in hour {
                if !CANONICAL_FIELDS.contains(&field.as_str()) {
                    errors.push(format!("unexpected key: data.DATE.{field}"));
                    continue;
                }
                let Some(measurement) = measurement.as_object() else {
                    continue;
                };
                for inner in measurement.keys() {
                    if !MEASUREMENT_KEYS.contains(&inner.as_str()) {
                        errors.push(format!("unexpected key: data.DATE.{field}.{inner}"));
                        break;
                    }
                }
            }
        }
    }

    ValidationResult { is_valid: errors.is_empty(), errors }
}
