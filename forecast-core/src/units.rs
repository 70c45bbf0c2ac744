//! Measurement-unit helpers shared by the provider adapters.
//!
//! Every adapter reports into the canonical vocabulary with canonical unit
//! names; the conversions and unit-code normalizations live here so the two
//! adapters cannot drift apart.

use chrono::{DateTime, Duration, Utc};

/// Millibars per inch of mercury.
const HG_TO_MILLIBARS: f64 = 33.864;

pub fn convert_f_to_c(temp_f: f64) -> f64 {
    (temp_f - 32.0) / 1.8
}

pub fn convert_hg_to_millibars(pressure_hg: f64) -> f64 {
    pressure_hg * HG_TO_MILLIBARS
}

/// Map short unit codes to canonical unit names. Unknown codes pass through.
pub fn normalized_uom(uom: &str) -> &str {
    match uom {
        "C" => "celsius",
        "m" => "meters",
        _ => uom,
    }
}

/// Normalize a namespaced grid unit code (e.g. `wmoUnit:degC`) to a canonical
/// unit name: the namespace prefix is dropped, then known codes are mapped.
pub fn normalize_grid_uom(raw: &str) -> String {
    let code = raw.split(':').next_back().unwrap_or(raw);
    let code = match code {
        "degree_(angle)" => "degrees",
        "km_h-1" => "kph",
        "degC" => "celsius",
        other => other,
    };
    normalized_uom(code).to_string()
}

/// Render the canonical per-hour key for `date + offset_hours`.
///
/// Both adapters must produce byte-identical keys for equal instants, since
/// downstream consumers index `data` by exact string match.
pub fn output_date(date: DateTime<Utc>, offset_hours: i64) -> String {
    (date + Duration::hours(offset_hours))
        .format("%Y-%m-%d %H:%M:%S%:z")
        .to_string()
}

/// Current time rendered the same way as the per-hour keys.
pub fn now_string() -> String {
    output_date(Utc::now(), 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn fahrenheit_to_celsius() {
        assert_eq!(convert_f_to_c(32.0), 0.0);
        assert_eq!(convert_f_to_c(212.0), 100.0);
    }

    #[test]
    fn inches_of_mercury_to_millibars() {
        let mbar = convert_hg_to_millibars(29.92);
        assert!((mbar - 1013.21088).abs() < 1e-9);
    }

    #[test]
    fn known_uom_codes_are_normalized() {
        assert_eq!(normalized_uom("C"), "celsius");
        assert_eq!(normalized_uom("m"), "meters");
        assert_eq!(normalized_uom("percent"), "percent");
    }

    #[test]
    fn grid_uom_strips_namespace_and_maps_codes() {
        assert_eq!(normalize_grid_uom("wmoUnit:degC"), "celsius");
        assert_eq!(normalize_grid_uom("wmoUnit:degree_(angle)"), "degrees");
        assert_eq!(normalize_grid_uom("wmoUnit:km_h-1"), "kph");
        assert_eq!(normalize_grid_uom("wmoUnit:percent"), "percent");
        assert_eq!(normalize_grid_uom("degC"), "celsius");
    }

    #[test]
    fn output_date_renders_utc_offset_form() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(output_date(start, 0), "2024-01-01 00:00:00+00:00");
        assert_eq!(output_date(start, 2), "2024-01-01 02:00:00+00:00");
        assert_eq!(output_date(start, 24), "2024-01-02 00:00:00+00:00");
    }
}
