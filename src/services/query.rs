//! Dashboard read paths and the dissolved-oxygen saturation derivation.
//!
//! Read paths are deliberately unauthenticated: dashboards are public within
//! the deployment.

use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;
use diesel::PgConnection;
use serde::Serialize;

use crate::db::models::{Event, SensorReading};
use crate::error::ApiError;
use crate::schema;

#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    #[serde(rename = "temperatureC")]
    pub temperature_c: f64,
    #[serde(rename = "turbidityNTU")]
    pub turbidity_ntu: f64,
    #[serde(rename = "dissolvedOxygenMgL")]
    pub dissolved_oxygen_mg_l: f64,
    pub ph: Option<f64>,
    #[serde(rename = "doSaturationPercent")]
    pub do_saturation_percent: Option<f64>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SeriesPoint {
    /// Wall-clock `HH:MM` label; not sortable across day boundaries, which
    /// is acceptable for sub-24h windows.
    pub t: String,
    #[serde(rename = "temperatureC")]
    pub temperature_c: f64,
    #[serde(rename = "turbidityNTU")]
    pub turbidity_ntu: f64,
    #[serde(rename = "dissolvedOxygenMgL")]
    pub dissolved_oxygen_mg_l: f64,
    pub ph: Option<f64>,
    #[serde(rename = "doSaturationPercent")]
    pub do_saturation_percent: Option<f64>,
}

/// Series range parameter: `"1h"` selects the short window, anything else
/// falls back to 24h.
pub fn series_window(range: &str) -> Duration {
    if range == "1h" {
        Duration::hours(1)
    } else {
        Duration::hours(24)
    }
}

/// Event range parameter has the reversed default: `"24h"` selects the long
/// window, anything else falls back to 1h.
pub fn event_window(range: &str) -> Duration {
    if range == "24h" {
        Duration::hours(24)
    } else {
        Duration::hours(1)
    }
}

/// Percent saturation of dissolved oxygen against the temperature-dependent
/// freshwater solubility maximum at 1 atm (cubic approximation).
///
/// Absent when either input is absent or the temperature lies outside the
/// polynomial's ~0-30 degC validity domain; the curve produces nonsense (and
/// eventually a non-positive solubility) beyond it.
pub fn calc_do_saturation(temperature_c: Option<f64>, dissolved_oxygen_mg_l: Option<f64>) -> Option<f64> {
    let t = temperature_c?;
    let do_mg_l = dissolved_oxygen_mg_l?;
    if !(0.0..=30.0).contains(&t) {
        return None;
    }
    let do_sat = 14.652 - 0.41022 * t + 0.0079910 * t * t - 0.000077774 * t * t * t;
    if do_sat <= 0.0 {
        return None;
    }
    Some(round2(100.0 * do_mg_l / do_sat))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn to_point(row: &SensorReading) -> SeriesPoint {
    SeriesPoint {
        t: row.created_at.format("%H:%M").to_string(),
        temperature_c: row.temperature_c,
        turbidity_ntu: row.turbidity_ntu,
        dissolved_oxygen_mg_l: row.dissolved_oxygen_mg_l,
        ph: row.ph,
        do_saturation_percent: calc_do_saturation(Some(row.temperature_c), Some(row.dissolved_oxygen_mg_l)),
    }
}

/// Most recent reading for a farm/zone, or `NotFound` when none exists.
pub fn latest_snapshot(conn: &mut PgConnection, farm_id: i64, zone_id: i64) -> Result<Snapshot, ApiError> {
    use schema::sensor_readings::dsl as S;

    let row: SensorReading = S::sensor_readings
        .filter(S::farm_id.eq(farm_id).and(S::zone_id.eq(zone_id)))
        .order(S::created_at.desc())
        .select(SensorReading::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| ApiError::NotFound("no sensor data".to_string()))?;

    Ok(Snapshot {
        temperature_c: row.temperature_c,
        turbidity_ntu: row.turbidity_ntu,
        dissolved_oxygen_mg_l: row.dissolved_oxygen_mg_l,
        ph: row.ph,
        do_saturation_percent: calc_do_saturation(Some(row.temperature_c), Some(row.dissolved_oxygen_mg_l)),
        updated_at: row.created_at,
    })
}

/// Readings for a farm/zone within the window, ascending by creation time.
pub fn sensor_series(
    conn: &mut PgConnection,
    farm_id: i64,
    zone_id: i64,
    range: &str,
) -> Result<Vec<SeriesPoint>, ApiError> {
    use schema::sensor_readings::dsl as S;

    let since = Utc::now() - series_window(range);
    let rows: Vec<SensorReading> = S::sensor_readings
        .filter(
            S::farm_id
                .eq(farm_id)
                .and(S::zone_id.eq(zone_id))
                .and(S::created_at.ge(since)),
        )
        .order(S::created_at.asc())
        .select(SensorReading::as_select())
        .load(conn)?;

    Ok(rows.iter().map(to_point).collect())
}

/// Events for a farm within the window, newest first.
pub fn event_feed(conn: &mut PgConnection, farm_id: i64, range: &str) -> Result<Vec<Event>, ApiError> {
    use schema::events::dsl as E;

    let since = Utc::now() - event_window(range);
    let rows = E::events
        .filter(E::farm_id.eq(farm_id).and(E::created_at.ge(since)))
        .order(E::created_at.desc())
        .select(Event::as_select())
        .load(conn)?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn saturation_at_20c_is_populated() {
        // do_sat(20) = 9.0218 mg/L -> 7.0 mg/L is roughly 77-78%.
        let pct = calc_do_saturation(Some(20.0), Some(7.0)).unwrap();
        assert!((77.0..79.0).contains(&pct), "unexpected saturation {}", pct);
    }

    #[test]
    fn saturation_rounds_to_two_decimals() {
        let pct = calc_do_saturation(Some(20.0), Some(7.0)).unwrap();
        assert_eq!(pct, round2(pct));
    }

    #[test]
    fn saturation_is_absent_without_inputs() {
        assert_eq!(calc_do_saturation(None, Some(7.0)), None);
        assert_eq!(calc_do_saturation(Some(20.0), None), None);
        assert_eq!(calc_do_saturation(None, None), None);
    }

    #[test]
    fn saturation_is_absent_outside_validity_domain() {
        assert_eq!(calc_do_saturation(Some(35.0), Some(7.0)), None);
        assert_eq!(calc_do_saturation(Some(-2.0), Some(7.0)), None);
    }

    #[test]
    fn saturation_holds_at_domain_edges() {
        assert!(calc_do_saturation(Some(0.0), Some(7.0)).is_some());
        assert!(calc_do_saturation(Some(30.0), Some(7.0)).is_some());
    }

    #[test]
    fn series_window_defaults_to_24h() {
        assert_eq!(series_window("1h"), Duration::hours(1));
        assert_eq!(series_window("24h"), Duration::hours(24));
        assert_eq!(series_window("7d"), Duration::hours(24));
        assert_eq!(series_window(""), Duration::hours(24));
    }

    #[test]
    fn event_window_defaults_to_1h() {
        assert_eq!(event_window("24h"), Duration::hours(24));
        assert_eq!(event_window("1h"), Duration::hours(1));
        assert_eq!(event_window("7d"), Duration::hours(1));
        assert_eq!(event_window(""), Duration::hours(1));
    }

    #[test]
    fn series_point_carries_wall_clock_label() {
        let row = SensorReading {
            id: 1,
            farm_id: 1,
            zone_id: 1,
            device_id: None,
            temperature_c: 20.0,
            turbidity_ntu: 3.0,
            dissolved_oxygen_mg_l: 7.0,
            ph: Some(7.2),
            created_at: Utc.with_ymd_and_hms(2026, 8, 30, 14, 5, 33).unwrap(),
        };
        let point = to_point(&row);
        assert_eq!(point.t, "14:05");
        assert!(point.do_saturation_percent.is_some());
    }

    #[test]
    fn snapshot_serializes_wire_field_names() {
        let snapshot = Snapshot {
            temperature_c: 20.0,
            turbidity_ntu: 3.0,
            dissolved_oxygen_mg_l: 7.0,
            ph: None,
            do_saturation_percent: Some(77.59),
            updated_at: Utc.with_ymd_and_hms(2026, 8, 30, 14, 5, 33).unwrap(),
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert!(json.get("temperatureC").is_some());
        assert!(json.get("turbidityNTU").is_some());
        assert!(json.get("dissolvedOxygenMgL").is_some());
        assert!(json.get("doSaturationPercent").is_some());
        assert!(json.get("updatedAt").is_some());
    }
}
