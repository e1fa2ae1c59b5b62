//! Device-authenticated ingestion pipeline.
//!
//! Field devices present an opaque bearer token (not a user session token).
//! Each submission is validated against the device's assigned farm/zone so a
//! credential for one zone can never write data attributed to another, then
//! persisted together with a `last_seen` touch in one transaction.
//!
//! At-least-once semantics: duplicate submissions create duplicate rows.

use chrono::Utc;
use diesel::prelude::*;
use diesel::PgConnection;
use serde::Deserialize;

use crate::db::models::{Device, NewEvent, NewSensorReading};
use crate::error::ApiError;
use crate::schema;

#[derive(Debug, Clone, Deserialize)]
pub struct SensorIngest {
    pub farm_id: i64,
    pub zone_id: i64,
    #[serde(rename = "temperatureC")]
    pub temperature_c: f64,
    #[serde(rename = "turbidityNTU")]
    pub turbidity_ntu: f64,
    #[serde(rename = "dissolvedOxygenMgL")]
    pub dissolved_oxygen_mg_l: f64,
    pub ph: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventIngest {
    pub farm_id: i64,
    pub zone_id: i64,
    #[serde(rename = "type")]
    pub event_type: String,
    pub confidence: f64,
    pub message: String,
    pub snapshot_url: Option<String>,
    pub camera_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HeartbeatIngest {
    pub farm_id: i64,
    pub zone_id: i64,
}

/// Resolve an opaque device token to its Device record.
pub fn resolve_device(conn: &mut PgConnection, token: &str) -> Result<Device, ApiError> {
    use schema::devices::dsl as D;

    D::devices
        .filter(D::device_token.eq(token))
        .select(Device::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| ApiError::Unauthorized("invalid device token".to_string()))
}

/// The payload's declared farm/zone must exactly match the device's
/// assignment; anything else is a consistency violation and nothing is
/// written.
pub fn check_assignment(device: &Device, farm_id: i64, zone_id: i64) -> Result<(), ApiError> {
    if device.farm_id != farm_id || device.zone_id != zone_id {
        return Err(ApiError::BadRequest("farm/zone mismatch".to_string()));
    }
    Ok(())
}

fn touch_last_seen(conn: &mut PgConnection, device_id: i64) -> Result<(), ApiError> {
    use schema::devices::dsl as D;

    diesel::update(D::devices.find(device_id))
        .set(D::last_seen.eq(Utc::now()))
        .execute(conn)?;
    Ok(())
}

pub fn submit_reading(conn: &mut PgConnection, token: &str, payload: &SensorIngest) -> Result<(), ApiError> {
    use schema::sensor_readings::dsl as S;

    let device = resolve_device(conn, token)?;
    check_assignment(&device, payload.farm_id, payload.zone_id)?;

    let row = NewSensorReading {
        farm_id: payload.farm_id,
        zone_id: payload.zone_id,
        device_id: Some(device.id),
        temperature_c: payload.temperature_c,
        turbidity_ntu: payload.turbidity_ntu,
        dissolved_oxygen_mg_l: payload.dissolved_oxygen_mg_l,
        ph: payload.ph,
    };
    conn.transaction::<_, ApiError, _>(|conn| {
        diesel::insert_into(S::sensor_readings).values(&row).execute(conn)?;
        touch_last_seen(conn, device.id)
    })
}

pub fn submit_event(conn: &mut PgConnection, token: &str, payload: &EventIngest) -> Result<(), ApiError> {
    use schema::events::dsl as E;

    let device = resolve_device(conn, token)?;
    check_assignment(&device, payload.farm_id, payload.zone_id)?;

    let row = NewEvent {
        farm_id: payload.farm_id,
        zone_id: payload.zone_id,
        camera_id: payload.camera_id,
        device_id: Some(device.id),
        event_type: payload.event_type.clone(),
        confidence: payload.confidence,
        message: payload.message.clone(),
        snapshot_url: payload.snapshot_url.clone(),
    };
    conn.transaction::<_, ApiError, _>(|conn| {
        diesel::insert_into(E::events).values(&row).execute(conn)?;
        touch_last_seen(conn, device.id)
    })
}

/// Heartbeat carries no data payload but still authenticates, validates the
/// assignment, and bumps `last_seen`.
pub fn heartbeat(conn: &mut PgConnection, token: &str, payload: &HeartbeatIngest) -> Result<(), ApiError> {
    let device = resolve_device(conn, token)?;
    check_assignment(&device, payload.farm_id, payload.zone_id)?;
    touch_last_seen(conn, device.id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(farm_id: i64, zone_id: i64) -> Device {
        Device {
            id: 1,
            farm_id,
            zone_id,
            device_type: "sensor-gateway".to_string(),
            name: "gw-1".to_string(),
            device_token: "0123456789abcdef0123456789abcdef".to_string(),
            last_seen: Utc::now(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn matching_assignment_passes() {
        assert!(check_assignment(&device(3, 9), 3, 9).is_ok());
    }

    #[test]
    fn farm_mismatch_is_rejected() {
        let err = check_assignment(&device(3, 9), 4, 9).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(m) if m == "farm/zone mismatch"));
    }

    #[test]
    fn zone_mismatch_is_rejected() {
        let err = check_assignment(&device(3, 9), 3, 10).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[test]
    fn sensor_payload_accepts_wire_field_names() {
        let payload: SensorIngest = serde_json::from_str(
            r#"{"farm_id":1,"zone_id":2,"temperatureC":21.5,"turbidityNTU":3.2,"dissolvedOxygenMgL":7.8,"ph":7.1}"#,
        )
        .unwrap();
        assert_eq!(payload.temperature_c, 21.5);
        assert_eq!(payload.turbidity_ntu, 3.2);
        assert_eq!(payload.dissolved_oxygen_mg_l, 7.8);
        assert_eq!(payload.ph, Some(7.1));
    }

    #[test]
    fn event_payload_ph_and_snapshot_are_optional() {
        let payload: EventIngest = serde_json::from_str(
            r#"{"farm_id":1,"zone_id":2,"type":"fish_surface","confidence":0.93,"message":"surface activity"}"#,
        )
        .unwrap();
        assert_eq!(payload.event_type, "fish_surface");
        assert!(payload.snapshot_url.is_none());
        assert!(payload.camera_id.is_none());
    }
}
