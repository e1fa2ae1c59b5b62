//! Farm/zone/device/camera registration and deletion.
//!
//! Every mutation here is farm-scoped and passes through the ownership
//! policy, except farm creation, which assigns the creator as owner outright.

use diesel::prelude::*;
use diesel::PgConnection;
use log::info;
use rand::Rng;
use serde::Deserialize;

use crate::db::models::{Camera, Device, Farm, NewCamera, NewDevice, NewFarm, NewZone, Zone};
use crate::error::ApiError;
use crate::schema;
use crate::services::ownership::{self, Actor};

pub const DEFAULT_ZONE_NAME: &str = "main";

#[derive(Debug, Clone, Deserialize)]
pub struct FarmCreate {
    pub name: String,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ZoneCreate {
    pub farm_id: i64,
    #[serde(default = "default_zone_name")]
    pub name: String,
}

fn default_zone_name() -> String {
    DEFAULT_ZONE_NAME.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceCreate {
    pub farm_id: i64,
    pub zone_id: i64,
    #[serde(rename = "type")]
    pub device_type: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CameraCreate {
    pub farm_id: i64,
    pub zone_id: i64,
    #[serde(rename = "type")]
    pub camera_type: String,
    pub name: String,
    pub stream_url: String,
}

/// Opaque bearer credential for a physical sensor/gateway. No expiry;
/// rotation happens by re-registering the device.
pub fn generate_device_token() -> String {
    format!("{:032x}", rand::rng().random::<u128>())
}

/// Create a farm owned by the creator, with its auto-created `"main"` zone.
pub fn create_farm(conn: &mut PgConnection, actor: Actor, payload: &FarmCreate) -> Result<Farm, ApiError> {
    use schema::farms::dsl as F;
    use schema::zones::dsl as Z;

    conn.transaction::<_, ApiError, _>(|conn| {
        let farm: Farm = diesel::insert_into(F::farms)
            .values(&NewFarm {
                name: payload.name.clone(),
                location: payload.location.clone(),
                owner_id: Some(actor.user_id),
            })
            .returning(Farm::as_returning())
            .get_result(conn)?;

        diesel::insert_into(Z::zones)
            .values(&NewZone {
                farm_id: farm.id,
                name: DEFAULT_ZONE_NAME.to_string(),
            })
            .execute(conn)?;

        info!("farm {} created by user {}", farm.id, actor.user_id);
        Ok(farm)
    })
}

pub fn create_zone(conn: &mut PgConnection, actor: Actor, payload: &ZoneCreate) -> Result<Zone, ApiError> {
    use schema::zones::dsl as Z;

    ownership::authorize_farm_mutation(conn, actor, payload.farm_id)?;

    let zone = diesel::insert_into(Z::zones)
        .values(&NewZone {
            farm_id: payload.farm_id,
            name: payload.name.clone(),
        })
        .returning(Zone::as_returning())
        .get_result(conn)?;
    Ok(zone)
}

/// The referenced zone must exist and belong to the payload's farm.
fn require_zone_in_farm(conn: &mut PgConnection, farm_id: i64, zone_id: i64) -> Result<(), ApiError> {
    use schema::zones::dsl as Z;

    let zone_farm: i64 = Z::zones
        .find(zone_id)
        .select(Z::farm_id)
        .first(conn)
        .optional()?
        .ok_or_else(|| ApiError::NotFound("zone not found".to_string()))?;
    if zone_farm != farm_id {
        return Err(ApiError::BadRequest("zone does not belong to farm".to_string()));
    }
    Ok(())
}

pub fn create_device(conn: &mut PgConnection, actor: Actor, payload: &DeviceCreate) -> Result<Device, ApiError> {
    use schema::devices::dsl as D;

    ownership::authorize_farm_mutation(conn, actor, payload.farm_id)?;
    require_zone_in_farm(conn, payload.farm_id, payload.zone_id)?;

    let device = diesel::insert_into(D::devices)
        .values(&NewDevice {
            farm_id: payload.farm_id,
            zone_id: payload.zone_id,
            device_type: payload.device_type.clone(),
            name: payload.name.clone(),
            device_token: generate_device_token(),
        })
        .returning(Device::as_returning())
        .get_result(conn)?;
    info!("device {} registered in farm {} zone {}", device.id, device.farm_id, device.zone_id);
    Ok(device)
}

pub fn create_camera(conn: &mut PgConnection, actor: Actor, payload: &CameraCreate) -> Result<Camera, ApiError> {
    use schema::cameras::dsl as C;

    ownership::authorize_farm_mutation(conn, actor, payload.farm_id)?;
    require_zone_in_farm(conn, payload.farm_id, payload.zone_id)?;

    let camera = diesel::insert_into(C::cameras)
        .values(&NewCamera {
            farm_id: payload.farm_id,
            zone_id: payload.zone_id,
            camera_type: payload.camera_type.clone(),
            name: payload.name.clone(),
            stream_url: payload.stream_url.clone(),
        })
        .returning(Camera::as_returning())
        .get_result(conn)?;
    Ok(camera)
}

pub fn delete_camera(conn: &mut PgConnection, actor: Actor, camera_id: i64) -> Result<(), ApiError> {
    use schema::cameras::dsl as C;

    let farm_id: i64 = C::cameras
        .find(camera_id)
        .select(C::farm_id)
        .first(conn)
        .optional()?
        .ok_or_else(|| ApiError::NotFound("camera not found".to_string()))?;
    ownership::authorize_farm_mutation(conn, actor, farm_id)?;

    diesel::delete(C::cameras.find(camera_id)).execute(conn)?;
    Ok(())
}

/// Delete a farm and everything under it. The store does not cascade, so the
/// deletes run children-first inside one transaction: readings and events,
/// then cameras and devices, then zones, then the farm row.
pub fn delete_farm(conn: &mut PgConnection, actor: Actor, farm_id: i64) -> Result<(), ApiError> {
    use schema::cameras::dsl as C;
    use schema::devices::dsl as D;
    use schema::events::dsl as E;
    use schema::farms::dsl as F;
    use schema::sensor_readings::dsl as S;
    use schema::zones::dsl as Z;

    ownership::authorize_farm_mutation(conn, actor, farm_id)?;

    conn.transaction::<_, ApiError, _>(|conn| {
        diesel::delete(S::sensor_readings.filter(S::farm_id.eq(farm_id))).execute(conn)?;
        diesel::delete(E::events.filter(E::farm_id.eq(farm_id))).execute(conn)?;
        diesel::delete(C::cameras.filter(C::farm_id.eq(farm_id))).execute(conn)?;
        diesel::delete(D::devices.filter(D::farm_id.eq(farm_id))).execute(conn)?;
        diesel::delete(Z::zones.filter(Z::farm_id.eq(farm_id))).execute(conn)?;
        diesel::delete(F::farms.find(farm_id)).execute(conn)?;
        info!("farm {} deleted by user {}", farm_id, actor.user_id);
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_tokens_are_opaque_and_unique() {
        let a = generate_device_token();
        let b = generate_device_token();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn zone_create_defaults_to_main() {
        let payload: ZoneCreate = serde_json::from_str(r#"{"farm_id":1}"#).unwrap();
        assert_eq!(payload.name, DEFAULT_ZONE_NAME);

        let named: ZoneCreate = serde_json::from_str(r#"{"farm_id":1,"name":"nursery"}"#).unwrap();
        assert_eq!(named.name, "nursery");
    }

    #[test]
    fn device_create_accepts_wire_type_field() {
        let payload: DeviceCreate =
            serde_json::from_str(r#"{"farm_id":1,"zone_id":2,"type":"gateway","name":"gw-1"}"#).unwrap();
        assert_eq!(payload.device_type, "gateway");
    }
}
