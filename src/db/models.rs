//! Diesel model structs representing application entities and telemetry rows.
//!
//! Relationships form a strict tree: Farm -> Zone -> {Device, Camera,
//! SensorReading, Event}. Telemetry tables are append-only.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::schema;

#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = schema::users)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = schema::users)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub role: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = schema::farms)]
pub struct Farm {
    pub id: i64,
    pub name: String,
    pub location: Option<String>,
    pub owner_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = schema::farms)]
pub struct NewFarm {
    pub name: String,
    pub location: Option<String>,
    pub owner_id: Option<i64>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable, Serialize, Deserialize)]
#[diesel(table_name = schema::zones)]
#[diesel(belongs_to(Farm))]
pub struct Zone {
    pub id: i64,
    pub farm_id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = schema::zones)]
pub struct NewZone {
    pub farm_id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable, Serialize, Deserialize)]
#[diesel(table_name = schema::devices)]
#[diesel(belongs_to(Farm))]
#[diesel(belongs_to(Zone))]
pub struct Device {
    pub id: i64,
    pub farm_id: i64,
    pub zone_id: i64,
    pub device_type: String,
    pub name: String,
    pub device_token: String,
    pub last_seen: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = schema::devices)]
pub struct NewDevice {
    pub farm_id: i64,
    pub zone_id: i64,
    pub device_type: String,
    pub name: String,
    pub device_token: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable, Serialize, Deserialize)]
#[diesel(table_name = schema::cameras)]
#[diesel(belongs_to(Farm))]
#[diesel(belongs_to(Zone))]
pub struct Camera {
    pub id: i64,
    pub farm_id: i64,
    pub zone_id: i64,
    pub camera_type: String,
    pub name: String,
    pub stream_url: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = schema::cameras)]
pub struct NewCamera {
    pub farm_id: i64,
    pub zone_id: i64,
    pub camera_type: String,
    pub name: String,
    pub stream_url: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable, Serialize, Deserialize)]
#[diesel(table_name = schema::sensor_readings)]
#[diesel(belongs_to(Farm))]
#[diesel(belongs_to(Zone))]
#[diesel(belongs_to(Device))]
pub struct SensorReading {
    pub id: i64,
    pub farm_id: i64,
    pub zone_id: i64,
    pub device_id: Option<i64>,
    pub temperature_c: f64,
    pub turbidity_ntu: f64,
    pub dissolved_oxygen_mg_l: f64,
    pub ph: Option<f64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = schema::sensor_readings)]
pub struct NewSensorReading {
    pub farm_id: i64,
    pub zone_id: i64,
    pub device_id: Option<i64>,
    pub temperature_c: f64,
    pub turbidity_ntu: f64,
    pub dissolved_oxygen_mg_l: f64,
    pub ph: Option<f64>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable, Serialize, Deserialize)]
#[diesel(table_name = schema::events)]
#[diesel(belongs_to(Farm))]
#[diesel(belongs_to(Zone))]
#[diesel(belongs_to(Camera))]
#[diesel(belongs_to(Device))]
pub struct Event {
    pub id: i64,
    pub farm_id: i64,
    pub zone_id: i64,
    pub camera_id: Option<i64>,
    pub device_id: Option<i64>,
    pub event_type: String,
    pub confidence: f64,
    pub message: String,
    pub snapshot_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = schema::events)]
pub struct NewEvent {
    pub farm_id: i64,
    pub zone_id: i64,
    pub camera_id: Option<i64>,
    pub device_id: Option<i64>,
    pub event_type: String,
    pub confidence: f64,
    pub message: String,
    pub snapshot_url: Option<String>,
}
