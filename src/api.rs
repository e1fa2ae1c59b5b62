//! Thin HTTP surface: request/response mapping over the service modules.
//!
//! Read paths are public within the deployment; mutations require a bearer
//! session token, ingestion requires the `X-Device-Token` header. All policy
//! decisions live in the service modules, never here.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::PgConnection;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

use crate::auth::{self, Role};
use crate::db::models::{Camera, Device, Event, Farm, NewUser, User, Zone};
use crate::error::ApiError;
use crate::schema;
use crate::services::ingest::{self, EventIngest, HeartbeatIngest, SensorIngest};
use crate::services::ownership::Actor;
use crate::services::query;
use crate::services::registry::{self, CameraCreate, DeviceCreate, FarmCreate, ZoneCreate};

pub type DbPool = Pool<ConnectionManager<PgConnection>>;
type DbConn = PooledConnection<ConnectionManager<PgConnection>>;

const DEVICE_TOKEN_HEADER: &str = "x-device-token";

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub secret_key: String,
    pub token_ttl: Duration,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/auth/signup", post(signup))
        .route("/api/auth/login", post(login))
        .route("/api/farms", get(list_farms).post(create_farm))
        .route("/api/farms/:farm_id", delete(delete_farm))
        .route("/api/farms/:farm_id/zones", get(list_zones))
        .route("/api/farms/:farm_id/zones/:zone_id/snapshot", get(get_snapshot))
        .route("/api/farms/:farm_id/zones/:zone_id/series", get(get_series))
        .route("/api/farms/:farm_id/events", get(list_events))
        .route("/api/farms/:farm_id/cameras", get(list_cameras))
        .route("/api/zones", post(create_zone))
        .route("/api/devices", post(create_device))
        .route("/api/cameras", post(create_camera))
        .route("/api/cameras/:camera_id", delete(delete_camera))
        .route("/api/ingest/sensor", post(ingest_sensor))
        .route("/api/ingest/event", post(ingest_event))
        .route("/api/ingest/heartbeat", post(ingest_heartbeat))
        .with_state(state)
}

fn connection(state: &AppState) -> Result<DbConn, ApiError> {
    state.pool.get().map_err(ApiError::from)
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("missing bearer token".to_string()))?;
    value
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::Unauthorized("missing bearer token".to_string()))
}

fn device_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    headers
        .get(DEVICE_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("missing device token".to_string()))
}

/// Resolve the session token to its User row. The role stored on the row is
/// authoritative, not the token's claim.
fn current_actor(conn: &mut PgConnection, state: &AppState, headers: &HeaderMap) -> Result<Actor, ApiError> {
    use schema::users::dsl as U;

    let token = bearer_token(headers)?;
    let data = auth::decode_access_token(&state.secret_key, token)?;
    let user: User = U::users
        .find(data.user_id)
        .select(User::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| ApiError::Unauthorized("user not found".to_string()))?;
    let role = Role::parse(&user.role).ok_or_else(|| ApiError::Unauthorized("unknown role".to_string()))?;
    Ok(Actor {
        user_id: user.id,
        role,
    })
}

// --- wire shapes ---------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SignupRequest {
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct UserRead {
    id: i64,
    email: String,
    role: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct TokenResponse {
    access_token: String,
    token_type: &'static str,
    expires_in: u64,
}

#[derive(Debug, Serialize)]
struct FarmRead {
    id: i64,
    name: String,
    location: Option<String>,
}

impl From<Farm> for FarmRead {
    fn from(f: Farm) -> Self {
        FarmRead {
            id: f.id,
            name: f.name,
            location: f.location,
        }
    }
}

#[derive(Debug, Serialize)]
struct ZoneRead {
    id: i64,
    farm_id: i64,
    name: String,
}

impl From<Zone> for ZoneRead {
    fn from(z: Zone) -> Self {
        ZoneRead {
            id: z.id,
            farm_id: z.farm_id,
            name: z.name,
        }
    }
}

#[derive(Debug, Serialize)]
struct DeviceRead {
    id: i64,
    farm_id: i64,
    zone_id: i64,
    #[serde(rename = "type")]
    device_type: String,
    name: String,
    device_token: String,
}

impl From<Device> for DeviceRead {
    fn from(d: Device) -> Self {
        DeviceRead {
            id: d.id,
            farm_id: d.farm_id,
            zone_id: d.zone_id,
            device_type: d.device_type,
            name: d.name,
            device_token: d.device_token,
        }
    }
}

#[derive(Debug, Serialize)]
struct CameraRead {
    id: i64,
    farm_id: i64,
    zone_id: i64,
    #[serde(rename = "type")]
    camera_type: String,
    name: String,
    stream_url: String,
}

impl From<Camera> for CameraRead {
    fn from(c: Camera) -> Self {
        CameraRead {
            id: c.id,
            farm_id: c.farm_id,
            zone_id: c.zone_id,
            camera_type: c.camera_type,
            name: c.name,
            stream_url: c.stream_url,
        }
    }
}

#[derive(Debug, Serialize)]
struct EventRead {
    id: i64,
    farm_id: i64,
    zone_id: i64,
    camera_id: Option<i64>,
    device_id: Option<i64>,
    #[serde(rename = "type")]
    event_type: String,
    confidence: f64,
    message: String,
    snapshot_url: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<Event> for EventRead {
    fn from(e: Event) -> Self {
        EventRead {
            id: e.id,
            farm_id: e.farm_id,
            zone_id: e.zone_id,
            camera_id: e.camera_id,
            device_id: e.device_id,
            event_type: e.event_type,
            confidence: e.confidence,
            message: e.message,
            snapshot_url: e.snapshot_url,
            created_at: e.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RangeQuery {
    range: Option<String>,
}

// --- auth ----------------------------------------------------------------

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> Result<Json<UserRead>, ApiError> {
    use schema::users::dsl as U;

    let mut conn = connection(&state)?;
    let existing: Option<i64> = U::users
        .filter(U::email.eq(&payload.email))
        .select(U::id)
        .first(&mut conn)
        .optional()?;
    if existing.is_some() {
        return Err(ApiError::BadRequest("email already registered".to_string()));
    }

    let user: User = diesel::insert_into(U::users)
        .values(&NewUser {
            email: payload.email.clone(),
            password_hash: auth::hash_password(&payload.password)?,
            role: Role::Operator.as_str().to_string(),
        })
        .returning(User::as_returning())
        .get_result(&mut conn)?;

    Ok(Json(UserRead {
        id: user.id,
        email: user.email,
        role: user.role,
        created_at: user.created_at,
    }))
}

async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    use schema::users::dsl as U;

    let mut conn = connection(&state)?;
    let user: Option<User> = U::users
        .filter(U::email.eq(&payload.email))
        .select(User::as_select())
        .first(&mut conn)
        .optional()?;

    // One rejection path for unknown email and wrong password.
    let user = match user {
        Some(u) if auth::verify_password(&payload.password, &u.password_hash) => u,
        _ => return Err(ApiError::Unauthorized("invalid credentials".to_string())),
    };
    let role = Role::parse(&user.role).ok_or_else(|| ApiError::Unauthorized("unknown role".to_string()))?;

    let token = auth::create_access_token(&state.secret_key, user.id, role, state.token_ttl)?;
    Ok(Json(TokenResponse {
        access_token: token,
        token_type: "bearer",
        expires_in: state.token_ttl.as_secs(),
    }))
}

// --- public reads --------------------------------------------------------

async fn list_farms(State(state): State<AppState>) -> Result<Json<Vec<FarmRead>>, ApiError> {
    use schema::farms::dsl as F;

    let mut conn = connection(&state)?;
    let farms: Vec<Farm> = F::farms.order(F::id.asc()).select(Farm::as_select()).load(&mut conn)?;
    Ok(Json(farms.into_iter().map(FarmRead::from).collect()))
}

async fn list_zones(
    State(state): State<AppState>,
    Path(farm_id): Path<i64>,
) -> Result<Json<Vec<ZoneRead>>, ApiError> {
    use schema::farms::dsl as F;
    use schema::zones::dsl as Z;

    let mut conn = connection(&state)?;
    let exists: Option<i64> = F::farms.find(farm_id).select(F::id).first(&mut conn).optional()?;
    if exists.is_none() {
        return Err(ApiError::NotFound("farm not found".to_string()));
    }

    let zones: Vec<Zone> = Z::zones
        .filter(Z::farm_id.eq(farm_id))
        .order(Z::id.asc())
        .select(Zone::as_select())
        .load(&mut conn)?;
    Ok(Json(zones.into_iter().map(ZoneRead::from).collect()))
}

async fn get_snapshot(
    State(state): State<AppState>,
    Path((farm_id, zone_id)): Path<(i64, i64)>,
) -> Result<Json<query::Snapshot>, ApiError> {
    let mut conn = connection(&state)?;
    Ok(Json(query::latest_snapshot(&mut conn, farm_id, zone_id)?))
}

async fn get_series(
    State(state): State<AppState>,
    Path((farm_id, zone_id)): Path<(i64, i64)>,
    Query(params): Query<RangeQuery>,
) -> Result<Json<Vec<query::SeriesPoint>>, ApiError> {
    let mut conn = connection(&state)?;
    let range = params.range.as_deref().unwrap_or("1h");
    Ok(Json(query::sensor_series(&mut conn, farm_id, zone_id, range)?))
}

async fn list_events(
    State(state): State<AppState>,
    Path(farm_id): Path<i64>,
    Query(params): Query<RangeQuery>,
) -> Result<Json<Vec<EventRead>>, ApiError> {
    let mut conn = connection(&state)?;
    let range = params.range.as_deref().unwrap_or("24h");
    let events = query::event_feed(&mut conn, farm_id, range)?;
    Ok(Json(events.into_iter().map(EventRead::from).collect()))
}

async fn list_cameras(
    State(state): State<AppState>,
    Path(farm_id): Path<i64>,
) -> Result<Json<Vec<CameraRead>>, ApiError> {
    use schema::cameras::dsl as C;

    let mut conn = connection(&state)?;
    let cameras: Vec<Camera> = C::cameras
        .filter(C::farm_id.eq(farm_id))
        .order(C::id.asc())
        .select(Camera::as_select())
        .load(&mut conn)?;
    Ok(Json(cameras.into_iter().map(CameraRead::from).collect()))
}

// --- owner mutations -----------------------------------------------------

async fn create_farm(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<FarmCreate>,
) -> Result<Json<FarmRead>, ApiError> {
    let mut conn = connection(&state)?;
    let actor = current_actor(&mut conn, &state, &headers)?;
    let farm = registry::create_farm(&mut conn, actor, &payload)?;
    Ok(Json(FarmRead::from(farm)))
}

async fn delete_farm(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(farm_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let mut conn = connection(&state)?;
    let actor = current_actor(&mut conn, &state, &headers)?;
    registry::delete_farm(&mut conn, actor, farm_id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn create_zone(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<ZoneCreate>,
) -> Result<Json<ZoneRead>, ApiError> {
    let mut conn = connection(&state)?;
    let actor = current_actor(&mut conn, &state, &headers)?;
    let zone = registry::create_zone(&mut conn, actor, &payload)?;
    Ok(Json(ZoneRead::from(zone)))
}

async fn create_device(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<DeviceCreate>,
) -> Result<Json<DeviceRead>, ApiError> {
    let mut conn = connection(&state)?;
    let actor = current_actor(&mut conn, &state, &headers)?;
    let device = registry::create_device(&mut conn, actor, &payload)?;
    Ok(Json(DeviceRead::from(device)))
}

async fn create_camera(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CameraCreate>,
) -> Result<Json<CameraRead>, ApiError> {
    let mut conn = connection(&state)?;
    let actor = current_actor(&mut conn, &state, &headers)?;
    let camera = registry::create_camera(&mut conn, actor, &payload)?;
    Ok(Json(CameraRead::from(camera)))
}

async fn delete_camera(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(camera_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let mut conn = connection(&state)?;
    let actor = current_actor(&mut conn, &state, &headers)?;
    registry::delete_camera(&mut conn, actor, camera_id)?;
    Ok(StatusCode::NO_CONTENT)
}

// --- device ingestion ----------------------------------------------------

async fn ingest_sensor(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<SensorIngest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut conn = connection(&state)?;
    let token = device_token(&headers)?;
    ingest::submit_reading(&mut conn, token, &payload)?;
    Ok(Json(json!({ "ok": true })))
}

async fn ingest_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<EventIngest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut conn = connection(&state)?;
    let token = device_token(&headers)?;
    ingest::submit_event(&mut conn, token, &payload)?;
    Ok(Json(json!({ "ok": true })))
}

async fn ingest_heartbeat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<HeartbeatIngest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut conn = connection(&state)?;
    let token = device_token(&headers)?;
    ingest::heartbeat(&mut conn, token, &payload)?;
    Ok(Json(json!({ "ok": true, "received": Utc::now() })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_requires_scheme_prefix() {
        let mut headers = HeaderMap::new();
        assert!(bearer_token(&headers).is_err());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Token abc"));
        assert!(bearer_token(&headers).is_err());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(bearer_token(&headers).unwrap(), "abc");
    }

    #[test]
    fn device_token_header_is_required() {
        let mut headers = HeaderMap::new();
        assert!(matches!(device_token(&headers), Err(ApiError::Unauthorized(_))));

        headers.insert(DEVICE_TOKEN_HEADER, HeaderValue::from_static("deadbeef"));
        assert_eq!(device_token(&headers).unwrap(), "deadbeef");
    }

    #[test]
    fn device_read_exposes_wire_type_field() {
        let read = DeviceRead {
            id: 1,
            farm_id: 2,
            zone_id: 3,
            device_type: "gateway".to_string(),
            name: "gw-1".to_string(),
            device_token: "deadbeef".to_string(),
        };
        let json = serde_json::to_value(&read).unwrap();
        assert_eq!(json["type"], "gateway");
        assert!(json.get("device_type").is_none());
    }
}
