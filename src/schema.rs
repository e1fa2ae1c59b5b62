//! Handwritten Diesel schema declarations used by model structs.
//!
//! Migrations define the actual tables and constraints. This module only
//! provides `diesel::table!` declarations so we can derive Insertable/Queryable
//! in a type-safe way without running `diesel print-schema`.

diesel::table! {
    users (id) {
        id -> BigInt,
        email -> Text,
        password_hash -> Text,
        role -> Text, // admin | operator
        created_at -> Timestamptz,
    }
}

// Top-level tenant unit. `owner_id` is a weak reference to `users`:
// NULL means unclaimed, and the first non-admin mutator claims the farm.
diesel::table! {
    farms (id) {
        id -> BigInt,
        name -> Text,
        location -> Nullable<Text>,
        owner_id -> Nullable<BigInt>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    zones (id) {
        id -> BigInt,
        farm_id -> BigInt,
        name -> Text,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    devices (id) {
        id -> BigInt,
        farm_id -> BigInt,
        zone_id -> BigInt,
        device_type -> Text,
        name -> Text,
        device_token -> Text,
        last_seen -> Timestamptz,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    cameras (id) {
        id -> BigInt,
        farm_id -> BigInt,
        zone_id -> BigInt,
        camera_type -> Text,
        name -> Text,
        stream_url -> Text,
        created_at -> Timestamptz,
    }
}

// Append-only telemetry rows; never updated after insert.
diesel::table! {
    sensor_readings (id) {
        id -> BigInt,
        farm_id -> BigInt,
        zone_id -> BigInt,
        device_id -> Nullable<BigInt>,
        temperature_c -> Double,
        turbidity_ntu -> Double,
        dissolved_oxygen_mg_l -> Double,
        ph -> Nullable<Double>,
        created_at -> Timestamptz,
    }
}

// AI-detected events arriving pre-classified from field agents.
diesel::table! {
    events (id) {
        id -> BigInt,
        farm_id -> BigInt,
        zone_id -> BigInt,
        camera_id -> Nullable<BigInt>,
        device_id -> Nullable<BigInt>,
        event_type -> Text,
        confidence -> Double,
        message -> Text,
        snapshot_url -> Nullable<Text>,
        created_at -> Timestamptz,
    }
}

diesel::joinable!(zones -> farms (farm_id));
diesel::joinable!(devices -> farms (farm_id));
diesel::joinable!(devices -> zones (zone_id));
diesel::joinable!(cameras -> farms (farm_id));
diesel::joinable!(cameras -> zones (zone_id));
diesel::joinable!(sensor_readings -> farms (farm_id));
diesel::joinable!(sensor_readings -> zones (zone_id));
diesel::joinable!(sensor_readings -> devices (device_id));
diesel::joinable!(events -> farms (farm_id));
diesel::joinable!(events -> zones (zone_id));
diesel::joinable!(events -> cameras (camera_id));
diesel::joinable!(events -> devices (device_id));

diesel::allow_tables_to_appear_in_same_query!(
    users,
    farms,
    zones,
    devices,
    cameras,
    sensor_readings,
    events,
);
