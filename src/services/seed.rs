//! Startup seeding: admin account and a default farm/zone.

use diesel::prelude::*;
use diesel::PgConnection;
use log::info;

use crate::auth::{self, Role};
use crate::config::Config;
use crate::db::models::{Farm, NewFarm, NewUser, NewZone, User};
use crate::error::ApiError;
use crate::schema;
use crate::services::registry::DEFAULT_ZONE_NAME;

pub const DEFAULT_FARM_NAME: &str = "Default Farm";

pub fn run(conn: &mut PgConnection, cfg: &Config) -> Result<(), ApiError> {
    let admin_id = ensure_admin(conn, cfg)?;
    ensure_default_farm(conn, admin_id)?;
    Ok(())
}

fn ensure_admin(conn: &mut PgConnection, cfg: &Config) -> Result<i64, ApiError> {
    use schema::users::dsl as U;

    let existing: Option<User> = U::users
        .filter(U::email.eq(&cfg.admin_email))
        .select(User::as_select())
        .first(conn)
        .optional()?;
    if let Some(user) = existing {
        return Ok(user.id);
    }

    let admin: User = diesel::insert_into(U::users)
        .values(&NewUser {
            email: cfg.admin_email.clone(),
            password_hash: auth::hash_password(&cfg.admin_password)?,
            role: Role::Admin.as_str().to_string(),
        })
        .returning(User::as_returning())
        .get_result(conn)?;
    info!("seeded admin account {}", admin.email);
    Ok(admin.id)
}

fn ensure_default_farm(conn: &mut PgConnection, admin_id: i64) -> Result<(), ApiError> {
    use schema::farms::dsl as F;
    use schema::zones::dsl as Z;

    let first: Option<Farm> = F::farms
        .order(F::id.asc())
        .select(Farm::as_select())
        .first(conn)
        .optional()?;

    match first {
        None => {
            conn.transaction::<_, ApiError, _>(|conn| {
                let farm: Farm = diesel::insert_into(F::farms)
                    .values(&NewFarm {
                        name: DEFAULT_FARM_NAME.to_string(),
                        location: Some("local".to_string()),
                        owner_id: None,
                    })
                    .returning(Farm::as_returning())
                    .get_result(conn)?;
                diesel::insert_into(Z::zones)
                    .values(&NewZone {
                        farm_id: farm.id,
                        name: DEFAULT_ZONE_NAME.to_string(),
                    })
                    .execute(conn)?;
                info!("seeded default farm {} with zone '{}'", farm.id, DEFAULT_ZONE_NAME);
                Ok(())
            })?;
        }
        Some(farm) => {
            // Migration concern: an old deployment may have left the default
            // farm owned by the seeded admin, which would block first-user
            // claiming. Release it.
            if farm.name == DEFAULT_FARM_NAME && farm.owner_id == Some(admin_id) {
                diesel::update(F::farms.find(farm.id))
                    .set(F::owner_id.eq(None::<i64>))
                    .execute(conn)?;
                info!("cleared admin ownership of default farm {}", farm.id);
            }
        }
    }
    Ok(())
}
