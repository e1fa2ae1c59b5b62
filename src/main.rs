pub mod api;
pub mod auth;
pub mod config;
pub mod db {
    pub mod models;
}
pub mod error;
pub mod schema;
pub mod services {
    pub mod ingest;
    pub mod ownership;
    pub mod query;
    pub mod registry;
    pub mod seed;
}

use crate::api::AppState;
use crate::config::Config;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::PgConnection;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use log::{error, info, warn};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

fn apply_database_migrations(conn: &mut PgConnection) -> Result<(), String> {
    match conn.run_pending_migrations(MIGRATIONS) {
        Ok(applied) => {
            if applied.is_empty() {
                info!("Database schema is up to date; no migrations were applied");
            } else {
                let names = applied.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", ");
                info!("Applied {} database migration(s): {}", applied.len(), names);
            }
            Ok(())
        }
        Err(e) => Err(format!("Applying database migrations failed: {}", e)),
    }
}

async fn run() -> Result<(), String> {
    // 1) Load config
    let cfg = Config::from_env()?;
    info!(
        "Config loaded (bind_addr={}, token_ttl={}min, admin_email={})",
        cfg.bind_addr,
        cfg.token_ttl.as_secs() / 60,
        cfg.admin_email
    );
    if cfg.uses_default_secret() {
        warn!("AQUA_SECRET_KEY is unset; using the development default. Do not run this in production.");
    }

    // 2) Connect DB pool
    let manager = ConnectionManager::<PgConnection>::new(&cfg.database_url);
    let pool = Pool::builder()
        .build(manager)
        .map_err(|e| format!("DB connection failed: {}", e))?;
    info!("Connected to database");

    // 3) Apply pending database migrations
    {
        let mut conn = pool.get().map_err(|e| format!("DB checkout failed: {}", e))?;
        apply_database_migrations(&mut conn)?;

        // 4) Seed admin account and default farm/zone
        services::seed::run(&mut conn, &cfg).map_err(|e| format!("startup seeding failed: {}", e))?;
    }

    // 5) Serve the API
    let state = AppState {
        pool,
        secret_key: cfg.secret_key.clone(),
        token_ttl: cfg.token_ttl,
    };
    let app = api::build_router(state);
    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr)
        .await
        .map_err(|e| format!("bind {} failed: {}", cfg.bind_addr, e))?;
    info!("Listening on {}", cfg.bind_addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await
        .map_err(|e| format!("server error: {}", e))
}

#[tokio::main]
async fn main() {
    let default_filter = env_logger::Env::default().default_filter_or("info");
    env_logger::Builder::from_env(default_filter)
        .format_timestamp_secs()
        .init();

    info!(
        "aqua-monitor {} (git {}) starting",
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_TIME_GIT_HASH")
    );
    if let Err(e) = run().await {
        error!("fatal: {}", e);
        std::process::exit(1);
    }
}
