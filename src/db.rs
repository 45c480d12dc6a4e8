use std::time::{Duration, Instant};

use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use tracing::{debug, error, info};

use crate::{config::AppConfig, errors::ServiceError, migrator::Migrator};

pub type DbPool = DatabaseConnection;

/// Pool sizing and timeouts.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
    pub acquire_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            acquire_timeout: Duration::from_secs(8),
        }
    }
}

impl DbConfig {
    /// Single-connection pool; each SQLite `:memory:` connection is a separate database.
    pub fn in_memory_sqlite() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            min_connections: 1,
            idle_timeout: Duration::from_secs(3600),
            ..Default::default()
        }
    }
}

impl From<&AppConfig> for DbConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            url: cfg.database_url.clone(),
            max_connections: cfg.db_max_connections,
            min_connections: cfg.db_min_connections,
            connect_timeout: Duration::from_secs(cfg.db_connect_timeout_secs),
            idle_timeout: Duration::from_secs(cfg.db_idle_timeout_secs),
            acquire_timeout: Duration::from_secs(cfg.db_acquire_timeout_secs),
        }
    }
}

/// Opens a pool with the given sizing. SQL statement logging stays off;
/// request spans already carry the timing.
pub async fn establish_connection_with_config(config: &DbConfig) -> Result<DbPool, ServiceError> {
    let mut options = ConnectOptions::new(config.url.as_str());
    options
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(config.connect_timeout)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .sqlx_logging(false);

    debug!(?config, "opening database pool");
    match Database::connect(options).await {
        Ok(pool) => {
            info!(max = config.max_connections, "database pool ready");
            Ok(pool)
        }
        Err(err) => {
            error!(error = %err, "could not open database pool");
            Err(err.into())
        }
    }
}

pub async fn establish_connection_from_app_config(cfg: &AppConfig) -> Result<DbPool, ServiceError> {
    establish_connection_with_config(&DbConfig::from(cfg)).await
}

/// Brings the schema up to date, including the payment method seed rows.
pub async fn run_migrations(pool: &DbPool) -> Result<(), ServiceError> {
    let started = Instant::now();
    match Migrator::up(pool, None).await {
        Ok(()) => {
            info!(elapsed = ?started.elapsed(), "schema is current");
            Ok(())
        }
        Err(err) => {
            error!(elapsed = ?started.elapsed(), error = %err, "schema migration failed");
            Err(err.into())
        }
    }
}

/// Round-trips to the database; used by `/api/v1/status`.
pub async fn check_connection(pool: &DbPool) -> Result<(), ServiceError> {
    pool.ping().await.map_err(|err| {
        error!(error = %err, "database ping failed");
        ServiceError::from(err)
    })
}
