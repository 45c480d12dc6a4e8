use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashSet;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info, warn};
use validator::{Validate, ValidationError, ValidationErrors};

const CONFIG_DIR: &str = "config";

/// Secret shipped in `config/development.toml`. Refused anywhere else.
const DEV_DEFAULT_JWT_SECRET: &str =
    "this_is_a_development_secret_key_that_is_at_least_64_characters_long_for_testing";

/// Fallback values for every optional setting.
mod defaults {
    pub const ENVIRONMENT: &str = "development";
    pub const LOG_LEVEL: &str = "info";
    pub const PORT: u16 = 8080;
    pub const DATABASE_URL: &str = "sqlite://canteen.db?mode=rwc";

    pub fn port() -> u16 {
        PORT
    }
    pub fn log_level() -> String {
        LOG_LEVEL.to_owned()
    }
    pub fn issuer() -> String {
        "canteen-auth".to_owned()
    }
    pub fn audience() -> String {
        "canteen-api".to_owned()
    }
    pub fn pool_max() -> u32 {
        10
    }
    pub fn pool_min() -> u32 {
        1
    }
    pub fn connect_secs() -> u64 {
        30
    }
    pub fn idle_secs() -> u64 {
        600
    }
    pub fn acquire_secs() -> u64 {
        30
    }
    pub fn upload_dir() -> String {
        "uploads".to_owned()
    }
    pub fn upload_limit() -> usize {
        5 * 1024 * 1024
    }
    pub fn page_size() -> u64 {
        10
    }
    pub fn page_ceiling() -> u64 {
        100
    }
}

/// Runtime settings for the canteen service.
///
/// Every field maps to an `APP__<FIELD>` environment variable or a key in
/// `config/*.toml`.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    pub database_url: String,

    /// HS256 signing key for bearer tokens.
    #[validate(custom = "strong_secret")]
    pub jwt_secret: String,

    /// Token lifetime in seconds.
    #[validate(range(min = 300, max = 86400))]
    pub jwt_expiration: usize,

    #[serde(default = "defaults::issuer")]
    pub auth_issuer: String,

    #[serde(default = "defaults::audience")]
    pub auth_audience: String,

    pub host: String,

    #[serde(default = "defaults::port")]
    pub port: u16,

    /// `development`, `staging` or `production`.
    pub environment: String,

    #[serde(default = "defaults::log_level")]
    #[validate(custom = "known_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_json: bool,

    #[serde(default)]
    pub auto_migrate: bool,

    /// Comma-separated origins for the CORS layer.
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    #[serde(default)]
    pub cors_allow_any_origin: bool,

    #[serde(default = "defaults::pool_max")]
    pub db_max_connections: u32,

    #[serde(default = "defaults::pool_min")]
    pub db_min_connections: u32,

    #[serde(default = "defaults::connect_secs")]
    pub db_connect_timeout_secs: u64,

    #[serde(default = "defaults::idle_secs")]
    pub db_idle_timeout_secs: u64,

    #[serde(default = "defaults::acquire_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Where payment screenshots land.
    #[serde(default = "defaults::upload_dir")]
    pub upload_dir: String,

    /// Largest accepted screenshot, in bytes.
    #[serde(default = "defaults::upload_limit")]
    #[validate(range(min = 1024))]
    pub max_upload_bytes: usize,

    #[serde(default = "defaults::page_size")]
    #[validate(range(min = 1, max = 100))]
    pub default_page_size: u64,

    #[serde(default = "defaults::page_ceiling")]
    #[validate(range(min = 1, max = 500))]
    pub max_page_size: u64,
}

impl AppConfig {
    /// Builds a config from the required settings, defaulting the rest.
    pub fn new(
        database_url: String,
        jwt_secret: String,
        jwt_expiration: usize,
        host: String,
        port: u16,
        environment: String,
    ) -> Self {
        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            auth_issuer: defaults::issuer(),
            auth_audience: defaults::audience(),
            host,
            port,
            environment,
            log_level: defaults::log_level(),
            log_json: false,
            auto_migrate: false,
            cors_allowed_origins: None,
            cors_allow_any_origin: false,
            db_max_connections: defaults::pool_max(),
            db_min_connections: defaults::pool_min(),
            db_connect_timeout_secs: defaults::connect_secs(),
            db_idle_timeout_secs: defaults::idle_secs(),
            db_acquire_timeout_secs: defaults::acquire_secs(),
            upload_dir: defaults::upload_dir(),
            max_upload_bytes: defaults::upload_limit(),
            default_page_size: defaults::page_size(),
            max_page_size: defaults::page_ceiling(),
        }
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case(defaults::ENVIRONMENT)
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    /// Non-blank entries of `cors_allowed_origins`.
    pub fn cors_origins(&self) -> Vec<&str> {
        self.cors_allowed_origins
            .as_deref()
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn has_cors_allowed_origins(&self) -> bool {
        !self.cors_origins().is_empty()
    }

    pub fn should_allow_permissive_cors(&self) -> bool {
        self.cors_allow_any_origin || self.is_development()
    }

    /// Rules spanning several fields, or depending on the environment.
    fn check_deployment(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let mut reject = |field: &'static str, code: &'static str, message: &'static str| {
            let mut err = ValidationError::new(code);
            err.message = Some(message.into());
            errors.add(field, err);
        };

        if !self.has_cors_allowed_origins() && !self.should_allow_permissive_cors() {
            reject(
                "cors_allowed_origins",
                "cors_allowed_origins_required",
                "outside development list origins in APP__CORS_ALLOWED_ORIGINS or set APP__CORS_ALLOW_ANY_ORIGIN=true",
            );
        }
        if self.jwt_secret.trim() == DEV_DEFAULT_JWT_SECRET && !self.is_development() {
            reject(
                "jwt_secret",
                "jwt_secret_default_dev",
                "the development signing key cannot be used here; set APP__JWT_SECRET",
            );
        }
        if self.default_page_size > self.max_page_size {
            reject(
                "default_page_size",
                "default_page_size",
                "default_page_size must not exceed max_page_size",
            );
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("could not read configuration: {0}")]
    Load(#[from] ConfigError),

    #[error("invalid configuration: {0}")]
    Validation(#[from] ValidationErrors),
}

fn known_log_level(level: &str) -> Result<(), ValidationError> {
    match level.to_ascii_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => {
            let mut err = ValidationError::new("log_level");
            err.message = Some("expected trace, debug, info, warn or error".into());
            Err(err)
        }
    }
}

fn strong_secret(secret: &str) -> Result<(), ValidationError> {
    let secret = secret.trim();
    let distinct = secret.chars().collect::<HashSet<_>>().len();

    let problem = if secret.chars().count() < 64 {
        Some("signing key needs at least 64 characters")
    } else if distinct == 1 {
        Some("signing key is a single repeated character")
    } else if distinct < 10 {
        Some("signing key needs at least 10 distinct characters")
    } else {
        None
    };

    match problem {
        None => Ok(()),
        Some(message) => {
            let mut err = ValidationError::new("jwt_secret");
            err.message = Some(message.into());
            Err(err)
        }
    }
}

/// Installs the global subscriber. `RUST_LOG` wins over `level` when set.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let directives = match env::var("RUST_LOG") {
        Ok(value) if !value.trim().is_empty() => value,
        _ => format!("canteen_api={level},tower_http=debug,sea_orm=warn"),
    };
    let builder = fmt().with_env_filter(EnvFilter::new(directives));
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

/// Reads settings from built-in defaults, then `config/default.toml`, then
/// `config/<RUN_ENV>.toml`, then `APP__*` variables. Later sources win.
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| defaults::ENVIRONMENT.to_owned());
    info!(environment = %run_env, "loading configuration");

    if !Path::new(CONFIG_DIR).is_dir() {
        warn!(dir = CONFIG_DIR, "no config directory, using defaults and APP__* only");
    }

    let layered = Config::builder()
        .set_default("database_url", defaults::DATABASE_URL)?
        .set_default("jwt_expiration", 3600)?
        .set_default("host", "0.0.0.0")?
        .set_default("port", defaults::PORT)?
        .set_default("environment", defaults::ENVIRONMENT)?
        .set_default("log_level", defaults::LOG_LEVEL)?
        .add_source(File::with_name(&format!("{CONFIG_DIR}/default")).required(false))
        .add_source(File::with_name(&format!("{CONFIG_DIR}/{run_env}")).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    // The signing key never gets a built-in default.
    if layered.get_string("jwt_secret").is_err() {
        error!("no signing key configured; set APP__JWT_SECRET");
        return Err(ConfigError::NotFound("jwt_secret".into()).into());
    }

    let settings: AppConfig = layered.try_deserialize()?;
    if let Err(errors) = settings.validate().and_then(|()| settings.check_deployment()) {
        error!(?errors, "configuration rejected");
        return Err(errors.into());
    }

    info!(environment = %settings.environment, "configuration loaded");
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn production() -> AppConfig {
        AppConfig::new(
            "sqlite::memory:".into(),
            "k3y-for-canteen-tests-9f8e7d6c5b4a-3210-zyxwvutsrqponmlkjihgfedcba-0123456789".into(),
            3600,
            "127.0.0.1".into(),
            8080,
            "production".into(),
        )
    }

    #[test]
    fn field_rules_accept_a_sane_config() {
        assert!(production().validate().is_ok());
    }

    #[test]
    fn production_needs_explicit_origins() {
        let mut cfg = production();
        assert!(cfg.check_deployment().is_err());

        cfg.cors_allowed_origins = Some(" https://canteen.example.edu , ".into());
        assert_eq!(cfg.cors_origins(), vec!["https://canteen.example.edu"]);
        assert!(cfg.check_deployment().is_ok());
    }

    #[test]
    fn development_falls_back_to_any_origin() {
        let mut cfg = production();
        cfg.environment = "Development".into();
        assert!(cfg.should_allow_permissive_cors());
        assert!(cfg.check_deployment().is_ok());
    }

    #[test]
    fn dev_signing_key_is_refused_in_production() {
        let mut cfg = production();
        cfg.cors_allow_any_origin = true;
        cfg.jwt_secret = DEV_DEFAULT_JWT_SECRET.into();
        let errors = cfg.check_deployment().unwrap_err();
        assert!(errors.field_errors().contains_key("jwt_secret"));
    }

    #[test]
    fn default_page_size_cannot_exceed_ceiling() {
        let mut cfg = production();
        cfg.environment = "development".into();
        cfg.default_page_size = 50;
        cfg.max_page_size = 20;
        let errors = cfg.check_deployment().unwrap_err();
        assert!(errors.field_errors().contains_key("default_page_size"));
    }

    #[test]
    fn weak_signing_keys_are_rejected() {
        assert!(strong_secret("short").is_err());
        assert!(strong_secret(&"a".repeat(80)).is_err());
        assert!(strong_secret(&"ab".repeat(40)).is_err());
        assert!(strong_secret(DEV_DEFAULT_JWT_SECRET).is_ok());
    }

    #[test]
    fn log_levels_are_case_insensitive() {
        assert!(known_log_level("WARN").is_ok());
        assert!(known_log_level("verbose").is_err());
    }
}
