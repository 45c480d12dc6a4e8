use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::Arc,
};

use http::HeaderValue;
use tokio::signal;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
};
use tracing::{error, info, warn};

use canteen_api::{build_router, config, db, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = config::load_config()?;
    config::init_tracing(cfg.log_level(), cfg.log_json);

    let pool = db::establish_connection_from_app_config(&cfg).await?;
    if cfg.auto_migrate {
        if let Err(err) = db::run_migrations(&pool).await {
            error!(error = %err, "schema migration failed, refusing to start");
            return Err(err.into());
        }
    }

    // Screenshot uploads are written beneath this directory.
    tokio::fs::create_dir_all(&cfg.upload_dir).await?;

    let cors = cors_layer(&cfg)?;
    let bind_ip = cfg.host.parse::<IpAddr>().unwrap_or_else(|_| {
        warn!(host = %cfg.host, "host is not an IP address, listening on all interfaces");
        IpAddr::V4(Ipv4Addr::UNSPECIFIED)
    });
    let addr = SocketAddr::new(bind_ip, cfg.port);

    let app = build_router(AppState::new(Arc::new(pool), cfg))
        .layer(CompressionLayer::new())
        .layer(cors);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "canteen-api accepting connections");
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("canteen-api stopped");
    Ok(())
}

/// Explicit origins win. Without them only development, or an explicit
/// opt-in, may run with a permissive policy.
fn cors_layer(cfg: &config::AppConfig) -> Result<CorsLayer, Box<dyn std::error::Error>> {
    let origins: Vec<HeaderValue> = cfg
        .cors_origins()
        .into_iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin, "skipping malformed CORS origin");
                None
            }
        })
        .collect();

    if !origins.is_empty() {
        return Ok(CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any));
    }
    if cfg.should_allow_permissive_cors() {
        info!(
            environment = %cfg.environment,
            "no CORS origins configured, accepting any origin"
        );
        return Ok(CorsLayer::permissive());
    }

    error!("no usable CORS origins; set APP__CORS_ALLOWED_ORIGINS or APP__CORS_ALLOW_ANY_ORIGIN=true");
    Err("no usable CORS origins configured".into())
}

async fn shutdown_signal() {
    let interrupt = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "cannot listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(error = %err, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => {},
        _ = terminate => {},
    }
    info!("draining connections before shutdown");
}
