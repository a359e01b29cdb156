//! GestMantIA Server
//!
//! Production server for the identity and security administration APIs:
//! - Auth APIs: login, register, refresh, revoke, password recovery
//! - Admin APIs: users, roles, permissions, security logs and alerts
//! - Account APIs: profile and password of the signed-in user
//! - Health checks, Prometheus metrics and Swagger UI
//!
//! ## Configuration
//!
//! Read from `gestmantia.toml` (or the file named by `GESTMANTIA_CONFIG`);
//! `GESTMANTIA_*` environment variables override individual settings.
//!
//! | Variable | Description |
//! |----------|-------------|
//! | `GESTMANTIA_HTTP_PORT` | HTTP port |
//! | `GESTMANTIA_DATABASE_URL` | SQLite URL, e.g. `sqlite://gestmantia.db?mode=rwc` |
//! | `GESTMANTIA_JWT_SECRET_KEY` | HMAC signing secret, at least 32 bytes |
//! | `LOG_FORMAT` | `json` for structured output |
//! | `RUST_LOG` | Log level filter |

use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::{net::TcpListener, signal};
use tracing::info;

use gm_config::AppConfig;
use gm_platform::auth::email::sender_from_config;
use gm_platform::auth::password_service::Argon2Config;
use gm_platform::db::{self, PoolConfig};
use gm_platform::Platform;

#[tokio::main]
async fn main() -> Result<()> {
    gm_common::logging::init_logging("gm-server");

    let config = AppConfig::load().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    let pool = db::connect(&PoolConfig::from(&config.database)).await?;
    db::migrate(&pool).await?;

    let email = sender_from_config(&config.email)?;
    let platform = Platform::new(pool, &config, email, Argon2Config::default());
    platform.seeder().seed().await.context("Failed to seed initial data")?;

    let mut app = platform.router();
    if config.metrics.enabled {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("Failed to install Prometheus recorder")?;
        metrics::gauge!("gestmantia_up").set(1.0);
        app = app.route(&config.metrics.path, get(move || std::future::ready(handle.render())));
        info!(path = %config.metrics.path, "Metrics endpoint enabled");
    }

    let addr = format!("{}:{}", config.http.host, config.http.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    platform.health.set_ready();
    info!("API server listening on http://{}", addr);
    info!("Swagger UI at http://{}{}", addr, gm_platform::app::SWAGGER_PATH);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    platform.pool.close().await;
    info!("GestMantIA Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received...");
}
