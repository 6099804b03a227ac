//! db-repository - connectivity check.
//!
//! Opens a connection pool against the configured MySQL or SQLite target,
//! pings the store, reports pool statistics and shuts the pool down.

use db_repository::Context;
use db_repository::config::Config;
use db_repository::db::ConnectionPool;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber.with(fmt::layer().json()).init();
    } else {
        subscriber
            .with(fmt::layer().with_target(true).with_thread_ids(false))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse_args();
    init_tracing(&config);

    let (target, options) = match config.resolve() {
        Ok(resolved) => resolved,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };

    info!(
        target_url = %target.masked(),
        db_type = %target.db_type(),
        "Starting db-repository v{}",
        env!("CARGO_PKG_VERSION")
    );

    let ctx = match options.acquire_timeout {
        Some(timeout) => Context::with_timeout(timeout),
        None => Context::with_timeout(config.query_timeout_duration()),
    };

    let pool = match ConnectionPool::connect(&ctx, target, options).await {
        Ok(pool) => pool,
        Err(e) => {
            match e.suggestion() {
                Some(hint) => error!(error = %e, suggestion = hint, "Connection failed"),
                None => error!(error = %e, "Connection failed"),
            }
            return Err(e.into());
        }
    };

    let mut conn = pool.acquire(&ctx).await?;
    let version = conn
        .server_version(&ctx.timeout(config.query_timeout_duration()))
        .await;
    conn.release().await;

    match version {
        Ok(version) => info!(version = %version, "Connected"),
        Err(e) => {
            error!(error = %e, "Failed to read server version");
            pool.close().await;
            return Err(e.into());
        }
    }

    println!("{}", serde_json::to_string_pretty(&pool.stats())?);

    pool.close().await;
    info!("Shutdown complete");
    Ok(())
}
