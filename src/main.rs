use std::net::SocketAddr;

use skin_database::{config, config::AppConfig, db, notify, routes, state::AppState};
use sqlx::{migrate::MigrateDatabase, sqlite::SqlitePoolOptions, Sqlite, SqlitePool};
use tokio::time::{self, Duration};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const LOG_DIR: &str = "logs";
const RATE_LIMIT_CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

/// Stdout plus a daily rotated file. The guards must outlive `main` so buffered
/// lines are flushed on exit.
fn init_logging() -> (WorkerGuard, WorkerGuard) {
    if let Err(e) = std::fs::create_dir_all(LOG_DIR) {
        eprintln!("cannot create {}: {}", LOG_DIR, e);
    }
    let (stdout_nb, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
    let (file_nb, file_guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(LOG_DIR, "skin-database.log"));
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=info,sqlx=warn".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(stdout_nb))
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(file_nb))
        .init();
    (stdout_guard, file_guard)
}

async fn open_database(cfg: &AppConfig) -> anyhow::Result<SqlitePool> {
    let db_url = cfg.database.url.as_str();
    config::ensure_sqlite_parent_dir(db_url)?;
    if !Sqlite::database_exists(db_url).await.unwrap_or(false) {
        info!("Creating SQLite database at {}", db_url);
        Sqlite::create_database(db_url).await?;
    }
    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA foreign_keys=ON;").execute(&mut *conn).await?;
                if let Err(e) = sqlx::query("PRAGMA busy_timeout=10000;").execute(&mut *conn).await {
                    tracing::warn!("Failed to set busy_timeout on new connection: {}", e);
                }
                Ok(())
            })
        })
        .connect(db_url)
        .await?;
    db::init_db(&pool).await?;
    Ok(pool)
}

fn spawn_rate_limit_cleanup(state: &AppState) {
    let limiter = state.rate_limiter.clone();
    tokio::spawn(async move {
        let mut ticker = time::interval(RATE_LIMIT_CLEANUP_INTERVAL);
        loop {
            ticker.tick().await;
            limiter.cleanup_all().await;
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _log_guards = init_logging();

    // Embedded defaults -> skin-database.toml -> $SKIN_DATABASE_CONFIG -> env/.env
    let app_cfg = config::load()?;
    let pool = open_database(&app_cfg).await?;

    let notifier = notify::from_config(&app_cfg.discord)?;
    let state = AppState::new(pool, app_cfg.clone(), notifier);
    spawn_rate_limit_cleanup(&state);

    let app = routes::router(state)?;

    let addr: SocketAddr = format!("{}:{}", app_cfg.server.host, app_cfg.server.port).parse().map_err(|e| {
        anyhow::anyhow!("invalid listen addr {}:{} - {}", app_cfg.server.host, app_cfg.server.port, e)
    })?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!(
        cache_entries = app_cfg.cache.max_entries,
        discord = app_cfg.discord.enabled,
        "Skin database listening on http://{}",
        listener.local_addr()?
    );
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    info!("Shutdown signal received, draining connections");
}
