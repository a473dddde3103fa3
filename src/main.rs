//! CityForge authentication service entry point

use cityforge_auth::{
    auth::{JwtService, RateLimiter},
    config::AppConfig,
    db,
    middleware::AppState,
    routes,
    services::AuthService,
    store::{PgTokenBlacklist, PgUserStore},
    telemetry,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;

/// Cadence for purging expired blacklist entries
const TOKEN_CLEANUP_INTERVAL_SECS: u64 = 3600;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 {
        match args[1].as_str() {
            "--version" => {
                println!("cityforge-auth {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" => {
                print_help();
                return Ok(());
            }
            _ => {
                eprintln!("Unknown argument: {}", args[1]);
                print_help();
                std::process::exit(1);
            }
        }
    }

    // .env files are a development convenience; production sets real
    // environment variables
    if let Ok(profile) = std::env::var("CITYFORGE_ENV") {
        dotenv::from_filename(format!(".env.{}", profile)).ok();
    } else {
        dotenv::from_filename(".env.local").ok();
        dotenv::dotenv().ok();
    }

    // Configuration must load before telemetry; a missing signing secret
    // aborts startup here
    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        anyhow::anyhow!("Failed to load configuration: {}", e)
    })?;

    telemetry::init_telemetry(&config);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "CityForge auth service starting...");

    let db_pool = db::create_pool(&config.database).await?;
    db::run_migrations(&db_pool).await?;

    tracing::info!("Database initialized");

    let jwt_service = Arc::new(JwtService::from_config(&config)?);
    let users: Arc<dyn cityforge_auth::store::UserStore> =
        Arc::new(PgUserStore::new(db_pool.clone()));
    let blacklist: Arc<dyn cityforge_auth::store::TokenBlacklist> =
        Arc::new(PgTokenBlacklist::new(db_pool.clone()));

    let auth_service = Arc::new(AuthService::new(
        users.clone(),
        blacklist.clone(),
        jwt_service.clone(),
        config.security.clone(),
    ));

    let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));

    let state = Arc::new(AppState {
        config: config.clone(),
        jwt_service,
        auth_service: auth_service.clone(),
        users,
        blacklist,
        rate_limiter: rate_limiter.clone(),
    });

    // Periodic maintenance: purge expired blacklist rows and idle
    // rate-limit windows
    let maintenance_pool = db_pool.clone();
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(tokio::time::Duration::from_secs(TOKEN_CLEANUP_INTERVAL_SECS));
        interval.tick().await; // first tick fires immediately
        loop {
            interval.tick().await;
            if let Err(e) = auth_service.cleanup_expired_tokens().await {
                tracing::warn!(error = %e, "Token cleanup failed");
            }
            rate_limiter.evict_idle();
            db::record_pool_metrics(&maintenance_pool);
        }
    });

    let app = routes::create_router(state);

    let addr = &config.server.addr;
    let listener = TcpListener::bind(addr).await?;

    tracing::info!(addr = %addr, "Server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(config.server.graceful_shutdown_timeout_secs))
    .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown on Ctrl+C or SIGTERM
async fn shutdown_signal(timeout_secs: u64) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
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
        _ = ctrl_c => {
            tracing::info!("Ctrl+C received, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Terminate signal received, starting graceful shutdown");
        },
    }

    tokio::time::sleep(tokio::time::Duration::from_secs(timeout_secs)).await;
    tracing::warn!("Graceful shutdown timeout reached, forcing exit");
}

fn print_help() {
    println!("cityforge-auth {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Usage: cityforge-auth [options]");
    println!();
    println!("Options:");
    println!("  --version     Print version and exit");
    println!("  --help        Print this help and exit");
    println!();
    println!("Configuration is read from CITYFORGE_-prefixed environment variables;");
    println!("see .env.example for the available settings.");
}
