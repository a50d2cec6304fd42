use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wattsched_api::background::{job_poll, price_poll};
use wattsched_api::config::ServerConfig;
use wattsched_api::engine::dispatcher::DueJobDispatcher;
use wattsched_api::engine::runner::JobRunner;
use wattsched_api::router::build_app_router;
use wattsched_api::state::AppState;
use wattsched_db::{DbPool, JobStore, MemoryJobStore, PgJobStore};
use wattsched_events::EventBus;
use wattsched_inference::{HttpExecutionBackend, HttpPredictionService, HttpPriceSource};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wattsched_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Job store ---
    let (jobs, pool) = open_job_store(&config).await;

    // --- Upstream services ---
    let predictions = Arc::new(
        HttpPredictionService::new(&config.prediction_service_url, config.upstream_timeout())
            .expect("Failed to build prediction client"),
    );
    let prices = Arc::new(
        HttpPriceSource::new(&config.price_service_url, config.upstream_timeout())
            .expect("Failed to build price client"),
    );
    let backend = Arc::new(
        HttpExecutionBackend::new(&config.executor_url, config.execution_timeout())
            .expect("Failed to build executor client"),
    );
    tracing::info!(
        prediction = %config.prediction_service_url,
        price = %config.price_service_url,
        executor = %config.executor_url,
        "Upstream clients configured",
    );

    // --- Event bus ---
    let event_bus = Arc::new(EventBus::default());

    // --- Job runner ---
    let runner = Arc::new(JobRunner::new(
        Arc::clone(&jobs),
        backend,
        Arc::clone(&event_bus),
        config.execution_timeout(),
    ));

    // --- Background tasks ---
    let shutdown = CancellationToken::new();

    let price_refresh = price_poll::start(
        prices.clone(),
        config.price_poll_interval(),
        shutdown.child_token(),
    );
    let job_refresh = job_poll::start(
        Arc::clone(&jobs),
        config.job_poll_interval(),
        shutdown.child_token(),
    );

    let dispatcher = DueJobDispatcher::new(Arc::clone(&runner));
    let dispatch_cancel = shutdown.child_token();
    let job_list = job_refresh.subscribe();
    let dispatch_handle = tokio::spawn(async move {
        dispatcher.run(job_list, dispatch_cancel).await;
    });
    tracing::info!("Background tasks started (price refresh, job refresh, dispatcher)");

    // --- App state ---
    let state = AppState {
        jobs,
        runner,
        predictions,
        prices,
        price_snapshot: price_refresh.subscribe(),
        event_bus,
        pool,
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    shutdown.cancel();
    let grace = Duration::from_secs(config.shutdown_timeout_secs);

    if tokio::time::timeout(grace, dispatch_handle).await.is_err() {
        tracing::warn!("Dispatcher did not stop within the grace period");
    }
    let _ = tokio::time::timeout(grace, job_refresh.shutdown()).await;
    let _ = tokio::time::timeout(grace, price_refresh.shutdown()).await;
    tracing::info!("Background tasks stopped");

    tracing::info!("Graceful shutdown complete");
}

/// PostgreSQL when `DATABASE_URL` is set, otherwise an in-memory store.
///
/// Panics if the database is configured but unreachable or its migrations
/// fail.
async fn open_job_store(config: &ServerConfig) -> (Arc<dyn JobStore>, Option<DbPool>) {
    let Some(database_url) = &config.database_url else {
        tracing::info!("DATABASE_URL not set, keeping jobs in memory");
        return (Arc::new(MemoryJobStore::new()), None);
    };

    let pool = wattsched_db::create_pool(database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    wattsched_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    wattsched_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    (Arc::new(PgJobStore::new(pool.clone())), Some(pool))
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
