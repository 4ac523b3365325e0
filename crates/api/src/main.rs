//! API server entry point.

use std::sync::Arc;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use api::AppState;
use api::config::Config;
use courier::CourierRegistry;
use ledger::{InMemoryOrderStore, OrderLedger, OrderStore, PostgresOrderStore};
use reconciler::{AutoAssignJob, Scheduler, StaleUnpaidCancelJob, StatusPollJob};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Builds the registry and scheduler over the chosen store, then serves
/// until a shutdown signal arrives.
async fn run<S: OrderStore + Clone + 'static>(
    config: Config,
    metrics_handle: PrometheusHandle,
    ledger: OrderLedger<S>,
) {
    let registry = Arc::new(
        CourierRegistry::from_config(&config.courier_config())
            .expect("invalid courier configuration"),
    );

    let mut scheduler = Scheduler::new();
    scheduler.spawn(
        Arc::new(StatusPollJob::new(ledger.clone(), registry.clone())),
        Duration::from_secs(config.status_poll_interval_minutes * 60),
    );
    scheduler.spawn(
        Arc::new(StaleUnpaidCancelJob::new(
            ledger.clone(),
            config.payment_timeout_hours,
        )),
        Duration::from_secs(config.stale_cancel_interval_minutes * 60),
    );
    if config.auto_assign_courier {
        scheduler.spawn(
            Arc::new(AutoAssignJob::new(ledger.clone(), registry.clone())),
            Duration::from_secs(config.auto_assign_interval_minutes * 60),
        );
    }

    let state = Arc::new(AppState { ledger, registry });
    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    scheduler.shutdown().await;
    tracing::info!("server shut down gracefully");
}

#[tokio::main]
async fn main() {
    // 1. Initialize tracing; LOG_FORMAT=json switches to JSON output
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if std::env::var("LOG_FORMAT").is_ok_and(|format| format == "json") {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Load configuration
    let config = Config::from_env().expect("invalid configuration");

    // 4. Select the order store and serve
    match config.database_url.clone() {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(&url)
                .await
                .expect("failed to connect to Postgres");
            let store = PostgresOrderStore::new(pool);
            store.run_migrations().await.expect("migrations failed");
            run(config, metrics_handle, OrderLedger::new(store)).await;
        }
        None => {
            tracing::warn!(
                "DATABASE_URL not set; using the in-memory store, all data is lost on shutdown"
            );
            let store = InMemoryOrderStore::new();
            run(config, metrics_handle, OrderLedger::new(store)).await;
        }
    }
}
