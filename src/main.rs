use pse_checkout::api::{self, AppState};
use pse_checkout::config::AppConfig;
use pse_checkout::database::memory::InMemoryTransactionStore;
use pse_checkout::database::repository::TransactionStore;
use pse_checkout::health::HealthChecker;
use pse_checkout::logging::init_tracing;
use pse_checkout::payments::WompiProcessor;
use pse_checkout::services::payment_orchestrator::{OrchestratorConfig, PaymentOrchestrator};
use pse_checkout::services::transaction_status::TransactionStatusService;
use pse_checkout::services::webhook_processor::WebhookProcessor;
use pse_checkout::workers::reconciliation::ReconciliationWorker;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}

async fn shutdown_signal_with_notify(shutdown_tx: watch::Sender<bool>) {
    shutdown_signal().await;
    let _ = shutdown_tx.send(true);
}

#[cfg(feature = "database")]
async fn build_store(config: &AppConfig) -> anyhow::Result<Arc<dyn TransactionStore>> {
    use pse_checkout::database::{connect, run_migrations};
    use pse_checkout::database::transaction_repository::PgTransactionStore;

    match &config.database {
        Some(db_config) => {
            info!("Connecting to database");
            let pool = connect(db_config).await?;
            run_migrations(&pool).await?;
            info!("✅ Database ready");
            Ok(Arc::new(PgTransactionStore::new(pool)))
        }
        None => {
            warn!("SKIP_EXTERNALS=true, transactions are kept in memory only");
            Ok(Arc::new(InMemoryTransactionStore::new()))
        }
    }
}

#[cfg(not(feature = "database"))]
async fn build_store(config: &AppConfig) -> anyhow::Result<Arc<dyn TransactionStore>> {
    if config.database.is_some() {
        warn!("Built without the database feature, ignoring DATABASE_URL");
    }
    warn!("Transactions are kept in memory only");
    Ok(Arc::new(InMemoryTransactionStore::new()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    init_tracing(&config.logging);
    config.validate()?;

    info!(
        environment = ?config.processor.environment,
        base_url = %config.processor.base_url,
        "Starting PSE checkout service"
    );

    let store = build_store(&config).await?;
    let processor = Arc::new(WompiProcessor::new(&config.processor)?);

    let orchestrator = Arc::new(PaymentOrchestrator::new(
        processor,
        store.clone(),
        OrchestratorConfig::new(&config.checkout, &config.processor),
    ));
    let webhooks = Arc::new(WebhookProcessor::new(
        store.clone(),
        config.processor.integrity_secret.clone(),
    ));
    let status = Arc::new(TransactionStatusService::new(store.clone()));

    let (worker_shutdown_tx, worker_shutdown_rx) = watch::channel(false);
    let reconciliation_handle = if config.reconciliation.enabled {
        let worker = ReconciliationWorker::new(
            store.clone(),
            orchestrator.clone(),
            config.reconciliation.clone(),
        );
        Some(tokio::spawn(worker.run(worker_shutdown_rx)))
    } else {
        info!("Reconciliation worker disabled");
        None
    };

    let app = api::app(AppState {
        orchestrator,
        webhooks,
        status,
        health: HealthChecker::new(store),
    });

    let addr: SocketAddr =
        format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!("❌ Failed to bind to address {}: {}", addr, e);
        e
    })?;

    info!(address = %addr, "🚀 Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_with_notify(worker_shutdown_tx.clone()))
        .await?;

    let _ = worker_shutdown_tx.send(true);
    if let Some(handle) = reconciliation_handle {
        if let Err(e) = tokio::time::timeout(Duration::from_secs(5), handle).await {
            error!(error = %e, "Timed out waiting for reconciliation worker shutdown");
        }
    }

    info!("👋 Server shutdown complete");

    Ok(())
}
