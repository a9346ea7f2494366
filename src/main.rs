// Early Bidders - token launch analysis service
// Queues token analyses, finds early high-value buyers, serves results over HTTP

use std::sync::Arc;

use anyhow::{Context, Result};
use early_bidders::api::{self, AppState};
use early_bidders::config::Config;
use early_bidders::jobs::{AnalysisOrchestrator, OrchestratorSettings};
use early_bidders::ledger::HeliusClient;
use early_bidders::logging::init_logging;
use early_bidders::metrics::ServiceMetrics;
use early_bidders::notify::BroadcastNotifier;
use early_bidders::store::SqliteTokenStore;
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load_or_default()?;
    init_logging(&config.monitoring);
    config.validate(true)?;

    info!("🚀 Early Bidder Analysis Service Starting...");
    info!("⚙️  Configuration loaded");
    info!(
        "   Workers: {} | Fetch timeout: {}s | Min buy: ${}",
        config.jobs.max_concurrent_jobs,
        config.jobs.fetch_timeout_secs,
        config.analysis.min_usd_filter
    );

    let metrics = Arc::new(
        ServiceMetrics::with_retention(config.jobs.max_retained_jobs)
            .context("Failed to create metrics registry")?,
    );

    let store = SqliteTokenStore::new(
        &config.storage.database_path,
        config.storage.wal_mode,
        &config.storage.results_dir,
        &config.storage.exports_dir,
    )
    .with_context(|| {
        format!(
            "Failed to open database: {}",
            config.storage.database_path.display()
        )
    })?;
    info!("✅ Database initialized: {}", config.storage.database_path.display());

    let ledger = HeliusClient::new(&config.rpc).context("Failed to create ledger client")?;
    info!("✅ Ledger client ready: {}", config.rpc.endpoint);

    let notifier = Arc::new(BroadcastNotifier::new(config.jobs.notification_buffer));

    let orchestrator = AnalysisOrchestrator::new(
        OrchestratorSettings::from(&config),
        Arc::new(ledger),
        Arc::new(store),
        notifier.clone(),
        metrics.clone(),
    );

    let state = AppState {
        orchestrator,
        metrics,
        notifier,
    };

    let addr = format!("{}:{}", config.server.bind_address, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    api::serve(listener, state).await?;

    info!("👋 Early Bidder Analysis Service stopped");
    Ok(())
}
