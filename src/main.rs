//! Payout Engine
//!
//! Batch entry point: loads payouts from a JSON fixture, creates each one,
//! lets the processing worker drain the queue, then prints the final records.
//!
//! ```text
//! ┌──────────┐    ┌──────────┐    ┌──────────┐    ┌──────────┐
//! │ Fixture  │───▶│ Service  │───▶│  Queue   │───▶│  Worker  │
//! │  (JSON)  │    │ (create) │    │  (mpsc)  │    │(process) │
//! └──────────┘    └──────────┘    └──────────┘    └──────────┘
//! ```

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;

use payout_engine::config::AppConfig;
use payout_engine::payout::{
    InMemoryPayoutStore, LimitCheck, NewPayout, PayoutService, PayoutStore, PgPayoutStore,
    ProcessingWorker, WorkerConfig, job_channel,
};

fn get_arg(names: &[&str], default: &str) -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if names.contains(&args[i].as_str()) && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    default.to_string()
}

async fn open_store(config: &AppConfig) -> anyhow::Result<Arc<dyn PayoutStore>> {
    match &config.postgres_url {
        Some(url) => {
            let store = PgPayoutStore::connect(url)
                .await
                .context("Failed to connect to PostgreSQL")?;
            tracing::info!("Using PostgreSQL payout store");
            Ok(Arc::new(store))
        }
        None => {
            tracing::info!("Using in-memory payout store");
            Ok(Arc::new(InMemoryPayoutStore::new()))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_arg(&["--env", "-e"], "dev");
    let input = get_arg(&["--input", "-i"], "fixtures/payouts.json");

    let app_config = AppConfig::load(&env)?;
    let _log_guard = payout_engine::logging::init_logging(&app_config);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        git = env!("GIT_HASH"),
        "Starting payout engine in {} mode",
        env
    );

    let content = std::fs::read_to_string(&input)
        .with_context(|| format!("Failed to read input file: {}", input))?;
    let requests: Vec<NewPayout> =
        serde_json::from_str(&content).with_context(|| format!("Invalid input: {}", input))?;
    tracing::info!(count = requests.len(), "Loaded payout requests from {}", input);

    let store = open_store(&app_config).await?;
    let (dispatcher, receiver) = job_channel(app_config.worker.queue_size.max(1));
    let service = Arc::new(PayoutService::new(
        store,
        Arc::new(dispatcher),
        Arc::new(LimitCheck::from_config(&app_config.processing)),
    ));

    let worker = Arc::new(ProcessingWorker::new(
        service.clone(),
        WorkerConfig::from(&app_config.worker),
    ));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker_handle = tokio::spawn(worker.run(receiver, shutdown_rx));

    let mut created = Vec::with_capacity(requests.len());
    for (index, request) in requests.into_iter().enumerate() {
        match service.create_payout(request).await {
            Ok(payout) => created.push(payout.id),
            Err(e) => tracing::warn!(index, code = e.code(), error = %e, "Payout rejected"),
        }
    }

    // Queue is closed; the worker drains what is already scheduled
    shutdown_tx.send(true).ok();
    let stats = worker_handle.await.context("Worker task failed")?;
    tracing::info!(
        acked = stats.acked,
        abandoned = stats.abandoned,
        discarded = stats.discarded,
        "Worker finished"
    );

    let mut results = Vec::with_capacity(created.len());
    for id in created {
        results.push(service.get_payout(id).await?);
    }
    println!("{}", serde_json::to_string_pretty(&results)?);

    Ok(())
}
