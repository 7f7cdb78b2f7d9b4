//! Processing Worker
//!
//! Consumes `process_payout` jobs and drives them through
//! [`PayoutService::process_payout`] with a bounded, jittered retry policy.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::{Semaphore, watch};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use super::dispatcher::{Job, JobReceiver, PROCESS_PAYOUT_JOB, ProcessPayoutPayload};
use super::error::PayoutError;
use super::service::PayoutService;
use super::state::PayoutStatus;
use super::types::PayoutId;
use crate::config::WorkerSettings;

/// Configuration for the processing worker
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Total attempts per job, including the first
    pub max_attempts: u32,
    /// Lower bound of the random pause between attempts
    pub retry_delay_min: Duration,
    /// Upper bound of the random pause between attempts
    pub retry_delay_max: Duration,
    /// Jobs handled concurrently
    pub concurrency: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self::from(&WorkerSettings::default())
    }
}

impl From<&WorkerSettings> for WorkerConfig {
    fn from(settings: &WorkerSettings) -> Self {
        Self {
            max_attempts: settings.max_attempts,
            retry_delay_min: Duration::from_millis(settings.retry_delay_min_ms),
            retry_delay_max: Duration::from_millis(settings.retry_delay_max_ms),
            concurrency: settings.concurrency,
        }
    }
}

/// What happened to a single job
#[derive(Debug, Clone)]
pub enum JobOutcome {
    /// `process_payout` returned a record; the job is done
    Acked {
        payout_id: PayoutId,
        status: PayoutStatus,
        attempts: u32,
    },
    /// Every attempt failed with a retryable error
    Abandoned {
        payout_id: PayoutId,
        attempts: u32,
        error: PayoutError,
    },
    /// Malformed job or a failure no retry can fix
    Discarded { reason: String },
}

/// Tally of job outcomes for one `run`
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorkerStats {
    pub acked: usize,
    pub abandoned: usize,
    pub discarded: usize,
}

impl WorkerStats {
    fn record(&mut self, outcome: &JobOutcome) {
        match outcome {
            JobOutcome::Acked { .. } => self.acked += 1,
            JobOutcome::Abandoned { .. } => self.abandoned += 1,
            JobOutcome::Discarded { .. } => self.discarded += 1,
        }
    }

    fn record_join(&mut self, joined: Result<JobOutcome, JoinError>) {
        match joined {
            Ok(outcome) => self.record(&outcome),
            Err(e) => {
                error!(error = %e, "Payout job task panicked");
                self.abandoned += 1;
            }
        }
    }
}

/// Processing Worker
pub struct ProcessingWorker {
    service: Arc<PayoutService>,
    config: WorkerConfig,
}

impl ProcessingWorker {
    pub fn new(service: Arc<PayoutService>, config: WorkerConfig) -> Self {
        Self { service, config }
    }

    /// Consume jobs until the queue ends.
    ///
    /// Setting `shutdown` to `true` closes the queue: jobs already queued are
    /// still handled and in-flight jobs are awaited before returning.
    pub async fn run(
        self: Arc<Self>,
        mut receiver: JobReceiver,
        mut shutdown: watch::Receiver<bool>,
    ) -> WorkerStats {
        info!(
            max_attempts = self.config.max_attempts,
            concurrency = self.config.concurrency,
            "Starting processing worker"
        );

        let permits = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let mut tasks = JoinSet::new();
        let mut stats = WorkerStats::default();

        let mut closing = *shutdown.borrow();
        if closing {
            receiver.close();
        }

        loop {
            tokio::select! {
                job = receiver.recv() => {
                    let Some(job) = job else { break };
                    let Ok(permit) = permits.clone().acquire_owned().await else { break };
                    let worker = Arc::clone(&self);
                    tasks.spawn(async move {
                        let outcome = worker.handle(job).await;
                        drop(permit);
                        outcome
                    });
                }
                _ = shutdown.changed(), if !closing => {
                    closing = true;
                    info!("Shutdown requested, draining job queue");
                    receiver.close();
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    stats.record_join(joined);
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            stats.record_join(joined);
        }

        info!(
            acked = stats.acked,
            abandoned = stats.abandoned,
            discarded = stats.discarded,
            "Processing worker stopped"
        );
        stats
    }

    /// Handle a single delivered job
    pub async fn handle(&self, job: Job) -> JobOutcome {
        if job.name != PROCESS_PAYOUT_JOB {
            warn!(job = %job.name, "Discarding unknown job");
            return JobOutcome::Discarded {
                reason: format!("Unknown job: {}", job.name),
            };
        }

        let payload: ProcessPayoutPayload = match serde_json::from_value(job.payload) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Discarding job with malformed payload");
                return JobOutcome::Discarded {
                    reason: format!("Malformed payload: {}", e),
                };
            }
        };

        let payout_id: PayoutId = match payload.payout_id.parse() {
            Ok(id) => id,
            Err(e) => {
                warn!(payout_id = %payload.payout_id, error = %e, "Discarding job with invalid payout id");
                return JobOutcome::Discarded {
                    reason: format!("Invalid payout id: {}", payload.payout_id),
                };
            }
        };

        self.process_with_retry(payout_id).await
    }

    async fn process_with_retry(&self, payout_id: PayoutId) -> JobOutcome {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            debug!(payout_id = %payout_id, attempt, "Processing payout");

            match self.service.process_payout(payout_id).await {
                Ok(payout) => {
                    return JobOutcome::Acked {
                        payout_id,
                        status: payout.status,
                        attempts: attempt,
                    };
                }
                Err(e) if !e.is_retryable() => {
                    warn!(payout_id = %payout_id, error = %e, "Payout job failed permanently");
                    return JobOutcome::Discarded {
                        reason: e.to_string(),
                    };
                }
                Err(e) if attempt >= max_attempts => {
                    error!(
                        payout_id = %payout_id,
                        attempts = attempt,
                        error = %e,
                        "Payout job abandoned after max attempts"
                    );
                    return JobOutcome::Abandoned {
                        payout_id,
                        attempts: attempt,
                        error: e,
                    };
                }
                Err(e) => {
                    let delay = self.retry_delay();
                    warn!(
                        payout_id = %payout_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Payout processing failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    fn retry_delay(&self) -> Duration {
        let min = self.config.retry_delay_min.as_millis() as u64;
        let max = (self.config.retry_delay_max.as_millis() as u64).max(min);
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payout::check::LimitCheck;
    use crate::payout::dispatcher::job_channel;
    use crate::payout::error::PayoutError;
    use crate::payout::memory::InMemoryPayoutStore;
    use crate::payout::store::{PayoutStore, PayoutTx};
    use crate::payout::types::{Currency, NewPayout, Payout, PayoutFilter};
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Store whose `begin` fails a configurable number of times
    struct FlakyStore {
        inner: InMemoryPayoutStore,
        failures: AtomicU32,
    }

    #[async_trait]
    impl PayoutStore for FlakyStore {
        async fn get(&self, id: PayoutId) -> Result<Option<Payout>, PayoutError> {
            self.inner.get(id).await
        }

        async fn list(&self, filter: &PayoutFilter) -> Result<Vec<Payout>, PayoutError> {
            self.inner.list(filter).await
        }

        async fn begin(&self) -> Result<Box<dyn PayoutTx>, PayoutError> {
            let failed = self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failed {
                return Err(PayoutError::Database("connection reset".into()));
            }
            self.inner.begin().await
        }
    }

    struct Harness {
        worker: Arc<ProcessingWorker>,
        service: Arc<PayoutService>,
        store: Arc<FlakyStore>,
        receiver: JobReceiver,
    }

    fn fast_config() -> WorkerConfig {
        WorkerConfig {
            retry_delay_min: Duration::ZERO,
            retry_delay_max: Duration::ZERO,
            concurrency: 2,
            ..WorkerConfig::default()
        }
    }

    fn harness() -> Harness {
        let store = Arc::new(FlakyStore {
            inner: InMemoryPayoutStore::new(),
            failures: AtomicU32::new(0),
        });
        let store_port: Arc<dyn PayoutStore> = store.clone();
        let (dispatcher, receiver) = job_channel(16);
        let service = Arc::new(PayoutService::new(
            store_port,
            Arc::new(dispatcher),
            Arc::new(LimitCheck::default()),
        ));
        let worker = Arc::new(ProcessingWorker::new(service.clone(), fast_config()));
        Harness {
            worker,
            service,
            store,
            receiver,
        }
    }

    async fn create(h: &mut Harness, amount: Decimal, name: &str) -> (PayoutId, Job) {
        let payout = h
            .service
            .create_payout(NewPayout::new(
                amount,
                Currency::Usd,
                name,
                "DE89370400440532013000",
            ))
            .await
            .unwrap();
        let job = h.receiver.try_recv().expect("creation schedules a job");
        (payout.id, job)
    }

    #[test]
    fn test_worker_config_default() {
        let config = WorkerConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.retry_delay_min, Duration::from_secs(1));
        assert_eq!(config.retry_delay_max, Duration::from_secs(3));
    }

    #[test]
    fn test_retry_delay_within_window() {
        let h = harness();
        let worker = ProcessingWorker::new(
            h.service.clone(),
            WorkerConfig {
                retry_delay_min: Duration::from_millis(1000),
                retry_delay_max: Duration::from_millis(3000),
                ..fast_config()
            },
        );
        for _ in 0..100 {
            let delay = worker.retry_delay();
            assert!(delay >= Duration::from_millis(1000));
            assert!(delay <= Duration::from_millis(3000));
        }
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let mut h = harness();
        let (id, job) = create(&mut h, dec!(100.50), "Jane Doe").await;

        h.store.failures.store(2, Ordering::SeqCst);
        let outcome = h.worker.handle(job).await;

        match outcome {
            JobOutcome::Acked {
                payout_id,
                status,
                attempts,
            } => {
                assert_eq!(payout_id, id);
                assert_eq!(status, PayoutStatus::Completed);
                assert_eq!(attempts, 3);
            }
            other => panic!("expected ack, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_job_abandoned_after_max_attempts() {
        let mut h = harness();
        let (id, job) = create(&mut h, dec!(100.50), "Jane Doe").await;

        h.store.failures.store(5, Ordering::SeqCst);
        let outcome = h.worker.handle(job).await;

        assert!(matches!(
            outcome,
            JobOutcome::Abandoned {
                attempts: 3,
                error: PayoutError::Database(_),
                ..
            }
        ));
        // Two failures left unused: exactly three attempts were made
        assert_eq!(h.store.failures.load(Ordering::SeqCst), 2);

        let payout = h.service.get_payout(id).await.unwrap();
        assert_eq!(payout.status, PayoutStatus::Pending);
    }

    #[tokio::test]
    async fn test_business_rejection_retry_is_a_no_op() {
        let mut h = harness();
        let (id, job) = create(&mut h, dec!(1500000), "Jane Doe").await;

        let outcome = h.worker.handle(job).await;

        match outcome {
            JobOutcome::Acked {
                status, attempts, ..
            } => {
                assert_eq!(status, PayoutStatus::Failed);
                assert_eq!(attempts, 2);
            }
            other => panic!("expected ack of recorded failure, got {:?}", other),
        }

        let payout = h.service.get_payout(id).await.unwrap();
        assert_eq!(payout.failure_reason.as_deref(), Some("Amount exceeds limit."));
    }

    #[tokio::test]
    async fn test_malformed_jobs_are_discarded() {
        let h = harness();

        let unknown = Job {
            name: "send_email".into(),
            payload: serde_json::json!({}),
        };
        assert!(matches!(
            h.worker.handle(unknown).await,
            JobOutcome::Discarded { .. }
        ));

        let bad_payload = Job {
            name: PROCESS_PAYOUT_JOB.into(),
            payload: serde_json::json!({ "id": 7 }),
        };
        assert!(matches!(
            h.worker.handle(bad_payload).await,
            JobOutcome::Discarded { .. }
        ));

        let bad_id = Job {
            name: PROCESS_PAYOUT_JOB.into(),
            payload: serde_json::json!({ "payout_id": "not-a-uuid" }),
        };
        assert!(matches!(
            h.worker.handle(bad_id).await,
            JobOutcome::Discarded { .. }
        ));
    }

    #[tokio::test]
    async fn test_unknown_payout_is_not_retried() {
        let h = harness();
        let job = Job {
            name: PROCESS_PAYOUT_JOB.into(),
            payload: ProcessPayoutPayload::new(PayoutId::new()).to_value().unwrap(),
        };

        h.store.failures.store(0, Ordering::SeqCst);
        let outcome = h.worker.handle(job).await;
        assert!(matches!(outcome, JobOutcome::Discarded { .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_run_drains_queue_on_shutdown() {
        let h = harness();
        let mut ids = Vec::new();
        for (amount, name) in [
            (dec!(100.50), "Jane Doe"),
            (dec!(1500000), "John Roe"),
            (dec!(20), "TEST_FAIL Corp"),
        ] {
            let payout = h
                .service
                .create_payout(NewPayout::new(amount, Currency::Eur, name, "12345678"))
                .await
                .unwrap();
            ids.push(payout.id);
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let run = tokio::spawn(h.worker.clone().run(h.receiver, shutdown_rx));
        shutdown_tx.send(true).unwrap();

        let stats = run.await.unwrap();
        assert_eq!(
            stats,
            WorkerStats {
                acked: 3,
                abandoned: 0,
                discarded: 0
            }
        );

        let statuses: Vec<PayoutStatus> = {
            let mut out = Vec::new();
            for id in &ids {
                out.push(h.service.get_payout(*id).await.unwrap().status);
            }
            out
        };
        assert_eq!(
            statuses,
            vec![
                PayoutStatus::Completed,
                PayoutStatus::Failed,
                PayoutStatus::Failed
            ]
        );
    }
}
