//! Task Dispatcher
//!
//! The service hands jobs to a [`TaskDispatcher`] and never talks to a broker
//! directly. [`job_channel`] provides the in-process adapter: a bounded
//! `tokio::sync::mpsc` queue drained by the processing worker.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::error::PayoutError;
use super::types::PayoutId;

/// Job name for payout processing
pub const PROCESS_PAYOUT_JOB: &str = "process_payout";

/// A scheduled unit of work as seen by the worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub name: String,
    pub payload: serde_json::Value,
}

/// Payload of a `process_payout` job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessPayoutPayload {
    pub payout_id: String,
}

impl ProcessPayoutPayload {
    pub fn new(payout_id: PayoutId) -> Self {
        Self {
            payout_id: payout_id.to_string(),
        }
    }

    pub fn to_value(&self) -> Result<serde_json::Value, PayoutError> {
        serde_json::to_value(self).map_err(|e| PayoutError::Dispatch(e.to_string()))
    }
}

/// Fire-and-forget job scheduling.
///
/// Delivery is at-least-once with no ordering across payouts; consumers must
/// be idempotent.
#[async_trait]
pub trait TaskDispatcher: Send + Sync {
    async fn schedule(&self, job_name: &str, payload: serde_json::Value)
    -> Result<(), PayoutError>;
}

/// Sender side of the in-process job queue
#[derive(Clone)]
pub struct ChannelDispatcher {
    tx: mpsc::Sender<Job>,
}

#[async_trait]
impl TaskDispatcher for ChannelDispatcher {
    async fn schedule(
        &self,
        job_name: &str,
        payload: serde_json::Value,
    ) -> Result<(), PayoutError> {
        let job = Job {
            name: job_name.to_string(),
            payload,
        };
        self.tx
            .send(job)
            .await
            .map_err(|_| PayoutError::Dispatch("Job queue closed".to_string()))
    }
}

/// Receiver side of the in-process job queue (used by the worker)
pub struct JobReceiver {
    rx: mpsc::Receiver<Job>,
}

impl JobReceiver {
    /// Receive the next job, `None` once the queue is closed and drained
    pub async fn recv(&mut self) -> Option<Job> {
        self.rx.recv().await
    }

    /// Try to receive a job (non-blocking)
    pub fn try_recv(&mut self) -> Option<Job> {
        self.rx.try_recv().ok()
    }

    /// Stop accepting new jobs; already queued jobs can still be received
    pub fn close(&mut self) {
        self.rx.close();
    }
}

/// Create a new job queue pair
pub fn job_channel(buffer: usize) -> (ChannelDispatcher, JobReceiver) {
    let (tx, rx) = mpsc::channel(buffer);
    (ChannelDispatcher { tx }, JobReceiver { rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_schedule_delivers_job() {
        let (dispatcher, mut receiver) = job_channel(4);
        let id = PayoutId::new();
        let payload = ProcessPayoutPayload::new(id).to_value().unwrap();

        dispatcher
            .schedule(PROCESS_PAYOUT_JOB, payload)
            .await
            .unwrap();

        let job = receiver.try_recv().unwrap();
        assert_eq!(job.name, "process_payout");
        assert_eq!(job.payload, serde_json::json!({ "payout_id": id.to_string() }));
    }

    #[tokio::test]
    async fn test_closed_queue_rejects_new_jobs() {
        let (dispatcher, mut receiver) = job_channel(4);
        let payload = ProcessPayoutPayload::new(PayoutId::new()).to_value().unwrap();
        dispatcher
            .schedule(PROCESS_PAYOUT_JOB, payload.clone())
            .await
            .unwrap();

        receiver.close();
        let result = dispatcher.schedule(PROCESS_PAYOUT_JOB, payload).await;
        assert!(matches!(result, Err(PayoutError::Dispatch(_))));

        // Already queued job is still delivered, then the queue ends
        assert!(receiver.recv().await.is_some());
        assert!(receiver.recv().await.is_none());
    }
}
