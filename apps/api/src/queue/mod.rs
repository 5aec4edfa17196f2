//! Background generation queue.
//!
//! Architecture:
//! - Bounded MPSC channel; N worker tasks share the receiver
//! - Each job runs one attempt at a time under a wall-clock timeout
//! - Retryable failures are re-enqueued by a delayed task with exponential
//!   backoff, so a waiting retry never occupies a worker
//! - Status lives in a `JobStatusStore`; progress never moves backwards,
//!   including across attempts

pub mod status;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::resume::GenerationResult;
use crate::queue::status::{JobState, JobStatus, JobStatusStore};

/// Everything a worker needs to run one generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationPayload {
    pub resume_id: Uuid,
    pub user_id: Uuid,
    pub job_description_id: Uuid,
    pub template_id: Uuid,
}

#[derive(Debug, Clone, Copy)]
pub struct QueuePolicy {
    pub attempts: u32,
    /// Delay before the first retry; doubles for each one after.
    pub backoff: Duration,
    pub attempt_timeout: Duration,
}

impl Default for QueuePolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_secs(2),
            attempt_timeout: Duration::from_secs(120),
        }
    }
}

impl QueuePolicy {
    fn retry_delay(&self, attempts_made: u32) -> Duration {
        self.backoff * 2u32.saturating_pow(attempts_made.saturating_sub(1))
    }
}

/// Receives advisory progress checkpoints (0–100) from a running attempt.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn report(&self, progress: u8);
}

/// The work a queue runs. Implemented by the generation pipeline.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn run(
        &self,
        payload: &GenerationPayload,
        progress: &dyn ProgressSink,
    ) -> Result<GenerationResult, AppError>;

    /// Called once when the job will not be attempted again.
    async fn fail(&self, payload: &GenerationPayload, reason: &str);
}

#[derive(Debug, Clone, Copy)]
struct QueuedJob {
    job_id: Uuid,
    payload: GenerationPayload,
    attempts_made: u32,
}

#[derive(Clone)]
pub struct GenerationQueue {
    sender: mpsc::Sender<QueuedJob>,
    statuses: Arc<dyn JobStatusStore>,
}

impl GenerationQueue {
    /// Creates the channel and spawns `workers` worker tasks.
    pub fn start(
        handler: Arc<dyn JobHandler>,
        statuses: Arc<dyn JobStatusStore>,
        policy: QueuePolicy,
        workers: usize,
        capacity: usize,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));

        for worker_id in 0..workers.max(1) {
            let worker = Worker {
                id: worker_id,
                handler: handler.clone(),
                statuses: statuses.clone(),
                policy,
                requeue: sender.clone(),
            };
            tokio::spawn(worker.run(receiver.clone()));
        }
        info!("Generation queue started with {} worker(s)", workers.max(1));

        Self { sender, statuses }
    }

    /// Records the job as waiting and hands it to the workers. Returns the job handle.
    pub async fn enqueue(&self, payload: GenerationPayload) -> Result<Uuid, AppError> {
        let job_id = Uuid::new_v4();
        self.statuses
            .put(&JobStatus::waiting(job_id, payload.resume_id))
            .await?;

        self.sender
            .send(QueuedJob {
                job_id,
                payload,
                attempts_made: 0,
            })
            .await
            .map_err(|_| AppError::Internal(anyhow::anyhow!("Generation queue is closed")))?;

        info!("Enqueued generation job {job_id} for resume {}", payload.resume_id);
        Ok(job_id)
    }

    pub async fn get_status(&self, job_id: Uuid) -> Result<Option<JobStatus>, AppError> {
        self.statuses.get(job_id).await
    }
}

/// Progress sink writing into the job's status record.
struct StatusProgress {
    job_id: Uuid,
    statuses: Arc<dyn JobStatusStore>,
}

#[async_trait]
impl ProgressSink for StatusProgress {
    async fn report(&self, progress: u8) {
        let updated =
            update_status(self.statuses.as_ref(), self.job_id, |s| s.advance(progress)).await;
        if let Err(e) = updated {
            warn!("Failed to record progress {progress} for job {}: {e}", self.job_id);
        }
    }
}

async fn update_status(
    statuses: &dyn JobStatusStore,
    job_id: Uuid,
    apply: impl FnOnce(&mut JobStatus) + Send,
) -> Result<(), AppError> {
    let Some(mut status) = statuses.get(job_id).await? else {
        return Err(AppError::NotFound(format!("Job {job_id}")));
    };
    apply(&mut status);
    status.updated_at = Utc::now();
    statuses.put(&status).await
}

struct Worker {
    id: usize,
    handler: Arc<dyn JobHandler>,
    statuses: Arc<dyn JobStatusStore>,
    policy: QueuePolicy,
    requeue: mpsc::Sender<QueuedJob>,
}

impl Worker {
    async fn run(self, receiver: Arc<Mutex<mpsc::Receiver<QueuedJob>>>) {
        info!("Generation worker {} started", self.id);
        loop {
            let next = receiver.lock().await.recv().await;
            let Some(job) = next else { break };
            self.process(job).await;
        }
        info!("Generation worker {} stopped (channel closed)", self.id);
    }

    async fn process(&self, job: QueuedJob) {
        let attempt = job.attempts_made + 1;
        info!(
            "Worker {} running job {} (resume {}), attempt {attempt}/{}",
            self.id, job.job_id, job.payload.resume_id, self.policy.attempts
        );

        if let Err(e) = self
            .set(job.job_id, |s| {
                s.state = JobState::Active;
                s.attempts_made = attempt;
            })
            .await
        {
            warn!("Failed to mark job {} active: {e}", job.job_id);
        }

        let sink = StatusProgress {
            job_id: job.job_id,
            statuses: self.statuses.clone(),
        };
        let run = self.handler.run(&job.payload, &sink);
        let outcome = tokio::time::timeout(self.policy.attempt_timeout, run).await;

        let (reason, retryable) = match outcome {
            Ok(Ok(result)) => {
                info!("Job {} completed on attempt {attempt}", job.job_id);
                self.finish(job.job_id, |s| {
                    s.state = JobState::Completed;
                    s.advance(100);
                    s.failure_reason = None;
                    s.result = Some(result);
                })
                .await;
                return;
            }
            Ok(Err(e)) => (e.user_message(), e.is_retryable()),
            Err(_) => (
                format!(
                    "Generation timed out after {} seconds",
                    self.policy.attempt_timeout.as_secs()
                ),
                true,
            ),
        };

        if retryable && attempt < self.policy.attempts {
            let delay = self.policy.retry_delay(attempt);
            warn!(
                "Job {} attempt {attempt} failed ({reason}); retrying in {}ms",
                job.job_id,
                delay.as_millis()
            );
            self.finish(job.job_id, |s| {
                s.state = JobState::Delayed;
                s.failure_reason = Some(reason);
            })
            .await;

            let requeue = self.requeue.clone();
            let next = QueuedJob {
                attempts_made: attempt,
                ..job
            };
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                if requeue.send(next).await.is_err() {
                    error!("Could not re-enqueue job {}: queue closed", next.job_id);
                }
            });
            return;
        }

        error!("Job {} failed after {attempt} attempt(s): {reason}", job.job_id);
        self.handler.fail(&job.payload, &reason).await;
        self.finish(job.job_id, |s| {
            s.state = JobState::Failed;
            s.failure_reason = Some(reason);
        })
        .await;
    }

    async fn set(
        &self,
        job_id: Uuid,
        apply: impl FnOnce(&mut JobStatus) + Send,
    ) -> Result<(), AppError> {
        update_status(self.statuses.as_ref(), job_id, apply).await
    }

    async fn finish(&self, job_id: Uuid, apply: impl FnOnce(&mut JobStatus) + Send) {
        if let Err(e) = self.set(job_id, apply).await {
            error!("Failed to update status of job {job_id}: {e}");
        }
    }
}
