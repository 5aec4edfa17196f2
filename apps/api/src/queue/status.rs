//! Job status records polled by clients.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::MultiplexedConnection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::resume::GenerationResult;

const KEY_PREFIX: &str = "resume:generation:job";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Waiting,
    Active,
    /// Failed attempt waiting out its backoff before the next one.
    Delayed,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatus {
    pub job_id: Uuid,
    pub resume_id: Uuid,
    pub state: JobState,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<GenerationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub attempts_made: u32,
    pub updated_at: DateTime<Utc>,
}

impl JobStatus {
    pub fn waiting(job_id: Uuid, resume_id: Uuid) -> Self {
        Self {
            job_id,
            resume_id,
            state: JobState::Waiting,
            progress: 0,
            result: None,
            failure_reason: None,
            attempts_made: 0,
            updated_at: Utc::now(),
        }
    }

    /// Raises progress; never lowers it.
    pub fn advance(&mut self, progress: u8) {
        self.progress = self.progress.max(progress.min(100));
    }
}

#[async_trait]
pub trait JobStatusStore: Send + Sync {
    async fn put(&self, status: &JobStatus) -> Result<(), AppError>;
    async fn get(&self, job_id: Uuid) -> Result<Option<JobStatus>, AppError>;
}

/// JSON per job in Redis. Terminal records expire after `retention`.
#[derive(Clone)]
pub struct RedisStatusStore {
    conn: MultiplexedConnection,
    retention: Duration,
}

impl RedisStatusStore {
    pub async fn connect(client: &redis::Client, retention: Duration) -> Result<Self, AppError> {
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self { conn, retention })
    }

    fn key(job_id: Uuid) -> String {
        format!("{KEY_PREFIX}:{job_id}")
    }
}

#[async_trait]
impl JobStatusStore for RedisStatusStore {
    async fn put(&self, status: &JobStatus) -> Result<(), AppError> {
        let json = serde_json::to_string(status).map_err(|e| {
            AppError::Internal(anyhow::anyhow!("Failed to serialize job status: {e}"))
        })?;
        let mut conn = self.conn.clone();

        let mut cmd = redis::cmd("SET");
        cmd.arg(Self::key(status.job_id)).arg(json);
        if status.state.is_terminal() {
            cmd.arg("EX").arg(self.retention.as_secs().max(1));
        }
        cmd.query_async::<_, ()>(&mut conn).await?;
        Ok(())
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<JobStatus>, AppError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = redis::cmd("GET")
            .arg(Self::key(job_id))
            .query_async(&mut conn)
            .await?;

        raw.map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(|e| {
                AppError::Internal(anyhow::anyhow!("Corrupt job status for {job_id}: {e}"))
            })
    }
}

#[cfg(test)]
pub mod memory {
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    use super::*;

    /// Keeps at most `capacity` finished jobs; the oldest finished job is
    /// evicted first. Unfinished jobs are never evicted.
    pub struct MemoryStatusStore {
        capacity: usize,
        inner: Mutex<(HashMap<Uuid, JobStatus>, VecDeque<Uuid>)>,
    }

    impl MemoryStatusStore {
        pub fn new(capacity: usize) -> Self {
            Self {
                capacity,
                inner: Mutex::new((HashMap::new(), VecDeque::new())),
            }
        }
    }

    #[async_trait]
    impl JobStatusStore for MemoryStatusStore {
        async fn put(&self, status: &JobStatus) -> Result<(), AppError> {
            let mut guard = self.inner.lock().unwrap();
            let (jobs, finished) = &mut *guard;
            let newly_finished = status.state.is_terminal()
                && !jobs.get(&status.job_id).is_some_and(|s| s.state.is_terminal());
            jobs.insert(status.job_id, status.clone());
            if newly_finished {
                finished.push_back(status.job_id);
                while finished.len() > self.capacity {
                    if let Some(evicted) = finished.pop_front() {
                        jobs.remove(&evicted);
                    }
                }
            }
            Ok(())
        }

        async fn get(&self, job_id: Uuid) -> Result<Option<JobStatus>, AppError> {
            Ok(self.inner.lock().unwrap().0.get(&job_id).cloned())
        }
    }
}
