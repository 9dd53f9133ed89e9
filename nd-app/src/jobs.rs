//! Submission queue.
//!
//! A submission becomes a job the moment it is accepted, and the caller
//! only ever gets the job id back. Workers move each job through
//! `queued -> processing -> completed | failed`; transitions are
//! forward-only and a terminal record never changes again. Terminal
//! records stay readable for a retention window so late status polls
//! still find them.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::pipeline::Pipeline;

const RETENTION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionKind {
    Url,
    Text,
}

#[derive(Debug, Clone, Serialize)]
pub struct Submission {
    pub kind: SubmissionKind,
    pub content: String,
    pub user_title: Option<String>,
    /// Prose the requester sent alongside a link; fed to the generator
    /// as extra guidance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// Further links merged into the same article when the chat asked
    /// for one combined piece instead of a batch.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extra_sources: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum JobOrigin {
    Chat {
        channel_id: String,
        chat_id: String,
        reply_language: String,
    },
    Api,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    fn rank(&self) -> u8 {
        match self {
            JobStatus::Queued => 0,
            JobStatus::Processing => 1,
            JobStatus::Completed | JobStatus::Failed => 2,
        }
    }

    fn can_advance_to(&self, next: JobStatus) -> bool {
        next.rank() > self.rank()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobErrorKind {
    Generation,
    Parsing,
    Publication,
    Unknown,
}

impl JobErrorKind {
    /// Buckets an arbitrary error message by keyword. Stages that know
    /// their kind set it directly; this is for everything else.
    pub fn classify(message: &str) -> JobErrorKind {
        let lower = message.to_ascii_lowercase();
        if lower.contains("parse") || lower.contains("fetch") || lower.contains("page") {
            JobErrorKind::Parsing
        } else if lower.contains("generat") || lower.contains("translat") {
            JobErrorKind::Generation
        } else if lower.contains("publish") || lower.contains("cms") {
            JobErrorKind::Publication
        } else {
            JobErrorKind::Unknown
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JobError {
    pub kind: JobErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublishedRef {
    pub post_id: String,
    pub url: String,
    pub language: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublishOutcome {
    pub title: String,
    pub category: String,
    pub word_count: usize,
    pub image_count: usize,
    /// Wall time from pipeline start to the last publish call.
    pub elapsed_ms: u64,
    pub primary: PublishedRef,
    /// Translated edition. `None` when translation or its publication
    /// failed; the job still counts as completed.
    pub secondary: Option<PublishedRef>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub id: String,
    pub origin: JobOrigin,
    pub submission: Submission,
    pub status: JobStatus,
    pub outcome: Option<PublishOutcome>,
    pub error: Option<JobError>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn new(origin: JobOrigin, submission: Submission) -> Self {
        let now = Utc::now();
        Self {
            id: ulid::Ulid::new().to_string(),
            origin,
            submission,
            status: JobStatus::Queued,
            outcome: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct QueueStats {
    pub queued: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
    pub total: usize,
}

pub struct JobStore {
    jobs: DashMap<String, JobRecord>,
    retention: Duration,
}

impl JobStore {
    pub fn new(retention: Duration) -> Self {
        Self {
            jobs: DashMap::new(),
            retention,
        }
    }

    pub fn insert(&self, record: JobRecord) {
        self.jobs.insert(record.id.clone(), record);
    }

    pub fn get(&self, job_id: &str) -> Option<JobRecord> {
        self.jobs.get(job_id).map(|j| j.clone())
    }

    pub fn mark_processing(&self, job_id: &str) -> bool {
        self.transition(job_id, JobStatus::Processing, |_| {})
    }

    pub fn complete(&self, job_id: &str, outcome: PublishOutcome) -> bool {
        self.transition(job_id, JobStatus::Completed, |job| {
            job.outcome = Some(outcome);
        })
    }

    pub fn fail(&self, job_id: &str, error: JobError) -> bool {
        self.transition(job_id, JobStatus::Failed, |job| {
            job.error = Some(error);
        })
    }

    fn transition(
        &self,
        job_id: &str,
        next: JobStatus,
        apply: impl FnOnce(&mut JobRecord),
    ) -> bool {
        let Some(mut job) = self.jobs.get_mut(job_id) else {
            tracing::warn!(job_id, next = next.as_str(), "transition on unknown job");
            return false;
        };
        if !job.status.can_advance_to(next) {
            tracing::warn!(
                job_id,
                from = job.status.as_str(),
                to = next.as_str(),
                "refused backwards job transition"
            );
            return false;
        }
        job.status = next;
        job.updated_at = Utc::now();
        apply(&mut job);
        true
    }

    pub fn stats(&self) -> QueueStats {
        let mut stats = QueueStats::default();
        for job in self.jobs.iter() {
            match job.status {
                JobStatus::Queued => stats.queued += 1,
                JobStatus::Processing => stats.processing += 1,
                JobStatus::Completed => stats.completed += 1,
                JobStatus::Failed => stats.failed += 1,
            }
            stats.total += 1;
        }
        stats
    }

    fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let Ok(retention) = chrono::Duration::from_std(self.retention) else {
            return 0;
        };
        let before = self.jobs.len();
        self.jobs
            .retain(|_, job| !job.status.is_terminal() || now - job.updated_at < retention);
        before.saturating_sub(self.jobs.len())
    }

    pub fn start_retention_sweep(self: Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(RETENTION_SWEEP_INTERVAL);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = interval.tick() => {
                        let removed = self.sweep_at(Utc::now());
                        if removed > 0 {
                            tracing::debug!(removed, "terminal jobs swept");
                        }
                    }
                }
            }
        })
    }
}

/// Queue front door: accepts a submission, records it and runs it on the
/// bounded worker pool. Fire and forget; progress is read back from the
/// store.
pub struct Jobs {
    store: Arc<JobStore>,
    pipeline: Arc<Pipeline>,
    workers: Arc<Semaphore>,
}

impl Jobs {
    pub fn new(store: Arc<JobStore>, pipeline: Arc<Pipeline>, max_concurrency: usize) -> Self {
        Self {
            store,
            pipeline,
            workers: Arc::new(Semaphore::new(max_concurrency.max(1))),
        }
    }

    pub fn store(&self) -> Arc<JobStore> {
        self.store.clone()
    }

    pub fn submit(&self, origin: JobOrigin, submission: Submission) -> String {
        let record = JobRecord::new(origin, submission);
        let job_id = record.id.clone();
        self.store.insert(record);
        tracing::info!(job_id = %job_id, queue = ?self.store.stats(), "job accepted");

        let store = self.store.clone();
        let pipeline = self.pipeline.clone();
        let workers = self.workers.clone();
        let id = job_id.clone();
        tokio::spawn(async move {
            let permit = match workers.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    store.fail(
                        &id,
                        JobError {
                            kind: JobErrorKind::Unknown,
                            message: "worker pool closed".to_string(),
                        },
                    );
                    return;
                }
            };
            store.mark_processing(&id);
            let Some(job) = store.get(&id) else {
                return;
            };
            tracing::info!(job_id = %id, kind = ?job.submission.kind, "job started");
            match pipeline.run(&job).await {
                Ok(outcome) => {
                    tracing::info!(
                        job_id = %id,
                        category = %outcome.category,
                        words = outcome.word_count,
                        translated = outcome.secondary.is_some(),
                        "job completed"
                    );
                    store.complete(&id, outcome);
                }
                Err(error) => {
                    tracing::warn!(
                        job_id = %id,
                        kind = ?error.kind,
                        error = %error.message,
                        "job failed"
                    );
                    store.fail(&id, error);
                }
            }
            drop(permit);
        });

        job_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> JobRecord {
        JobRecord::new(
            JobOrigin::Api,
            Submission {
                kind: SubmissionKind::Text,
                content: "some text".to_string(),
                user_title: None,
                context: None,
                extra_sources: Vec::new(),
            },
        )
    }

    fn outcome() -> PublishOutcome {
        PublishOutcome {
            title: "T".to_string(),
            category: "tech".to_string(),
            word_count: 500,
            image_count: 2,
            elapsed_ms: 1_500,
            primary: PublishedRef {
                post_id: "1".to_string(),
                url: "https://x/en/article/t-en".to_string(),
                language: "en".to_string(),
            },
            secondary: None,
        }
    }

    #[test]
    fn jobs_advance_forward_and_stop_at_terminal() {
        let store = JobStore::new(Duration::from_secs(1_800));
        let job = record();
        let id = job.id.clone();
        store.insert(job);

        assert!(store.mark_processing(&id));
        assert!(store.complete(&id, outcome()));
        let done = store.get(&id).expect("job");
        assert_eq!(done.status, JobStatus::Completed);
        assert!(done.outcome.is_some());

        // Terminal records are immutable.
        assert!(!store.fail(
            &id,
            JobError {
                kind: JobErrorKind::Unknown,
                message: "late".to_string(),
            }
        ));
        assert!(!store.mark_processing(&id));
        let still = store.get(&id).expect("job");
        assert_eq!(still.status, JobStatus::Completed);
        assert!(still.error.is_none());
    }

    #[test]
    fn processing_cannot_go_back_to_queued_rank() {
        let store = JobStore::new(Duration::from_secs(1_800));
        let job = record();
        let id = job.id.clone();
        store.insert(job);
        assert!(store.mark_processing(&id));
        assert!(!store.mark_processing(&id));
    }

    #[test]
    fn stats_bucket_jobs_by_status() {
        let store = JobStore::new(Duration::from_secs(1_800));
        let a = record();
        let b = record();
        let c = record();
        let (ida, idb) = (a.id.clone(), b.id.clone());
        store.insert(a);
        store.insert(b);
        store.insert(c);
        store.mark_processing(&ida);
        store.mark_processing(&idb);
        store.fail(
            &idb,
            JobError {
                kind: JobErrorKind::Parsing,
                message: "page parsing failed".to_string(),
            },
        );
        let stats = store.stats();
        assert_eq!(stats.queued, 1);
        assert_eq!(stats.processing, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.completed, 0);
        assert_eq!(stats.total, 3);
    }

    #[test]
    fn retention_sweep_keeps_live_and_recent_jobs() {
        let store = JobStore::new(Duration::from_secs(60));
        let live = record();
        let done = record();
        let (live_id, done_id) = (live.id.clone(), done.id.clone());
        store.insert(live);
        store.insert(done);
        store.mark_processing(&done_id);
        store.complete(&done_id, outcome());

        // Recent terminal job survives.
        assert_eq!(store.sweep_at(Utc::now()), 0);
        // Past retention only the non-terminal job is left.
        let later = Utc::now() + chrono::Duration::seconds(120);
        assert_eq!(store.sweep_at(later), 1);
        assert!(store.get(&live_id).is_some());
        assert!(store.get(&done_id).is_none());
    }

    #[test]
    fn message_classification_buckets_by_keyword() {
        assert_eq!(
            JobErrorKind::classify("page parsing failed: status 404"),
            JobErrorKind::Parsing
        );
        assert_eq!(
            JobErrorKind::classify("generation failed: empty response"),
            JobErrorKind::Generation
        );
        assert_eq!(
            JobErrorKind::classify("publication failed: cms status=500"),
            JobErrorKind::Publication
        );
        assert_eq!(JobErrorKind::classify("boom"), JobErrorKind::Unknown);
    }

    #[test]
    fn job_ids_are_unique_and_sortable() {
        let a = record();
        let b = record();
        assert_ne!(a.id, b.id);
        assert_eq!(a.id.len(), 26);
    }
}
