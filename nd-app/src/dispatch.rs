//! Progress notifications back to the submitting chat.
//!
//! One watcher task per chat job polls the store until the job reaches a
//! terminal status. If that takes too long the watcher tells the chat the
//! work continues in the background and stops polling; the job itself is
//! never cancelled. Send failures are logged and swallowed, a dead chat
//! must not affect the queue.

use std::sync::Arc;
use std::time::{Duration, Instant};

use nd_channels::{ChannelAdapter, OutboundMessage};
use tokio::task::JoinHandle;

use crate::i18n::{self, Lang};
use crate::jobs::{JobErrorKind, JobStatus, JobStore};

pub struct ProgressWatcher {
    store: Arc<JobStore>,
    poll_interval: Duration,
    timeout: Duration,
}

impl ProgressWatcher {
    pub fn new(store: Arc<JobStore>, poll_interval: Duration, timeout: Duration) -> Self {
        Self {
            store,
            poll_interval,
            timeout,
        }
    }

    pub fn watch(
        &self,
        channel: Arc<dyn ChannelAdapter>,
        chat_id: String,
        lang: Lang,
        job_id: String,
    ) -> JoinHandle<()> {
        let store = self.store.clone();
        let poll_interval = self.poll_interval;
        let timeout = self.timeout;
        tokio::spawn(async move {
            let started = Instant::now();
            loop {
                tokio::time::sleep(poll_interval).await;
                let Some(job) = store.get(&job_id) else {
                    tracing::warn!(job_id = %job_id, "watched job disappeared from the store");
                    return;
                };
                match job.status {
                    JobStatus::Completed => {
                        let Some(outcome) = job.outcome else {
                            tracing::warn!(job_id = %job_id, "completed job has no outcome");
                            return;
                        };
                        let message = i18n::job_completed(lang, &outcome);
                        deliver(channel.as_ref(), &chat_id, message).await;
                        return;
                    }
                    JobStatus::Failed => {
                        let kind = job
                            .error
                            .map(|e| e.kind)
                            .unwrap_or(JobErrorKind::Unknown);
                        deliver(channel.as_ref(), &chat_id, i18n::job_failed(lang, kind)).await;
                        return;
                    }
                    JobStatus::Queued | JobStatus::Processing => {
                        if started.elapsed() >= timeout {
                            tracing::info!(
                                job_id = %job_id,
                                "progress watch timed out; job continues in the background"
                            );
                            deliver(channel.as_ref(), &chat_id, i18n::still_processing(lang)).await;
                            return;
                        }
                    }
                }
            }
        })
    }
}

async fn deliver(channel: &dyn ChannelAdapter, chat_id: &str, message: String) {
    if let Err(e) = channel.send(chat_id, OutboundMessage::text(message)).await {
        tracing::warn!(chat_id, error = %e, "progress notification failed");
    }
}
