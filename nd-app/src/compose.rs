//! Per-chat conversation state: compose sessions, delete mode, dedupe.
//!
//! All three stores are in-memory maps with TTL semantics. Expiry is
//! checked lazily on access, so a stale entry never changes behavior,
//! and a shared sweep task reclaims the memory.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const COMPOSE_IDLE_TTL: Duration = Duration::from_secs(15 * 60);
const DELETE_MODE_TTL: Duration = Duration::from_secs(5 * 60);
const DEDUPE_TTL: Duration = Duration::from_secs(10);

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug)]
struct ComposeSession {
    parts: Vec<String>,
    started_at: Instant,
    last_updated_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComposeStats {
    pub message_count: usize,
    pub total_chars: usize,
    pub duration_secs: u64,
}

/// Multi-part text collection. A session stays alive as long as parts keep
/// arriving; fifteen idle minutes and it is gone.
#[derive(Default)]
pub struct ComposeSessions {
    sessions: DashMap<String, ComposeSession>,
}

impl ComposeSessions {
    pub fn start(&self, chat_id: &str) {
        let now = Instant::now();
        self.sessions.insert(
            chat_id.to_string(),
            ComposeSession {
                parts: Vec::new(),
                started_at: now,
                last_updated_at: now,
            },
        );
    }

    pub fn is_active(&self, chat_id: &str) -> bool {
        self.is_active_at(chat_id, Instant::now())
    }

    fn is_active_at(&self, chat_id: &str, now: Instant) -> bool {
        if let Some(session) = self.sessions.get(chat_id) {
            if now.duration_since(session.last_updated_at) < COMPOSE_IDLE_TTL {
                return true;
            }
        } else {
            return false;
        }
        self.sessions.remove(chat_id);
        false
    }

    pub fn add_part(&self, chat_id: &str, text: &str) -> Option<ComposeStats> {
        self.add_part_at(chat_id, text, Instant::now())
    }

    fn add_part_at(&self, chat_id: &str, text: &str, now: Instant) -> Option<ComposeStats> {
        if !self.is_active_at(chat_id, now) {
            return None;
        }
        let mut session = self.sessions.get_mut(chat_id)?;
        session.parts.push(text.trim().to_string());
        session.last_updated_at = now;
        Some(stats_of(&session, now))
    }

    /// The collected text so far, without ending the session.
    pub fn composed_text(&self, chat_id: &str) -> Option<String> {
        self.composed_text_at(chat_id, Instant::now())
    }

    fn composed_text_at(&self, chat_id: &str, now: Instant) -> Option<String> {
        if !self.is_active_at(chat_id, now) {
            return None;
        }
        let session = self.sessions.get(chat_id)?;
        if session.parts.iter().all(|p| p.is_empty()) {
            return None;
        }
        Some(session.parts.join("\n\n"))
    }

    pub fn stats(&self, chat_id: &str) -> Option<ComposeStats> {
        self.stats_at(chat_id, Instant::now())
    }

    fn stats_at(&self, chat_id: &str, now: Instant) -> Option<ComposeStats> {
        if !self.is_active_at(chat_id, now) {
            return None;
        }
        self.sessions.get(chat_id).map(|s| stats_of(&s, now))
    }

    /// Joins the collected parts and ends the session. Returns `None` when
    /// there is no live session or nothing was collected; an empty session
    /// is kept so the chat can keep adding parts.
    pub fn finalize(&self, chat_id: &str) -> Option<String> {
        self.finalize_at(chat_id, Instant::now())
    }

    fn finalize_at(&self, chat_id: &str, now: Instant) -> Option<String> {
        let text = self.composed_text_at(chat_id, now)?;
        self.sessions.remove(chat_id);
        Some(text)
    }

    pub fn cancel(&self, chat_id: &str) -> bool {
        let was_active = self.is_active(chat_id);
        self.sessions.remove(chat_id);
        was_active
    }

    fn sweep_at(&self, now: Instant) -> usize {
        let before = self.sessions.len();
        self.sessions
            .retain(|_, s| now.duration_since(s.last_updated_at) < COMPOSE_IDLE_TTL);
        before.saturating_sub(self.sessions.len())
    }
}

fn stats_of(session: &ComposeSession, now: Instant) -> ComposeStats {
    ComposeStats {
        message_count: session.parts.len(),
        total_chars: session.parts.iter().map(|p| p.chars().count()).sum(),
        duration_secs: now.duration_since(session.started_at).as_secs(),
    }
}

/// Chats that asked to delete an article and owe us a URL. The flag
/// disarms itself after five minutes.
#[derive(Default)]
pub struct DeleteModeFlags {
    armed: DashMap<String, Instant>,
}

impl DeleteModeFlags {
    pub fn arm(&self, chat_id: &str) {
        self.armed.insert(chat_id.to_string(), Instant::now());
    }

    pub fn disarm(&self, chat_id: &str) -> bool {
        self.armed.remove(chat_id).is_some()
    }

    pub fn is_armed(&self, chat_id: &str) -> bool {
        self.is_armed_at(chat_id, Instant::now())
    }

    fn is_armed_at(&self, chat_id: &str, now: Instant) -> bool {
        if let Some(armed_at) = self.armed.get(chat_id) {
            if now.duration_since(*armed_at) < DELETE_MODE_TTL {
                return true;
            }
        } else {
            return false;
        }
        self.armed.remove(chat_id);
        false
    }

    fn sweep_at(&self, now: Instant) -> usize {
        let before = self.armed.len();
        self.armed
            .retain(|_, armed_at| now.duration_since(*armed_at) < DELETE_MODE_TTL);
        before.saturating_sub(self.armed.len())
    }
}

/// Short-lived memory of recently handled messages, so platform retries
/// do not enqueue the same work twice.
#[derive(Default)]
pub struct DedupeGuard {
    seen: DashMap<String, Instant>,
}

impl DedupeGuard {
    pub fn was_recently_processed(&self, key: &str) -> bool {
        self.was_recently_processed_at(key, Instant::now())
    }

    fn was_recently_processed_at(&self, key: &str, now: Instant) -> bool {
        match self.seen.get(key) {
            Some(seen_at) => now.duration_since(*seen_at) < DEDUPE_TTL,
            None => false,
        }
    }

    pub fn mark_processed(&self, key: &str) {
        self.seen.insert(key.to_string(), Instant::now());
    }

    fn sweep_at(&self, now: Instant) -> usize {
        let before = self.seen.len();
        self.seen
            .retain(|_, seen_at| now.duration_since(*seen_at) < DEDUPE_TTL);
        before.saturating_sub(self.seen.len())
    }
}

/// One sweep task for all three chat-state stores.
pub fn start_sweeps(
    compose: Arc<ComposeSessions>,
    delete_flags: Arc<DeleteModeFlags>,
    dedupe: Arc<DedupeGuard>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    let now = Instant::now();
                    let removed =
                        compose.sweep_at(now) + delete_flags.sweep_at(now) + dedupe.sweep_at(now);
                    if removed > 0 {
                        tracing::debug!(removed, "chat state swept");
                    }
                }
            }
        }
    })
}
