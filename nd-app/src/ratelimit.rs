//! Fixed-window rate limiting.
//!
//! One limiter instance covers both surfaces: chat submissions and the
//! HTTP API. Each policy gets its own key namespace, so a chat that burns
//! its generation budget can still run `/status`. Windows live in a
//! [`DashMap`] and a periodic sweep evicts the expired ones.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::LimitsConfig;

const SWEEP_INTERVAL: Duration = Duration::from_secs(300);

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(3_600);

/// Budgets for chat-originated work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatLimit {
    /// Any inbound chat message, commands included. Keyed by sender.
    Submission,
    /// A full article generation run.
    Generation,
    /// One batch of image lookups for an article.
    ImageBatch,
}

impl ChatLimit {
    fn key_prefix(&self) -> &'static str {
        match self {
            ChatLimit::Submission => "chat.submit",
            ChatLimit::Generation => "chat.generate",
            ChatLimit::ImageBatch => "chat.images",
        }
    }
}

/// Budgets for HTTP API clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiLimit {
    Public,
    Admin,
    Translate,
}

impl ApiLimit {
    fn key_prefix(&self) -> &'static str {
        match self {
            ApiLimit::Public => "api.public",
            ApiLimit::Admin => "api.admin",
            ApiLimit::Translate => "api.translate",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Time until this window rolls over. For a rejection this is how long
    /// the caller has to wait.
    pub resets_in: Duration,
}

#[derive(Debug, Clone, Copy)]
struct WindowEntry {
    count: u32,
    window_started: Instant,
    window: Duration,
}

pub struct RateLimiter {
    limits: LimitsConfig,
    entries: DashMap<String, WindowEntry>,
}

impl RateLimiter {
    pub fn new(limits: LimitsConfig) -> Self {
        Self {
            limits,
            entries: DashMap::new(),
        }
    }

    pub fn check_chat(&self, kind: ChatLimit, subject: &str) -> LimitDecision {
        let (max, window) = self.chat_policy(kind);
        let key = format!("{}:{subject}", kind.key_prefix());
        self.check_window(key, max, window, Instant::now())
    }

    pub fn check_api(&self, kind: ApiLimit, client_id: &str) -> LimitDecision {
        let (max, window) = self.api_policy(kind);
        let key = format!("{}:{client_id}", kind.key_prefix());
        self.check_window(key, max, window, Instant::now())
    }

    fn chat_policy(&self, kind: ChatLimit) -> (u32, Duration) {
        match kind {
            ChatLimit::Submission => (self.limits.chat_submissions_per_minute, MINUTE),
            ChatLimit::Generation => (self.limits.chat_generations_per_hour, HOUR),
            ChatLimit::ImageBatch => (self.limits.chat_image_batches_per_hour, HOUR),
        }
    }

    fn api_policy(&self, kind: ApiLimit) -> (u32, Duration) {
        match kind {
            ApiLimit::Public => (self.limits.api_public_per_minute, MINUTE),
            ApiLimit::Admin => (self.limits.api_admin_per_minute, MINUTE),
            ApiLimit::Translate => (self.limits.api_translate_per_hour, HOUR),
        }
    }

    /// Core fixed-window check. A fresh or expired window starts at one,
    /// a live window increments, and a full window rejects without
    /// consuming anything.
    fn check_window(&self, key: String, max: u32, window: Duration, now: Instant) -> LimitDecision {
        match self.entries.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(WindowEntry {
                    count: 1,
                    window_started: now,
                    window,
                });
                LimitDecision {
                    allowed: true,
                    limit: max,
                    remaining: max.saturating_sub(1),
                    resets_in: window,
                }
            }
            Entry::Occupied(mut slot) => {
                let entry = slot.get_mut();
                let elapsed = now.duration_since(entry.window_started);
                if elapsed >= entry.window {
                    *entry = WindowEntry {
                        count: 1,
                        window_started: now,
                        window,
                    };
                    return LimitDecision {
                        allowed: true,
                        limit: max,
                        remaining: max.saturating_sub(1),
                        resets_in: window,
                    };
                }
                let resets_in = entry.window - elapsed;
                if entry.count >= max {
                    return LimitDecision {
                        allowed: false,
                        limit: max,
                        remaining: 0,
                        resets_in,
                    };
                }
                entry.count += 1;
                LimitDecision {
                    allowed: true,
                    limit: max,
                    remaining: max.saturating_sub(entry.count),
                    resets_in,
                }
            }
        }
    }

    /// Removes windows whose duration has fully elapsed.
    fn sweep_at(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| now.duration_since(entry.window_started) < entry.window);
        before.saturating_sub(self.entries.len())
    }

    pub fn start_sweep(self: Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = interval.tick() => {
                        let removed = self.sweep_at(Instant::now());
                        if removed > 0 {
                            tracing::debug!(removed, "rate limit windows swept");
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> RateLimiter {
        RateLimiter::new(LimitsConfig::default())
    }

    #[test]
    fn a_full_window_rejects_the_next_request() {
        let rl = limiter();
        let window = Duration::from_secs(60);
        let t0 = Instant::now();
        for used in 1..=3u32 {
            let d = rl.check_window("k".to_string(), 3, window, t0);
            assert!(d.allowed, "request {used} should pass");
            assert_eq!(d.remaining, 3 - used);
        }
        let d = rl.check_window("k".to_string(), 3, window, t0);
        assert!(!d.allowed);
        assert_eq!(d.remaining, 0);
        assert_eq!(d.resets_in, window);
    }

    #[test]
    fn rejections_do_not_consume_the_window() {
        let rl = limiter();
        let window = Duration::from_secs(60);
        let t0 = Instant::now();
        for _ in 0..2 {
            rl.check_window("k".to_string(), 2, window, t0);
        }
        for _ in 0..5 {
            assert!(!rl.check_window("k".to_string(), 2, window, t0).allowed);
        }
        // After the window rolls, a single fresh slot must be enough.
        let d = rl.check_window("k".to_string(), 2, window, t0 + window);
        assert!(d.allowed);
        assert_eq!(d.remaining, 1);
    }

    #[test]
    fn an_expired_window_restarts_the_count() {
        let rl = limiter();
        let window = Duration::from_secs(60);
        let t0 = Instant::now();
        assert!(rl.check_window("k".to_string(), 1, window, t0).allowed);
        assert!(!rl.check_window("k".to_string(), 1, window, t0).allowed);
        assert!(rl.check_window("k".to_string(), 1, window, t0 + window).allowed);
    }

    #[test]
    fn separate_keys_keep_separate_windows() {
        let rl = limiter();
        let window = Duration::from_secs(60);
        let t0 = Instant::now();
        assert!(rl.check_window("a".to_string(), 1, window, t0).allowed);
        assert!(rl.check_window("b".to_string(), 1, window, t0).allowed);
        assert!(!rl.check_window("a".to_string(), 1, window, t0).allowed);
    }

    #[test]
    fn sweep_evicts_only_elapsed_windows() {
        let rl = limiter();
        let t0 = Instant::now();
        rl.check_window("short".to_string(), 5, Duration::from_secs(10), t0);
        rl.check_window("long".to_string(), 5, Duration::from_secs(300), t0);
        let removed = rl.sweep_at(t0 + Duration::from_secs(30));
        assert_eq!(removed, 1);
        assert!(rl.entries.contains_key("long"));
        assert!(!rl.entries.contains_key("short"));
    }

    #[test]
    fn chat_and_api_policies_use_their_own_namespaces() {
        let rl = limiter();
        let submit = rl.check_chat(ChatLimit::Submission, "42");
        assert!(submit.allowed);
        assert_eq!(submit.limit, 10);
        let public = rl.check_api(ApiLimit::Public, "42");
        assert!(public.allowed);
        assert_eq!(public.limit, 60);
        // Same client id, different prefixes, so both start fresh.
        assert_eq!(public.remaining, 59);
        assert_eq!(rl.check_chat(ChatLimit::Generation, "42").limit, 5);
        assert_eq!(rl.check_chat(ChatLimit::ImageBatch, "42").limit, 3);
    }
}
