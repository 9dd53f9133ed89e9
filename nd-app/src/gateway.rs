//! Inbound message routing.
//!
//! Adapters push platform-neutral messages into one mpsc queue; the
//! gateway drains it and decides what each message is: a duplicate, a
//! command, a delete target, a compose part or a submission. A single
//! message can carry several links, fanned out as one job per link or
//! folded into one merged job, and a progress watcher reports back to
//! the chat.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use nd_channels::{ChannelAdapter, InboundMessage, OutboundMessage};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::commands::{CommandAction, CommandDeps, handle_command};
use crate::compose::DedupeGuard;
use crate::dispatch::ProgressWatcher;
use crate::i18n::{self, Lang};
use crate::jobs::{JobOrigin, Jobs, Submission, SubmissionKind};
use crate::pipeline::Pipeline;
use crate::ratelimit::{ChatLimit, RateLimiter};

/// Below this many characters a text submission is refused outright;
/// there is nothing to write an article from.
pub const MIN_TEXT_SUBMISSION_CHARS: usize = 100;

/// One message can carry several links; anything past the fifth is
/// ignored.
const MAX_BATCH_URLS: usize = 5;

pub struct Gateway {
    channels: HashMap<String, Arc<dyn ChannelAdapter>>,
    inbound_rx: Arc<Mutex<mpsc::Receiver<InboundMessage>>>,
    commands: CommandDeps,
    dedupe: Arc<DedupeGuard>,
    limiter: Arc<RateLimiter>,
    jobs: Arc<Jobs>,
    pipeline: Arc<Pipeline>,
    watcher: ProgressWatcher,
}

impl Gateway {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        channels: HashMap<String, Arc<dyn ChannelAdapter>>,
        inbound_rx: mpsc::Receiver<InboundMessage>,
        commands: CommandDeps,
        dedupe: Arc<DedupeGuard>,
        limiter: Arc<RateLimiter>,
        jobs: Arc<Jobs>,
        pipeline: Arc<Pipeline>,
        watcher: ProgressWatcher,
    ) -> Self {
        Self {
            channels,
            inbound_rx: Arc::new(Mutex::new(inbound_rx)),
            commands,
            dedupe,
            limiter,
            jobs,
            pipeline,
            watcher,
        }
    }

    pub fn start(self: Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run_loop(shutdown).await;
        })
    }

    async fn run_loop(&self, shutdown: CancellationToken) {
        loop {
            let message = {
                let mut rx = self.inbound_rx.lock().await;
                tokio::select! {
                    _ = shutdown.cancelled() => return,
                    message = rx.recv() => message,
                }
            };
            let Some(message) = message else {
                tracing::info!("inbound queue closed, gateway stopping");
                return;
            };
            if let Err(e) = self.handle_inbound(message).await {
                tracing::warn!(error = %e, "inbound message handling failed");
            }
        }
    }

    async fn handle_inbound(&self, msg: InboundMessage) -> Result<()> {
        let Some(channel) = self.channels.get(msg.channel_id.as_str()) else {
            tracing::warn!(channel = %msg.channel_id, "message from unknown channel");
            return Ok(());
        };
        let chat_id = msg.chat_id.as_str();
        let text = msg.content.trim().to_string();
        if text.is_empty() {
            return Ok(());
        }

        // Platform redelivery of the same message id stays silent.
        let delivery_key = format!("{}:{}:{}", msg.channel_id, chat_id, msg.message_id);
        if self.dedupe.was_recently_processed(&delivery_key) {
            tracing::debug!(key = %delivery_key, "redelivered message skipped");
            return Ok(());
        }
        self.dedupe.mark_processed(&delivery_key);

        let prefs = self.commands.prefs.get(chat_id);
        let lang = Lang::resolve(
            prefs.interface_language.as_deref(),
            msg.language_code.as_deref(),
        );

        // Per-sender gate; commands pass through it too.
        let surface = self
            .limiter
            .check_chat(ChatLimit::Submission, msg.sender_id.as_str());
        if !surface.allowed {
            self.reply(
                channel,
                chat_id,
                &msg,
                i18n::rate_limited(lang, surface.resets_in.as_secs()),
            )
            .await;
            return Ok(());
        }

        if let Some(action) = handle_command(&self.commands, chat_id, lang, &text).await {
            match action {
                CommandAction::Reply(reply) => {
                    self.reply(channel, chat_id, &msg, reply).await;
                }
                CommandAction::SubmitComposed(composed) => {
                    self.accept_submission(
                        channel,
                        chat_id,
                        &msg,
                        lang,
                        composed,
                        prefs.combine_links,
                    )
                    .await;
                }
                CommandAction::SubmitBundle(bundle) => {
                    self.accept_submission(channel, chat_id, &msg, lang, bundle, true)
                        .await;
                }
            }
            return Ok(());
        }

        if self.commands.delete_flags.is_armed(chat_id) {
            self.handle_delete_target(channel, chat_id, &msg, lang, &text)
                .await;
            return Ok(());
        }

        if self.commands.compose.is_active(chat_id) {
            if let Some(stats) = self.commands.compose.add_part(chat_id, &text) {
                self.reply(channel, chat_id, &msg, i18n::compose_part_added(lang, stats))
                    .await;
            }
            return Ok(());
        }

        self.accept_submission(channel, chat_id, &msg, lang, text, prefs.combine_links)
            .await;
        Ok(())
    }

    /// Delete mode: the next URL names the article to retract. Anything
    /// that is not a URL leaves the mode armed until its TTL runs out.
    async fn handle_delete_target(
        &self,
        channel: &Arc<dyn ChannelAdapter>,
        chat_id: &str,
        msg: &InboundMessage,
        lang: Lang,
        text: &str,
    ) {
        if !is_http_url(text) {
            self.reply(channel, chat_id, msg, i18n::invalid_url(lang)).await;
            return;
        }
        // The same target twice in quick succession is already handled.
        let delete_key = format!("delete:{chat_id}:{:x}", content_fingerprint(text));
        if self.dedupe.was_recently_processed(&delete_key) {
            return;
        }
        self.dedupe.mark_processed(&delete_key);
        self.commands.delete_flags.disarm(chat_id);
        match self.pipeline.retract_article(text).await {
            Ok(base_slug) => {
                self.reply(channel, chat_id, msg, i18n::delete_done(lang, &base_slug))
                    .await;
            }
            Err(e) => {
                tracing::warn!(chat_id, error = %e.message, "article retraction failed");
                self.reply(channel, chat_id, msg, i18n::delete_failed(lang)).await;
            }
        }
    }

    async fn accept_submission(
        &self,
        channel: &Arc<dyn ChannelAdapter>,
        chat_id: &str,
        msg: &InboundMessage,
        lang: Lang,
        content: String,
        combine: bool,
    ) {
        let links = extract_links(&content);
        if links.urls.is_empty() {
            let length = content.chars().count();
            if length < MIN_TEXT_SUBMISSION_CHARS {
                self.reply(
                    channel,
                    chat_id,
                    msg,
                    i18n::text_too_short(lang, MIN_TEXT_SUBMISSION_CHARS, length),
                )
                .await;
                return;
            }
            let submission = Submission {
                kind: SubmissionKind::Text,
                content,
                user_title: None,
                context: None,
                extra_sources: Vec::new(),
            };
            self.enqueue(channel, chat_id, msg, lang, submission).await;
            return;
        }
        // Prose around the links rides along as guidance for the writer.
        let context = (!links.leftover.is_empty()).then_some(links.leftover);
        if combine && links.urls.len() > 1 {
            let mut urls = links.urls;
            let lead = urls.remove(0);
            let submission = Submission {
                kind: SubmissionKind::Url,
                content: lead,
                user_title: None,
                context,
                extra_sources: urls,
            };
            self.enqueue(channel, chat_id, msg, lang, submission).await;
            return;
        }
        for url in links.urls {
            let submission = Submission {
                kind: SubmissionKind::Url,
                content: url,
                user_title: None,
                context: context.clone(),
                extra_sources: Vec::new(),
            };
            if !self.enqueue(channel, chat_id, msg, lang, submission).await {
                return;
            }
        }
    }

    /// Admission for one article: recent-duplicate guard, generation
    /// budget, then the queue. Returns `false` once the budget is gone
    /// so the rest of a batch is not tried.
    async fn enqueue(
        &self,
        channel: &Arc<dyn ChannelAdapter>,
        chat_id: &str,
        msg: &InboundMessage,
        lang: Lang,
        submission: Submission,
    ) -> bool {
        // The same URL or text again within seconds is the user double
        // sending, not new work. A bundle is keyed by all of its links.
        let mut basis = submission.content.clone();
        for url in &submission.extra_sources {
            basis.push('|');
            basis.push_str(url);
        }
        let content_key = format!("submit:{chat_id}:{:x}", content_fingerprint(&basis));
        if self.dedupe.was_recently_processed(&content_key) {
            self.reply(channel, chat_id, msg, i18n::duplicate_submission(lang)).await;
            return true;
        }

        let budget = self.limiter.check_chat(ChatLimit::Generation, chat_id);
        if !budget.allowed {
            self.reply(
                channel,
                chat_id,
                msg,
                i18n::rate_limited(lang, budget.resets_in.as_secs()),
            )
            .await;
            return false;
        }

        self.dedupe.mark_processed(&content_key);
        let origin = JobOrigin::Chat {
            channel_id: channel.channel_id().to_string(),
            chat_id: chat_id.to_string(),
            reply_language: lang.as_str().to_string(),
        };
        let job_id = self.jobs.submit(origin, submission);
        self.reply(channel, chat_id, msg, i18n::job_queued(lang, &job_id)).await;
        self.watcher
            .watch(channel.clone(), chat_id.to_string(), lang, job_id);
        true
    }

    async fn reply(
        &self,
        channel: &Arc<dyn ChannelAdapter>,
        chat_id: &str,
        msg: &InboundMessage,
        text: String,
    ) {
        let mut out = OutboundMessage::text(text);
        out.reply_to_message_id = Some(msg.message_id.clone());
        if let Err(e) = channel.send(chat_id, out).await {
            tracing::warn!(chat_id, error = %e, "reply send failed");
        }
    }
}

fn url_scheme_len(text: &str) -> Option<usize> {
    ["https://", "http://"]
        .into_iter()
        .find(|scheme| {
            text.get(..scheme.len())
                .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
        })
        .map(str::len)
}

fn is_http_url(text: &str) -> bool {
    url_scheme_len(text).is_some()
}

pub(crate) struct ExtractedLinks {
    pub(crate) urls: Vec<String>,
    /// The message with every link cut out, whitespace collapsed.
    pub(crate) leftover: String,
}

/// Pulls every http(s) link out of a message. A link runs until
/// whitespace, a quote or a closing bracket; trailing sentence
/// punctuation is dropped, repeats collapse and the batch is capped at
/// [`MAX_BATCH_URLS`].
pub(crate) fn extract_links(text: &str) -> ExtractedLinks {
    let lower = text.to_ascii_lowercase();
    let mut urls: Vec<String> = Vec::new();
    let mut kept = String::new();
    let mut from = 0;
    let mut copied = 0;
    while let Some(found) = lower[from..].find("http") {
        let start = from + found;
        let rest = &text[start..];
        let Some(scheme_len) = url_scheme_len(rest) else {
            from = start + 4;
            continue;
        };
        let end = rest
            .find(|c: char| c.is_whitespace() || matches!(c, '<' | '>' | '"' | '\'' | ')'))
            .unwrap_or(rest.len());
        kept.push_str(&text[copied..start]);
        copied = start + end;
        from = start + end;
        let url = rest[..end].trim_end_matches([',', '.', ';', '!', '?']);
        if url.len() == scheme_len || urls.iter().any(|u| u == url) {
            continue;
        }
        if urls.len() < MAX_BATCH_URLS {
            urls.push(url.to_string());
        }
    }
    kept.push_str(&text[copied..]);
    let leftover = kept.split_whitespace().collect::<Vec<_>>().join(" ");
    ExtractedLinks { urls, leftover }
}

fn content_fingerprint(content: &str) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    content.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;
    use std::time::{Duration, Instant};

    use async_trait::async_trait;
    use chrono::Utc;
    use nd_ai::{
        ArticleGenerator, Category, CategoryDetection, ContentStyle, GeneratedArticle,
        TranslatedArticle, Translator,
    };
    use nd_press::{
        ArticleDraft, ImageProvider, PageSource, ParsedPage, PublishTarget, PublishedPost,
    };

    use crate::compose::{ComposeSessions, DeleteModeFlags};
    use crate::config::LimitsConfig;
    use crate::jobs::JobStore;
    use crate::prefs::PreferenceStore;

    const BODY: &str = "First paragraph with plenty of words.\n\nSecond paragraph keeps going.\n\nThird paragraph adds detail.";

    const SOURCE: &str = "The committee approved the new transit plan on Tuesday after a long debate. Construction starts in March and the first line should open within two years.";

    struct HappyGenerator;

    #[async_trait]
    impl ArticleGenerator for HappyGenerator {
        async fn detect_category(
            &self,
            _text: &str,
            _title_hint: Option<&str>,
        ) -> nd_ai::Result<CategoryDetection> {
            Ok(CategoryDetection {
                category: Category::Tech,
                confidence: 0.9,
            })
        }

        async fn generate_title(&self, _text: &str, _category: Category) -> nd_ai::Result<String> {
            Ok("Test Story".to_string())
        }

        async fn generate_article(
            &self,
            _source_text: &str,
            title: &str,
            _style: ContentStyle,
            _language: &str,
        ) -> nd_ai::Result<GeneratedArticle> {
            Ok(GeneratedArticle {
                title: title.to_string(),
                content: BODY.to_string(),
                excerpt: "A short excerpt.".to_string(),
                category: Category::Tech,
                word_count: 100,
            })
        }
    }

    struct HappyTranslator;

    #[async_trait]
    impl Translator for HappyTranslator {
        async fn translate(
            &self,
            title: &str,
            content: &str,
            excerpt: &str,
            _from: &str,
            _to: &str,
        ) -> nd_ai::Result<TranslatedArticle> {
            Ok(TranslatedArticle {
                title: title.to_string(),
                content: content.to_string(),
                excerpt: excerpt.to_string(),
            })
        }
    }

    struct HappyPages;

    #[async_trait]
    impl PageSource for HappyPages {
        async fn fetch_page(&self, _url: &str) -> nd_press::Result<ParsedPage> {
            Ok(ParsedPage {
                title: "Fetched".to_string(),
                text: BODY.to_string(),
            })
        }
    }

    struct NoImages;

    #[async_trait]
    impl ImageProvider for NoImages {
        async fn find_image(&self, _query: &str) -> nd_press::Result<String> {
            Err(nd_press::PressError::Http("offline".to_string()))
        }
    }

    #[derive(Default)]
    struct RecordingCms {
        published: StdMutex<Vec<ArticleDraft>>,
        retracted: StdMutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl PublishTarget for RecordingCms {
        async fn publish(&self, draft: &ArticleDraft) -> nd_press::Result<PublishedPost> {
            let mut published = self.published.lock().expect("lock");
            published.push(draft.clone());
            Ok(PublishedPost {
                post_id: format!("post-{}", published.len()),
                url: format!("https://site.example/{}/article/{}", draft.language, draft.slug),
            })
        }

        async fn retract(&self, slug: &str, language: &str) -> nd_press::Result<()> {
            self.retracted
                .lock()
                .expect("lock")
                .push((slug.to_string(), language.to_string()));
            Ok(())
        }
    }

    #[derive(Default)]
    struct CapturingChannel {
        sent: StdMutex<Vec<String>>,
    }

    impl CapturingChannel {
        fn messages(&self) -> Vec<String> {
            self.sent.lock().expect("lock").clone()
        }
    }

    #[async_trait]
    impl ChannelAdapter for CapturingChannel {
        fn channel_id(&self) -> &str {
            "telegram"
        }

        async fn start(&self, _tx: mpsc::Sender<InboundMessage>) -> anyhow::Result<()> {
            Ok(())
        }

        async fn send(&self, _chat_id: &str, message: OutboundMessage) -> anyhow::Result<()> {
            self.sent.lock().expect("lock").push(message.content);
            Ok(())
        }
    }

    struct Harness {
        gateway: Gateway,
        channel: Arc<CapturingChannel>,
        cms: Arc<RecordingCms>,
        _dir: tempfile::TempDir,
    }

    async fn harness() -> Harness {
        harness_with_limits(LimitsConfig::default()).await
    }

    async fn harness_with_limits(limits: LimitsConfig) -> Harness {
        let dir = tempfile::tempdir().expect("tempdir");
        let prefs = Arc::new(PreferenceStore::load(dir.path().join("prefs.json")).await);
        let compose = Arc::new(ComposeSessions::default());
        let delete_flags = Arc::new(DeleteModeFlags::default());
        let store = Arc::new(JobStore::new(Duration::from_secs(1_800)));
        let limiter = Arc::new(RateLimiter::new(limits));
        let cms = Arc::new(RecordingCms::default());

        let pipeline = Arc::new(Pipeline::new(
            Arc::new(HappyGenerator),
            Arc::new(HappyTranslator),
            Arc::new(HappyPages),
            Arc::new(NoImages),
            cms.clone(),
            prefs.clone(),
            limiter.clone(),
            crate::pipeline::PipelineSettings {
                primary_language: "en".to_string(),
                secondary_language: "pl".to_string(),
                excerpt_max_chars: 160,
                images_enabled: false,
                images_per_article: 0,
            },
        ));
        let jobs = Arc::new(Jobs::new(store.clone(), pipeline.clone(), 2));
        let watcher = ProgressWatcher::new(
            store.clone(),
            Duration::from_millis(10),
            Duration::from_secs(5),
        );
        let channel = Arc::new(CapturingChannel::default());
        let mut channels: HashMap<String, Arc<dyn ChannelAdapter>> = HashMap::new();
        channels.insert("telegram".to_string(), channel.clone());

        let (_tx, rx) = mpsc::channel(8);
        let gateway = Gateway::new(
            channels,
            rx,
            CommandDeps {
                prefs,
                compose,
                delete_flags,
                jobs_store: store,
                model: "gpt-4o-mini".to_string(),
                started_at: Instant::now(),
            },
            Arc::new(DedupeGuard::default()),
            limiter,
            jobs,
            pipeline,
            watcher,
        );
        Harness {
            gateway,
            channel,
            cms,
            _dir: dir,
        }
    }

    fn inbound(id: &str, text: &str) -> InboundMessage {
        InboundMessage {
            message_id: id.into(),
            channel_id: "telegram".into(),
            sender_id: "99".into(),
            chat_id: "7".into(),
            is_group: false,
            content: text.to_string(),
            language_code: Some("en".to_string()),
            received_at: Utc::now(),
        }
    }

    async fn wait_for(channel: &CapturingChannel, count: usize) -> Vec<String> {
        for _ in 0..200 {
            let messages = channel.messages();
            if messages.len() >= count {
                return messages;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        channel.messages()
    }

    #[tokio::test]
    async fn a_text_submission_is_queued_and_reported_published() {
        let h = harness().await;
        h.gateway
            .handle_inbound(inbound("m1", SOURCE))
            .await
            .expect("handle inbound");

        let messages = wait_for(h.channel.as_ref(), 2).await;
        assert!(messages[0].contains("queued"));
        assert!(messages[1].contains("https://site.example/en/article/"));
        assert_eq!(h.cms.published.lock().expect("lock").len(), 2);
    }

    #[tokio::test]
    async fn a_url_batch_queues_one_job_per_link() {
        let h = harness().await;
        h.gateway
            .handle_inbound(inbound(
                "m1",
                "Two worth covering: https://news.example/one, https://news.example/two.",
            ))
            .await
            .expect("handle inbound");

        let messages = wait_for(h.channel.as_ref(), 4).await;
        assert_eq!(messages.iter().filter(|m| m.contains("queued")).count(), 2);
        assert_eq!(h.gateway.commands.jobs_store.stats().total, 2);
        // Two jobs, two locales each.
        assert_eq!(h.cms.published.lock().expect("lock").len(), 4);
    }

    #[tokio::test]
    async fn single_mode_folds_a_url_batch_into_one_job() {
        let h = harness().await;
        h.gateway.handle_inbound(inbound("m1", "/mode single")).await.expect("mode");
        h.gateway
            .handle_inbound(inbound(
                "m2",
                "https://news.example/one https://news.example/two",
            ))
            .await
            .expect("handle inbound");

        let messages = wait_for(h.channel.as_ref(), 3).await;
        // mode ack, one queued ack, one published report.
        assert_eq!(messages.iter().filter(|m| m.contains("queued")).count(), 1);
        assert_eq!(h.gateway.commands.jobs_store.stats().total, 1);
        assert_eq!(h.cms.published.lock().expect("lock").len(), 2);
    }

    #[tokio::test]
    async fn the_single_command_bundles_without_touching_the_mode() {
        let h = harness().await;
        h.gateway
            .handle_inbound(inbound(
                "m1",
                "/single https://news.example/one https://news.example/two",
            ))
            .await
            .expect("bundle");

        let messages = wait_for(h.channel.as_ref(), 2).await;
        assert_eq!(messages.iter().filter(|m| m.contains("queued")).count(), 1);
        assert_eq!(h.gateway.commands.jobs_store.stats().total, 1);
        assert!(!h.gateway.commands.prefs.get("7").combine_links);
    }

    #[tokio::test]
    async fn commands_never_reach_the_queue() {
        let h = harness().await;
        h.gateway
            .handle_inbound(inbound("m1", "/help"))
            .await
            .expect("handle inbound");
        let messages = wait_for(h.channel.as_ref(), 1).await;
        assert!(messages[0].contains("/compose"));
        assert!(h.cms.published.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn compose_parts_join_before_submission() {
        let h = harness().await;
        h.gateway.handle_inbound(inbound("m1", "/compose")).await.expect("compose");
        h.gateway
            .handle_inbound(inbound(
                "m2",
                "The first half of the story sets the scene in the old harbor district.",
            ))
            .await
            .expect("part 1");
        h.gateway
            .handle_inbound(inbound(
                "m3",
                "The second half explains what the renovation will cost and who pays.",
            ))
            .await
            .expect("part 2");
        h.gateway.handle_inbound(inbound("m4", "/done")).await.expect("done");

        let messages = wait_for(h.channel.as_ref(), 5).await;
        // started, part 1, part 2, queued, published
        assert!(messages[1].contains("Part 1"));
        assert!(messages[2].contains("Part 2"));
        assert!(messages[4].contains("https://site.example/en/article/"));
    }

    #[tokio::test]
    async fn delete_mode_retracts_the_next_url_in_both_locales() {
        let h = harness().await;
        h.gateway.handle_inbound(inbound("m1", "/delete")).await.expect("delete");
        h.gateway
            .handle_inbound(inbound("m2", "https://site.example/en/article/old-story-en"))
            .await
            .expect("target url");

        let messages = wait_for(h.channel.as_ref(), 2).await;
        assert!(messages[1].contains("old-story"));
        let retracted = h.cms.retracted.lock().expect("lock");
        assert_eq!(retracted.len(), 2);
        assert_eq!(retracted[0].0, "old-story-en");
        assert_eq!(retracted[1].0, "old-story-pl");
        // The flag is consumed; fresh URLs are submissions again.
        assert!(!h.gateway.commands.delete_flags.is_armed("7"));
    }

    #[tokio::test]
    async fn delete_mode_survives_a_non_url_message() {
        let h = harness().await;
        h.gateway.handle_inbound(inbound("m1", "/delete")).await.expect("delete");
        h.gateway
            .handle_inbound(inbound("m2", "which one was it again"))
            .await
            .expect("chatter");
        let messages = wait_for(h.channel.as_ref(), 2).await;
        assert!(messages[1].contains("http"));
        assert!(h.gateway.commands.delete_flags.is_armed("7"));
    }

    #[tokio::test]
    async fn a_repeated_delete_target_is_swallowed() {
        let h = harness().await;
        let target = "https://site.example/en/article/old-story-en";
        h.gateway.handle_inbound(inbound("m1", "/delete")).await.expect("arm");
        h.gateway.handle_inbound(inbound("m2", target)).await.expect("target");
        h.gateway.handle_inbound(inbound("m3", "/delete")).await.expect("re-arm");
        h.gateway.handle_inbound(inbound("m4", target)).await.expect("repeat");

        // armed, removed, armed again; the repeat stays silent.
        assert_eq!(h.channel.messages().len(), 3);
        assert_eq!(h.cms.retracted.lock().expect("lock").len(), 2);
    }

    #[tokio::test]
    async fn redelivered_message_ids_are_silently_dropped() {
        let h = harness().await;
        h.gateway.handle_inbound(inbound("m1", "/help")).await.expect("first");
        h.gateway.handle_inbound(inbound("m1", "/help")).await.expect("second");
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(h.channel.messages().len(), 1);
    }

    #[tokio::test]
    async fn resending_the_same_url_within_seconds_is_refused() {
        let h = harness().await;
        let url = "https://news.example/story";
        h.gateway.handle_inbound(inbound("m1", url)).await.expect("first");
        h.gateway.handle_inbound(inbound("m2", url)).await.expect("second");

        let messages = wait_for(h.channel.as_ref(), 2).await;
        assert!(messages.iter().any(|m| m.contains("still working")));
        // Only one job went through.
        assert_eq!(h.gateway.commands.jobs_store.stats().total, 1);
    }

    #[tokio::test]
    async fn short_text_is_rejected_before_the_queue() {
        let h = harness().await;
        h.gateway.handle_inbound(inbound("m1", "too short")).await.expect("handle");
        let messages = wait_for(h.channel.as_ref(), 1).await;
        assert!(messages[0].contains("too short"));
        assert!(messages[0].contains("Minimum: 100"));
        assert_eq!(h.gateway.commands.jobs_store.stats().total, 0);
    }

    #[tokio::test]
    async fn an_exhausted_generation_budget_stops_the_batch() {
        let h = harness_with_limits(LimitsConfig {
            chat_generations_per_hour: 1,
            ..LimitsConfig::default()
        })
        .await;
        h.gateway
            .handle_inbound(inbound(
                "m1",
                "https://news.example/one https://news.example/two",
            ))
            .await
            .expect("handle inbound");

        let messages = wait_for(h.channel.as_ref(), 2).await;
        assert!(messages.iter().any(|m| m.contains("Too many requests")));
        assert_eq!(h.gateway.commands.jobs_store.stats().total, 1);
    }

    #[tokio::test]
    async fn a_flooding_sender_is_cut_off_before_command_handling() {
        let h = harness_with_limits(LimitsConfig {
            chat_submissions_per_minute: 1,
            ..LimitsConfig::default()
        })
        .await;
        h.gateway.handle_inbound(inbound("m1", "/help")).await.expect("first");
        h.gateway.handle_inbound(inbound("m2", "/help")).await.expect("second");

        let messages = h.channel.messages();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].contains("/compose"));
        assert!(messages[1].contains("Too many requests"));
    }

    #[test]
    fn url_detection_requires_an_http_scheme() {
        assert!(is_http_url("https://a.example/x"));
        assert!(is_http_url("http://a.example/x"));
        assert!(is_http_url("HTTPS://a.example/x"));
        assert!(!is_http_url("ftp://a.example/x"));
        assert!(!is_http_url("a.example/x"));
    }

    #[test]
    fn urls_are_extracted_with_trailing_punctuation_stripped() {
        assert_eq!(
            extract_links("Read https://a.example/one, then (https://b.example/two).").urls,
            vec!["https://a.example/one", "https://b.example/two"]
        );
    }

    #[test]
    fn repeated_urls_collapse_to_one() {
        assert_eq!(
            extract_links("https://a.example/x and again https://a.example/x").urls,
            vec!["https://a.example/x"]
        );
    }

    #[test]
    fn a_batch_is_capped_at_five_urls() {
        let text = (1..=7)
            .map(|n| format!("https://a.example/{n}"))
            .collect::<Vec<_>>()
            .join(" ");
        let urls = extract_links(&text).urls;
        assert_eq!(urls.len(), MAX_BATCH_URLS);
        assert_eq!(urls[4], "https://a.example/5");
    }

    #[test]
    fn a_bare_scheme_is_not_a_url() {
        assert!(extract_links("https:// is how every link starts").urls.is_empty());
        assert!(extract_links("no links in here").urls.is_empty());
    }

    #[test]
    fn prose_around_links_becomes_the_leftover() {
        let parts = extract_links("Cover https://a.example/x with focus on the pricing change.");
        assert_eq!(parts.urls, vec!["https://a.example/x"]);
        assert_eq!(parts.leftover, "Cover with focus on the pricing change.");

        let bare = extract_links("https://a.example/x");
        assert!(bare.leftover.is_empty());
    }
}
