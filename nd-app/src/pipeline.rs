//! Publish pipeline: one submission in, one or two published articles out.
//!
//! The stages run in a fixed order and differ in how much failure they
//! tolerate. Category detection and image lookups degrade silently,
//! translation loss drops the second locale, but source parsing, article
//! generation and the primary publication abort the job.

use std::sync::Arc;
use std::time::Instant;

use nd_ai::{ArticleGenerator, Category, CategoryDetection, Translator, fallback_title};
use nd_press::{
    ArticleDraft, ImageProvider, PageSource, PublishTarget, clean_article_content, clean_title,
    collect_images, generate_slug, image_queries, place_inline_images, seo_excerpt,
};

use crate::config::NewsdeskConfig;
use crate::jobs::{
    JobError, JobErrorKind, JobOrigin, JobRecord, PublishOutcome, PublishedRef, SubmissionKind,
};
use crate::prefs::{ChatPrefs, MAX_IMAGES_PER_ARTICLE, PreferenceStore};
use crate::ratelimit::{ChatLimit, RateLimiter};

const DEFAULT_TITLE: &str = "Untitled Article";

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub primary_language: String,
    /// Second locale to publish. Empty disables translation entirely.
    pub secondary_language: String,
    pub excerpt_max_chars: usize,
    pub images_enabled: bool,
    pub images_per_article: usize,
}

impl PipelineSettings {
    pub fn from_config(cfg: &NewsdeskConfig) -> Self {
        Self {
            primary_language: cfg.publish.primary_language.clone(),
            secondary_language: cfg.publish.secondary_language.clone(),
            excerpt_max_chars: cfg.publish.excerpt_max_chars,
            images_enabled: cfg.images.enabled,
            images_per_article: cfg.images.per_article,
        }
    }
}

pub struct Pipeline {
    generator: Arc<dyn ArticleGenerator>,
    translator: Arc<dyn Translator>,
    pages: Arc<dyn PageSource>,
    images: Arc<dyn ImageProvider>,
    cms: Arc<dyn PublishTarget>,
    prefs: Arc<PreferenceStore>,
    limiter: Arc<RateLimiter>,
    settings: PipelineSettings,
}

impl Pipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        generator: Arc<dyn ArticleGenerator>,
        translator: Arc<dyn Translator>,
        pages: Arc<dyn PageSource>,
        images: Arc<dyn ImageProvider>,
        cms: Arc<dyn PublishTarget>,
        prefs: Arc<PreferenceStore>,
        limiter: Arc<RateLimiter>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            generator,
            translator,
            pages,
            images,
            cms,
            prefs,
            limiter,
            settings,
        }
    }

    pub async fn run(&self, job: &JobRecord) -> Result<PublishOutcome, JobError> {
        let started = Instant::now();
        let (source_text, page_title) = self.resolve_source(job).await?;
        let (chat_key, prefs) = self.resolve_prefs(&job.origin);

        let detection = self.detect_category(&source_text, page_title.as_deref()).await;
        let category_label = detection.category.as_str().to_string();

        let title = self
            .resolve_title(job, &source_text, page_title.as_deref(), detection.category)
            .await?;

        let generated = self
            .generator
            .generate_article(
                &source_text,
                &title,
                prefs.content_style,
                &self.settings.primary_language,
            )
            .await
            .map_err(|e| JobError {
                kind: JobErrorKind::Generation,
                message: format!("generation failed: {e}"),
            })?;

        let image_urls = self
            .acquire_images(&title, &category_label, &chat_key, &prefs)
            .await;
        let hero_image_url = image_urls.first().cloned();
        let inline_images: Vec<String> = image_urls.iter().skip(1).cloned().collect();

        let cleaned = clean_article_content(&generated.content).map_err(press_error)?;
        let excerpt_source = if generated.excerpt.trim().is_empty() {
            cleaned.clone()
        } else {
            generated.excerpt.clone()
        };
        let excerpt = seo_excerpt(&excerpt_source, self.settings.excerpt_max_chars)
            .map_err(press_error)?;
        let content = place_inline_images(&cleaned, &inline_images, &title).content;

        let translation = self.translate(&title, &content, &excerpt).await;

        let base_slug = base_slug(&title, &job.id);
        let primary_lang = self.settings.primary_language.clone();
        let primary_draft = ArticleDraft {
            title: title.clone(),
            content: content.clone(),
            excerpt: excerpt.clone(),
            category: category_label.clone(),
            language: primary_lang.clone(),
            slug: format!("{base_slug}-{primary_lang}"),
            hero_image_url: hero_image_url.clone(),
        };
        let primary_post = self.cms.publish(&primary_draft).await.map_err(|e| JobError {
            kind: JobErrorKind::Publication,
            message: format!("publication failed: {e}"),
        })?;
        let primary = PublishedRef {
            post_id: primary_post.post_id,
            url: primary_post.url,
            language: primary_lang,
        };

        let secondary = match translation {
            Some(translated) => {
                let secondary_lang = self.settings.secondary_language.clone();
                let draft = ArticleDraft {
                    title: translated.title,
                    content: translated.content,
                    excerpt: translated.excerpt,
                    category: category_label.clone(),
                    language: secondary_lang.clone(),
                    slug: format!("{base_slug}-{secondary_lang}"),
                    hero_image_url: hero_image_url.clone(),
                };
                match self.cms.publish(&draft).await {
                    Ok(post) => Some(PublishedRef {
                        post_id: post.post_id,
                        url: post.url,
                        language: secondary_lang,
                    }),
                    Err(e) => {
                        tracing::warn!(
                            slug = %draft.slug,
                            error = %e,
                            "second locale publication failed; keeping primary only"
                        );
                        None
                    }
                }
            }
            None => None,
        };

        Ok(PublishOutcome {
            title,
            category: category_label,
            word_count: generated.word_count,
            image_count: image_urls.len(),
            elapsed_ms: started.elapsed().as_millis() as u64,
            primary,
            secondary,
        })
    }

    async fn resolve_source(&self, job: &JobRecord) -> Result<(String, Option<String>), JobError> {
        match job.submission.kind {
            SubmissionKind::Url if !job.submission.extra_sources.is_empty() => {
                self.resolve_merged_source(job).await
            }
            SubmissionKind::Url => {
                let page = self
                    .pages
                    .fetch_page(&job.submission.content)
                    .await
                    .map_err(|e| JobError {
                        kind: JobErrorKind::Parsing,
                        message: format!("page parsing failed: {e}"),
                    })?;
                let text = match job.submission.context.as_deref() {
                    Some(context) if !context.trim().is_empty() => {
                        format!("{}\n\nAdditional context from the requester:\n{context}", page.text)
                    }
                    _ => page.text,
                };
                Ok((text, Some(page.title)))
            }
            SubmissionKind::Text => Ok((job.submission.content.clone(), None)),
        }
    }

    /// Single mode: every link contributes a source block, and an
    /// unreadable page among several is tolerated. Only a fully dead
    /// bundle fails the job.
    async fn resolve_merged_source(
        &self,
        job: &JobRecord,
    ) -> Result<(String, Option<String>), JobError> {
        let mut blocks = Vec::new();
        if let Some(context) = job.submission.context.as_deref() {
            if !context.trim().is_empty() {
                blocks.push(format!("### Additional context\n\n{context}"));
            }
        }
        let urls = std::iter::once(job.submission.content.as_str())
            .chain(job.submission.extra_sources.iter().map(String::as_str));
        let mut fetched = 0usize;
        for (index, url) in urls.enumerate() {
            match self.pages.fetch_page(url).await {
                Ok(page) => {
                    fetched += 1;
                    blocks.push(format!(
                        "### Source {}: {}\nURL: {url}\n\n{}",
                        index + 1,
                        page.title,
                        page.text
                    ));
                }
                Err(e) => {
                    tracing::warn!(url, error = %e, "merged source skipped an unreadable page");
                }
            }
        }
        if fetched == 0 {
            return Err(JobError {
                kind: JobErrorKind::Parsing,
                message: "page parsing failed: every page in the bundle was unreadable".to_string(),
            });
        }
        let title = if fetched == 1 {
            "Single source article".to_string()
        } else {
            format!("Combined analysis from {fetched} URLs")
        };
        Ok((blocks.join("\n\n---\n\n"), Some(title)))
    }

    fn resolve_prefs(&self, origin: &JobOrigin) -> (String, ChatPrefs) {
        match origin {
            JobOrigin::Chat { chat_id, .. } => (chat_id.clone(), self.prefs.get(chat_id)),
            JobOrigin::Api => (
                "api".to_string(),
                ChatPrefs {
                    images_per_article: self.settings.images_per_article,
                    ..ChatPrefs::default()
                },
            ),
        }
    }

    async fn detect_category(&self, text: &str, title_hint: Option<&str>) -> CategoryDetection {
        match self.generator.detect_category(text, title_hint).await {
            Ok(detection) => {
                tracing::debug!(
                    category = detection.category.as_str(),
                    confidence = detection.confidence,
                    "category detected"
                );
                detection
            }
            Err(e) => {
                tracing::warn!(error = %e, "category detection failed; using default");
                CategoryDetection {
                    category: Category::default(),
                    confidence: 0.5,
                }
            }
        }
    }

    async fn resolve_title(
        &self,
        job: &JobRecord,
        source_text: &str,
        page_title: Option<&str>,
        category: Category,
    ) -> Result<String, JobError> {
        if let Some(user_title) = job.submission.user_title.as_deref() {
            if !user_title.trim().is_empty() {
                return clean_title(user_title).map_err(press_error);
            }
        }
        match self.generator.generate_title(source_text, category).await {
            Ok(title) => Ok(title),
            Err(e) => {
                tracing::warn!(error = %e, "title generation failed; using fallback");
                let fallback = fallback_title(source_text);
                if !fallback.is_empty() {
                    return Ok(fallback);
                }
                Ok(page_title
                    .map(str::to_string)
                    .filter(|t| !t.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_TITLE.to_string()))
            }
        }
    }

    /// Looks up images for the article. A spent budget or a failed
    /// lookup means fewer images, never a failed job.
    async fn acquire_images(
        &self,
        title: &str,
        category: &str,
        chat_key: &str,
        prefs: &ChatPrefs,
    ) -> Vec<String> {
        if !self.settings.images_enabled {
            return Vec::new();
        }
        let count = prefs.images_per_article.min(MAX_IMAGES_PER_ARTICLE);
        if count == 0 {
            return Vec::new();
        }
        let budget = self.limiter.check_chat(ChatLimit::ImageBatch, chat_key);
        if !budget.allowed {
            tracing::warn!(
                chat = chat_key,
                resets_in_secs = budget.resets_in.as_secs(),
                "image budget exhausted; publishing without images"
            );
            return Vec::new();
        }
        let queries = image_queries(title, category, count);
        collect_images(self.images.as_ref(), &queries).await
    }

    async fn translate(
        &self,
        title: &str,
        content: &str,
        excerpt: &str,
    ) -> Option<nd_ai::TranslatedArticle> {
        let to = self.settings.secondary_language.trim();
        if to.is_empty() || to == self.settings.primary_language {
            return None;
        }
        match self
            .translator
            .translate(title, content, excerpt, &self.settings.primary_language, to)
            .await
        {
            Ok(translated) => Some(translated),
            Err(e) => {
                tracing::warn!(to, error = %e, "translation failed; publishing primary only");
                None
            }
        }
    }

    /// Removes a published article in every configured locale. Returns the
    /// base slug when at least one locale edition went away.
    pub async fn retract_article(&self, url: &str) -> Result<String, JobError> {
        let slug = slug_from_url(url).ok_or_else(|| JobError {
            kind: JobErrorKind::Parsing,
            message: format!("no article slug in url: {url}"),
        })?;
        let mut languages = vec![self.settings.primary_language.clone()];
        let secondary = self.settings.secondary_language.trim();
        if !secondary.is_empty() && secondary != self.settings.primary_language {
            languages.push(secondary.to_string());
        }
        let base = strip_locale_suffix(&slug, &languages);

        let mut removed = 0usize;
        for language in &languages {
            let locale_slug = format!("{base}-{language}");
            match self.cms.retract(&locale_slug, language).await {
                Ok(()) => removed += 1,
                Err(e) => {
                    tracing::warn!(slug = %locale_slug, error = %e, "retract failed for locale");
                }
            }
        }
        if removed == 0 {
            return Err(JobError {
                kind: JobErrorKind::Publication,
                message: format!("retract failed for every locale of {base}"),
            });
        }
        tracing::info!(slug = %base, removed, "article retracted");
        Ok(base)
    }
}

fn press_error(e: nd_press::PressError) -> JobError {
    let message = e.to_string();
    JobError {
        kind: JobErrorKind::classify(&message),
        message,
    }
}

fn base_slug(title: &str, job_id: &str) -> String {
    let slug = generate_slug(title);
    if !slug.is_empty() {
        return slug;
    }
    let id = job_id.chars().take(8).collect::<String>().to_ascii_lowercase();
    format!("story-{id}")
}

/// Extracts the trailing path segment of an article URL, without query or
/// fragment. The URL must actually have a path beyond the host.
fn slug_from_url(url: &str) -> Option<String> {
    let without_fragment = url.split('#').next().unwrap_or(url);
    let without_query = without_fragment.split('?').next().unwrap_or(without_fragment);
    let rest = without_query
        .strip_prefix("https://")
        .or_else(|| without_query.strip_prefix("http://"))?;
    let (_, path) = rest.trim_end_matches('/').split_once('/')?;
    let segment = path.rsplit('/').next()?;
    if segment.is_empty() || !segment.contains(|c: char| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(segment.to_string())
}

fn strip_locale_suffix(slug: &str, languages: &[String]) -> String {
    for language in languages {
        if let Some(base) = slug.strip_suffix(&format!("-{language}")) {
            if !base.is_empty() {
                return base.to_string();
            }
        }
    }
    slug.to_string()
}
