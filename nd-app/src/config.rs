//! Configuration loading for the Newsdesk app.
//!
//! Reads `~/.newsdesk/config.toml` (or an explicit `--config` path), then
//! applies environment overrides for secrets so tokens never have to live
//! in the file.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct NewsdeskConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub keys: KeysConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub publish: PublishConfig,
    #[serde(default)]
    pub images: ImagesConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            data_dir: default_data_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct KeysConfig {
    #[serde(default)]
    pub openai_api_key: String,
    #[serde(default)]
    pub unsplash_access_key: String,
    #[serde(default)]
    pub cms_api_token: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TelegramConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub bot_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublishConfig {
    #[serde(default)]
    pub cms_base_url: String,
    #[serde(default = "default_primary_language")]
    pub primary_language: String,
    #[serde(default = "default_secondary_language")]
    pub secondary_language: String,
    #[serde(default = "default_excerpt_max_chars")]
    pub excerpt_max_chars: usize,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            cms_base_url: String::new(),
            primary_language: default_primary_language(),
            secondary_language: default_secondary_language(),
            excerpt_max_chars: default_excerpt_max_chars(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImagesConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_images_per_article")]
    pub per_article: usize,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            per_article: default_images_per_article(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_job_retention_minutes")]
    pub job_retention_minutes: u64,
    #[serde(default = "default_progress_poll_ms")]
    pub progress_poll_ms: u64,
    #[serde(default = "default_progress_timeout_seconds")]
    pub progress_timeout_seconds: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            job_retention_minutes: default_job_retention_minutes(),
            progress_poll_ms: default_progress_poll_ms(),
            progress_timeout_seconds: default_progress_timeout_seconds(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_submissions_per_minute")]
    pub chat_submissions_per_minute: u32,
    #[serde(default = "default_generations_per_hour")]
    pub chat_generations_per_hour: u32,
    #[serde(default = "default_image_batches_per_hour")]
    pub chat_image_batches_per_hour: u32,
    #[serde(default = "default_api_public_per_minute")]
    pub api_public_per_minute: u32,
    #[serde(default = "default_api_admin_per_minute")]
    pub api_admin_per_minute: u32,
    #[serde(default = "default_api_translate_per_hour")]
    pub api_translate_per_hour: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            chat_submissions_per_minute: default_submissions_per_minute(),
            chat_generations_per_hour: default_generations_per_hour(),
            chat_image_batches_per_hour: default_image_batches_per_hour(),
            api_public_per_minute: default_api_public_per_minute(),
            api_admin_per_minute: default_api_admin_per_minute(),
            api_translate_per_hour: default_api_translate_per_hour(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            request_timeout_seconds: default_request_timeout_seconds(),
            max_in_flight: default_max_in_flight(),
        }
    }
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_data_dir() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{home}/.newsdesk/data")
}

fn default_primary_language() -> String {
    "en".to_string()
}

fn default_secondary_language() -> String {
    "pl".to_string()
}

fn default_excerpt_max_chars() -> usize {
    nd_press::EXCERPT_MAX_CHARS
}

fn default_true() -> bool {
    true
}

fn default_images_per_article() -> usize {
    2
}

fn default_max_concurrency() -> usize {
    4
}

fn default_job_retention_minutes() -> u64 {
    30
}

fn default_progress_poll_ms() -> u64 {
    2_000
}

fn default_progress_timeout_seconds() -> u64 {
    120
}

fn default_submissions_per_minute() -> u32 {
    10
}

fn default_generations_per_hour() -> u32 {
    5
}

fn default_image_batches_per_hour() -> u32 {
    3
}

fn default_api_public_per_minute() -> u32 {
    60
}

fn default_api_admin_per_minute() -> u32 {
    100
}

fn default_api_translate_per_hour() -> u32 {
    20
}

fn default_port() -> u16 {
    8787
}

fn default_request_timeout_seconds() -> u64 {
    30
}

fn default_max_in_flight() -> usize {
    256
}

pub fn default_config_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".newsdesk").join("config.toml")
}

pub async fn load(path: Option<PathBuf>) -> Result<NewsdeskConfig> {
    let path = path.unwrap_or_else(default_config_path);
    let mut cfg = if path.exists() {
        let raw = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("read config {}", path.display()))?;
        toml::from_str::<NewsdeskConfig>(&raw)
            .with_context(|| format!("parse config {}", path.display()))?
    } else {
        NewsdeskConfig::default()
    };
    apply_env_overrides(&mut cfg);
    validate(&cfg)?;
    Ok(cfg)
}

fn apply_env_overrides(cfg: &mut NewsdeskConfig) {
    if let Ok(v) = std::env::var("NEWSDESK_MODEL") {
        if !v.trim().is_empty() {
            cfg.general.model = v;
        }
    }
    if let Ok(v) = std::env::var("OPENAI_API_KEY") {
        if !v.trim().is_empty() {
            cfg.keys.openai_api_key = v;
        }
    }
    if let Ok(v) = std::env::var("UNSPLASH_ACCESS_KEY") {
        if !v.trim().is_empty() {
            cfg.keys.unsplash_access_key = v;
        }
    }
    if let Ok(v) = std::env::var("CMS_API_TOKEN") {
        if !v.trim().is_empty() {
            cfg.keys.cms_api_token = v;
        }
    }
    if let Ok(v) = std::env::var("TELEGRAM_BOT_TOKEN") {
        if !v.trim().is_empty() {
            cfg.telegram.bot_token = v;
            cfg.telegram.enabled = true;
        }
    }
    if let Ok(v) = std::env::var("NEWSDESK_CMS_BASE_URL") {
        if !v.trim().is_empty() {
            cfg.publish.cms_base_url = v;
        }
    }
    if let Ok(v) = std::env::var("NEWSDESK_HTTP_PORT") {
        if let Ok(port) = v.trim().parse::<u16>() {
            cfg.http.port = port;
        }
    }
}

fn validate(cfg: &NewsdeskConfig) -> Result<()> {
    if cfg.general.model.trim().is_empty() {
        bail!("general.model is required");
    }
    if cfg.telegram.enabled && cfg.telegram.bot_token.trim().is_empty() {
        bail!("telegram.bot_token is required when telegram.enabled = true");
    }
    if cfg.publish.primary_language.trim().is_empty() {
        bail!("publish.primary_language is required");
    }
    if cfg.publish.excerpt_max_chars < 20 {
        bail!("publish.excerpt_max_chars must be >= 20");
    }
    if cfg.images.per_article > crate::prefs::MAX_IMAGES_PER_ARTICLE {
        bail!(
            "images.per_article must be <= {}",
            crate::prefs::MAX_IMAGES_PER_ARTICLE
        );
    }
    if cfg.queue.max_concurrency == 0 {
        bail!("queue.max_concurrency must be > 0");
    }
    if cfg.queue.progress_poll_ms == 0 {
        bail!("queue.progress_poll_ms must be > 0");
    }
    if cfg.http.max_in_flight == 0 {
        bail!("http.max_in_flight must be > 0");
    }
    Ok(())
}
