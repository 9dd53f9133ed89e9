use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use axum::Extension;
use axum::http::HeaderMap;
use axum::http::Request;
use axum::http::StatusCode;
use axum::response::Response;
use nd_ai::{AiClient, Translator};
use nd_channels::{ChannelAdapter, OutboundMessage, TelegramAdapter};
use nd_press::{CmsClient, HttpPageFetcher, UnsplashClient};
use tokio_util::sync::CancellationToken;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::classify::ServerErrorsFailureClass;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::commands::CommandDeps;
use crate::compose::{self, ComposeSessions, DedupeGuard, DeleteModeFlags};
use crate::config::{self, NewsdeskConfig};
use crate::dispatch::ProgressWatcher;
use crate::gateway::Gateway;
use crate::http_limit;
use crate::jobs::{JobStore, Jobs};
use crate::pipeline::{Pipeline, PipelineSettings};
use crate::prefs::PreferenceStore;
use crate::ratelimit::RateLimiter;
use crate::routes;

const INBOUND_QUEUE_DEPTH: usize = 256;

pub struct AppState {
    pub cfg: NewsdeskConfig,
    pub started_at: Instant,
    pub jobs: Arc<Jobs>,
    pub store: Arc<JobStore>,
    pub limiter: Arc<RateLimiter>,
    pub translator: Arc<dyn Translator>,
}

pub async fn doctor(config_path: Option<PathBuf>) -> Result<()> {
    let path = config_path
        .clone()
        .unwrap_or_else(config::default_config_path);
    let cfg = config::load(config_path).await?;
    tracing::info!(
        model = %cfg.general.model,
        data_dir = %cfg.general.data_dir,
        config_path = %path.display(),
        "config ok"
    );
    if cfg.keys.openai_api_key.trim().is_empty() {
        tracing::warn!("keys.openai_api_key is empty; article generation will fail");
    } else {
        tracing::info!("openai key present");
    }
    if cfg.publish.cms_base_url.trim().is_empty() || cfg.keys.cms_api_token.trim().is_empty() {
        tracing::warn!("publish.cms_base_url or keys.cms_api_token is empty; publishing will fail");
    } else {
        tracing::info!(cms_base_url = %cfg.publish.cms_base_url, "cms target configured");
    }
    if cfg.images.enabled && cfg.keys.unsplash_access_key.trim().is_empty() {
        tracing::warn!("keys.unsplash_access_key is empty; articles will publish without images");
    }
    if cfg.telegram.enabled {
        tracing::info!("telegram channel enabled");
    } else {
        tracing::info!("telegram channel disabled; only the http api will accept submissions");
    }
    Ok(())
}

pub async fn status(config_path: Option<PathBuf>) -> Result<()> {
    let path = config_path
        .clone()
        .unwrap_or_else(config::default_config_path);
    let cfg = config::load(config_path).await?;
    tracing::info!(
        model = %cfg.general.model,
        primary_language = %cfg.publish.primary_language,
        secondary_language = %cfg.publish.secondary_language,
        max_concurrency = cfg.queue.max_concurrency,
        config_path = %path.display(),
        "status ok"
    );
    Ok(())
}

pub async fn send_one_shot(
    config_path: Option<PathBuf>,
    channel: &str,
    recipient: &str,
    message: &str,
) -> Result<()> {
    let cfg = config::load(config_path).await?;
    let adapter: Arc<dyn ChannelAdapter> = match channel {
        "telegram" => Arc::new(TelegramAdapter::new(&cfg.telegram.bot_token)?),
        other => return Err(anyhow::anyhow!("unknown channel: {other}")),
    };
    adapter
        .send(recipient, OutboundMessage::text(message.to_string()))
        .await?;
    Ok(())
}

pub async fn serve(config_path: Option<PathBuf>) -> Result<()> {
    let cfg = config::load(config_path).await?;
    let started_at = Instant::now();
    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.http.port));
    tracing::info!(
        model = %cfg.general.model,
        data_dir = %cfg.general.data_dir,
        primary_language = %cfg.publish.primary_language,
        secondary_language = %cfg.publish.secondary_language,
        telegram_enabled = cfg.telegram.enabled,
        images_enabled = cfg.images.enabled,
        max_concurrency = cfg.queue.max_concurrency,
        %addr,
        "newsdesk starting"
    );
    let listener = preflight_bind_listener(addr).await?;

    let data_dir = expand_home(&cfg.general.data_dir)?;
    tokio::fs::create_dir_all(&data_dir).await?;
    let prefs = Arc::new(PreferenceStore::load(data_dir.join("prefs.json")).await);

    let limiter = Arc::new(RateLimiter::new(cfg.limits.clone()));
    let compose_sessions = Arc::new(ComposeSessions::default());
    let delete_flags = Arc::new(DeleteModeFlags::default());
    let dedupe = Arc::new(DedupeGuard::default());

    let ai = Arc::new(AiClient::new(&cfg.keys.openai_api_key, &cfg.general.model));
    let pages = Arc::new(HttpPageFetcher::new());
    let images = Arc::new(UnsplashClient::new(&cfg.keys.unsplash_access_key));
    let cms = Arc::new(CmsClient::new(
        &cfg.publish.cms_base_url,
        &cfg.keys.cms_api_token,
    ));
    let pipeline = Arc::new(Pipeline::new(
        ai.clone(),
        ai.clone(),
        pages,
        images,
        cms,
        prefs.clone(),
        limiter.clone(),
        PipelineSettings::from_config(&cfg),
    ));

    let store = Arc::new(JobStore::new(Duration::from_secs(
        cfg.queue.job_retention_minutes * 60,
    )));
    let jobs = Arc::new(Jobs::new(
        store.clone(),
        pipeline.clone(),
        cfg.queue.max_concurrency,
    ));
    let watcher = ProgressWatcher::new(
        store.clone(),
        Duration::from_millis(cfg.queue.progress_poll_ms),
        Duration::from_secs(cfg.queue.progress_timeout_seconds),
    );

    let (inbound_tx, inbound_rx) = tokio::sync::mpsc::channel(INBOUND_QUEUE_DEPTH);
    let mut channels: HashMap<String, Arc<dyn ChannelAdapter>> = HashMap::new();
    if cfg.telegram.enabled {
        let adapter: Arc<dyn ChannelAdapter> =
            Arc::new(TelegramAdapter::new(&cfg.telegram.bot_token)?);
        adapter.start(inbound_tx.clone()).await?;
        channels.insert(adapter.channel_id().to_string(), adapter);
    }

    let commands = CommandDeps {
        prefs: prefs.clone(),
        compose: compose_sessions.clone(),
        delete_flags: delete_flags.clone(),
        jobs_store: store.clone(),
        model: cfg.general.model.clone(),
        started_at,
    };
    let gateway = Arc::new(Gateway::new(
        channels.clone(),
        inbound_rx,
        commands,
        dedupe.clone(),
        limiter.clone(),
        jobs.clone(),
        pipeline.clone(),
        watcher,
    ));
    let shutdown = CancellationToken::new();
    let gateway_handle = gateway.start(shutdown.child_token());
    tracing::info!(
        channel_count = channels.len(),
        channels = ?channels.keys().collect::<Vec<_>>(),
        "gateway started"
    );

    let sweep_handle = limiter.clone().start_sweep(shutdown.child_token());
    let chat_sweep_handle = compose::start_sweeps(
        compose_sessions,
        delete_flags,
        dedupe,
        shutdown.child_token(),
    );
    let retention_handle = store.clone().start_retention_sweep(shutdown.child_token());

    let state = Arc::new(AppState {
        cfg: cfg.clone(),
        started_at,
        jobs,
        store,
        limiter,
        translator: ai,
    });

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<_>| {
            tracing::info_span!(
                "http.request",
                method = %request.method(),
                uri = %request.uri(),
                version = ?request.version(),
                request_id = %request_id_from_headers(request.headers())
            )
        })
        .on_request(|request: &Request<_>, _span: &tracing::Span| {
            tracing::info!(
                method = %request.method(),
                uri = %request.uri(),
                request_id = %request_id_from_headers(request.headers()),
                "http request started"
            );
        })
        .on_response(
            |response: &Response, latency: Duration, _span: &tracing::Span| {
                tracing::info!(
                    status = response.status().as_u16(),
                    latency_ms = latency.as_millis() as u64,
                    "http request completed"
                );
            },
        )
        .on_failure(
            |error: ServerErrorsFailureClass, latency: Duration, _span: &tracing::Span| {
                tracing::error!(
                    error_class = %error,
                    latency_ms = latency.as_millis() as u64,
                    "http request failed"
                );
            },
        );

    let app = routes::router()
        .layer(axum::middleware::from_fn(http_limit::enforce_api_budget))
        .layer(Extension(state))
        .layer(GlobalConcurrencyLimitLayer::new(cfg.http.max_in_flight))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(cfg.http.request_timeout_seconds),
        ))
        .layer(trace_layer)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid));

    tracing::info!(%addr, "newsdesk serving");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;
    tracing::info!("http server shutdown completed");

    shutdown.cancel();
    match gateway_handle.await {
        Ok(()) => tracing::info!("gateway shutdown completed"),
        Err(e) => tracing::error!(error = %e, "gateway task join failed during shutdown"),
    }
    for (name, handle) in [
        ("rate limit sweep", sweep_handle),
        ("chat state sweep", chat_sweep_handle),
        ("job retention sweep", retention_handle),
    ] {
        if let Err(e) = handle.await {
            tracing::error!(task = name, error = %e, "background task join failed during shutdown");
        }
    }

    Ok(())
}

async fn preflight_bind_listener(addr: SocketAddr) -> Result<tokio::net::TcpListener> {
    tracing::info!(%addr, "preflight bind check starting");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("preflight bind failed for {addr}: {e}"))?;
    tracing::info!(%addr, "preflight bind check passed");
    Ok(listener)
}

fn expand_home(path: &str) -> Result<PathBuf> {
    let trimmed = path.trim().to_string();
    if !trimmed.starts_with("~/") {
        return Ok(PathBuf::from(trimmed));
    }
    let home = std::env::var("HOME").map_err(|_| anyhow::anyhow!("HOME is not set"))?;
    Ok(PathBuf::from(trimmed.replacen("~", &home, 1)))
}

fn request_id_from_headers(headers: &HeaderMap) -> String {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
        .unwrap_or_else(|| "missing".to_string())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(sig) => sig,
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler; falling back to ctrl_c only");
                if let Err(ctrlc_err) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %ctrlc_err, "failed to await ctrl-c signal");
                }
                shutdown.cancel();
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::warn!("received ctrl-c; beginning graceful shutdown");
            }
            _ = terminate.recv() => {
                tracing::warn!("received SIGTERM; beginning graceful shutdown");
            }
        }
    }
    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to await ctrl-c signal");
        } else {
            tracing::warn!("received ctrl-c; beginning graceful shutdown");
        }
    }
    shutdown.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_home_passes_absolute_paths_through() {
        let expanded = expand_home("/var/lib/newsdesk").unwrap();
        assert_eq!(expanded, PathBuf::from("/var/lib/newsdesk"));
    }

    #[test]
    fn expand_home_replaces_tilde_prefix() {
        let Ok(home) = std::env::var("HOME") else {
            return;
        };
        let expanded = expand_home("~/.newsdesk/data").unwrap();
        assert_eq!(expanded, PathBuf::from(home).join(".newsdesk/data"));
    }

    #[test]
    fn request_id_falls_back_when_header_missing() {
        let headers = HeaderMap::new();
        assert_eq!(request_id_from_headers(&headers), "missing");
    }
}
