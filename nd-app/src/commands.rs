//! Slash command handling.
//!
//! Returns `None` for anything that is not a command, so the gateway can
//! fall through to submission handling. `/done` is the one command that
//! produces work instead of a reply.

use std::sync::Arc;
use std::time::Instant;

use crate::compose::{ComposeSessions, ComposeStats, DeleteModeFlags};
use crate::i18n::{self, Lang};
use crate::jobs::{JobStatus, JobStore, QueueStats};
use crate::prefs::{MAX_IMAGES_PER_ARTICLE, PreferenceStore};

#[derive(Debug, Clone, PartialEq)]
pub enum CommandAction {
    Reply(String),
    /// Finalized compose text, to be run through the normal submission path.
    SubmitComposed(String),
    /// `/single` payload: its links merge into one article regardless of
    /// the chat's mode.
    SubmitBundle(String),
}

pub struct CommandDeps {
    pub prefs: Arc<PreferenceStore>,
    pub compose: Arc<ComposeSessions>,
    pub delete_flags: Arc<DeleteModeFlags>,
    pub jobs_store: Arc<JobStore>,
    pub model: String,
    pub started_at: Instant,
}

pub async fn handle_command(
    deps: &CommandDeps,
    chat_id: &str,
    lang: Lang,
    input: &str,
) -> Option<CommandAction> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }
    let (command, arg) = split_command(trimmed);

    let action = match command.as_str() {
        "/start" => CommandAction::Reply(i18n::welcome(lang)),
        "/help" => CommandAction::Reply(i18n::help_text(lang)),
        "/status" => CommandAction::Reply(status_report(deps, chat_id, lang)),
        "/queue" => CommandAction::Reply(queue_report(deps.jobs_store.stats())),
        "/job" => CommandAction::Reply(job_report(deps, lang, arg)),
        "/style" => handle_style(deps, chat_id, lang, arg).await,
        "/images" => handle_images(deps, chat_id, lang, arg).await,
        "/mode" => handle_mode(deps, chat_id, lang, arg).await,
        "/single" => {
            if crate::gateway::extract_links(arg).urls.is_empty() {
                CommandAction::Reply(i18n::single_usage(lang))
            } else {
                CommandAction::SubmitBundle(arg.to_string())
            }
        }
        "/language" | "/lang" => handle_language(deps, chat_id, lang, arg).await,
        "/settings" => CommandAction::Reply(settings_report(deps, chat_id, lang)),
        "/compose" => {
            deps.compose.start(chat_id);
            CommandAction::Reply(i18n::compose_started(lang))
        }
        "/preview" => match deps.compose.composed_text(chat_id) {
            Some(text) => {
                let stats = deps.compose.stats(chat_id).unwrap_or(ComposeStats {
                    message_count: 0,
                    total_chars: 0,
                    duration_secs: 0,
                });
                CommandAction::Reply(i18n::compose_preview(lang, &text, stats))
            }
            None => CommandAction::Reply(i18n::compose_empty(lang)),
        },
        "/done" => match deps.compose.finalize(chat_id) {
            Some(text) => CommandAction::SubmitComposed(text),
            None => CommandAction::Reply(i18n::compose_empty(lang)),
        },
        "/cancel" => {
            if deps.compose.cancel(chat_id) {
                CommandAction::Reply(i18n::compose_cancelled(lang))
            } else if deps.delete_flags.disarm(chat_id) {
                CommandAction::Reply(i18n::cancelled(lang))
            } else {
                CommandAction::Reply(i18n::nothing_to_cancel(lang))
            }
        }
        "/delete" => {
            deps.delete_flags.arm(chat_id);
            CommandAction::Reply(i18n::delete_armed(lang))
        }
        _ => CommandAction::Reply(i18n::unknown_command(lang)),
    };
    Some(action)
}

/// Splits `/style casual` into command and argument, dropping any
/// `@BotName` suffix Telegram appends in group chats.
fn split_command(input: &str) -> (String, &str) {
    let mut parts = input.splitn(2, char::is_whitespace);
    let head = parts.next().unwrap_or("");
    let arg = parts.next().unwrap_or("").trim();
    let command = head.split('@').next().unwrap_or(head).to_ascii_lowercase();
    (command, arg)
}

async fn handle_style(
    deps: &CommandDeps,
    chat_id: &str,
    lang: Lang,
    arg: &str,
) -> CommandAction {
    let options = style_options();
    if arg.is_empty() {
        let current = deps.prefs.get(chat_id).content_style;
        return CommandAction::Reply(i18n::style_current(lang, current.as_str(), &options));
    }
    match nd_ai::ContentStyle::parse(arg) {
        Some(style) => {
            deps.prefs.update(chat_id, |p| p.content_style = style).await;
            CommandAction::Reply(i18n::style_set(lang, style.as_str()))
        }
        None => CommandAction::Reply(i18n::style_unknown(lang, &options)),
    }
}

async fn handle_images(
    deps: &CommandDeps,
    chat_id: &str,
    lang: Lang,
    arg: &str,
) -> CommandAction {
    if arg.is_empty() {
        let prefs = deps.prefs.get(chat_id);
        return CommandAction::Reply(i18n::images_current(lang, prefs.images_per_article));
    }
    match arg.parse::<usize>() {
        Ok(count) if count <= MAX_IMAGES_PER_ARTICLE => {
            deps.prefs
                .update(chat_id, |p| p.images_per_article = count)
                .await;
            CommandAction::Reply(i18n::images_set(lang, count))
        }
        _ => CommandAction::Reply(i18n::images_invalid(lang)),
    }
}

async fn handle_mode(
    deps: &CommandDeps,
    chat_id: &str,
    lang: Lang,
    arg: &str,
) -> CommandAction {
    if arg.is_empty() {
        let current = deps.prefs.get(chat_id).combine_links;
        return CommandAction::Reply(i18n::mode_current(lang, current));
    }
    match parse_combine_mode(arg) {
        Some(combine) => {
            deps.prefs.update(chat_id, |p| p.combine_links = combine).await;
            CommandAction::Reply(i18n::mode_set(lang, combine))
        }
        None => CommandAction::Reply(i18n::mode_invalid(lang)),
    }
}

fn parse_combine_mode(arg: &str) -> Option<bool> {
    match arg.to_ascii_lowercase().as_str() {
        "single" | "one" | "combined" | "on" | "true" | "1" | "yes" => Some(true),
        "batch" | "multi" | "off" | "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

async fn handle_language(
    deps: &CommandDeps,
    chat_id: &str,
    lang: Lang,
    arg: &str,
) -> CommandAction {
    match arg.to_ascii_lowercase().as_str() {
        "en" | "pl" | "ru" => {
            let code = arg.to_ascii_lowercase();
            let new_lang = Lang::from_code(&code);
            deps.prefs
                .update(chat_id, |p| p.interface_language = Some(code))
                .await;
            CommandAction::Reply(i18n::lang_set(new_lang))
        }
        _ => CommandAction::Reply(i18n::lang_current(lang, lang.as_str())),
    }
}

fn style_options() -> String {
    nd_ai::ContentStyle::ALL
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn status_report(deps: &CommandDeps, chat_id: &str, lang: Lang) -> String {
    let prefs = deps.prefs.get(chat_id);
    let stats = deps.jobs_store.stats();
    let reply_lang = prefs
        .interface_language
        .clone()
        .unwrap_or_else(|| lang.as_str().to_string());
    format!(
        "<b>Newsdesk</b>\nUptime: {}\nModel: {}\nQueue: {} queued, {} processing, {} completed, {} failed\nStyle: {} | Images: {} | Mode: {} | Lang: {}",
        fmt_uptime(deps.started_at.elapsed().as_secs()),
        deps.model,
        stats.queued,
        stats.processing,
        stats.completed,
        stats.failed,
        prefs.content_style.as_str(),
        prefs.images_per_article,
        if prefs.combine_links { "single" } else { "batch" },
        reply_lang,
    )
}

fn settings_report(deps: &CommandDeps, chat_id: &str, lang: Lang) -> String {
    let prefs = deps.prefs.get(chat_id);
    let reply_lang = prefs
        .interface_language
        .clone()
        .unwrap_or_else(|| lang.as_str().to_string());
    i18n::settings_summary(
        lang,
        prefs.content_style.as_str(),
        prefs.images_per_article,
        prefs.combine_links,
        &reply_lang,
    )
}

fn job_report(deps: &CommandDeps, lang: Lang, arg: &str) -> String {
    let job_id = arg.trim();
    if job_id.is_empty() {
        return i18n::job_usage(lang);
    }
    let Some(record) = deps.jobs_store.get(job_id) else {
        return i18n::job_not_found(lang, job_id);
    };
    match record.status {
        JobStatus::Queued => i18n::job_in_progress(lang, &record.id, false),
        JobStatus::Processing => i18n::job_in_progress(lang, &record.id, true),
        JobStatus::Completed => match record.outcome {
            Some(outcome) => i18n::job_completed(lang, &outcome),
            None => i18n::job_in_progress(lang, &record.id, true),
        },
        JobStatus::Failed => i18n::job_failed(
            lang,
            record.error.map(|e| e.kind).unwrap_or(crate::jobs::JobErrorKind::Unknown),
        ),
    }
}

fn queue_report(stats: QueueStats) -> String {
    format!(
        "<b>Queue</b>\nqueued {} | processing {} | completed {} | failed {} (total {})",
        stats.queued, stats.processing, stats.completed, stats.failed, stats.total
    )
}

fn fmt_uptime(total_secs: u64) -> String {
    let hours = total_secs / 3_600;
    let minutes = (total_secs % 3_600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use nd_ai::ContentStyle;

    use crate::jobs::JobStore;

    async fn deps() -> (CommandDeps, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("tempdir");
        let deps = CommandDeps {
            prefs: Arc::new(PreferenceStore::load(dir.path().join("prefs.json")).await),
            compose: Arc::new(ComposeSessions::default()),
            delete_flags: Arc::new(DeleteModeFlags::default()),
            jobs_store: Arc::new(JobStore::new(Duration::from_secs(1_800))),
            model: "gpt-4o-mini".to_string(),
            started_at: Instant::now(),
        };
        (deps, dir)
    }

    #[tokio::test]
    async fn plain_text_is_not_a_command() {
        let (deps, _dir) = deps().await;
        assert!(handle_command(&deps, "7", Lang::En, "just some text").await.is_none());
        assert!(handle_command(&deps, "7", Lang::En, "  ").await.is_none());
    }

    #[tokio::test]
    async fn unknown_commands_get_a_fallback_reply() {
        let (deps, _dir) = deps().await;
        let action = handle_command(&deps, "7", Lang::En, "/frobnicate").await.expect("action");
        let CommandAction::Reply(reply) = action else {
            panic!("expected a reply");
        };
        assert!(reply.contains("Unknown command"));
    }

    #[tokio::test]
    async fn bot_name_suffixes_are_ignored() {
        let (deps, _dir) = deps().await;
        let action = handle_command(&deps, "7", Lang::En, "/start@NewsdeskBot").await.expect("action");
        let CommandAction::Reply(reply) = action else {
            panic!("expected a reply");
        };
        assert!(reply.contains("Newsdesk"));
    }

    #[tokio::test]
    async fn style_changes_stick_in_preferences() {
        let (deps, _dir) = deps().await;
        let action = handle_command(&deps, "7", Lang::En, "/style casual").await.expect("action");
        assert!(matches!(action, CommandAction::Reply(_)));
        assert_eq!(deps.prefs.get("7").content_style, ContentStyle::Casual);

        // An alias works too.
        handle_command(&deps, "7", Lang::En, "/style seo").await;
        assert_eq!(deps.prefs.get("7").content_style, ContentStyle::SeoOptimized);
    }

    #[tokio::test]
    async fn image_count_is_bounded_to_three() {
        let (deps, _dir) = deps().await;
        handle_command(&deps, "7", Lang::En, "/images 3").await;
        assert_eq!(deps.prefs.get("7").images_per_article, 3);

        handle_command(&deps, "7", Lang::En, "/images 0").await;
        assert_eq!(deps.prefs.get("7").images_per_article, 0);

        let action = handle_command(&deps, "7", Lang::En, "/images 4").await.expect("action");
        let CommandAction::Reply(reply) = action else {
            panic!("expected a reply");
        };
        assert!(reply.contains("0..3"));
        assert_eq!(deps.prefs.get("7").images_per_article, 0);

        let action = handle_command(&deps, "7", Lang::En, "/images off").await.expect("action");
        let CommandAction::Reply(reply) = action else {
            panic!("expected a reply");
        };
        assert!(reply.contains("0..3"));
    }

    #[tokio::test]
    async fn mode_switches_between_single_and_batch() {
        let (deps, _dir) = deps().await;
        handle_command(&deps, "7", Lang::En, "/mode single").await;
        assert!(deps.prefs.get("7").combine_links);

        // Aliases map onto the two modes.
        handle_command(&deps, "7", Lang::En, "/mode off").await;
        assert!(!deps.prefs.get("7").combine_links);
        handle_command(&deps, "7", Lang::En, "/mode combined").await;
        assert!(deps.prefs.get("7").combine_links);

        let action = handle_command(&deps, "7", Lang::En, "/mode sideways").await.expect("action");
        let CommandAction::Reply(reply) = action else {
            panic!("expected a reply");
        };
        assert!(reply.contains("single or batch"));
        assert!(deps.prefs.get("7").combine_links);
    }

    #[tokio::test]
    async fn single_hands_its_links_to_the_bundle_path() {
        let (deps, _dir) = deps().await;
        let action = handle_command(
            &deps,
            "7",
            Lang::En,
            "/single https://a.example/one https://a.example/two",
        )
        .await
        .expect("action");
        assert_eq!(
            action,
            CommandAction::SubmitBundle(
                "https://a.example/one https://a.example/two".to_string()
            )
        );

        // Without a link there is nothing to bundle.
        let action = handle_command(&deps, "7", Lang::En, "/single").await.expect("action");
        let CommandAction::Reply(reply) = action else {
            panic!("expected a reply");
        };
        assert!(reply.contains("/single https://"));
    }

    #[tokio::test]
    async fn done_hands_back_the_composed_text() {
        let (deps, _dir) = deps().await;
        deps.compose.start("7");
        deps.compose.add_part("7", "Part 1");
        deps.compose.add_part("7", "Part 2");
        let action = handle_command(&deps, "7", Lang::En, "/done").await.expect("action");
        assert_eq!(
            action,
            CommandAction::SubmitComposed("Part 1\n\nPart 2".to_string())
        );
    }

    #[tokio::test]
    async fn done_without_a_session_replies_instead_of_submitting() {
        let (deps, _dir) = deps().await;
        let action = handle_command(&deps, "7", Lang::En, "/done").await.expect("action");
        assert!(matches!(action, CommandAction::Reply(_)));
    }

    #[tokio::test]
    async fn cancel_prefers_compose_then_delete_mode() {
        let (deps, _dir) = deps().await;
        deps.compose.start("7");
        deps.delete_flags.arm("7");

        handle_command(&deps, "7", Lang::En, "/cancel").await;
        assert!(!deps.compose.is_active("7"));
        assert!(deps.delete_flags.is_armed("7"));

        handle_command(&deps, "7", Lang::En, "/cancel").await;
        assert!(!deps.delete_flags.is_armed("7"));
    }

    #[tokio::test]
    async fn language_switch_replies_in_the_new_language() {
        let (deps, _dir) = deps().await;
        let action = handle_command(&deps, "7", Lang::En, "/language pl").await.expect("action");
        let CommandAction::Reply(reply) = action else {
            panic!("expected a reply");
        };
        assert!(reply.contains("polsku"));
        assert_eq!(deps.prefs.get("7").interface_language.as_deref(), Some("pl"));

        // The short form is accepted too.
        handle_command(&deps, "7", Lang::En, "/lang ru").await;
        assert_eq!(deps.prefs.get("7").interface_language.as_deref(), Some("ru"));
    }

    #[tokio::test]
    async fn preview_shows_the_collected_text_without_ending_the_session() {
        let (deps, _dir) = deps().await;
        deps.compose.start("7");
        deps.compose.add_part("7", "First piece of the story");
        let action = handle_command(&deps, "7", Lang::En, "/preview").await.expect("action");
        let CommandAction::Reply(reply) = action else {
            panic!("expected a reply");
        };
        assert!(reply.contains("First piece of the story"));
        assert!(deps.compose.is_active("7"));
    }

    #[tokio::test]
    async fn job_lookup_reports_per_status() {
        let (deps, _dir) = deps().await;
        let record = crate::jobs::JobRecord::new(
            crate::jobs::JobOrigin::Api,
            crate::jobs::Submission {
                kind: crate::jobs::SubmissionKind::Text,
                content: "text".to_string(),
                user_title: None,
                context: None,
                extra_sources: Vec::new(),
            },
        );
        let id = record.id.clone();
        deps.jobs_store.insert(record);

        let action = handle_command(&deps, "7", Lang::En, &format!("/job {id}")).await.expect("action");
        let CommandAction::Reply(reply) = action else {
            panic!("expected a reply");
        };
        assert!(reply.contains("queued"));

        let action = handle_command(&deps, "7", Lang::En, "/job missing").await.expect("action");
        let CommandAction::Reply(reply) = action else {
            panic!("expected a reply");
        };
        assert!(reply.contains("No job"));

        let action = handle_command(&deps, "7", Lang::En, "/job").await.expect("action");
        let CommandAction::Reply(reply) = action else {
            panic!("expected a reply");
        };
        assert!(reply.contains("Usage"));
    }

    #[tokio::test]
    async fn settings_show_current_preferences() {
        let (deps, _dir) = deps().await;
        handle_command(&deps, "7", Lang::En, "/style technical").await;
        let action = handle_command(&deps, "7", Lang::En, "/settings").await.expect("action");
        let CommandAction::Reply(reply) = action else {
            panic!("expected a reply");
        };
        assert!(reply.contains("technical"));
        assert!(reply.contains("2"));
        assert!(reply.contains("batch"));
    }

    #[test]
    fn uptime_formats_scale_with_duration() {
        assert_eq!(fmt_uptime(42), "42s");
        assert_eq!(fmt_uptime(330), "5m 30s");
        assert_eq!(fmt_uptime(7_980), "2h 13m");
    }
}
