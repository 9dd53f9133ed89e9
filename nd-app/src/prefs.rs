//! Per-chat preferences with a JSON snapshot on disk.
//!
//! Preferences survive restarts but are not precious: a missing or
//! unreadable snapshot falls back to defaults with a warning.

use std::collections::BTreeMap;
use std::path::PathBuf;

use dashmap::DashMap;
use nd_ai::ContentStyle;
use serde::{Deserialize, Serialize};

/// Upper bound a chat can set via `/images`.
pub const MAX_IMAGES_PER_ARTICLE: usize = 3;

fn default_images_per_article() -> usize {
    2
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatPrefs {
    #[serde(default)]
    pub content_style: ContentStyle,
    /// 0 turns images off for this chat.
    #[serde(default = "default_images_per_article")]
    pub images_per_article: usize,
    /// `/mode single`: several links in one message become one merged
    /// article instead of an article per link.
    #[serde(default)]
    pub combine_links: bool,
    /// Reply language override set via `/language`. `None` means follow the
    /// platform locale hint.
    #[serde(default)]
    pub interface_language: Option<String>,
}

impl Default for ChatPrefs {
    fn default() -> Self {
        Self {
            content_style: ContentStyle::default(),
            images_per_article: default_images_per_article(),
            combine_links: false,
            interface_language: None,
        }
    }
}

pub struct PreferenceStore {
    path: PathBuf,
    map: DashMap<String, ChatPrefs>,
}

impl PreferenceStore {
    pub async fn load(path: PathBuf) -> Self {
        let map = DashMap::new();
        match tokio::fs::read_to_string(&path).await {
            Ok(raw) => match serde_json::from_str::<BTreeMap<String, ChatPrefs>>(&raw) {
                Ok(entries) => {
                    for (chat_id, prefs) in entries {
                        map.insert(chat_id, prefs);
                    }
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "preference snapshot unreadable, starting fresh");
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "preference snapshot unreadable, starting fresh");
            }
        }
        Self { path, map }
    }

    pub fn get(&self, chat_id: &str) -> ChatPrefs {
        self.map
            .get(chat_id)
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    pub async fn update(&self, chat_id: &str, apply: impl FnOnce(&mut ChatPrefs)) -> ChatPrefs {
        let updated = {
            let mut entry = self.map.entry(chat_id.to_string()).or_default();
            apply(&mut entry);
            entry.clone()
        };
        self.persist().await;
        updated
    }

    async fn persist(&self) {
        let snapshot: BTreeMap<String, ChatPrefs> = self
            .map
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        let json = match serde_json::to_string_pretty(&snapshot) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(error = %e, "preference snapshot serialization failed");
                return;
            }
        };
        if let Some(parent) = self.path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                tracing::warn!(path = %parent.display(), error = %e, "preference dir create failed");
                return;
            }
        }
        if let Err(e) = tokio::fs::write(&self.path, json).await {
            tracing::warn!(path = %self.path.display(), error = %e, "preference snapshot write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn a_missing_snapshot_starts_with_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = PreferenceStore::load(dir.path().join("prefs.json")).await;
        let prefs = store.get("7");
        assert_eq!(prefs.content_style, ContentStyle::Journalistic);
        assert_eq!(prefs.images_per_article, 2);
        assert!(!prefs.combine_links);
        assert!(prefs.interface_language.is_none());
    }

    #[tokio::test]
    async fn updates_survive_a_reload() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("prefs.json");
        let store = PreferenceStore::load(path.clone()).await;
        store
            .update("7", |p| {
                p.content_style = ContentStyle::Technical;
                p.images_per_article = 0;
                p.combine_links = true;
                p.interface_language = Some("pl".to_string());
            })
            .await;

        let reloaded = PreferenceStore::load(path).await;
        let prefs = reloaded.get("7");
        assert_eq!(prefs.content_style, ContentStyle::Technical);
        assert_eq!(prefs.images_per_article, 0);
        assert!(prefs.combine_links);
        assert_eq!(prefs.interface_language.as_deref(), Some("pl"));
        // Untouched chats still read as defaults.
        assert_eq!(reloaded.get("8").images_per_article, 2);
    }

    #[tokio::test]
    async fn a_corrupt_snapshot_is_ignored() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("prefs.json");
        tokio::fs::write(&path, "not json at all")
            .await
            .expect("write snapshot");
        let store = PreferenceStore::load(path).await;
        assert_eq!(store.get("7").images_per_article, 2);
    }

    #[tokio::test]
    async fn snapshot_fields_tolerate_partial_entries() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("prefs.json");
        tokio::fs::write(&path, r#"{"7":{"content_style":"casual"}}"#)
            .await
            .expect("write snapshot");
        let store = PreferenceStore::load(path).await;
        let prefs = store.get("7");
        assert_eq!(prefs.content_style, ContentStyle::Casual);
        assert_eq!(prefs.images_per_article, 2);
    }
}
