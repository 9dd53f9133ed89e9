use crate::error::{PressError, Result};
use crate::traits::PublishTarget;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Finished article ready for the CMS, one locale per draft.
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleDraft {
    pub title: String,
    pub content: String,
    pub excerpt: String,
    pub category: String,
    pub language: String,
    pub slug: String,
    pub hero_image_url: Option<String>,
}

/// What the CMS reports back after accepting a draft.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedPost {
    pub post_id: String,
    pub url: String,
}

/// HTTP client for the article CMS: bearer-token publish and retract.
#[derive(Clone)]
pub struct CmsClient {
    http: reqwest::Client,
    base_url: String,
    api_token: String,
}

impl CmsClient {
    pub fn new(base_url: &str, api_token: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(%e, "reqwest client build failed; falling back to default client");
                reqwest::Client::new()
            });
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token: api_token.to_string(),
        }
    }
}

#[async_trait]
impl PublishTarget for CmsClient {
    #[tracing::instrument(level = "info", skip_all, fields(slug = %draft.slug, language = %draft.language))]
    async fn publish(&self, draft: &ArticleDraft) -> Result<PublishedPost> {
        let endpoint = format!("{}/api/articles", self.base_url);
        let request = PublishRequest::from_draft(draft);

        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(&self.api_token)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(PressError::Http(format!(
                "cms publish status={status} body={body}"
            )));
        }

        let parsed: PublishResponse = serde_json::from_str(&body)?;
        if parsed.id.is_empty() {
            return Err(PressError::ResponseFormat(
                "cms response missing article id".to_string(),
            ));
        }

        let url = if parsed.url.is_empty() {
            format!(
                "{}/{}/article/{}",
                self.base_url, draft.language, draft.slug
            )
        } else {
            parsed.url
        };
        Ok(PublishedPost {
            post_id: parsed.id,
            url,
        })
    }

    #[tracing::instrument(level = "info", skip_all, fields(slug = %slug, language = %language))]
    async fn retract(&self, slug: &str, language: &str) -> Result<()> {
        let endpoint = format!("{}/api/articles/{slug}", self.base_url);

        let response = self
            .http
            .delete(&endpoint)
            .query(&[("language", language)])
            .bearer_auth(&self.api_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PressError::Http(format!(
                "cms retract status={status} body={body}"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct PublishRequest {
    title: String,
    content: String,
    excerpt: String,
    category: String,
    language: String,
    slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    hero_image_url: Option<String>,
    published_at: String,
}

impl PublishRequest {
    fn from_draft(draft: &ArticleDraft) -> Self {
        Self {
            title: draft.title.clone(),
            content: draft.content.clone(),
            excerpt: draft.excerpt.clone(),
            category: draft.category.clone(),
            language: draft.language.clone(),
            slug: draft.slug.clone(),
            hero_image_url: draft.hero_image_url.clone(),
            published_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PublishResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> ArticleDraft {
        ArticleDraft {
            title: "Title".to_string(),
            content: "Body".to_string(),
            excerpt: "Excerpt".to_string(),
            category: "tech".to_string(),
            language: "en".to_string(),
            slug: "title-en".to_string(),
            hero_image_url: None,
        }
    }

    #[test]
    fn publish_request_omits_a_missing_hero_image() {
        let body = serde_json::to_value(PublishRequest::from_draft(&draft())).expect("serialize");
        assert!(body.get("hero_image_url").is_none());
        assert_eq!(body["slug"], "title-en");
        assert!(body["published_at"].as_str().is_some());

        let mut with_hero = draft();
        with_hero.hero_image_url = Some("https://img.example/hero".to_string());
        let body =
            serde_json::to_value(PublishRequest::from_draft(&with_hero)).expect("serialize");
        assert_eq!(body["hero_image_url"], "https://img.example/hero");
    }

    #[test]
    fn publish_response_tolerates_missing_url() {
        let parsed: PublishResponse =
            serde_json::from_str(r#"{"id":"a1"}"#).expect("parse response");
        assert_eq!(parsed.id, "a1");
        assert!(parsed.url.is_empty());
    }
}
