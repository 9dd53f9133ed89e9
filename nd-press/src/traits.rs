use crate::cms::{ArticleDraft, PublishedPost};
use crate::error::Result;
use crate::fetch::ParsedPage;
use async_trait::async_trait;

#[async_trait]
pub trait PageSource: Send + Sync {
    /// Download a web page and reduce it to a title plus readable text.
    async fn fetch_page(&self, url: &str) -> Result<ParsedPage>;
}

#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Look up one image URL for the query.
    async fn find_image(&self, query: &str) -> Result<String>;
}

#[async_trait]
pub trait PublishTarget: Send + Sync {
    /// Publish a finished draft, returning the stored id and public URL.
    async fn publish(&self, draft: &ArticleDraft) -> Result<PublishedPost>;

    /// Remove a previously published article by slug and locale.
    async fn retract(&self, slug: &str, language: &str) -> Result<()>;
}
