use crate::error::Result;
use crate::types::{Category, CategoryDetection, ContentStyle, GeneratedArticle, TranslatedArticle};
use async_trait::async_trait;

#[async_trait]
pub trait ArticleGenerator: Send + Sync {
    /// Classify source text into the fixed category set.
    /// Returns the detected category with a confidence score; callers treat
    /// errors as "use the default category", never as a hard failure.
    async fn detect_category(
        &self,
        text: &str,
        title_hint: Option<&str>,
    ) -> Result<CategoryDetection>;

    /// Produce a short headline for the source text.
    async fn generate_title(&self, text: &str, category: Category) -> Result<String>;

    /// Rewrite source text into a full article in the given style and
    /// language. The provided title is the already-resolved one; the model
    /// is asked to keep it.
    async fn generate_article(
        &self,
        source_text: &str,
        title: &str,
        style: ContentStyle,
        language: &str,
    ) -> Result<GeneratedArticle>;
}

#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate a finished article between the given locale codes.
    /// Fields the model leaves out fall back to the source-language value.
    async fn translate(
        &self,
        title: &str,
        content: &str,
        excerpt: &str,
        from: &str,
        to: &str,
    ) -> Result<TranslatedArticle>;
}
