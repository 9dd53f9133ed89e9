//! Article generation and translation for Newsdesk.
//!
//! Pure HTTP client over the OpenAI chat completions API. All prompts
//! request plain-paragraph output so downstream image placement can
//! split on blank lines.

mod client;
mod error;
mod openai;
mod traits;
mod types;

pub use client::{AiClient, fallback_title};
pub use error::{AiError, Result};
pub use traits::{ArticleGenerator, Translator};
pub use types::{Category, CategoryDetection, ContentStyle, GeneratedArticle, TranslatedArticle};
