use crate::error::{AiError, Result};
use crate::openai::{ChatParams, OpenAiChat};
use crate::traits::{ArticleGenerator, Translator};
use crate::types::{Category, CategoryDetection, ContentStyle, GeneratedArticle, TranslatedArticle};
use async_trait::async_trait;
use serde::Deserialize;

const CATEGORY_SYSTEM_PROMPT: &str =
    "You are a content categorization expert. Analyze text and assign the most appropriate category.";

const TITLE_SYSTEM_PROMPT: &str =
    "You are an expert SEO copywriter. Create engaging, optimized titles.";

const ARTICLE_SYSTEM_PROMPT: &str =
    "You are a professional content writer. Always respond with a single valid JSON object and nothing else.";

const TRANSLATION_SYSTEM_PROMPT: &str =
    "You are a professional translator for technology journalism. Always respond with a single valid JSON object and nothing else.";

/// OpenAI-backed implementation of both content ports.
#[derive(Clone)]
pub struct AiClient {
    chat: OpenAiChat,
}

impl AiClient {
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn new(api_key: &str, model: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(%e, "reqwest client build failed; falling back to default client");
                reqwest::Client::new()
            });
        Self {
            chat: OpenAiChat::new(http, api_key, model),
        }
    }

    pub fn model(&self) -> &str {
        self.chat.model()
    }

    /// Best effort: a failed retranslation keeps the original title.
    async fn retranslate_title(&self, title: &str, language: &str) -> String {
        let prompt = format!(
            "Translate this article title into {}. Respond with only the translated title, no quotes:\n\n{title}",
            language_name(language)
        );
        let params = ChatParams {
            system: "",
            user: &prompt,
            temperature: 0.3,
            max_tokens: 100,
            json_output: false,
        };
        match self.chat.complete(params).await {
            Ok(raw) => {
                let cleaned = strip_wrapping_quotes(raw.trim());
                if cleaned.is_empty() {
                    title.to_string()
                } else {
                    truncate_chars(cleaned, 100)
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "title retranslation failed; keeping original");
                title.to_string()
            }
        }
    }
}

#[async_trait]
impl ArticleGenerator for AiClient {
    #[tracing::instrument(level = "info", skip_all)]
    async fn detect_category(
        &self,
        text: &str,
        title_hint: Option<&str>,
    ) -> Result<CategoryDetection> {
        let prompt = category_prompt(text, title_hint);
        let params = ChatParams {
            system: CATEGORY_SYSTEM_PROMPT,
            user: &prompt,
            temperature: 0.3,
            max_tokens: 10,
            json_output: false,
        };
        let raw = self.chat.complete(params).await?;

        let label = raw.trim().to_lowercase();
        match Category::parse(&label) {
            Some(category) => Ok(CategoryDetection {
                category,
                confidence: 0.9,
            }),
            None => {
                tracing::debug!(%label, "unrecognized category label; using default");
                Ok(CategoryDetection {
                    category: Category::default(),
                    confidence: 0.5,
                })
            }
        }
    }

    #[tracing::instrument(level = "info", skip_all)]
    async fn generate_title(&self, text: &str, category: Category) -> Result<String> {
        let prompt = title_prompt(text, category);
        let params = ChatParams {
            system: TITLE_SYSTEM_PROMPT,
            user: &prompt,
            temperature: 0.7,
            max_tokens: 50,
            json_output: false,
        };
        let raw = self.chat.complete(params).await?;

        let title = strip_wrapping_quotes(raw.trim());
        if title.is_empty() {
            return Err(AiError::ResponseFormat(
                "title generation returned an empty title".to_string(),
            ));
        }
        Ok(truncate_chars(title, 100))
    }

    #[tracing::instrument(level = "info", skip_all)]
    async fn generate_article(
        &self,
        source_text: &str,
        title: &str,
        style: ContentStyle,
        language: &str,
    ) -> Result<GeneratedArticle> {
        if source_text.trim().is_empty() {
            return Err(AiError::InvalidInput("source text is empty".to_string()));
        }

        let prompt = article_prompt(source_text, title, style, language);
        let params = ChatParams {
            system: ARTICLE_SYSTEM_PROMPT,
            user: &prompt,
            temperature: 0.9,
            max_tokens: 2000,
            json_output: true,
        };
        let raw = self.chat.complete(params).await?;

        let parsed: ArticleJson = serde_json::from_str(&strip_code_fences(&raw))?;
        let content = parsed.content.trim().to_string();
        if content.is_empty() {
            return Err(AiError::ResponseFormat(
                "generated article has no content".to_string(),
            ));
        }

        let mut resolved_title = truncate_chars(strip_wrapping_quotes(parsed.title.trim()), 100);
        if resolved_title.is_empty() {
            resolved_title = title.to_string();
        }
        if !language.eq_ignore_ascii_case("ru") && contains_cyrillic(&resolved_title) {
            resolved_title = self.retranslate_title(&resolved_title, language).await;
        }

        let excerpt = if parsed.excerpt.trim().is_empty() {
            truncate_chars(&content, 200)
        } else {
            parsed.excerpt.trim().to_string()
        };
        let category = Category::parse(&parsed.category).unwrap_or_default();
        let word_count = count_words(&content);
        tracing::debug!(words = word_count, %category, "article generated");

        Ok(GeneratedArticle {
            title: resolved_title,
            content,
            excerpt,
            category,
            word_count,
        })
    }
}

#[async_trait]
impl Translator for AiClient {
    #[tracing::instrument(level = "info", skip_all)]
    async fn translate(
        &self,
        title: &str,
        content: &str,
        excerpt: &str,
        from: &str,
        to: &str,
    ) -> Result<TranslatedArticle> {
        if content.trim().is_empty() {
            return Err(AiError::InvalidInput("nothing to translate".to_string()));
        }

        let prompt = translation_prompt(title, content, excerpt, from, to);
        let params = ChatParams {
            system: TRANSLATION_SYSTEM_PROMPT,
            user: &prompt,
            temperature: 0.3,
            max_tokens: 2500,
            json_output: true,
        };
        let raw = self.chat.complete(params).await?;

        let parsed: TranslationJson = serde_json::from_str(&strip_code_fences(&raw))?;
        Ok(merge_translation(parsed, title, content, excerpt))
    }
}

/// Derive a headline from the first sentence when title generation fails.
pub fn fallback_title(text: &str) -> String {
    let first_sentence = text.split(['.', '!', '?']).next().unwrap_or("");
    truncate_chars(first_sentence, 70).trim().to_string()
}

fn category_prompt(text: &str, title_hint: Option<&str>) -> String {
    let title_line = title_hint
        .filter(|t| !t.trim().is_empty())
        .map(|t| format!("Title: {t}\n\n"))
        .unwrap_or_default();
    format!(
        "Analyze the following text and determine the most appropriate category from this list:\n\
         - ai (artificial intelligence, machine learning, neural networks, LLMs)\n\
         - tech (general technology and industry news)\n\
         - gadgets (consumer devices, phones, wearables)\n\
         - software (applications, operating systems, development)\n\
         - hardware (chips, components, computers)\n\
         - internet (web platforms, online services, social networks)\n\
         - security (cybersecurity, vulnerabilities, privacy)\n\n\
         {title_line}Text: {}...\n\n\
         Respond with ONLY the category name (one word).",
        truncate_chars(text, 500)
    )
}

fn title_prompt(text: &str, category: Category) -> String {
    format!(
        "Create a catchy, SEO-friendly title for an article about:\n\n{}\n\n\
         Requirements:\n\
         - 50-70 characters\n\
         - Engaging and clickable\n\
         - Include relevant keywords\n\
         - Professional tone\n\
         - Category: {category}\n\n\
         Respond with ONLY the title (no quotes, no extra text).",
        truncate_chars(text, 300)
    )
}

fn article_prompt(text: &str, title: &str, style: ContentStyle, language: &str) -> String {
    let length_line = match style.target_words() {
        0 => "Keep roughly the original length.".to_string(),
        n => format!("Aim for roughly {n} words."),
    };
    format!(
        "You are a professional tech journalist. Read the source material and write a completely \
         new article about the same topic in your own words. Do not copy phrases from the source.\n\n\
         SOURCE MATERIAL (for facts only):\n---\n{text}\n---\n\n\
         Use this exact title: \"{title}\"\n\n\
         Requirements:\n\
         - {style_line}\n\
         - {length_line}\n\
         - Write in {language}; translate any foreign text.\n\
         - Plain paragraphs separated by blank lines. No markdown syntax, no headings, no lists.\n\
         - Leave out website noise: calls to action, source credits, UI labels, author bios.\n\n\
         Respond with JSON:\n\
         {{\"title\": \"...\", \"content\": \"...\", \"excerpt\": \"...\", \"category\": \"...\"}}\n\
         - \"content\": the full article text\n\
         - \"excerpt\": a 1-2 sentence summary\n\
         - \"category\": one of ai, tech, gadgets, software, hardware, internet, security",
        style_line = style.instructions(),
        language = language_name(language),
    )
}

fn translation_prompt(title: &str, content: &str, excerpt: &str, from: &str, to: &str) -> String {
    let to_name = language_name(to);
    format!(
        "Translate the following tech article from {} to {to_name}.\n\n\
         TITLE:\n{title}\n\n\
         CONTENT:\n{content}\n\n\
         EXCERPT:\n{excerpt}\n\n\
         Requirements:\n\
         - Natural, professional {to_name}\n\
         - Keep paragraph breaks and formatting intact\n\
         - Keep technical terms and product names accurate\n\n\
         Respond with JSON:\n\
         {{\"title\": \"...\", \"content\": \"...\", \"excerpt\": \"...\"}}",
        language_name(from),
    )
}

fn language_name(code: &str) -> &str {
    match code.trim().to_lowercase().as_str() {
        "en" => "English",
        "pl" => "Polish",
        "ru" => "Russian",
        _ => code,
    }
}

#[derive(Debug, Deserialize)]
struct ArticleJson {
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    excerpt: String,
    #[serde(default)]
    category: String,
}

#[derive(Debug, Deserialize)]
struct TranslationJson {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    excerpt: Option<String>,
}

fn merge_translation(
    parsed: TranslationJson,
    title: &str,
    content: &str,
    excerpt: &str,
) -> TranslatedArticle {
    TranslatedArticle {
        title: non_empty_or(parsed.title, title),
        content: non_empty_or(parsed.content, content),
        excerpt: non_empty_or(parsed.excerpt, excerpt),
    }
}

fn non_empty_or(value: Option<String>, fallback: &str) -> String {
    match value {
        Some(s) if !s.trim().is_empty() => s,
        _ => fallback.to_string(),
    }
}

/// Models occasionally wrap JSON in markdown fences even in JSON mode.
fn strip_code_fences(raw: &str) -> String {
    raw.replace("```json", "")
        .replace("```", "")
        .trim()
        .to_string()
}

fn strip_wrapping_quotes(s: &str) -> &str {
    let s = s.strip_prefix(['"', '\'']).unwrap_or(s);
    s.strip_suffix(['"', '\'']).unwrap_or(s)
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

fn count_words(s: &str) -> usize {
    s.split_whitespace().count()
}

fn contains_cyrillic(s: &str) -> bool {
    s.chars().any(|c| ('\u{0400}'..='\u{04FF}').contains(&c))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_title_uses_first_sentence_capped_at_seventy_chars() {
        assert_eq!(
            fallback_title("Nvidia ships new GPUs. Prices unchanged."),
            "Nvidia ships new GPUs"
        );

        let long = "word ".repeat(40);
        let derived = fallback_title(&long);
        assert!(derived.chars().count() <= 70);
        assert!(!derived.ends_with(' '));
    }

    #[test]
    fn wrapping_quotes_are_stripped_from_titles() {
        assert_eq!(strip_wrapping_quotes("\"Big News\""), "Big News");
        assert_eq!(strip_wrapping_quotes("'Big News'"), "Big News");
        assert_eq!(strip_wrapping_quotes("No quotes"), "No quotes");
        assert_eq!(strip_wrapping_quotes("\"Mismatched"), "Mismatched");
    }

    #[test]
    fn code_fences_are_removed_before_json_parsing() {
        let fenced = "```json\n{\"title\":\"t\",\"content\":\"c\"}\n```";
        let parsed: ArticleJson =
            serde_json::from_str(&strip_code_fences(fenced)).expect("parse fenced json");
        assert_eq!(parsed.title, "t");
        assert_eq!(parsed.content, "c");
    }

    #[test]
    fn article_json_tolerates_missing_fields_and_unknown_categories() {
        let parsed: ArticleJson =
            serde_json::from_str(r#"{"content":"body text","category":"memes"}"#)
                .expect("parse partial json");
        assert_eq!(parsed.title, "");
        assert_eq!(Category::parse(&parsed.category), None);
        assert_eq!(
            Category::parse(&parsed.category).unwrap_or_default(),
            Category::Tech
        );
    }

    #[test]
    fn translation_missing_fields_fall_back_to_source_values() {
        let parsed: TranslationJson =
            serde_json::from_str(r#"{"excerpt":"Streszczenie","content":"  "}"#)
                .expect("parse translation json");
        let merged = merge_translation(parsed, "Title", "Content", "Excerpt");
        assert_eq!(merged.title, "Title");
        assert_eq!(merged.content, "Content");
        assert_eq!(merged.excerpt, "Streszczenie");
    }

    #[test]
    fn word_count_splits_on_any_whitespace() {
        assert_eq!(count_words("one  two\n\nthree\tfour"), 4);
        assert_eq!(count_words("   "), 0);
    }

    #[test]
    fn cyrillic_detection_ignores_latin_diacritics() {
        assert!(contains_cyrillic("Nvidia представила новый чип"));
        assert!(!contains_cyrillic("Zażółć gęślą jaźń"));
        assert!(!contains_cyrillic("plain ascii title"));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("żółć", 3), "żół");
        assert_eq!(truncate_chars("short", 10), "short");
    }
}
