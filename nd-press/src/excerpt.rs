use crate::cleanup::clean_article_content;
use crate::error::{PressError, Result};
use regex::Regex;

/// Hard ceiling for SEO excerpts, ellipsis included.
pub const EXCERPT_MAX_CHARS: usize = 160;

/// Build a meta-description style excerpt: whole sentences while they
/// fit, otherwise a word-boundary truncation. Never longer than
/// `max_len` characters.
pub fn seo_excerpt(content: &str, max_len: usize) -> Result<String> {
    if content.trim().is_empty() || max_len == 0 {
        return Ok(String::new());
    }

    let cleaned = clean_article_content(content)?;
    let text = flatten_markdown(&cleaned)?;
    if text.chars().count() <= max_len {
        return Ok(text);
    }

    let sentence_re = re(r"[^.!?]+[.!?]+")?;
    let sentences: Vec<&str> = sentence_re.find_iter(&text).map(|m| m.as_str()).collect();

    let mut excerpt = String::new();
    for sentence in &sentences {
        if excerpt.chars().count() + sentence.chars().count() <= max_len {
            excerpt.push_str(sentence);
        } else {
            break;
        }
    }

    if excerpt.trim().is_empty() {
        let base = sentences.first().copied().unwrap_or(text.as_str());
        excerpt = truncate_at_word_boundary(base, max_len);
    }

    Ok(excerpt.trim().to_string())
}

/// Reduce markdown to plain prose on a single line.
fn flatten_markdown(text: &str) -> Result<String> {
    let mut flat = re(r"(?m)^#{1,6}\s+")?.replace_all(text, "").into_owned();
    flat = re(r"\*\*(.+?)\*\*")?.replace_all(&flat, "$1").into_owned();
    flat = re(r"\*(.+?)\*")?.replace_all(&flat, "$1").into_owned();
    flat = re(r"\[(.+?)\]\(.+?\)")?.replace_all(&flat, "$1").into_owned();
    flat = re(r"`(.+?)`")?.replace_all(&flat, "$1").into_owned();
    Ok(flat.split_whitespace().collect::<Vec<_>>().join(" "))
}

/// Cut to `max_len` including the trailing ellipsis, preferring the
/// last word boundary when it is not too far back.
fn truncate_at_word_boundary(text: &str, max_len: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max_len {
        return trimmed.to_string();
    }

    let budget = max_len.saturating_sub(3);
    let truncated: String = trimmed.chars().take(budget).collect();
    let cut = match truncated.rfind(' ') {
        Some(idx) if idx > truncated.len() * 7 / 10 => &truncated[..idx],
        _ => truncated.as_str(),
    };
    format!("{}...", cut.trim_end())
}

fn re(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| PressError::ParseFailed(format!("excerpt pattern: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_passes_through_untouched() {
        let excerpt = seo_excerpt("A compact summary of the story.", EXCERPT_MAX_CHARS)
            .expect("build excerpt");
        assert_eq!(excerpt, "A compact summary of the story.");
    }

    #[test]
    fn whole_sentences_accumulate_while_they_fit() {
        let content = format!(
            "First sentence here. Second sentence follows. {}",
            "Filler words keep coming and coming without any stop for a very long stretch of text that cannot fit."
        );
        let excerpt = seo_excerpt(&content, 50).expect("build excerpt");
        assert_eq!(excerpt, "First sentence here. Second sentence follows.");
    }

    #[test]
    fn excerpt_never_exceeds_the_budget_even_for_run_on_sentences() {
        let content = "word ".repeat(100);
        let excerpt = seo_excerpt(&content, EXCERPT_MAX_CHARS).expect("build excerpt");
        assert!(excerpt.chars().count() <= EXCERPT_MAX_CHARS);
        assert!(excerpt.ends_with("..."));

        let one_long_sentence = format!("{}.", "characters".repeat(40));
        let excerpt = seo_excerpt(&one_long_sentence, EXCERPT_MAX_CHARS).expect("build excerpt");
        assert!(excerpt.chars().count() <= EXCERPT_MAX_CHARS);
    }

    #[test]
    fn markdown_is_flattened_before_measuring() {
        let content = "## Heading\n\nSome **bold** text with a [link](https://example.com) inside.";
        let excerpt = seo_excerpt(content, EXCERPT_MAX_CHARS).expect("build excerpt");
        assert_eq!(excerpt, "Heading Some bold text with a link inside.");
    }

    #[test]
    fn empty_content_gives_empty_excerpt() {
        assert_eq!(seo_excerpt("   ", EXCERPT_MAX_CHARS).expect("build excerpt"), "");
    }
}
