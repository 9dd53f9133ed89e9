use crate::error::{PressError, Result};
use regex::Regex;

/// Phrases that are website chrome rather than article text.
const JUNK_PATTERNS: [&str; 9] = [
    r"(?i)\[Image\]",
    r"(?i)\[Photo\]",
    r"(?i)\[Video\]",
    r"(?im)Read more\.{3}$",
    r"(?im)Continue reading\.{3}$",
    r"(?i)Subscribe to our newsletter",
    r"(?i)Sign up for updates",
    r"(?i)Share this article",
    r"(?i)Follow us on",
];

/// Strip source attributions, broken markdown and junk phrases while
/// keeping blank-line paragraph structure intact.
pub fn clean_article_content(content: &str) -> Result<String> {
    if content.trim().is_empty() {
        return Ok(String::new());
    }

    let mut cleaned = content.to_string();

    // Trailing attribution lines, several languages worth.
    cleaned = re(r"(?im)\n*(?:Source|Источник|Źródło|Quelle|Sursă|Zdroj):\s*.+$")?
        .replace_all(&cleaned, "")
        .into_owned();

    cleaned = re(r"(?m)^#\s*$")?.replace_all(&cleaned, "").into_owned();
    cleaned = strip_orphan_hashes(&cleaned);

    // More than six hashes is never valid markdown.
    cleaned = re(r"#{7,}")?.replace_all(&cleaned, "######").into_owned();
    cleaned = re(r"(?m)^(#{1,6})([^\s#])")?
        .replace_all(&cleaned, "$1 $2")
        .into_owned();
    cleaned = re(r"(?m)^#{1,6}\s*$")?.replace_all(&cleaned, "").into_owned();

    cleaned = re(r"\n{3,}")?.replace_all(&cleaned, "\n\n").into_owned();
    cleaned = cleaned
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n");

    for pattern in JUNK_PATTERNS {
        cleaned = re(pattern)?.replace_all(&cleaned, "").into_owned();
    }

    // Junk removal can leave empty lines behind; renormalize without
    // collapsing legitimate paragraph breaks.
    cleaned = re(r"\n{3,}")?.replace_all(&cleaned, "\n\n").into_owned();
    cleaned = re(r"[ \t]{2,}")?.replace_all(&cleaned, " ").into_owned();

    Ok(cleaned.trim().to_string())
}

/// Trim wrapping quotes and collapse whitespace in a title.
pub fn clean_title(title: &str) -> Result<String> {
    if title.trim().is_empty() {
        return Ok(String::new());
    }

    let stripped = re(r#"^["'«»„“”]+"#)?.replace(title, "").into_owned();
    let stripped = re(r#"["'«»„“”]+$"#)?.replace(&stripped, "").into_owned();
    Ok(re(r"\s+")?
        .replace_all(&stripped, " ")
        .trim()
        .to_string())
}

fn re(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| PressError::ParseFailed(format!("cleanup pattern: {e}")))
}

/// Drop `#` characters that are neither part of a heading run nor
/// attached to a word, e.g. a stray "(#)" left by a scraper.
fn strip_orphan_hashes(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());

    for (i, &c) in chars.iter().enumerate() {
        if c == '#' {
            let attached_before = i > 0 && {
                let prev = chars[i - 1];
                prev == '#' || prev.is_ascii_alphanumeric() || prev == '_'
            };
            let attached_after = chars.get(i + 1).is_some_and(|&next| {
                next == '#' || next.is_whitespace() || next.is_ascii_alphanumeric() || next == '_'
            });
            if !attached_before && !attached_after {
                continue;
            }
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_attribution_lines_are_removed_in_any_language() {
        let content = "Real paragraph one.\n\nReal paragraph two.\n\nИсточник: https://example.com\nSource: example.com";
        let cleaned = clean_article_content(content).expect("clean content");
        assert!(!cleaned.contains("Источник"));
        assert!(!cleaned.contains("Source:"));
        assert!(cleaned.ends_with("Real paragraph two."));
    }

    #[test]
    fn orphan_hashes_go_but_headings_stay() {
        let content = "## Proper Heading\n\nSome text with a stray (#) marker.\n\n#\n\nMore text.";
        let cleaned = clean_article_content(content).expect("clean content");
        assert!(cleaned.contains("## Proper Heading"));
        assert!(!cleaned.contains("(#)"));
        assert!(!cleaned.contains("\n#\n"));
    }

    #[test]
    fn heading_depth_is_capped_and_spacing_fixed() {
        let content = "########Deep\n\n##Tight Heading\n\nBody text here.";
        let cleaned = clean_article_content(content).expect("clean content");
        assert!(cleaned.contains("###### Deep"));
        assert!(cleaned.contains("## Tight Heading"));
    }

    #[test]
    fn junk_phrases_vanish_without_merging_paragraphs() {
        let content = "First paragraph.\n\nSubscribe to our newsletter\n\nSecond paragraph.";
        let cleaned = clean_article_content(content).expect("clean content");
        assert_eq!(cleaned, "First paragraph.\n\nSecond paragraph.");
    }

    #[test]
    fn blank_heavy_content_collapses_to_double_newlines() {
        let content = "One.\n\n\n\n\nTwo.\n   \nThree.";
        let cleaned = clean_article_content(content).expect("clean content");
        assert_eq!(cleaned, "One.\n\nTwo.\n\nThree.");
    }

    #[test]
    fn titles_lose_wrapping_quotes_and_double_spaces() {
        assert_eq!(
            clean_title("\u{201E}Quoted  Title\u{201D}").expect("clean title"),
            "Quoted Title"
        );
        assert_eq!(clean_title("  plain title ").expect("clean title"), "plain title");
        assert_eq!(clean_title("   ").expect("clean title"), "");
    }
}
