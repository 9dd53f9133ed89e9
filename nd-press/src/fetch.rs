use crate::error::{PressError, Result};
use crate::traits::PageSource;
use async_trait::async_trait;
use reqwest::Url;

const MAX_HTML_BYTES: usize = 1_000_000;
const MIN_PARAGRAPH_CHARS: usize = 50;
const FALLBACK_PAGE_TITLE: &str = "Untitled Article";
const PAGE_FETCH_USER_AGENT: &str = "Mozilla/5.0 (compatible; NewsdeskBot/1.0)";

/// Readable remains of a fetched web page.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedPage {
    pub title: String,
    /// Extracted paragraphs joined with blank lines.
    pub text: String,
}

/// Plain-HTTP article extractor. Pulls the first heading and every
/// `<p>` block long enough to be body text; no script execution.
pub struct HttpPageFetcher {
    http: reqwest::Client,
}

impl HttpPageFetcher {
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .user_agent(PAGE_FETCH_USER_AGENT)
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(%e, "reqwest client build failed; falling back to default client");
                reqwest::Client::new()
            });
        Self { http }
    }
}

impl Default for HttpPageFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PageSource for HttpPageFetcher {
    #[tracing::instrument(level = "info", skip_all, fields(url = %url))]
    async fn fetch_page(&self, url: &str) -> Result<ParsedPage> {
        let url = parse_http_url(url)?;

        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PressError::Http(format!("page fetch status={status}")));
        }

        let bytes = response.bytes().await?;
        let html_bytes: &[u8] = if bytes.len() > MAX_HTML_BYTES {
            &bytes[..MAX_HTML_BYTES]
        } else {
            &bytes
        };
        let html = String::from_utf8_lossy(html_bytes);

        let paragraphs = paragraph_texts(&html);
        if paragraphs.is_empty() {
            return Err(PressError::ParseFailed(
                "page has no readable paragraphs".to_string(),
            ));
        }

        let title = tag_text(&html, "h1")
            .or_else(|| tag_text(&html, "title"))
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| FALLBACK_PAGE_TITLE.to_string());

        tracing::debug!(paragraphs = paragraphs.len(), "page parsed");
        Ok(ParsedPage {
            title,
            text: paragraphs.join("\n\n"),
        })
    }
}

fn parse_http_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| PressError::InvalidInput(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(PressError::InvalidInput(format!(
            "unsupported scheme: {other}"
        ))),
    }
}

/// Text of the first `<tag>...</tag>` occurrence, tags stripped.
fn tag_text(html: &str, tag: &str) -> Option<String> {
    let lower = html.to_ascii_lowercase();
    let open = format!("<{tag}");
    let close = format!("</{tag}>");

    let start_idx = lower.find(&open)?;
    let after_start = &html[start_idx..];
    let gt = after_start.find('>')?;
    let content_start = start_idx + gt + 1;
    let remaining = &html[content_start..];
    let end_rel = remaining.to_ascii_lowercase().find(&close)?;
    let text = html_to_text(&remaining[..end_rel]);
    Some(text.trim().to_string())
}

/// Every `<p>` block whose stripped text is long enough to be article
/// body rather than navigation or boilerplate.
fn paragraph_texts(html: &str) -> Vec<String> {
    let lower = html.to_ascii_lowercase();
    let mut out = Vec::new();
    let mut cursor = 0usize;

    while let Some(rel) = lower[cursor..].find("<p") {
        let start = cursor + rel;
        match lower.as_bytes().get(start + 2) {
            Some(b'>') | Some(b' ') | Some(b'\t') | Some(b'\n') | Some(b'\r') => {}
            _ => {
                cursor = start + 2;
                continue;
            }
        }

        let Some(gt_rel) = lower[start..].find('>') else {
            break;
        };
        let content_start = start + gt_rel + 1;
        let Some(end_rel) = lower[content_start..].find("</p>") else {
            break;
        };

        let text = html_to_text(&html[content_start..content_start + end_rel]);
        let trimmed = text.trim();
        if trimmed.chars().count() > MIN_PARAGRAPH_CHARS {
            out.push(trimmed.to_string());
        }
        cursor = content_start + end_rel + 4;
    }

    out
}

fn html_to_text(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut inside_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => {
                inside_tag = true;
                out.push(' ');
            }
            '>' => inside_tag = false,
            _ => {
                if !inside_tag {
                    out.push(ch);
                }
            }
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const LONG_SENTENCE: &str =
        "This paragraph carries enough characters to count as real article body text for sure.";

    #[test]
    fn paragraphs_below_the_length_floor_are_dropped() {
        let html = format!(
            "<html><body><p>Menu</p><p class=\"lead\">{LONG_SENTENCE}</p>\
             <p>{LONG_SENTENCE} And then some more words.</p></body></html>"
        );
        let paragraphs = paragraph_texts(&html);
        assert_eq!(paragraphs.len(), 2);
        assert!(paragraphs[0].starts_with("This paragraph"));
    }

    #[test]
    fn nested_markup_is_stripped_from_paragraph_text() {
        let html = format!("<p>{LONG_SENTENCE} With <b>bold</b> and <a href=\"/x\">a link</a>.</p>");
        let paragraphs = paragraph_texts(&html);
        assert_eq!(paragraphs.len(), 1);
        assert!(paragraphs[0].contains("With bold and a link"));
        assert!(!paragraphs[0].contains('<'));
    }

    #[test]
    fn h1_wins_over_title_for_the_page_heading() {
        let html = "<html><head><title>Site Name</title></head>\
                    <body><h1 id=\"main\">Real Headline</h1></body></html>";
        assert_eq!(tag_text(html, "h1").as_deref(), Some("Real Headline"));
        assert_eq!(tag_text(html, "title").as_deref(), Some("Site Name"));
    }

    #[test]
    fn paren_like_tag_prefixes_are_not_mistaken_for_paragraphs() {
        let html = format!("<pre>code block</pre><p>{LONG_SENTENCE}</p>");
        let paragraphs = paragraph_texts(&html);
        assert_eq!(paragraphs.len(), 1);
        assert!(!paragraphs[0].contains("code block"));
    }

    #[test]
    fn non_http_schemes_are_rejected() {
        assert!(parse_http_url("ftp://example.com/feed").is_err());
        assert!(parse_http_url("not a url").is_err());
        assert!(parse_http_url("https://example.com/story").is_ok());
    }
}
