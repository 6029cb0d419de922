//! Best-effort page scraper feeding long-form content generation.
//!
//! Never returns an error: failures come back as `ScrapedPage { success: false, .. }`
//! and the enricher continues without page text.

use std::time::Duration;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use crate::ingest::text::{clean_text, truncate_chars};

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MIN_SECTION_CHARS: usize = 200;
const BODY_FALLBACK_CHARS: usize = 10_000;

/// Tried in order; the first match with meaningful text wins.
const CONTENT_SELECTORS: &[&str] = &[
    // job boards
    ".job-description",
    ".job-content",
    ".job-details",
    "[data-testid='job-description']",
    ".description-content",
    "#job-description",
    ".jobDescription",
    ".posting-description",
    ".description__text",
    ".jobs-description",
    "#jobDescriptionText",
    // articles
    "article",
    "main",
    ".article-content",
    ".post-content",
    ".entry-content",
    "#content",
    ".article-body",
    ".story-body",
];

/// Elements whose text never counts as content.
const SKIPPED_TAGS: &[&str] = &[
    "script", "style", "noscript", "nav", "header", "footer", "aside", "form",
];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScrapedPage {
    pub title: Option<String>,
    pub meta_description: Option<String>,
    pub main_content: String,
    pub success: bool,
    pub error: Option<String>,
}

impl ScrapedPage {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }

    /// Main text when the scrape produced something usable.
    pub fn usable_text(&self) -> Option<&str> {
        (self.success && !self.main_content.is_empty()).then_some(self.main_content.as_str())
    }
}

#[async_trait]
pub trait PageScraper: Send + Sync {
    async fn scrape(&self, url: &str) -> ScrapedPage;
}

pub struct HttpPageScraper {
    client: reqwest::Client,
}

impl HttpPageScraper {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;
        Ok(Self { client })
    }

    async fn fetch_html(&self, url: &str) -> Result<String, String> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "text/html,application/xhtml+xml")
            .header(reqwest::header::ACCEPT_LANGUAGE, "en-GB,en;q=0.8")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    "Request timeout".to_string()
                } else {
                    format!("Request failed: {e}")
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {}", status.as_u16()));
        }

        response
            .text()
            .await
            .map_err(|e| format!("Failed to read body: {e}"))
    }
}

#[async_trait]
impl PageScraper for HttpPageScraper {
    async fn scrape(&self, url: &str) -> ScrapedPage {
        if url.trim().is_empty() {
            return ScrapedPage::failed("Empty URL");
        }

        match self.fetch_html(url).await {
            Ok(html) => {
                let page = parse_page(&html);
                debug!(url, chars = page.main_content.len(), "Scraped page");
                page
            }
            Err(error) => {
                warn!(url, %error, "Page scrape failed");
                ScrapedPage::failed(error)
            }
        }
    }
}

/// Extracts title, meta description and main text from an HTML document.
pub fn parse_page(html: &str) -> ScrapedPage {
    let document = Html::parse_document(html);

    let title = first_text(&document, "title");
    let meta_description = Selector::parse("meta[name='description']")
        .ok()
        .and_then(|s| {
            document
                .select(&s)
                .next()
                .and_then(|el| el.value().attr("content"))
                .map(clean_text)
        })
        .filter(|d| !d.is_empty());

    let main_content = extract_main_content(&document);
    if main_content.is_empty() {
        return ScrapedPage {
            title,
            meta_description,
            error: Some("No content extracted".to_string()),
            ..Default::default()
        };
    }

    ScrapedPage {
        title,
        meta_description,
        main_content,
        success: true,
        error: None,
    }
}

fn first_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .next()
        .map(|el| clean_text(&el.text().collect::<String>()))
        .filter(|t| !t.is_empty())
}

fn extract_main_content(document: &Html) -> String {
    for selector_str in CONTENT_SELECTORS {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        if let Some(element) = document.select(&selector).next() {
            let text = visible_text(element);
            if text.chars().count() > MIN_SECTION_CHARS {
                return text;
            }
        }
    }

    Selector::parse("body")
        .ok()
        .and_then(|s| document.select(&s).next())
        .map(|body| truncate_chars(&visible_text(body), BODY_FALLBACK_CHARS))
        .unwrap_or_default()
}

/// Text under `root`, skipping boilerplate subtrees.
fn visible_text(root: ElementRef<'_>) -> String {
    let mut out = String::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let skipped = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| SKIPPED_TAGS.contains(&e.name()))
        });
        if !skipped {
            out.push_str(text);
            out.push(' ');
        }
    }
    clean_text(&out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefers_job_description_section() {
        let body = "Lead the finance function. ".repeat(12);
        let html = format!(
            r#"<html><head><title> Fractional CFO </title>
            <meta name="description" content="A great role"></head>
            <body><nav>Home Jobs About</nav>
            <div class="job-description">{body}<script>track()</script></div>
            <footer>Copyright</footer></body></html>"#
        );
        let page = parse_page(&html);
        assert!(page.success);
        assert_eq!(page.title.as_deref(), Some("Fractional CFO"));
        assert_eq!(page.meta_description.as_deref(), Some("A great role"));
        assert!(page.main_content.starts_with("Lead the finance function."));
        assert!(!page.main_content.contains("track()"));
        assert!(!page.main_content.contains("Copyright"));
    }

    #[test]
    fn test_short_sections_fall_through_to_body() {
        let html = r#"<html><body><header>Site</header><article>Too short</article>
            <p>Body text</p><footer>Footer</footer></body></html>"#;
        let page = parse_page(html);
        assert!(page.success);
        assert_eq!(page.main_content, "Too short Body text");
    }

    #[test]
    fn test_body_fallback_is_capped() {
        let html = format!("<html><body><p>{}</p></body></html>", "word ".repeat(5000));
        let page = parse_page(&html);
        assert_eq!(page.main_content.chars().count(), BODY_FALLBACK_CHARS);
    }

    #[test]
    fn test_empty_page_is_not_usable() {
        let page = parse_page("<html><body><script>x()</script></body></html>");
        assert!(!page.success);
        assert_eq!(page.usable_text(), None);
    }
}
