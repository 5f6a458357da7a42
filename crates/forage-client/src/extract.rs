//! Content extraction heuristics for newsletter pages.
//!
//! Pulls a title, publish date, and readable body text out of raw HTML.
//! The body comes from the `<article>`/`<main>` region when one exists,
//! converted to Markdown-ish text with non-content tags stripped.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use forage_core::error::AppError;
use htmd::HtmlToMarkdown;
use scraper::{Html, Selector};
use url::Url;

/// Pages with less extractable text than this are treated as unusable.
const MIN_BODY_CHARS: usize = 80;

/// Extracted page content.
#[derive(Debug, Clone)]
pub struct PageContent {
    pub title: String,
    pub body: String,
    pub published_at: Option<DateTime<Utc>>,
}

/// HTML-to-content extractor.
pub struct PageExtractor {
    converter: Arc<HtmlToMarkdown>,
}

impl Clone for PageExtractor {
    fn clone(&self) -> Self {
        Self {
            converter: Arc::clone(&self.converter),
        }
    }
}

impl PageExtractor {
    pub fn new() -> Self {
        let converter = HtmlToMarkdown::builder()
            .skip_tags(vec![
                "script", "style", "nav", "footer", "header", "aside", "noscript", "iframe",
                "svg", "form", "button",
            ])
            .build();

        Self {
            converter: Arc::new(converter),
        }
    }

    /// Extract title, body, and publish date from a page.
    ///
    /// Fails with a validation error when the page yields no usable
    /// body text; that is a permanent, per-source condition.
    pub fn extract(&self, html: &str, url: &str) -> Result<PageContent, AppError> {
        let doc = Html::parse_document(html);

        let title = find_title(&doc).unwrap_or_else(|| fallback_title(url));
        let published_at = find_published_at(&doc);

        let region = content_region(&doc).unwrap_or_else(|| html.to_string());
        let body = self
            .converter
            .convert(&region)
            .map_err(|e| AppError::Extraction(e.to_string()))?
            .trim()
            .to_string();

        if body.chars().count() < MIN_BODY_CHARS {
            return Err(AppError::Validation(format!(
                "Page {url} has no extractable content ({} chars)",
                body.chars().count()
            )));
        }

        Ok(PageContent {
            title,
            body,
            published_at,
        })
    }
}

impl Default for PageExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// og:title, then `<title>`, then the first `<h1>`.
fn find_title(doc: &Html) -> Option<String> {
    if let Ok(sel) = Selector::parse(r#"meta[property="og:title"]"#)
        && let Some(meta) = doc.select(&sel).next()
        && let Some(content) = meta.value().attr("content")
    {
        let content = content.trim();
        if !content.is_empty() {
            return Some(content.to_string());
        }
    }

    for raw in ["title", "h1"] {
        if let Ok(sel) = Selector::parse(raw)
            && let Some(el) = doc.select(&sel).next()
        {
            let text = el.text().collect::<String>().trim().to_string();
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    None
}

/// article:published_time meta, then the first `<time datetime=..>`.
fn find_published_at(doc: &Html) -> Option<DateTime<Utc>> {
    if let Ok(sel) = Selector::parse(r#"meta[property="article:published_time"]"#)
        && let Some(meta) = doc.select(&sel).next()
        && let Some(raw) = meta.value().attr("content")
        && let Some(parsed) = parse_timestamp(raw)
    {
        return Some(parsed);
    }

    if let Ok(sel) = Selector::parse("time[datetime]")
        && let Some(el) = doc.select(&sel).next()
        && let Some(raw) = el.value().attr("datetime")
    {
        return parse_timestamp(raw);
    }
    None
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw.trim()) {
        return Some(parsed.with_timezone(&Utc));
    }
    // Date-only form, common in <time datetime="2025-06-01">.
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN).and_utc())
}

/// The HTML of the most content-like region of the page.
fn content_region(doc: &Html) -> Option<String> {
    for raw in ["article", "main"] {
        if let Ok(sel) = Selector::parse(raw)
            && let Some(el) = doc.select(&sel).next()
        {
            return Some(el.html());
        }
    }
    None
}

fn fallback_title(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| url.to_string())
}
