//! The parse module fetches an opportunity page and reduces its HTML to a
//! bounded plain-text form, with page metadata up front, for the model.

use crate::TextBy;
use crate::constants::{
    BROWSER_USER_AGENT, FETCH_TIMEOUT_SECS, MIN_PAGE_TEXT, PAGE_TEXT_BUDGET,
    STRUCTURED_DATA_BUDGET, TRUNCATION_MARKER,
};

use anyhow::Result;
use dom_smoothie::{Article, CandidateSelectMode, Config, Readability, TextMode};
use html2md;
use log::{debug, warn};
use scraper::{Html, Selector as ScraperSelector};
use std::time::Duration;

/// Elements whose text never reaches the model.
const HIDDEN_ELEMENTS: [&str; 11] = [
    "script", "style", "nav", "footer", "header", "noscript", "svg", "iframe", "template",
    "head", "aside",
];

/// Fetched page as handed to the extractor.
///
/// A failed fetch is still a `PageContent`: `error` carries the cause and
/// `text` a readable description, so callers decide whether to abort.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PageContent {
    pub url: String,
    pub title: String,
    pub text: String,
    pub error: Option<String>,
}

impl PageContent {
    fn failed(url: &str, error: String) -> Self {
        Self {
            url: url.to_string(),
            title: String::new(),
            text: format!("Error fetching page: {error}"),
            error: Some(error),
        }
    }
}

/// Metadata a page exposes to crawlers, often present even when the body
/// is rendered client-side.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PageMetadata {
    pub description: Option<String>,
    pub og_title: Option<String>,
    pub og_description: Option<String>,
    pub structured_data: Vec<String>,
}

impl PageMetadata {
    pub fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.og_title.is_none()
            && self.og_description.is_none()
            && self.structured_data.is_empty()
    }

    fn preamble(&self) -> String {
        let mut lines = vec!["[Page Metadata]".to_string()];
        if let Some(description) = &self.description {
            lines.push(format!("Description: {description}"));
        }
        if let Some(og_title) = &self.og_title {
            lines.push(format!("OG Title: {og_title}"));
        }
        if let Some(og_description) = &self.og_description {
            lines.push(format!("OG Description: {og_description}"));
        }
        for data in &self.structured_data {
            lines.push(format!("Structured Data: {data}"));
        }
        lines.join("\n")
    }
}

/// Fetches `url` and extracts its text. Never fails; see [`PageContent`].
///
/// A TLS failure is retried once without certificate verification, since
/// many university pages serve incomplete certificate chains.
pub async fn fetch_page_content(url: &str, text_by: TextBy) -> PageContent {
    let html = match fetch_html(url, false).await {
        Ok(html) => html,
        Err(err) if is_tls_error(&err) => {
            warn!("TLS error fetching {url}, retrying without certificate verification: {err}");
            match fetch_html(url, true).await {
                Ok(html) => html,
                Err(err) => return PageContent::failed(url, err.to_string()),
            }
        }
        Err(err) => return PageContent::failed(url, err.to_string()),
    };

    debug!("Fetched {} bytes from {url}", html.len());

    match extract_page(&html, text_by) {
        Ok((title, text)) => PageContent {
            url: url.to_string(),
            title,
            text,
            error: None,
        },
        Err(err) => PageContent::failed(url, err.to_string()),
    }
}

async fn fetch_html(url: &str, accept_invalid_certs: bool) -> reqwest::Result<String> {
    let client = reqwest::Client::builder()
        .user_agent(BROWSER_USER_AGENT)
        .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
        .danger_accept_invalid_certs(accept_invalid_certs)
        .build()?;

    client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await
}

/// Whether a request failed while establishing TLS. Only the underlying
/// causes of a connect error are inspected, never the request error itself,
/// whose message carries the URL.
pub fn is_tls_error(err: &reqwest::Error) -> bool {
    if !err.is_connect() {
        return false;
    }

    let mut source = std::error::Error::source(err);
    while let Some(current) = source {
        let message = current.to_string().to_lowercase();
        if ["certificate", "tls", "ssl", "handshake"]
            .iter()
            .any(|needle| message.contains(needle))
        {
            return true;
        }
        source = current.source();
    }
    false
}

/// Extracts the title and model-ready text from a page's HTML.
///
/// The text is the page metadata preamble followed by the body text,
/// collapsed to non-blank lines and capped at the page text budget. A body
/// shorter than the minimum is flagged as probably needing JavaScript.
///
/// # Errors
///
/// Returns an error if the readability extraction fails to parse the page
pub fn extract_page(html: &str, text_by: TextBy) -> Result<(String, String)> {
    let document = Html::parse_document(html);
    let title = parse_title(&document).unwrap_or_default();
    let metadata = parse_metadata(&document);

    let body = match text_by {
        TextBy::Visible => visible_text(&document),
        TextBy::Readability => {
            let config = Config {
                text_mode: TextMode::Markdown,
                candidate_select_mode: CandidateSelectMode::DomSmoothie,
                ..Default::default()
            };

            let mut readability = Readability::new(html, None, Some(config))?;
            let article: Article = readability.parse()?;
            article.text_content.to_string()
        }
        TextBy::Markdown => html2md::parse_html(html, false),
    };

    let body = truncate_chars(&collapse_blank_lines(&body), PAGE_TEXT_BUDGET);
    let body_len = body.chars().count();

    let mut sections = Vec::new();
    if body_len < MIN_PAGE_TEXT {
        debug!("Page text is only {body_len} characters");
        sections.push(
            "[Note: This page likely requires JavaScript to render its content. \
             Rely on the metadata and the URL to identify the opportunity.]"
                .to_string(),
        );
    }
    if !metadata.is_empty() {
        sections.push(metadata.preamble());
    }
    if !body.is_empty() {
        sections.push(body);
    }

    Ok((title, sections.join("\n\n")))
}

/// Parses the title from the document
fn parse_title(document: &Html) -> Option<String> {
    for tag in ["title", "h1", "h2"] {
        if let Ok(tag_selector) = ScraperSelector::parse(tag)
            && let Some(tag_element) = document.select(&tag_selector).next()
        {
            let tag_text = tag_element
                .text()
                .collect::<Vec<_>>()
                .join(" ")
                .trim()
                .to_string();
            if !tag_text.is_empty() {
                return Some(tag_text);
            }
        }
    }

    None
}

fn parse_metadata(document: &Html) -> PageMetadata {
    let structured_data = select_all(document, r#"script[type="application/ld+json"]"#)
        .into_iter()
        .map(|json| truncate_chars(json.trim(), STRUCTURED_DATA_BUDGET))
        .filter(|json| !json.is_empty())
        .collect();

    PageMetadata {
        description: meta_content(document, r#"meta[name="description"]"#),
        og_title: meta_content(document, r#"meta[property="og:title"]"#),
        og_description: meta_content(document, r#"meta[property="og:description"]"#),
        structured_data,
    }
}

fn meta_content(document: &Html, selector: &str) -> Option<String> {
    let selector = ScraperSelector::parse(selector).ok()?;
    document
        .select(&selector)
        .filter_map(|element| element.value().attr("content"))
        .map(str::trim)
        .find(|content| !content.is_empty())
        .map(str::to_string)
}

fn select_all(document: &Html, selector: &str) -> Vec<String> {
    match ScraperSelector::parse(selector) {
        Ok(selector) => document
            .select(&selector)
            .map(|element| element.text().collect::<String>())
            .collect(),
        Err(_) => Vec::new(),
    }
}

/// Visible text nodes in document order, one per line.
fn visible_text(document: &Html) -> String {
    document
        .root_element()
        .descendants()
        .filter_map(|node| node.value().as_text().map(|text| (node, text)))
        .filter(|(node, _)| {
            !node.ancestors().any(|ancestor| {
                ancestor
                    .value()
                    .as_element()
                    .is_some_and(|element| HIDDEN_ELEMENTS.contains(&element.name()))
            })
        })
        .map(|(_, text)| text.trim())
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn collapse_blank_lines(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn truncate_chars(text: &str, budget: usize) -> String {
    if text.chars().count() <= budget {
        return text.to_string();
    }

    let kept: String = text.chars().take(budget).collect();
    format!("{kept}{TRUNCATION_MARKER}")
}
