//! HTML text and link extraction.

use scraper::{ElementRef, Html, Node, Selector};

/// Containers tried in order before falling back to `<body>`.
const CONTENT_SELECTORS: &[&str] = &["article", "main", ".article", ".content"];

/// Elements whose whole subtree is noise.
const DISCARDED_TAGS: &[&str] = &["script", "style", "nav", "header", "footer", "aside", "noscript"];

/// URL fragments that never lead to a help article.
const SKIP_PATTERNS: &[&str] = &[
    "javascript:",
    "mailto:",
    "tel:",
    ".pdf",
    ".jpg",
    ".jpeg",
    ".png",
    ".gif",
    ".svg",
    ".css",
    ".js",
    "login",
    "signup",
    "register",
    "download",
];

/// Readable content pulled out of one HTML page.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedPage {
    pub title: String,
    /// Whitespace-normalized body text.
    pub text: String,
    /// Absolute same-host links, fragment-free, in document order.
    pub links: Vec<String>,
}

/// Parse `html` fetched from `url`.
pub fn extract_page(url: &str, html: &str) -> ExtractedPage {
    let document = Html::parse_document(html);
    ExtractedPage {
        title: extract_title(&document),
        text: extract_text(&document),
        links: extract_links(url, &document),
    }
}

fn extract_title(document: &Html) -> String {
    for selector in ["title", "h1"] {
        if let Ok(sel) = Selector::parse(selector) {
            if let Some(el) = document.select(&sel).next() {
                let title = normalize(&el.text().collect::<Vec<_>>().join(" "));
                if !title.is_empty() {
                    return title;
                }
            }
        }
    }
    String::new()
}

fn extract_text(document: &Html) -> String {
    for selector in CONTENT_SELECTORS {
        if let Ok(sel) = Selector::parse(selector) {
            if let Some(el) = document.select(&sel).next() {
                let text = element_text(el);
                if !text.is_empty() {
                    return text;
                }
            }
        }
    }

    Selector::parse("body")
        .ok()
        .and_then(|sel| document.select(&sel).next().map(element_text))
        .unwrap_or_default()
}

/// Text of `root` with discarded subtrees skipped, whitespace collapsed.
fn element_text(root: ElementRef<'_>) -> String {
    let mut parts = Vec::new();
    collect_text(root, &mut parts);
    normalize(&parts.join(" "))
}

fn collect_text<'a>(element: ElementRef<'a>, parts: &mut Vec<&'a str>) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => parts.push(text),
            Node::Element(el) if DISCARDED_TAGS.contains(&el.name()) => {}
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    collect_text(child_el, parts);
                }
            }
            _ => {}
        }
    }
}

fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn extract_links(page_url: &str, document: &Html) -> Vec<String> {
    let Ok(base) = reqwest::Url::parse(page_url) else {
        return Vec::new();
    };
    let Ok(sel) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut links: Vec<String> = Vec::new();
    for anchor in document.select(&sel) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        if let Some(link) = resolve_link(&base, href) {
            if !links.contains(&link) {
                links.push(link);
            }
        }
    }
    links
}

/// Resolve `href` against `base`, keeping only crawlable same-host pages.
pub fn resolve_link(base: &reqwest::Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let lower = href.to_lowercase();
    if SKIP_PATTERNS.iter().any(|p| lower.contains(p)) {
        return None;
    }

    let mut url = base.join(href).ok()?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str() != base.host_str() {
        return None;
    }
    url.set_fragment(None);
    Some(url.to_string())
}
