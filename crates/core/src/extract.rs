use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error("invalid selector: {0}")]
    Selector(String),
}

/// What a detail page yields once extracted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemRecord {
    pub source_url: String,
    pub category: String,
    pub download_links: Vec<String>,
}

/// Site adapter: the pipeline only ever talks to markup through this trait.
pub trait Extractor: Send + Sync {
    /// Detail-page links on an index page, in document order.
    fn detail_links(&self, body: &str) -> Vec<String>;
    /// Download links on a detail page, in document order.
    fn download_links(&self, body: &str) -> Vec<String>;
    /// Category label of a detail page, unescaped. `None` when absent or blank.
    fn category(&self, body: &str) -> Option<String>;
}

// Index page: one title link per listed book.
static DETAIL_LINK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<h2 class="entry-title"><a href="([^"]+)" rel="bookmark""#).unwrap()
});

static DOWNLOAD_LINK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<a href="([^"]+\.pdf)" target="_blank">"#).unwrap()
});

// The anchor must sit inside the `<dd>` right after the label; the scan stops at `</dd>`.
static CATEGORY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<dt>Category:</dt>\s*<dd[^>]*>(?:[^<]|<[^/a]|</[^d])*?<a\b[^>]*>(.*?)</a>"#).unwrap()
});

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());

/// Replace the handful of entities that show up in category labels.
pub fn unescape_entities(raw: &str) -> String {
    raw.replace("&quot;", "\"")
        .replace("&#039;", "'")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

fn clean_category(raw: &str) -> Option<String> {
    let text = TAG_RE.replace_all(raw, "");
    let category = unescape_entities(text.trim());
    if category.is_empty() {
        None
    } else {
        Some(category)
    }
}

/// Regex-driven extractor. Each pattern's first capture group is the wanted value.
#[derive(Debug, Clone)]
pub struct PatternExtractor {
    detail: Regex,
    download: Regex,
    category: Regex,
}

impl PatternExtractor {
    pub fn new(detail: &str, download: &str, category: &str) -> Result<Self, ExtractError> {
        Ok(Self {
            detail: Regex::new(detail)?,
            download: Regex::new(download)?,
            category: Regex::new(category)?,
        })
    }

    fn all_captures(re: &Regex, body: &str) -> Vec<String> {
        re.captures_iter(body)
            .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
            .collect()
    }
}

impl Default for PatternExtractor {
    fn default() -> Self {
        Self {
            detail: DETAIL_LINK_RE.clone(),
            download: DOWNLOAD_LINK_RE.clone(),
            category: CATEGORY_RE.clone(),
        }
    }
}

impl Extractor for PatternExtractor {
    fn detail_links(&self, body: &str) -> Vec<String> {
        Self::all_captures(&self.detail, body)
    }

    fn download_links(&self, body: &str) -> Vec<String> {
        Self::all_captures(&self.download, body)
    }

    fn category(&self, body: &str) -> Option<String> {
        let caps = self.category.captures(body)?;
        clean_category(caps.get(1)?.as_str())
    }
}

/// CSS-selector extractor built on `scraper`. Link selectors read the `href` attribute,
/// the category selector reads the text of its first match.
#[derive(Debug, Clone)]
pub struct SelectorExtractor {
    detail: Selector,
    download: Selector,
    category: Selector,
}

fn parse_selector(css: &str) -> Result<Selector, ExtractError> {
    Selector::parse(css).map_err(|e| ExtractError::Selector(format!("{css}: {e:?}")))
}

impl SelectorExtractor {
    pub fn new(detail: &str, download: &str, category: &str) -> Result<Self, ExtractError> {
        Ok(Self {
            detail: parse_selector(detail)?,
            download: parse_selector(download)?,
            category: parse_selector(category)?,
        })
    }

    /// Selectors matching the same markup as [`PatternExtractor::default`].
    pub fn site_default() -> Result<Self, ExtractError> {
        Self::new(
            "h2.entry-title > a[rel=\"bookmark\"]",
            "a[target=\"_blank\"][href$=\".pdf\"]",
            "dl > dd a[rel~=\"category\"], dl > dd a[href*=\"/category/\"]",
        )
    }

    fn hrefs(selector: &Selector, body: &str) -> Vec<String> {
        let document = Html::parse_document(body);
        document
            .select(selector)
            .filter_map(|el| el.value().attr("href"))
            .map(str::to_string)
            .collect()
    }
}

impl Extractor for SelectorExtractor {
    fn detail_links(&self, body: &str) -> Vec<String> {
        Self::hrefs(&self.detail, body)
    }

    fn download_links(&self, body: &str) -> Vec<String> {
        Self::hrefs(&self.download, body)
    }

    fn category(&self, body: &str) -> Option<String> {
        let document = Html::parse_document(body);
        let text: String = document.select(&self.category).next()?.text().collect();
        // html5ever already decodes entities; trimming is all that is left.
        let text = text.trim();
        if text.is_empty() {
            None
        } else {
            Some(text.to_string())
        }
    }
}
