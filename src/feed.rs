//! Google News RSS feed client.
//!
//! Builds the feed URL for a language/country edition (optionally a keyword
//! search), fetches it and turns the `<item>` list into [`FeedItem`]s that the
//! [`service`](crate::service) layer hands to the extractors.
//!
//! | Query | URL |
//! |-------|-----|
//! | top stories | `https://news.google.com/rss?hl={hl}&gl={gl}&ceid={gl}:{hl}` |
//! | keyword | `https://news.google.com/rss/search?q={keyword}&hl={hl}&gl={gl}&ceid={gl}:{hl}` |

use crate::config::ExtractionOptions;
use crate::error::ExtractionError;
use crate::extractors::{classify_http_error, http_client};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

const RSS_BASE_URL: &str = "https://news.google.com/rss";
const FEED_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_COUNT: usize = 5;

/// Interface languages Google News publishes editions for.
pub const VALID_LANGUAGES: &[&str] = &[
    "ko", "id", "ms", "ca", "cs", "de", "et", "en", "es-419", "es", "fr", "it", "lv", "lt", "hu",
    "nl", "no", "pl", "pt-419", "pt-150", "ro", "sk", "sl", "fi", "sv", "vi", "tr", "el", "bg",
    "ru", "sr", "uk", "ja", "zh-Hans", "zh-Hant", "he", "ar", "mr", "hi", "bn", "pa", "gu", "ta",
    "te", "ml", "th",
];

/// Country editions Google News publishes.
pub const VALID_COUNTRIES: &[&str] = &[
    "KR", "ID", "MY", "ES", "CZ", "DE", "AT", "CH", "EE", "AU", "BW", "CA", "ET", "GH", "IN", "IE",
    "IL", "KE", "LV", "NA", "NZ", "NG", "PK", "PH", "SG", "ZA", "TZ", "UG", "GB", "US", "ZW", "AR",
    "CL", "CO", "CU", "MX", "PE", "VE", "BE", "FR", "MA", "SN", "IT", "LT", "HU", "NL", "NO", "PL",
    "BR", "PT", "RO", "SK", "SI", "FI", "SE", "VN", "TR", "GR", "BG", "RU", "UA", "RS", "JP", "CN",
    "TW", "HK", "AE", "SA", "LB", "EG", "BD", "TH",
];

/// Which feed to read and how many items to keep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedQuery {
    pub hl: String,
    pub gl: String,
    #[serde(default)]
    pub keyword: Option<String>,
    #[serde(default = "default_count")]
    pub count: usize,
}

fn default_count() -> usize {
    DEFAULT_COUNT
}

impl FeedQuery {
    pub fn new(hl: impl Into<String>, gl: impl Into<String>) -> Self {
        Self {
            hl: hl.into(),
            gl: gl.into(),
            keyword: None,
            count: DEFAULT_COUNT,
        }
    }

    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = Some(keyword.into());
        self
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    /// Check the language and country codes against the known editions.
    ///
    /// # Errors
    ///
    /// [`ExtractionError::InvalidInput`] naming the offending code, or a zero count.
    pub fn validate(&self) -> Result<(), ExtractionError> {
        if !VALID_LANGUAGES.contains(&self.hl.as_str()) {
            return Err(ExtractionError::InvalidInput(format!(
                "unsupported language code {:?}",
                self.hl
            )));
        }
        if !VALID_COUNTRIES.contains(&self.gl.as_str()) {
            return Err(ExtractionError::InvalidInput(format!(
                "unsupported country code {:?}",
                self.gl
            )));
        }
        if self.count == 0 {
            return Err(ExtractionError::InvalidInput("count must be at least 1".into()));
        }
        Ok(())
    }

    /// Feed URL for this query. A blank keyword reads the top stories.
    pub fn rss_url(&self) -> String {
        let edition = format!(
            "hl={hl}&gl={gl}&ceid={gl}:{hl}",
            hl = self.hl,
            gl = self.gl
        );
        match self.keyword.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
            Some(keyword) => format!(
                "{RSS_BASE_URL}/search?q={}&{edition}",
                urlencoding::encode(keyword)
            ),
            None => format!("{RSS_BASE_URL}?{edition}"),
        }
    }
}

/// One `<item>` of the feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pub_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Option<Channel>,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(default)]
    item: Vec<RawItem>,
}

#[derive(Debug, Deserialize)]
struct RawItem {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
}

/// Parse an RSS document and keep the first `count` items with a title and link.
///
/// # Errors
///
/// [`ExtractionError::FetchFailure`] when the XML does not parse or has no
/// `<channel>`. A channel without items yields an empty list.
pub fn parse_feed(xml: &str, count: usize) -> Result<Vec<FeedItem>, ExtractionError> {
    let rss: Rss = quick_xml::de::from_str(xml)
        .map_err(|e| ExtractionError::FetchFailure(format!("invalid RSS document: {e}")))?;
    let channel = rss
        .channel
        .ok_or_else(|| ExtractionError::FetchFailure("RSS document has no channel".into()))?;

    let total = channel.item.len();
    let items: Vec<FeedItem> = channel
        .item
        .into_iter()
        .filter_map(|raw| {
            let title = raw.title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())?;
            let link = raw.link.map(|l| l.trim().to_string()).filter(|l| !l.is_empty())?;
            Some(FeedItem {
                title,
                link,
                pub_date: raw.pub_date.map(|d| d.trim().to_string()).filter(|d| !d.is_empty()),
            })
        })
        .take(count)
        .collect();

    if items.len() < total.min(count) {
        debug!(total, kept = items.len(), "Skipped feed items without title or link");
    }
    Ok(items)
}

/// Fetch and parse the feed for `query`.
///
/// Honours the proxy from `options`.
///
/// # Errors
///
/// [`ExtractionError::InvalidInput`] for an invalid query, otherwise fetch or
/// parse failures.
#[instrument(level = "info", skip_all, fields(hl = %query.hl, gl = %query.gl, keyword = ?query.keyword))]
pub async fn fetch_feed(
    query: &FeedQuery,
    options: &ExtractionOptions,
) -> Result<Vec<FeedItem>, ExtractionError> {
    query.validate()?;
    let url = query.rss_url();
    let client = http_client(options, FEED_TIMEOUT)?;

    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| classify_http_error(e, FEED_TIMEOUT))?;
    let status = response.status();
    if !status.is_success() {
        warn!(%url, %status, "Feed request rejected");
        return Err(ExtractionError::FetchFailure(format!("feed returned {status}")));
    }
    let body = response
        .text()
        .await
        .map_err(|e| classify_http_error(e, FEED_TIMEOUT))?;

    let items = parse_feed(&body, query.count)?;
    info!(count = items.len(), %url, "Fetched feed items");
    Ok(items)
}
