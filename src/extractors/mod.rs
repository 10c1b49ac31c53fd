//! Article extraction strategies and the router that picks between them.
//!
//! Every strategy implements [`ArticleExtractor`] and turns one URL into an
//! [`ExtractedArticle`] or an [`ExtractionError`].
//!
//! # Strategies
//!
//! | Site | Module | Fetch | Notes |
//! |------|--------|-------|-------|
//! | Naver News | [`naver`] | plain HTTP, crawler identities first | Korean noise cleaning, JSON-LD author/date |
//! | Google News links | [`google_news`] | stealth headless browser | resolves the redirect, readability then scoring |
//! | Anything else | [`general`] | SSR-friendly HTTP, browser for SPAs | selector cascade and paragraph collection |
//!
//! [`unified::UnifiedExtractor`] routes a URL to one of them with [`SiteKind`]
//! and falls back to the general strategy once when a specific one fails.

pub mod general;
pub mod google_news;
pub mod naver;
pub mod unified;

use crate::config::ExtractionOptions;
use crate::error::ExtractionError;
use crate::models::ExtractedArticle;
use crate::utils::{bare_domain, host_matches};
use scraper::{Html, Selector};
use std::fmt;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// A site strategy: fetch one URL and turn it into an article.
pub trait ArticleExtractor {
    /// Short strategy name used in logs and in the unified envelope.
    fn name(&self) -> &'static str;

    /// Extract the article behind `url`.
    ///
    /// # Errors
    ///
    /// Any [`ExtractionError`]; strategies with internal retries only return
    /// once their attempt budget is spent.
    async fn extract(
        &self,
        url: &Url,
        options: &ExtractionOptions,
    ) -> Result<ExtractedArticle, ExtractionError>;

    /// Release browser resources. Calling it more than once is a no-op.
    async fn close(&self) -> Result<(), ExtractionError>;
}

/// Which strategy a URL is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SiteKind {
    Naver,
    GoogleNews,
    General,
}

/// Domains routed by hostname suffix, checked before the substring fallbacks.
const DOMAIN_TABLE: &[(&str, SiteKind)] = &[
    ("naver.com", SiteKind::Naver),
    ("google.com", SiteKind::GoogleNews),
];

const SUBSTRING_TABLE: &[(&str, SiteKind)] = &[
    ("news.naver.com", SiteKind::Naver),
    ("news.google.com", SiteKind::GoogleNews),
];

impl SiteKind {
    /// Route a URL by its hostname.
    pub fn for_url(url: &Url) -> Self {
        if let Some(domain) = bare_domain(url) {
            if let Some((_, kind)) = DOMAIN_TABLE
                .iter()
                .find(|(suffix, _)| host_matches(&domain, suffix))
            {
                return *kind;
            }
        }
        let raw = url.as_str();
        SUBSTRING_TABLE
            .iter()
            .find(|(needle, _)| raw.contains(needle))
            .map_or(SiteKind::General, |(_, kind)| *kind)
    }

    pub fn label(self) -> &'static str {
        match self {
            SiteKind::Naver => "Naver",
            SiteKind::GoogleNews => "GoogleNews",
            SiteKind::General => "General",
        }
    }
}

impl fmt::Display for SiteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Site label reported in the unified envelope, independent of which strategy ran.
///
/// Naver and Google hosts get their strategy label; anything else reports its
/// bare domain.
pub fn detect_site(url: &Url) -> String {
    match bare_domain(url) {
        Some(domain) if domain.contains("naver.com") => SiteKind::Naver.label().to_string(),
        Some(domain) if domain.contains("google.com") => SiteKind::GoogleNews.label().to_string(),
        Some(domain) => domain,
        None => "Unknown".to_string(),
    }
}

/// Build an HTTP client for static fetches, honouring the configured proxy.
pub(crate) fn http_client(
    options: &ExtractionOptions,
    timeout: Duration,
) -> Result<reqwest::Client, ExtractionError> {
    let mut builder = reqwest::Client::builder()
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::limited(10));
    if let Some(proxy) = &options.proxy {
        let mut p = reqwest::Proxy::all(&proxy.server)
            .map_err(|e| ExtractionError::InvalidInput(format!("proxy: {e}")))?;
        if let (Some(user), Some(pass)) = (&proxy.username, &proxy.password) {
            p = p.basic_auth(user, pass);
        }
        builder = builder.proxy(p);
    }
    builder.build().map_err(ExtractionError::resource)
}

/// Attribute `attr` of the first element matching `css`, trimmed and non-empty.
pub(crate) fn first_attr(doc: &Html, css: &str, attr: &str) -> Option<String> {
    let selector = Selector::parse(css).ok()?;
    doc.select(&selector)
        .next()
        .and_then(|el| el.value().attr(attr))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Trimmed text of the first element matching `css`, if it has any.
pub(crate) fn first_text(doc: &Html, css: &str) -> Option<String> {
    let selector = Selector::parse(css).ok()?;
    doc.select(&selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Number of elements matching `css`.
pub(crate) fn count(doc: &Html, css: &str) -> usize {
    Selector::parse(css).map_or(0, |s| doc.select(&s).count())
}

/// Parsed bodies of every `application/ld+json` script, flattening arrays and `@graph`.
pub(crate) fn json_ld_objects(doc: &Html) -> Vec<serde_json::Value> {
    let Ok(selector) = Selector::parse(r#"script[type="application/ld+json"]"#) else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for script in doc.select(&selector) {
        let raw = script.text().collect::<String>();
        match serde_json::from_str::<serde_json::Value>(raw.trim()) {
            Ok(serde_json::Value::Array(items)) => out.extend(items),
            Ok(value) => {
                if let Some(graph) = value.get("@graph").and_then(|g| g.as_array()) {
                    out.extend(graph.iter().cloned());
                }
                out.push(value);
            }
            Err(e) => debug!(error = %e, "Skipping unparseable JSON-LD block"),
        }
    }
    out
}

/// Map a reqwest failure onto the error taxonomy.
pub(crate) fn classify_http_error(e: reqwest::Error, timeout: Duration) -> ExtractionError {
    if e.is_timeout() {
        ExtractionError::Timeout(timeout)
    } else {
        ExtractionError::FetchFailure(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_routes_naver_hosts() {
        assert_eq!(
            SiteKind::for_url(&url("https://n.news.naver.com/article/001/0000001")),
            SiteKind::Naver
        );
        assert_eq!(SiteKind::for_url(&url("https://www.naver.com/")), SiteKind::Naver);
        assert_eq!(
            SiteKind::for_url(&url("https://m.sports.naver.com/news/1")),
            SiteKind::Naver
        );
    }

    #[test]
    fn test_routes_google_news() {
        assert_eq!(
            SiteKind::for_url(&url("https://news.google.com/rss/articles/CBMiabc?oc=5")),
            SiteKind::GoogleNews
        );
    }

    #[test]
    fn test_substring_fallback() {
        assert_eq!(
            SiteKind::for_url(&url("https://proxy.example.com/?u=news.google.com/x")),
            SiteKind::GoogleNews
        );
    }

    #[test]
    fn test_unknown_domain_is_general() {
        assert_eq!(
            SiteKind::for_url(&url("https://www.bbc.com/news/world-1")),
            SiteKind::General
        );
        assert_eq!(
            SiteKind::for_url(&url("https://evilnaver.com/")),
            SiteKind::General
        );
    }

    #[test]
    fn test_detect_site() {
        assert_eq!(detect_site(&url("https://n.news.naver.com/a")), "Naver");
        assert_eq!(detect_site(&url("https://news.google.com/a")), "GoogleNews");
        assert_eq!(detect_site(&url("https://www.bbc.com/news")), "bbc.com");
    }

    #[test]
    fn test_json_ld_flattens_graph_and_arrays() {
        let doc = Html::parse_document(
            r#"<html><head>
            <script type="application/ld+json">{"@graph":[{"@type":"NewsArticle","headline":"A"}]}</script>
            <script type="application/ld+json">[{"@type":"Person"},{"@type":"Organization"}]</script>
            <script type="application/ld+json">{ not json</script>
            </head></html>"#,
        );
        let objects = json_ld_objects(&doc);
        assert_eq!(objects.len(), 4);
        assert_eq!(objects[0]["headline"], "A");
    }

    #[test]
    fn test_first_attr_and_text() {
        let doc = Html::parse_document(
            r#"<html><head><meta property="og:title" content="  Hello  "></head>
            <body><h1> Title </h1><h1>Second</h1></body></html>"#,
        );
        assert_eq!(
            first_attr(&doc, r#"meta[property="og:title"]"#, "content").as_deref(),
            Some("Hello")
        );
        assert_eq!(first_text(&doc, "h1").as_deref(), Some("Title"));
        assert_eq!(count(&doc, "h1"), 2);
        assert!(first_text(&doc, "h2").is_none());
    }

    #[test]
    fn test_http_client_rejects_bad_proxy() {
        let options = ExtractionOptions {
            proxy: Some(crate::config::ProxyConfig {
                server: "::not a proxy::".into(),
                username: None,
                password: None,
            }),
            ..Default::default()
        };
        assert!(http_client(&options, Duration::from_secs(1)).is_err());
    }
}
