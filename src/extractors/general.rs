//! Site-agnostic article extractor.
//!
//! The general strategy handles every URL the site-specific strategies do not,
//! and is the router's fallback when they fail.
//!
//! # Fetching
//!
//! ```text
//! static fetch (crawler identities, then desktop Chrome)
//!     ├─ page looks server-rendered      → "SSR/SEO Optimized Fetch"
//!     ├─ page looks like an SPA shell    → headless browser, "Headless Browser (SPA Support)"
//!     └─ otherwise                       → "Simple Fetch"
//! forceBrowserFetch                      → headless browser, "Headless Browser (Forced)"
//! ```
//!
//! # Parsing
//!
//! The content container is chosen from a priority-ordered selector list;
//! noise subtrees are removed before paragraphs and headings are collected.
//! Every attempt runs under the per-attempt timeout and the whole extraction
//! under the retry policy.

use super::{
    ArticleExtractor, classify_http_error, count, first_attr, first_text, http_client,
};
use crate::browser::stealth::{DESKTOP_CHROME_UA, RENDER_BLOCK_RULES};
use crate::browser::{
    BrowserSession, ProfileKind, block_subresources, close_page, wait_for_any_selector,
};
use crate::config::ExtractionOptions;
use crate::error::ExtractionError;
use crate::extractors::naver::parse_naver_date;
use crate::models::{
    ArticleMetadata, ExtractedArticle, GeneralMetadata, Performance, SiteMetadata,
    TITLE_NOT_FOUND,
};
use crate::retry::RetryPolicy;
use crate::scoring::{parse_selectors, strip_noise};
use crate::utils::{bare_domain, calculate_stats, normalize_whitespace, now_rfc3339};
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::header::{ACCEPT, USER_AGENT};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};
use url::Url;

pub const NAME: &str = "General";

/// Title reported for aggregator pages when no heading survives the filters.
pub const AGGREGATOR_TITLE_NOT_FOUND: &str = "구글 뉴스 - 제목 추출 실패";

const SSR_TIMEOUT: Duration = Duration::from_secs(8);
const PLAIN_TIMEOUT: Duration = Duration::from_secs(10);
/// Bodies shorter than this count as empty and are retried.
const MIN_CONTENT_CHARS: usize = 100;

/// Identities whose responses are most likely to be server-rendered.
const SSR_IDENTITIES: &[(&str, &str, &str)] = &[
    (
        "Googlebot",
        "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)",
        "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
    ),
    (
        "Bingbot",
        "Mozilla/5.0 (compatible; bingbot/2.0; +http://www.bing.com/bingbot.htm)",
        "text/html,application/xhtml+xml",
    ),
    (
        "Mobile Safari",
        "Mozilla/5.0 (iPhone; CPU iPhone OS 14_7_1 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.1.2 Mobile/15E148 Safari/604.1",
        "text/html",
    ),
];

/// Selectors whose appearance means a rendered page has content worth reading.
const CONTENT_READY_SELECTORS: &[&str] = &[
    "article",
    ".article-content",
    ".post-content",
    ".content",
    "main p",
    "h1",
    r#"[role="main"]"#,
    r#"[itemprop="articleBody"]"#,
];

/// How the page HTML was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMethod {
    SimpleFetch,
    SsrFetch,
    BrowserSpa,
    BrowserForced,
}

impl ExtractionMethod {
    pub fn label(self) -> &'static str {
        match self {
            ExtractionMethod::SimpleFetch => "Simple Fetch",
            ExtractionMethod::SsrFetch => "SSR/SEO Optimized Fetch",
            ExtractionMethod::BrowserSpa => "Headless Browser (SPA Support)",
            ExtractionMethod::BrowserForced => "Headless Browser (Forced)",
        }
    }

    pub fn is_browser(self) -> bool {
        matches!(
            self,
            ExtractionMethod::BrowserSpa | ExtractionMethod::BrowserForced
        )
    }
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which extra noise rules apply to a content container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContainerSite {
    Daum,
    General,
}

impl ContainerSite {
    fn label(self) -> &'static str {
        match self {
            ContainerSite::Daum => "daum",
            ContainerSite::General => "general",
        }
    }

    fn extra_noise(self) -> &'static [&'static str] {
        match self {
            ContainerSite::Daum => &[".article_head", ".article_info"],
            ContainerSite::General => &[],
        }
    }
}

/// Content containers with their priority (higher wins).
const CONTAINER_SELECTORS: &[(&str, u8, ContainerSite)] = &[
    ("#harmonyContainer", 9, ContainerSite::Daum),
    (".article_view", 9, ContainerSite::Daum),
    ("article", 8, ContainerSite::General),
    (".article-content", 8, ContainerSite::General),
    (".article_content", 8, ContainerSite::General),
    (".post-content", 7, ContainerSite::General),
    (".news-body", 7, ContainerSite::General),
    (".article-body", 7, ContainerSite::General),
    (".content", 6, ContainerSite::General),
    ("#content", 6, ContainerSite::General),
    ("main", 5, ContainerSite::General),
    (".entry-content", 3, ContainerSite::General),
];

const COMMON_NOISE: &[&str] = &[
    "script",
    "style",
    "nav",
    "header",
    "footer",
    ".ad",
    ".advertisement",
    ".banner",
    ".social",
    ".share",
    ".comment",
    ".related",
    ".sidebar",
];

/// Brand and site names that are never an article title on their own.
const MEDIA_NAMES: &[&str] = &[
    "매일경제",
    "매일 경제",
    "조선일보",
    "중앙일보",
    "동아일보",
    "한경닷컴",
    "한국경제",
    "연합뉴스",
    "경향신문",
    "한겨레",
    "서울신문",
    "문화일보",
    "스포츠조선",
    "이데일리",
    "MBC",
    "KBS",
    "SBS",
    "JTBC",
    "YTN",
    "TV조선",
    "Google",
    "구글",
    "News",
    "뉴스",
];

/// Static-then-browser extractor for arbitrary news sites.
#[derive(Debug)]
pub struct GeneralExtractor {
    session: BrowserSession,
}

impl Default for GeneralExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl GeneralExtractor {
    pub fn new() -> Self {
        Self {
            session: BrowserSession::new(NAME, ProfileKind::Plain),
        }
    }

    async fn attempt(
        &self,
        url: &Url,
        options: &ExtractionOptions,
    ) -> Result<ExtractedArticle, ExtractionError> {
        let (html, method) = if options.force_browser_fetch {
            info!("Browser fetch forced");
            (
                self.fetch_with_browser(url, options).await?,
                ExtractionMethod::BrowserForced,
            )
        } else {
            let html = self.fetch_static(url, options).await?;
            match classify_static_page(&html) {
                ExtractionMethod::BrowserSpa => {
                    info!("SPA shell detected; rendering with the browser");
                    (
                        self.fetch_with_browser(url, options).await?,
                        ExtractionMethod::BrowserSpa,
                    )
                }
                method => (html, method),
            }
        };

        let article = parse_general_news(&html, url, method);
        if !article.has_content() && is_bot_challenge(&Html::parse_document(&html), &html) {
            warn!(method = %method, "Bot challenge page returned no content");
            return Err(ExtractionError::BotChallenge(url.to_string()));
        }
        require_content(article)
    }

    /// Try the SSR identities, then fall back to a plain desktop request.
    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn fetch_static(
        &self,
        url: &Url,
        options: &ExtractionOptions,
    ) -> Result<String, ExtractionError> {
        let ssr_client = http_client(options, SSR_TIMEOUT)?;
        for (label, user_agent, accept) in SSR_IDENTITIES {
            match get_text(&ssr_client, url, user_agent, accept, SSR_TIMEOUT).await {
                Ok(html) if is_ssr_content(&html) => {
                    info!(identity = label, bytes = html.len(), "SSR response accepted");
                    return Ok(html);
                }
                Ok(_) => debug!(identity = label, "Response is not server-rendered"),
                Err(e) => debug!(identity = label, error = %e, "SSR request failed"),
            }
        }

        info!("No SSR response; falling back to a plain request");
        let client = http_client(options, PLAIN_TIMEOUT)?;
        get_text(
            &client,
            url,
            DESKTOP_CHROME_UA,
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            PLAIN_TIMEOUT,
        )
        .await
    }

    /// Render the page in the headless browser and return its DOM.
    #[instrument(level = "info", skip_all, fields(%url))]
    async fn fetch_with_browser(
        &self,
        url: &Url,
        options: &ExtractionOptions,
    ) -> Result<String, ExtractionError> {
        let (page, _profile) = self.session.new_page(options).await?;
        let interception = if options.block_subresources {
            match block_subresources(&page, RENDER_BLOCK_RULES).await {
                Ok(task) => Some(task),
                Err(e) => {
                    close_page(page, None).await;
                    return Err(e);
                }
            }
        } else {
            None
        };

        let rendered = async {
            timeout(options.navigation_timeout(), page.goto(url.as_str()))
                .await
                .map_err(|_| ExtractionError::Timeout(options.navigation_timeout()))?
                .map_err(ExtractionError::fetch)?;

            match wait_for_any_selector(&page, CONTENT_READY_SELECTORS, options.content_wait())
                .await
            {
                Some(selector) => debug!(%selector, "Content appeared"),
                None => info!(
                    wait_ms = options.content_wait_ms,
                    "No content selector appeared; using the DOM as is"
                ),
            }
            page.content().await.map_err(ExtractionError::fetch)
        }
        .await;

        close_page(page, interception).await;
        if let Err(e) = &rendered {
            if matches!(e, ExtractionError::ResourceError(_)) {
                warn!(error = %e, "Browser failed; closing the session");
                if let Err(close_err) = self.session.close().await {
                    warn!(error = %close_err, "Failed to close browser session");
                }
            }
        }
        rendered
    }
}

impl ArticleExtractor for GeneralExtractor {
    fn name(&self) -> &'static str {
        NAME
    }

    #[instrument(level = "info", skip_all, fields(%url))]
    async fn extract(
        &self,
        url: &Url,
        options: &ExtractionOptions,
    ) -> Result<ExtractedArticle, ExtractionError> {
        let t0 = Instant::now();
        let policy = RetryPolicy::new(options.max_retries);
        let (mut article, attempts) = policy
            .run(NAME, |attempt| async move {
                debug!(attempt, "General extraction attempt");
                timeout(options.timeout(), self.attempt(url, options))
                    .await
                    .map_err(|_| ExtractionError::Timeout(options.timeout()))?
            })
            .await?;

        article.performance.extraction_time_ms = t0.elapsed().as_millis() as u64;
        info!(
            attempts,
            method = %article.performance.method,
            chars = article.stats.characters,
            elapsed_ms = article.performance.extraction_time_ms,
            "General extraction finished"
        );
        Ok(article)
    }

    async fn close(&self) -> Result<(), ExtractionError> {
        self.session.close().await
    }
}

async fn get_text(
    client: &reqwest::Client,
    url: &Url,
    user_agent: &str,
    accept: &str,
    limit: Duration,
) -> Result<String, ExtractionError> {
    let resp = client
        .get(url.as_str())
        .header(USER_AGENT, user_agent)
        .header(ACCEPT, accept)
        .send()
        .await
        .map_err(|e| classify_http_error(e, limit))?;
    if !resp.status().is_success() {
        return Err(ExtractionError::FetchFailure(format!(
            "HTTP {} for {url}",
            resp.status()
        )));
    }
    resp.text().await.map_err(|e| classify_http_error(e, limit))
}

fn body_text_len(doc: &Html) -> usize {
    first_text(doc, "body").map_or(0, |t| t.chars().count())
}

/// Whether the HTML already carries readable, server-rendered article text.
///
/// All of these must hold: a content container or several paragraphs, no
/// loading or spinner state, more than 500 characters of body text, and no
/// security-interstitial markers. Inputs under 100 bytes are never SSR.
pub fn is_ssr_content(html: &str) -> bool {
    if html.len() < 100 {
        return false;
    }
    let doc = Html::parse_document(html);

    let has_content = count(&doc, "p") > 2
        || count(&doc, "article") > 0
        || count(
            &doc,
            r#".content, .article-content, #content, [role="main"], [itemprop="articleBody"]"#,
        ) > 0;

    let empty_mount = |css: &str| {
        count(&doc, css) > 0 && first_text(&doc, css).map_or(0, |t| t.chars().count()) < 100
    };
    let not_loading = !["Loading...", "loading...", "Please wait"]
        .iter()
        .any(|m| html.contains(m))
        && [
            r#"body[class*="loading"]"#,
            r#"div[id*="spinner"]"#,
            r#"div[class*="spinner"]"#,
            r#"body[data-loading="true"]"#,
            r#"div[aria-busy="true"]"#,
        ]
        .iter()
        .all(|css| count(&doc, css) == 0)
        && !empty_mount("#root")
        && !empty_mount("#app");

    let text_len = body_text_len(&doc);
    let not_security = ![
        "Cloudflare",
        "Just a moment",
        "Enable JavaScript and cookies",
        "Attention Required!",
        "Verifying you are human",
    ]
    .iter()
    .any(|m| html.contains(m));

    debug!(has_content, not_loading, text_len, not_security, "SSR check");
    has_content && not_loading && text_len > 500 && not_security
}

/// Whether the HTML is a client-rendered shell that needs a browser.
pub fn is_spa(html: &str) -> bool {
    if html.len() < 100 {
        return false;
    }
    let doc = Html::parse_document(html);

    const SCRIPT_KEYWORDS: &[&str] = &["react", "vue", "angular", "app-root", "main.js", "bundle.js"];
    if let Ok(scripts) = Selector::parse("script") {
        let hit = doc.select(&scripts).any(|s| {
            let body = s.inner_html().to_lowercase();
            SCRIPT_KEYWORDS.iter().any(|kw| body.contains(kw))
        });
        if hit {
            debug!("SPA hint: framework keyword in script");
            return true;
        }
    }

    let text_len = body_text_len(&doc);
    for mount in ["#root", "#app", "div[data-reactroot]"] {
        let Ok(selector) = Selector::parse(mount) else {
            continue;
        };
        if let Some(el) = doc.select(&selector).next() {
            if el.inner_html().trim().chars().count() < 200 && text_len < 500 {
                debug!(mount, "SPA hint: empty mount point");
                return true;
            }
        }
    }

    if !is_ssr_content(html) && text_len < 300 {
        debug!(text_len, "SPA hint: not server-rendered and little text");
        return true;
    }
    false
}

/// Decide how statically fetched HTML should be treated.
///
/// Returns [`ExtractionMethod::BrowserSpa`] when the page needs rendering.
pub fn classify_static_page(html: &str) -> ExtractionMethod {
    if is_spa(html) {
        ExtractionMethod::BrowserSpa
    } else if is_ssr_content(html) {
        ExtractionMethod::SsrFetch
    } else {
        ExtractionMethod::SimpleFetch
    }
}

/// Whether the page is an anti-bot interstitial: two or more markers must hold.
pub fn is_bot_challenge(doc: &Html, html: &str) -> bool {
    let title = first_text(doc, "title").unwrap_or_default();
    let indicators = [
        html.contains("Enable JavaScript and cookies to continue"),
        html.contains("Cloudflare"),
        html.contains("Ray ID:"),
        html.contains("challenge-error-text"),
        count(doc, "#challenge-error-text") > 0,
        count(doc, ".cf-error-details") > 0,
        title.contains("Just a moment"),
        count(doc, "*") < 100 && html.contains("medium.com"),
    ];
    indicators.iter().filter(|hit| **hit).count() >= 2
}

/// Accept a parsed article only when its body reaches the minimum length.
///
/// # Errors
///
/// Returns [`ExtractionError::EmptyContent`] for bodies under 100 characters.
pub fn require_content(article: ExtractedArticle) -> Result<ExtractedArticle, ExtractionError> {
    let chars = article.content.chars().count();
    if chars < MIN_CONTENT_CHARS {
        warn!(chars, method = %article.performance.method, "Extracted content too short");
        return Err(ExtractionError::EmptyContent { chars });
    }
    Ok(article)
}

/// Parse fetched HTML into an article.
///
/// `performance.extraction_time_ms` is left at zero for the caller to fill in.
pub fn parse_general_news(html: &str, source_url: &Url, method: ExtractionMethod) -> ExtractedArticle {
    let doc = Html::parse_document(html);
    info!(elements = count(&doc, "*"), method = %method, "Parsing general page");
    if is_bot_challenge(&doc, html) {
        warn!("Bot challenge markers present; content may be limited");
    }

    let content = extract_general_content(&doc);
    ExtractedArticle {
        title: extract_title(&doc),
        author: extract_author(&doc),
        publish_date: extract_publish_date(&doc),
        description: extract_description(&doc),
        source_url: source_url.to_string(),
        stats: calculate_stats(&content, true),
        metadata: extract_metadata(&doc, source_url, method),
        performance: Performance {
            extraction_time_ms: 0,
            method: method.label().to_string(),
        },
        content,
    }
}

fn best_container(doc: &Html) -> Option<(ElementRef<'_>, &'static str, ContainerSite)> {
    let mut best: Option<(ElementRef<'_>, &'static str, u8, usize, ContainerSite)> = None;
    for &(css, priority, site) in CONTAINER_SELECTORS {
        let Ok(selector) = Selector::parse(css) else {
            continue;
        };
        let Some(el) = doc.select(&selector).next() else {
            continue;
        };
        let len = el.text().collect::<String>().trim().chars().count();
        debug!(selector = css, chars = len, priority, "Container candidate");
        let better = match &best {
            None => true,
            Some((_, _, p, l, _)) => priority > *p || (priority == *p && len > *l),
        };
        if better && len > 100 {
            best = Some((el, css, priority, len, site));
        }
    }
    best.map(|(el, css, _, _, site)| (el, css, site))
}

fn texts_of<'a>(area: &'a Html, css: &str) -> Vec<(ElementRef<'a>, String)> {
    Selector::parse(css).map_or_else(
        |_| Vec::new(),
        |s| {
            area.select(&s)
                .map(|el| (el, el.text().collect::<String>().trim().to_string()))
                .collect()
        },
    )
}

/// Collect the article body as blank-line separated paragraphs.
pub fn extract_general_content(doc: &Html) -> String {
    let (area_html, site) = match best_container(doc) {
        Some((el, css, site)) => {
            info!(selector = css, site = site.label(), "Selected content container");
            (el.inner_html(), site)
        }
        None => {
            info!("No prioritised container; using the whole body");
            let body = Selector::parse("body")
                .ok()
                .and_then(|s| doc.select(&s).next().map(|b| b.inner_html()))
                .unwrap_or_else(|| doc.root_element().html());
            (body, ContainerSite::General)
        }
    };

    let mut noise: Vec<&str> = COMMON_NOISE.to_vec();
    noise.extend_from_slice(site.extra_noise());
    let cleaned = strip_noise(&area_html, &parse_selectors(&noise));
    let area = Html::parse_fragment(&cleaned);

    let mut paragraphs: Vec<String> = texts_of(&area, "p")
        .into_iter()
        .filter(|(_, t)| t.chars().count() > 20)
        .map(|(_, t)| t)
        .collect();

    for (_, text) in texts_of(&area, "h1, h2, h3, h4, h5, h6") {
        let len = text.chars().count();
        if len > 5 && len < 200 {
            paragraphs.push(format!("[제목] {text}"));
        }
    }

    if paragraphs.len() < 3 {
        debug!(paragraphs = paragraphs.len(), "Few paragraphs; adding div text blocks");
        for (el, text) in texts_of(&area, "div") {
            let len = text.chars().count();
            let children = el.children().filter(|c| c.value().is_element()).count();
            if len > 30 && len < 1000 && children < 5 {
                paragraphs.push(text);
            }
        }
    }

    let mut seen = HashSet::new();
    let unique: Vec<String> = paragraphs
        .iter()
        .map(|p| normalize_whitespace(p))
        .filter(|p| p.chars().count() > 20 && seen.insert(p.clone()))
        .collect();

    let result = unique.join("\n\n");
    info!(
        chars = result.chars().count(),
        paragraphs = unique.len(),
        "Collected general content"
    );
    result
}

/// Whether the document is a Google News page rather than an origin article.
pub fn is_aggregator_page(doc: &Html) -> bool {
    let og_url = first_attr(doc, r#"meta[property="og:url"]"#, "content").unwrap_or_default();
    let title = first_text(doc, "title").unwrap_or_default();
    og_url.contains("news.google.com")
        || title.contains("Google 뉴스")
        || title.contains("Google News")
}

fn is_media_name(text: &str) -> bool {
    MEDIA_NAMES.iter().any(|name| text.contains(name))
}

fn aggregator_title(doc: &Html) -> String {
    const SELECTORS: &[&str] = &[
        "article h1",
        "[data-article-title]",
        ".article-title",
        ".news-article-title",
        "main h1",
        r#"h1[role="heading"]"#,
        ".content h1",
        r#"[aria-label*="제목"]"#,
        r#"[aria-label*="title"]"#,
    ];
    for css in SELECTORS {
        if let Some(title) =
            first_text(doc, css).filter(|t| t.chars().count() > 5 && !is_media_name(t))
        {
            debug!(selector = css, %title, "Aggregator title found");
            return title;
        }
    }

    if let Ok(headings) = Selector::parse("h1, h2, h3") {
        for heading in doc.select(&headings) {
            let text = heading.text().collect::<String>().trim().to_string();
            let len = text.chars().count();
            if len > 10
                && len < 200
                && !is_media_name(&text)
                && !text.contains("구글")
                && !text.contains("Google")
            {
                return text;
            }
        }
    }
    warn!("No usable title on aggregator page");
    AGGREGATOR_TITLE_NOT_FOUND.to_string()
}

fn extract_title(doc: &Html) -> String {
    if is_aggregator_page(doc) {
        return aggregator_title(doc);
    }
    const SELECTORS: &[&str] = &[
        "h1",
        r#"[property="og:title"]"#,
        r#"[name="twitter:title"]"#,
        "title",
        ".article-title",
        ".news-title",
        "#title",
    ];
    for css in SELECTORS {
        if let Some(title) = content_or_text(doc, css).filter(|t| t.chars().count() > 3) {
            return normalize_whitespace(&title);
        }
    }
    TITLE_NOT_FOUND.to_string()
}

/// `content` attribute of the first match, else its text.
fn content_or_text(doc: &Html, css: &str) -> Option<String> {
    let selector = Selector::parse(css).ok()?;
    let el = doc.select(&selector).next()?;
    let raw = el
        .value()
        .attr("content")
        .map(str::to_string)
        .unwrap_or_else(|| el.text().collect::<String>());
    Some(raw.trim().to_string()).filter(|s| !s.is_empty())
}

fn extract_author(doc: &Html) -> String {
    [
        r#"[name="author"]"#,
        r#"[property="article:author"]"#,
        ".author",
        ".byline",
        r#"[rel="author"]"#,
        ".reporter",
        ".writer",
        ".journalist",
    ]
    .iter()
    .find_map(|css| content_or_text(doc, css))
    .map(|a| normalize_whitespace(&a))
    .unwrap_or_default()
}

/// Normalise a free-form date to UTC ISO-8601, if it can be read.
pub fn normalize_date(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::Millis, true));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::Millis, true));
    }
    parse_naver_date(raw)
}

fn extract_publish_date(doc: &Html) -> String {
    const SELECTORS: &[&str] = &[
        r#"[property="article:published_time"]"#,
        r#"[name="publishdate"]"#,
        "time[datetime]",
        ".publish-date",
        ".date",
        ".news-date",
        ".time",
    ];
    for css in SELECTORS {
        let Ok(selector) = Selector::parse(css) else {
            continue;
        };
        let Some(el) = doc.select(&selector).next() else {
            continue;
        };
        let raw = el
            .value()
            .attr("content")
            .or_else(|| el.value().attr("datetime"))
            .map(str::to_string)
            .unwrap_or_else(|| el.text().collect::<String>());
        match normalize_date(&raw) {
            Some(date) => return date,
            None => debug!(selector = css, raw = raw.trim(), "Unreadable date candidate"),
        }
    }
    String::new()
}

fn extract_description(doc: &Html) -> String {
    [
        r#"[property="og:description"]"#,
        r#"[name="description"]"#,
        r#"[name="twitter:description"]"#,
    ]
    .iter()
    .find_map(|css| first_attr(doc, css, "content"))
    .unwrap_or_default()
}

fn extract_metadata(doc: &Html, source_url: &Url, method: ExtractionMethod) -> ArticleMetadata {
    ArticleMetadata {
        domain: bare_domain(source_url).unwrap_or_default(),
        extraction_method: method.label().to_string(),
        timestamp: now_rfc3339(),
        language: first_attr(doc, "html", "lang")
            .or_else(|| first_attr(doc, r#"meta[property="og:locale"]"#, "content")),
        keywords: first_attr(doc, r#"meta[name="keywords"]"#, "content"),
        site: SiteMetadata::General(GeneralMetadata {
            site_name: first_attr(doc, r#"meta[property="og:site_name"]"#, "content"),
            total_elements: count(doc, "*"),
            paragraphs: count(doc, "p"),
            images: count(doc, "img"),
            links: count(doc, "a"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    const PARA: &str = "The committee met on Tuesday to review the proposal in detail and \
                        heard testimony from several regional experts on the matter.";

    fn article_page() -> String {
        format!(
            r#"<html lang="en"><head>
            <title>Committee reviews proposal | Example Times</title>
            <meta property="og:site_name" content="Example Times">
            <meta property="og:description" content="A short summary of the story.">
            <meta name="author" content="Jane Doe">
            <meta property="article:published_time" content="2025-05-06T14:30:00+09:00">
            </head><body>
            <nav><a href="/">Home</a><a href="/world">World</a></nav>
            <article>
              <h1>Committee reviews proposal</h1>
              <p>{PARA}</p>
              <div class="share">Share this story on every social network you know about today</div>
              <p>{PARA} Second paragraph.</p>
              <p>{PARA} Third paragraph.</p>
              <p>Short one.</p>
            </article>
            <footer>Copyright Example Times, all rights reserved forever and ever</footer>
            </body></html>"#
        )
    }

    fn url() -> Url {
        Url::parse("https://www.example.com/news/1").unwrap()
    }

    #[test]
    fn test_require_content_threshold() {
        let article = parse_general_news(&article_page(), &url(), ExtractionMethod::SsrFetch);
        assert!(require_content(article).is_ok());

        let short = parse_general_news(
            "<html><body><p>Too short to count.</p></body></html>",
            &url(),
            ExtractionMethod::SimpleFetch,
        );
        assert!(matches!(
            require_content(short),
            Err(ExtractionError::EmptyContent { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_static_page_uses_every_attempt() {
        let calls = AtomicU32::new(0);
        let page = "<html><head><title>Placeholder</title></head><body></body></html>";
        let target = url();
        let res = RetryPolicy::new(3)
            .run(NAME, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                let article = parse_general_news(page, &target, ExtractionMethod::SimpleFetch);
                async move { require_content(article) }
            })
            .await;
        assert!(matches!(res, Err(ExtractionError::EmptyContent { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_method_labels() {
        assert_eq!(ExtractionMethod::SimpleFetch.to_string(), "Simple Fetch");
        assert!(ExtractionMethod::BrowserForced.is_browser());
        assert!(!ExtractionMethod::SsrFetch.is_browser());
    }

    #[test]
    fn test_ssr_page_detected() {
        let html = article_page();
        assert!(is_ssr_content(&html));
        assert!(!is_spa(&html));
        assert_eq!(classify_static_page(&html), ExtractionMethod::SsrFetch);
    }

    #[test]
    fn test_spa_shell_forces_browser() {
        let html = r#"<html><head><title>App</title></head><body>
            <div id="root"></div>
            <script src="/static/js/chunk.js"></script>
            <noscript>You need to enable JavaScript to run this app.</noscript>
            </body></html>"#;
        assert!(is_spa(html));
        let method = classify_static_page(html);
        assert_eq!(method, ExtractionMethod::BrowserSpa);
        assert!(method.is_browser());
        assert_ne!(method.label(), "Simple Fetch");
    }

    #[test]
    fn test_framework_script_marks_spa() {
        let html = format!(
            "<html><body><p>{PARA}</p><script>window.__vue_app__ = createApp();</script></body></html>"
        );
        assert!(is_spa(&html));
    }

    #[test]
    fn test_tiny_input_is_neither() {
        assert!(!is_ssr_content("<p>hi</p>"));
        assert!(!is_spa("<p>hi</p>"));
    }

    #[test]
    fn test_loading_page_is_not_ssr() {
        let html = format!(
            "<html><body class=\"is-loading\"><article><p>{PARA}</p><p>{PARA}</p><p>{PARA}</p><p>{PARA}</p><p>{PARA}</p></article></body></html>"
        );
        assert!(!is_ssr_content(&html));
    }

    #[test]
    fn test_bot_challenge_needs_two_markers() {
        let html = r#"<html><head><title>Just a moment...</title></head>
            <body><div class="cf-error-details">Ray ID: 123</div></body></html>"#;
        assert!(is_bot_challenge(&Html::parse_document(html), html));

        let single = "<html><body><p>Powered by Cloudflare</p></body></html>";
        assert!(!is_bot_challenge(&Html::parse_document(single), single));
    }

    #[test]
    fn test_parse_article_page() {
        let article = parse_general_news(&article_page(), &url(), ExtractionMethod::SsrFetch);

        assert_eq!(article.title, "Committee reviews proposal");
        assert_eq!(article.author, "Jane Doe");
        assert_eq!(article.publish_date, "2025-05-06T05:30:00.000Z");
        assert_eq!(article.description, "A short summary of the story.");
        assert_eq!(article.performance.method, "SSR/SEO Optimized Fetch");
        assert_eq!(article.metadata.domain, "example.com");
        assert_eq!(article.metadata.language.as_deref(), Some("en"));

        let paragraphs: Vec<&str> = article.content.split("\n\n").collect();
        assert_eq!(paragraphs.len(), 4);
        assert_eq!(paragraphs[0], PARA);
        assert_eq!(paragraphs[3], "[제목] Committee reviews proposal");
        assert!(!article.content.contains("Share this story"));
        assert!(!article.content.contains("Short one"));
        assert!(article.stats.avg_words_per_sentence.is_some());

        match article.metadata.site {
            SiteMetadata::General(meta) => {
                assert_eq!(meta.site_name.as_deref(), Some("Example Times"));
                assert_eq!(meta.paragraphs, 4);
                assert_eq!(meta.links, 2);
            }
            other => panic!("unexpected metadata {other:?}"),
        }
    }

    #[test]
    fn test_higher_priority_container_wins() {
        let long = "x".repeat(150);
        let html = format!(
            r#"<html><body>
            <div class="content"><p>{long} content block that is much longer {long}</p></div>
            <div class="article_view"><p>{long} daum body</p></div>
            </body></html>"#
        );
        let doc = Html::parse_document(&html);
        let (_, css, site) = best_container(&doc).unwrap();
        assert_eq!(css, ".article_view");
        assert_eq!(site, ContainerSite::Daum);
    }

    #[test]
    fn test_container_class_matching_noise_is_kept() {
        let html = format!(
            r#"<html><body><article class="post related"><p>{PARA}</p><div class="share">Share this</div></article></body></html>"#
        );
        let content = extract_general_content(&Html::parse_document(&html));
        assert_eq!(content, PARA);
    }

    #[test]
    fn test_div_blocks_added_when_few_paragraphs() {
        let html = r#"<html><body><main>
            <div>This block of text is long enough to count as a paragraph.</div>
            <div>Another block that stands in for a paragraph on a div-only site.</div>
            </main></body></html>"#;
        let content = extract_general_content(&Html::parse_document(html));
        assert!(content.contains("long enough to count"));
        assert!(content.contains("div-only site"));
    }

    #[test]
    fn test_duplicate_paragraphs_are_dropped() {
        let html = format!("<html><body><article><p>{PARA}</p><p>  {PARA} </p></article></body></html>");
        let content = extract_general_content(&Html::parse_document(&html));
        assert_eq!(content, PARA);
    }

    #[test]
    fn test_aggregator_title_skips_brand_names() {
        let html = r#"<html><head><title>Google News</title></head><body>
            <h1>연합뉴스</h1>
            <h2>Parliament passes the new housing bill after long debate</h2>
            </body></html>"#;
        let doc = Html::parse_document(html);
        assert!(is_aggregator_page(&doc));
        assert_eq!(
            extract_title(&doc),
            "Parliament passes the new housing bill after long debate"
        );
    }

    #[test]
    fn test_aggregator_title_sentinel() {
        let html = r#"<html><head><title>Google 뉴스</title></head><body><h1>구글</h1></body></html>"#;
        assert_eq!(
            extract_title(&Html::parse_document(html)),
            AGGREGATOR_TITLE_NOT_FOUND
        );
    }

    #[test]
    fn test_normalize_date_formats() {
        assert_eq!(
            normalize_date("Tue, 06 May 2025 05:30:00 GMT").as_deref(),
            Some("2025-05-06T05:30:00.000Z")
        );
        assert_eq!(
            normalize_date("2025-05-06T05:30:00Z").as_deref(),
            Some("2025-05-06T05:30:00.000Z")
        );
        assert_eq!(normalize_date("last week"), None);
    }

    #[tokio::test]
    async fn test_close_without_browser_is_noop() {
        let extractor = GeneralExtractor::new();
        assert!(extractor.close().await.is_ok());
        assert!(extractor.close().await.is_ok());
    }
}
