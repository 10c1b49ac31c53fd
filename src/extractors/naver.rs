//! Naver News article extractor.
//!
//! Naver serves complete server-rendered article pages, so this strategy never
//! needs a browser. It tries a short list of request identities over plain
//! HTTP, accepts the first response that looks like a real article page, and
//! parses it with site-specific selectors.
//!
//! # Content
//!
//! The body comes from whichever of `#dic_area`, `#newsct_article`,
//! `.go_trans_hide` and `#content` holds the most text, then goes through
//! [`clean_naver_content`], which strips Korean UI chrome and rebuilds the text
//! from real sentences.
//!
//! # Author and date
//!
//! Both follow the same priority chain: JSON-LD, then meta tags, then visible
//! text selectors. Dates are normalised to UTC ISO-8601 by
//! [`parse_naver_date`].

use super::{ArticleExtractor, classify_http_error, count, first_attr, first_text, http_client, json_ld_objects};
use crate::config::ExtractionOptions;
use crate::error::ExtractionError;
use crate::models::{
    ArticleMetadata, ExtractedArticle, NaverMetadata, Performance, SiteMetadata, TITLE_NOT_FOUND,
};
use crate::utils::{bare_domain, calculate_stats, normalize_whitespace, now_rfc3339};
use chrono::{DateTime, Local, NaiveDate, SecondsFormat, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, USER_AGENT};
use scraper::{Html, Selector};
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};
use url::Url;

pub const NAME: &str = "Naver";
const EXTRACTION_METHOD: &str = "Naver News Specialized";
const PERFORMANCE_METHOD: &str = "Naver News Specialized Extractor";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Identities tried in order: declared crawlers first, then a desktop browser.
const IDENTITIES: &[(&str, &str)] = &[
    (
        "Googlebot",
        "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)",
    ),
    (
        "Bingbot",
        "Mozilla/5.0 (compatible; bingbot/2.0; +http://www.bing.com/bingbot.htm)",
    ),
    ("Chrome", crate::browser::stealth::DESKTOP_CHROME_UA),
];

static NEWS_URL_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"^https?://news\.naver\.com",
        r"^https?://n\.news\.naver\.com",
        r"^https?://.*\.naver\.com.*/news",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// Chrome removed before sentence reconstruction, applied in order.
static NOISE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"언론사 구독, 기자 구독.*?더 보기",
        r"네이버에서 제공하는.*?보기",
        r"본 콘텐츠는.*?제공됩니다\.",
        r"번역하기|원문|펼치기|접기|더보기|닫기",
        r"\[앵커\]|\[기자\]|\[리포트\]|\[해설\]",
        r"뉴스홈|스포츠|연예|경제",
        r"이전기사|다음기사|기사목록",
        r"\[광고\]|\[협찬\]|\[PR\]",
        r"공유하기|스크랩|댓글|추천",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

static SYMBOL_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[^A-Za-z0-9_\s가-힣.,!?'"()\-:;]+"#).expect("static regex"));
static SENTENCE_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]+").expect("static regex"));
static NUMERIC_ONLY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9\s\-:]+$").expect("static regex"));

static AUTHOR_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:\(|^)([^()\s]+)\s*기자|(?:^|\s)([가-힣]{2,5})\s*기자(?:\s|$)|(?:^|\s)([가-힣]{2,5})(?:\s*특파원|\s* кореспондент|\s* مراسل)",
    )
    .expect("static regex")
});
static AUTHOR_NOISE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"기자|특파원|입력|수정|사진|영상|PD|앵커|교수|연구원|변호사|위원|대표|원장|사장|작가|\(.*?\)|ⓒ.*",
    )
    .expect("static regex")
});

static DOTTED_DATETIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{4})\.(\d{1,2})\.(\d{1,2})\.?\s*(?:(오전|오후)\s*)?(\d{1,2}):(\d{1,2})")
        .expect("static regex")
});
static DASHED_DATETIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{4})-(\d{1,2})-(\d{1,2})\s*(\d{1,2}):(\d{1,2}):?(\d{1,2})?")
        .expect("static regex")
});
static DOTTED_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{4})\.(\d{1,2})\.(\d{1,2})").expect("static regex"));
static ARTICLE_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/article/(\d+)/(\d+)").expect("static regex"));
static CHARSET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)charset=([^;]+)").expect("static regex"));

/// Plain-HTTP extractor for Naver News pages.
#[derive(Debug, Default)]
pub struct NaverExtractor;

impl NaverExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Whether `url` looks like a Naver News article.
    pub fn is_naver_news_url(url: &str) -> bool {
        NEWS_URL_PATTERNS.iter().any(|p| p.is_match(url))
    }

    /// Fetch the page with each identity until one yields a valid article page.
    #[instrument(level = "info", skip_all, fields(%url))]
    async fn fetch_html(
        &self,
        url: &Url,
        options: &ExtractionOptions,
    ) -> Result<String, ExtractionError> {
        let client = http_client(options, REQUEST_TIMEOUT)?;
        let mut last_error = None;

        for (label, user_agent) in IDENTITIES {
            debug!(identity = label, "Requesting Naver page");
            let response = client
                .get(url.as_str())
                .header(USER_AGENT, *user_agent)
                .header(
                    ACCEPT,
                    "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
                )
                .header(ACCEPT_LANGUAGE, "ko-KR,ko;q=0.9,en;q=0.8")
                .header(CACHE_CONTROL, "no-cache")
                .send()
                .await;

            let body = match response {
                Ok(resp) if resp.status().is_success() => resp.text().await,
                Ok(resp) => {
                    warn!(identity = label, status = %resp.status(), "Naver request rejected");
                    last_error = Some(ExtractionError::FetchFailure(format!(
                        "HTTP {} for {url}",
                        resp.status()
                    )));
                    continue;
                }
                Err(e) => Err(e),
            };

            match body {
                Ok(html) => {
                    let score = validity_score(&html);
                    if score >= 3 {
                        info!(identity = label, score, bytes = html.len(), "Fetched Naver page");
                        return Ok(html);
                    }
                    warn!(identity = label, score, "Response does not look like a Naver article");
                    last_error = Some(ExtractionError::FetchFailure(format!(
                        "{label} response failed validity check ({score}/5)"
                    )));
                }
                Err(e) => {
                    warn!(identity = label, error = %e, "Naver request failed");
                    last_error = Some(classify_http_error(e, REQUEST_TIMEOUT));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            ExtractionError::FetchFailure("no request identity succeeded".into())
        }))
    }
}

impl ArticleExtractor for NaverExtractor {
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
        if !Self::is_naver_news_url(url.as_str()) {
            return Err(ExtractionError::UnsupportedUrl {
                strategy: NAME,
                url: url.to_string(),
            });
        }

        let html = timeout(options.timeout(), self.fetch_html(url, options))
            .await
            .map_err(|_| ExtractionError::Timeout(options.timeout()))??;

        let mut article = parse_naver_news(&html, url);
        article.performance.extraction_time_ms = t0.elapsed().as_millis() as u64;
        info!(
            chars = article.stats.characters,
            elapsed_ms = article.performance.extraction_time_ms,
            "Naver extraction finished"
        );
        Ok(article)
    }

    async fn close(&self) -> Result<(), ExtractionError> {
        Ok(())
    }
}

/// Count how many of the five "real Naver article" indicators hold.
pub fn validity_score(html: &str) -> usize {
    let doc = Html::parse_document(html);
    let indicators = [
        count(&doc, "#dic_area") > 0,
        first_attr(&doc, r#"meta[property="og:url"]"#, "content")
            .is_some_and(|u| u.contains("naver.com")),
        first_text(&doc, "title").is_some_and(|t| t.chars().count() > 5),
        html.contains("뉴스") || html.contains("news"),
        html.encode_utf16().count() > 5000,
    ];
    indicators.iter().filter(|hit| **hit).count()
}

/// Parse a fetched Naver page into an article.
///
/// `performance.extraction_time_ms` is left at zero for the caller to fill in.
pub fn parse_naver_news(html: &str, source_url: &Url) -> ExtractedArticle {
    let doc = Html::parse_document(html);
    let content = extract_content(&doc);
    let stats = calculate_stats(&content, false);

    ExtractedArticle {
        title: extract_title(&doc),
        author: extract_author(&doc),
        publish_date: extract_publish_date(&doc).unwrap_or_default(),
        description: extract_description(&doc),
        source_url: source_url.to_string(),
        stats,
        metadata: extract_metadata(&doc, source_url),
        performance: Performance {
            extraction_time_ms: 0,
            method: PERFORMANCE_METHOD.to_string(),
        },
        content,
    }
}

fn extract_content(doc: &Html) -> String {
    let mut best = String::new();
    let mut best_selector = "";
    for css in ["#dic_area", "#newsct_article", ".go_trans_hide", "#content"] {
        if let Some(text) = first_text(doc, css) {
            debug!(selector = css, chars = text.chars().count(), "Content candidate");
            if text.chars().count() > best.chars().count() {
                best = text;
                best_selector = css;
            }
        }
    }
    if best.is_empty() {
        warn!("No Naver content container found; using body text");
        best = first_text(doc, "body").unwrap_or_default();
        best_selector = "body";
    }
    let cleaned = clean_naver_content(&best);
    info!(
        selector = best_selector,
        raw_chars = best.chars().count(),
        chars = cleaned.chars().count(),
        "Extracted Naver content"
    );
    cleaned
}

/// Strip Naver UI chrome and rebuild the text from real sentences.
///
/// Whitespace is collapsed first so noise patterns see layout-free text.
/// Sentences of ten characters or fewer and purely numeric fragments are
/// dropped; the rest are joined with `". "`. The pass repeats until its output
/// stops changing, so running it on its own output changes nothing.
pub fn clean_naver_content(content: &str) -> String {
    let mut current = normalize_whitespace(content);
    loop {
        let next = clean_pass(&current);
        if next == current {
            return next;
        }
        current = next;
    }
}

// Each changing pass removes at least one non-space character, so the loop
// above terminates.
fn clean_pass(text: &str) -> String {
    let mut cleaned = text.to_string();
    for pattern in NOISE_PATTERNS.iter() {
        cleaned = pattern.replace_all(&cleaned, " ").into_owned();
    }
    cleaned = SYMBOL_RUN.replace_all(&cleaned, " ").into_owned();
    cleaned = normalize_whitespace(&cleaned);

    SENTENCE_END
        .split(&cleaned)
        .map(str::trim)
        .filter(|s| s.chars().count() > 10 && !NUMERIC_ONLY.is_match(s))
        .collect::<Vec<_>>()
        .join(". ")
}

fn extract_title(doc: &Html) -> String {
    const SELECTORS: &[&str] = &[
        r#"meta[property="og:title"]"#,
        r#"meta[name="twitter:title"]"#,
        ".media_end_head_headline",
        "#title_area span",
        ".title",
        "h1",
        "h2",
        "title",
    ];
    for css in SELECTORS {
        let candidate = if css.starts_with("meta") {
            first_attr(doc, css, "content")
        } else {
            first_text(doc, css)
        };
        if let Some(title) = candidate.filter(|t| t.chars().count() > 5) {
            debug!(selector = css, %title, "Found Naver title");
            return normalize_whitespace(&title);
        }
    }
    warn!("No Naver title found");
    TITLE_NOT_FOUND.to_string()
}

fn acceptable_author(name: &str) -> bool {
    let len = name.chars().count();
    len > 1 && len < 50 && !name.contains("네이버") && !name.contains("naver")
}

fn json_ld_author(value: &serde_json::Value) -> Option<String> {
    let author = value.get("author")?;
    let names: Vec<&str> = match author {
        serde_json::Value::Array(items) => items
            .iter()
            .filter_map(|a| a.get("name").and_then(|n| n.as_str()))
            .collect(),
        other => other
            .get("name")
            .and_then(|n| n.as_str())
            .into_iter()
            .collect(),
    };
    names
        .into_iter()
        .map(str::trim)
        .find(|n| acceptable_author(n))
        .map(str::to_string)
}

/// Reduce a byline like `"(서울=연합뉴스) 홍길동 기자"` to the bare name.
pub fn clean_author_text(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let name = AUTHOR_NAME
        .captures(raw)
        .and_then(|c| c.get(1).or_else(|| c.get(2)).or_else(|| c.get(3)))
        .map_or(raw, |m| m.as_str());
    let name = AUTHOR_NOISE.replace_all(name, "");
    let name = name.trim();
    let len = name.chars().count();
    (len > 1 && len < 20 && !name.contains("네이버")).then(|| name.to_string())
}

fn extract_author(doc: &Html) -> String {
    if let Some(name) = json_ld_objects(doc).iter().find_map(json_ld_author) {
        debug!(source = "json-ld", %name, "Found Naver author");
        return name;
    }

    const META: &[&str] = &[
        r#"meta[property="article:author"]"#,
        r#"meta[name="author"]"#,
        r#"meta[name="twitter:creator"]"#,
        r#"meta[property="og:article:author"]"#,
    ];
    for css in META {
        if let Some(name) = first_attr(doc, css, "content").filter(|a| acceptable_author(a)) {
            debug!(source = css, %name, "Found Naver author");
            return name;
        }
    }

    const TEXT: &[&str] = &[
        ".media_end_head_journalist_name",
        ".journalist_name",
        ".byline_p span:first-child",
        ".author",
        ".writer",
        ".reporter",
        ".profile_info .name",
        ".byline",
        ".journalist_info .name",
    ];
    for css in TEXT {
        if let Some(name) = first_text(doc, css).and_then(|t| clean_author_text(&t)) {
            debug!(source = css, %name, "Found Naver author");
            return name;
        }
    }
    warn!("No Naver author found");
    String::new()
}

fn extract_publish_date(doc: &Html) -> Option<String> {
    for value in json_ld_objects(doc) {
        let raw = value
            .get("datePublished")
            .or_else(|| value.get("uploadDate"))
            .and_then(|d| d.as_str());
        if let Some(date) = raw.and_then(parse_naver_date) {
            return Some(date);
        }
    }

    const META: &[&str] = &[
        r#"meta[property="article:published_time"]"#,
        r#"meta[property="og:regDate"]"#,
        r#"meta[name="publishdate"]"#,
        r#"meta[name="DCSext.articlefirstpublished"]"#,
    ];
    for css in META {
        if let Some(date) = first_attr(doc, css, "content").and_then(|d| parse_naver_date(&d)) {
            return Some(date);
        }
    }

    const TEXT: &[&str] = &[
        ".media_end_head_info_datestamp_time._ARTICLE_DATE_TIME",
        ".media_end_head_info_datestamp_time[data-date-time]",
        ".article_info .date",
        ".info_group .date",
        ".byline_p .date",
        ".sponsor_date",
        ".date",
        ".time",
        ".article_header .date_commit_area .date_area .date_info span",
    ];
    for css in TEXT {
        let Ok(selector) = Selector::parse(css) else {
            continue;
        };
        let Some(el) = doc.select(&selector).next() else {
            continue;
        };
        let raw = el
            .value()
            .attr("data-date-time")
            .or_else(|| el.value().attr("data-modify-date-time"))
            .map(str::to_string)
            .unwrap_or_else(|| el.text().collect::<String>());
        if let Some(date) = parse_naver_date(raw.trim()) {
            return Some(date);
        }
    }
    warn!("No Naver publish date found");
    None
}

/// Normalise a Naver date string to UTC ISO-8601, reading zone-less
/// date-times in the local time zone.
pub fn parse_naver_date(raw: &str) -> Option<String> {
    parse_naver_date_in(raw, &Local)
}

/// Normalise a Naver date string to UTC ISO-8601, reading zone-less
/// date-times in `tz`.
///
/// Recognised forms, tried in order:
/// - `2025.05.06. 오후 2:30` (dotted, optional 오전/오후 marker)
/// - `2025-05-06T14:30:00+09:00` (ISO-8601 with offset or `Z`)
/// - `2025-05-06 14:30:00` (dashed, seconds optional)
/// - `2025.05.06` (date only, mapped to midnight UTC of that date)
///
/// Anything else yields `None`.
pub fn parse_naver_date_in<Tz: TimeZone>(raw: &str, tz: &Tz) -> Option<String> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    let num = |c: &regex::Captures<'_>, i: usize| -> Option<u32> {
        c.get(i).and_then(|m| m.as_str().parse().ok())
    };

    if let Some(c) = DOTTED_DATETIME.captures(s) {
        let mut hour = num(&c, 5)?;
        match c.get(4).map(|m| m.as_str()) {
            Some("오후") if hour < 12 => hour += 12,
            Some("오전") if hour == 12 => hour = 0,
            _ => {}
        }
        if let Some(iso) = local_to_iso(tz, num(&c, 1)?, num(&c, 2)?, num(&c, 3)?, hour, num(&c, 6)?, 0) {
            return Some(iso);
        }
    }

    if s.contains('T') && (s.contains('+') || s.contains('Z')) {
        let parsed = DateTime::parse_from_rfc3339(s)
            .or_else(|_| DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%z"))
            .or_else(|_| DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z"));
        if let Ok(dt) = parsed {
            return Some(
                dt.with_timezone(&Utc)
                    .to_rfc3339_opts(SecondsFormat::Millis, true),
            );
        }
    }

    if let Some(c) = DASHED_DATETIME.captures(s) {
        let second = num(&c, 6).unwrap_or(0);
        if let Some(iso) = local_to_iso(tz, num(&c, 1)?, num(&c, 2)?, num(&c, 3)?, num(&c, 4)?, num(&c, 5)?, second) {
            return Some(iso);
        }
    }

    if let Some(c) = DOTTED_DATE.captures(s) {
        let date = NaiveDate::from_ymd_opt(num(&c, 1)? as i32, num(&c, 2)?, num(&c, 3)?)?;
        return Some(format!("{}T00:00:00.000Z", date.format("%Y-%m-%d")));
    }

    debug!(raw, "Unsupported Naver date format");
    None
}

fn local_to_iso<Tz: TimeZone>(
    tz: &Tz,
    year: u32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
) -> Option<String> {
    let local = tz
        .with_ymd_and_hms(year as i32, month, day, hour, minute, second)
        .earliest()?;
    Some(
        local
            .with_timezone(&Utc)
            .to_rfc3339_opts(SecondsFormat::Millis, true),
    )
}

fn extract_description(doc: &Html) -> String {
    [
        r#"meta[property="og:description"]"#,
        r#"meta[name="description"]"#,
        r#"meta[name="twitter:description"]"#,
    ]
    .iter()
    .find_map(|css| first_attr(doc, css, "content").filter(|d| d.chars().count() > 10))
    .unwrap_or_default()
}

/// Article ids from a canonical URL, via `oid`/`aid` query parameters or the
/// `/article/{oid}/{aid}` path form.
pub fn article_ids(canonical: &str) -> (Option<String>, Option<String>) {
    let Ok(url) = Url::parse(canonical) else {
        return (None, None);
    };
    let query = |key: &str| {
        url.query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
            .filter(|v| !v.is_empty())
    };
    match (query("oid"), query("aid")) {
        (None, None) => ARTICLE_PATH
            .captures(url.path())
            .map_or((None, None), |c| {
                (
                    c.get(1).map(|m| m.as_str().to_string()),
                    c.get(2).map(|m| m.as_str().to_string()),
                )
            }),
        ids => ids,
    }
}

fn extract_metadata(doc: &Html, source_url: &Url) -> ArticleMetadata {
    let canonical = first_attr(doc, r#"meta[property="og:url"]"#, "content")
        .unwrap_or_else(|| source_url.to_string());
    let (oid, aid) = article_ids(&canonical);

    let detected_charset = first_attr(doc, "meta[charset]", "charset").or_else(|| {
        first_attr(doc, r#"meta[http-equiv="Content-Type"]"#, "content").and_then(|c| {
            CHARSET
                .captures(&c)
                .and_then(|m| m.get(1))
                .map(|m| m.as_str().trim().to_string())
        })
    });
    let category = first_text(doc, ".media_end_categorize_item")
        .or_else(|| first_text(doc, ".Nlist_item._LNB_ITEM.is_active"));

    ArticleMetadata {
        domain: bare_domain(source_url).unwrap_or_else(|| "news.naver.com".to_string()),
        extraction_method: EXTRACTION_METHOD.to_string(),
        timestamp: now_rfc3339(),
        language: Some(first_attr(doc, "html", "lang").unwrap_or_else(|| "ko".to_string())),
        keywords: first_attr(doc, r#"meta[name="keywords"]"#, "content"),
        site: SiteMetadata::Naver(NaverMetadata {
            oid,
            aid,
            detected_charset,
            category,
        }),
    }
}
