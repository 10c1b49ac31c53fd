//! Google News redirect extractor.
//!
//! Google News article links (`news.google.com/rss/articles/...`) only resolve
//! to the publisher after JavaScript runs, and the redirect page fingerprints
//! automated clients. This strategy drives a stealth headless browser through
//! the redirect and extracts the origin article from the rendered DOM.
//!
//! # Attempt
//!
//! 1. Wait for the rate limiter to admit the request
//! 2. Open a page in the shared stealth context, blocking heavy sub-resources
//! 3. Navigate, optionally simulate a human, wait for the redirect to settle
//! 4. Run readability over the DOM; below 100 characters, fall back to
//!    [`smart_extract`]
//!
//! Attempts are wrapped in the per-attempt timeout and retried with
//! exponential backoff until `maxRetries` is spent.

use super::{ArticleExtractor, first_attr};
use crate::browser::stealth::REDIRECT_BLOCK_RULES;
use crate::browser::{
    BrowserSession, ProfileKind, block_subresources, close_page, simulate_human,
    wait_for_settled,
};
use crate::config::ExtractionOptions;
use crate::error::ExtractionError;
use crate::extractors::general::normalize_date;
use crate::models::{
    ArticleMetadata, ExtractedArticle, GoogleNewsMetadata, Performance, SiteMetadata,
};
use crate::rate_limit::RateLimiter;
use crate::retry::RetryPolicy;
use crate::scoring::smart_extract;
use crate::utils::{bare_domain, calculate_stats, clean_text, excerpt, now_rfc3339};
use dom_smoothie::{Config, Readability};
use scraper::Html;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, instrument, warn};
use url::Url;

pub const NAME: &str = "GoogleNews";
const EXTRACTOR_TYPE: &str = "enhanced-google-news";
const PERFORMANCE_METHOD: &str = "Enhanced Google News Extractor";
const UNTITLED: &str = "제목 없음";

/// Minimum characters for an extraction pass to count.
const MIN_CONTENT_CHARS: usize = 100;
const DESCRIPTION_CHARS: usize = 200;

/// Which pass produced the article text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionSource {
    Readability,
    SmartExtract,
}

impl ExtractionSource {
    pub fn label(self) -> &'static str {
        match self {
            ExtractionSource::Readability => "Browser+Readability",
            ExtractionSource::SmartExtract => "Browser+SmartExtract",
        }
    }
}

/// Raw fields from one extraction pass, before cleaning.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Candidate {
    pub title: String,
    pub content: String,
    pub author: String,
    pub publish_date: String,
}

/// Stealth-browser extractor for Google News redirect links.
#[derive(Debug)]
pub struct GoogleNewsExtractor {
    session: BrowserSession,
    limiter: Mutex<Arc<RateLimiter>>,
}

impl Default for GoogleNewsExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl GoogleNewsExtractor {
    pub fn new() -> Self {
        Self {
            session: BrowserSession::new(NAME, ProfileKind::Stealth),
            limiter: Mutex::new(Arc::new(RateLimiter::new(
                ExtractionOptions::default().requests_per_minute,
            ))),
        }
    }

    /// The limiter for `requests_per_minute`, rebuilt if the rate changed.
    fn limiter_for(&self, requests_per_minute: u32) -> Arc<RateLimiter> {
        let mut slot = self.limiter.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.max_per_window() != requests_per_minute.max(1) as usize {
            debug!(requests_per_minute, "Rate changed; resetting limiter window");
            *slot = Arc::new(RateLimiter::new(requests_per_minute));
        }
        Arc::clone(&slot)
    }

    /// Load `url` in a fresh stealth page and return the settled URL and DOM.
    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn render(
        &self,
        url: &Url,
        options: &ExtractionOptions,
    ) -> Result<(String, String), ExtractionError> {
        let (page, profile) = self.session.new_page(options).await?;
        debug!(user_agent = %profile.user_agent, "Opened stealth page");

        let interception = if options.block_subresources {
            match block_subresources(&page, REDIRECT_BLOCK_RULES).await {
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

            if options.simulate_human {
                if let Err(e) = simulate_human(&page).await {
                    debug!(error = %e, "Human simulation failed");
                }
            }
            let final_url = wait_for_settled(&page, options.navigation_timeout()).await;
            sleep(options.content_wait()).await;
            let html = page.content().await.map_err(ExtractionError::fetch)?;
            Ok((final_url, html))
        }
        .await;

        close_page(page, interception).await;
        rendered
    }

    async fn attempt(
        &self,
        url: &Url,
        options: &ExtractionOptions,
        attempt: u32,
    ) -> Result<ExtractedArticle, ExtractionError> {
        let (final_url, html) = self.render(url, options).await?;
        let final_url = if final_url.is_empty() {
            url.to_string()
        } else {
            final_url
        };
        info!(attempt, %final_url, bytes = html.len(), "Page rendered");
        parse_rendered_page(&html, url, &final_url, options.use_boilerplate_removal, attempt)
    }
}

impl ArticleExtractor for GoogleNewsExtractor {
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
        let limiter = self.limiter_for(options.requests_per_minute);
        let policy = RetryPolicy::new(options.max_retries);

        let (mut article, attempts) = policy
            .run(NAME, |attempt| {
                let limiter = Arc::clone(&limiter);
                async move {
                    limiter.acquire().await;
                    debug!(attempt, max = options.max_retries, "Google News attempt");
                    timeout(options.timeout(), self.attempt(url, options, attempt))
                        .await
                        .map_err(|_| ExtractionError::Timeout(options.timeout()))?
                }
            })
            .await?;

        article.performance.extraction_time_ms = t0.elapsed().as_millis() as u64;
        info!(
            attempts,
            source_url = %article.source_url,
            chars = article.stats.characters,
            elapsed_ms = article.performance.extraction_time_ms,
            "Google News extraction finished"
        );
        Ok(article)
    }

    async fn close(&self) -> Result<(), ExtractionError> {
        self.session.close().await
    }
}

/// Run the readability pass over rendered HTML.
///
/// Returns `None` when readability finds no article.
pub fn readability_pass(html: &str, url: &str) -> Option<Candidate> {
    let cfg = Config {
        max_elements_to_parse: 9000,
        ..Default::default()
    };
    let mut readability = match Readability::new(html, Some(url), Some(cfg)) {
        Ok(r) => r,
        Err(e) => {
            debug!(error = %e, "Readability could not read the document");
            return None;
        }
    };
    match readability.parse() {
        Ok(article) => Some(Candidate {
            title: article.title.to_string(),
            content: article.text_content.to_string(),
            author: article.byline.map(|b| b.to_string()).unwrap_or_default(),
            publish_date: article
                .published_time
                .map(|d| d.to_string())
                .unwrap_or_default(),
        }),
        Err(e) => {
            debug!(error = %e, "Readability found no article");
            None
        }
    }
}

/// Run the scoring pass over rendered HTML.
pub fn smart_pass(html: &str) -> Candidate {
    let found = smart_extract(&Html::parse_document(html));
    Candidate {
        title: found.title.unwrap_or_default(),
        content: found.content.unwrap_or_default(),
        author: found.author.unwrap_or_default(),
        publish_date: found.publish_date.unwrap_or_default(),
    }
}

/// Pick the first pass that yields enough text.
///
/// Readability runs first when `use_readability` is set; the scoring pass runs
/// when it is disabled, fails, or returns under 100 characters.
pub fn extract_candidate(
    html: &str,
    final_url: &str,
    use_readability: bool,
) -> (Candidate, ExtractionSource) {
    if use_readability {
        match readability_pass(html, final_url) {
            Some(c) if c.content.trim().chars().count() >= MIN_CONTENT_CHARS => {
                debug!(chars = c.content.chars().count(), "Readability accepted");
                return (c, ExtractionSource::Readability);
            }
            Some(c) => info!(
                chars = c.content.chars().count(),
                "Readability result too short; using smart extraction"
            ),
            None => info!("Readability failed; using smart extraction"),
        }
    }
    (smart_pass(html), ExtractionSource::SmartExtract)
}

/// Turn a rendered page into an article.
///
/// # Errors
///
/// Returns [`ExtractionError::EmptyContent`] unless the cleaned body is longer
/// than 100 characters.
pub fn parse_rendered_page(
    html: &str,
    requested_url: &Url,
    final_url: &str,
    use_readability: bool,
    attempt: u32,
) -> Result<ExtractedArticle, ExtractionError> {
    let (candidate, source) = extract_candidate(html, final_url, use_readability);
    let content = clean_text(&candidate.content);
    let chars = content.chars().count();
    if chars <= MIN_CONTENT_CHARS {
        warn!(chars, source = source.label(), "Extracted content too short");
        return Err(ExtractionError::EmptyContent { chars });
    }

    let title = match clean_text(&candidate.title) {
        t if t.is_empty() => UNTITLED.to_string(),
        t => t,
    };
    let doc = Html::parse_document(html);
    let domain = Url::parse(final_url)
        .ok()
        .and_then(|u| bare_domain(&u))
        .unwrap_or_default();

    Ok(ExtractedArticle {
        title,
        author: clean_text(&candidate.author),
        publish_date: normalize_date(&candidate.publish_date).unwrap_or_default(),
        description: excerpt(&content, DESCRIPTION_CHARS),
        source_url: final_url.to_string(),
        stats: calculate_stats(&content, false),
        metadata: ArticleMetadata {
            domain,
            extraction_method: source.label().to_string(),
            timestamp: now_rfc3339(),
            language: first_attr(&doc, "html", "lang"),
            keywords: first_attr(&doc, r#"meta[name="keywords"]"#, "content"),
            site: SiteMetadata::GoogleNews(GoogleNewsMetadata {
                final_url: final_url.to_string(),
                original_url: requested_url.to_string(),
                extracted_from: source.label().to_string(),
                extractor_type: EXTRACTOR_TYPE.to_string(),
                attempts: attempt,
                use_boilerplate_removal: use_readability,
                content_length: chars,
            }),
        },
        performance: Performance {
            extraction_time_ms: 0,
            method: PERFORMANCE_METHOD.to_string(),
        },
        content,
    })
}
