//! The router: picks a strategy per URL, falls back to the general strategy,
//! and runs batches.
//!
//! # Fallback
//!
//! | Selected strategy result      | Outcome                                              |
//! |-------------------------------|------------------------------------------------------|
//! | article with content          | returned as is                                       |
//! | article without content       | general strategy runs, `fallbackReason` = "… 콘텐츠 없음" |
//! | error (not `InvalidInput`)    | general strategy runs, `fallbackReason` = "… 추출 실패: …" |
//! | `InvalidInput`                | surfaced immediately                                 |
//!
//! A failure of the general strategy itself, or an article without content
//! from it, is terminal.
//!
//! # Batches
//!
//! URLs are processed in chunks of `concurrency`. The URLs of a chunk run
//! concurrently; chunks run one after another. Each URL's failure becomes a
//! [`BatchError`] and never aborts the batch.

use super::general::GeneralExtractor;
use super::google_news::GoogleNewsExtractor;
use super::naver::NaverExtractor;
use super::{ArticleExtractor, SiteKind, detect_site};
use crate::config::ExtractionOptions;
use crate::error::ExtractionError;
use crate::models::{
    BatchError, BatchOutcome, ExtractedArticle, ExtractionRequest, UnifiedEnvelope, UnifiedResult,
};
use crate::utils::now_rfc3339;
use futures::future::join_all;
use std::time::Instant;
use tracing::{error, info, instrument, warn};

/// Routes URLs to the Naver, Google News or general strategy.
///
/// Generic over the strategies so tests can substitute their own; production
/// code uses the defaults via [`UnifiedExtractor::new`].
#[derive(Debug)]
pub struct UnifiedExtractor<
    N = NaverExtractor,
    G = GoogleNewsExtractor,
    D = GeneralExtractor,
> {
    naver: N,
    google: G,
    general: D,
}

impl UnifiedExtractor {
    pub fn new() -> Self {
        Self::with_strategies(
            NaverExtractor::new(),
            GoogleNewsExtractor::new(),
            GeneralExtractor::new(),
        )
    }
}

impl Default for UnifiedExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl<N, G, D> UnifiedExtractor<N, G, D>
where
    N: ArticleExtractor,
    G: ArticleExtractor,
    D: ArticleExtractor,
{
    pub fn with_strategies(naver: N, google: G, general: D) -> Self {
        Self {
            naver,
            google,
            general,
        }
    }

    /// Extract one URL.
    ///
    /// # Arguments
    ///
    /// * `url` - Absolute http(s) URL of the article or redirect link
    /// * `options` - Extraction options shared by every strategy
    ///
    /// # Returns
    ///
    /// The article wrapped in a [`UnifiedEnvelope`].
    ///
    /// # Errors
    ///
    /// - [`ExtractionError::InvalidInput`] for a malformed URL or options
    /// - The general strategy's error when it fails
    /// - [`ExtractionError::EmptyContent`] when the general strategy finds no text
    #[instrument(level = "info", skip_all, fields(%url))]
    pub async fn extract(
        &self,
        url: &str,
        options: &ExtractionOptions,
    ) -> Result<UnifiedResult, ExtractionError> {
        let request = ExtractionRequest::new(url, options.clone())?;
        self.extract_request(&request).await
    }

    /// Extract an already validated request.
    pub async fn extract_request(
        &self,
        request: &ExtractionRequest,
    ) -> Result<UnifiedResult, ExtractionError> {
        let t0 = Instant::now();
        let url = &request.url;
        let options = &request.options;
        let kind = SiteKind::for_url(url);
        let detected_site = detect_site(url);
        info!(%url, strategy = %kind, %detected_site, "Routing extraction");

        let primary = match kind {
            SiteKind::Naver => Some((self.naver.name(), self.naver.extract(url, options).await)),
            SiteKind::GoogleNews => {
                Some((self.google.name(), self.google.extract(url, options).await))
            }
            SiteKind::General => None,
        };

        let (article, extractor_used, fallback_reason) = match primary {
            Some((name, Ok(article))) if article.has_content() => (article, name, None),
            Some((_, Err(e @ ExtractionError::InvalidInput(_)))) => return Err(e),
            Some((name, outcome)) => {
                let reason = match outcome {
                    Ok(_) => format!("{name} 추출기 콘텐츠 없음"),
                    Err(e) => format!("{name} 추출 실패: {e}"),
                };
                warn!(%url, reason = %reason, "Falling back to the general strategy");
                let article = self.run_general(url, options).await?;
                (article, self.general.name(), Some(reason))
            }
            None => (self.run_general(url, options).await?, self.general.name(), None),
        };

        let total_extraction_time_ms = t0.elapsed().as_millis() as u64;
        info!(
            %url,
            extractor = extractor_used,
            fallback = fallback_reason.is_some(),
            chars = article.stats.characters,
            total_ms = total_extraction_time_ms,
            "Extraction complete"
        );
        Ok(UnifiedResult {
            article,
            unified: UnifiedEnvelope {
                detected_site,
                extractor_used: extractor_used.to_string(),
                total_extraction_time_ms,
                requested_url: url.to_string(),
                timestamp: now_rfc3339(),
                fallback_reason,
            },
        })
    }

    async fn run_general(
        &self,
        url: &url::Url,
        options: &ExtractionOptions,
    ) -> Result<ExtractedArticle, ExtractionError> {
        let article = self.general.extract(url, options).await.inspect_err(|e| {
            error!(%url, kind = e.kind(), error = %e, "General strategy failed");
        })?;
        if !article.has_content() {
            error!(%url, "General strategy found no content");
            return Err(ExtractionError::EmptyContent {
                chars: article.content.chars().count(),
            });
        }
        Ok(article)
    }

    /// Extract many URLs, `options.concurrency` at a time.
    ///
    /// Never fails as a whole: every URL ends up either in `results` or, with
    /// its error message, in `errors`.
    #[instrument(level = "info", skip_all, fields(urls = urls.len()))]
    pub async fn extract_batch<S: AsRef<str>>(
        &self,
        urls: &[S],
        options: &ExtractionOptions,
    ) -> BatchOutcome {
        let chunk_size = options.concurrency.max(1);
        let mut outcome = BatchOutcome::default();

        for (index, chunk) in urls.chunks(chunk_size).enumerate() {
            info!(chunk = index + 1, size = chunk.len(), "Processing batch chunk");
            let settled = join_all(chunk.iter().map(|url| async move {
                let url = url.as_ref();
                (url, self.extract(url, options).await)
            }))
            .await;

            for (url, result) in settled {
                match result {
                    Ok(res) => outcome.results.push(res),
                    Err(e) => {
                        warn!(%url, kind = e.kind(), error = %e, "Batch item failed");
                        outcome.errors.push(BatchError {
                            url: url.to_string(),
                            error: e.to_string(),
                        });
                    }
                }
            }
        }

        info!(
            succeeded = outcome.results.len(),
            failed = outcome.errors.len(),
            "Batch finished"
        );
        outcome
    }

    /// Release every strategy's browser resources.
    ///
    /// Failures are logged and swallowed so shutdown always completes.
    pub async fn close_all(&self) {
        for (name, result) in [
            (self.google.name(), self.google.close().await),
            (self.general.name(), self.general.close().await),
            (self.naver.name(), self.naver.close().await),
        ] {
            if let Err(e) = result {
                warn!(strategy = name, error = %e, "Failed to release strategy resources");
            }
        }
        info!("All extractors closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ArticleMetadata, GeneralMetadata, Performance, SiteMetadata};
    use crate::utils::calculate_stats;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use url::Url;

    #[derive(Debug, Clone, Copy)]
    enum Behaviour {
        Content,
        Empty,
        Fail,
        FailWhen(&'static str),
    }

    #[derive(Debug)]
    struct Fake {
        name: &'static str,
        behaviour: Behaviour,
        calls: AtomicUsize,
        closes: AtomicUsize,
    }

    impl Fake {
        fn new(name: &'static str, behaviour: Behaviour) -> Self {
            Self {
                name,
                behaviour,
                calls: AtomicUsize::new(0),
                closes: AtomicUsize::new(0),
            }
        }
    }

    fn article(url: &Url, content: &str) -> ExtractedArticle {
        ExtractedArticle {
            title: "Title".into(),
            content: content.into(),
            author: String::new(),
            publish_date: String::new(),
            description: String::new(),
            source_url: url.to_string(),
            stats: calculate_stats(content, false),
            metadata: ArticleMetadata {
                domain: url.host_str().unwrap_or_default().into(),
                extraction_method: "fake".into(),
                timestamp: now_rfc3339(),
                language: None,
                keywords: None,
                site: SiteMetadata::General(GeneralMetadata::default()),
            },
            performance: Performance {
                extraction_time_ms: 1,
                method: "fake".into(),
            },
        }
    }

    impl ArticleExtractor for Fake {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn extract(
            &self,
            url: &Url,
            _options: &ExtractionOptions,
        ) -> Result<ExtractedArticle, ExtractionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behaviour {
                Behaviour::Content => Ok(article(url, &format!("{} body", self.name))),
                Behaviour::Empty => Ok(article(url, "")),
                Behaviour::Fail => Err(ExtractionError::FetchFailure("boom".into())),
                Behaviour::FailWhen(needle) if url.as_str().contains(needle) => {
                    Err(ExtractionError::FetchFailure(format!("{needle} is down")))
                }
                Behaviour::FailWhen(_) => Ok(article(url, "general body")),
            }
        }

        async fn close(&self) -> Result<(), ExtractionError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            if matches!(self.behaviour, Behaviour::Fail) {
                return Err(ExtractionError::ResourceError("already gone".into()));
            }
            Ok(())
        }
    }

    fn router(naver: Behaviour, google: Behaviour, general: Behaviour) -> UnifiedExtractor<Fake, Fake, Fake> {
        UnifiedExtractor::with_strategies(
            Fake::new("Naver", naver),
            Fake::new("GoogleNews", google),
            Fake::new("General", general),
        )
    }

    const NAVER_URL: &str = "https://n.news.naver.com/article/001/0014000001";
    const GOOGLE_URL: &str = "https://news.google.com/rss/articles/CBMiabc";
    const OTHER_URL: &str = "https://www.bbc.com/news/world-1";

    #[tokio::test]
    async fn test_specific_strategy_success_has_no_fallback() {
        let r = router(Behaviour::Content, Behaviour::Content, Behaviour::Content);
        let res = r.extract(NAVER_URL, &ExtractionOptions::default()).await.unwrap();
        assert_eq!(res.unified.detected_site, "Naver");
        assert_eq!(res.unified.extractor_used, "Naver");
        assert_eq!(res.unified.requested_url, NAVER_URL);
        assert!(res.unified.fallback_reason.is_none());
        assert_eq!(r.general.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failure_falls_back_once() {
        let r = router(Behaviour::Content, Behaviour::Fail, Behaviour::Content);
        let res = r.extract(GOOGLE_URL, &ExtractionOptions::default()).await.unwrap();
        assert_eq!(res.unified.detected_site, "GoogleNews");
        assert_eq!(res.unified.extractor_used, "General");
        assert_eq!(
            res.unified.fallback_reason.as_deref(),
            Some("GoogleNews 추출 실패: fetch failed: boom")
        );
        assert_eq!(r.google.calls.load(Ordering::SeqCst), 1);
        assert_eq!(r.general.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_content_falls_back() {
        let r = router(Behaviour::Empty, Behaviour::Content, Behaviour::Content);
        let res = r.extract(NAVER_URL, &ExtractionOptions::default()).await.unwrap();
        assert_eq!(res.unified.fallback_reason.as_deref(), Some("Naver 추출기 콘텐츠 없음"));
        assert_eq!(res.article.content, "General body");
    }

    #[tokio::test]
    async fn test_general_route_never_sets_fallback_reason() {
        let r = router(Behaviour::Content, Behaviour::Content, Behaviour::Content);
        let res = r.extract(OTHER_URL, &ExtractionOptions::default()).await.unwrap();
        assert_eq!(res.unified.detected_site, "bbc.com");
        assert_eq!(res.unified.extractor_used, "General");
        assert!(res.unified.fallback_reason.is_none());
        assert_eq!(r.naver.calls.load(Ordering::SeqCst), 0);
        assert_eq!(r.google.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_general_failure_is_terminal() {
        let r = router(Behaviour::Fail, Behaviour::Content, Behaviour::Fail);
        let err = r.extract(NAVER_URL, &ExtractionOptions::default()).await.unwrap_err();
        assert!(matches!(err, ExtractionError::FetchFailure(_)));
        assert_eq!(r.general.calls.load(Ordering::SeqCst), 1);

        let r = router(Behaviour::Content, Behaviour::Content, Behaviour::Empty);
        let err = r.extract(OTHER_URL, &ExtractionOptions::default()).await.unwrap_err();
        assert!(matches!(err, ExtractionError::EmptyContent { chars: 0 }));
    }

    #[tokio::test]
    async fn test_invalid_url_is_rejected_before_routing() {
        let r = router(Behaviour::Content, Behaviour::Content, Behaviour::Content);
        let err = r.extract("not a url", &ExtractionOptions::default()).await.unwrap_err();
        assert!(matches!(err, ExtractionError::InvalidInput(_)));
        assert_eq!(r.general.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_batch_isolates_failures_in_every_chunking() {
        let urls = [
            "https://a.example/1",
            "https://broken.example/2",
            "https://c.example/3",
        ];
        for concurrency in 1..=3 {
            let r = router(
                Behaviour::Content,
                Behaviour::Content,
                Behaviour::FailWhen("broken.example"),
            );
            let options = ExtractionOptions {
                concurrency,
                ..Default::default()
            };
            let outcome = r.extract_batch(&urls, &options).await;
            assert_eq!(outcome.results.len(), 2, "concurrency {concurrency}");
            assert_eq!(outcome.errors.len(), 1, "concurrency {concurrency}");
            assert_eq!(outcome.errors[0].url, "https://broken.example/2");
            assert_eq!(outcome.results[0].unified.requested_url, "https://a.example/1");
            assert_eq!(outcome.results[1].unified.requested_url, "https://c.example/3");
        }
    }

    #[tokio::test]
    async fn test_batch_reports_invalid_urls() {
        let r = router(Behaviour::Content, Behaviour::Content, Behaviour::Content);
        let outcome = r
            .extract_batch(&["https://a.example/1", "::nope::"], &ExtractionOptions::default())
            .await;
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.errors[0].url, "::nope::");
        assert!(outcome.errors[0].error.starts_with("invalid input"));
    }

    #[tokio::test]
    async fn test_close_all_swallows_errors_and_is_repeatable() {
        let r = router(Behaviour::Content, Behaviour::Fail, Behaviour::Content);
        r.close_all().await;
        r.close_all().await;
        assert_eq!(r.google.closes.load(Ordering::SeqCst), 2);
        assert_eq!(r.general.closes.load(Ordering::SeqCst), 2);
    }
}
