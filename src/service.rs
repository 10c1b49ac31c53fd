//! Feed-item content extraction.
//!
//! Runs every [`FeedItem`] through the [`UnifiedExtractor`] and reports one
//! [`NewsContentOutput`] per unique link. Items whose extraction fails keep
//! their feed title, link and date, carry a Korean failure message as content
//! and are flagged with `extractionSuccess: false`.

use crate::config::ExtractionOptions;
use crate::extractors::ArticleExtractor;
use crate::extractors::unified::UnifiedExtractor;
use crate::feed::FeedItem;
use crate::models::UnifiedResult;
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

pub const EMPTY_CONTENT_MESSAGE: &str = "내용 추출에 실패했습니다.";
const ERROR_PREFIX: &str = "추출 오류";

/// Extracted content for one feed item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsContentOutput {
    pub title: String,
    /// Final article address on success, the feed link otherwise.
    pub link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_date: Option<String>,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub extraction_success: bool,
}

impl NewsContentOutput {
    fn failed(item: &FeedItem, content: String) -> Self {
        Self {
            title: item.title.clone(),
            link: item.link.clone(),
            publish_date: item.pub_date.clone(),
            content,
            author: None,
            description: None,
            extraction_success: false,
        }
    }

    fn from_result(item: &FeedItem, result: UnifiedResult) -> Self {
        let article = result.article;
        if !article.has_content() {
            return Self::failed(item, EMPTY_CONTENT_MESSAGE.to_string());
        }
        Self {
            title: non_empty(article.title).unwrap_or_else(|| item.title.clone()),
            link: article.source_url,
            publish_date: non_empty(article.publish_date).or_else(|| item.pub_date.clone()),
            content: article.content,
            author: non_empty(article.author),
            description: non_empty(article.description),
            extraction_success: true,
        }
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() { None } else { Some(s) }
}

/// Extract the article behind every feed item.
///
/// Duplicate links are extracted once. Up to `options.concurrency` items run
/// at a time and the output keeps the feed order.
///
/// # Arguments
///
/// * `extractor` - Router shared across items; the caller closes it afterwards
/// * `items` - Feed items, usually from [`crate::feed::fetch_feed`]
/// * `options` - Options passed to every extraction
///
/// # Returns
///
/// One [`NewsContentOutput`] per unique link. Never fails as a whole.
#[instrument(level = "info", skip_all, fields(items = items.len()))]
pub async fn extract_contents<N, G, D>(
    extractor: &UnifiedExtractor<N, G, D>,
    items: &[FeedItem],
    options: &ExtractionOptions,
) -> Vec<NewsContentOutput>
where
    N: ArticleExtractor,
    G: ArticleExtractor,
    D: ArticleExtractor,
{
    let unique: Vec<&FeedItem> = items.iter().unique_by(|item| item.link.as_str()).collect();
    if unique.len() < items.len() {
        info!(
            dropped = items.len() - unique.len(),
            "Dropped duplicate feed links"
        );
    }

    let outputs: Vec<NewsContentOutput> = stream::iter(unique)
        .map(|item| async move {
            match extractor.extract(&item.link, options).await {
                Ok(result) => NewsContentOutput::from_result(item, result),
                Err(e) => {
                    warn!(link = %item.link, kind = e.kind(), error = %e, "Feed item extraction failed");
                    NewsContentOutput::failed(item, format!("{ERROR_PREFIX}: {e}"))
                }
            }
        })
        .buffered(options.concurrency.max(1))
        .collect()
        .await;

    let succeeded = outputs.iter().filter(|o| o.extraction_success).count();
    info!(
        succeeded,
        failed = outputs.len() - succeeded,
        "Feed content extraction finished"
    );
    outputs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExtractionError;
    use crate::models::{
        ArticleMetadata, ExtractedArticle, GeneralMetadata, Performance, SiteMetadata,
    };
    use crate::utils::{calculate_stats, now_rfc3339};
    use url::Url;

    fn article(url: &Url, content: &str) -> ExtractedArticle {
        ExtractedArticle {
            title: "추출된 제목".into(),
            content: content.into(),
            author: "홍길동".into(),
            publish_date: String::new(),
            description: String::new(),
            source_url: format!("{url}#final"),
            stats: calculate_stats(content, false),
            metadata: ArticleMetadata {
                domain: "example.com".into(),
                extraction_method: "stub".into(),
                timestamp: now_rfc3339(),
                language: None,
                keywords: None,
                site: SiteMetadata::General(GeneralMetadata::default()),
            },
            performance: Performance {
                extraction_time_ms: 0,
                method: "stub".into(),
            },
        }
    }

    /// Fails for URLs containing "broken", returns no text for "blank".
    #[derive(Debug, Default)]
    struct Stub;

    impl ArticleExtractor for Stub {
        fn name(&self) -> &'static str {
            "Stub"
        }

        async fn extract(
            &self,
            url: &Url,
            _options: &ExtractionOptions,
        ) -> Result<ExtractedArticle, ExtractionError> {
            if url.as_str().contains("broken") {
                return Err(ExtractionError::FetchFailure("connection reset".into()));
            }
            if url.as_str().contains("blank") {
                return Ok(article(url, ""));
            }
            Ok(article(url, "본문 내용입니다."))
        }

        async fn close(&self) -> Result<(), ExtractionError> {
            Ok(())
        }
    }

    fn extractor() -> UnifiedExtractor<Stub, Stub, Stub> {
        UnifiedExtractor::with_strategies(Stub, Stub, Stub)
    }

    fn item(title: &str, link: &str) -> FeedItem {
        FeedItem {
            title: title.into(),
            link: link.into(),
            pub_date: Some("Tue, 06 May 2025 05:30:00 GMT".into()),
        }
    }

    #[tokio::test]
    async fn test_successful_item_uses_extracted_fields() {
        let items = vec![item("피드 제목", "https://example.com/a")];
        let out = extract_contents(&extractor(), &items, &ExtractionOptions::default()).await;
        assert_eq!(out.len(), 1);
        let first = &out[0];
        assert!(first.extraction_success);
        assert_eq!(first.title, "추출된 제목");
        assert_eq!(first.link, "https://example.com/a#final");
        assert_eq!(first.author.as_deref(), Some("홍길동"));
        assert!(first.description.is_none());
        assert_eq!(
            first.publish_date.as_deref(),
            Some("Tue, 06 May 2025 05:30:00 GMT")
        );
    }

    #[tokio::test]
    async fn test_failed_item_keeps_feed_fields() {
        let items = vec![item("피드 제목", "https://example.com/broken")];
        let out = extract_contents(&extractor(), &items, &ExtractionOptions::default()).await;
        let first = &out[0];
        assert!(!first.extraction_success);
        assert_eq!(first.title, "피드 제목");
        assert_eq!(first.link, "https://example.com/broken");
        assert!(first.content.starts_with("추출 오류: "));
        assert!(first.content.contains("connection reset"));
        assert!(first.author.is_none());
    }

    #[tokio::test]
    async fn test_invalid_link_is_reported_not_raised() {
        let items = vec![item("상대 경로", "/relative")];
        let out = extract_contents(&extractor(), &items, &ExtractionOptions::default()).await;
        assert!(!out[0].extraction_success);
        assert!(out[0].content.contains("invalid input"));
    }

    #[tokio::test]
    async fn test_blank_article_is_a_failure() {
        let items = vec![item("빈 기사", "https://example.com/blank")];
        let out = extract_contents(&extractor(), &items, &ExtractionOptions::default()).await;
        assert!(!out[0].extraction_success);
        assert!(out[0].content.starts_with("추출 오류: "));
    }

    #[tokio::test]
    async fn test_duplicates_extracted_once_and_order_kept() {
        let items = vec![
            item("하나", "https://example.com/1"),
            item("둘", "https://example.com/broken"),
            item("하나 again", "https://example.com/1"),
            item("셋", "https://example.com/3"),
        ];
        let options = ExtractionOptions {
            concurrency: 2,
            ..Default::default()
        };
        let out = extract_contents(&extractor(), &items, &options).await;
        let links: Vec<&str> = out.iter().map(|o| o.link.as_str()).collect();
        assert_eq!(
            links,
            vec![
                "https://example.com/1#final",
                "https://example.com/broken",
                "https://example.com/3#final"
            ]
        );
    }

    #[test]
    fn test_blank_unified_result_maps_to_failure_message() {
        let feed = item("피드 제목", "https://example.com/a");
        let url = Url::parse(&feed.link).unwrap();
        let result = UnifiedResult {
            article: article(&url, ""),
            unified: crate::models::UnifiedEnvelope {
                detected_site: "example.com".into(),
                extractor_used: "Stub".into(),
                total_extraction_time_ms: 0,
                requested_url: feed.link.clone(),
                timestamp: now_rfc3339(),
                fallback_reason: None,
            },
        };
        let output = NewsContentOutput::from_result(&feed, result);
        assert!(!output.extraction_success);
        assert_eq!(output.content, "내용 추출에 실패했습니다.");
        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["extractionSuccess"], false);
        assert_eq!(json["publishDate"], "Tue, 06 May 2025 05:30:00 GMT");
        assert!(json.get("author").is_none());
    }
}
