//! Data models for extraction requests and their results.
//!
//! This module defines the core data structures used throughout the crate:
//! - [`ExtractionRequest`]: a validated URL plus the options to extract it with
//! - [`ExtractedArticle`]: the normalised article a strategy produces
//! - [`UnifiedResult`]: an article wrapped in the router's [`UnifiedEnvelope`]
//! - [`BatchOutcome`]: successes and per-URL failures of a batch run
//!
//! Field names serialise as camelCase so the JSON handed to the tool server
//! matches what its clients already expect.

use crate::config::ExtractionOptions;
use crate::error::ExtractionError;
use serde::{Deserialize, Serialize};
use url::Url;

/// Sentinel title used when no candidate passes the title filters.
pub const TITLE_NOT_FOUND: &str = "제목을 찾을 수 없습니다";

/// A URL that has already been checked, plus the options for extracting it.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    pub url: Url,
    pub options: ExtractionOptions,
}

impl ExtractionRequest {
    /// Validate the URL and options up front.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::InvalidInput`] if the URL is not an absolute
    /// http(s) URL or the options fail validation.
    pub fn new(url: &str, options: ExtractionOptions) -> Result<Self, ExtractionError> {
        let parsed = Url::parse(url.trim())
            .map_err(|e| ExtractionError::InvalidInput(format!("{url:?}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
            return Err(ExtractionError::InvalidInput(format!(
                "{url:?}: expected an absolute http(s) URL"
            )));
        }
        options.validate()?;
        Ok(Self {
            url: parsed,
            options,
        })
    }
}

/// Text statistics computed over the extracted body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleStats {
    pub characters: usize,
    pub characters_no_spaces: usize,
    pub words: usize,
    pub sentences: usize,
    pub paragraphs: usize,
    pub reading_time_minutes: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_words_per_sentence: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_sentences_per_paragraph: Option<usize>,
}

/// Fields only the Naver strategy fills in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NaverMetadata {
    pub oid: Option<String>,
    pub aid: Option<String>,
    pub detected_charset: Option<String>,
    pub category: Option<String>,
}

/// Fields only the Google News redirect strategy fills in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleNewsMetadata {
    pub final_url: String,
    pub original_url: String,
    pub extracted_from: String,
    pub extractor_type: String,
    pub attempts: u32,
    pub use_boilerplate_removal: bool,
    pub content_length: usize,
}

/// Fields only the general strategy fills in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneralMetadata {
    pub site_name: Option<String>,
    pub total_elements: usize,
    pub paragraphs: usize,
    pub images: usize,
    pub links: usize,
}

/// Strategy-specific metadata, flattened into [`ArticleMetadata`] on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SiteMetadata {
    Naver(NaverMetadata),
    GoogleNews(GoogleNewsMetadata),
    General(GeneralMetadata),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleMetadata {
    pub domain: String,
    pub extraction_method: String,
    /// RFC 3339 timestamp of when the article was parsed.
    pub timestamp: String,
    pub language: Option<String>,
    pub keywords: Option<String>,
    #[serde(flatten)]
    pub site: SiteMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Performance {
    pub extraction_time_ms: u64,
    pub method: String,
}

/// A normalised article as returned by any strategy.
///
/// `content` is never absent: on failure strategies return an error instead of
/// an article, and a successful article may still carry an empty string, which
/// the router treats as "no content".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedArticle {
    pub title: String,
    pub content: String,
    pub author: String,
    /// ISO-8601, or empty when no date could be read.
    pub publish_date: String,
    pub description: String,
    /// The real origin URL, which may differ from the requested one after redirects.
    pub source_url: String,
    pub stats: ArticleStats,
    pub metadata: ArticleMetadata,
    pub performance: Performance,
}

impl ExtractedArticle {
    pub fn has_content(&self) -> bool {
        !self.content.is_empty()
    }
}

/// Router bookkeeping attached to every successful extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedEnvelope {
    pub detected_site: String,
    pub extractor_used: String,
    pub total_extraction_time_ms: u64,
    pub requested_url: String,
    pub timestamp: String,
    /// Set only when the general strategy ran after a specific one failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedResult {
    #[serde(flatten)]
    pub article: ExtractedArticle,
    pub unified: UnifiedEnvelope,
}

/// A URL that failed inside a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchError {
    pub url: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub results: Vec<UnifiedResult>,
    pub errors: Vec<BatchError>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_article() -> ExtractedArticle {
        ExtractedArticle {
            title: "Test Article".to_string(),
            content: "Body".to_string(),
            author: "홍길동".to_string(),
            publish_date: "2025-05-06T05:30:00.000Z".to_string(),
            description: String::new(),
            source_url: "https://n.news.naver.com/article/001/0000001".to_string(),
            stats: ArticleStats::default(),
            metadata: ArticleMetadata {
                domain: "news.naver.com".to_string(),
                extraction_method: "Naver News Specialized".to_string(),
                timestamp: "2025-05-06T05:31:00Z".to_string(),
                language: Some("ko".to_string()),
                keywords: None,
                site: SiteMetadata::Naver(NaverMetadata {
                    oid: Some("001".to_string()),
                    aid: Some("0000001".to_string()),
                    ..Default::default()
                }),
            },
            performance: Performance {
                extraction_time_ms: 120,
                method: "Naver News Specialized Extractor".to_string(),
            },
        }
    }

    #[test]
    fn test_request_rejects_relative_url() {
        let err = ExtractionRequest::new("/news/1", ExtractionOptions::default()).unwrap_err();
        assert!(matches!(err, ExtractionError::InvalidInput(_)));
    }

    #[test]
    fn test_request_rejects_non_http_scheme() {
        let err =
            ExtractionRequest::new("ftp://example.com/a", ExtractionOptions::default()).unwrap_err();
        assert!(matches!(err, ExtractionError::InvalidInput(_)));
    }

    #[test]
    fn test_request_accepts_absolute_url() {
        let req =
            ExtractionRequest::new(" https://example.com/a ", ExtractionOptions::default()).unwrap();
        assert_eq!(req.url.host_str(), Some("example.com"));
    }

    #[test]
    fn test_metadata_flattens_site_fields() {
        let json = serde_json::to_value(sample_article()).unwrap();
        assert_eq!(json["metadata"]["oid"], "001");
        assert_eq!(json["metadata"]["extractionMethod"], "Naver News Specialized");
        assert_eq!(json["publishDate"], "2025-05-06T05:30:00.000Z");
    }

    #[test]
    fn test_unified_result_serialization() {
        let result = UnifiedResult {
            article: sample_article(),
            unified: UnifiedEnvelope {
                detected_site: "Naver".to_string(),
                extractor_used: "Naver".to_string(),
                total_extraction_time_ms: 150,
                requested_url: "https://n.news.naver.com/article/001/0000001".to_string(),
                timestamp: "2025-05-06T05:31:00Z".to_string(),
                fallback_reason: None,
            },
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["title"], "Test Article");
        assert_eq!(json["unified"]["detectedSite"], "Naver");
        assert!(json["unified"].get("fallbackReason").is_none());
    }

    #[test]
    fn test_has_content() {
        let mut article = sample_article();
        assert!(article.has_content());
        article.content.clear();
        assert!(!article.has_content());
    }
}
