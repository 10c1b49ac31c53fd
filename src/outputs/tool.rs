//! Tool-response payloads.
//!
//! Every renderer returns a [`ToolResponse`] whose `content` is a list of text
//! parts. Successful extractions are rendered as pretty-printed JSON, feed
//! listings as `title: link` lines, and failures as a single text part with
//! `isError: true`.

use crate::error::ExtractionError;
use crate::feed::FeedItem;
use crate::models::{BatchOutcome, UnifiedResult};
use crate::service::NewsContentOutput;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use tracing::warn;

/// One text part of a tool response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolContent {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

impl ToolContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: "text".to_string(),
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponse {
    pub content: Vec<ToolContent>,
    pub is_error: bool,
}

impl ToolResponse {
    pub fn error(message: impl Display) -> Self {
        Self {
            content: vec![ToolContent::text(message.to_string())],
            is_error: true,
        }
    }

    /// Render a single extraction, or its error.
    pub fn from_extraction(result: &Result<UnifiedResult, ExtractionError>) -> Self {
        match result {
            Ok(res) => Self {
                content: vec![json_part(res)],
                is_error: false,
            },
            Err(e) => Self::error(format!("Error extracting article: {e}")),
        }
    }

    /// Render a batch: one part per result, then one per failed URL.
    ///
    /// Flagged as an error only when no URL succeeded.
    pub fn from_batch(outcome: &BatchOutcome) -> Self {
        let mut content: Vec<ToolContent> = outcome.results.iter().map(json_part).collect();
        content.extend(
            outcome
                .errors
                .iter()
                .map(|e| ToolContent::text(format!("Error extracting {}: {}", e.url, e.error))),
        );
        Self {
            is_error: outcome.results.is_empty() && !outcome.errors.is_empty(),
            content,
        }
    }

    /// Render a feed listing as `title: link` lines.
    pub fn from_feed(result: &Result<Vec<FeedItem>, ExtractionError>) -> Self {
        match result {
            Ok(items) => Self {
                content: items
                    .iter()
                    .map(|item| ToolContent::text(format!("{}: {}", item.title, item.link)))
                    .collect(),
                is_error: false,
            },
            Err(e) => Self::error(format!("Error fetching news: {e}")),
        }
    }

    /// Render extracted feed contents, one JSON part per item.
    pub fn from_contents(outputs: &[NewsContentOutput]) -> Self {
        Self {
            content: outputs.iter().map(json_part).collect(),
            is_error: false,
        }
    }
}

fn json_part<T: Serialize>(value: &T) -> ToolContent {
    match serde_json::to_string_pretty(value) {
        Ok(text) => ToolContent::text(text),
        Err(e) => {
            warn!(error = %e, "Failed to serialise tool payload");
            ToolContent::text(format!("Serialization error: {e}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BatchError;

    #[test]
    fn test_error_response_shape() {
        let response = ToolResponse::from_extraction(&Err(ExtractionError::InvalidInput(
            "\"nope\": relative URL without a base".into(),
        )));
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["isError"], true);
        assert_eq!(json["content"][0]["type"], "text");
        assert!(
            json["content"][0]["text"]
                .as_str()
                .unwrap()
                .starts_with("Error extracting article: invalid input")
        );
    }

    #[test]
    fn test_feed_listing() {
        let items = vec![
            FeedItem {
                title: "금리 동결".into(),
                link: "https://news.google.com/rss/articles/A".into(),
                pub_date: None,
            },
            FeedItem {
                title: "Second".into(),
                link: "https://news.google.com/rss/articles/B".into(),
                pub_date: None,
            },
        ];
        let response = ToolResponse::from_feed(&Ok(items));
        assert!(!response.is_error);
        assert_eq!(response.content.len(), 2);
        assert_eq!(
            response.content[0].text,
            "금리 동결: https://news.google.com/rss/articles/A"
        );
    }

    #[test]
    fn test_feed_error() {
        let response = ToolResponse::from_feed(&Err(ExtractionError::FetchFailure(
            "feed returned 503".into(),
        )));
        assert!(response.is_error);
        assert_eq!(
            response.content[0].text,
            "Error fetching news: fetch failed: feed returned 503"
        );
    }

    #[test]
    fn test_batch_with_only_failures_is_an_error() {
        let outcome = BatchOutcome {
            results: vec![],
            errors: vec![BatchError {
                url: "not a url".into(),
                error: "invalid input: bad".into(),
            }],
        };
        let response = ToolResponse::from_batch(&outcome);
        assert!(response.is_error);
        assert_eq!(
            response.content[0].text,
            "Error extracting not a url: invalid input: bad"
        );
    }

    #[test]
    fn test_empty_batch_is_not_an_error() {
        let response = ToolResponse::from_batch(&BatchOutcome::default());
        assert!(!response.is_error);
        assert!(response.content.is_empty());
    }

    #[test]
    fn test_contents_are_json_parts() {
        let outputs = vec![NewsContentOutput {
            title: "제목".into(),
            link: "https://example.com/a".into(),
            publish_date: None,
            content: "본문".into(),
            author: None,
            description: None,
            extraction_success: true,
        }];
        let response = ToolResponse::from_contents(&outputs);
        let parsed: serde_json::Value = serde_json::from_str(&response.content[0].text).unwrap();
        assert_eq!(parsed["extractionSuccess"], true);
        assert_eq!(parsed["title"], "제목");
    }
}
