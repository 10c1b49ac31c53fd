//! Error taxonomy shared by every extraction strategy.
//!
//! Strategies return `Result<_, ExtractionError>` and the router decides what
//! to do from the variant alone: [`ExtractionError::InvalidInput`] is surfaced
//! immediately, everything else is eligible for retry and, at the router level,
//! for a single fallback to the general strategy.

use std::time::Duration;
use thiserror::Error;

/// Everything that can go wrong while extracting an article.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Malformed URL or option value. Never retried.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A site strategy was handed a URL it does not serve.
    #[error("unsupported url for {strategy}: {url}")]
    UnsupportedUrl { strategy: &'static str, url: String },

    /// Network failure or non-2xx response.
    #[error("fetch failed: {0}")]
    FetchFailure(String),

    /// Anti-automation markers were detected on the page.
    #[error("bot challenge detected at {0}")]
    BotChallenge(String),

    /// The page parsed but yielded too little article text.
    #[error("extracted content too short ({chars} chars)")]
    EmptyContent { chars: usize },

    /// A deadline was exceeded.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The browser session could not be created or crashed.
    #[error("browser resource error: {0}")]
    ResourceError(String),
}

impl ExtractionError {
    /// Whether the retry controller may attempt the operation again.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            ExtractionError::InvalidInput(_) | ExtractionError::UnsupportedUrl { .. }
        )
    }

    /// Short machine-readable kind, used in logs and batch error entries.
    pub fn kind(&self) -> &'static str {
        match self {
            ExtractionError::InvalidInput(_) => "invalid_input",
            ExtractionError::UnsupportedUrl { .. } => "unsupported_url",
            ExtractionError::FetchFailure(_) => "fetch_failure",
            ExtractionError::BotChallenge(_) => "bot_challenge",
            ExtractionError::EmptyContent { .. } => "empty_content",
            ExtractionError::Timeout(_) => "timeout",
            ExtractionError::ResourceError(_) => "resource_error",
        }
    }

    pub(crate) fn resource(e: impl std::fmt::Display) -> Self {
        ExtractionError::ResourceError(e.to_string())
    }

    pub(crate) fn fetch(e: impl std::fmt::Display) -> Self {
        ExtractionError::FetchFailure(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_input_is_not_retryable() {
        assert!(!ExtractionError::InvalidInput("bad url".into()).is_retryable());
        assert!(
            !ExtractionError::UnsupportedUrl {
                strategy: "Naver",
                url: "https://naver.com".into()
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_transient_errors_are_retryable() {
        assert!(ExtractionError::FetchFailure("503".into()).is_retryable());
        assert!(ExtractionError::Timeout(Duration::from_secs(45)).is_retryable());
        assert!(ExtractionError::EmptyContent { chars: 12 }.is_retryable());
        assert!(ExtractionError::BotChallenge("https://x.test".into()).is_retryable());
        assert!(ExtractionError::ResourceError("crashed".into()).is_retryable());
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(ExtractionError::EmptyContent { chars: 0 }.kind(), "empty_content");
        assert_eq!(
            ExtractionError::Timeout(Duration::from_millis(10)).kind(),
            "timeout"
        );
    }

    #[test]
    fn test_every_kind_is_distinct() {
        let kinds = [
            ExtractionError::InvalidInput("x".into()).kind(),
            ExtractionError::UnsupportedUrl {
                strategy: "Naver",
                url: "https://x.test".into(),
            }
            .kind(),
            ExtractionError::FetchFailure("x".into()).kind(),
            ExtractionError::BotChallenge("x".into()).kind(),
            ExtractionError::EmptyContent { chars: 0 }.kind(),
            ExtractionError::Timeout(Duration::ZERO).kind(),
            ExtractionError::ResourceError("x".into()).kind(),
        ];
        let unique: std::collections::HashSet<_> = kinds.iter().collect();
        assert_eq!(unique.len(), kinds.len());
    }

    #[test]
    fn test_display_messages() {
        let e = ExtractionError::EmptyContent { chars: 42 };
        assert_eq!(e.to_string(), "extracted content too short (42 chars)");
    }
}
