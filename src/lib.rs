//! # News Extract
//!
//! Extracts the readable article behind a news URL: title, body text, author,
//! publication date and statistics, plus metadata describing how it was found.
//!
//! ## Features
//!
//! - Naver News pages fetched over plain HTTP with crawler identities and
//!   Korean-specific noise cleaning
//! - Google News redirect links resolved in a stealth headless browser, with
//!   a per-minute rate limit and retries with exponential backoff
//! - Any other site through static SSR detection, a browser fallback for
//!   client-rendered pages, and a selector cascade over the DOM
//! - A router that falls back to the general strategy once, batch extraction
//!   with bounded concurrency, and a Google News RSS feed client
//!
//! ## Architecture
//!
//! 1. **Routing**: [`extractors::SiteKind`] picks a strategy from the hostname
//! 2. **Fetching**: static HTTP ([`reqwest`]) or a shared [`browser::BrowserSession`]
//! 3. **Parsing**: per-site selectors, readability and [`scoring`]
//! 4. **Output**: [`models::UnifiedResult`] rendered by [`outputs`]
//!
//! ```no_run
//! use news_extract::{ExtractionOptions, UnifiedExtractor};
//!
//! # async fn run() -> Result<(), news_extract::ExtractionError> {
//! let extractor = UnifiedExtractor::new();
//! let result = extractor
//!     .extract("https://n.news.naver.com/article/001/0014000001", &ExtractionOptions::default())
//!     .await?;
//! println!("{}: {} chars", result.article.title, result.article.stats.characters);
//! extractor.close_all().await;
//! # Ok(())
//! # }
//! ```

pub mod browser;
pub mod cli;
pub mod config;
pub mod error;
pub mod extractors;
pub mod feed;
pub mod models;
pub mod outputs;
pub mod rate_limit;
pub mod retry;
pub mod scoring;
pub mod service;
pub mod utils;

pub use config::{ExtractionOptions, OptionOverrides, ProxyConfig};
pub use error::ExtractionError;
pub use extractors::ArticleExtractor;
pub use extractors::unified::UnifiedExtractor;
pub use models::{BatchOutcome, ExtractedArticle, UnifiedResult};
