//! Utility functions for text normalisation, statistics and URL handling.
//!
//! This module provides helper functions used throughout the crate:
//! - Whitespace normalisation and excerpting for extracted text
//! - Article statistics (characters, words, sentences, reading time)
//! - Domain helpers used for routing and metadata
//! - String truncation for logging

use crate::models::ArticleStats;
use chrono::{SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));
static SENTENCE_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]+").expect("static regex"));
static PARAGRAPH_SPLIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n\s*\n").expect("static regex"));

/// Words read per minute when estimating reading time.
const WORDS_PER_MINUTE: usize = 200;

/// Collapse every whitespace run to a single space and trim the ends.
pub fn normalize_whitespace(s: &str) -> String {
    WHITESPACE.replace_all(s.trim(), " ").into_owned()
}

/// Join the non-empty trimmed lines of `s` into one space-separated line.
///
/// Used for titles, authors and browser-extracted bodies, where layout newlines
/// carry no meaning.
pub fn clean_text(s: &str) -> String {
    let joined = s
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    normalize_whitespace(&joined)
}

/// First `max` characters of `s`, with `"..."` appended when something was cut.
pub fn excerpt(s: &str, max: usize) -> String {
    let mut chars = s.chars();
    let head: String = chars.by_ref().take(max).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

/// Compute [`ArticleStats`] for an extracted body.
///
/// Counts are in characters, not bytes, so Korean text is measured correctly.
/// When `with_averages` is set the per-sentence and per-paragraph averages are
/// filled in as well.
pub fn calculate_stats(text: &str, with_averages: bool) -> ArticleStats {
    let words = text.split_whitespace().count();
    let sentences = SENTENCE_SPLIT
        .split(text)
        .filter(|s| !s.trim().is_empty())
        .count();
    let paragraphs = PARAGRAPH_SPLIT
        .split(text)
        .filter(|p| !p.trim().is_empty())
        .count();

    let (avg_words_per_sentence, avg_sentences_per_paragraph) = if with_averages {
        (
            Some(rounded_div(words, sentences.max(1))),
            Some(rounded_div(sentences, paragraphs.max(1))),
        )
    } else {
        (None, None)
    };

    ArticleStats {
        characters: text.chars().count(),
        characters_no_spaces: text.chars().filter(|c| !c.is_whitespace()).count(),
        words,
        sentences,
        paragraphs,
        reading_time_minutes: words.div_ceil(WORDS_PER_MINUTE),
        avg_words_per_sentence,
        avg_sentences_per_paragraph,
    }
}

fn rounded_div(n: usize, d: usize) -> usize {
    (n + d / 2) / d
}

/// Hostname with a leading `www.` removed.
pub fn bare_domain(url: &Url) -> Option<String> {
    url.host_str()
        .map(|h| h.strip_prefix("www.").unwrap_or(h).to_ascii_lowercase())
}

/// Whether `host` is `domain` itself or one of its subdomains.
pub fn host_matches(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|rest| rest.ends_with('.'))
}

/// Current UTC time as an RFC 3339 string with millisecond precision.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to `max` characters with an ellipsis and
/// byte count indicator appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log("a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((cut, _)) => format!("{}…(+{} bytes)", &s[..cut], s.len() - cut),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_for_log_short_string() {
        let s = "Hello, world!";
        assert_eq!(truncate_for_log(s, 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_multibyte() {
        let s = "가나다라마바사";
        assert_eq!(truncate_for_log(s, 2), "가나…(+15 bytes)");
    }

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  a \n\t b   c "), "a b c");
    }

    #[test]
    fn test_clean_text_joins_lines() {
        assert_eq!(clean_text("Title\n\n   line two \n"), "Title line two");
        assert_eq!(clean_text(""), "");
    }

    #[test]
    fn test_excerpt() {
        assert_eq!(excerpt("abcdef", 3), "abc...");
        assert_eq!(excerpt("abc", 3), "abc");
        assert_eq!(excerpt("한국어 기사", 2), "한국...");
    }

    #[test]
    fn test_calculate_stats() {
        let text = "First sentence here. Second one!\n\nNew paragraph? Yes.";
        let stats = calculate_stats(text, true);
        assert_eq!(stats.words, 8);
        assert_eq!(stats.sentences, 4);
        assert_eq!(stats.paragraphs, 2);
        assert_eq!(stats.reading_time_minutes, 1);
        assert_eq!(stats.characters, text.chars().count());
        assert_eq!(stats.avg_words_per_sentence, Some(2));
        assert_eq!(stats.avg_sentences_per_paragraph, Some(2));
    }

    #[test]
    fn test_calculate_stats_empty() {
        let stats = calculate_stats("", false);
        assert_eq!(stats.words, 0);
        assert_eq!(stats.reading_time_minutes, 0);
        assert_eq!(stats.avg_words_per_sentence, None);
    }

    #[test]
    fn test_bare_domain() {
        let url = Url::parse("https://www.Example.com/a").unwrap();
        assert_eq!(bare_domain(&url).as_deref(), Some("example.com"));
    }

    #[test]
    fn test_host_matches() {
        assert!(host_matches("naver.com", "naver.com"));
        assert!(host_matches("n.news.naver.com", "naver.com"));
        assert!(!host_matches("evilnaver.com", "naver.com"));
        assert!(!host_matches("naver.com.evil.io", "naver.com"));
    }
}
