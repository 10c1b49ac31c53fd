//! Heuristic content scoring over parsed HTML.
//!
//! The scorer itself is a pure function over an [`ElementSnapshot`]: the tag
//! name, class and id attributes, and the (already cleaned) text of one
//! candidate element. Everything that touches a DOM lives in the helpers below
//! it, which turn `scraper` elements into snapshots and strip noise subtrees.
//!
//! # Scoring
//!
//! | Signal                         | Title          | Content              |
//! |--------------------------------|----------------|----------------------|
//! | text length                    | +10 (10-200), +5 (20-100) | +len/100 (>100), +10 (>500) |
//! | tag weight                     | h1 15, h2 12, h3 8, article 15, main 12, section 8, p 5, div 3 | same without headings |
//! | good keyword in class/id (+8)  | title, headline, header | article, content, main, post, story, body, text |
//! | bad keyword in class/id (-10)  | nav, menu, sidebar, footer, header, ad, comment, social, share, related, recommend | same |

use crate::utils::normalize_whitespace;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use tracing::debug;

/// What a candidate element is being scored as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreRole {
    Title,
    Content,
}

/// Immutable view of the attributes the scorer looks at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementSnapshot {
    pub tag: String,
    pub class_name: String,
    pub id: String,
    pub text: String,
}

impl ElementSnapshot {
    /// Snapshot an element using its own trimmed text.
    pub fn of(el: &ElementRef<'_>) -> Self {
        Self::with_text(el, el.text().collect::<String>().trim().to_string())
    }

    /// Snapshot an element's attributes with text computed elsewhere, e.g.
    /// after noise removal.
    pub fn with_text(el: &ElementRef<'_>, text: String) -> Self {
        let value = el.value();
        Self {
            tag: value.name().to_ascii_lowercase(),
            class_name: value.attr("class").unwrap_or_default().to_string(),
            id: value.id().unwrap_or_default().to_string(),
            text,
        }
    }
}

const TITLE_KEYWORDS: &[&str] = &["title", "headline", "header"];
const CONTENT_KEYWORDS: &[&str] = &["article", "content", "main", "post", "story", "body", "text"];
const BAD_KEYWORDS: &[&str] = &[
    "nav",
    "menu",
    "sidebar",
    "footer",
    "header",
    "ad",
    "comment",
    "social",
    "share",
    "related",
    "recommend",
];

fn tag_weight(tag: &str, role: ScoreRole) -> f64 {
    match (tag, role) {
        ("article", _) => 15.0,
        ("main", _) => 12.0,
        ("section", _) => 8.0,
        ("p", _) => 5.0,
        ("div", _) => 3.0,
        ("h1", ScoreRole::Title) => 15.0,
        ("h2", ScoreRole::Title) => 12.0,
        ("h3", ScoreRole::Title) => 8.0,
        _ => 0.0,
    }
}

/// Score a candidate element for the given role. Higher is better.
pub fn score_element(el: &ElementSnapshot, role: ScoreRole) -> f64 {
    let len = el.text.chars().count();
    let mut score = 0.0;

    match role {
        ScoreRole::Title => {
            if len > 10 && len < 200 {
                score += 10.0;
            }
            if len > 20 && len < 100 {
                score += 5.0;
            }
        }
        ScoreRole::Content => {
            if len > 100 {
                score += len as f64 / 100.0;
            }
            if len > 500 {
                score += 10.0;
            }
        }
    }

    score += tag_weight(&el.tag, role);

    let class_name = el.class_name.to_lowercase();
    let id = el.id.to_lowercase();
    let has = |kw: &str| class_name.contains(kw) || id.contains(kw);

    let good = match role {
        ScoreRole::Title => TITLE_KEYWORDS,
        ScoreRole::Content => CONTENT_KEYWORDS,
    };
    score += 8.0 * good.iter().filter(|kw| has(**kw)).count() as f64;
    score -= 10.0 * BAD_KEYWORDS.iter().filter(|kw| has(**kw)).count() as f64;
    score
}

/// Parse a list of CSS selectors, skipping any the parser rejects.
pub fn parse_selectors(raw: &[&str]) -> Vec<Selector> {
    raw.iter().filter_map(|s| Selector::parse(s).ok()).collect()
}

/// Remove every subtree matching one of `noise` from an HTML string.
///
/// Works on the serialised form: the input should come from
/// [`ElementRef::inner_html`] so the noise subtrees serialise the same way and
/// the container itself is never matched.
pub fn strip_noise(html: &str, noise: &[Selector]) -> String {
    let doc = Html::parse_fragment(html);
    let mut result = html.to_string();
    for selector in noise {
        for element in doc.select(selector) {
            let noise_html = element.html();
            if !noise_html.is_empty() {
                result = result.replace(&noise_html, "");
            }
        }
    }
    result
}

/// Trimmed text content of an HTML fragment.
pub fn fragment_text(html: &str) -> String {
    Html::parse_fragment(html)
        .root_element()
        .text()
        .collect::<String>()
        .trim()
        .to_string()
}

fn generate_content_selectors() -> Vec<String> {
    const BASES: &[&str] = &[
        "article", "main", "content", "body", "text", "story", "post", "news", "entry", "excerpt",
    ];
    const PREFIXES: &[&str] = &["", "article-", "post-", "news-", "story-", "content-"];
    const VARIATIONS: &[&str] = &["", "-content", "-body", "-text", "-main"];

    let mut out: Vec<String> = BASES.iter().map(|b| b.to_string()).collect();
    for base in BASES {
        for prefix in PREFIXES {
            for variation in VARIATIONS {
                out.push(format!(".{prefix}{base}{variation}"));
                out.push(format!("#{prefix}{base}{variation}"));
            }
        }
    }
    out.extend(
        [
            r#"[role="article"]"#,
            r#"[role="main"]"#,
            r#"[itemtype*="Article"]"#,
            r#"[class*="article"]"#,
            r#"[class*="content"]"#,
            r#"[class*="post"]"#,
        ]
        .map(String::from),
    );
    let mut seen = HashSet::new();
    out.retain(|s| seen.insert(s.clone()));
    out
}

static CONTENT_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    generate_content_selectors()
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .collect()
});

static TITLE_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    parse_selectors(&[
        "h1",
        "h2",
        "h3",
        r#"[role="heading"]"#,
        ".title",
        ".headline",
        ".header",
        "#title",
        "#headline",
        "#header",
        r#"[class*="title"]"#,
        r#"[class*="headline"]"#,
    ])
});

static CANDIDATE_NOISE: Lazy<Vec<Selector>> = Lazy::new(|| {
    parse_selectors(&[
        "script",
        "style",
        "iframe",
        "noscript",
        "nav",
        ".ad",
        ".advertisement",
        ".banner",
        ".social",
        ".share",
        ".comment",
        ".navigation",
        ".menu",
        ".sidebar",
        ".footer",
        ".header",
        ".related",
        r#"[class*="ad"]"#,
        r#"[id*="ad"]"#,
        r#"[class*="social"]"#,
    ])
});

static AUTHOR_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    parse_selectors(&[
        r#"[rel="author"]"#,
        ".author",
        ".byline",
        ".writer",
        r#"[class*="author"]"#,
        r#"[id*="author"]"#,
        r#"[itemtype*="Person"]"#,
    ])
});

static DATE_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    parse_selectors(&[
        "time",
        "[datetime]",
        ".date",
        ".published",
        ".timestamp",
        r#"[class*="date"]"#,
        r#"[id*="date"]"#,
        r#"[class*="time"]"#,
    ])
});

/// Best guesses produced by [`smart_extract`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SmartExtraction {
    pub title: Option<String>,
    pub content: Option<String>,
    pub author: Option<String>,
    pub publish_date: Option<String>,
    pub title_score: f64,
    pub content_score: f64,
}

/// Rank every title and content candidate in a rendered document.
///
/// Content candidates are cleaned of noise subtrees before scoring and only
/// count with more than 100 characters of text. Ties keep the first candidate
/// seen.
pub fn smart_extract(doc: &Html) -> SmartExtraction {
    let mut out = SmartExtraction {
        title_score: f64::NEG_INFINITY,
        content_score: f64::NEG_INFINITY,
        ..Default::default()
    };

    for selector in TITLE_SELECTORS.iter() {
        for el in doc.select(selector) {
            let snap = ElementSnapshot::of(&el);
            let score = score_element(&snap, ScoreRole::Title);
            if score > out.title_score {
                out.title_score = score;
                out.title = Some(snap.text).filter(|t| !t.is_empty());
            }
        }
    }

    let mut visited = HashSet::new();
    for selector in CONTENT_SELECTORS.iter() {
        for el in doc.select(selector) {
            if !visited.insert(el.id()) {
                continue;
            }
            let cleaned = fragment_text(&strip_noise(&el.inner_html(), &CANDIDATE_NOISE));
            if cleaned.chars().count() <= 100 {
                continue;
            }
            let snap = ElementSnapshot::with_text(&el, cleaned);
            let score = score_element(&snap, ScoreRole::Content);
            if score > out.content_score {
                out.content_score = score;
                out.content = Some(snap.text);
            }
        }
    }

    out.author = AUTHOR_SELECTORS.iter().find_map(|s| {
        doc.select(s)
            .next()
            .map(|el| normalize_whitespace(&el.text().collect::<String>()))
            .filter(|t| !t.is_empty())
    });

    out.publish_date = DATE_SELECTORS.iter().find_map(|s| {
        doc.select(s).next().and_then(|el| {
            el.value()
                .attr("datetime")
                .or_else(|| el.value().attr("content"))
                .map(str::to_string)
                .or_else(|| Some(el.text().collect::<String>().trim().to_string()))
                .filter(|d| !d.is_empty())
        })
    });

    debug!(
        title_score = out.title_score,
        content_score = out.content_score,
        content_chars = out.content.as_ref().map_or(0, |c| c.chars().count()),
        "Smart extraction finished"
    );
    out
}
