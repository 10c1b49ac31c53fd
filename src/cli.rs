//! Command-line interface definitions for the news extractor.
//!
//! This module defines the CLI arguments using the `clap` crate. Extraction
//! options given on the command line override values from the optional YAML
//! config file; options left out keep the file's (or the default) value.

use crate::config::{OptionOverrides, ProxyConfig};
use crate::feed::DEFAULT_COUNT;
use clap::{Args, Parser, Subcommand};

/// Command-line arguments for the news extractor.
///
/// # Examples
///
/// ```sh
/// # One article
/// news_extract extract https://n.news.naver.com/article/001/0014000001
///
/// # Several URLs, two at a time, results also written under ./json
/// news_extract --json-output-dir ./json batch --concurrency 2 URL1 URL2 URL3
///
/// # Top Korean stories from Google News, then their article text
/// news_extract feed --hl ko --gl KR --count 3 --extract
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML options file
    #[arg(short, long, global = true, env = "NEWS_EXTRACT_CONFIG")]
    pub config: Option<String>,

    /// Also write results as JSON under this directory
    #[arg(short, long, global = true, env = "NEWS_EXTRACT_JSON_DIR")]
    pub json_output_dir: Option<String>,

    #[command(flatten)]
    pub options: OptionArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Extract a single article
    Extract {
        /// Article or Google News link
        url: String,
    },

    /// Extract several articles, continuing past failures
    Batch {
        /// URLs to extract
        #[arg(required_unless_present = "file")]
        urls: Vec<String>,

        /// Read URLs from a file, one per line (`#` starts a comment)
        #[arg(short, long)]
        file: Option<String>,
    },

    /// List Google News RSS items, optionally extracting each one
    Feed {
        /// Interface language, e.g. `ko`, `en`, `zh-Hant`
        #[arg(long, default_value = "ko")]
        hl: String,

        /// Country edition, e.g. `KR`, `US`
        #[arg(long, default_value = "KR")]
        gl: String,

        /// Search keyword instead of top stories
        #[arg(short, long)]
        keyword: Option<String>,

        /// Number of items to keep
        #[arg(short = 'n', long, default_value_t = DEFAULT_COUNT)]
        count: usize,

        /// Extract the article behind every item
        #[arg(long)]
        extract: bool,
    },
}

/// Extraction option flags, shared by every subcommand.
#[derive(Args, Debug, Default, PartialEq, Eq)]
pub struct OptionArgs {
    /// Render with the headless browser even when a static fetch would do
    #[arg(long, global = true)]
    pub force_browser: bool,

    /// Attempts per strategy
    #[arg(long, global = true)]
    pub max_retries: Option<u32>,

    /// Deadline for one attempt, in milliseconds
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    /// Google News requests admitted per minute
    #[arg(long, global = true)]
    pub requests_per_minute: Option<u32>,

    /// URLs extracted at once in a batch
    #[arg(long, global = true)]
    pub concurrency: Option<usize>,

    /// Let the browser load images, fonts and trackers
    #[arg(long, global = true)]
    pub no_block: bool,

    /// Skip mouse and scroll simulation
    #[arg(long, global = true)]
    pub no_human: bool,

    /// Skip the readability pass on rendered pages
    #[arg(long, global = true)]
    pub no_readability: bool,

    /// Proxy server URL for HTTP and browser traffic
    #[arg(long, global = true, env = "NEWS_EXTRACT_PROXY")]
    pub proxy: Option<String>,

    #[arg(long, global = true, env = "NEWS_EXTRACT_PROXY_USERNAME", requires = "proxy")]
    pub proxy_username: Option<String>,

    #[arg(long, global = true, env = "NEWS_EXTRACT_PROXY_PASSWORD", requires = "proxy")]
    pub proxy_password: Option<String>,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl OptionArgs {
    /// Only flags that were actually given become overrides.
    pub fn to_overrides(&self) -> OptionOverrides {
        OptionOverrides {
            force_browser_fetch: self.force_browser.then_some(true),
            timeout_ms: self.timeout_ms,
            max_retries: self.max_retries,
            verbose: self.verbose.then_some(true),
            block_subresources: self.no_block.then_some(false),
            simulate_human: self.no_human.then_some(false),
            proxy: self.proxy.as_ref().map(|server| ProxyConfig {
                server: server.clone(),
                username: self.proxy_username.clone(),
                password: self.proxy_password.clone(),
            }),
            requests_per_minute: self.requests_per_minute,
            use_boilerplate_removal: self.no_readability.then_some(false),
            concurrency: self.concurrency,
            ..Default::default()
        }
    }
}

/// URLs from a batch file: trimmed, blank lines and `#` comments dropped.
pub fn parse_url_list(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}
