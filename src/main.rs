//! # News Extract
//!
//! Command-line client for the extraction pipeline. Results are printed to
//! stdout as a tool-response payload (`{content: [{type, text}], isError}`);
//! logs go to stderr.
//!
//! ## Usage
//!
//! ```sh
//! news_extract extract https://news.google.com/rss/articles/CBMi...
//! news_extract batch --file urls.txt -j ./json
//! news_extract feed --hl en --gl US --keyword rust --extract
//! ```

use clap::Parser;
use news_extract::cli::{Cli, Command, parse_url_list};
use news_extract::config::{ExtractionOptions, load_options};
use news_extract::feed::{FeedQuery, fetch_feed};
use news_extract::outputs::json::{ensure_writable_dir, write_results};
use news_extract::outputs::tool::ToolResponse;
use news_extract::service::extract_contents;
use news_extract::utils::truncate_for_log;
use news_extract::UnifiedExtractor;
use serde::Serialize;
use std::error::Error;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Cli::parse();

    // --- Tracing init ---
    let default_level = if args.options.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tfmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("news_extract starting up");
    debug!(command = ?args.command, config = ?args.config, "Parsed CLI arguments");

    let base = match &args.config {
        Some(path) => load_options(path).await?,
        None => ExtractionOptions::default(),
    };
    let options = base.with_overrides(&args.options.to_overrides());
    options.validate()?;
    debug!(?options, "Effective extraction options");

    // Early check: ensure JSON output dir is writable
    if let Some(dir) = &args.json_output_dir {
        if let Err(e) = ensure_writable_dir(dir).await {
            error!(
                path = %dir,
                error = %e,
                "JSON output directory is not writable (fix perms or choose a different path)"
            );
            return Err(e);
        }
    }

    let extractor = UnifiedExtractor::new();
    let response = run(&extractor, &args, &options).await;
    extractor.close_all().await;
    let response = response?;

    println!("{}", serde_json::to_string_pretty(&response)?);

    let elapsed = start_time.elapsed();
    info!(
        elapsed_secs = elapsed.as_secs_f64(),
        parts = response.content.len(),
        is_error = response.is_error,
        "news_extract finished"
    );

    if response.is_error {
        return Err("extraction failed".into());
    }
    Ok(())
}

async fn run(
    extractor: &UnifiedExtractor,
    args: &Cli,
    options: &ExtractionOptions,
) -> Result<ToolResponse, Box<dyn Error>> {
    let json_dir = args.json_output_dir.as_deref();

    match &args.command {
        Command::Extract { url } => {
            let result = extractor.extract(url, options).await;
            match &result {
                Ok(res) => {
                    debug!(
                        title = %res.article.title,
                        preview = %truncate_for_log(&res.article.content, 200),
                        "Extracted article"
                    );
                    persist(res, json_dir).await;
                }
                Err(e) => warn!(%url, kind = e.kind(), error = %e, "Extraction failed"),
            }
            Ok(ToolResponse::from_extraction(&result))
        }
        Command::Batch { urls, file } => {
            let mut all = urls.clone();
            if let Some(path) = file {
                let raw = tokio::fs::read_to_string(path).await?;
                all.extend(parse_url_list(&raw));
            }
            info!(count = all.len(), "Extracting batch");
            let outcome = extractor.extract_batch(&all, options).await;
            persist(&outcome, json_dir).await;
            Ok(ToolResponse::from_batch(&outcome))
        }
        Command::Feed {
            hl,
            gl,
            keyword,
            count,
            extract,
        } => {
            let mut query = FeedQuery::new(hl, gl).with_count(*count);
            if let Some(keyword) = keyword {
                query = query.with_keyword(keyword);
            }
            let items = fetch_feed(&query, options).await;
            if let (Ok(list), true) = (&items, *extract) {
                let contents = extract_contents(extractor, list, options).await;
                persist(&contents, json_dir).await;
                return Ok(ToolResponse::from_contents(&contents));
            }
            if let Ok(list) = &items {
                persist(list, json_dir).await;
            }
            Ok(ToolResponse::from_feed(&items))
        }
    }
}

/// Write results when a JSON directory was given; failures are logged only.
async fn persist<T: Serialize>(value: &T, json_dir: Option<&str>) {
    let Some(dir) = json_dir else {
        return;
    };
    if let Err(e) = write_results(value, dir).await {
        error!(error = %e, path = %dir, "Failed to write JSON results");
    }
}
