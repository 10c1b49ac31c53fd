//! Extraction options and their defaults.
//!
//! Every knob the strategies understand lives in a single [`ExtractionOptions`]
//! struct. Defaults are applied when the struct is deserialised (missing keys
//! fall back to [`Default`]), and partial overrides coming from the command line
//! are merged with [`ExtractionOptions::with_overrides`].
//!
//! Options can also be loaded from a YAML file:
//!
//! ```yaml
//! maxRetries: 2
//! timeoutMs: 30000
//! requestsPerMinute: 6
//! proxy:
//!   server: http://127.0.0.1:8080
//! ```

use crate::error::ExtractionError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

/// Outbound proxy used for both static fetches and the headless browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub server: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Options understood by every extraction strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExtractionOptions {
    /// Skip the static fetch and render with the headless browser straight away.
    pub force_browser_fetch: bool,
    /// Deadline for a single extraction attempt.
    pub timeout_ms: u64,
    /// Total number of attempts the retry controller makes.
    pub max_retries: u32,
    /// Deadline for page navigation and redirect settlement.
    pub navigation_timeout_ms: u64,
    /// Extra wait after the DOM is ready, so late content can render.
    pub content_wait_ms: u64,
    pub verbose: bool,
    /// Abort images, fonts, media and known ad/analytics hosts in the browser.
    pub block_subresources: bool,
    /// Move the mouse, scroll and pause before reading the page.
    pub simulate_human: bool,
    pub proxy: Option<ProxyConfig>,
    /// Requests admitted per rolling 60 second window.
    pub requests_per_minute: u32,
    /// Run the readability pass before the scoring pass.
    pub use_boilerplate_removal: bool,
    /// Batch chunk size.
    pub concurrency: usize,
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        Self {
            force_browser_fetch: false,
            timeout_ms: 45_000,
            max_retries: 3,
            navigation_timeout_ms: 30_000,
            content_wait_ms: 5_000,
            verbose: false,
            block_subresources: true,
            simulate_human: true,
            proxy: None,
            requests_per_minute: 10,
            use_boilerplate_removal: true,
            concurrency: 5,
        }
    }
}

impl ExtractionOptions {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn content_wait(&self) -> Duration {
        Duration::from_millis(self.content_wait_ms)
    }

    /// Reject option values no strategy can work with.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::InvalidInput`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ExtractionError> {
        if self.timeout_ms == 0 {
            return Err(ExtractionError::InvalidInput("timeoutMs must be > 0".into()));
        }
        if self.navigation_timeout_ms == 0 {
            return Err(ExtractionError::InvalidInput(
                "navigationTimeoutMs must be > 0".into(),
            ));
        }
        if self.max_retries == 0 {
            return Err(ExtractionError::InvalidInput("maxRetries must be >= 1".into()));
        }
        if self.requests_per_minute == 0 {
            return Err(ExtractionError::InvalidInput(
                "requestsPerMinute must be >= 1".into(),
            ));
        }
        if self.concurrency == 0 {
            return Err(ExtractionError::InvalidInput("concurrency must be >= 1".into()));
        }
        if let Some(proxy) = &self.proxy {
            Url::parse(&proxy.server).map_err(|e| {
                ExtractionError::InvalidInput(format!("proxy server {:?}: {e}", proxy.server))
            })?;
        }
        Ok(())
    }

    /// Merge a set of partial overrides onto these options.
    pub fn with_overrides(&self, overrides: &OptionOverrides) -> Self {
        let mut merged = self.clone();
        if let Some(v) = overrides.force_browser_fetch {
            merged.force_browser_fetch = v;
        }
        if let Some(v) = overrides.timeout_ms {
            merged.timeout_ms = v;
        }
        if let Some(v) = overrides.max_retries {
            merged.max_retries = v;
        }
        if let Some(v) = overrides.navigation_timeout_ms {
            merged.navigation_timeout_ms = v;
        }
        if let Some(v) = overrides.content_wait_ms {
            merged.content_wait_ms = v;
        }
        if let Some(v) = overrides.verbose {
            merged.verbose = v;
        }
        if let Some(v) = overrides.block_subresources {
            merged.block_subresources = v;
        }
        if let Some(v) = overrides.simulate_human {
            merged.simulate_human = v;
        }
        if let Some(v) = &overrides.proxy {
            merged.proxy = Some(v.clone());
        }
        if let Some(v) = overrides.requests_per_minute {
            merged.requests_per_minute = v;
        }
        if let Some(v) = overrides.use_boilerplate_removal {
            merged.use_boilerplate_removal = v;
        }
        if let Some(v) = overrides.concurrency {
            merged.concurrency = v;
        }
        merged
    }
}

/// Partial options; `None` keeps the base value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OptionOverrides {
    pub force_browser_fetch: Option<bool>,
    pub timeout_ms: Option<u64>,
    pub max_retries: Option<u32>,
    pub navigation_timeout_ms: Option<u64>,
    pub content_wait_ms: Option<u64>,
    pub verbose: Option<bool>,
    pub block_subresources: Option<bool>,
    pub simulate_human: Option<bool>,
    pub proxy: Option<ProxyConfig>,
    pub requests_per_minute: Option<u32>,
    pub use_boilerplate_removal: Option<bool>,
    pub concurrency: Option<usize>,
}

/// Load options from a YAML file, filling missing keys with defaults.
///
/// # Errors
///
/// Returns [`ExtractionError::InvalidInput`] if the file cannot be read or parsed,
/// or if the resulting options fail validation.
#[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
pub async fn load_options(path: impl AsRef<Path>) -> Result<ExtractionOptions, ExtractionError> {
    let raw = tokio::fs::read_to_string(path.as_ref())
        .await
        .map_err(|e| ExtractionError::InvalidInput(format!("config file: {e}")))?;
    let options = parse_options_yaml(&raw)?;
    debug!(?options, "Loaded extraction options");
    Ok(options)
}

/// Parse options from YAML text.
pub fn parse_options_yaml(raw: &str) -> Result<ExtractionOptions, ExtractionError> {
    let options: ExtractionOptions = if raw.trim().is_empty() {
        ExtractionOptions::default()
    } else {
        serde_yaml::from_str(raw)
            .map_err(|e| ExtractionError::InvalidInput(format!("config yaml: {e}")))?
    };
    options.validate()?;
    Ok(options)
}
