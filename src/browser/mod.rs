//! Headless browser session management.
//!
//! A [`BrowserSession`] owns one Chromium process and, lazily, one browsing
//! context carrying a [`BrowserProfile`]. It is created on first use, kept warm
//! across extractions, relaunched if the process dies, and torn down only by
//! an explicit [`BrowserSession::close`].
//!
//! Each extraction opens its own page inside the shared context, so pages
//! never contend on navigation state. The helpers in this module operate on
//! such a page: sub-resource blocking, human-like interaction, and waiting for
//! redirects and content to settle.

pub mod stealth;

use crate::config::ExtractionOptions;
use crate::error::ExtractionError;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::emulation::{
    SetDeviceMetricsOverrideParams, SetTimezoneOverrideParams, SetTouchEmulationEnabledParams,
    SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::fetch::{
    self, ContinueRequestParams, EventRequestPaused, FailRequestParams, RequestPattern,
};
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchMouseEventParams, DispatchMouseEventType,
};
use chromiumoxide::cdp::browser_protocol::network::{
    self, ErrorReason, Headers, ResourceType, SetExtraHttpHeadersParams,
};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::page::Page;
use futures::StreamExt;
use rand::{Rng, rng};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, info, instrument, warn};

pub use stealth::{BlockRules, BrowserProfile};

/// How a session builds the profile of its browsing context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileKind {
    /// Random user agent and viewport, stealth patches, realistic headers.
    Stealth,
    /// Fixed desktop identity, no patches.
    Plain,
}

impl ProfileKind {
    fn profile(self) -> BrowserProfile {
        match self {
            ProfileKind::Stealth => BrowserProfile::randomized(),
            ProfileKind::Plain => BrowserProfile::plain(),
        }
    }

    fn launch_args(self) -> &'static [&'static str] {
        match self {
            ProfileKind::Stealth => stealth::STEALTH_LAUNCH_ARGS,
            ProfileKind::Plain => stealth::PLAIN_LAUNCH_ARGS,
        }
    }
}

struct LiveBrowser {
    browser: Browser,
    handler: JoinHandle<()>,
    context: Option<(BrowserContextId, BrowserProfile)>,
}

impl LiveBrowser {
    fn is_alive(&self) -> bool {
        !self.handler.is_finished()
    }
}

/// One browser process plus its lazily created browsing context.
pub struct BrowserSession {
    owner: &'static str,
    kind: ProfileKind,
    state: Mutex<Option<LiveBrowser>>,
}

impl std::fmt::Debug for BrowserSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserSession")
            .field("owner", &self.owner)
            .field("kind", &self.kind)
            .finish()
    }
}

impl BrowserSession {
    /// Create an idle session. Nothing is launched until the first page is requested.
    pub fn new(owner: &'static str, kind: ProfileKind) -> Self {
        Self {
            owner,
            kind,
            state: Mutex::new(None),
        }
    }

    /// Whether a browser process is currently running for this session.
    pub async fn is_alive(&self) -> bool {
        self.state.lock().await.as_ref().is_some_and(LiveBrowser::is_alive)
    }

    /// Open a fresh page inside the session's browsing context.
    ///
    /// Launches the browser (or relaunches it if the previous process died)
    /// and creates the browsing context on first use. The returned page already
    /// carries the context's profile.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::ResourceError`] if the browser, context or
    /// page cannot be created.
    #[instrument(level = "debug", skip_all, fields(owner = self.owner))]
    pub async fn new_page(
        &self,
        options: &ExtractionOptions,
    ) -> Result<(Page, BrowserProfile), ExtractionError> {
        let mut state = self.state.lock().await;

        if state.as_ref().is_some_and(|live| !live.is_alive()) {
            warn!(owner = self.owner, "Browser disconnected; relaunching");
            if let Some(dead) = state.take() {
                dead.handler.abort();
            }
        }
        if state.is_none() {
            *state = Some(self.launch(options).await?);
        }
        let live = state
            .as_mut()
            .ok_or_else(|| ExtractionError::ResourceError("browser not running".into()))?;

        if live.context.is_none() {
            let created = live
                .browser
                .execute(CreateBrowserContextParams::default())
                .await
                .map_err(ExtractionError::resource)?;
            let profile = self.kind.profile();
            info!(
                owner = self.owner,
                user_agent = %profile.user_agent,
                width = profile.viewport.width,
                height = profile.viewport.height,
                mobile = profile.is_mobile,
                "Created browsing context"
            );
            live.context = Some((created.result.browser_context_id.clone(), profile));
        }
        let (context_id, profile) = live
            .context
            .clone()
            .ok_or_else(|| ExtractionError::ResourceError("no browsing context".into()))?;

        let mut target = CreateTargetParams::new("about:blank");
        target.browser_context_id = Some(context_id);
        let page = live
            .browser
            .new_page(target)
            .await
            .map_err(ExtractionError::resource)?;
        drop(state);

        apply_profile(&page, &profile).await?;
        Ok((page, profile))
    }

    async fn launch(&self, options: &ExtractionOptions) -> Result<LiveBrowser, ExtractionError> {
        let window = match self.kind {
            ProfileKind::Stealth => BrowserProfile::randomized().viewport,
            ProfileKind::Plain => BrowserProfile::plain().viewport,
        };
        let mut builder = BrowserConfig::builder()
            .viewport(None)
            .request_timeout(options.navigation_timeout())
            .args(self.kind.launch_args().iter().copied())
            .arg(format!("--window-size={},{}", window.width, window.height));
        if let Some(proxy) = &options.proxy {
            info!(owner = self.owner, server = %proxy.server, "Using proxy");
            if proxy.username.is_some() {
                warn!(owner = self.owner, "Proxy credentials are ignored by the browser");
            }
            builder = builder.arg(format!("--proxy-server={}", proxy.server));
        }
        let config = builder.build().map_err(ExtractionError::ResourceError)?;

        info!(owner = self.owner, "Launching headless browser");
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(ExtractionError::resource)?;

        let owner = self.owner;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(owner, error = %e, "Browser handler error");
                }
            }
            debug!(owner, "Browser handler finished");
        });

        Ok(LiveBrowser {
            browser,
            handler,
            context: None,
        })
    }

    /// Tear down the browsing context and the browser process.
    ///
    /// Safe to call repeatedly; a session that was never started or is
    /// already closed is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::ResourceError`] if the browser refused to
    /// close. The session is considered closed either way.
    #[instrument(level = "info", skip_all, fields(owner = self.owner))]
    pub async fn close(&self) -> Result<(), ExtractionError> {
        let Some(mut live) = self.state.lock().await.take() else {
            debug!(owner = self.owner, "Browser already closed");
            return Ok(());
        };

        let mut result = Ok(());
        if live.is_alive() {
            if let Some((context_id, _)) = live.context.take() {
                if let Err(e) = live
                    .browser
                    .execute(DisposeBrowserContextParams::new(context_id))
                    .await
                {
                    debug!(error = %e, "Failed to dispose browsing context");
                }
            }
            if let Err(e) = live.browser.close().await {
                result = Err(ExtractionError::resource(e));
            }
            if let Err(e) = live.browser.wait().await {
                debug!(error = %e, "Failed waiting for browser exit");
            }
        }
        live.handler.abort();
        info!(owner = self.owner, "Browser closed");
        result
    }
}

async fn apply_profile(page: &Page, profile: &BrowserProfile) -> Result<(), ExtractionError> {
    page.execute(SetDeviceMetricsOverrideParams::new(
        i64::from(profile.viewport.width),
        i64::from(profile.viewport.height),
        profile.device_scale_factor,
        profile.is_mobile,
    ))
    .await
    .map_err(ExtractionError::resource)?;

    if profile.has_touch {
        page.execute(SetTouchEmulationEnabledParams::new(true))
            .await
            .map_err(ExtractionError::resource)?;
    }

    let mut ua = SetUserAgentOverrideParams::new(profile.user_agent.clone());
    ua.accept_language = Some(profile.accept_language.to_string());
    page.execute(ua).await.map_err(ExtractionError::resource)?;

    if let Some(tz) = profile.timezone {
        page.execute(SetTimezoneOverrideParams::new(tz))
            .await
            .map_err(ExtractionError::resource)?;
    }

    if !profile.extra_headers.is_empty() {
        page.execute(network::EnableParams::default())
            .await
            .map_err(ExtractionError::resource)?;
        page.execute(SetExtraHttpHeadersParams::new(Headers::new(
            profile.headers_json(),
        )))
        .await
        .map_err(ExtractionError::resource)?;
    }

    if profile.stealth {
        page.execute(AddScriptToEvaluateOnNewDocumentParams::new(
            stealth::STEALTH_SCRIPT,
        ))
        .await
        .map_err(ExtractionError::resource)?;
    }
    Ok(())
}

fn resource_kind(resource_type: &ResourceType) -> &'static str {
    match resource_type {
        ResourceType::Document => "document",
        ResourceType::Stylesheet => "stylesheet",
        ResourceType::Image => "image",
        ResourceType::Media => "media",
        ResourceType::Font => "font",
        ResourceType::Script => "script",
        ResourceType::Other => "other",
        _ => "dynamic",
    }
}

/// Intercept every request of `page` and abort the ones `rules` reject.
///
/// Returns the task answering intercepted requests; abort it once the page is
/// done.
///
/// # Errors
///
/// Returns [`ExtractionError::ResourceError`] if interception cannot be enabled.
pub async fn block_subresources(
    page: &Page,
    rules: BlockRules,
) -> Result<JoinHandle<()>, ExtractionError> {
    let mut paused = page
        .event_listener::<EventRequestPaused>()
        .await
        .map_err(ExtractionError::resource)?;

    page.execute(fetch::EnableParams {
        patterns: Some(vec![RequestPattern {
            url_pattern: Some("*".to_string()),
            resource_type: None,
            request_stage: None,
        }]),
        handle_auth_requests: None,
    })
    .await
    .map_err(ExtractionError::resource)?;

    let page = page.clone();
    Ok(tokio::spawn(async move {
        let mut blocked = 0usize;
        while let Some(event) = paused.next().await {
            let kind = resource_kind(&event.resource_type);
            let outcome = if rules.should_block(kind, &event.request.url) {
                blocked += 1;
                page.execute(FailRequestParams::new(
                    event.request_id.clone(),
                    ErrorReason::BlockedByClient,
                ))
                .await
                .map(|_| ())
            } else {
                page.execute(ContinueRequestParams::new(event.request_id.clone()))
                    .await
                    .map(|_| ())
            };
            if let Err(e) = outcome {
                debug!(error = %e, kind, "Failed to answer intercepted request");
            }
        }
        debug!(blocked, "Request interception finished");
    }))
}

/// Move the mouse, scroll a little and pause for one to three seconds.
pub async fn simulate_human(page: &Page) -> Result<(), ExtractionError> {
    let (x, y, scroll, pause_ms) = {
        let mut r = rng();
        (
            r.random_range(100.0..300.0),
            r.random_range(100.0..300.0),
            r.random_range(0..500u32),
            r.random_range(1000..3000u64),
        )
    };
    page.execute(DispatchMouseEventParams::new(
        DispatchMouseEventType::MouseMoved,
        x,
        y,
    ))
    .await
    .map_err(ExtractionError::resource)?;
    page.evaluate(format!("window.scrollTo(0, {scroll})"))
        .await
        .map_err(ExtractionError::resource)?;
    debug!(x, y, scroll, pause_ms, "Simulated human interaction");
    sleep(Duration::from_millis(pause_ms)).await;
    Ok(())
}

/// Current page URL, or an empty string if the page does not report one.
pub async fn current_url(page: &Page) -> String {
    page.url().await.ok().flatten().unwrap_or_default()
}

/// Wait for redirects to stop and the document to finish loading.
///
/// The URL is considered settled once it has not changed for one second.
/// Waiting is bounded by `limit`; hitting the limit is not an error and the
/// last observed URL is returned.
pub async fn wait_for_settled(page: &Page, limit: Duration) -> String {
    const POLL: Duration = Duration::from_millis(250);
    const STABLE_FOR: Duration = Duration::from_secs(1);

    let start_url = current_url(page).await;
    let deadline = Instant::now() + limit;
    let mut last = start_url.clone();
    let mut stable_since = Instant::now();

    while Instant::now() < deadline {
        sleep(POLL).await;
        let now_url = current_url(page).await;
        if now_url != last {
            debug!(from = %last, to = %now_url, "Redirect observed");
            last = now_url;
            stable_since = Instant::now();
            continue;
        }
        if stable_since.elapsed() >= STABLE_FOR && document_complete(page).await {
            break;
        }
    }
    if last != start_url {
        info!(from = %start_url, to = %last, "Redirect resolved");
    }
    last
}

async fn document_complete(page: &Page) -> bool {
    match page.evaluate("document.readyState").await {
        Ok(v) => v.into_value::<String>().is_ok_and(|s| s == "complete"),
        Err(_) => false,
    }
}

/// Wait until any of `selectors` matches, bounded by `limit`.
///
/// Returns the selector that matched first, or `None` if none appeared in time.
pub async fn wait_for_any_selector(
    page: &Page,
    selectors: &[&str],
    limit: Duration,
) -> Option<String> {
    let probe = format!(
        "(() => {{ const s = {}; for (const q of s) {{ if (document.querySelector(q)) return q; }} return ''; }})()",
        serde_json::to_string(selectors).unwrap_or_else(|_| "[]".to_string())
    );
    let poll = async {
        loop {
            if let Ok(v) = page.evaluate(probe.as_str()).await {
                if let Ok(found) = v.into_value::<String>() {
                    if !found.is_empty() {
                        return found;
                    }
                }
            }
            sleep(Duration::from_millis(250)).await;
        }
    };
    timeout(limit, poll).await.ok()
}

/// Close a page, stopping its interception task first.
pub async fn close_page(page: Page, interception: Option<JoinHandle<()>>) {
    if let Some(task) = interception {
        task.abort();
    }
    if let Err(e) = page.close().await {
        debug!(error = %e, "Failed to close page");
    }
}
