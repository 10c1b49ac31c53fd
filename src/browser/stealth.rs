//! Fingerprint profiles and anti-automation patches for the headless browser.
//!
//! A [`BrowserProfile`] is chosen once per browsing context and applied to
//! every page opened in it: viewport and device flags, user agent, locale,
//! timezone, a realistic set of request headers and, for stealth profiles, the
//! [`STEALTH_SCRIPT`] injected before any page script runs.
//!
//! [`BlockRules`] decide which sub-resources a page may load.

use rand::seq::IndexedRandom;
use rand::{Rng, rng};

/// Desktop user agents rotated per browsing context.
pub const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:123.0) Gecko/20100101 Firefox/123.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:123.0) Gecko/20100101 Firefox/123.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36 Edg/122.0.0.0",
];

/// Generic desktop Chrome identity used by plain profiles and static fetches.
pub const DESKTOP_CHROME_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

pub const VIEWPORTS: &[Viewport] = &[
    Viewport { width: 1920, height: 1080 },
    Viewport { width: 1366, height: 768 },
    Viewport { width: 1536, height: 864 },
    Viewport { width: 1440, height: 900 },
    Viewport { width: 1280, height: 720 },
];

const ACCEPT_LANGUAGE: &str = "ko-KR,ko;q=0.9,en-US;q=0.8,en;q=0.7";

/// Headers a real Chrome sends on a top-level navigation. `Accept-Encoding`
/// and `Connection` are left to the browser.
pub const REALISTIC_HEADERS: &[(&str, &str)] = &[
    (
        "Accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8",
    ),
    ("Accept-Language", ACCEPT_LANGUAGE),
    ("DNT", "1"),
    ("Upgrade-Insecure-Requests", "1"),
    ("Sec-Fetch-Dest", "document"),
    ("Sec-Fetch-Mode", "navigate"),
    ("Sec-Fetch-Site", "none"),
    ("Sec-Fetch-User", "?1"),
    ("Cache-Control", "max-age=0"),
    (
        "sec-ch-ua",
        r#""Google Chrome";v="123", "Not:A-Brand";v="8", "Chromium";v="123""#,
    ),
    ("sec-ch-ua-mobile", "?0"),
    ("sec-ch-ua-platform", r#""Windows""#),
];

/// Launch flags that hide the most obvious automation switches.
pub const STEALTH_LAUNCH_ARGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--disable-features=VizDisplayCompositor,site-per-process",
    "--no-sandbox",
    "--disable-setuid-sandbox",
    "--disable-dev-shm-usage",
    "--disable-web-security",
    "--no-first-run",
    "--no-default-browser-check",
    "--disable-default-apps",
    "--disable-popup-blocking",
    "--disable-translate",
    "--disable-background-timer-throttling",
    "--disable-renderer-backgrounding",
    "--disable-backgrounding-occluded-windows",
    "--disable-ipc-flooding-protection",
    "--disable-extensions",
    "--disable-plugins",
];

/// Launch flags for the plain rendering browser.
pub const PLAIN_LAUNCH_ARGS: &[&str] = &[
    "--no-sandbox",
    "--disable-setuid-sandbox",
    "--disable-dev-shm-usage",
    "--disable-gpu",
    "--disable-features=VizDisplayCompositor",
];

/// Patches applied to every document before its own scripts run.
pub const STEALTH_SCRIPT: &str = r#"
(() => {
  Object.defineProperty(navigator, 'webdriver', { get: () => false });
  delete window.cdc_adoQpoasnfa76pfcZLmcfl_Array;
  delete window.cdc_adoQpoasnfa76pfcZLmcfl_Promise;
  delete window.cdc_adoQpoasnfa76pfcZLmcfl_Symbol;

  const now = () => Date.now() / 1000 - Math.random();
  window.chrome = {
    runtime: {},
    loadTimes: () => ({
      commitLoadTime: now(),
      finishDocumentLoadTime: now(),
      finishLoadTime: now(),
      firstPaintAfterLoadTime: 0,
      firstPaintTime: now(),
      navigationType: 'Other',
      numTabsInSession: Math.floor(Math.random() * 10) + 1,
      requestTime: now(),
      startLoadTime: now(),
    }),
    csi: () => ({
      onloadT: Date.now(),
      pageT: Math.random() * 1000,
      tran: Math.floor(Math.random() * 20),
    }),
    app: {},
  };

  Object.defineProperty(navigator, 'plugins', {
    get: () => [
      { 0: { type: 'application/x-google-chrome-pdf', suffixes: 'pdf', description: 'Portable Document Format' },
        name: 'Chrome PDF Plugin', filename: 'internal-pdf-viewer', description: 'Portable Document Format' },
      { 0: { type: 'application/pdf', suffixes: 'pdf', description: 'Portable Document Format' },
        name: 'Chrome PDF Viewer', filename: 'mhjfbmdgcfjbbpaeojofohoefgiehjai', description: 'Portable Document Format' },
      { 0: { type: 'application/x-nacl', suffixes: '', description: 'Native Client Executable' },
        name: 'Native Client', filename: 'internal-nacl-plugin', description: 'Native Client' },
    ],
  });

  Object.defineProperty(navigator, 'languages', { get: () => ['ko-KR', 'ko', 'en-US', 'en'] });

  if (navigator.permissions && navigator.permissions.query) {
    const originalQuery = navigator.permissions.query.bind(navigator.permissions);
    navigator.permissions.query = (parameters) =>
      parameters.name === 'notifications'
        ? Promise.resolve({ state: Notification.permission })
        : originalQuery(parameters);
  }

  if ('getBattery' in navigator) {
    delete Navigator.prototype.getBattery;
  }

  Object.defineProperty(navigator, 'hardwareConcurrency', {
    get: () => 4 + Math.floor(Math.random() * 4),
  });

  if ('deviceMemory' in navigator) {
    Object.defineProperty(navigator, 'deviceMemory', {
      get: () => [4, 8, 16][Math.floor(Math.random() * 3)],
    });
  }
})();
"#;

/// Everything a browsing context pretends to be.
#[derive(Debug, Clone, PartialEq)]
pub struct BrowserProfile {
    pub user_agent: String,
    pub viewport: Viewport,
    pub device_scale_factor: f64,
    pub has_touch: bool,
    pub is_mobile: bool,
    pub accept_language: &'static str,
    pub timezone: Option<&'static str>,
    pub extra_headers: &'static [(&'static str, &'static str)],
    /// Inject [`STEALTH_SCRIPT`] into every new document.
    pub stealth: bool,
}

impl BrowserProfile {
    /// A randomised profile drawn from the user-agent and viewport pools.
    pub fn randomized() -> Self {
        let mut r = rng();
        let user_agent = USER_AGENTS.choose(&mut r).unwrap_or(&USER_AGENTS[0]);
        let viewport = *VIEWPORTS.choose(&mut r).unwrap_or(&VIEWPORTS[0]);
        Self {
            user_agent: (*user_agent).to_string(),
            viewport,
            device_scale_factor: if r.random_bool(0.5) { 1.0 } else { 2.0 },
            has_touch: r.random_bool(0.5),
            is_mobile: r.random_bool(0.7),
            accept_language: ACCEPT_LANGUAGE,
            timezone: Some("Asia/Seoul"),
            extra_headers: REALISTIC_HEADERS,
            stealth: true,
        }
    }

    /// A fixed desktop profile without patches or extra headers.
    pub fn plain() -> Self {
        Self {
            user_agent: DESKTOP_CHROME_UA.to_string(),
            viewport: VIEWPORTS[0],
            device_scale_factor: 1.0,
            has_touch: false,
            is_mobile: false,
            accept_language: ACCEPT_LANGUAGE,
            timezone: None,
            extra_headers: &[],
            stealth: false,
        }
    }

    /// Extra headers as the JSON object the DevTools protocol expects.
    pub fn headers_json(&self) -> serde_json::Value {
        let map = self
            .extra_headers
            .iter()
            .map(|(k, v)| ((*k).to_string(), serde_json::Value::from(*v)))
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(map)
    }
}

/// Which sub-resources a page is not allowed to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRules {
    /// Lower-case resource types, e.g. `image`.
    pub resource_types: &'static [&'static str],
    /// URL substrings of hosts whose requests are always aborted.
    pub url_substrings: &'static [&'static str],
}

/// Rules for aggregator redirects: static assets plus ad/analytics hosts.
pub const REDIRECT_BLOCK_RULES: BlockRules = BlockRules {
    resource_types: &["image", "stylesheet", "font", "media"],
    url_substrings: &[
        "googleadservices",
        "googlesyndication",
        "google-analytics",
        "googletagmanager",
    ],
};

/// Rules for rendering arbitrary article pages.
pub const RENDER_BLOCK_RULES: BlockRules = BlockRules {
    resource_types: &["image", "stylesheet", "font", "media", "other"],
    url_substrings: &[],
};

impl BlockRules {
    pub fn should_block(&self, resource_type: &str, url: &str) -> bool {
        let resource_type = resource_type.to_ascii_lowercase();
        self.resource_types.contains(&resource_type.as_str())
            || self.url_substrings.iter().any(|s| url.contains(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_randomized_profile_draws_from_pools() {
        for _ in 0..20 {
            let profile = BrowserProfile::randomized();
            assert!(USER_AGENTS.contains(&profile.user_agent.as_str()));
            assert!(VIEWPORTS.contains(&profile.viewport));
            assert!(profile.device_scale_factor == 1.0 || profile.device_scale_factor == 2.0);
            assert!(profile.stealth);
            assert_eq!(profile.timezone, Some("Asia/Seoul"));
        }
    }

    #[test]
    fn test_plain_profile_has_no_patches() {
        let profile = BrowserProfile::plain();
        assert!(!profile.stealth);
        assert!(profile.headers_json().as_object().unwrap().is_empty());
    }

    #[test]
    fn test_headers_json() {
        let headers = BrowserProfile::randomized().headers_json();
        assert_eq!(headers["DNT"], "1");
        assert_eq!(headers["Accept-Language"], ACCEPT_LANGUAGE);
        assert!(headers.get("Accept-Encoding").is_none());
    }

    #[test]
    fn test_redirect_rules_block_assets_and_trackers() {
        let rules = REDIRECT_BLOCK_RULES;
        assert!(rules.should_block("Image", "https://cdn.example.com/a.png"));
        assert!(rules.should_block("font", "https://cdn.example.com/a.woff"));
        assert!(rules.should_block(
            "script",
            "https://www.googletagmanager.com/gtm.js"
        ));
        assert!(!rules.should_block("document", "https://news.example.com/a"));
        assert!(!rules.should_block("other", "https://news.example.com/ping"));
    }

    #[test]
    fn test_render_rules_block_other() {
        assert!(RENDER_BLOCK_RULES.should_block("other", "https://example.com/x"));
        assert!(!RENDER_BLOCK_RULES.should_block("script", "https://example.com/app.js"));
    }

    #[test]
    fn test_stealth_script_masks_webdriver() {
        assert!(STEALTH_SCRIPT.contains("'webdriver'"));
        assert!(STEALTH_SCRIPT.contains("hardwareConcurrency"));
        assert!(STEALTH_SCRIPT.contains("deviceMemory"));
    }
}
