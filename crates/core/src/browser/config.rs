use std::path::PathBuf;

/// Launch-time configuration for a browser process.
///
/// Passed explicitly into [`super::BrowserSession::launch`]; nothing here
/// lives in module-level state, so two sessions with different settings can
/// coexist in one process.
#[derive(Debug, Clone)]
pub struct LaunchConfig {
    /// Browser `--lang` value, also sent as `Accept-Language` on every page.
    pub locale: String,
    /// Timezone id emulated on every page, e.g. `Europe/Copenhagen`.
    /// `None` leaves the host timezone in place.
    pub timezone: Option<String>,
    pub headless: bool,
    /// Directory downloads are allowed into. `None` keeps downloads denied.
    pub download_dir: Option<PathBuf>,
    pub proxy: Option<ProxyConfig>,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            locale: "en".to_string(),
            timezone: None,
            headless: true,
            download_dir: None,
            proxy: None,
        }
    }
}

/// Upstream proxy endpoint plus optional credentials answered to auth
/// challenges on each page.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// `host:port`, handed to Chromium as `--proxy-server`.
    pub server: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ProxyConfig {
    pub(crate) fn credentials(&self) -> Option<(String, String)> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some((user.clone(), pass.clone())),
            _ => None,
        }
    }
}
