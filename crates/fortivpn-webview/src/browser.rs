use headless_chrome::browser::default_executable;
use headless_chrome::{Browser, LaunchOptions};
use std::error::Error;
use std::ffi::{OsStr, OsString};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable naming the Chrome/Chromium executable to drive.
pub const CHROME_PATH_ENV: &str = "FORTIVPN_WEBVIEW_CHROME_PATH";

/// How the host browser is launched.
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    /// User agent override. `None` or empty keeps the browser's own.
    pub user_agent: Option<String>,
    /// Browser executable. Falls back to `FORTIVPN_WEBVIEW_CHROME_PATH`, then
    /// to whatever Chrome/Chromium is installed.
    pub chrome_path: Option<PathBuf>,
    pub window_size: (u32, u32),
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            user_agent: None,
            chrome_path: None,
            window_size: (1024, 800),
        }
    }
}

impl BrowserOptions {
    /// Extra command line switches passed to the browser.
    pub fn launch_args(&self) -> Vec<OsString> {
        let mut args = vec![
            OsString::from("--app=data:text/html,<html><body></body></html>"),
            OsString::from("--new-window"),
            OsString::from("--no-first-run"),
            OsString::from("--no-default-browser-check"),
            OsString::from("--disable-session-crashed-bubble"),
        ];
        if let Some(agent) = self.user_agent.as_deref().filter(|a| !a.is_empty()) {
            args.push(OsString::from(format!("--user-agent={agent}")));
        }
        args
    }

    fn executable(&self) -> Option<PathBuf> {
        self.chrome_path
            .clone()
            .or_else(|| std::env::var_os(CHROME_PATH_ENV).map(PathBuf::from))
            .or_else(|| default_executable().ok())
    }
}

/// Creates a visible browser instance with a persistent profile.
///
/// The browser is launched with the following settings:
/// - **Non-headless mode**: the user completes the SSO flow in it.
/// - **A blank app window**, without tabs or address bar.
/// - **The user agent** from `options`, when one is set.
/// - **A persistent user data directory**, so cookies survive between runs.
/// - **Certificate errors reported**, never silently ignored.
/// - **No idle timeout**: the user may take as long as needed to log in.
///
/// If the first launch fails the profile is wiped and the launch retried once.
pub fn create_browser(options: &BrowserOptions) -> Result<Browser, Box<dyn Error>> {
    let args = options.launch_args();
    let args: Vec<&OsStr> = args.iter().map(|a| a.as_os_str()).collect();

    let mut attempts = 0;
    loop {
        let user_data_dir = crate::utils::get_user_data_dir()?;

        let mut builder = LaunchOptions::default_builder();
        let mut launch_options = builder
            .headless(false)
            .sandbox(false)
            .ignore_certificate_errors(false)
            .idle_browser_timeout(Duration::MAX)
            .window_size(Some(options.window_size))
            .args(args.clone())
            .user_data_dir(Some(user_data_dir));

        if let Some(path) = options.executable() {
            launch_options = launch_options.path(Some(path));
        }

        match Browser::new(launch_options.build()?) {
            Ok(browser) => return Ok(browser),
            Err(e) => {
                attempts += 1;
                if attempts >= 2 {
                    return Err(format!("Browser failed even after wipe: {}", e).into());
                }
                log::warn!("Browser connection failed. Wiping profile and retrying...");
                crate::utils::wipe_user_data_dir()?;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_agent_switch_is_added_when_set() {
        let options = BrowserOptions {
            user_agent: Some("Mozilla/5.0 FortiClient".to_string()),
            ..Default::default()
        };
        let args = options.launch_args();
        assert!(args
            .iter()
            .any(|a| a == "--user-agent=Mozilla/5.0 FortiClient"));
    }

    #[test]
    fn empty_user_agent_keeps_browser_default() {
        let options = BrowserOptions {
            user_agent: Some(String::new()),
            ..Default::default()
        };
        let args = options.launch_args();
        assert!(!args
            .iter()
            .any(|a| a.to_string_lossy().starts_with("--user-agent")));
        assert!(args.iter().any(|a| a.to_string_lossy().starts_with("--app=")));
    }

    #[test]
    fn explicit_chrome_path_wins() {
        let options = BrowserOptions {
            chrome_path: Some(PathBuf::from("/opt/chromium/chrome")),
            ..Default::default()
        };
        assert_eq!(
            options.executable(),
            Some(PathBuf::from("/opt/chromium/chrome"))
        );
    }
}
