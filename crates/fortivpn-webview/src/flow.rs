use crate::cookie::{SessionCookie, SVPN_COOKIE_NAME};
use regex::Regex;

/// Log target shared by every message about the login flow.
pub const LOG_TARGET: &str = "webview";

/// Something the browser session must do in reaction to an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Bring the browser window on screen.
    ShowWindow,
    /// Write the cookie line to stdout.
    PrintCookie(String),
    /// Stop the session and exit with the given code.
    Exit(i32),
}

/// Reacts to browser events and decides when the cookie is printed and
/// which exit code the process ends with.
///
/// The cookie is only printed once a URL matching `url_pattern` has been
/// seen, whatever the order in which cookie and URL show up.
#[derive(Debug)]
pub struct LoginFlow {
    url_pattern: Regex,
    keep_open: bool,
    cookie: Option<SessionCookie>,
    saw_target_url: bool,
    window_shown: bool,
}

impl LoginFlow {
    pub fn new(url_pattern: Regex, keep_open: bool) -> Self {
        Self {
            url_pattern,
            keep_open,
            cookie: None,
            saw_target_url: false,
            window_shown: false,
        }
    }

    pub fn cookie(&self) -> Option<&SessionCookie> {
        self.cookie.as_ref()
    }

    pub fn saw_target_url(&self) -> bool {
        self.saw_target_url
    }

    pub fn keep_open(&self) -> bool {
        self.keep_open
    }

    /// The window stays hidden until the first page is loaded, so a session
    /// that is still valid completes without ever showing it.
    pub fn on_load_finished(&mut self) -> Vec<Action> {
        if self.window_shown {
            return Vec::new();
        }
        self.window_shown = true;
        vec![Action::ShowWindow]
    }

    pub fn on_cookie_added(&mut self, name: &str, value: &str) -> Vec<Action> {
        if name != SVPN_COOKIE_NAME {
            return Vec::new();
        }
        if value.is_empty() {
            log::debug!(target: LOG_TARGET, "Ignoring empty {}", SVPN_COOKIE_NAME);
            return Vec::new();
        }

        let cookie = SessionCookie::new(name, value);
        log::debug!(target: LOG_TARGET, "{} has been received", SVPN_COOKIE_NAME);

        let mut actions = Vec::new();
        if self.saw_target_url {
            actions.push(Action::PrintCookie(cookie.to_string()));
            if !self.keep_open {
                actions.push(Action::Exit(0));
            }
        }
        self.cookie = Some(cookie);
        actions
    }

    pub fn on_cookie_removed(&mut self, name: &str) -> Vec<Action> {
        if name == SVPN_COOKIE_NAME {
            log::debug!(target: LOG_TARGET, "{} has been removed", SVPN_COOKIE_NAME);
            self.cookie = None;
        }
        Vec::new()
    }

    pub fn on_url_changed(&mut self, url: &str) -> Vec<Action> {
        log::debug!(target: LOG_TARGET, "{}", url);

        if self.saw_target_url || !self.url_pattern.is_match(url) {
            return Vec::new();
        }

        log::debug!(target: LOG_TARGET, "The current URL matches the given regex");
        self.saw_target_url = true;

        let mut actions = Vec::new();
        if let Some(cookie) = &self.cookie {
            actions.push(Action::PrintCookie(cookie.to_string()));
        }
        if !self.keep_open {
            actions.push(Action::Exit(if self.cookie.is_some() { 0 } else { 1 }));
        }
        actions
    }

    pub fn on_window_closed(&mut self) -> Vec<Action> {
        vec![Action::Exit(if self.keep_open { 0 } else { 1 })]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flow(keep_open: bool) -> LoginFlow {
        LoginFlow::new(Regex::new(r"/sslvpn/portal\.html").unwrap(), keep_open)
    }

    const PORTAL: &str = "https://vpn.example.com/sslvpn/portal.html#/";

    #[test]
    fn load_finished_shows_window_once() {
        let mut f = flow(false);
        assert_eq!(f.on_load_finished(), vec![Action::ShowWindow]);
        assert!(f.on_load_finished().is_empty());
    }

    #[test]
    fn cookie_before_target_url_is_printed_when_url_matches() {
        let mut f = flow(false);
        assert!(f.on_cookie_added(SVPN_COOKIE_NAME, "abc").is_empty());
        assert!(f.on_url_changed("https://idp.example.com/login").is_empty());
        assert_eq!(
            f.on_url_changed(PORTAL),
            vec![
                Action::PrintCookie("SVPNCOOKIE=abc".to_string()),
                Action::Exit(0)
            ]
        );
    }

    #[test]
    fn cookie_after_target_url_is_printed_immediately() {
        let mut f = flow(false);
        // Reaching the target without a cookie ends the run with 1.
        assert_eq!(f.on_url_changed(PORTAL), vec![Action::Exit(1)]);
        assert!(f.saw_target_url());

        let mut f = flow(true);
        assert!(f.on_url_changed(PORTAL).is_empty());
        assert_eq!(
            f.on_cookie_added(SVPN_COOKIE_NAME, "late"),
            vec![Action::PrintCookie("SVPNCOOKIE=late".to_string())]
        );
    }

    #[test]
    fn cookie_arriving_after_target_url_exits_zero() {
        let mut f = flow(false);
        f.saw_target_url = true;
        assert_eq!(
            f.on_cookie_added(SVPN_COOKIE_NAME, "v"),
            vec![Action::PrintCookie("SVPNCOOKIE=v".to_string()), Action::Exit(0)]
        );
    }

    #[test]
    fn removed_cookie_is_forgotten() {
        let mut f = flow(false);
        f.on_cookie_added(SVPN_COOKIE_NAME, "abc");
        f.on_cookie_removed(SVPN_COOKIE_NAME);
        assert!(f.cookie().is_none());
        assert_eq!(f.on_url_changed(PORTAL), vec![Action::Exit(1)]);
    }

    #[test]
    fn other_cookies_are_ignored() {
        let mut f = flow(false);
        assert!(f.on_cookie_added("APSCOOKIE", "abc").is_empty());
        f.on_cookie_added(SVPN_COOKIE_NAME, "keep");
        f.on_cookie_removed("APSCOOKIE");
        assert_eq!(f.cookie().map(|c| c.value()), Some("keep"));
    }

    #[test]
    fn empty_cookie_value_is_ignored() {
        let mut f = flow(false);
        assert!(f.on_cookie_added(SVPN_COOKIE_NAME, "").is_empty());
        assert!(f.cookie().is_none());
    }

    #[test]
    fn target_url_is_only_handled_once() {
        let mut f = flow(true);
        f.on_cookie_added(SVPN_COOKIE_NAME, "abc");
        assert_eq!(
            f.on_url_changed(PORTAL),
            vec![Action::PrintCookie("SVPNCOOKIE=abc".to_string())]
        );
        assert!(f.on_url_changed(PORTAL).is_empty());
    }

    #[test]
    fn keep_open_never_exits_on_its_own() {
        let mut f = flow(true);
        assert!(f.keep_open());
        f.on_url_changed(PORTAL);
        let actions = f.on_cookie_added(SVPN_COOKIE_NAME, "a");
        assert!(!actions.iter().any(|a| matches!(a, Action::Exit(_))));
        assert_eq!(f.on_window_closed(), vec![Action::Exit(0)]);
    }

    #[test]
    fn closing_window_without_keep_open_fails() {
        let mut f = flow(false);
        f.on_cookie_added(SVPN_COOKIE_NAME, "abc");
        assert_eq!(f.on_window_closed(), vec![Action::Exit(1)]);
    }
}
