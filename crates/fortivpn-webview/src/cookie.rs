use std::collections::HashMap;
use std::fmt;

/// Name of the FortiGate session cookie handed to the VPN client.
pub const SVPN_COOKIE_NAME: &str = "SVPNCOOKIE";

/// The captured session cookie, printed as `name=value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    name: String,
    value: String,
}

impl SessionCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for SessionCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

/// A cookie as seen in the browser's jar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
}

impl Cookie {
    fn key(&self) -> CookieKey {
        CookieKey {
            name: self.name.clone(),
            domain: self.domain.clone(),
            path: self.path.clone(),
        }
    }
}

impl From<&headless_chrome::protocol::cdp::Network::Cookie> for Cookie {
    fn from(c: &headless_chrome::protocol::cdp::Network::Cookie) -> Self {
        Self {
            name: c.name.clone(),
            value: c.value.clone(),
            domain: c.domain.clone(),
            path: c.path.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CookieKey {
    name: String,
    domain: String,
    path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CookieEvent {
    Added(Cookie),
    Removed(Cookie),
}

/// Last observed state of the browser's cookie jar.
///
/// The DevTools protocol has no cookie-change notification, so the whole
/// cookie store is polled and consecutive snapshots are diffed into
/// add/remove events.
#[derive(Debug, Default)]
pub struct CookieJar {
    cookies: HashMap<CookieKey, Cookie>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the stored snapshot and returns what changed.
    ///
    /// Removals come first. A cookie whose value changed is reported as added.
    pub fn update<I>(&mut self, snapshot: I) -> Vec<CookieEvent>
    where
        I: IntoIterator<Item = Cookie>,
    {
        let next: HashMap<CookieKey, Cookie> =
            snapshot.into_iter().map(|c| (c.key(), c)).collect();

        let mut removed: Vec<CookieEvent> = self
            .cookies
            .iter()
            .filter(|(key, _)| !next.contains_key(*key))
            .map(|(_, c)| CookieEvent::Removed(c.clone()))
            .collect();

        let added = next
            .iter()
            .filter(|(key, c)| self.cookies.get(*key).map(|old| &old.value) != Some(&c.value))
            .map(|(_, c)| CookieEvent::Added(c.clone()));

        removed.extend(added);
        self.cookies = next;
        removed
    }
}
