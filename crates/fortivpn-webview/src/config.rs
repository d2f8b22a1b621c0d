use crate::browser::BrowserOptions;
use crate::certificate::{Fingerprint, TrustPolicy};
use crate::error::LoginError;
use regex::Regex;
use std::path::PathBuf;
use url::Url;

/// URL the FortiGate portal lands on once the SSO flow is complete.
pub const DEFAULT_URL_REGEX: &str = r"/sslvpn/portal\.html";

/// Configuration for the browser-based login process.
#[derive(Debug, Clone)]
pub struct LoginConfig {
    pub url: String,
    pub url_regex: String,
    pub keep_open: bool,
    pub trusted_cert: Option<String>,
    pub extra_ca_certs: Option<PathBuf>,
    pub browser: BrowserOptions,
}

impl LoginConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            url_regex: DEFAULT_URL_REGEX.to_string(),
            keep_open: false,
            trusted_cert: None,
            extra_ca_certs: None,
            browser: BrowserOptions::default(),
        }
    }

    /// The SAML entry point of a gateway, `gateway[:port]`, optionally
    /// scoped to a realm.
    pub fn start_url(host: &str, realm: Option<&str>) -> Result<String, LoginError> {
        let base = format!("https://{}/remote/saml/start", host.trim_end_matches('/'));
        let mut url = Url::parse(&base).map_err(|e| LoginError::InvalidHost {
            host: host.to_string(),
            message: e.to_string(),
        })?;
        if let Some(realm) = realm.filter(|r| !r.is_empty()) {
            url.query_pairs_mut().append_pair("realm", realm);
        }
        Ok(url.into())
    }

    pub fn url_pattern(&self) -> Result<Regex, LoginError> {
        Regex::new(&self.url_regex).map_err(|e| LoginError::InvalidUrlPattern {
            pattern: self.url_regex.clone(),
            message: e.to_string(),
        })
    }

    pub fn trust_policy(&self) -> Result<TrustPolicy, LoginError> {
        let pinned = self
            .trusted_cert
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(str::parse::<Fingerprint>)
            .transpose()?;

        let policy = TrustPolicy::new(pinned);
        match &self.extra_ca_certs {
            Some(path) => policy.with_extra_ca_file(path),
            None => Ok(policy),
        }
    }

    /// Checks everything that can be checked before the browser starts.
    pub fn validate(&self) -> Result<(Regex, TrustPolicy), LoginError> {
        if self.url.is_empty() {
            return Err(LoginError::MissingUrl);
        }
        Ok((self.url_pattern()?, self.trust_policy()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_url_without_realm() {
        assert_eq!(
            LoginConfig::start_url("vpn.example.com:10443", None).unwrap(),
            "https://vpn.example.com:10443/remote/saml/start"
        );
    }

    #[test]
    fn start_url_with_realm() {
        assert_eq!(
            LoginConfig::start_url("vpn.example.com", Some("staff")).unwrap(),
            "https://vpn.example.com/remote/saml/start?realm=staff"
        );
        assert_eq!(
            LoginConfig::start_url("vpn.example.com", Some("")).unwrap(),
            "https://vpn.example.com/remote/saml/start"
        );
    }

    #[test]
    fn realm_is_query_encoded() {
        let url = LoginConfig::start_url("vpn.example.com", Some("eng & ops#1")).unwrap();
        assert_eq!(
            url,
            "https://vpn.example.com/remote/saml/start?realm=eng+%26+ops%231"
        );
        let parsed = Url::parse(&url).unwrap();
        let realm = parsed.query_pairs().find(|(k, _)| k == "realm").map(|(_, v)| v.into_owned());
        assert_eq!(realm.as_deref(), Some("eng & ops#1"));
        assert_eq!(parsed.fragment(), None);
    }

    #[test]
    fn malformed_host_is_reported() {
        assert!(matches!(
            LoginConfig::start_url("vpn example.com", None),
            Err(LoginError::InvalidHost { .. })
        ));
    }

    #[test]
    fn default_pattern_matches_portal() {
        let config = LoginConfig::new("https://vpn.example.com/remote/saml/start");
        let pattern = config.url_pattern().unwrap();
        assert!(pattern.is_match("https://vpn.example.com/sslvpn/portal.html#/"));
        assert!(!pattern.is_match("https://vpn.example.com/sslvpn/portalxhtml"));
    }

    #[test]
    fn invalid_regex_is_reported() {
        let mut config = LoginConfig::new("https://vpn.example.com/");
        config.url_regex = "(unclosed".to_string();
        assert!(matches!(
            config.validate(),
            Err(LoginError::InvalidUrlPattern { .. })
        ));
    }

    #[test]
    fn invalid_fingerprint_is_reported() {
        let mut config = LoginConfig::new("https://vpn.example.com/");
        config.trusted_cert = Some("deadbeef".to_string());
        assert!(matches!(
            config.validate(),
            Err(LoginError::InvalidFingerprint { .. })
        ));
    }

    #[test]
    fn valid_fingerprint_is_pinned() {
        let mut config = LoginConfig::new("https://vpn.example.com/");
        let fp = Fingerprint::of_der(b"leaf");
        config.trusted_cert = Some(fp.to_string());
        let (_, policy) = config.validate().unwrap();
        assert_eq!(policy.pinned(), Some(&fp));
    }

    #[test]
    fn empty_url_is_rejected() {
        let config = LoginConfig::new("");
        assert!(matches!(config.validate(), Err(LoginError::MissingUrl)));
    }
}
