use crate::cookie::Cookie;
use headless_chrome::protocol::cdp::types::Event;
use headless_chrome::protocol::cdp::{Network, Security};
use headless_chrome::types::Bounds;
use headless_chrome::Tab;
use std::sync::{Arc, Mutex};

/// A certificate the browser refused, waiting for a decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateError {
    pub event_id: u32,
    pub error_type: String,
    pub request_url: String,
}

impl From<&Security::events::CertificateErrorEventParams> for CertificateError {
    fn from(params: &Security::events::CertificateErrorEventParams) -> Self {
        Self {
            event_id: params.event_id,
            error_type: params.error_Type.clone(),
            request_url: params.request_url.clone(),
        }
    }
}

/// Keeps track of the main frame so only its URL changes are reported.
#[derive(Debug, Default)]
struct MainFrame(Mutex<Option<String>>);

impl MainFrame {
    /// A frame committed a navigation. Frames without a parent are the main
    /// frame.
    fn navigated(&self, frame_id: &str, parent_id: Option<&str>, url: &str) -> Option<String> {
        if parent_id.is_some() {
            return None;
        }
        if let Ok(mut id) = self.0.lock() {
            *id = Some(frame_id.to_string());
        }
        Some(url.to_string())
    }

    /// Fragment or history API change inside a frame's document.
    fn navigated_within_document(&self, frame_id: &str, url: &str) -> Option<String> {
        let is_main = self
            .0
            .lock()
            .map(|id| id.as_deref() == Some(frame_id))
            .unwrap_or(false);
        is_main.then(|| url.to_string())
    }
}

/// Browser events forwarded to the session thread, in the order Chrome
/// emitted them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TabEvent {
    CertificateError(CertificateError),
    /// The main frame committed a navigation or changed its fragment.
    UrlChanged(String),
}

/// Thin wrapper around the Chrome tab hosting the login page.
pub(crate) struct WebviewTab(pub(crate) Arc<Tab>);

impl WebviewTab {
    pub(crate) fn new(tab: Arc<Tab>) -> Self {
        Self(tab)
    }

    /// Evaluates JS and returns the string result, or `None` if null/undefined.
    pub(crate) fn eval_string(&self, js: &str) -> anyhow::Result<Option<String>> {
        Ok(self
            .0
            .evaluate(js, false)?
            .value
            .and_then(|v| v.as_str().map(|s| s.to_string())))
    }

    pub(crate) fn get_url(&self) -> String {
        self.0.get_url()
    }

    pub(crate) fn user_agent(&self) -> Option<String> {
        self.eval_string("navigator.userAgent").ok().flatten()
    }

    /// Snapshot of the whole cookie store, whatever page is loaded.
    ///
    /// Doubles as a heartbeat: it fails once the window has been closed.
    pub(crate) fn cookies(&self) -> anyhow::Result<Vec<Cookie>> {
        let cookies = self
            .0
            .call_method(Network::GetAllCookies(None))
            .map_err(|e| anyhow::anyhow!("Browser error: {}", e))?
            .cookies;
        Ok(cookies.iter().map(Cookie::from).collect())
    }

    /// Base64 DER chain the browser received from `origin`, leaf first.
    /// Empty when it holds no certificate for it.
    pub(crate) fn certificate_chain(&self, origin: &str) -> anyhow::Result<Vec<String>> {
        Ok(self
            .0
            .call_method(Network::GetCertificate {
                origin: origin.to_string(),
            })?
            .table_names)
    }

    pub(crate) fn hide(&self) {
        if let Err(e) = self.0.set_bounds(Bounds::Minimized) {
            log::debug!("Could not minimize the window: {}", e);
        }
    }

    pub(crate) fn show(&self) {
        let bounds = Bounds::Normal {
            left: None,
            top: None,
            width: None,
            height: None,
        };
        if let Err(e) = self.0.set_bounds(bounds) {
            log::debug!("Could not restore the window: {}", e);
        }
    }

    /// Forwards main frame URL changes and certificate errors to `tx`.
    ///
    /// The browser holds every certificate error until
    /// [`WebviewTab::resolve_certificate_error`] is called for it. The
    /// listener only forwards: calling back into the browser from the event
    /// thread would block it.
    pub(crate) fn forward_events(&self, tx: crossbeam_channel::Sender<TabEvent>) -> anyhow::Result<()> {
        self.0.call_method(Security::Enable(None))?;
        self.0
            .call_method(Security::SetOverrideCertificateErrors { Override: true })?;

        let main_frame = MainFrame::default();
        self.0.add_event_listener(Arc::new(move |event: &Event| {
            let forwarded = match event {
                Event::SecurityCertificateError(e) => {
                    Some(TabEvent::CertificateError(CertificateError::from(&e.params)))
                }
                Event::PageFrameNavigated(e) => main_frame
                    .navigated(
                        &e.params.frame.id,
                        e.params.frame.parent_id.as_deref(),
                        &e.params.frame.url,
                    )
                    .map(TabEvent::UrlChanged),
                Event::PageNavigatedWithinDocument(e) => main_frame
                    .navigated_within_document(&e.params.frame_id, &e.params.url)
                    .map(TabEvent::UrlChanged),
                _ => None,
            };
            if let Some(event) = forwarded {
                let _ = tx.send(event);
            }
        }))?;
        Ok(())
    }

    pub(crate) fn resolve_certificate_error(&self, event_id: u32, accept: bool) -> anyhow::Result<()> {
        let action = if accept {
            Security::CertificateErrorAction::Continue
        } else {
            Security::CertificateErrorAction::Cancel
        };
        self.0
            .call_method(Security::HandleCertificateError { event_id, action })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn certificate_error_keeps_event_fields() {
        let params = Security::events::CertificateErrorEventParams {
            event_id: 7,
            error_Type: "net::ERR_CERT_AUTHORITY_INVALID".to_string(),
            request_url: "https://vpn.example.com/remote/saml/start".to_string(),
        };
        assert_eq!(
            CertificateError::from(&params),
            CertificateError {
                event_id: 7,
                error_type: "net::ERR_CERT_AUTHORITY_INVALID".to_string(),
                request_url: "https://vpn.example.com/remote/saml/start".to_string(),
            }
        );
    }

    #[test]
    fn subframe_navigation_is_not_reported() {
        let frames = MainFrame::default();
        assert_eq!(frames.navigated("child", Some("main"), "https://ads.example.com/"), None);
        assert_eq!(
            frames.navigated("main", None, "https://vpn.example.com/remote/saml/start"),
            Some("https://vpn.example.com/remote/saml/start".to_string())
        );
    }

    #[test]
    fn fragment_change_is_reported_for_main_frame_only() {
        let frames = MainFrame::default();
        // Unknown until the main frame has navigated once.
        assert_eq!(frames.navigated_within_document("main", "https://vpn.example.com/#/"), None);

        frames.navigated("main", None, "https://vpn.example.com/sslvpn/portal.html");
        assert_eq!(
            frames.navigated_within_document("main", "https://vpn.example.com/sslvpn/portal.html#/"),
            Some("https://vpn.example.com/sslvpn/portal.html#/".to_string())
        );
        assert_eq!(frames.navigated_within_document("child", "https://ads.example.com/#x"), None);
    }
}
