use crate::browser::create_browser;
use crate::certificate::{to_pem, CertificateVerdict, Fingerprint, TrustPolicy};
use crate::config::LoginConfig;
use crate::cookie::{CookieEvent, CookieJar};
use crate::error::LoginError;
use crate::flow::{Action, LoginFlow, LOG_TARGET};
use crate::peer::{chain_from_table_names, fetch_peer_chain, web_origin, Origin};
use crate::tab::{CertificateError, TabEvent, WebviewTab};
use crate::utils::CancellationToken;
use headless_chrome::{Browser, Tab};
use rustls::pki_types::CertificateDer;
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

// ── Private implementation ────────────────────────────────────────────────────

/// Runs `job` on its own thread, calling `tick` every [`POLL_INTERVAL`] on
/// the current one until the job returns.
///
/// DevTools calls block until the browser answers, and the browser may be
/// waiting on something only `tick` does, such as answering a held
/// certificate error.
fn run_while<T, J, F>(job: J, mut tick: F) -> std::thread::Result<T>
where
    T: Send + 'static,
    J: FnOnce() -> T + Send + 'static,
    F: FnMut(),
{
    let handle = std::thread::spawn(job);
    while !handle.is_finished() {
        tick();
        sleep(POLL_INTERVAL);
    }
    handle.join()
}

/// Feeds URLs to the flow in arrival order, skipping repeats of the last
/// one, and stops at the first exit.
fn url_actions<I>(flow: &mut LoginFlow, last_url: &mut String, urls: I) -> Vec<Action>
where
    I: IntoIterator<Item = String>,
{
    let mut actions = Vec::new();
    for url in urls {
        if url == *last_url {
            continue;
        }
        actions.extend(flow.on_url_changed(&url));
        *last_url = url;
        if actions.iter().any(|a| matches!(a, Action::Exit(_))) {
            break;
        }
    }
    actions
}

fn get_initial_tab(browser: &Browser) -> anyhow::Result<Arc<Tab>> {
    for _ in 0..10 {
        if let Ok(tabs) = browser.get_tabs().lock() {
            if let Some(t) = tabs.first() {
                return Ok(Arc::clone(t));
            }
        }
        sleep(Duration::from_millis(200));
    }
    browser.new_tab()
}

struct BrowserSession {
    browser: Browser,
    tab: WebviewTab,
    events: crossbeam_channel::Receiver<TabEvent>,
    /// Decisions already taken, per origin.
    trusted: HashMap<Origin, bool>,
}

impl BrowserSession {
    fn open(config: &LoginConfig) -> anyhow::Result<Self> {
        let browser = create_browser(&config.browser).map_err(|e| anyhow::anyhow!("{}", e))?;

        let raw_tab = get_initial_tab(&browser)?;
        raw_tab.set_default_timeout(Duration::from_secs(30));
        let tab = WebviewTab::new(raw_tab);
        tab.hide();

        let (tx, rx) = crossbeam_channel::unbounded();
        tab.forward_events(tx)?;

        Ok(Self {
            browser,
            tab,
            events: rx,
            trusted: HashMap::new(),
        })
    }

    fn close(self) {
        if let Ok(tabs) = self.browser.get_tabs().lock() {
            for tab in tabs.iter() {
                // We don't want to hang here if the browser is already dead.
                let _ = tab.close(true);
            }
        }
        sleep(Duration::from_millis(200));
    }

    /// Answers pending certificate errors and returns the URLs seen since
    /// the last call, oldest first.
    fn drain_events(&mut self, policy: &TrustPolicy) -> Vec<String> {
        let mut urls = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            match event {
                TabEvent::CertificateError(error) => {
                    let accept = self.decide(&error, policy);
                    if let Err(e) = self.tab.resolve_certificate_error(error.event_id, accept) {
                        log::warn!("Could not answer certificate error {}: {}", error.event_id, e);
                    }
                }
                TabEvent::UrlChanged(url) => urls.push(url),
            }
        }
        urls
    }

    /// Chain the browser received for the refused URL, or, when it has none
    /// on record, the one a fresh handshake gets.
    fn presented_chain(
        &self,
        request_url: &str,
        origin: &Origin,
    ) -> anyhow::Result<Vec<CertificateDer<'static>>> {
        if let Some(web_origin) = web_origin(request_url) {
            let chain = self
                .tab
                .certificate_chain(&web_origin)
                .and_then(|names| chain_from_table_names(&names));
            match chain {
                Ok(chain) if !chain.is_empty() => return Ok(chain),
                Ok(_) => log::debug!("Browser holds no certificate for {}", web_origin),
                Err(e) => log::debug!("Cannot read certificate of {} from the browser: {}", web_origin, e),
            }
        }
        fetch_peer_chain(origin)
    }

    fn decide(&mut self, error: &CertificateError, policy: &TrustPolicy) -> bool {
        log::debug!(
            target: LOG_TARGET,
            "Certificate error {} for {}",
            error.error_type,
            error.request_url
        );

        let origin = match Origin::from_url(&error.request_url) {
            Ok(origin) => origin,
            Err(e) => {
                log::warn!("Cannot check certificate of {}: {}", error.request_url, e);
                return false;
            }
        };
        if let Some(&known) = self.trusted.get(&origin) {
            return known;
        }

        let chain = match self.presented_chain(&error.request_url, &origin) {
            Ok(chain) => chain,
            Err(e) => {
                log::warn!(
                    "Cannot fetch certificate of {}:{}: {}",
                    origin.host,
                    origin.port,
                    e
                );
                return false;
            }
        };

        let verdict = policy.evaluate(&chain, &origin.host);
        match &verdict {
            CertificateVerdict::Pinned => {
                log::info!("Accepting pinned certificate of {}", origin.host);
            }
            CertificateVerdict::ChainVerified => {
                log::info!("Certificate chain of {} verified", origin.host);
            }
            CertificateVerdict::Rejected {
                fingerprint,
                reason,
            } => {
                log::debug!(target: LOG_TARGET, "Found an invalid certificate: {}", reason);
                for cert in &chain {
                    log::debug!(
                        target: LOG_TARGET,
                        "{}\n{}",
                        Fingerprint::of_der(cert.as_ref()),
                        to_pem(cert.as_ref())
                    );
                }
                if let Some(fingerprint) = fingerprint {
                    log::debug!(
                        target: LOG_TARGET,
                        "If you know that this certificate can be trusted, relaunch the application passing the following argument to ignore the error:"
                    );
                    log::debug!(target: LOG_TARGET, "--trusted-cert='{}'", fingerprint);
                }
            }
        }

        let accepted = verdict.is_accepted();
        self.trusted.insert(origin, accepted);
        accepted
    }

    /// Carries out the actions and returns the exit code, if one was chosen.
    fn perform(&self, actions: Vec<Action>) -> anyhow::Result<Option<i32>> {
        for action in actions {
            match action {
                Action::ShowWindow => self.tab.show(),
                Action::PrintCookie(line) => {
                    let mut out = std::io::stdout().lock();
                    writeln!(out, "{}", line)?;
                    out.flush()?;
                }
                Action::Exit(code) => return Ok(Some(code)),
            }
        }
        Ok(None)
    }

    fn run_login(
        &mut self,
        config: &LoginConfig,
        mut flow: LoginFlow,
        policy: &TrustPolicy,
        cancel_token: Option<&CancellationToken>,
    ) -> anyhow::Result<i32> {
        let mut jar = CookieJar::new();
        let mut last_url = String::new();

        // Cookies from a previous session count as already present.
        if let Ok(cookies) = self.tab.cookies() {
            for event in jar.update(cookies) {
                if let CookieEvent::Added(c) = event {
                    flow.on_cookie_added(&c.name, &c.value);
                }
            }
        }

        log::info!("Navigating to: {}", config.url);

        // Certificate errors hold the navigation, so it runs off this thread
        // while they are answered here.
        let tab = Arc::clone(&self.tab.0);
        let url = config.url.clone();
        let mut pending_urls = Vec::new();
        let navigation = run_while(
            move || -> anyhow::Result<()> {
                tab.navigate_to(&url)?;
                tab.wait_until_navigated()?;
                Ok(())
            },
            || pending_urls.extend(self.drain_events(policy)),
        );
        match navigation {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::warn!("Initial navigation failed: {}, continuing...", e),
            Err(_) => log::warn!("Initial navigation thread panicked, continuing..."),
        }

        if let Some(code) = self.perform(flow.on_load_finished())? {
            return Ok(code);
        }

        loop {
            if let Some(token) = cancel_token {
                if token.is_cancelled() {
                    log::info!("Cancellation requested, closing browser.");
                    return Ok(self.perform(flow.on_window_closed())?.unwrap_or(1));
                }
            }

            pending_urls.extend(self.drain_events(policy));

            let cookies = match self.tab.cookies() {
                Ok(cookies) => cookies,
                Err(e) => {
                    log::info!("Browser window closed: {}", e);
                    return Ok(self.perform(flow.on_window_closed())?.unwrap_or(1));
                }
            };
            for event in jar.update(cookies) {
                let actions = match event {
                    CookieEvent::Added(c) => flow.on_cookie_added(&c.name, &c.value),
                    CookieEvent::Removed(c) => flow.on_cookie_removed(&c.name),
                };
                if let Some(code) = self.perform(actions)? {
                    return Ok(code);
                }
            }

            // Events carry every main frame URL. The polled one covers a
            // change whose event has not been delivered yet.
            pending_urls.push(self.tab.get_url());
            if pending_urls.iter().any(|url| *url != last_url) {
                if let Some(agent) = self.tab.user_agent() {
                    log::debug!("User Agent: {}", agent);
                }
            }
            let actions = url_actions(&mut flow, &mut last_url, pending_urls.drain(..));
            if let Some(code) = self.perform(actions)? {
                return Ok(code);
            }

            sleep(POLL_INTERVAL);
        }
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Opens the login page in a browser window and follows the SSO flow until
/// the portal page is reached or the window is closed.
///
/// The cookie is written to stdout as `SVPNCOOKIE=<value>`. Returns the
/// process exit code: `0` when the cookie was captured (or, with
/// `keep_open`, when the window was closed), `1` otherwise.
pub fn run_login(
    config: &LoginConfig,
    cancel_token: Option<CancellationToken>,
) -> anyhow::Result<i32> {
    let (pattern, policy) = config.validate()?;
    let flow = LoginFlow::new(pattern, config.keep_open);

    let mut session = BrowserSession::open(config).map_err(|e| LoginError::BrowserError {
        message: format!("Failed to create browser: {}", e),
    })?;

    let result = session.run_login(config, flow, &policy, cancel_token.as_ref());
    session.close();
    result
}
