use clap::{Parser, ValueEnum};
use fortivpn_webview::browser::CHROME_PATH_ENV;
use fortivpn_webview::{LoginConfig, LoginError, DEFAULT_URL_REGEX};
use log::LevelFilter;
use std::path::PathBuf;

#[derive(Debug, Clone, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

/// Log in to a FortiGate VPN portal in a browser window and print the
/// SVPNCOOKIE for openfortivpn.
#[derive(Parser, Debug)]
#[command(name = "openfortivpn-webview", version, about)]
pub struct Args {
    /// VPN gateway, `host[:port]`. Used to build the SAML start URL.
    #[arg(required_unless_present_any = ["url", "clean"])]
    pub host: Option<String>,

    /// Realm appended to the SAML start URL.
    #[arg(long)]
    pub realm: Option<String>,

    /// URL to open instead of the gateway's SAML start URL.
    #[arg(long)]
    pub url: Option<String>,

    /// Print the cookie once a URL matching this regex is reached.
    #[arg(long, default_value = DEFAULT_URL_REGEX)]
    pub url_regex: String,

    /// Keep the window open after the cookie was printed.
    #[arg(long)]
    pub keep_open: bool,

    /// Accept this certificate even if its chain does not verify (`sha256/<base64>`).
    #[arg(long, value_name = "HASH")]
    pub trusted_cert: Option<String>,

    /// PEM file with additional CA certificates to trust.
    #[arg(long, value_name = "FILE")]
    pub extra_ca_certs: Option<PathBuf>,

    /// User agent the browser presents.
    #[arg(long, env = "FORTIVPN_WEBVIEW_USER_AGENT")]
    pub user_agent: Option<String>,

    /// Chrome/Chromium executable to use.
    #[arg(long, env = CHROME_PATH_ENV, value_name = "PATH")]
    pub chrome_path: Option<PathBuf>,

    /// Remove the browser profile (cookies, cache, history) and exit.
    #[arg(long)]
    pub clean: bool,

    /// Log level.
    #[arg(short, long, value_enum, default_value = "error")]
    pub level: LogLevel,
}

impl Args {
    /// URL opened first: `--url` when given, else the gateway's SAML start page.
    pub fn start_url(&self) -> Result<String, LoginError> {
        if let Some(url) = &self.url {
            return Ok(url.clone());
        }
        match self.host.as_deref() {
            Some(host) => LoginConfig::start_url(host, self.realm.as_deref()),
            None => Err(LoginError::MissingUrl),
        }
    }
}
