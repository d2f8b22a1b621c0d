//! # FortiGate SSO Cookie Library
//!
//! This library drives a Chrome/Chromium window through a FortiGate VPN
//! portal's single-sign-on flow and captures the `SVPNCOOKIE` session cookie
//! once the portal page is reached, for use by `openfortivpn`.

pub mod browser;
pub mod certificate;
pub mod config;
pub mod cookie;
pub mod error;
pub mod flow;
pub mod logger;
pub mod peer;
pub mod session;
mod tab;
pub mod utils;

// Re-export commonly used items
pub use config::{LoginConfig, DEFAULT_URL_REGEX};
pub use error::LoginError;
pub use logger::init_logger;
pub use session::run_login;
pub use tab::CertificateError;
pub use utils::{get_user_data_dir, wipe_user_data_dir, CancellationToken};
