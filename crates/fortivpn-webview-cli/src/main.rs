//! # openfortivpn-webview
//!
//! Opens a FortiGate VPN portal's single-sign-on page in a browser window and
//! prints the `SVPNCOOKIE` once the login completes, e.g.
//!
//! ```text
//! openfortivpn-webview vpn.example.com | sudo openfortivpn vpn.example.com --cookie-on-stdin
//! ```

mod args;

use args::Args;
use clap::Parser;
use fortivpn_webview::browser::BrowserOptions;
use fortivpn_webview::{init_logger, run_login, CancellationToken, LoginConfig, LoginError};
use log::{error, info};
use std::process::ExitCode;

/// The main entry point of the application.
fn main() -> ExitCode {
    let args = Args::parse();
    init_logger(args.level.clone().into());

    info!("Parsed arguments: {:?}", args);

    // Handle the clean session option.
    if args.clean {
        match fortivpn_webview::wipe_user_data_dir() {
            Ok(_) => {
                info!("Session information successfully removed.");
                return ExitCode::SUCCESS;
            }
            Err(e) => {
                error!("Failed to remove session information: {}", e);
                return ExitCode::FAILURE;
            }
        }
    }

    let url = match args.start_url() {
        Ok(url) => url,
        Err(e) => {
            error!("Invalid arguments: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let config = LoginConfig {
        url,
        url_regex: args.url_regex.clone(),
        keep_open: args.keep_open,
        trusted_cert: args.trusted_cert.clone(),
        extra_ca_certs: args.extra_ca_certs.clone(),
        browser: BrowserOptions {
            user_agent: args.user_agent.clone(),
            chrome_path: args.chrome_path.clone(),
            ..Default::default()
        },
    };

    // Ctrl+C behaves like closing the window.
    let cancel_token = CancellationToken::new();
    let handler_token = cancel_token.clone();
    if let Err(e) = ctrlc::set_handler(move || handler_token.cancel()) {
        log::warn!("Could not install Ctrl+C handler: {}", e);
    }

    match run_login(&config, Some(cancel_token)) {
        Ok(code) => ExitCode::from(code.clamp(0, 255) as u8),
        Err(e) => {
            match e.downcast_ref::<LoginError>() {
                Some(err) if err.is_configuration_error() => error!("Invalid arguments: {}", err),
                _ => error!("Login process failed: {}", e),
            }
            ExitCode::FAILURE
        }
    }
}
