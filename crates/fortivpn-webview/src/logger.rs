use crate::flow::LOG_TARGET;
use colored::Colorize;
use log::{Level, LevelFilter};
use std::io::Write;

/// Crates of the DevTools transport, chatty below warn.
const QUIET_TARGETS: [&str; 3] = ["headless_chrome", "tungstenite", "ureq"];

/// Logs go to stderr: stdout only ever carries the cookie line.
fn builder(level: LevelFilter) -> env_logger::Builder {
    let mut builder = env_logger::Builder::new();
    builder.target(env_logger::Target::Stderr).filter(None, level);
    for target in QUIET_TARGETS {
        builder.filter(Some(target), level.min(LevelFilter::Warn));
    }
    builder.format(|buf, record| {
        let level = match record.level() {
            Level::Error => "ERROR".red(),
            Level::Warn => "WARN".yellow(),
            Level::Info => "INFO".green(),
            Level::Debug => "DEBUG".blue(),
            Level::Trace => "TRACE".purple(),
        };
        if record.target() == LOG_TARGET {
            writeln!(buf, "[{}] {}: {}", level, LOG_TARGET, record.args())
        } else {
            writeln!(buf, "[{}] - {}", level, record.args())
        }
    });
    builder
}

pub fn init_logger(level: LevelFilter) {
    builder(level).init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_level_is_applied() {
        let logger = builder(LevelFilter::Debug).build();
        assert_eq!(logger.filter(), LevelFilter::Debug);
    }

    #[test]
    fn error_level_stays_quiet() {
        let logger = builder(LevelFilter::Error).build();
        assert_eq!(logger.filter(), LevelFilter::Error);
    }

    fn enabled(logger: &env_logger::Logger, target: &str, level: Level) -> bool {
        let metadata = log::Metadata::builder().target(target).level(level).build();
        log::Log::enabled(logger, &metadata)
    }

    #[test]
    fn binary_and_library_targets_follow_level() {
        let logger = builder(LevelFilter::Info).build();
        assert!(enabled(&logger, "openfortivpn_webview", Level::Info));
        assert!(enabled(&logger, "fortivpn_webview::session", Level::Info));
        assert!(enabled(&logger, LOG_TARGET, Level::Info));
        assert!(!enabled(&logger, "openfortivpn_webview", Level::Debug));
    }

    #[test]
    fn transport_is_capped_at_warn() {
        let logger = builder(LevelFilter::Debug).build();
        assert!(enabled(&logger, LOG_TARGET, Level::Debug));
        assert!(!enabled(&logger, "headless_chrome::browser::transport", Level::Info));
        assert!(enabled(&logger, "headless_chrome::browser", Level::Warn));
        assert!(!enabled(&logger, "tungstenite::protocol", Level::Debug));
    }
}
