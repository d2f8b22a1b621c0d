/// Errors that stop the login before or while the browser runs.
///
/// A rejected certificate is not one of them: it cancels the navigation and
/// is reported in the log, the session keeps going.
#[derive(Debug, Clone)]
pub enum LoginError {
    /// The `--url-regex` value does not compile.
    InvalidUrlPattern {
        pattern: String,
        message: String,
    },
    /// The `--trusted-cert` value is not `sha256/<base64 digest>`.
    InvalidFingerprint {
        value: String,
    },
    /// The `--extra-ca-certs` file could not be read or holds no certificate.
    CaCertificates {
        path: String,
        message: String,
    },
    /// Neither `--url` nor a gateway host was given.
    MissingUrl,
    /// The gateway host does not form a valid URL.
    InvalidHost {
        host: String,
        message: String,
    },
    /// The browser could not be started or the connection to it failed.
    BrowserError {
        message: String,
    },
}

impl LoginError {
    /// Returns the user-facing error message
    pub fn user_message(&self) -> String {
        match self {
            LoginError::InvalidUrlPattern { pattern, message } => {
                format!("Invalid URL regex '{}'.\n\n{}", pattern, message)
            }
            LoginError::InvalidFingerprint { value } => {
                format!(
                    "Invalid certificate hash '{}'.\n\nExpected the form sha256/<base64 digest>.",
                    value
                )
            }
            LoginError::CaCertificates { path, message } => {
                format!("Cannot load CA certificates from '{}'.\n\n{}", path, message)
            }
            LoginError::MissingUrl => {
                "No URL to open: pass a gateway host or --url.".to_string()
            }
            LoginError::InvalidHost { host, message } => {
                format!("Invalid gateway host '{}'.\n\n{}", host, message)
            }
            LoginError::BrowserError { message } => format!("Browser error.\n\n{}", message),
        }
    }

    /// Returns true if the failure comes from the command line rather than the browser.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            LoginError::InvalidUrlPattern { .. }
                | LoginError::InvalidFingerprint { .. }
                | LoginError::CaCertificates { .. }
                | LoginError::MissingUrl
                | LoginError::InvalidHost { .. }
        )
    }

    /// Returns troubleshooting suggestions based on error type
    pub fn troubleshooting_steps(&self) -> Vec<String> {
        let mut steps = Vec::new();
        if let LoginError::BrowserError { .. } = self {
            steps.push("Make sure Chrome or Chromium is installed, or pass --chrome-path".to_string());
            steps.push("Try clearing the browser profile with --clean".to_string());
        }
        steps
    }

    /// Returns the full error message with troubleshooting steps
    pub fn full_message(&self) -> String {
        let mut msg = self.user_message();
        let steps = self.troubleshooting_steps();

        if !steps.is_empty() {
            msg.push_str("\n\nTroubleshooting steps:");
            for (i, step) in steps.iter().enumerate() {
                msg.push_str(&format!("\n{}. {}", i + 1, step));
            }
        }

        msg
    }
}

impl std::fmt::Display for LoginError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.full_message())
    }
}

impl std::error::Error for LoginError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn browser_error_lists_steps() {
        let err = LoginError::BrowserError {
            message: "no chrome".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("Browser error."));
        assert!(msg.contains("1. Make sure Chrome"));
        assert!(msg.contains("2. Try clearing"));
        assert!(!err.is_configuration_error());
    }

    #[test]
    fn configuration_errors_have_no_steps() {
        let err = LoginError::InvalidFingerprint {
            value: "md5/xyz".to_string(),
        };
        assert!(err.is_configuration_error());
        assert!(err.troubleshooting_steps().is_empty());
        assert!(err.to_string().contains("md5/xyz"));
    }

    #[test]
    fn converts_into_anyhow() {
        let err: anyhow::Error = LoginError::MissingUrl.into();
        assert!(matches!(
            err.downcast_ref::<LoginError>(),
            Some(LoginError::MissingUrl)
        ));
    }
}
