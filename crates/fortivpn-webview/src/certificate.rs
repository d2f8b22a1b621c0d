//! Trust decision for certificates the browser refused.
//!
//! A certificate is accepted either because its SHA-256 fingerprint matches
//! the one passed with `--trusted-cert`, or because its chain verifies
//! against the bundled web roots plus any `--extra-ca-certs`.

use crate::error::LoginError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rustls::client::danger::ServerCertVerifier;
use rustls::client::WebPkiServerVerifier;
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::RootCertStore;
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

const FINGERPRINT_PREFIX: &str = "sha256/";

/// `sha256/<base64>` digest of a DER encoded certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn of_der(der: &[u8]) -> Self {
        Self(Sha256::digest(der).into())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", FINGERPRINT_PREFIX, STANDARD.encode(self.0))
    }
}

impl FromStr for Fingerprint {
    type Err = LoginError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || LoginError::InvalidFingerprint {
            value: s.to_string(),
        };
        let encoded = s.trim().strip_prefix(FINGERPRINT_PREFIX).ok_or_else(invalid)?;
        let digest = STANDARD.decode(encoded).map_err(|_| invalid())?;
        let bytes: [u8; 32] = digest.try_into().map_err(|_| invalid())?;
        Ok(Self(bytes))
    }
}

/// Outcome of [`TrustPolicy::evaluate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertificateVerdict {
    /// The leaf matches the operator supplied fingerprint.
    Pinned,
    /// The chain verifies against the configured roots.
    ChainVerified,
    Rejected {
        fingerprint: Option<Fingerprint>,
        reason: String,
    },
}

impl CertificateVerdict {
    pub fn is_accepted(&self) -> bool {
        !matches!(self, CertificateVerdict::Rejected { .. })
    }
}

#[derive(Debug, Clone)]
pub struct TrustPolicy {
    pinned: Option<Fingerprint>,
    roots: Arc<RootCertStore>,
}

impl TrustPolicy {
    /// Policy trusting the web PKI roots and, optionally, one pinned leaf.
    pub fn new(pinned: Option<Fingerprint>) -> Self {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        Self::with_roots(pinned, roots)
    }

    pub fn with_roots(pinned: Option<Fingerprint>, roots: RootCertStore) -> Self {
        Self {
            pinned,
            roots: Arc::new(roots),
        }
    }

    pub fn pinned(&self) -> Option<&Fingerprint> {
        self.pinned.as_ref()
    }

    /// Adds every certificate of a PEM bundle to the trusted roots.
    pub fn with_extra_ca_file(mut self, path: &Path) -> Result<Self, LoginError> {
        let ca_error = |message: String| LoginError::CaCertificates {
            path: path.display().to_string(),
            message,
        };

        let certs = CertificateDer::pem_file_iter(path)
            .map_err(|e| ca_error(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ca_error(e.to_string()))?;
        if certs.is_empty() {
            return Err(ca_error("no certificate found".to_string()));
        }

        let roots = Arc::make_mut(&mut self.roots);
        let (added, ignored) = roots.add_parsable_certificates(certs);
        log::debug!(
            "Loaded {} extra CA certificate(s) from {:?}, {} ignored",
            added,
            path,
            ignored
        );
        if added == 0 {
            return Err(ca_error("no usable CA certificate".to_string()));
        }
        Ok(self)
    }

    /// Decides whether the chain presented by `host` can be trusted.
    ///
    /// `chain` is leaf first. When it holds more than leaf and issuer, the
    /// trailing CA is left out of the intermediates: it must come from the
    /// root store.
    pub fn evaluate(&self, chain: &[CertificateDer<'_>], host: &str) -> CertificateVerdict {
        let Some(leaf) = chain.first() else {
            return CertificateVerdict::Rejected {
                fingerprint: None,
                reason: "empty certificate chain".to_string(),
            };
        };

        let fingerprint = Fingerprint::of_der(leaf.as_ref());
        if self.pinned.as_ref() == Some(&fingerprint) {
            return CertificateVerdict::Pinned;
        }

        match self.verify_chain(chain, host) {
            Ok(()) => CertificateVerdict::ChainVerified,
            Err(reason) => CertificateVerdict::Rejected {
                fingerprint: Some(fingerprint),
                reason,
            },
        }
    }

    fn verify_chain(&self, chain: &[CertificateDer<'_>], host: &str) -> Result<(), String> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let verifier = WebPkiServerVerifier::builder_with_provider(Arc::clone(&self.roots), provider)
            .build()
            .map_err(|e| e.to_string())?;

        let server_name = ServerName::try_from(host.to_string()).map_err(|e| e.to_string())?;
        let intermediates = if chain.len() > 2 {
            &chain[1..chain.len() - 1]
        } else {
            &chain[1..]
        };

        verifier
            .verify_server_cert(&chain[0], intermediates, &server_name, &[], UnixTime::now())
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

/// PEM text of a DER certificate, for logging.
pub fn to_pem(der: &[u8]) -> String {
    let encoded = STANDARD.encode(der);
    let mut pem = String::from("-----BEGIN CERTIFICATE-----\n");
    for line in encoded.as_bytes().chunks(64) {
        pem.push_str(&String::from_utf8_lossy(line));
        pem.push('\n');
    }
    pem.push_str("-----END CERTIFICATE-----");
    pem
}
