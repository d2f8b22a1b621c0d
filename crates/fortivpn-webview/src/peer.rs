//! Where the certificate chain of a refused origin comes from.
//!
//! The browser is asked first (`Network.getCertificate`), so the chain that
//! gets checked is the one it actually received. When it has none, a TLS
//! handshake to the same host and port records the chain instead.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, ClientConnection, DigitallySignedStruct, SignatureScheme};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;
use url::{Host, Url};

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Host and port a certificate was presented for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Origin {
    pub host: String,
    pub port: u16,
}

impl Origin {
    /// Extracts the origin of an `https` (or `wss`) URL.
    pub fn from_url(url: &str) -> anyhow::Result<Self> {
        let parsed = Url::parse(url)?;
        let host = match parsed.host() {
            Some(Host::Domain(d)) => d.to_string(),
            Some(Host::Ipv4(ip)) => ip.to_string(),
            Some(Host::Ipv6(ip)) => ip.to_string(),
            None => anyhow::bail!("URL has no host: {}", url),
        };
        let port = parsed
            .port_or_known_default()
            .ok_or_else(|| anyhow::anyhow!("URL has no port: {}", url))?;
        Ok(Self { host, port })
    }
}

/// Serialized web origin (`https://host[:port]`) of a URL, the key the
/// browser files certificates under.
pub fn web_origin(url: &str) -> Option<String> {
    let origin = Url::parse(url).ok()?.origin();
    origin.is_tuple().then(|| origin.ascii_serialization())
}

/// Decodes the base64 DER certificates the browser returns, leaf first.
pub fn chain_from_table_names(names: &[String]) -> anyhow::Result<Vec<CertificateDer<'static>>> {
    names
        .iter()
        .map(|name| -> anyhow::Result<CertificateDer<'static>> {
            let der = STANDARD.decode(name.trim())?;
            Ok(CertificateDer::from(der))
        })
        .collect()
}

/// Verifier that lets every handshake through so the peer chain can be
/// inspected afterwards. Handshake signatures are still checked.
#[derive(Debug)]
struct RecordingVerifier(Arc<CryptoProvider>);

impl ServerCertVerifier for RecordingVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}

/// Opens a TLS connection to `origin` and returns the chain the server
/// presents, leaf first. Nothing is sent after the handshake.
pub fn fetch_peer_chain(origin: &Origin) -> anyhow::Result<Vec<CertificateDer<'static>>> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = ClientConfig::builder_with_provider(Arc::clone(&provider))
        .with_safe_default_protocol_versions()?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(RecordingVerifier(provider)))
        .with_no_client_auth();

    let server_name = ServerName::try_from(origin.host.clone())?;
    let mut conn = ClientConnection::new(Arc::new(config), server_name)?;

    let addr = (origin.host.as_str(), origin.port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| anyhow::anyhow!("Cannot resolve {}", origin.host))?;
    let mut sock = TcpStream::connect_timeout(&addr, HANDSHAKE_TIMEOUT)?;
    sock.set_read_timeout(Some(HANDSHAKE_TIMEOUT))?;
    sock.set_write_timeout(Some(HANDSHAKE_TIMEOUT))?;

    while conn.is_handshaking() {
        conn.complete_io(&mut sock)?;
    }

    let chain: Vec<CertificateDer<'static>> = conn
        .peer_certificates()
        .map(|certs| certs.iter().map(|c| c.clone().into_owned()).collect())
        .unwrap_or_default();
    conn.send_close_notify();
    let _ = conn.complete_io(&mut sock);

    log::debug!(
        "Fetched {} certificate(s) from {}:{}",
        chain.len(),
        origin.host,
        origin.port
    );
    Ok(chain)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn https_origin_defaults_to_443() {
        let origin = Origin::from_url("https://vpn.example.com/remote/saml/start").unwrap();
        assert_eq!(
            origin,
            Origin {
                host: "vpn.example.com".to_string(),
                port: 443
            }
        );
    }

    #[test]
    fn explicit_port_is_kept() {
        let origin = Origin::from_url("https://10.0.0.1:10443/sslvpn/portal.html").unwrap();
        assert_eq!(origin.host, "10.0.0.1");
        assert_eq!(origin.port, 10443);
    }

    #[test]
    fn ipv6_host_has_no_brackets() {
        let origin = Origin::from_url("https://[::1]:8443/").unwrap();
        assert_eq!(origin.host, "::1");
        assert_eq!(origin.port, 8443);
    }

    #[test]
    fn web_origin_drops_default_port_and_path() {
        assert_eq!(
            web_origin("https://vpn.example.com:443/remote/saml/start?realm=x").as_deref(),
            Some("https://vpn.example.com")
        );
        assert_eq!(
            web_origin("https://vpn.example.com:10443/sslvpn/portal.html").as_deref(),
            Some("https://vpn.example.com:10443")
        );
        assert_eq!(web_origin("data:text/html,<html></html>"), None);
    }

    #[test]
    fn browser_certificates_are_decoded_in_order() {
        let leaf = vec![0x30, 0x03, 1, 1, 1];
        let issuer = vec![0x30, 0x03, 2, 2, 2];
        let names = vec![STANDARD.encode(&leaf), STANDARD.encode(&issuer)];

        let chain = chain_from_table_names(&names).unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0].as_ref(), leaf.as_slice());
        assert_eq!(chain[1].as_ref(), issuer.as_slice());
    }

    #[test]
    fn undecodable_browser_certificate_is_an_error() {
        assert!(chain_from_table_names(&["not base64!".to_string()]).is_err());
        assert!(chain_from_table_names(&[]).unwrap().is_empty());
    }

    #[test]
    fn url_without_host_is_rejected() {
        assert!(Origin::from_url("data:text/html,<html></html>").is_err());
        assert!(Origin::from_url("not a url").is_err());
    }
}
