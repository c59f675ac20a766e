//! # Tls
//!
//! Trust material and TLS handshakes for control and data channels

use std::fmt;
use std::net::TcpStream;
use std::path::Path;
use std::sync::Arc;

use rustls::crypto::ring;
use rustls::{ClientConfig, ClientConnection, RootCertStore, StreamOwned};
use rustls_pki_types::pem::PemObject;
use rustls_pki_types::{CertificateDer, ServerName};

use crate::{FtpError, FtpResult};

/// A TLS stream over a plain tcp socket
pub type TlsStream = StreamOwned<ClientConnection, TcpStream>;

/// Opaque source of trust handed to a session.
///
/// Cloning is cheap: every clone shares the same rustls [`ClientConfig`], so it can be handed
/// to the sub-sessions of a parallel transfer.
#[derive(Clone)]
pub struct TrustMaterial {
    config: Arc<ClientConfig>,
}

impl fmt::Debug for TrustMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<?>")
    }
}

impl From<Arc<ClientConfig>> for TrustMaterial {
    fn from(config: Arc<ClientConfig>) -> Self {
        Self { config }
    }
}

impl TrustMaterial {
    /// Trust the certificates found in the PEM file at `path`
    pub fn from_pem_file(path: impl AsRef<Path>) -> FtpResult<Self> {
        let path = path.as_ref();
        debug!("loading trusted certificates from {}", path.display());
        let mut roots = RootCertStore::empty();
        let certs = CertificateDer::pem_file_iter(path).map_err(|e| {
            FtpError::SecureError(format!("cannot read {}: {e:?}", path.display()))
        })?;
        for cert in certs {
            let cert = cert.map_err(|e| {
                FtpError::SecureError(format!("bad certificate in {}: {e:?}", path.display()))
            })?;
            roots
                .add(cert)
                .map_err(|e| FtpError::SecureError(e.to_string()))?;
        }
        if roots.is_empty() {
            return Err(FtpError::SecureError(format!(
                "no certificate found in {}",
                path.display()
            )));
        }
        Self::from_root_store(roots)
    }

    /// Trust the certificates of `roots`
    pub fn from_root_store(roots: RootCertStore) -> FtpResult<Self> {
        let config = ClientConfig::builder_with_provider(Arc::new(ring::default_provider()))
            .with_safe_default_protocol_versions()
            .map_err(|e| FtpError::SecureError(e.to_string()))?
            .with_root_certificates(roots)
            .with_no_client_auth();
        Ok(Self::from(Arc::new(config)))
    }

    /// Accept any server certificate.
    ///
    /// Only meant for self-signed test servers: the peer is not authenticated.
    pub fn insecure() -> FtpResult<Self> {
        warn!("server certificates won't be verified");
        let config = ClientConfig::builder_with_provider(Arc::new(ring::default_provider()))
            .with_safe_default_protocol_versions()
            .map_err(|e| FtpError::SecureError(e.to_string()))?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(danger::NoCertificateVerification))
            .with_no_client_auth();
        Ok(Self::from(Arc::new(config)))
    }

    /// Run a client handshake for `domain` over `stream`.
    ///
    /// The handshake is completed before returning, so that a bad peer is reported here
    /// and not on the first read. Only fit for the control channel, where the server starts
    /// its side right after `234`.
    pub(crate) fn handshake(&self, domain: &str, stream: TcpStream) -> Result<TlsStream, String> {
        let mut stream = self.wrap(domain, stream)?;
        while stream.conn.is_handshaking() {
            stream
                .conn
                .complete_io(&mut stream.sock)
                .map_err(|e| format!("handshake failed: {e}"))?;
        }
        trace!("TLS handshake with {domain} completed");
        Ok(stream)
    }

    /// Wrap `stream` in a client session for `domain` without any I/O.
    ///
    /// The handshake runs on the first read, write or flush. Data connections are wrapped this
    /// way: the server only starts its side once the transfer command was accepted.
    pub(crate) fn wrap(&self, domain: &str, stream: TcpStream) -> Result<TlsStream, String> {
        let server_name = ServerName::try_from(domain.to_string()).map_err(|e| e.to_string())?;
        let connection = ClientConnection::new(Arc::clone(&self.config), server_name)
            .map_err(|e| e.to_string())?;
        Ok(StreamOwned::new(connection, stream))
    }
}

mod danger {
    use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
    use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
    use rustls::DigitallySignedStruct;

    /// Certificate verifier that accepts any certificate
    #[derive(Debug)]
    pub struct NoCertificateVerification;

    impl ServerCertVerifier for NoCertificateVerification {
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
            _message: &[u8],
            _cert: &CertificateDer<'_>,
            _dss: &DigitallySignedStruct,
        ) -> Result<HandshakeSignatureValid, rustls::Error> {
            Ok(HandshakeSignatureValid::assertion())
        }

        fn verify_tls13_signature(
            &self,
            _message: &[u8],
            _cert: &CertificateDer<'_>,
            _dss: &DigitallySignedStruct,
        ) -> Result<HandshakeSignatureValid, rustls::Error> {
            Ok(HandshakeSignatureValid::assertion())
        }

        fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
            rustls::crypto::ring::default_provider()
                .signature_verification_algorithms
                .supported_schemes()
        }
    }
}
