use rustls::{
    self,
    client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
    crypto::{verify_tls12_signature, verify_tls13_signature, WebPkiSupportedAlgorithms},
    pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime},
    ClientConfig, DigitallySignedStruct, SignatureScheme,
};

use crate::error::{Error, TransportError};

/// Create a `rustls::ClientConfig` from resolved TLS material.
pub(crate) fn rustls_client_config(
    identity_pem: Option<&[u8]>,
    root_certs: Option<&[Vec<u8>]>,
    accept_invalid: bool,
) -> Result<ClientConfig, Error> {
    let mut roots = rustls::RootCertStore::empty();
    if let Some(ders) = root_certs {
        for der in ders {
            roots
                .add(CertificateDer::from(der.to_vec()))
                .map_err(|e| Error::Transport(TransportError::Tls(format!("bad root certificate: {e}"))))?;
        }
    }

    let builder = ClientConfig::builder().with_root_certificates(roots);
    let mut config = if let Some(buf) = identity_pem {
        let (chain, key) = client_identity(buf)?;
        builder
            .with_client_auth_cert(chain, key)
            .map_err(|e| Error::Transport(TransportError::Tls(format!("bad client identity: {e}"))))?
    } else {
        builder.with_no_client_auth()
    };

    if accept_invalid {
        config
            .dangerous()
            .set_certificate_verifier(std::sync::Arc::new(NoCertificateVerification::new()));
    }

    Ok(config)
}

// Split a concatenated identity PEM into a certificate chain and private key.
fn client_identity(
    buf: &[u8],
) -> Result<(Vec<CertificateDer<'static>>, PrivateKeyDer<'static>), Error> {
    use rustls_pemfile::Item;

    let tls_error = |msg: &str| Error::Transport(TransportError::Tls(msg.into()));

    let mut certs = vec![];
    let mut key = None;
    let mut reader = std::io::Cursor::new(buf);
    for item in rustls_pemfile::read_all(&mut reader) {
        match item.map_err(|e| tls_error(&format!("invalid identity PEM: {e}")))? {
            Item::X509Certificate(cert) => certs.push(cert),
            Item::Pkcs8Key(k) => key = Some(PrivateKeyDer::Pkcs8(k)),
            Item::Pkcs1Key(k) => key = Some(PrivateKeyDer::Pkcs1(k)),
            Item::Sec1Key(k) => key = Some(PrivateKeyDer::Sec1(k)),
            _ => {}
        }
    }

    if certs.is_empty() {
        return Err(tls_error("identity PEM is missing a certificate"));
    }
    let key = key.ok_or_else(|| tls_error("identity PEM is missing a private key"))?;
    Ok((certs, key))
}

#[derive(Debug)]
struct NoCertificateVerification {
    supported: WebPkiSupportedAlgorithms,
}

impl NoCertificateVerification {
    fn new() -> Self {
        Self {
            supported: rustls::crypto::ring::default_provider().signature_verification_algorithms,
        }
    }
}

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
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.supported)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.supported)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.supported.supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_material_builds_a_config() {
        use rustls::client::ResolvesClientCert;
        let config = rustls_client_config(None, None, false).unwrap();
        assert!(!config.client_auth_cert_resolver.has_certs());
    }

    #[test]
    fn accept_invalid_installs_a_verifier() {
        // construction must not fail even with no roots configured
        rustls_client_config(None, None, true).unwrap();
    }

    #[test]
    fn garbage_identity_is_rejected() {
        let err = rustls_client_config(Some(b"not a pem"), None, false).unwrap_err();
        assert!(matches!(err, Error::Transport(TransportError::Tls(_))));
    }
}
