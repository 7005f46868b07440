//! gRPC health-check protocol client
//!
//! Owns channel establishment for every credential mode and the single
//! `grpc.health.v1.Health/Check` round trip. See:
//! https://github.com/grpc/grpc/blob/master/doc/health-checking.md
//!
//! The connector never retries; reconnection behavior below the channel is
//! tonic's own and is left untouched.

use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tokio_rustls::rustls::client::danger::{
    HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier,
};
use tokio_rustls::rustls::crypto::{self, CryptoProvider};
use tokio_rustls::rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use tokio_rustls::rustls::{self, ClientConfig, DigitallySignedStruct, SignatureScheme};
use tokio_rustls::TlsConnector;
use tonic::transport::{Certificate, Channel, ClientTlsConfig, Endpoint, Uri};
use tonic_health::pb::health_check_response::ServingStatus;
use tonic_health::pb::health_client::HealthClient;
use tonic_health::pb::HealthCheckRequest;

use crate::credentials::TransportCredential;
use crate::error::{ConnectError, RpcError};

/// Health of the probed service as reported by the server.
///
/// `ServiceUnknown` is a successful response: the server understood the
/// request but has no service registered under the given name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Unknown,
    Serving,
    NotServing,
    ServiceUnknown,
}

impl From<ServingStatus> for HealthStatus {
    fn from(status: ServingStatus) -> Self {
        match status {
            ServingStatus::Unknown => Self::Unknown,
            ServingStatus::Serving => Self::Serving,
            ServingStatus::NotServing => Self::NotServing,
            ServingStatus::ServiceUnknown => Self::ServiceUnknown,
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "UNKNOWN"),
            Self::Serving => write!(f, "SERVING"),
            Self::NotServing => write!(f, "NOT_SERVING"),
            Self::ServiceUnknown => write!(f, "SERVICE_UNKNOWN"),
        }
    }
}

/// Establish a channel to `address` secured according to `credential`.
///
/// The caller bounds this with the invocation deadline; on its own it only
/// fails, it never retries.
pub async fn connect(
    address: &str,
    credential: &TransportCredential,
) -> Result<Channel, ConnectError> {
    tracing::debug!(address, "connecting");
    match credential {
        TransportCredential::Plaintext => {
            let endpoint = endpoint_for(address, "http")?;
            endpoint
                .connect()
                .await
                .map_err(|e| transport_error(address, e))
        }
        TransportCredential::TlsNativeRoots => {
            connect_tls(address, ClientTlsConfig::new().with_native_roots()).await
        }
        TransportCredential::TlsCustomCa { pem } => {
            let tls = ClientTlsConfig::new().ca_certificate(Certificate::from_pem(pem));
            connect_tls(address, tls).await
        }
        TransportCredential::TlsInsecure => connect_skip_verify(address).await,
    }
}

/// Issue exactly one health-check request for `service` (empty string means
/// "the server as a whole") and interpret the response.
///
/// `remaining` is the unspent part of the invocation deadline; it is also
/// propagated on the wire as the request timeout so the server sees the
/// same budget.
pub async fn check(
    channel: Channel,
    service: &str,
    remaining: Duration,
) -> Result<HealthStatus, RpcError> {
    let mut client = HealthClient::new(channel);

    let mut request = tonic::Request::new(HealthCheckRequest {
        service: service.to_owned(),
    });
    request.set_timeout(remaining);

    let response = client.check(request).await?;
    let raw = response.into_inner().status;
    let status = ServingStatus::try_from(raw).map_err(|_| RpcError::MalformedStatus(raw))?;
    tracing::debug!(service, %raw, "health check answered");

    Ok(HealthStatus::from(status))
}

fn endpoint_for(address: &str, scheme: &str) -> Result<Endpoint, ConnectError> {
    Endpoint::from_shared(format!("{scheme}://{address}")).map_err(|e| {
        ConnectError::InvalidAddress {
            address: address.to_owned(),
            source: e,
        }
    })
}

fn transport_error(address: &str, source: tonic::transport::Error) -> ConnectError {
    ConnectError::Transport {
        address: address.to_owned(),
        source,
    }
}

async fn connect_tls(address: &str, tls: ClientTlsConfig) -> Result<Channel, ConnectError> {
    let endpoint = endpoint_for(address, "https")?
        .tls_config(tls)
        .map_err(|e| transport_error(address, e))?;
    endpoint
        .connect()
        .await
        .map_err(|e| transport_error(address, e))
}

/// TLS without certificate verification.
///
/// tonic's `ClientTlsConfig` has no verification toggle, so this mode builds
/// the rustls session by hand and feeds tonic the finished stream through a
/// custom connector.
async fn connect_skip_verify(address: &str) -> Result<Channel, ConnectError> {
    let mut config = ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(NoVerification::new()))
        .with_no_client_auth();
    // gRPC requires HTTP/2 on the wire
    config.alpn_protocols = vec![b"h2".to_vec()];
    let connector = TlsConnector::from(Arc::new(config));

    // The scheme here is only routing input for the connector; TLS is
    // layered inside it, so the endpoint itself stays untyped http.
    let endpoint = endpoint_for(address, "http")?;
    endpoint
        .connect_with_connector(tower::service_fn(move |uri: Uri| {
            let connector = connector.clone();
            async move {
                let host = uri
                    .host()
                    .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "address has no host"))?
                    .to_string();
                let port = uri.port_u16().unwrap_or(443);

                let stream = TcpStream::connect((host.as_str(), port)).await?;
                let domain = ServerName::try_from(host)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
                let tls_stream = connector.connect(domain, stream).await?;
                Ok::<_, io::Error>(TokioIo::new(tls_stream))
            }
        }))
        .await
        .map_err(|e| transport_error(address, e))
}

/// Verifier that accepts any server certificate.
///
/// Signature checks still run against the handshake transcript; only the
/// certificate chain and hostname checks are skipped.
#[derive(Debug)]
struct NoVerification(CryptoProvider);

impl NoVerification {
    fn new() -> Self {
        Self(crypto::ring::default_provider())
    }
}

impl ServerCertVerifier for NoVerification {
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
        crypto::verify_tls12_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        crypto::verify_tls13_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_displays_canonical_protocol_names() {
        assert_eq!(HealthStatus::Unknown.to_string(), "UNKNOWN");
        assert_eq!(HealthStatus::Serving.to_string(), "SERVING");
        assert_eq!(HealthStatus::NotServing.to_string(), "NOT_SERVING");
        assert_eq!(HealthStatus::ServiceUnknown.to_string(), "SERVICE_UNKNOWN");
    }

    #[test]
    fn wire_enum_maps_one_to_one() {
        assert_eq!(
            HealthStatus::from(ServingStatus::Serving),
            HealthStatus::Serving
        );
        assert_eq!(
            HealthStatus::from(ServingStatus::ServiceUnknown),
            HealthStatus::ServiceUnknown
        );
    }
}
