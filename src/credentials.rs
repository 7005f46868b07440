//! Transport credential resolution
//!
//! Turns the three mutually exclusive TLS flags into a single
//! [`TransportCredential`] variant. Building the variant is all-or-nothing:
//! a conflicting flag set is rejected before any file I/O, so a readable
//! certificate next to a second selector never yields a usable credential.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// How the channel to the target is secured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCredential {
    /// No transport security, plaintext HTTP/2
    Plaintext,
    /// TLS with the CA certificates installed on this host
    TlsNativeRoots,
    /// TLS without certificate verification (accept any server certificate)
    TlsInsecure,
    /// TLS with trust anchored to a caller-supplied CA bundle
    TlsCustomCa { pem: Vec<u8> },
}

impl TransportCredential {
    /// Resolve the TLS flags into a credential.
    ///
    /// At most one selector may be active; zero selectors means plaintext.
    pub fn resolve(
        tls: bool,
        tls_insecure: bool,
        tls_cert: Option<&Path>,
    ) -> Result<Self, ConfigError> {
        let selected = [tls, tls_insecure, tls_cert.is_some()]
            .iter()
            .filter(|set| **set)
            .count();
        if selected > 1 {
            return Err(ConfigError::ConflictingTlsModes);
        }

        if tls {
            Ok(Self::TlsNativeRoots)
        } else if tls_insecure {
            Ok(Self::TlsInsecure)
        } else if let Some(path) = tls_cert {
            Ok(Self::TlsCustomCa {
                pem: load_ca_bundle(path)?,
            })
        } else {
            Ok(Self::Plaintext)
        }
    }
}

/// Read a PEM CA bundle from disk, requiring at least one certificate.
///
/// The raw PEM bytes are kept for the channel builder; parsing here only
/// validates that the file is a usable bundle so bad input surfaces as a
/// usage error instead of a connect failure.
fn load_ca_bundle(path: &Path) -> Result<Vec<u8>, ConfigError> {
    let file = File::open(path).map_err(|e| ConfigError::CertificateRead {
        path: PathBuf::from(path),
        source: e,
    })?;
    let mut reader = BufReader::new(file);

    let certs: Vec<_> = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ConfigError::CertificateRead {
            path: PathBuf::from(path),
            source: e,
        })?;
    if certs.is_empty() {
        return Err(ConfigError::CertificateInvalid {
            path: PathBuf::from(path),
        });
    }

    std::fs::read(path).map_err(|e| ConfigError::CertificateRead {
        path: PathBuf::from(path),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const CA_PEM: &[u8] = include_bytes!("../tests/fixtures/server.crt");

    fn write_temp(contents: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn no_selector_is_plaintext() {
        let creds = TransportCredential::resolve(false, false, None).unwrap();
        assert_eq!(creds, TransportCredential::Plaintext);
    }

    #[test]
    fn tls_selector_uses_native_roots() {
        let creds = TransportCredential::resolve(true, false, None).unwrap();
        assert_eq!(creds, TransportCredential::TlsNativeRoots);
    }

    #[test]
    fn insecure_selector_disables_verification() {
        let creds = TransportCredential::resolve(false, true, None).unwrap();
        assert_eq!(creds, TransportCredential::TlsInsecure);
    }

    #[test]
    fn cert_selector_loads_bundle() {
        let file = write_temp(CA_PEM);
        let creds = TransportCredential::resolve(false, false, Some(file.path())).unwrap();
        assert_eq!(
            creds,
            TransportCredential::TlsCustomCa {
                pem: CA_PEM.to_vec()
            }
        );
    }

    #[test]
    fn every_conflicting_pair_is_rejected() {
        let file = write_temp(CA_PEM);
        let pairs: [(bool, bool, Option<&Path>); 4] = [
            (true, true, None),
            (true, false, Some(file.path())),
            (false, true, Some(file.path())),
            (true, true, Some(file.path())),
        ];
        for (tls, insecure, cert) in pairs {
            let err = TransportCredential::resolve(tls, insecure, cert).unwrap_err();
            assert!(matches!(err, ConfigError::ConflictingTlsModes));
        }
    }

    #[test]
    fn conflict_wins_over_valid_certificate() {
        // The cert file would resolve on its own; with --tls also set the
        // whole resolution must fail rather than fall back to either mode.
        let file = write_temp(CA_PEM);
        let err = TransportCredential::resolve(true, false, Some(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::ConflictingTlsModes));
    }

    #[test]
    fn missing_cert_file_is_a_config_error() {
        let err =
            TransportCredential::resolve(false, false, Some(Path::new("/nonexistent/ca.pem")))
                .unwrap_err();
        assert!(matches!(err, ConfigError::CertificateRead { .. }));
    }

    #[test]
    fn non_pem_cert_file_is_a_config_error() {
        let file = write_temp(b"this is not a certificate\n");
        let err = TransportCredential::resolve(false, false, Some(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::CertificateInvalid { .. }));
    }
}
