//! Error types for the probe binary
//!
//! Each failure domain gets its own enum so the top level can map errors to
//! exit codes without inspecting message strings. All failures are terminal
//! for the invocation; nothing here is retried.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Malformed or contradictory invocation input.
///
/// Surfaced before any network activity and mapped to the usage exit code.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Wrong number of positional arguments
    #[error("exactly 1 to 2 arguments are required")]
    ArgumentCount,

    /// More than one of --tls, --tls-insecure and --tls-cert given
    #[error("at most one of --tls, --tls-insecure and --tls-cert should be provided")]
    ConflictingTlsModes,

    /// Certificate file could not be read
    #[error("failed to read certificate file '{path}': {source}")]
    CertificateRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Certificate file was readable but held no parseable certificate
    #[error("certificate file '{path}' contains no valid certificates")]
    CertificateInvalid { path: PathBuf },
}

/// Transport-establishment failure, including a deadline that fires before
/// the channel is ready.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("invalid server address '{address}': {source}")]
    InvalidAddress {
        address: String,
        #[source]
        source: tonic::transport::Error,
    },

    #[error("failed to connect to {address}: {source}")]
    Transport {
        address: String,
        #[source]
        source: tonic::transport::Error,
    },

    #[error("deadline exceeded while connecting to {address}")]
    DeadlineExceeded { address: String },
}

/// Failure of the health-check round trip itself.
#[derive(Debug, Error)]
pub enum RpcError {
    /// The server answered with a gRPC error status
    #[error("health check failed: {0}")]
    Status(#[from] tonic::Status),

    /// The response carried a status enumerant outside the known range
    #[error("health check returned malformed status value {0}")]
    MalformedStatus(i32),

    #[error("deadline exceeded while waiting for health check response")]
    DeadlineExceeded,
}

/// Sum of the runtime failures the controller handles after configuration
/// has been resolved. Both map to the unexpected-failure exit code.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    Rpc(#[from] RpcError),
}
