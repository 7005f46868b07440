//! Invocation parsing and configuration resolution
//!
//! [`Cli`] is the raw invocation exactly as clap hands it over; [`Config`]
//! is the validated form the rest of the binary consumes. Resolution never
//! produces a partial config: any problem with the arguments or the TLS
//! flags fails the whole invocation with a [`ConfigError`].

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::credentials::TransportCredential;
use crate::error::ConfigError;

/// probe - universal gRPC health-checker.
/// See https://github.com/grpc/grpc/blob/master/doc/health-checking.md
#[derive(Debug, Parser)]
#[command(name = "probe")]
#[command(version, about, long_about = None)]
#[command(override_usage = "probe [options] server_address [service_name]")]
pub struct Cli {
    /// Operation timeout
    #[arg(
        short = 't',
        long,
        value_name = "DURATION",
        default_value = "1s",
        value_parser = humantime::parse_duration
    )]
    pub timeout: Duration,

    /// Do not fail if service status is other than SERVING.
    /// Note: this has no effect on connection failures
    #[arg(short = 'n', long = "no-fail")]
    pub no_fail: bool,

    /// Use TLS, verify server with CA certificates installed on this host
    #[arg(long)]
    pub tls: bool,

    /// Use TLS, do NOT verify server (accept any certificate)
    #[arg(long = "tls-insecure")]
    pub tls_insecure: bool,

    /// Use TLS, verify server with the specified certificate
    #[arg(long = "tls-cert", value_name = "PATH")]
    pub tls_cert: Option<PathBuf>,

    /// server_address [service_name]
    #[arg(value_name = "ARGS")]
    pub args: Vec<String>,
}

/// Validated invocation, immutable for the lifetime of the process.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub server_address: String,
    /// Empty string means "the server as a whole" per the protocol
    pub service_name: String,
    pub timeout: Duration,
    pub no_fail: bool,
    pub credential: TransportCredential,
}

impl Config {
    /// Resolve the raw invocation into a validated configuration.
    pub fn resolve(cli: &Cli) -> Result<Self, ConfigError> {
        let (server_address, service_name) = match cli.args.as_slice() {
            [address] => (address.clone(), String::new()),
            [address, service] => (address.clone(), service.clone()),
            _ => return Err(ConfigError::ArgumentCount),
        };

        let credential =
            TransportCredential::resolve(cli.tls, cli.tls_insecure, cli.tls_cert.as_deref())?;

        Ok(Self {
            server_address,
            service_name,
            timeout: cli.timeout,
            no_fail: cli.no_fail,
            credential,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        Cli {
            timeout: Duration::from_secs(1),
            no_fail: false,
            tls: false,
            tls_insecure: false,
            tls_cert: None,
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    #[test]
    fn single_argument_targets_whole_server() {
        let config = Config::resolve(&cli(&["server"])).unwrap();
        assert_eq!(config.server_address, "server");
        assert_eq!(config.service_name, "");
    }

    #[test]
    fn second_argument_names_the_service() {
        let config = Config::resolve(&cli(&["server", "svc"])).unwrap();
        assert_eq!(config.server_address, "server");
        assert_eq!(config.service_name, "svc");
    }

    #[test]
    fn zero_arguments_are_rejected() {
        let err = Config::resolve(&cli(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::ArgumentCount));
    }

    #[test]
    fn three_arguments_are_rejected() {
        let err = Config::resolve(&cli(&["a", "b", "c"])).unwrap_err();
        assert!(matches!(err, ConfigError::ArgumentCount));
    }

    #[test]
    fn flags_pass_through_verbatim() {
        let mut raw = cli(&["server"]);
        raw.tls = true;
        raw.no_fail = true;
        raw.timeout = Duration::from_secs(60);

        let config = Config::resolve(&raw).unwrap();
        assert_eq!(config.credential, TransportCredential::TlsNativeRoots);
        assert!(config.no_fail);
        assert_eq!(config.timeout, Duration::from_secs(60));
    }

    #[test]
    fn tls_flag_conflicts_propagate() {
        let mut raw = cli(&["server"]);
        raw.tls = true;
        raw.tls_insecure = true;

        let err = Config::resolve(&raw).unwrap_err();
        assert!(matches!(err, ConfigError::ConflictingTlsModes));
    }

    #[test]
    fn resolution_is_idempotent() {
        let raw = cli(&["server", "svc"]);
        let first = Config::resolve(&raw).unwrap();
        let second = Config::resolve(&raw).unwrap();
        assert_eq!(first, second);
    }
}
