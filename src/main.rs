//! probe - universal gRPC health-checker
//!
//! Checks a remote server over the standard grpc.health.v1 protocol, prints
//! the resulting status and exits with a code scripts can branch on.

use clap::Parser;
use colored::Colorize;
use tokio::time::{timeout_at, Instant};

mod client;
mod config;
mod credentials;
mod error;

use client::HealthStatus;
use config::{Cli, Config};
use error::{ConnectError, ProbeError, RpcError};

/// Returned if the application is used incorrectly
const EXIT_USAGE: i32 = 1;
/// Returned if the health status is anything other than SERVING
const EXIT_HEALTH_CHECK_NEGATIVE: i32 = 2;
/// Returned if any other error happens
const EXIT_UNEXPECTED: i32 = 127;

#[tokio::main]
async fn main() {
    // clap routes --help and --version through the error path as well;
    // only genuine parse failures count as usage errors.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() { EXIT_USAGE } else { 0 };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    let config = match Config::resolve(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            std::process::exit(EXIT_USAGE);
        }
    };

    std::process::exit(run(&config).await);
}

/// Single-pass controller: connect, check, report.
async fn run(config: &Config) -> i32 {
    match probe(config).await {
        Ok(status) => {
            println!("{status}");
            if config.no_fail || status == HealthStatus::Serving {
                0
            } else {
                eprintln!("health-check failed");
                EXIT_HEALTH_CHECK_NEGATIVE
            }
        }
        Err(e) => {
            // Connection and RPC failures ignore --no-fail: not being able
            // to determine health is different from health being bad.
            eprintln!("{} {}", "Error:".red().bold(), e);
            EXIT_UNEXPECTED
        }
    }
}

/// Run connect + health check under one deadline anchored at invocation
/// start. The channel is dropped on every path when this returns.
async fn probe(config: &Config) -> Result<HealthStatus, ProbeError> {
    let deadline = Instant::now() + config.timeout;

    let channel = timeout_at(
        deadline,
        client::connect(&config.server_address, &config.credential),
    )
    .await
    .map_err(|_| ConnectError::DeadlineExceeded {
        address: config.server_address.clone(),
    })??;

    // The RPC only gets whatever budget connecting left over.
    let remaining = deadline.saturating_duration_since(Instant::now());
    let status = timeout_at(
        deadline,
        client::check(channel, &config.service_name, remaining),
    )
    .await
    .map_err(|_| RpcError::DeadlineExceeded)??;

    Ok(status)
}
