// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// cniwerk: French identity card verification service.
//
// Entry point.  Initialises logging, reads the configuration from the
// environment, starts the services and serves until Ctrl-C.

use std::process::ExitCode;

use cniwerk_core::ServiceConfig;
use cniwerk_server::{Services, VerifyServer};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("cniwerk starting");

    let config = match ServiceConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let services = Services::init(config).await;
    let mut server = VerifyServer::new(services);
    if let Err(e) = server.start().await {
        tracing::error!(error = %e, "failed to start");
        return ExitCode::FAILURE;
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "cannot listen for shutdown signal");
    }

    if let Err(e) = server.stop().await {
        tracing::warn!(error = %e, "unclean shutdown");
    }
    ExitCode::SUCCESS
}
