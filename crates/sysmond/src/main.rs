// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::{env, future, process, time::Duration};

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use sysmond_collector::Poller;
use sysmond_http::{MetricsServer, ServerError};

mod config;
mod error;
mod registry;

use config::{Config, DEFAULT_LOG_LEVEL, LOG_LEVEL_VAR};

#[tokio::main]
pub async fn main() {
    // Read ahead of Config so config errors can be logged; Config validates it.
    let log_level = env::var(LOG_LEVEL_VAR)
        .map(|val| val.trim().to_lowercase())
        .unwrap_or(DEFAULT_LOG_LEVEL.to_string());

    let env_filter = format!("hyper=off,{}", log_level);

    #[allow(clippy::expect_used)]
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter).expect("could not parse log level in configuration"),
        )
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time()
        .finish();

    #[allow(clippy::expect_used)]
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    debug!("Logging subsystem enabled");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Error reading sysmond configuration: {e}");
            process::exit(1);
        }
    };

    info!(
        "System monitor daemon v{} starting on {}, polling every {:?}",
        env!("CARGO_PKG_VERSION"),
        config.address,
        config.interval
    );

    let cancel_token = CancellationToken::new();
    let collector = registry::build_collector(&config);
    let poller = Poller::with_timeout(
        cancel_token.child_token(),
        collector,
        config.interval,
        config.timeout,
    );
    let server = MetricsServer::new(config.address, poller.clone(), cancel_token.child_token());
    let mut server_handle = tokio::spawn(server.serve());

    let mut server_failed = false;
    tokio::select! {
        () = shutdown_signal() => {
            info!("Received shutdown signal");
        },
        () = run_for(config.run_for) => {
            info!("Run time of {:?} elapsed", config.run_for.unwrap_or_default());
        },
        result = &mut server_handle => {
            server_failed = true;
            log_server_exit(result);
        },
    }

    cancel_token.cancel();
    poller.stopped().await;
    if !server_failed {
        log_server_exit(server_handle.await);
    }
    info!("System monitor daemon stopped");

    if server_failed {
        process::exit(1);
    }
}

/// Waits for Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Unable to listen for Ctrl-C: {e}");
            future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Unable to listen for SIGTERM: {e}");
                future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

async fn run_for(run_for: Option<Duration>) {
    match run_for {
        Some(run_for) => sleep(run_for).await,
        None => future::pending().await,
    }
}

fn log_server_exit(result: Result<Result<(), ServerError>, tokio::task::JoinError>) {
    match result {
        Ok(Ok(())) => debug!("Metrics server stopped"),
        Ok(Err(e)) => error!("Metrics server failed: {e}"),
        Err(e) => error!("Metrics server task failed: {e}"),
    }
}
