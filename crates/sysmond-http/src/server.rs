// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Serves `GET /metrics` from a [`Poller`].
//!
//! Each connection is served on its own task. The accept loop stops when
//! the cancellation token fires; connections still open at that point are
//! dropped.

use std::io;
use std::net::SocketAddr;

use hyper::{
    body::Incoming, http, server::conn::http1, service::service_fn, Method, Request, StatusCode,
};
use hyper_util::rt::TokioIo;
use sysmond_collector::Poller;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::error::ServerError;
use crate::http_utils::{create_metrics_response, log_and_create_http_response, HttpResponse};

pub const METRICS_ENDPOINT_PATH: &str = "/metrics";

pub struct MetricsServer {
    addr: SocketAddr,
    poller: Poller,
    cancel_token: CancellationToken,
}

impl MetricsServer {
    #[must_use]
    pub fn new(addr: SocketAddr, poller: Poller, cancel_token: CancellationToken) -> Self {
        MetricsServer {
            addr,
            poller,
            cancel_token,
        }
    }

    /// Binds the configured address and serves until cancelled.
    pub async fn serve(self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: self.addr,
                source,
            })?;
        self.serve_on(listener).await
    }

    /// Serves on an already bound listener until cancelled. The configured
    /// address is ignored.
    pub async fn serve_on(self, listener: TcpListener) -> Result<(), ServerError> {
        match listener.local_addr() {
            Ok(addr) => debug!("Metrics server listening on {addr}"),
            Err(e) => debug!("Metrics server listening on unknown address: {e}"),
        }

        let poller = self.poller;
        let service = service_fn(move |req| {
            let poller = poller.clone();
            endpoint_handler(req, poller)
        });

        let server = http1::Builder::new();
        let mut joinset = JoinSet::new();

        loop {
            let conn = tokio::select! {
                biased;
                () = self.cancel_token.cancelled() => {
                    debug!("Metrics server stopping, dropping {} open connections", joinset.len());
                    return Ok(());
                },
                con_res = listener.accept() => match con_res {
                    Err(e)
                        if matches!(
                            e.kind(),
                            io::ErrorKind::ConnectionAborted
                                | io::ErrorKind::ConnectionReset
                                | io::ErrorKind::ConnectionRefused
                        ) =>
                    {
                        continue;
                    }
                    Err(e) => {
                        error!("Server error: {e}");
                        return Err(ServerError::Accept(e));
                    }
                    Ok((conn, _)) => conn,
                },
                finished = async {
                    match joinset.join_next().await {
                        Some(finished) => finished,
                        None => std::future::pending().await,
                    }
                } => match finished {
                    Err(e) if e.is_panic() => {
                        error!("Connection handler panicked: {e:?}");
                        continue;
                    },
                    Ok(()) | Err(_) => continue,
                },
            };
            let conn = TokioIo::new(conn);
            let server = server.clone();
            let service = service.clone();
            joinset.spawn(async move {
                if let Err(e) = server.serve_connection(conn, service).await {
                    debug!("Connection error: {e}");
                }
            });
        }
    }
}

async fn endpoint_handler(req: Request<Incoming>, poller: Poller) -> http::Result<HttpResponse> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, METRICS_ENDPOINT_PATH) => {
            let (timestamp, snapshot) = poller.metrics().await;
            create_metrics_response(timestamp, &snapshot)
        }
        (method, METRICS_ENDPOINT_PATH) => log_and_create_http_response(
            &format!("Method {method} not allowed on {METRICS_ENDPOINT_PATH}"),
            StatusCode::METHOD_NOT_ALLOWED,
        ),
        (_, path) => log_and_create_http_response(
            &format!("Not found: {path}"),
            StatusCode::NOT_FOUND,
        ),
    }
}
