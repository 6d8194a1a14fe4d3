// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// TCP accept loop for the HTTP front-end.
//
// One task per connection, one request per connection.  The listener runs
// until `stop` is called; connections already being served finish normally.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use cniwerk_core::error::{CniError, Result};

use crate::http::{self, MULTIPART_OVERHEAD};
use crate::routes;
use crate::services::Services;

/// Time allowed for a client to deliver its whole request.
const REQUEST_READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Lifecycle of the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerStatus {
    Stopped,
    Running,
}

/// HTTP front-end.
pub struct VerifyServer {
    services: Arc<Services>,
    status: ServerStatus,
    local_addr: Option<SocketAddr>,
    shutdown_signal: Arc<Notify>,
    task_handle: Option<JoinHandle<()>>,
    active_connections: Arc<AtomicU32>,
}

impl VerifyServer {
    pub fn new(services: Arc<Services>) -> Self {
        Self {
            services,
            status: ServerStatus::Stopped,
            local_addr: None,
            shutdown_signal: Arc::new(Notify::new()),
            task_handle: None,
            active_connections: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn status(&self) -> ServerStatus {
        self.status
    }

    /// Bound address once running.  Useful with port 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn active_connections(&self) -> u32 {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Bind `0.0.0.0:{port}` and start accepting connections.
    pub async fn start(&mut self) -> Result<SocketAddr> {
        if let (ServerStatus::Running, Some(addr)) = (self.status, self.local_addr) {
            debug!(%addr, "server already running");
            return Ok(addr);
        }

        let bind_addr: SocketAddr = ([0, 0, 0, 0], self.services.config.port).into();
        let listener = TcpListener::bind(bind_addr).await.map_err(|e| {
            CniError::Config(format!("cannot listen on {bind_addr}: {e}"))
        })?;
        let local_addr = listener.local_addr()?;
        info!(addr = %local_addr, "CNI verification service listening");

        let shutdown = Arc::clone(&self.shutdown_signal);
        let services = Arc::clone(&self.services);
        let connections = Arc::clone(&self.active_connections);
        let handle = tokio::spawn(async move {
            accept_loop(listener, shutdown, services, connections).await;
        });

        self.task_handle = Some(handle);
        self.local_addr = Some(local_addr);
        self.status = ServerStatus::Running;
        Ok(local_addr)
    }

    /// Stop accepting connections and refuse new jobs.
    pub async fn stop(&mut self) -> Result<()> {
        if self.status != ServerStatus::Running {
            return Ok(());
        }
        info!("stopping CNI verification service");

        self.services.limiter.close();
        self.shutdown_signal.notify_one();
        if let Some(handle) = self.task_handle.take() {
            handle
                .await
                .map_err(|e| CniError::Config(format!("accept loop join: {e}")))?;
        }

        self.status = ServerStatus::Stopped;
        self.local_addr = None;
        info!("CNI verification service stopped");
        Ok(())
    }
}

async fn accept_loop(
    listener: TcpListener,
    shutdown: Arc<Notify>,
    services: Arc<Services>,
    connections: Arc<AtomicU32>,
) {
    loop {
        tokio::select! {
            _ = shutdown.notified() => {
                debug!("accept loop received shutdown signal");
                break;
            }

            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        debug!(%peer, "connection accepted");
                        let services = Arc::clone(&services);
                        let connections = Arc::clone(&connections);
                        tokio::spawn(async move {
                            connections.fetch_add(1, Ordering::Relaxed);
                            if let Err(e) = handle_connection(stream, peer, &services).await {
                                warn!(%peer, error = %e, "connection handler error");
                            }
                            connections.fetch_sub(1, Ordering::Relaxed);
                        });
                    }
                    Err(e) => error!(error = %e, "failed to accept connection"),
                }
            }
        }
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    services: &Services,
) -> Result<()> {
    let config = &services.config;
    let max_body = config.max_upload_bytes().saturating_add(MULTIPART_OVERHEAD);

    let read = tokio::time::timeout(
        REQUEST_READ_TIMEOUT,
        http::read_request(&mut stream, max_body, config.max_upload_mb),
    )
    .await;

    let request = match read {
        Err(_) => {
            let err = CniError::BadRequest("request not received in time".into());
            http::send_response(&mut stream, &routes::error_response(&err)).await?;
            return Ok(());
        }
        Ok(Err(e)) => {
            http::send_response(&mut stream, &routes::error_response(&e)).await?;
            return Ok(());
        }
        Ok(Ok(None)) => {
            debug!(%peer, "empty connection closed");
            return Ok(());
        }
        Ok(Ok(Some(request))) => request,
    };

    let response = routes::handle(services, &request).await;
    http::send_response(&mut stream, &response).await?;

    info!(
        %peer,
        method = %request.method,
        path = %request.path,
        status = response.status,
        "request served"
    );
    Ok(())
}
