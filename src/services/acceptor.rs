//! # Connection Acceptor Module
//!
//! One [`ConnectionAcceptor`] runs per enabled protocol. It binds the
//! protocol's port, accepts connections until a shutdown signal arrives, and
//! spawns one independent session task per accepted socket. The task carries
//! the peer address observed at accept time and one permit from the shared
//! connection limiter, so the number of concurrent sessions across all
//! protocols stays bounded.
//!
//! ```text
//! ┌─────────────┐    ┌────────────────────┐    ┌──────────────────┐
//! │ Incoming    │───▶│ ConnectionAcceptor │───▶│ session task     │
//! │ Connections │    │                    │    │ (one per socket) │
//! └─────────────┘    │ - connection limit │    └──────────────────┘
//!                    │ - accept loop      │
//!                    └────────────────────┘
//! ```
//!
//! Transient accept errors are logged and the loop continues; only a bind
//! failure is fatal, and then only for the one service that failed to bind.

use crate::error_handling::types::NetworkError;
use crate::sink::{AttackEventSink, ServiceKind};
use log::{error, info};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Semaphore};

pub struct ConnectionAcceptor {
    service: ServiceKind,
    sink: Arc<AttackEventSink>,
    limiter: Arc<Semaphore>,
}

impl ConnectionAcceptor {
    pub fn new(service: ServiceKind, sink: Arc<AttackEventSink>, limiter: Arc<Semaphore>) -> Self {
        Self {
            service,
            sink,
            limiter,
        }
    }

    /// Binds `addr` and runs the accept loop until shutdown.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError::BindError`] when the port cannot be bound;
    /// the caller reports it and other services keep running.
    pub async fn serve<F, Fut>(
        &self,
        addr: SocketAddr,
        shutdown: watch::Receiver<bool>,
        handler: F,
    ) -> Result<(), NetworkError>
    where
        F: Fn(TcpStream, SocketAddr) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(NetworkError::BindError)?;
        self.serve_on(listener, shutdown, handler).await
    }

    /// Accept loop over an already-bound listener.
    ///
    /// A permit from the connection limiter is acquired before each accept
    /// and released by the session task when it finishes, so a flood of
    /// slow clients stalls the accept loop instead of exhausting the host.
    pub async fn serve_on<F, Fut>(
        &self,
        listener: TcpListener,
        mut shutdown: watch::Receiver<bool>,
        handler: F,
    ) -> Result<(), NetworkError>
    where
        F: Fn(TcpStream, SocketAddr) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let local_addr = listener.local_addr().map_err(NetworkError::BindError)?;
        info!("{} honeypot listening on {}", self.service, local_addr);

        let handler = Arc::new(handler);
        loop {
            let (stream, peer) = tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        error!("{} accept error: {}", self.service, e);
                        continue;
                    }
                },
                _ = shutdown.changed() => break,
            };

            // a full limiter stalls further accepts until a session ends
            let permit = tokio::select! {
                permit = self.limiter.clone().acquire_owned() => {
                    permit.map_err(|_| NetworkError::LimiterClosed)?
                }
                _ = shutdown.changed() => break,
            };

            self.sink.log_connection(self.service, peer);
            let handler = handler.clone();
            // in-flight sessions are detached: shutdown stops the accept
            // loop, never a running session
            tokio::spawn(async move {
                handler(stream, peer).await;
                drop(permit);
            });
        }

        info!("{} honeypot on {} shut down", self.service, local_addr);
        Ok(())
    }
}
