//! The decoy services.
//!
//! One submodule per protocol plus the shared [`acceptor`] every protocol
//! builds on. [`spawn_enabled`] is the start-up entry point: it spawns one
//! acceptor task per protocol the configuration enables; a disabled
//! protocol's port is never bound.

pub mod acceptor;
pub mod ftp;
pub mod http;
pub mod ssh;

#[cfg(test)]
mod integration_tests;

pub use acceptor::ConnectionAcceptor;
pub use ftp::FtpService;
pub use http::HttpService;
pub use ssh::SshService;

use crate::configuration::config::Config;
use crate::sink::AttackEventSink;
use log::error;
use std::sync::Arc;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;

/// Starts one task per enabled protocol and returns their names and join
/// handles, in start order.
///
/// Every acceptor shares one connection limiter sized by
/// `general.max_connections`. A service that fails to start (bind failure,
/// host key generation) reports the error and dies alone; the others keep
/// running.
pub fn spawn_enabled(
    config: Arc<Config>,
    sink: Arc<AttackEventSink>,
    shutdown: watch::Receiver<bool>,
) -> Vec<(&'static str, JoinHandle<()>)> {
    let limiter = Arc::new(Semaphore::new(config.general.max_connections));
    let mut running = Vec::new();

    if config.services.ssh.enabled {
        let config = config.clone();
        let sink = sink.clone();
        let shutdown = shutdown.clone();
        let limiter = limiter.clone();
        running.push((
            "SSH",
            tokio::spawn(async move {
                match SshService::new(config, sink) {
                    Ok(service) => {
                        if let Err(e) = service.run(shutdown, limiter).await {
                            error!("SSH service failed: {}", e);
                        }
                    }
                    Err(e) => error!("SSH service failed to start: {}", e),
                }
            }),
        ));
    }

    if config.services.http.enabled {
        let service = HttpService::new(config.clone(), sink.clone());
        let shutdown = shutdown.clone();
        let limiter = limiter.clone();
        running.push((
            "HTTP",
            tokio::spawn(async move {
                if let Err(e) = service.run(shutdown, limiter).await {
                    error!("HTTP service failed: {}", e);
                }
            }),
        ));
    }

    if config.services.ftp.enabled {
        let service = FtpService::new(config.clone(), sink.clone());
        let limiter = limiter.clone();
        running.push((
            "FTP",
            tokio::spawn(async move {
                if let Err(e) = service.run(shutdown, limiter).await {
                    error!("FTP service failed: {}", e);
                }
            }),
        ));
    }

    running
}
