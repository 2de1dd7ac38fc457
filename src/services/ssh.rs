//! SSH decoy: a real SSH transport whose only policy is to record every
//! authentication attempt and refuse it.
//!
//! The wire protocol itself (key exchange, encryption, server-role
//! negotiation) is delegated to `russh`; this module supplies the
//! authentication policy object and the per-connection life cycle around it.

use crate::configuration::config::Config;
use crate::error_handling::types::{NetworkError, SessionError};
use crate::services::acceptor::ConnectionAcceptor;
use crate::sink::{AttackEvent, AttackEventSink, EventData, ServiceKind};
use log::{debug, error};
use rand::rngs::OsRng;
use russh::keys::{Algorithm, PrivateKey, PublicKey};
use russh::server::{Auth, Handler, Msg, Session};
use russh::{Channel, MethodKind, MethodSet, SshId};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{watch, Notify, Semaphore};
use uuid::Uuid;

/// How long a finished handshake may wait for a post-authentication channel
/// before the transport is torn down.
const CHANNEL_WAIT: Duration = Duration::from_secs(20);

/// The SSH decoy service.
///
/// Owns the engine configuration for the whole run: the version banner from
/// the service configuration and a fresh Ed25519 host key generated at
/// start-up, with `password` and `publickey` advertised so every kind of
/// credential gets attempted.
pub struct SshService {
    config: Arc<Config>,
    sink: Arc<AttackEventSink>,
    engine: Arc<russh::server::Config>,
}

impl SshService {
    pub fn new(config: Arc<Config>, sink: Arc<AttackEventSink>) -> Result<Self, SessionError> {
        let host_key = PrivateKey::random(&mut OsRng, Algorithm::Ed25519)
            .map_err(|e| SessionError::KeyGeneration(e.to_string()))?;
        let engine = russh::server::Config {
            server_id: SshId::Standard(config.services.ssh.banner.clone()),
            methods: MethodSet::from(&[MethodKind::Password, MethodKind::PublicKey][..]),
            keys: vec![host_key],
            ..Default::default()
        };
        Ok(Self {
            config,
            sink,
            engine: Arc::new(engine),
        })
    }

    pub async fn run(
        self,
        shutdown: watch::Receiver<bool>,
        limiter: Arc<Semaphore>,
    ) -> Result<(), NetworkError> {
        let addr = SocketAddr::new(
            self.config.general.bind_address,
            self.config.services.ssh.port,
        );
        let acceptor = ConnectionAcceptor::new(ServiceKind::Ssh, self.sink.clone(), limiter);
        let engine = self.engine.clone();
        let sink = self.sink.clone();
        acceptor
            .serve(addr, shutdown, move |stream, peer| {
                let engine = engine.clone();
                let sink = sink.clone();
                async move {
                    if let Err(e) = handle_client(engine, stream, peer, sink).await {
                        error!("SSH error from {}: {}", peer, e);
                    }
                }
            })
            .await
    }
}

/// Drives one accepted socket through the engine.
///
/// The transport is closed when the session ends on its own, when the peer
/// opens a post-authentication channel, or after [`CHANNEL_WAIT`], whichever
/// comes first.
async fn handle_client(
    engine: Arc<russh::server::Config>,
    stream: TcpStream,
    peer: SocketAddr,
    sink: Arc<AttackEventSink>,
) -> Result<(), SessionError> {
    let channel_opened = Arc::new(Notify::new());
    let policy = SshSession::new(peer, sink, channel_opened.clone());
    let id = policy.id;

    let running = russh::server::run_stream(engine, stream, policy).await?;
    tokio::pin!(running);

    tokio::select! {
        res = &mut running => {
            if let Err(e) = res {
                debug!("SSH session {} from {} ended: {}", id, peer, e);
            }
        }
        _ = channel_opened.notified() => {
            debug!("SSH session {} from {} opened a channel, closing", id, peer);
        }
        _ = tokio::time::sleep(CHANNEL_WAIT) => {
            debug!("SSH session {} from {} timed out waiting for a channel", id, peer);
        }
    }
    // dropping the running session closes the transport
    Ok(())
}

/// Per-connection authentication policy handed to the engine.
///
/// The engine's callbacks only carry protocol-level arguments, so the peer
/// address observed at accept time is captured here and stamped onto every
/// recorded event.
pub struct SshSession {
    id: Uuid,
    peer: SocketAddr,
    sink: Arc<AttackEventSink>,
    channel_opened: Arc<Notify>,
}

impl SshSession {
    pub fn new(peer: SocketAddr, sink: Arc<AttackEventSink>, channel_opened: Arc<Notify>) -> Self {
        Self {
            id: Uuid::new_v4(),
            peer,
            sink,
            channel_opened,
        }
    }

    fn reject() -> Auth {
        Auth::Reject {
            proceed_with_methods: None,
            partial_success: false,
        }
    }
}

impl Handler for SshSession {
    type Error = russh::Error;

    async fn auth_password(&mut self, user: &str, password: &str) -> Result<Auth, Self::Error> {
        self.sink
            .record(AttackEvent::new(
                ServiceKind::Ssh,
                self.peer,
                EventData::PasswordAuth {
                    username: user.to_string(),
                    password: password.to_string(),
                },
            ))
            .await;
        // record the attempt, then always fail it
        Ok(Self::reject())
    }

    async fn auth_publickey(
        &mut self,
        user: &str,
        key: &PublicKey,
    ) -> Result<Auth, Self::Error> {
        self.sink
            .record(AttackEvent::new(
                ServiceKind::Ssh,
                self.peer,
                EventData::PublickeyAuth {
                    username: user.to_string(),
                    key_type: key.algorithm().to_string(),
                },
            ))
            .await;
        Ok(Self::reject())
    }

    async fn channel_open_session(
        &mut self,
        _channel: Channel<Msg>,
        _session: &mut Session,
    ) -> Result<bool, Self::Error> {
        debug!("SSH session {} from {}: session channel opened", self.id, self.peer);
        self.channel_opened.notify_one();
        Ok(true)
    }

    async fn channel_open_direct_tcpip(
        &mut self,
        _channel: Channel<Msg>,
        _host_to_connect: &str,
        _port_to_connect: u32,
        _originator_address: &str,
        _originator_port: u32,
        _session: &mut Session,
    ) -> Result<bool, Self::Error> {
        // only session channels are entertained
        Ok(false)
    }
}
