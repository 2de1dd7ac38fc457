//! FTP decoy: a command interpreter that answers just enough of the protocol
//! to walk an attacker through a login that always fails.

use crate::configuration::config::Config;
use crate::configuration::types::FtpConfig;
use crate::error_handling::types::NetworkError;
use crate::services::acceptor::ConnectionAcceptor;
use crate::sink::{AttackEvent, AttackEventSink, EventData, ServiceKind};
use log::{debug, error};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{watch, Semaphore};
use uuid::Uuid;

/// Per-connection FTP state.
///
/// The only state spanning messages is `pending_username`, carried from a
/// `USER` command into the following `PASS` so the recorded credential pair
/// is complete.
pub struct FtpSession {
    id: Uuid,
    peer: SocketAddr,
    pending_username: Option<String>,
}

impl FtpSession {
    pub fn new(peer: SocketAddr) -> Self {
        Self {
            id: Uuid::new_v4(),
            peer,
            pending_username: None,
        }
    }

    /// Runs the session to completion: banner, then one command/reply pair
    /// per line until the client quits or the connection drops.
    ///
    /// Commands pipelined into a single TCP segment are split on line
    /// boundaries and handled as separate commands, in order. Every captured
    /// event is recorded before its reply is sent. Invalid UTF-8 in a
    /// command line is replaced, never fatal.
    pub async fn run<S>(
        mut self,
        stream: S,
        config: &FtpConfig,
        sink: &AttackEventSink,
    ) -> std::io::Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (read_half, mut write_half) = tokio::io::split(stream);
        let mut reader = BufReader::new(read_half);

        write_half
            .write_all(format!("{}\r\n", config.banner).as_bytes())
            .await?;

        let mut buf = Vec::new();
        loop {
            buf.clear();
            let n = reader.read_until(b'\n', &mut buf).await?;
            if n == 0 {
                break;
            }
            let line = String::from_utf8_lossy(&buf);
            let line = line.trim();
            if line.is_empty() {
                break;
            }

            let (verb, arg) = match line.split_once(' ') {
                Some((verb, arg)) => (verb.to_ascii_uppercase(), Some(arg.trim())),
                None => (line.to_ascii_uppercase(), None),
            };

            match verb.as_str() {
                "USER" => {
                    let username = arg
                        .filter(|a| !a.is_empty())
                        .unwrap_or("anonymous")
                        .to_string();
                    self.pending_username = Some(username.clone());
                    sink.record(AttackEvent::new(
                        ServiceKind::Ftp,
                        self.peer,
                        EventData::User { username },
                    ))
                    .await;
                    write_half.write_all(b"331 Password required\r\n").await?;
                }
                "PASS" => {
                    let password = arg.unwrap_or("").to_string();
                    let username = self
                        .pending_username
                        .clone()
                        .unwrap_or_else(|| String::from("unknown"));
                    sink.record(AttackEvent::new(
                        ServiceKind::Ftp,
                        self.peer,
                        EventData::Password { username, password },
                    ))
                    .await;
                    // login never succeeds
                    write_half.write_all(b"530 Login incorrect\r\n").await?;
                }
                "QUIT" => {
                    write_half.write_all(b"221 Goodbye\r\n").await?;
                    break;
                }
                "SYST" => {
                    write_half.write_all(b"215 UNIX Type: L8\r\n").await?;
                }
                "FEAT" => {
                    write_half
                        .write_all(b"211-Features:\r\n SIZE\r\n MDTM\r\n211 End\r\n")
                        .await?;
                }
                _ => {
                    sink.record(AttackEvent::new(
                        ServiceKind::Ftp,
                        self.peer,
                        EventData::Command {
                            command: line.to_string(),
                        },
                    ))
                    .await;
                    write_half
                        .write_all(b"502 Command not implemented\r\n")
                        .await?;
                }
            }
        }

        debug!("FTP session {} from {} closed", self.id, self.peer);
        Ok(())
    }
}

/// The FTP decoy service: one acceptor plus one [`FtpSession`] per
/// connection.
pub struct FtpService {
    config: Arc<Config>,
    sink: Arc<AttackEventSink>,
}

impl FtpService {
    pub fn new(config: Arc<Config>, sink: Arc<AttackEventSink>) -> Self {
        Self { config, sink }
    }

    pub async fn run(
        self,
        shutdown: watch::Receiver<bool>,
        limiter: Arc<Semaphore>,
    ) -> Result<(), NetworkError> {
        let addr = SocketAddr::new(
            self.config.general.bind_address,
            self.config.services.ftp.port,
        );
        let acceptor = ConnectionAcceptor::new(ServiceKind::Ftp, self.sink.clone(), limiter);
        let config = self.config.clone();
        let sink = self.sink.clone();
        acceptor
            .serve(addr, shutdown, move |stream, peer| {
                let config = config.clone();
                let sink = sink.clone();
                async move {
                    let session = FtpSession::new(peer);
                    if let Err(e) = session.run(stream, &config.services.ftp, &sink).await {
                        error!("FTP error from {}: {}", peer, e);
                    }
                }
            })
            .await
    }
}
