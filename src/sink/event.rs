use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, SocketAddr};

/// Which decoy captured an interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ServiceKind {
    Ssh,
    Ftp,
    Http,
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceKind::Ssh => write!(f, "SSH"),
            ServiceKind::Ftp => write!(f, "FTP"),
            ServiceKind::Http => write!(f, "HTTP"),
        }
    }
}

/// Protocol-specific payload of a captured interaction.
///
/// Credential and command payloads carry a `type` discriminator on the wire;
/// the HTTP payload is a bare object with the request fields, matching the
/// record format downstream tooling consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventData {
    /// FTP `USER` command.
    User { username: String },
    /// FTP `PASS` command, paired with the username from the preceding `USER`.
    Password { username: String, password: String },
    /// Any other FTP command line, stored raw.
    Command { command: String },
    /// SSH password authentication attempt.
    PasswordAuth { username: String, password: String },
    /// SSH public-key authentication attempt.
    PublickeyAuth { username: String, key_type: String },
    /// One harvested HTTP request.
    #[serde(untagged)]
    HttpRequest {
        request_line: String,
        headers: Vec<String>,
        full_request: String,
    },
}

/// One captured interaction, created exactly once and never mutated.
///
/// Serialized field order is part of the record format: `timestamp, service,
/// source_ip, source_port, data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackEvent {
    pub timestamp: DateTime<Utc>,
    pub service: ServiceKind,
    pub source_ip: IpAddr,
    pub source_port: u16,
    pub data: EventData,
}

impl AttackEvent {
    /// Stamps a new event with the current wall-clock time and the peer
    /// address of the session that captured it.
    pub fn new(service: ServiceKind, peer: SocketAddr, data: EventData) -> Self {
        Self {
            timestamp: Utc::now(),
            service,
            source_ip: peer.ip(),
            source_port: peer.port(),
            data,
        }
    }
}
