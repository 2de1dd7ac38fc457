use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

/// Process-wide settings shared by every service.
#[derive(Debug, PartialEq, Clone, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Address every decoy service binds to.
    pub bind_address: IpAddr,
    /// Directory receiving the per-day attack record files.
    pub log_dir: PathBuf,
    /// Upper bound on concurrent sessions across all services.
    pub max_connections: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            log_dir: PathBuf::from("logs"),
            max_connections: 100,
        }
    }
}

#[derive(Debug, PartialEq, Clone, Deserialize)]
#[serde(default)]
pub struct SshConfig {
    pub enabled: bool,
    pub port: u16,
    /// SSH version string presented during the handshake.
    pub banner: String,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 2222,
            banner: String::from("SSH-2.0-OpenSSH_7.4"),
        }
    }
}

#[derive(Debug, PartialEq, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub enabled: bool,
    pub port: u16,
    /// Value of the `Server` response header.
    pub server_name: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 8080,
            server_name: String::from("Apache/2.4.41 (Ubuntu)"),
        }
    }
}

#[derive(Debug, PartialEq, Clone, Deserialize)]
#[serde(default)]
pub struct FtpConfig {
    pub enabled: bool,
    pub port: u16,
    /// Greeting line sent on connect, without the trailing CRLF.
    pub banner: String,
}

impl Default for FtpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 2121,
            banner: String::from("220 FTP Server Ready"),
        }
    }
}

#[derive(Debug, PartialEq, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServicesConfig {
    pub ssh: SshConfig,
    pub http: HttpConfig,
    pub ftp: FtpConfig,
}
