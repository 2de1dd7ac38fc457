use std::fmt;

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    TomlError(String),
    BadPort(String),
    BadBanner(String),
    BadLimit(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::TomlError(e) => write!(f, "TOML parsing error: {}", e),
            ConfigError::BadPort(e) => write!(f, "Port error: {}", e),
            ConfigError::BadBanner(e) => write!(f, "Banner error: {}", e),
            ConfigError::BadLimit(e) => write!(f, "Limit error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

#[derive(Debug)]
pub enum NetworkError {
    BindError(std::io::Error),
    LimiterClosed,
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkError::BindError(e) => write!(f, "Network bind error: {}", e),
            NetworkError::LimiterClosed => write!(f, "Connection limiter closed"),
        }
    }
}

impl std::error::Error for NetworkError {}

#[derive(Debug)]
pub enum SinkError {
    IoError(std::io::Error),
    SerializeError(serde_json::Error),
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkError::IoError(e) => write!(f, "Sink IO error: {}", e),
            SinkError::SerializeError(e) => write!(f, "Sink serialization error: {}", e),
        }
    }
}

impl std::error::Error for SinkError {}

impl From<std::io::Error> for SinkError {
    fn from(err: std::io::Error) -> Self {
        SinkError::IoError(err)
    }
}

impl From<serde_json::Error> for SinkError {
    fn from(err: serde_json::Error) -> Self {
        SinkError::SerializeError(err)
    }
}

#[derive(Debug)]
pub enum SessionError {
    IoError(std::io::Error),
    SshError(russh::Error),
    KeyGeneration(String),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::IoError(e) => write!(f, "Session IO error: {}", e),
            SessionError::SshError(e) => write!(f, "SSH transport error: {}", e),
            SessionError::KeyGeneration(e) => write!(f, "Host key generation failed: {}", e),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<std::io::Error> for SessionError {
    fn from(err: std::io::Error) -> Self {
        SessionError::IoError(err)
    }
}

impl From<russh::Error> for SessionError {
    fn from(err: russh::Error) -> Self {
        SessionError::SshError(err)
    }
}
