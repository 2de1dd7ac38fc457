pub mod config;
pub mod types;

pub use config::Config;
pub use types::{FtpConfig, GeneralConfig, HttpConfig, ServicesConfig, SshConfig};
