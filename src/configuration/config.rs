use super::types::*;
use crate::error_handling::types::ConfigError;
use log::info;
use std::fs;
use std::path::Path;

/// Immutable configuration snapshot for one run.
///
/// Built once at start-up and shared by reference with every acceptor and
/// session; never mutated after load. A missing configuration file is not an
/// error: the defaults describe a fully working decoy set (SSH on 2222, HTTP
/// on 8080, FTP on 2121, bound to every interface).
///
/// # Examples
///
/// ```toml
/// [general]
/// bind_address = "0.0.0.0"
/// log_dir = "logs"
/// max_connections = 100
///
/// [services.ssh]
/// enabled = true
/// port = 2222
/// banner = "SSH-2.0-OpenSSH_7.4"
///
/// [services.http]
/// enabled = true
/// port = 8080
/// server_name = "Apache/2.4.41 (Ubuntu)"
///
/// [services.ftp]
/// enabled = true
/// port = 2121
/// banner = "220 FTP Server Ready"
/// ```
#[derive(Debug, PartialEq, Clone, Default, serde::Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub services: ServicesConfig,
}

impl Config {
    /// Loads and validates the configuration from a TOML file.
    ///
    /// Falls back to [`Config::default`] when the file does not exist, so a
    /// bare invocation starts all three decoys with their stock banners.
    pub fn from_file(path: &Path) -> Result<Config, ConfigError> {
        if !path.exists() {
            info!(
                "No configuration file at {}, using defaults",
                path.display()
            );
            return Ok(Config::default());
        }

        let raw = fs::read_to_string(path)?;
        let config: Config =
            toml::from_str(&raw).map_err(|e| ConfigError::TomlError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Names of the services enabled by this snapshot, in start order.
    pub fn enabled_services(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.services.ssh.enabled {
            names.push("SSH");
        }
        if self.services.http.enabled {
            names.push("HTTP");
        }
        if self.services.ftp.enabled {
            names.push("FTP");
        }
        names
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.general.max_connections == 0 {
            return Err(ConfigError::BadLimit(String::from(
                "max_connections must be at least 1",
            )));
        }
        if self.services.ssh.enabled && self.services.ssh.port == 0 {
            return Err(ConfigError::BadPort(String::from("ssh port must be non-zero")));
        }
        if self.services.http.enabled && self.services.http.port == 0 {
            return Err(ConfigError::BadPort(String::from("http port must be non-zero")));
        }
        if self.services.ftp.enabled && self.services.ftp.port == 0 {
            return Err(ConfigError::BadPort(String::from("ftp port must be non-zero")));
        }
        // russh refuses a server id that does not follow RFC 4253 section 4.2
        if self.services.ssh.enabled && !self.services.ssh.banner.starts_with("SSH-") {
            return Err(ConfigError::BadBanner(String::from(
                "ssh banner must start with \"SSH-\"",
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::{IpAddr, Ipv4Addr};

    #[test]
    fn test_defaults_match_stock_decoys() {
        let config = Config::default();
        assert_eq!(
            config.general.bind_address,
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        );
        assert_eq!(config.services.ssh.port, 2222);
        assert_eq!(config.services.ssh.banner, "SSH-2.0-OpenSSH_7.4");
        assert_eq!(config.services.http.port, 8080);
        assert_eq!(config.services.http.server_name, "Apache/2.4.41 (Ubuntu)");
        assert_eq!(config.services.ftp.port, 2121);
        assert_eq!(config.services.ftp.banner, "220 FTP Server Ready");
        assert_eq!(
            config.enabled_services(),
            vec!["SSH", "HTTP", "FTP"]
        );
    }

    #[test]
    fn test_from_file_missing_path_uses_defaults() {
        let config = Config::from_file(Path::new("/nonexistent/leurre.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_from_file_parses_overrides() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("leurre.toml");
        let mut f = fs::File::create(&path).unwrap();
        writeln!(
            f,
            "[general]\nbind_address = \"127.0.0.1\"\nmax_connections = 5\n\n\
             [services.ssh]\nenabled = false\n\n\
             [services.ftp]\nport = 21\nbanner = \"220 ProFTPD Server\""
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(
            config.general.bind_address,
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        );
        assert_eq!(config.general.max_connections, 5);
        assert!(!config.services.ssh.enabled);
        assert_eq!(config.services.ftp.port, 21);
        assert_eq!(config.services.ftp.banner, "220 ProFTPD Server");
        // untouched section keeps its defaults
        assert_eq!(config.services.http.port, 8080);
        assert_eq!(config.enabled_services(), vec!["HTTP", "FTP"]);
    }

    #[test]
    fn test_validation_rejects_zero_port() {
        let mut config = Config::default();
        config.services.ftp.port = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::BadPort(_))
        ));
        // a disabled service may keep a zero port
        config.services.ftp.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_malformed_ssh_banner() {
        let mut config = Config::default();
        config.services.ssh.banner = String::from("OpenSSH_7.4");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::BadBanner(_))
        ));
    }

    #[test]
    fn test_validation_rejects_zero_connection_limit() {
        let mut config = Config::default();
        config.general.max_connections = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::BadLimit(_))
        ));
    }
}
