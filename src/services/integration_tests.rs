//! Wire-level tests driving the spawned services over real sockets.

use crate::configuration::config::Config;
use crate::services;
use crate::sink::{AttackEvent, AttackEventSink, EventData, ServiceKind};
use chrono::Utc;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;

const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// Localhost snapshot with every protocol disabled; tests enable what they
/// exercise. The ports are reserved together so they are distinct. Racy in
/// principle, fine for tests.
async fn local_config() -> Config {
    let ssh = TcpListener::bind((LOCALHOST, 0)).await.unwrap();
    let http = TcpListener::bind((LOCALHOST, 0)).await.unwrap();
    let ftp = TcpListener::bind((LOCALHOST, 0)).await.unwrap();

    let mut config = Config::default();
    config.general.bind_address = LOCALHOST;
    config.services.ssh.enabled = false;
    config.services.ssh.port = ssh.local_addr().unwrap().port();
    config.services.http.enabled = false;
    config.services.http.port = http.local_addr().unwrap().port();
    config.services.ftp.enabled = false;
    config.services.ftp.port = ftp.local_addr().unwrap().port();
    config
}

/// Polls until the given port accepts connections.
async fn wait_for(addr: SocketAddr) -> TcpStream {
    for _ in 0..100 {
        if let Ok(stream) = TcpStream::connect(addr).await {
            return stream;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("service on {} never came up", addr);
}

fn recorded_events(sink: &AttackEventSink) -> Vec<AttackEvent> {
    let path = sink.day_file(Utc::now().date_naive());
    if !path.exists() {
        return Vec::new();
    }
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[tokio::test]
async fn test_disabled_protocol_port_is_never_bound() {
    let dir = TempDir::new().unwrap();
    let sink = Arc::new(AttackEventSink::new(dir.path()).unwrap());
    let mut config = local_config().await;
    config.services.ftp.enabled = true;
    let ssh_port = config.services.ssh.port;
    let ftp_addr = SocketAddr::new(LOCALHOST, config.services.ftp.port);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let running = services::spawn_enabled(Arc::new(config), sink, shutdown_rx);
    assert_eq!(running.len(), 1);
    assert_eq!(running[0].0, "FTP");

    // once the enabled service answers, the disabled one must still refuse
    let ftp = wait_for(ftp_addr).await;
    drop(ftp);
    let refused = TcpStream::connect((LOCALHOST, ssh_port)).await;
    assert!(refused.is_err());

    shutdown_tx.send(true).unwrap();
}

#[tokio::test]
async fn test_ftp_end_to_end_credential_capture() {
    let dir = TempDir::new().unwrap();
    let sink = Arc::new(AttackEventSink::new(dir.path()).unwrap());
    let mut config = local_config().await;
    config.services.ftp.enabled = true;
    let ftp_addr = SocketAddr::new(LOCALHOST, config.services.ftp.port);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    services::spawn_enabled(Arc::new(config), sink.clone(), shutdown_rx);

    let stream = wait_for(ftp_addr).await;
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();

    reader.read_line(&mut line).await.unwrap();
    assert_eq!(line, "220 FTP Server Ready\r\n");

    write_half.write_all(b"USER alice\r\n").await.unwrap();
    line.clear();
    reader.read_line(&mut line).await.unwrap();
    assert_eq!(line, "331 Password required\r\n");

    write_half.write_all(b"PASS secret\r\n").await.unwrap();
    line.clear();
    reader.read_line(&mut line).await.unwrap();
    assert_eq!(line, "530 Login incorrect\r\n");

    write_half.write_all(b"QUIT\r\n").await.unwrap();
    line.clear();
    reader.read_line(&mut line).await.unwrap();
    assert_eq!(line, "221 Goodbye\r\n");

    let events = recorded_events(&sink);
    assert_eq!(events.len(), 2);
    assert_eq!(
        events[0].data,
        EventData::User {
            username: String::from("alice")
        }
    );
    assert_eq!(
        events[1].data,
        EventData::Password {
            username: String::from("alice"),
            password: String::from("secret")
        }
    );

    shutdown_tx.send(true).unwrap();
}

#[tokio::test]
async fn test_http_end_to_end_harvest_and_canned_response() {
    let dir = TempDir::new().unwrap();
    let sink = Arc::new(AttackEventSink::new(dir.path()).unwrap());
    let mut config = local_config().await;
    config.services.http.enabled = true;
    let http_addr = SocketAddr::new(LOCALHOST, config.services.http.port);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    services::spawn_enabled(Arc::new(config), sink.clone(), shutdown_rx);

    let mut stream = wait_for(http_addr).await;
    stream
        .write_all(b"GET /wp-login.php HTTP/1.1\r\nHost: target\r\n\r\n")
        .await
        .unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
    let (head, body) = response.split_once("\r\n\r\n").unwrap();
    assert!(head.contains(&format!("Content-Length: {}", body.len())));
    assert!(head.contains("Connection: close"));

    let events = recorded_events(&sink);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].service, ServiceKind::Http);
    match &events[0].data {
        EventData::HttpRequest { request_line, .. } => {
            assert_eq!(request_line, "GET /wp-login.php HTTP/1.1");
        }
        other => panic!("unexpected payload: {:?}", other),
    }

    shutdown_tx.send(true).unwrap();
}

struct TrustingClient;

impl russh::client::Handler for TrustingClient {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &russh::keys::PublicKey,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }
}

#[tokio::test]
async fn test_ssh_end_to_end_rejects_and_records_real_peer() {
    let dir = TempDir::new().unwrap();
    let sink = Arc::new(AttackEventSink::new(dir.path()).unwrap());
    let mut config = local_config().await;
    config.services.ssh.enabled = true;
    let ssh_addr = SocketAddr::new(LOCALHOST, config.services.ssh.port);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    services::spawn_enabled(Arc::new(config), sink.clone(), shutdown_rx);

    let stream = wait_for(ssh_addr).await;
    let local_addr = stream.local_addr().unwrap();

    let client_config = Arc::new(russh::client::Config::default());
    let mut session =
        russh::client::connect_stream(client_config, stream, TrustingClient)
            .await
            .unwrap();
    let outcome = session
        .authenticate_password("root", "123456")
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        russh::client::AuthResult::Failure { .. }
    ));

    let events = recorded_events(&sink);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].service, ServiceKind::Ssh);
    assert_eq!(
        events[0].data,
        EventData::PasswordAuth {
            username: String::from("root"),
            password: String::from("123456")
        }
    );
    // the policy captured the accept-time peer address, not a placeholder
    assert_eq!(events[0].source_ip, local_addr.ip());
    assert_eq!(events[0].source_port, local_addr.port());

    shutdown_tx.send(true).unwrap();
}
