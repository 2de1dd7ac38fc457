//! HTTP decoy: harvests whatever request bytes arrive and answers every one
//! of them with the same canned page.

use crate::configuration::config::Config;
use crate::configuration::types::HttpConfig;
use crate::error_handling::types::NetworkError;
use crate::services::acceptor::ConnectionAcceptor;
use crate::sink::{AttackEvent, AttackEventSink, EventData, ServiceKind};
use chrono::{DateTime, Utc};
use log::{debug, error};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{watch, Semaphore};
use uuid::Uuid;

/// Single read bound per connection; no keep-alive.
const READ_LIMIT: usize = 4096;
/// Header lines kept after the request line.
const HEADER_LINES: usize = 9;
/// Raw request prefix stored with the event.
const RAW_PREFIX_CHARS: usize = 500;

const CANNED_BODY: &str = "<!DOCTYPE html>
<html>
<head>
    <title>Welcome</title>
</head>
<body>
    <h1>Server is Running</h1>
    <p>Welcome to the server.</p>
</body>
</html>";

/// One-shot HTTP exchange: read once, record once, answer once, close.
pub struct HttpSession {
    id: Uuid,
    peer: SocketAddr,
}

impl HttpSession {
    pub fn new(peer: SocketAddr) -> Self {
        Self {
            id: Uuid::new_v4(),
            peer,
        }
    }

    /// Reads up to [`READ_LIMIT`] bytes, records the harvested request, then
    /// sends the canned response and closes. A zero-byte read means the
    /// scanner connected and left: no event, no response.
    pub async fn run<S>(
        self,
        mut stream: S,
        config: &HttpConfig,
        sink: &AttackEventSink,
    ) -> std::io::Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut buf = [0u8; READ_LIMIT];
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            debug!("HTTP session {} from {}: empty connection", self.id, self.peer);
            return Ok(());
        }

        let request = String::from_utf8_lossy(&buf[..n]).into_owned();
        let mut lines = request.split('\n');
        let request_line = lines
            .next()
            .unwrap_or("")
            .trim_end_matches('\r')
            .to_string();
        let headers: Vec<String> = lines
            .take(HEADER_LINES)
            .map(|l| l.trim_end_matches('\r').to_string())
            .collect();
        let full_request: String = request.chars().take(RAW_PREFIX_CHARS).collect();

        sink.record(AttackEvent::new(
            ServiceKind::Http,
            self.peer,
            EventData::HttpRequest {
                request_line,
                headers,
                full_request,
            },
        ))
        .await;

        let response = render_response(&config.server_name, Utc::now());
        stream.write_all(response.as_bytes()).await?;
        stream.shutdown().await?;
        debug!("HTTP session {} from {} answered", self.id, self.peer);
        Ok(())
    }
}

/// The fixed `200 OK` response every request receives, regardless of
/// content. `Content-Length` always matches the canned body exactly.
fn render_response(server_name: &str, now: DateTime<Utc>) -> String {
    format!(
        "HTTP/1.1 200 OK\r\n\
         Server: {}\r\n\
         Date: {}\r\n\
         Content-Type: text/html\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n\
         {}",
        server_name,
        now.format("%a, %d %b %Y %H:%M:%S GMT"),
        CANNED_BODY.len(),
        CANNED_BODY
    )
}

/// The HTTP decoy service: one acceptor plus one [`HttpSession`] per
/// connection.
pub struct HttpService {
    config: Arc<Config>,
    sink: Arc<AttackEventSink>,
}

impl HttpService {
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
            self.config.services.http.port,
        );
        let acceptor = ConnectionAcceptor::new(ServiceKind::Http, self.sink.clone(), limiter);
        let config = self.config.clone();
        let sink = self.sink.clone();
        acceptor
            .serve(addr, shutdown, move |stream, peer| {
                let config = config.clone();
                let sink = sink.clone();
                async move {
                    let session = HttpSession::new(peer);
                    if let Err(e) = session.run(stream, &config.services.http, &sink).await {
                        error!("HTTP error from {}: {}", peer, e);
                    }
                }
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    fn peer() -> SocketAddr {
        "203.0.113.45:40002".parse().unwrap()
    }

    fn test_sink(dir: &TempDir) -> AttackEventSink {
        AttackEventSink::new(dir.path()).unwrap()
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

    #[test]
    fn test_response_is_canned_200_with_exact_content_length() {
        let when = Utc.with_ymd_and_hms(2024, 3, 9, 12, 30, 45).unwrap();
        let response = render_response("Apache/2.4.41 (Ubuntu)", when);

        let (head, body) = response.split_once("\r\n\r\n").unwrap();
        let mut lines = head.lines();
        assert_eq!(lines.next().unwrap(), "HTTP/1.1 200 OK");
        assert!(head.contains("Server: Apache/2.4.41 (Ubuntu)"));
        assert!(head.contains("Date: Sat, 09 Mar 2024 12:30:45 GMT"));
        assert!(head.contains("Content-Type: text/html"));
        assert!(head.contains("Connection: close"));
        assert!(head.contains(&format!("Content-Length: {}", body.len())));
    }

    #[tokio::test]
    async fn test_request_is_harvested_and_answered() {
        let dir = TempDir::new().unwrap();
        let sink = test_sink(&dir);

        let (mut client, server) = tokio::io::duplex(8192);
        client
            .write_all(b"GET /admin HTTP/1.1\r\nHost: victim\r\nUser-Agent: scanner\r\n\r\n")
            .await
            .unwrap();

        HttpSession::new(peer())
            .run(server, &HttpConfig::default(), &sink)
            .await
            .unwrap();

        let mut response = String::new();
        client.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        let (head, body) = response.split_once("\r\n\r\n").unwrap();
        assert!(head.contains(&format!("Content-Length: {}", body.len())));

        let events = recorded_events(&sink);
        assert_eq!(events.len(), 1);
        match &events[0].data {
            EventData::HttpRequest {
                request_line,
                headers,
                full_request,
            } => {
                assert_eq!(request_line, "GET /admin HTTP/1.1");
                assert_eq!(headers[0], "Host: victim");
                assert_eq!(headers[1], "User-Agent: scanner");
                assert!(full_request.starts_with("GET /admin HTTP/1.1"));
            }
            other => panic!("unexpected payload: {:?}", other),
        }
        assert_eq!(events[0].source_ip, peer().ip());
        assert_eq!(events[0].source_port, peer().port());
    }

    #[tokio::test]
    async fn test_oversized_request_is_truncated_to_500_chars() {
        let dir = TempDir::new().unwrap();
        let sink = test_sink(&dir);

        let (mut client, server) = tokio::io::duplex(8192);
        let request = format!("GET /{} HTTP/1.1\r\n\r\n", "a".repeat(2000));
        client.write_all(request.as_bytes()).await.unwrap();

        HttpSession::new(peer())
            .run(server, &HttpConfig::default(), &sink)
            .await
            .unwrap();

        let events = recorded_events(&sink);
        match &events[0].data {
            EventData::HttpRequest { full_request, .. } => {
                assert_eq!(full_request.chars().count(), 500);
            }
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_connection_emits_nothing() {
        let dir = TempDir::new().unwrap();
        let sink = test_sink(&dir);

        let (client, server) = tokio::io::duplex(8192);
        drop(client);

        HttpSession::new(peer())
            .run(server, &HttpConfig::default(), &sink)
            .await
            .unwrap();

        assert!(recorded_events(&sink).is_empty());
    }

    #[tokio::test]
    async fn test_garbage_request_still_gets_the_page() {
        let dir = TempDir::new().unwrap();
        let sink = test_sink(&dir);

        let (mut client, server) = tokio::io::duplex(8192);
        client.write_all(&[0xff, 0xfe, 0x00, 0x41]).await.unwrap();

        HttpSession::new(peer())
            .run(server, &HttpConfig::default(), &sink)
            .await
            .unwrap();

        let mut response = String::new();
        client.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert_eq!(recorded_events(&sink).len(), 1);
    }
}
