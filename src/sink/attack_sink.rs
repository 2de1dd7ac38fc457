use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};
use log::{error, info, warn};
use tokio::sync::Mutex;

use crate::error_handling::types::SinkError;
use crate::sink::event::{AttackEvent, ServiceKind};

/// Durable, concurrently-writable store for captured attack events.
///
/// The sink is the only shared mutable resource in the system: every session
/// of every protocol funnels its events through [`record`](Self::record). One
/// async mutex guards the open day file, so a record is always appended as a
/// single complete newline-terminated JSON object no matter how sessions
/// interleave. The file rolls over when the UTC calendar day changes
/// (`attacks_YYYYMMDD.json`, append-only, never rewritten).
///
/// Persistence failures are reported and swallowed: a dropped record is
/// acceptable, a crashed session is not.
pub struct AttackEventSink {
    log_dir: PathBuf,
    writer: Mutex<DayWriter>,
}

struct DayWriter {
    day: NaiveDate,
    file: File,
}

impl AttackEventSink {
    pub fn new<P: AsRef<Path>>(log_dir: P) -> Result<Self, SinkError> {
        let log_dir = log_dir.as_ref().to_path_buf();
        fs::create_dir_all(&log_dir)?;
        let day = Utc::now().date_naive();
        let file = Self::open_day_file(&log_dir, day)?;
        info!("Attack event sink initialized at {}", log_dir.display());
        Ok(Self {
            log_dir,
            writer: Mutex::new(DayWriter { day, file }),
        })
    }

    /// Construct the sink using the `LEURRE_LOG_DIR` environment variable if
    /// set, otherwise the `logs` directory.
    pub fn new_default() -> Result<Self, SinkError> {
        if let Ok(dir) = std::env::var("LEURRE_LOG_DIR") {
            info!("Using attack log directory from LEURRE_LOG_DIR: {}", dir);
            return Self::new(PathBuf::from(dir));
        }
        Self::new(PathBuf::from("logs"))
    }

    /// Appends one event to the current day's store and mirrors a one-line
    /// summary to the warning stream.
    ///
    /// Never fails from the caller's perspective: a write error is logged and
    /// the session's protocol interaction continues unaffected.
    pub async fn record(&self, event: AttackEvent) {
        warn!(
            "Attack on {} from {}:{}",
            event.service, event.source_ip, event.source_port
        );
        if let Err(e) = self.append(&event).await {
            error!(
                "Failed to persist attack event from {}:{}: {}",
                event.source_ip, event.source_port, e
            );
        }
    }

    /// Connection notice for a freshly accepted socket.
    pub fn log_connection(&self, service: ServiceKind, peer: SocketAddr) {
        info!("Connection to {} from {}:{}", service, peer.ip(), peer.port());
    }

    /// Path of the store file for the given day.
    pub fn day_file(&self, day: NaiveDate) -> PathBuf {
        self.log_dir.join(format!("attacks_{}.json", day.format("%Y%m%d")))
    }

    async fn append(&self, event: &AttackEvent) -> Result<(), SinkError> {
        let mut line = serde_json::to_string(event)?;
        line.push('\n');

        let mut writer = self.writer.lock().await;
        let today = Utc::now().date_naive();
        if writer.day != today {
            writer.file = Self::open_day_file(&self.log_dir, today)?;
            writer.day = today;
        }
        // one write_all per record keeps record boundaries intact
        writer.file.write_all(line.as_bytes())?;
        writer.file.flush()?;
        Ok(())
    }

    fn open_day_file(dir: &Path, day: NaiveDate) -> Result<File, SinkError> {
        let path = dir.join(format!("attacks_{}.json", day.format("%Y%m%d")));
        Ok(OpenOptions::new().create(true).append(true).open(&path)?)
    }
}
