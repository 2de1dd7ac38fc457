use crate::sink::event::{AttackEvent, EventData, ServiceKind};
use chrono::Timelike;
use log::debug;
use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File};
use std::hash::Hash;
use std::io::Write;
use std::path::Path;

/// How many entries each ranking keeps.
const TOP_N: usize = 10;

/// Loads every `attacks_*.json` day file under `log_dir`.
///
/// Malformed lines are skipped, not fatal: a record half-written during a
/// crash must not block analysis of the rest.
pub fn load_events(log_dir: &Path) -> std::io::Result<Vec<AttackEvent>> {
    let mut events = Vec::new();
    if !log_dir.exists() {
        return Ok(events);
    }
    for entry in fs::read_dir(log_dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with("attacks_") || !name.ends_with(".json") {
            continue;
        }
        let content = fs::read_to_string(entry.path())?;
        for line in content.lines() {
            match serde_json::from_str::<AttackEvent>(line) {
                Ok(event) => events.push(event),
                Err(e) => debug!("Skipping malformed record in {}: {}", name, e),
            }
        }
    }
    Ok(events)
}

/// Aggregated view over a set of captured events.
#[derive(Debug)]
pub struct AttackReport {
    pub total: usize,
    pub per_service: Vec<(String, usize)>,
    pub top_ips: Vec<(String, usize)>,
    pub top_credentials: Vec<(String, usize)>,
    pub top_usernames: Vec<(String, usize)>,
    pub top_passwords: Vec<(String, usize)>,
    pub http_methods: Vec<(String, usize)>,
    pub per_hour: [usize; 24],
}

impl AttackReport {
    pub fn build(events: &[AttackEvent]) -> Self {
        let mut services: HashMap<String, usize> = HashMap::new();
        let mut ips: HashMap<String, usize> = HashMap::new();
        let mut credentials: HashMap<String, usize> = HashMap::new();
        let mut usernames: HashMap<String, usize> = HashMap::new();
        let mut passwords: HashMap<String, usize> = HashMap::new();
        let mut methods: HashMap<String, usize> = HashMap::new();
        let mut per_hour = [0usize; 24];

        for event in events {
            *services.entry(event.service.to_string()).or_default() += 1;
            *ips.entry(event.source_ip.to_string()).or_default() += 1;
            per_hour[event.timestamp.hour() as usize] += 1;

            if let Some(username) = username_of(&event.data) {
                *usernames.entry(username.to_string()).or_default() += 1;
            }
            if let Some((username, password)) = credentials_of(&event.data) {
                *credentials
                    .entry(format!("{}:{}", username, password))
                    .or_default() += 1;
                *passwords.entry(password.to_string()).or_default() += 1;
            }
            if event.service == ServiceKind::Http {
                if let EventData::HttpRequest { request_line, .. } = &event.data {
                    let method = request_line
                        .split_whitespace()
                        .next()
                        .unwrap_or("UNKNOWN")
                        .to_string();
                    *methods.entry(method).or_default() += 1;
                }
            }
        }

        Self {
            total: events.len(),
            per_service: ranked(services, usize::MAX),
            top_ips: ranked(ips, TOP_N),
            top_credentials: ranked(credentials, TOP_N),
            top_usernames: ranked(usernames, TOP_N),
            top_passwords: ranked(passwords, TOP_N),
            http_methods: ranked(methods, usize::MAX),
            per_hour,
        }
    }
}

impl fmt::Display for AttackReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total attacks recorded: {}", self.total)?;

        writeln!(f, "\nPer service:")?;
        for (service, count) in &self.per_service {
            let share = 100.0 * *count as f64 / self.total.max(1) as f64;
            writeln!(f, "  {:10} {:6}  ({:5.1}%)", service, count, share)?;
        }

        if !self.top_ips.is_empty() {
            writeln!(f, "\nTop source IPs:")?;
            for (ip, count) in &self.top_ips {
                writeln!(f, "  {:20} {:6}", ip, count)?;
            }
        }
        if !self.top_credentials.is_empty() {
            writeln!(f, "\nTop credentials:")?;
            for (pair, count) in &self.top_credentials {
                writeln!(f, "  {:30} {:6}", pair, count)?;
            }
        }
        if !self.top_usernames.is_empty() {
            writeln!(f, "\nTop usernames:")?;
            for (username, count) in &self.top_usernames {
                writeln!(f, "  {:20} {:6}", username, count)?;
            }
        }
        if !self.top_passwords.is_empty() {
            writeln!(f, "\nTop passwords:")?;
            for (password, count) in &self.top_passwords {
                writeln!(f, "  {:20} {:6}", password, count)?;
            }
        }
        if !self.http_methods.is_empty() {
            writeln!(f, "\nHTTP request methods:")?;
            for (method, count) in &self.http_methods {
                writeln!(f, "  {:10} {:6}", method, count)?;
            }
        }

        writeln!(f, "\nAttacks per hour (UTC):")?;
        let max = self.per_hour.iter().copied().max().unwrap_or(0).max(1);
        for (hour, count) in self.per_hour.iter().enumerate() {
            let bar = "#".repeat(count * 40 / max);
            writeln!(f, "  {:02}:00 {:40} {:5}", hour, bar, count)?;
        }
        Ok(())
    }
}

/// Exports the flat per-event CSV (`timestamp, service, source_ip,
/// source_port, username, password, type`).
pub fn export_csv(events: &[AttackEvent], output: &Path) -> std::io::Result<()> {
    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut f = File::create(output)?;
    writeln!(
        f,
        "timestamp,service,source_ip,source_port,username,password,type"
    )?;
    for event in events {
        let username = username_of(&event.data).unwrap_or("");
        let password = password_of(&event.data).unwrap_or("");
        writeln!(
            f,
            "{},{},{},{},{},{},{}",
            csv_field(&event.timestamp.to_rfc3339()),
            event.service,
            event.source_ip,
            event.source_port,
            csv_field(username),
            csv_field(password),
            type_of(&event.data),
        )?;
    }
    Ok(())
}

fn ranked<K: Into<String> + Eq + Hash>(counts: HashMap<K, usize>, limit: usize) -> Vec<(String, usize)> {
    let mut entries: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(k, v)| (k.into(), v))
        .collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    entries.truncate(limit);
    entries
}

fn username_of(data: &EventData) -> Option<&str> {
    match data {
        EventData::User { username }
        | EventData::Password { username, .. }
        | EventData::PasswordAuth { username, .. }
        | EventData::PublickeyAuth { username, .. } => Some(username),
        _ => None,
    }
}

fn password_of(data: &EventData) -> Option<&str> {
    match data {
        EventData::Password { password, .. } | EventData::PasswordAuth { password, .. } => {
            Some(password)
        }
        _ => None,
    }
}

fn credentials_of(data: &EventData) -> Option<(&str, &str)> {
    match data {
        EventData::Password { username, password }
        | EventData::PasswordAuth { username, password } => Some((username, password)),
        _ => None,
    }
}

fn type_of(data: &EventData) -> &'static str {
    match data {
        EventData::User { .. } => "user",
        EventData::Password { .. } => "password",
        EventData::Command { .. } => "command",
        EventData::PasswordAuth { .. } => "password_auth",
        EventData::PublickeyAuth { .. } => "publickey_auth",
        EventData::HttpRequest { .. } => "http_request",
    }
}

/// Quotes a field when it contains a separator, a quote or a newline.
fn csv_field(raw: &str) -> String {
    if raw.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}
