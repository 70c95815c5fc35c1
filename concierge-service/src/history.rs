//! File-backed conversation history.
//!
//! The history is a two-column CSV log (`role,content`), one row per utterance,
//! in conversation order. The first data row is always the seed greeting.
//! Anything that does not look like that (missing file, wrong header, missing
//! seed, unreadable rows) is treated as corruption: the log is rewritten with
//! just the header and the seed, and the caller gets the seed back. Failures
//! are logged and never propagated.

use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;
use strum::{Display, EnumString};
use thiserror::Error;
use tracing::{debug, error, info, warn};

const HEADERS: [&str; 2] = ["role", "content"];

/// Speaker of a history entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Human,
    Ai,
}

/// One logged utterance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
}

impl HistoryEntry {
    #[cfg(test)]
    pub fn human(content: impl Into<String>) -> Self {
        Self {
            role: Role::Human,
            content: content.into(),
        }
    }

    pub fn ai(content: impl Into<String>) -> Self {
        Self {
            role: Role::Ai,
            content: content.into(),
        }
    }
}

/// The greeting every fresh conversation starts with
pub fn seed_greeting(product_type: &str) -> String {
    format!(
        "Welcome! I'm your helpful {pt} shopping assistant. How can I help you find the perfect {pt} today?",
        pt = product_type
    )
}

/// Reasons a history file gets reset on load
#[derive(Debug, Error)]
enum Corruption {
    #[error("history file does not exist")]
    Missing,

    #[error("history file is empty")]
    Empty,

    #[error("unexpected header {found:?}")]
    BadHeader { found: Vec<String> },

    #[error("first entry is not the seed greeting")]
    MissingSeed,

    #[error("failed to read history")]
    Read(#[source] csv::Error),
}

/// Append-only conversation log backed by a CSV file
pub struct HistoryStore {
    path: PathBuf,
    seed: String,
    lock: Mutex<()>,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>, product_type: &str) -> Self {
        Self {
            path: path.into(),
            seed: seed_greeting(product_type),
            lock: Mutex::new(()),
        }
    }

    #[cfg(test)]
    pub fn seed(&self) -> &str {
        &self.seed
    }

    #[cfg(test)]
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Read the full history, resetting it first if it is missing or corrupt
    pub fn load(&self) -> Vec<HistoryEntry> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());

        match self.read_entries() {
            Ok(entries) => entries,
            Err(Corruption::Missing) => {
                debug!(path = %self.path.display(), "History file missing, creating");
                self.write_seed();
                vec![HistoryEntry::ai(&self.seed)]
            }
            Err(reason) => {
                warn!(
                    path = %self.path.display(),
                    reason = %crate::error::format_error_chain(&reason),
                    "History file unusable, resetting"
                );
                self.write_seed();
                vec![HistoryEntry::ai(&self.seed)]
            }
        }
    }

    /// Append one entry to the log.
    ///
    /// Appending the seed greeting when it is already the first entry is a
    /// no-op. If the file has lost its header, header and seed are written
    /// before the entry.
    pub fn append(&self, role: Role, content: &str) {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());

        let is_seed = role == Role::Ai && content == self.seed;
        if is_seed && self.starts_with_seed() {
            debug!("Skipping redundant seed greeting append");
            return;
        }

        let needs_headers = std::fs::metadata(&self.path)
            .map(|m| m.len() == 0)
            .unwrap_or(true);

        let result = (|| -> Result<(), csv::Error> {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            let mut writer = csv::Writer::from_writer(file);
            if needs_headers {
                writer.write_record(HEADERS)?;
                if !is_seed {
                    writer.write_record([Role::Ai.to_string().as_str(), self.seed.as_str()])?;
                }
            }
            writer.write_record([role.to_string().as_str(), content])?;
            writer.flush()?;
            Ok(())
        })();

        match result {
            Ok(()) => debug!(role = %role, content_length = content.len(), "History entry appended"),
            Err(e) => error!(path = %self.path.display(), error = %e, "Failed to append to history"),
        }
    }

    /// Discard all entries and start over with the seed greeting
    pub fn reset(&self) {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        self.write_seed();
        info!(path = %self.path.display(), "Chat history reset");
    }

    fn write_seed(&self) {
        let result = (|| -> Result<(), csv::Error> {
            let mut writer = csv::Writer::from_writer(File::create(&self.path)?);
            writer.write_record(HEADERS)?;
            writer.write_record([Role::Ai.to_string().as_str(), self.seed.as_str()])?;
            writer.flush()?;
            Ok(())
        })();

        if let Err(e) = result {
            error!(path = %self.path.display(), error = %e, "Failed to reset history");
        }
    }

    fn starts_with_seed(&self) -> bool {
        match self.read_entries() {
            Ok(entries) => entries.first().is_some_and(|e| e.content == self.seed),
            Err(_) => false,
        }
    }

    fn read_entries(&self) -> Result<Vec<HistoryEntry>, Corruption> {
        match std::fs::metadata(&self.path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(Corruption::Missing),
            Err(e) => return Err(Corruption::Read(e.into())),
            Ok(m) if m.len() == 0 => return Err(Corruption::Empty),
            Ok(_) => {}
        }

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(&self.path)
            .map_err(Corruption::Read)?;

        let headers = reader.headers().map_err(Corruption::Read)?;
        if headers.iter().ne(HEADERS) {
            return Err(Corruption::BadHeader {
                found: headers.iter().map(str::to_string).collect(),
            });
        }

        let mut entries = Vec::new();
        let mut first = true;
        for record in reader.records() {
            let record = record.map_err(Corruption::Read)?;
            let role = record.get(0).unwrap_or_default();
            let content = record.get(1).unwrap_or_default();

            if first {
                if role != "ai" || content != self.seed {
                    return Err(Corruption::MissingSeed);
                }
                first = false;
            }

            match role.parse::<Role>() {
                Ok(role) => entries.push(HistoryEntry {
                    role,
                    content: content.to_string(),
                }),
                Err(_) => debug!(role = %role, "Skipping history row with unknown role"),
            }
        }

        if entries.is_empty() {
            return Err(Corruption::MissingSeed);
        }

        Ok(entries)
    }
}
