//! Alarm storage and scheduling
//!
//! Alarms are durable: the store is loaded once at startup and
//! rewritten after every create/delete/enable mutation. Ids are
//! assigned monotonically and never reused within a process lifetime.

pub mod scheduler;

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub use scheduler::{AlarmScheduler, POLL_INTERVAL};

/// One scheduled alarm
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alarm {
    /// Unique, monotonically assigned id
    pub id: u64,

    /// Hour of day, 0-23
    pub hour: u32,

    /// Minute of hour, 0-59
    pub minute: u32,

    /// Short label (e.g. "wake")
    pub label: String,

    /// Message spoken when the alarm fires
    pub message: String,

    /// Disabled alarms are kept but never fire
    pub enabled: bool,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Alarm {
    /// The alarm's time as `HH:MM`
    #[must_use]
    pub fn time_string(&self) -> String {
        format!("{:02}:{:02}", self.hour, self.minute)
    }
}

/// On-disk shape of the store
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    alarms: Vec<Alarm>,
    next_id: u64,
}

/// Durable alarm collection
#[derive(Debug)]
pub struct AlarmStore {
    path: Option<PathBuf>,
    alarms: Vec<Alarm>,
    next_id: u64,
}

impl AlarmStore {
    /// A store with no backing file (tests, hosts without a data dir)
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            path: None,
            alarms: Vec::new(),
            next_id: 1,
        }
    }

    /// Load the store from disk, starting empty if the file is absent
    ///
    /// # Errors
    ///
    /// Returns error if an existing file cannot be read or parsed
    pub fn load(path: PathBuf) -> Result<Self> {
        if !path.exists() {
            return Ok(Self {
                path: Some(path),
                alarms: Vec::new(),
                next_id: 1,
            });
        }

        let text = std::fs::read_to_string(&path)?;
        let file: StoreFile = serde_json::from_str(&text)?;

        // next_id must stay ahead of every persisted id even if the
        // file was edited by hand
        let max_id = file.alarms.iter().map(|a| a.id).max().unwrap_or(0);
        let next_id = file.next_id.max(max_id + 1).max(1);

        tracing::info!(count = file.alarms.len(), path = %path.display(), "alarms loaded");

        Ok(Self {
            path: Some(path),
            alarms: file.alarms,
            next_id,
        })
    }

    fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = StoreFile {
            alarms: self.alarms.clone(),
            next_id: self.next_id,
        };
        std::fs::write(path, serde_json::to_string_pretty(&file)?)?;
        Ok(())
    }

    /// All alarms, in creation order
    #[must_use]
    pub fn list(&self) -> &[Alarm] {
        &self.alarms
    }

    /// Create an alarm at `time` (`HH:MM`, validated strictly)
    ///
    /// # Errors
    ///
    /// Returns error without mutating the list if the time string is
    /// invalid, or if persisting the mutation fails
    pub fn set(&mut self, time: &str, label: &str, message: &str) -> Result<Alarm> {
        let (hour, minute) = parse_time(time)?;

        let alarm = Alarm {
            id: self.next_id,
            hour,
            minute,
            label: label.to_string(),
            message: message.to_string(),
            enabled: true,
            created_at: Utc::now(),
        };
        self.alarms.push(alarm.clone());

        // A set the user was told failed must not fire later
        if let Err(e) = self.save() {
            self.alarms.pop();
            return Err(e);
        }
        self.next_id += 1;

        tracing::info!(id = alarm.id, time = %alarm.time_string(), label, "alarm set");
        Ok(alarm)
    }

    /// Delete an alarm by id; `false` if the id is unknown
    ///
    /// # Errors
    ///
    /// Returns error if persisting the mutation fails
    pub fn delete(&mut self, id: u64) -> Result<bool> {
        let before = self.alarms.len();
        self.alarms.retain(|a| a.id != id);

        if self.alarms.len() == before {
            return Ok(false);
        }

        self.save()?;
        tracing::info!(id, "alarm deleted");
        Ok(true)
    }

    /// Enable or disable an alarm by id; `false` if the id is unknown
    ///
    /// # Errors
    ///
    /// Returns error if persisting the mutation fails
    pub fn set_enabled(&mut self, id: u64, enabled: bool) -> Result<bool> {
        let Some(alarm) = self.alarms.iter_mut().find(|a| a.id == id) else {
            return Ok(false);
        };

        alarm.enabled = enabled;
        self.save()?;
        tracing::info!(id, enabled, "alarm toggled");
        Ok(true)
    }
}

/// Strictly parse an `HH:MM` time-of-day string
///
/// # Errors
///
/// Returns error for a bad separator, non-numeric parts, hour > 23, or
/// minute > 59
pub fn parse_time(s: &str) -> Result<(u32, u32)> {
    let invalid = || Error::Alarm(format!("invalid time {s:?}, expected HH:MM"));

    let (h, m) = s.trim().split_once(':').ok_or_else(invalid)?;
    if h.is_empty()
        || m.is_empty()
        || !h.chars().all(|c| c.is_ascii_digit())
        || !m.chars().all(|c| c.is_ascii_digit())
    {
        return Err(invalid());
    }

    let hour: u32 = h.parse().map_err(|_| invalid())?;
    let minute: u32 = m.parse().map_err(|_| invalid())?;
    if hour > 23 || minute > 59 {
        return Err(invalid());
    }

    Ok((hour, minute))
}
