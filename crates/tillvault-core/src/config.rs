use std::fmt;
use std::path::Path;
use std::time::Duration;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::error::{Result, VaultError};
use crate::storage::LOCAL_BACKEND_ID;

/// Environment variable consulted when the config file carries no
/// passphrase. Mirrors how the daemon is expected to run unattended.
pub const PASSPHRASE_ENV: &str = "TILLVAULT_PASSPHRASE";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Hourly,
    Daily,
    Weekly,
    Monthly,
}

impl Frequency {
    /// How often the scheduler worker wakes to run a due-check. Hourly and
    /// daily schedules wake every hour to catch the target time-of-day;
    /// weekly and monthly wake once a day.
    pub fn wake_interval(self) -> Duration {
        match self {
            Frequency::Hourly | Frequency::Daily => Duration::from_secs(3600),
            Frequency::Weekly | Frequency::Monthly => Duration::from_secs(24 * 3600),
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frequency::Hourly => write!(f, "hourly"),
            Frequency::Daily => write!(f, "daily"),
            Frequency::Weekly => write!(f, "weekly"),
            Frequency::Monthly => write!(f, "monthly"),
        }
    }
}

/// Which backends a backup run writes to. Resolved to registry identifiers;
/// nothing downstream branches on backend identity beyond the lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Destinations {
    #[serde(default = "default_true")]
    pub local: bool,
    /// Identifier of a registered remote backend, if any.
    #[serde(default)]
    pub remote: Option<String>,
}

impl Default for Destinations {
    fn default() -> Self {
        Self {
            local: true,
            remote: None,
        }
    }
}

impl Destinations {
    pub fn local_only() -> Self {
        Self::default()
    }

    pub fn backend_ids(&self) -> Vec<String> {
        let mut ids = Vec::new();
        if self.local {
            ids.push(LOCAL_BACKEND_ID.to_string());
        }
        if let Some(ref remote) = self.remote {
            ids.push(remote.clone());
        }
        ids
    }

    pub fn is_empty(&self) -> bool {
        !self.local && self.remote.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_frequency")]
    pub frequency: Frequency,
    /// Target time-of-day ("HH:MM") for daily schedules.
    #[serde(default = "default_daily_time")]
    pub time: String,
    #[serde(default)]
    pub destinations: Destinations,
    #[serde(default)]
    pub encryption_enabled: bool,
    /// Retention cap for auto-backup records. Must be at least 1.
    #[serde(default = "default_max_backups")]
    pub max_backups: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            frequency: default_frequency(),
            time: default_daily_time(),
            destinations: Destinations::default(),
            encryption_enabled: false,
            max_backups: default_max_backups(),
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_backups < 1 {
            return Err(VaultError::Config(
                "scheduler.max_backups must be at least 1".into(),
            ));
        }
        if self.destinations.is_empty() {
            return Err(VaultError::Config(
                "scheduler has no destinations: enable local or set a remote backend".into(),
            ));
        }
        parse_time_of_day(&self.time)?;
        Ok(())
    }

    /// Parsed daily target time. Validation guarantees this parses; a
    /// hand-edited value that slipped past it falls back to midnight.
    pub fn daily_time(&self) -> NaiveTime {
        parse_time_of_day(&self.time).unwrap_or(NaiveTime::MIN)
    }

    pub fn wake_interval(&self) -> Duration {
        self.frequency.wake_interval()
    }
}

/// Parse a "HH:MM" time-of-day string.
pub fn parse_time_of_day(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .map_err(|_| VaultError::Config(format!("invalid time-of-day '{s}', expected HH:MM")))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Registry identifier for this backend, e.g. "store-cloud".
    pub id: String,
    /// Base URL of the remote object store.
    pub url: String,
    #[serde(default)]
    pub token: Option<String>,
}

/// Top-level application config, loaded from a YAML file by the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Root directory of the durable keyed store (application state,
    /// history ledger, scheduler state).
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Directory the local backend writes sealed envelopes into.
    #[serde(default = "default_backup_dir")]
    pub backup_dir: String,
    #[serde(default)]
    pub remote: Option<RemoteConfig>,
    /// Encryption passphrase. Prefer [`PASSPHRASE_ENV`] over putting this
    /// in the file.
    #[serde(default)]
    pub passphrase: Option<String>,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            backup_dir: default_backup_dir(),
            remote: None,
            passphrase: None,
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: AppConfig = serde_yaml::from_str(&text)
            .map_err(|e| VaultError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.scheduler.validate()?;
        if let Some(ref remote) = self.scheduler.destinations.remote {
            match self.remote {
                Some(ref r) if r.id == *remote => {}
                _ => {
                    return Err(VaultError::Config(format!(
                        "scheduler references remote backend '{remote}' but none is configured"
                    )))
                }
            }
        }
        Ok(())
    }

    /// Resolution chain: config field, then environment.
    pub fn resolve_passphrase(&self) -> Option<String> {
        self.passphrase
            .clone()
            .or_else(|| std::env::var(PASSPHRASE_ENV).ok())
    }
}

/// Starter config file body written by `tillvault config`.
pub fn minimal_config_template() -> &'static str {
    r#"# tillvault configuration

# Where durable state lives (application state, backup history).
data_dir: tillvault-data

# Where local backup files are written.
backup_dir: tillvault-backups

# Optional remote object store.
# remote:
#   id: store-cloud
#   url: https://backups.example.com
#   token: <api token>

# Encryption passphrase. Prefer the TILLVAULT_PASSPHRASE environment
# variable over storing it here.
# passphrase: change-me

scheduler:
  enabled: false
  frequency: daily        # hourly | daily | weekly | monthly
  time: "02:00"           # target time-of-day for daily schedules
  encryption_enabled: false
  max_backups: 10
  destinations:
    local: true
    # remote: store-cloud
"#
}

fn default_true() -> bool {
    true
}

fn default_frequency() -> Frequency {
    Frequency::Daily
}

fn default_daily_time() -> String {
    "02:00".to_string()
}

fn default_max_backups() -> usize {
    10
}

fn default_data_dir() -> String {
    "tillvault-data".to_string()
}

fn default_backup_dir() -> String {
    "tillvault-backups".to_string()
}
