#![forbid(unsafe_code)]

use super::StoreError;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JournalMode {
    #[default]
    Wal,
    Delete,
    Memory,
}

impl JournalMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Wal => "WAL",
            Self::Delete => "DELETE",
            Self::Memory => "MEMORY",
        }
    }

    pub fn parse(value: &str) -> Result<Self, StoreError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "wal" => Ok(Self::Wal),
            "delete" => Ok(Self::Delete),
            "memory" => Ok(Self::Memory),
            _ => Err(StoreError::InvalidArgument(
                "journal mode must be one of wal, delete, memory",
            )),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreConfig {
    /// Database file. `None` opens a private in-memory database.
    pub path: Option<PathBuf>,
    pub busy_timeout: Duration,
    pub journal_mode: JournalMode,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            journal_mode: JournalMode::default(),
        }
    }
}

impl StoreConfig {
    pub fn in_memory() -> Self {
        Self {
            journal_mode: JournalMode::Memory,
            ..Self::default()
        }
    }

    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Reads `WB_DB_PATH`, `WB_BUSY_TIMEOUT_MS` and `WB_JOURNAL_MODE`; unset
    /// variables keep their defaults.
    pub fn from_env() -> Result<Self, StoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, StoreError> {
        let mut config = Self::default();
        if let Some(path) = lookup("WB_DB_PATH").filter(|value| !value.trim().is_empty()) {
            config.path = Some(PathBuf::from(path));
        }
        if let Some(raw) = lookup("WB_BUSY_TIMEOUT_MS") {
            let ms = raw
                .trim()
                .parse::<u64>()
                .map_err(|_| StoreError::InvalidArgument("WB_BUSY_TIMEOUT_MS is not an integer"))?;
            config.busy_timeout = Duration::from_millis(ms);
        }
        if let Some(raw) = lookup("WB_JOURNAL_MODE") {
            config.journal_mode = JournalMode::parse(&raw)?;
        }
        if config.path.is_none() {
            config.journal_mode = JournalMode::Memory;
        }
        Ok(config)
    }
}
