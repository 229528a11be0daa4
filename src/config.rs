use std::path::PathBuf;
use std::time::Duration;

/// Engine settings. `from_env` reads the `SLOTLEDGER_*` variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Journal file; `None` keeps everything in memory.
    pub journal_path: Option<PathBuf>,
    /// Fallback bound on per-item lock acquisition when a request brings none.
    pub lock_timeout: Option<Duration>,
    /// Journal appends between background compactions.
    pub compact_threshold: u64,
    pub metrics_port: Option<u16>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            journal_path: None,
            lock_timeout: None,
            compact_threshold: 1000,
            metrics_port: None,
        }
    }
}

impl EngineConfig {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn with_journal(path: impl Into<PathBuf>) -> Self {
        Self {
            journal_path: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup (tests pass a map instead of the process env).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let journal_path = lookup("SLOTLEDGER_JOURNAL")
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);
        let lock_timeout = lookup("SLOTLEDGER_LOCK_TIMEOUT_MS")
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_millis);
        let compact_threshold = lookup("SLOTLEDGER_COMPACT_THRESHOLD")
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.compact_threshold);
        let metrics_port = lookup("SLOTLEDGER_METRICS_PORT").and_then(|s| s.parse().ok());
        Self {
            journal_path,
            lock_timeout,
            compact_threshold,
            metrics_port,
        }
    }
}
