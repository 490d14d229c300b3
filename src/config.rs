//! Session configuration, loadable from TOML.

use crate::error::{Error, Result};
use encoding_rs::Encoding;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// What to do with bytes after the last line terminator of a read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartialLines {
    /// Hold the fragment and prepend it to the next read, so a line written in
    /// two pieces is still emitted once and whole.
    #[default]
    Carry,
    /// Drop the fragment. A line split across two notifications loses its
    /// first piece.
    Discard,
}

/// Options for the directory watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Do not report a file that already exists when the watch starts.
    pub ignore_initial: bool,
    /// Writes are coalesced until the file has been quiet this long.
    pub quiet_period_ms: u64,
    /// Granularity of the quiet-period check.
    pub poll_interval_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            ignore_initial: true,
            quiet_period_ms: 200,
            poll_interval_ms: 50,
        }
    }
}

impl WatchConfig {
    pub fn quiet_period(&self) -> Duration {
        Duration::from_millis(self.quiet_period_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Configuration for a [`Tail`](crate::Tail) session.
///
/// ```toml
/// encoding = "utf-8"
/// partial_lines = "carry"
///
/// [watch]
/// ignore_initial = true
/// quiet_period_ms = 200
/// poll_interval_ms = 50
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TailConfig {
    /// WHATWG encoding label, e.g. `utf-8`, `latin1`, `utf-16le`.
    pub encoding: String,
    pub partial_lines: PartialLines,
    pub watch: WatchConfig,
}

impl Default for TailConfig {
    fn default() -> Self {
        Self {
            encoding: "utf-8".to_string(),
            partial_lines: PartialLines::default(),
            watch: WatchConfig::default(),
        }
    }
}

impl TailConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TailConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a TOML configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Resolves the encoding label.
    pub fn resolve_encoding(&self) -> Result<&'static Encoding> {
        Encoding::for_label(self.encoding.trim().as_bytes())
            .ok_or_else(|| Error::UnknownEncoding(self.encoding.clone()))
    }

    pub fn validate(&self) -> Result<()> {
        self.resolve_encoding()?;

        if self.watch.quiet_period_ms == 0 {
            return Err(Error::InvalidConfig {
                message: "quiet_period_ms must be greater than zero".to_string(),
            });
        }
        if self.watch.poll_interval_ms == 0 {
            return Err(Error::InvalidConfig {
                message: "poll_interval_ms must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}
