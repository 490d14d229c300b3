//! Error types for the log tail library.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for tail operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The directory watch could not be established. Fatal for the session.
    #[error("Failed to start file watcher: {0}")]
    Initialization(#[from] notify::Error),

    /// The watcher reported an error after it was started.
    #[error("File watcher error: {0}")]
    Watcher(notify::Error),

    /// A ranged read of the followed file failed.
    #[error("Failed to read {} at offset {offset}: {source}", path.display())]
    Read {
        path: PathBuf,
        offset: u64,
        #[source]
        source: std::io::Error,
    },

    /// A line of the file is not valid in the configured encoding. `offset` is
    /// where the line starts; the line is skipped.
    #[error("Invalid {encoding} data in {} on the line at offset {offset}", path.display())]
    Decode {
        path: PathBuf,
        offset: u64,
        encoding: &'static str,
    },

    /// The configured encoding label is not recognised.
    #[error("Unknown encoding: {0}")]
    UnknownEncoding(String),

    /// A configuration value is out of range.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Configuration file could not be parsed.
    #[error("Configuration parse error: {0}")]
    Config(#[from] toml::de::Error),

    /// File path errors.
    #[error("Invalid file path: {message}")]
    InvalidPath { message: String },

    /// I/O errors outside of a tail read, e.g. loading a config file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The session was stopped and cannot be restarted.
    #[error("Tail session stopped")]
    Stopped,
}

/// A convenient Result type for log tail operations.
pub type Result<T> = std::result::Result<T, Error>;
