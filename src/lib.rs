//! Follow a single file and receive every line appended to it, like `tail -F`.
//!
//! A [`Tail`] watches the directory containing the file, skips whatever the
//! file held when the session started, and emits each newly written line in
//! file order. Truncation, deletion, and re-creation (log rotation) restart
//! reading at byte 0 of the current file.
//!
//! # Example
//!
//! ```rust,no_run
//! use log_tail::{tail_file, TailEvent};
//! use tokio_stream::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (_tail, mut lines) = tail_file("app.log").await?;
//!
//!     while let Some(event) = lines.next().await {
//!         match event {
//!             TailEvent::Line(line) => println!("{}", line),
//!             TailEvent::Error(e) => eprintln!("Error: {}", e),
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

mod config;
mod decoder;
mod error;
mod reader;
mod stream;
mod tail;
mod watcher;

#[cfg(test)]
mod test_helpers;

pub use config::{PartialLines, TailConfig, WatchConfig};
pub use error::{Error, Result};
pub use stream::{LineStream, TailEvent};
pub use tail::{Tail, TailState, TailStatus};
pub use watcher::{FileSnapshot, NotifyWatcher, SignalSink, SignalSource, WatchSignal};

use std::path::Path;

/// Follows `path` with the default configuration.
///
/// Returns the session handle, which stops following when dropped, and a
/// stream of its events.
///
/// # Example
///
/// ```rust,no_run
/// use log_tail::tail_file;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let (tail, mut lines) = tail_file("/var/log/app.log").await?;
///
///     if let Some(event) = lines.recv().await {
///         println!("{:?}", event.line());
///     }
///     tail.stop_watching();
///
///     Ok(())
/// }
/// ```
pub async fn tail_file<P: AsRef<Path>>(path: P) -> Result<(Tail, LineStream)> {
    Tail::new(path, TailConfig::default()).await
}
