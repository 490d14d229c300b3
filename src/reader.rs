//! Byte-range reads of the followed file.

use std::io::SeekFrom;
use std::path::Path;
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// Size of the file, or `None` if it cannot be stat'ed.
pub(crate) async fn current_size(file_path: &Path) -> Option<u64> {
    fs::metadata(file_path).await.ok().map(|metadata| metadata.len())
}

/// Reads at most `len` bytes starting at `start`.
///
/// Fewer bytes are returned if the file shrank since it was stat'ed.
pub(crate) async fn read_range(file_path: &Path, start: u64, len: u64) -> std::io::Result<Vec<u8>> {
    let mut file = File::open(file_path).await?;
    file.seek(SeekFrom::Start(start)).await?;

    let mut content = Vec::new();
    file.take(len).read_to_end(&mut content).await?;
    Ok(content)
}

/// Detect if the file was truncated by comparing current size with last position
pub(crate) fn detect_file_truncation(current_size: u64, last_position: u64) -> bool {
    current_size < last_position
}

/// Calculate bytes to read based on current size and last position
pub(crate) fn calculate_bytes_to_read(current_size: u64, last_position: u64) -> Option<u64> {
    if current_size <= last_position {
        None
    } else {
        Some(current_size - last_position)
    }
}
