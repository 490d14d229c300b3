//! Test utilities: temporary log files and hand-driven signal sources.

use crate::error::{Error, Result};
use crate::watcher::{FileSnapshot, SignalSink, SignalSource, WatchSignal};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub struct TempLogFile {
    pub path: PathBuf,
    _temp_dir: tempfile::TempDir,
}

impl TempLogFile {
    /// Create a new, empty temporary log file
    pub fn new() -> std::io::Result<Self> {
        let temp_dir = tempfile::tempdir()?;
        let path = temp_dir.path().join("test.log");

        File::create(&path)?;

        Ok(Self {
            path,
            _temp_dir: temp_dir,
        })
    }

    /// Create a temporary log file with one initial line
    pub fn with_content(content: &str) -> std::io::Result<Self> {
        let temp_file = Self::new()?;
        temp_file.append_content(content)?;
        Ok(temp_file)
    }

    /// Append `content` followed by a newline
    pub fn append_content(&self, content: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().append(true).open(&self.path)?;

        writeln!(file, "{}", content)?;
        file.flush()?;
        Ok(())
    }

    /// Append bytes exactly as given, creating the file if needed
    pub fn write_raw(&self, bytes: &[u8]) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        file.write_all(bytes)?;
        file.flush()?;
        Ok(())
    }

    /// Shrink the file in place to `len` bytes
    pub fn truncate_to(&self, len: u64) -> std::io::Result<()> {
        OpenOptions::new().write(true).open(&self.path)?.set_len(len)
    }

    pub fn remove(&self) -> std::io::Result<()> {
        std::fs::remove_file(&self.path)
    }

    /// Replace the file with a new one holding `bytes` (log rotation)
    pub fn recreate(&self, bytes: &[u8]) -> std::io::Result<()> {
        let _ = std::fs::remove_file(&self.path);
        std::fs::write(&self.path, bytes)
    }

    pub fn size(&self) -> u64 {
        std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
    }

    pub fn snapshot(&self) -> FileSnapshot {
        FileSnapshot::stat(&self.path).expect("temp log file exists")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[derive(Default)]
struct FakeState {
    sink: Option<SignalSink>,
    start_calls: usize,
    starts: usize,
    closes: usize,
}

/// A [`SignalSource`] driven by the test instead of the filesystem.
#[derive(Clone, Default)]
pub struct FakeSource {
    state: Arc<Mutex<FakeState>>,
}

impl FakeSource {
    pub fn boxed(&self) -> Box<dyn SignalSource> {
        Box::new(self.clone())
    }

    /// Deliver a signal; returns false if the source is not started.
    pub fn emit(&self, signal: WatchSignal) -> bool {
        self.send(Ok(signal))
    }

    pub fn fail(&self, error: Error) -> bool {
        self.send(Err(error))
    }

    pub fn changed(&self, file: &TempLogFile) -> bool {
        self.emit(WatchSignal::Changed(file.snapshot()))
    }

    pub fn appeared(&self, file: &TempLogFile) -> bool {
        self.emit(WatchSignal::Appeared(file.snapshot()))
    }

    /// Every call to `start`, including ones on an already active source.
    pub fn start_calls(&self) -> usize {
        self.state.lock().unwrap().start_calls
    }

    pub fn starts(&self) -> usize {
        self.state.lock().unwrap().starts
    }

    pub fn closes(&self) -> usize {
        self.state.lock().unwrap().closes
    }

    fn send(&self, signal: Result<WatchSignal>) -> bool {
        match &self.state.lock().unwrap().sink {
            Some(sink) => sink.send(signal).is_ok(),
            None => false,
        }
    }
}

impl SignalSource for FakeSource {
    fn start(&mut self, sink: SignalSink) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.start_calls += 1;
        if state.sink.is_none() {
            state.sink = Some(sink);
            state.starts += 1;
        }
        Ok(())
    }

    fn close(&mut self) {
        let mut state = self.state.lock().unwrap();
        if state.sink.take().is_some() {
            state.closes += 1;
        }
    }

    fn is_active(&self) -> bool {
        self.state.lock().unwrap().sink.is_some()
    }
}

/// A [`SignalSource`] whose subscription can never be established.
pub struct FailingSource;

impl SignalSource for FailingSource {
    fn start(&mut self, _sink: SignalSink) -> Result<()> {
        Err(Error::Initialization(notify::Error::generic(
            "too many open watches",
        )))
    }

    fn close(&mut self) {}

    fn is_active(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_temp_log_file_creation() {
        let temp_file = TempLogFile::new().unwrap();
        assert!(temp_file.path().exists());
        assert_eq!(temp_file.size(), 0);
    }

    #[tokio::test]
    async fn test_append_and_raw_writes() {
        let temp_file = TempLogFile::with_content("line 1").unwrap();
        temp_file.write_raw(b"partial").unwrap();

        let content = std::fs::read_to_string(temp_file.path()).unwrap();
        assert_eq!(content, "line 1\npartial");
    }

    #[tokio::test]
    async fn test_truncate_remove_recreate() {
        let temp_file = TempLogFile::with_content("initial content").unwrap();

        temp_file.truncate_to(3).unwrap();
        assert_eq!(temp_file.size(), 3);

        temp_file.remove().unwrap();
        assert!(!temp_file.path().exists());

        temp_file.recreate(b"new\n").unwrap();
        assert_eq!(std::fs::read(temp_file.path()).unwrap(), b"new\n");
    }

    #[tokio::test]
    async fn test_fake_source_counts_transitions() {
        let fake = FakeSource::default();
        let mut source = fake.boxed();
        let (tx, mut rx) = mpsc::unbounded_channel();

        assert!(!fake.emit(WatchSignal::Disappeared));

        source.start(tx.clone()).unwrap();
        source.start(tx).unwrap();
        assert_eq!(fake.starts(), 1);

        assert!(fake.emit(WatchSignal::Disappeared));
        assert!(matches!(rx.try_recv(), Ok(Ok(WatchSignal::Disappeared))));

        source.close();
        source.close();
        assert_eq!(fake.closes(), 1);
        assert!(!source.is_active());
    }
}
