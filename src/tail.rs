//! The tail session: a handle plus a background task that owns the read
//! position and turns watch signals into lines.

use crate::config::TailConfig;
use crate::decoder::LineDecoder;
use crate::error::{Error, Result};
use crate::reader::{calculate_bytes_to_read, current_size, detect_file_truncation, read_range};
use crate::stream::{LineStream, Subscribers, TailEvent};
use crate::watcher::{FileSnapshot, NotifyWatcher, SignalSink, SignalSource, WatchSignal};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Lifecycle of a [`Tail`]. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailState {
    Uninitialized,
    Watching,
    Stopped,
}

/// Observable progress of a [`Tail`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TailStatus {
    pub state: TailState,
    /// End of the content already consumed, in bytes.
    pub offset: u64,
    /// Number of notifications (signals and watcher errors) fully processed.
    pub signals_handled: u64,
}

/// Follows one file and emits every line appended to it after the session
/// started.
///
/// Content present when the session is created is skipped. When the file is
/// truncated, removed, or replaced, reading restarts at byte 0 of the file that
/// is there now. Dropping the handle stops the session.
pub struct Tail {
    path: PathBuf,
    source: Mutex<Box<dyn SignalSource>>,
    signal_tx: SignalSink,
    subscribers: Subscribers,
    status: Arc<watch::Sender<TailStatus>>,
    shutdown_tx: broadcast::Sender<()>,
    _task_handle: JoinHandle<()>,
}

impl Tail {
    /// Starts following `path` with a `notify` directory watch.
    ///
    /// Returns the session handle and a first subscription, registered before
    /// any signal can be processed.
    pub async fn new<P: AsRef<Path>>(path: P, config: TailConfig) -> Result<(Self, LineStream)> {
        let watcher = NotifyWatcher::new(path.as_ref(), config.watch)?;
        Self::with_source(path, config, Box::new(watcher)).await
    }

    /// Starts following `path` with signals from `source`.
    pub async fn with_source<P: AsRef<Path>>(
        path: P,
        config: TailConfig,
        source: Box<dyn SignalSource>,
    ) -> Result<(Self, LineStream)> {
        config.validate()?;
        let encoding = config.resolve_encoding()?;

        let path = path.as_ref().to_path_buf();
        if path.file_name().is_none() {
            return Err(Error::InvalidPath {
                message: format!("{} has no file name", path.display()),
            });
        }

        // Existing content is not emitted; a missing file starts at 0.
        let offset = current_size(&path).await.unwrap_or(0);

        let (status_tx, _) = watch::channel(TailStatus {
            state: TailState::Uninitialized,
            offset,
            signals_handled: 0,
        });
        let status = Arc::new(status_tx);
        let subscribers = Subscribers::default();
        let lines = subscribers.subscribe();

        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let actor = TailActor {
            path: path.clone(),
            offset,
            decoder: LineDecoder::new(encoding, config.partial_lines),
            subscribers: subscribers.clone(),
            status: Arc::clone(&status),
        };
        let task_handle = tokio::spawn(actor.run(signal_rx, shutdown_rx));

        let tail = Tail {
            path,
            source: Mutex::new(source),
            signal_tx,
            subscribers,
            status,
            shutdown_tx,
            _task_handle: task_handle,
        };
        tail.start_watching()?;

        info!(
            path = %tail.path.display(),
            offset,
            encoding = encoding.name(),
            "Tailing file"
        );
        Ok((tail, lines))
    }

    /// Starts the watch if it is not running yet.
    ///
    /// A no-op while watching. A stopped session cannot be restarted and
    /// returns [`Error::Stopped`].
    pub fn start_watching(&self) -> Result<()> {
        if self.status.borrow().state == TailState::Stopped {
            return Err(Error::Stopped);
        }

        let mut source = self.lock_source();
        if !source.is_active() {
            source.start(self.signal_tx.clone())?;
        }
        drop(source);

        self.status.send_modify(|status| {
            if status.state == TailState::Uninitialized {
                status.state = TailState::Watching;
            }
        });
        Ok(())
    }

    /// Stops the session and releases the watch. Calling it again is a no-op.
    ///
    /// A read already in progress finishes; no later signal is processed.
    pub fn stop_watching(&self) {
        let stopped_now = self.status.send_if_modified(|status| {
            if status.state == TailState::Stopped {
                false
            } else {
                status.state = TailState::Stopped;
                true
            }
        });
        if !stopped_now {
            return;
        }

        let _ = self.shutdown_tx.send(());
        self.lock_source().close();
        info!(path = %self.path.display(), "Stopped tailing file");
    }

    /// Adds another subscriber. Lines emitted before this call are not replayed.
    pub fn subscribe(&self) -> LineStream {
        self.subscribers.subscribe()
    }

    pub fn status(&self) -> TailStatus {
        *self.status.borrow()
    }

    /// A receiver that observes every status change.
    pub fn status_updates(&self) -> watch::Receiver<TailStatus> {
        self.status.subscribe()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_source(&self) -> MutexGuard<'_, Box<dyn SignalSource>> {
        self.source.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Tail {
    fn drop(&mut self) {
        self.stop_watching();
    }
}

/// Owns the offset and decoder; handles one signal at a time.
struct TailActor {
    path: PathBuf,
    offset: u64,
    decoder: LineDecoder,
    subscribers: Subscribers,
    status: Arc<watch::Sender<TailStatus>>,
}

impl TailActor {
    async fn run(
        mut self,
        mut signals: mpsc::UnboundedReceiver<Result<WatchSignal>>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.recv() => break,

                signal = signals.recv() => {
                    match signal {
                        Some(Ok(signal)) => self.handle_signal(signal).await,
                        Some(Err(error)) => self.publish_error(error),
                        None => break,
                    }
                    self.publish_status();
                }
            }
        }

        self.subscribers.close();
        debug!(path = %self.path.display(), "Tail task finished");
    }

    async fn handle_signal(&mut self, signal: WatchSignal) {
        debug!(path = %self.path.display(), offset = self.offset, ?signal, "Handling signal");

        match signal {
            WatchSignal::Appeared(snapshot) => {
                self.reset();
                self.handle_change(snapshot).await;
            }
            WatchSignal::Changed(snapshot) => self.handle_change(snapshot).await,
            WatchSignal::Disappeared => self.reset(),
        }
    }

    async fn handle_change(&mut self, snapshot: FileSnapshot) {
        if detect_file_truncation(snapshot.size, self.offset) {
            warn!(
                path = %self.path.display(),
                old_offset = self.offset,
                new_len = snapshot.size,
                "File truncated, resetting offset to 0"
            );
            self.reset();
        }

        let Some(bytes_to_read) = calculate_bytes_to_read(snapshot.size, self.offset) else {
            return;
        };

        let start = self.offset;
        let content = match read_range(&self.path, start, bytes_to_read).await {
            Ok(content) => content,
            Err(source) => {
                self.publish_error(Error::Read {
                    path: self.path.clone(),
                    offset: start,
                    source,
                });
                return;
            }
        };

        let lines = self.decoder.decode(&content, start);
        debug!(
            path = %self.path.display(),
            offset = start,
            bytes = content.len(),
            lines = lines.len(),
            "Read new content"
        );
        for line in lines {
            match line {
                Ok(line) => self.subscribers.publish(TailEvent::Line(line)),
                Err(malformed) => self.publish_error(Error::Decode {
                    path: self.path.clone(),
                    offset: malformed.offset,
                    encoding: self.decoder.encoding().name(),
                }),
            }
        }

        self.offset = start + content.len() as u64;
    }

    fn reset(&mut self) {
        self.offset = 0;
        self.decoder.reset();
    }

    fn publish_error(&self, error: Error) {
        warn!(path = %self.path.display(), offset = self.offset, %error, "Tail error");
        self.subscribers.publish(TailEvent::Error(Arc::new(error)));
    }

    fn publish_status(&self) {
        let offset = self.offset;
        self.status.send_modify(|status| {
            status.offset = offset;
            status.signals_handled += 1;
        });
    }
}
