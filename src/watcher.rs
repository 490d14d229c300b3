//! Directory watching that reduces notify events to signals about one file.

use crate::config::WatchConfig;
use crate::error::{Error, Result};
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode};
use notify_debouncer_full::{DebounceEventResult, Debouncer, RecommendedCache, new_debouncer};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::sync::mpsc;
use tracing::debug;

/// State of the followed file at the moment a notification was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileSnapshot {
    pub size: u64,
    pub modified: Option<SystemTime>,
}

impl FileSnapshot {
    /// Stats `path`, returning `None` if it does not exist or cannot be read.
    pub fn stat(path: &Path) -> Option<Self> {
        let metadata = std::fs::metadata(path).ok()?;
        Some(Self {
            size: metadata.len(),
            modified: metadata.modified().ok(),
        })
    }
}

/// A normalized notification about the followed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchSignal {
    /// The file was created, or another file was moved into its place.
    Appeared(FileSnapshot),
    /// The file's content or metadata changed.
    Changed(FileSnapshot),
    /// The file was removed or moved away.
    Disappeared,
}

/// Channel a [`SignalSource`] delivers into.
pub type SignalSink = mpsc::UnboundedSender<Result<WatchSignal>>;

/// Something that can watch a file and deliver [`WatchSignal`]s.
///
/// Implementations must tolerate repeated calls: starting an active source and
/// closing an inactive one are both no-ops.
pub trait SignalSource: Send {
    fn start(&mut self, sink: SignalSink) -> Result<()>;
    fn close(&mut self);
    fn is_active(&self) -> bool;
}

/// [`SignalSource`] backed by `notify` with a debouncer, observing the
/// directory that contains the target file.
pub struct NotifyWatcher {
    file_path: PathBuf,
    file_name: OsString,
    options: WatchConfig,
    debouncer: Option<Debouncer<RecommendedWatcher, RecommendedCache>>,
}

impl NotifyWatcher {
    /// Creates a watcher for `path`. Nothing is observed until [`SignalSource::start`].
    pub fn new<P: AsRef<Path>>(path: P, options: WatchConfig) -> Result<Self> {
        let file_path = path.as_ref().to_path_buf();
        let file_name = file_path
            .file_name()
            .ok_or_else(|| Error::InvalidPath {
                message: format!("{} has no file name", file_path.display()),
            })?
            .to_os_string();

        Ok(Self {
            file_path,
            file_name,
            options,
            debouncer: None,
        })
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }
}

impl SignalSource for NotifyWatcher {
    fn start(&mut self, sink: SignalSink) -> Result<()> {
        if self.debouncer.is_some() {
            return Ok(());
        }

        let file_path = self.file_path.clone();
        let file_name = self.file_name.clone();
        let handler_sink = sink.clone();

        let mut debouncer = new_debouncer(
            self.options.quiet_period(),
            Some(self.options.poll_interval()),
            move |result: DebounceEventResult| match result {
                Ok(events) => {
                    for event in &events {
                        if let Some(signal) = signal_for_event(&event.event, &file_name, &file_path)
                        {
                            let _ = handler_sink.send(Ok(signal));
                        }
                    }
                }
                Err(errors) => {
                    for error in errors {
                        let _ = handler_sink.send(Err(Error::Watcher(error)));
                    }
                }
            },
        )?;

        let directory = watch_directory(&self.file_path);
        debouncer.watch(directory, RecursiveMode::NonRecursive)?;
        debug!(directory = %directory.display(), "Directory watch registered");

        if !self.options.ignore_initial {
            if let Some(snapshot) = FileSnapshot::stat(&self.file_path) {
                let _ = sink.send(Ok(WatchSignal::Appeared(snapshot)));
            }
        }

        self.debouncer = Some(debouncer);
        Ok(())
    }

    fn close(&mut self) {
        if let Some(debouncer) = self.debouncer.take() {
            drop(debouncer);
            debug!(path = %self.file_path.display(), "Directory watch closed");
        }
    }

    fn is_active(&self) -> bool {
        self.debouncer.is_some()
    }
}

impl Drop for NotifyWatcher {
    fn drop(&mut self) {
        self.close();
    }
}

/// Directory to observe for `file_path`; `.` for a bare file name.
pub(crate) fn watch_directory(file_path: &Path) -> &Path {
    match file_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// What a relevant event means for the followed file, before stat-ing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SignalKind {
    Appeared,
    Changed,
    Disappeared,
    /// A rename whose direction the platform did not report.
    Renamed,
}

/// Check if a notify event is relevant to a specific file
pub(crate) fn is_event_relevant_to_file(event: &Event, target_file_name: &OsStr) -> bool {
    event.paths.iter().any(|path| is_target(path, target_file_name))
}

fn is_target(path: &Path, target_file_name: &OsStr) -> bool {
    path.file_name() == Some(target_file_name)
}

pub(crate) fn classify_event(event: &Event, target_file_name: &OsStr) -> Option<SignalKind> {
    if !is_event_relevant_to_file(event, target_file_name) {
        return None;
    }

    match event.kind {
        EventKind::Create(_) => Some(SignalKind::Appeared),
        EventKind::Remove(_) => Some(SignalKind::Disappeared),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => Some(SignalKind::Appeared),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => Some(SignalKind::Disappeared),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            // paths are [from, to]
            match event.paths.last() {
                Some(to) if is_target(to, target_file_name) => Some(SignalKind::Appeared),
                _ => Some(SignalKind::Disappeared),
            }
        }
        EventKind::Modify(ModifyKind::Name(_)) => Some(SignalKind::Renamed),
        EventKind::Modify(_) => Some(SignalKind::Changed),
        _ => None,
    }
}

/// Classifies `event` and attaches a fresh snapshot of `file_path`.
pub(crate) fn signal_for_event(
    event: &Event,
    target_file_name: &OsStr,
    file_path: &Path,
) -> Option<WatchSignal> {
    match classify_event(event, target_file_name)? {
        SignalKind::Appeared => FileSnapshot::stat(file_path).map(WatchSignal::Appeared),
        SignalKind::Changed => Some(
            FileSnapshot::stat(file_path).map_or(WatchSignal::Disappeared, WatchSignal::Changed),
        ),
        SignalKind::Disappeared => Some(WatchSignal::Disappeared),
        // Whether the file is there now tells which side of the rename it was on.
        SignalKind::Renamed => Some(
            FileSnapshot::stat(file_path).map_or(WatchSignal::Disappeared, WatchSignal::Appeared),
        ),
    }
}
