//! File watcher for flag value hot-reload

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use notify_debouncer_full::{new_debouncer, DebounceEventResult, Debouncer, FileIdMap};
use tokio::sync::mpsc;

use flagsync_utils::{FlagsyncError, Result};

/// Watches a flag values file for changes
pub struct FlagFileWatcher {
    /// File being watched
    path: PathBuf,
    /// File name matched against event paths
    file_name: OsString,
    /// Channel receiver for events
    rx: mpsc::UnboundedReceiver<Result<Vec<Event>>>,
    /// Debouncer handle (kept alive)
    _debouncer: Debouncer<RecommendedWatcher, FileIdMap>,
}

impl FlagFileWatcher {
    /// Create a watcher on the directory holding `path`
    pub fn new(path: &Path) -> Result<Self> {
        let file_name = path
            .file_name()
            .map(OsStr::to_os_string)
            .ok_or_else(|| FlagsyncError::config(format!("Not a file path: {}", path.display())))?;
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };

        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| FlagsyncError::FileWrite {
                path: dir.clone(),
                source: e,
            })?;
        }

        let (tx, rx) = mpsc::unbounded_channel();

        let mut debouncer = new_debouncer(
            Duration::from_millis(100),
            None,
            move |result: DebounceEventResult| {
                let events = result
                    .map(|events| events.into_iter().map(|e| e.event).collect())
                    .map_err(|errs| FlagsyncError::Watch(format!("{:?}", errs)));
                let _ = tx.send(events);
            },
        )
        .map_err(|e| FlagsyncError::Watch(format!("Failed to create watcher: {}", e)))?;

        debouncer
            .watcher()
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|e| FlagsyncError::Watch(format!("Failed to watch {}: {}", dir.display(), e)))?;

        Ok(Self {
            path: path.to_path_buf(),
            file_name,
            rx,
            _debouncer: debouncer,
        })
    }

    /// Run the watcher loop, invoking `on_change` once per debounced batch
    pub async fn run<F>(mut self, mut on_change: F)
    where
        F: FnMut() + Send,
    {
        tracing::info!("Flag file watcher started for {:?}", self.path);

        while let Some(result) = self.rx.recv().await {
            match result {
                Ok(events) => {
                    if events.iter().any(|e| Self::is_flags_change(e, &self.file_name)) {
                        on_change();
                    }
                }
                Err(e) => {
                    tracing::error!("Flag file watch error: {}", e);
                }
            }
        }

        tracing::debug!("Flag file watcher stopped for {:?}", self.path);
    }

    /// Check if an event touches the watched file
    fn is_flags_change(event: &Event, file_name: &OsStr) -> bool {
        matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
            && event
                .paths
                .iter()
                .any(|p| p.file_name().map(|n| n == file_name).unwrap_or(false))
    }
}
