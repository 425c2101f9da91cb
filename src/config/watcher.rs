//! Rules document watcher for hot reload.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_document;
use crate::governance::GovernanceDocument;
use crate::observability::metrics;

/// A watcher that monitors the rules document for changes.
pub struct DocumentWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<GovernanceDocument>,
}

impl DocumentWatcher {
    /// Create a new DocumentWatcher.
    ///
    /// Returns the watcher and a receiver for reloaded documents.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<GovernanceDocument>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching the file in a background thread.
    ///
    /// The returned handle must be kept alive for as long as reloads are wanted.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx.clone();
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        tracing::info!(path = ?path, "Rules file change detected, reloading...");
                        match load_document(&path) {
                            Ok(document) => {
                                let _ = tx.send(document);
                            }
                            Err(e) => {
                                metrics::record_rule_reload("rejected");
                                tracing::error!("Failed to reload rules: {}. Keeping current rules.", e);
                            }
                        }
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Rules watcher started");
        Ok(watcher)
    }
}
