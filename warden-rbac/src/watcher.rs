//! Hot reload of file-backed configuration

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, timeout};
use tracing::{debug, error, info};

use crate::enforcer::AuthorizationEngine;
use crate::error::{RbacError, RbacResult};

/// Default quiet period before a burst of file events triggers a reload
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(250);

/// Watches the configuration file and reloads the engine when it changes
pub struct ConfigWatcher {
    watcher: Option<RecommendedWatcher>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    processor_handle: Option<tokio::task::JoinHandle<()>>,
    path: PathBuf,
}

impl ConfigWatcher {
    /// Start watching the engine's configuration file
    pub fn start(engine: Arc<AuthorizationEngine>) -> RbacResult<Self> {
        Self::start_with_debounce(engine, DEFAULT_DEBOUNCE)
    }

    pub fn start_with_debounce(engine: Arc<AuthorizationEngine>, debounce: Duration) -> RbacResult<Self> {
        let path = engine.watch_path().ok_or_else(|| {
            RbacError::WatcherError("configuration source is not file backed".to_string())
        })?;
        // Editors often replace files, so watch the directory rather than the file
        let directory = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let target = path.clone();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if is_relevant(&event, &target) {
                        debug!("Configuration file event: {:?}", event.kind);
                        let _ = event_tx.send(());
                    }
                }
                Err(e) => error!("Notify error: {}", e),
            },
            Config::default(),
        )
        .map_err(|e| RbacError::WatcherError(format!("Failed to create watcher: {}", e)))?;

        watcher
            .watch(&directory, RecursiveMode::NonRecursive)
            .map_err(|e| {
                RbacError::WatcherError(format!("Failed to watch path {:?}: {}", directory, e))
            })?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let processor_handle = tokio::spawn(process_events(engine, event_rx, shutdown_rx, debounce));

        info!("Watching configuration file {:?}", path);

        Ok(Self {
            watcher: Some(watcher),
            shutdown_tx: Some(shutdown_tx),
            processor_handle: Some(processor_handle),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(handle) = self.processor_handle.take() {
            let _ = timeout(Duration::from_secs(5), handle).await;
        }

        self.watcher = None;
        info!("Configuration watcher stopped");
    }
}

/// Collapse bursts of events into one reload per debounce period
async fn process_events(
    engine: Arc<AuthorizationEngine>,
    mut event_rx: mpsc::UnboundedReceiver<()>,
    mut shutdown_rx: oneshot::Receiver<()>,
    debounce: Duration,
) {
    let mut pending = false;
    let mut debounce_interval = interval(debounce);

    loop {
        tokio::select! {
            Some(()) = event_rx.recv() => {
                pending = true;
            }

            _ = debounce_interval.tick() => {
                if pending {
                    pending = false;
                    match engine.reload_all().await {
                        Ok(generation) => info!(generation, "Reloaded configuration after file change"),
                        Err(e) => error!("Configuration reload failed, keeping previous: {}", e),
                    }
                }
            }

            _ = &mut shutdown_rx => {
                debug!("Configuration watcher shutting down");
                break;
            }
        }
    }
}

/// Whether a file system event concerns the watched configuration file
pub fn is_relevant(event: &Event, target: &Path) -> bool {
    let changes_content = matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    );
    changes_content
        && event
            .paths
            .iter()
            .any(|path| path == target || path.file_name() == target.file_name())
}
