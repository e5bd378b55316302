//! Periodic cleanup of expired artifacts.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use super::store::ArtifactCache;
use crate::error::Result;

/// Background thread running [`ArtifactCache::cleanup`] on a fixed interval.
///
/// Stops on [`CacheJanitor::shutdown`] or when dropped.
pub struct CacheJanitor {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl CacheJanitor {
    pub fn spawn(cache: Arc<ArtifactCache>, interval: Duration) -> Result<Self> {
        let (stop, stopped) = mpsc::channel::<()>();
        let handle = std::thread::Builder::new()
            .name("xlsnap-cache-janitor".to_string())
            .spawn(move || {
                tracing::debug!(interval_secs = interval.as_secs(), "cache janitor started");
                loop {
                    match stopped.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            cache.cleanup();
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                tracing::debug!("cache janitor stopped");
            })?;
        Ok(Self {
            stop: Some(stop),
            handle: Some(handle),
        })
    }

    /// Stop the thread and wait for an in-progress sweep to finish.
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("cache janitor thread panicked");
            }
        }
    }
}

impl Drop for CacheJanitor {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}
