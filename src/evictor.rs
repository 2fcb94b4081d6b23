use std::sync::Arc;
use std::time::Duration;

use futures::channel::oneshot;
use log::{debug, info};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};

use crate::counter::Buckets;

/// The background eviction scheduler.
///
/// Owns a task that sweeps expired buckets on a fixed interval. The first
/// sweep runs one full period after construction. The task stops when the
/// shutdown channel fires; dropping the handle without a shutdown aborts it,
/// so a forgotten counter never keeps the runtime busy.
pub(crate) struct Evictor {
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Evictor {
    pub(crate) fn spawn(buckets: Arc<Buckets>, period: Duration) -> Self {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let mut tick = interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        let removed = buckets.evict_expired();
                        debug!("evicted {} expired buckets", removed);
                    }
                    _ = &mut shutdown_rx => break,
                }
            }
            info!("evictor has quit");
        });
        Evictor {
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    /// Signals the task to stop and waits for it to exit.
    pub(crate) async fn shutdown(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for Evictor {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
