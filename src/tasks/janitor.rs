//! Expiry Janitor Task
//!
//! Background task that periodically sweeps expired items from every shard.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::cache::ShardedCache;
use crate::error::{CacheError, Result};

/// Lifecycle of a janitor. A stopped janitor is never restarted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JanitorState {
    Idle,
    Running,
    Stopped,
}

// == Janitor ==
/// Periodic expiry sweeper bound to one [`ShardedCache`].
///
/// Each wake-up races the interval tick against a one-shot stop signal, so
/// stopping takes effect at once unless a sweep is already in progress,
/// in which case it waits for that sweep to finish (at most one tick of work).
/// Dropping the janitor also stops the task.
#[derive(Debug)]
pub struct Janitor {
    interval: Duration,
    state: Arc<Mutex<JanitorState>>,
    stop_tx: Mutex<Option<oneshot::Sender<()>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Janitor {
    /// Creates an idle janitor.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            state: Arc::new(Mutex::new(JanitorState::Idle)),
            stop_tx: Mutex::new(None),
            handle: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Current lifecycle state.
    ///
    /// A task that ended without passing through its stop path, such as one
    /// cancelled by runtime shutdown, reports `Stopped` as well.
    pub fn state(&self) -> JanitorState {
        let mut state = self.state.lock();
        if *state == JanitorState::Running && self.is_finished() {
            *state = JanitorState::Stopped;
        }
        *state
    }

    /// Spawns the sweep loop on the current tokio runtime.
    ///
    /// Fails if the janitor is not idle, the interval is zero, or no
    /// runtime is available.
    pub fn start(&self, cache: Arc<ShardedCache>) -> Result<()> {
        if self.interval.is_zero() {
            return Err(CacheError::Runtime(
                "janitor interval must be greater than zero".to_string(),
            ));
        }

        let mut state = self.state.lock();
        if *state != JanitorState::Idle {
            return Err(CacheError::Runtime(format!(
                "janitor cannot start from state {:?}",
                *state
            )));
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| CacheError::Runtime(format!("no tokio runtime for janitor: {}", e)))?;

        let (stop_tx, stop_rx) = oneshot::channel();
        let handle = runtime.spawn(run(cache, self.interval, stop_rx, Arc::clone(&self.state)));

        *state = JanitorState::Running;
        *self.stop_tx.lock() = Some(stop_tx);
        *self.handle.lock() = Some(handle);
        Ok(())
    }

    /// Sends the stop signal. Returns false if it was already sent or the
    /// janitor never started.
    pub fn stop(&self) -> bool {
        match self.stop_tx.lock().take() {
            Some(tx) => {
                // The task may already be gone; either way it is stopping.
                let _ = tx.send(());
                true
            }
            None => false,
        }
    }

    /// True once the background task has exited.
    pub fn is_finished(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .map_or(true, JoinHandle::is_finished)
    }

    /// Stops the janitor and waits for the task to exit.
    pub async fn shutdown(&self) {
        self.stop();
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
            *self.state.lock() = JanitorState::Stopped;
        }
    }
}

impl Drop for Janitor {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run(
    cache: Arc<ShardedCache>,
    period: Duration,
    mut stop_rx: oneshot::Receiver<()>,
    state: Arc<Mutex<JanitorState>>,
) {
    info!(
        "Starting expiry janitor with interval of {:?} over {} shards",
        period,
        cache.shard_count()
    );

    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            // A dropped sender counts as a stop request.
            _ = &mut stop_rx => break,
            _ = ticker.tick() => {
                let removed = cache.sweep_expired();
                if removed > 0 {
                    info!("Expiry sweep: removed {} expired items", removed);
                } else {
                    debug!("Expiry sweep: no expired items found");
                }
            }
        }
    }

    *state.lock() = JanitorState::Stopped;
    info!("Expiry janitor stopped");
}
