//! Main application state management

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::{Duration, Instant},
};
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::{
    pool::{TickOutcome, TimerPool},
    timer_state::{TickHandle, TimerPatch, TimerSnapshot},
};
use crate::{
    audio::SoundLibrary,
    error::{PoolError, StateError},
    gateway::RestGateway,
    tasks::countdown_task,
};

/// Interval between countdown ticks
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Shared state behind the HTTP layer and the background tasks
#[derive(Debug)]
pub struct AppState {
    /// The timer pool; `None` once torn down
    pool: Mutex<Option<TimerPool>>,
    next_ticker_id: AtomicU64,
    tick_period: Duration,
    /// Sound library the pool opens clips from
    pub sounds: SoundLibrary,
    /// Hosted database client, if one is configured
    pub gateway: Option<RestGateway>,
    /// Server metadata
    pub start_time: Instant,
    pub port: u16,
    pub host: String,
    /// Last action tracking
    last_action: Mutex<Option<(String, DateTime<Utc>)>>,
    /// Latest timer snapshots, republished after every mutation
    timers_tx: watch::Sender<Vec<TimerSnapshot>>,
}

impl AppState {
    pub fn new(
        pool: TimerPool,
        sounds: SoundLibrary,
        gateway: Option<RestGateway>,
        port: u16,
        host: String,
    ) -> Self {
        let (timers_tx, _) = watch::channel(pool.timers());

        Self {
            pool: Mutex::new(Some(pool)),
            next_ticker_id: AtomicU64::new(1),
            tick_period: TICK_PERIOD,
            sounds,
            gateway,
            start_time: Instant::now(),
            port,
            host,
            last_action: Mutex::new(None),
            timers_tx,
        }
    }

    /// Override the countdown period
    pub fn with_tick_period(mut self, period: Duration) -> Self {
        self.tick_period = period;
        self
    }

    pub fn tick_period(&self) -> Duration {
        self.tick_period
    }

    /// Run `f` against the pool under the lock, then publish new snapshots
    ///
    /// Snapshots are published even when `f` fails, since a failed audio
    /// operation can still have changed timer state.
    fn with_pool<F, R>(&self, action: Option<&str>, f: F) -> Result<R, StateError>
    where
        F: FnOnce(&mut TimerPool) -> Result<R, PoolError>,
    {
        let mut guard = self
            .pool
            .lock()
            .map_err(|_| StateError::LockPoisoned("timer pool"))?;
        let pool = guard.as_mut().ok_or(StateError::Closed)?;

        let result = f(pool);
        let timers = pool.timers();
        drop(guard);

        if let Some(action) = action {
            if let Ok(mut last_action) = self.last_action.lock() {
                *last_action = Some((action.to_string(), Utc::now()));
            }
        }
        self.timers_tx.send_replace(timers);

        result.map_err(StateError::from)
    }

    fn read_pool<F, R>(&self, f: F) -> Result<R, StateError>
    where
        F: FnOnce(&TimerPool) -> R,
    {
        let guard = self
            .pool
            .lock()
            .map_err(|_| StateError::LockPoisoned("timer pool"))?;
        guard.as_ref().map(f).ok_or(StateError::Closed)
    }

    /// Snapshots of every timer
    pub fn timers(&self) -> Result<Vec<TimerSnapshot>, StateError> {
        self.read_pool(TimerPool::timers)
    }

    pub fn timer(&self, index: usize) -> Result<TimerSnapshot, StateError> {
        self.read_pool(|pool| pool.get(index).map(|timer| timer.snapshot(index)))?
            .map_err(StateError::from)
    }

    /// Badge count of running or alerting timers
    pub fn active_count(&self) -> Result<usize, StateError> {
        self.read_pool(TimerPool::active_count)
    }

    /// Merge `patch` into timer `index`
    ///
    /// A patch that sets an idle timer running gets a countdown registration,
    /// the same way an explicit start does.
    pub fn update_timer(
        self: &Arc<Self>,
        index: usize,
        patch: TimerPatch,
    ) -> Result<TimerSnapshot, StateError> {
        self.with_pool(Some("update"), |pool| {
            let was_running = pool.get(index)?.is_running();
            let result = pool.update_partial(index, patch);

            let timer = pool.get(index)?;
            if !was_running && timer.is_running() && timer.ticker_id().is_none() {
                debug!("Timer {} set running by patch", index);
                pool.register_ticker(index, self.spawn_countdown(index))?;
            }

            result?;
            Ok(pool.get(index)?.snapshot(index))
        })
    }

    /// Start timer `index` and register its countdown task
    pub fn start_timer(
        self: &Arc<Self>,
        index: usize,
        seconds: u64,
    ) -> Result<TickOutcome, StateError> {
        self.with_pool(Some("start"), |pool| {
            pool.get(index)?;
            pool.start(index, seconds, self.spawn_countdown(index))
        })
    }

    /// Spawn the countdown task for `index` under a fresh registration id
    fn spawn_countdown(self: &Arc<Self>, index: usize) -> TickHandle {
        let ticker_id = self.next_ticker_id.fetch_add(1, Ordering::Relaxed);
        let task = tokio::spawn(countdown_task(
            Arc::clone(self),
            index,
            ticker_id,
            self.tick_period,
        ));
        TickHandle::new(ticker_id, task.abort_handle())
    }

    /// Deliver a tick from the countdown task holding `ticker_id`
    pub fn tick(&self, index: usize, ticker_id: u64) -> Result<TickOutcome, StateError> {
        self.with_pool(None, |pool| pool.tick(index, ticker_id))
    }

    pub fn stop_timer(&self, index: usize) -> Result<(), StateError> {
        self.with_pool(Some("stop"), |pool| pool.stop(index))
    }

    pub fn silence_timer(&self, index: usize) -> Result<bool, StateError> {
        self.with_pool(Some("silence"), |pool| pool.silence(index))
    }

    pub fn silence_all(&self) -> Result<usize, StateError> {
        self.with_pool(Some("silence-all"), TimerPool::silence_all)
    }

    /// Receiver that observes every published snapshot list
    pub fn subscribe(&self) -> watch::Receiver<Vec<TimerSnapshot>> {
        self.timers_tx.subscribe()
    }

    /// Release the pool, its clips and every countdown task
    pub fn shutdown(&self) {
        match self.pool.lock() {
            Ok(mut guard) => {
                if let Some(pool) = guard.take() {
                    info!("Releasing {} timers", pool.len());
                }
            }
            Err(_) => warn!("Timer pool lock poisoned during shutdown"),
        }
    }

    /// Calculate server uptime as a formatted string
    pub fn get_uptime(&self) -> String {
        let duration = self.start_time.elapsed();
        let hours = duration.as_secs() / 3600;
        let minutes = (duration.as_secs() % 3600) / 60;
        let seconds = duration.as_secs() % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }

    /// Get last action information
    pub fn get_last_action(&self) -> (Option<String>, Option<DateTime<Utc>>) {
        match self.last_action.lock().ok().and_then(|a| a.clone()) {
            Some((action, at)) => (Some(action), Some(at)),
            None => (None, None),
        }
    }
}
