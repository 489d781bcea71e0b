//! Fixed-size pool of independent countdown timers
//!
//! Every state transition (start, tick, expire, stop, silence, sound change)
//! goes through [`TimerPool::update_partial`], so the invariants of a slot are
//! enforced in one place.

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::timer_state::{TickHandle, Timer, TimerPatch, TimerPhase, TimerSnapshot};
use crate::{
    audio::AudioBackend,
    error::{AudioError, PoolError},
};

/// Number of timers the shop floor starts with
pub const DEFAULT_TIMER_COUNT: usize = 6;

/// Result of delivering one tick to a timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Still counting down
    Ticked { seconds_left: u64 },
    /// Reached zero and started alerting
    Expired,
    /// The registration was cancelled or replaced; nothing changed
    Stale,
}

/// Owner of N timer slots, N fixed at creation
pub struct TimerPool {
    timers: Vec<Timer>,
    backend: Arc<dyn AudioBackend>,
}

impl std::fmt::Debug for TimerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerPool")
            .field("timers", &self.timers)
            .finish_non_exhaustive()
    }
}

impl TimerPool {
    /// Create `count` idle timers, each owning a fresh clip of `default_sound`
    pub fn initialize(
        count: usize,
        backend: Arc<dyn AudioBackend>,
        default_sound: &str,
    ) -> Result<Self, PoolError> {
        if count == 0 {
            return Err(PoolError::EmptyPool);
        }

        let timers = (0..count)
            .map(|_| backend.open(default_sound).map(Timer::idle))
            .collect::<Result<Vec<_>, AudioError>>()?;

        info!("Timer pool initialized with {} timers (sound '{}')", count, default_sound);
        Ok(Self { timers, backend })
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    /// Always false; a pool cannot be created empty
    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<&Timer, PoolError> {
        self.timers.get(index).ok_or(PoolError::IndexOutOfRange {
            index,
            count: self.timers.len(),
        })
    }

    fn get_mut(&mut self, index: usize) -> Result<&mut Timer, PoolError> {
        let count = self.timers.len();
        self.timers
            .get_mut(index)
            .ok_or(PoolError::IndexOutOfRange { index, count })
    }

    /// Snapshots of every timer, in index order
    pub fn timers(&self) -> Vec<TimerSnapshot> {
        self.timers
            .iter()
            .enumerate()
            .map(|(index, timer)| timer.snapshot(index))
            .collect()
    }

    /// Merge `patch` into the timer at `index`
    ///
    /// Leaving the running phase cancels the tick registration. Leaving the
    /// alerting phase stops and rewinds the clip. A sound change swaps the
    /// owned clip; if the new clip cannot be opened the other fields still
    /// apply and the old clip stays bound. Audio errors are reported only
    /// after every field has been applied.
    pub fn update_partial(&mut self, index: usize, patch: TimerPatch) -> Result<(), PoolError> {
        let backend = Arc::clone(&self.backend);
        let timer = self.get_mut(index)?;

        if let Some(value) = patch.input_value {
            timer.input_value = value;
        }
        if let Some(seconds) = patch.seconds_left {
            timer.seconds_left = seconds;
        }

        let running = patch.is_running.unwrap_or(timer.is_running());
        let flashing = patch.is_flashing.unwrap_or(timer.is_flashing());
        let phase = TimerPhase::from_flags(running, flashing);
        let previous_phase = timer.phase;
        if phase != previous_phase {
            debug!("Timer {} {:?} -> {:?}", index, previous_phase, phase);
            timer.phase = phase;
        }
        if !phase.is_running() && timer.ticker.take().is_some() {
            debug!("Timer {} tick registration cancelled", index);
        }

        let audio_result = if previous_phase.is_flashing() && !phase.is_flashing() {
            timer.audio.stop().and_then(|()| timer.audio.rewind())
        } else {
            Ok(())
        };

        if let Some(sound) = patch.selected_sound {
            if sound != timer.selected_sound {
                let replacement = backend.open(&sound)?;
                let mut previous = std::mem::replace(&mut timer.audio, replacement);
                if let Err(e) = previous.stop() {
                    warn!("Failed to stop released clip for timer {}: {}", index, e);
                }
                info!(
                    "Timer {} sound changed from '{}' to '{}'",
                    index, timer.selected_sound, sound
                );
                timer.selected_sound = sound;
            }
        }

        audio_result.map_err(PoolError::from)
    }

    /// Install the tick registration of a running timer
    ///
    /// A timer that is not running drops the registration straight away.
    pub fn register_ticker(&mut self, index: usize, ticker: TickHandle) -> Result<(), PoolError> {
        let timer = self.get_mut(index)?;
        if timer.is_running() {
            timer.ticker = Some(ticker);
        }
        Ok(())
    }

    /// Number of timers that are running or alerting
    pub fn active_count(&self) -> usize {
        self.timers.iter().filter(|timer| timer.is_active()).count()
    }

    /// Begin counting down `seconds` at `index` under the given registration
    ///
    /// A zero duration expires straight away.
    pub fn start(
        &mut self,
        index: usize,
        seconds: u64,
        ticker: TickHandle,
    ) -> Result<TickOutcome, PoolError> {
        if self.get(index)?.is_flashing() {
            self.silence(index)?;
        }

        if seconds == 0 {
            return self.expire(index);
        }

        self.update_partial(
            index,
            TimerPatch::default()
                .seconds_left(seconds)
                .running(true)
                .flashing(false),
        )?;
        self.get_mut(index)?.ticker = Some(ticker);
        info!("Timer {} started for {}s", index, seconds);
        Ok(TickOutcome::Ticked {
            seconds_left: seconds,
        })
    }

    /// Deliver one tick from registration `ticker_id`
    pub fn tick(&mut self, index: usize, ticker_id: u64) -> Result<TickOutcome, PoolError> {
        let timer = self.get(index)?;
        if !timer.is_running() || timer.ticker_id() != Some(ticker_id) {
            return Ok(TickOutcome::Stale);
        }

        let seconds_left = timer.seconds_left().saturating_sub(1);
        if seconds_left == 0 {
            return self.expire(index);
        }

        self.update_partial(index, TimerPatch::default().seconds_left(seconds_left))?;
        Ok(TickOutcome::Ticked { seconds_left })
    }

    /// Switch the timer to alerting and start its alarm
    ///
    /// The state change holds even when playback fails.
    fn expire(&mut self, index: usize) -> Result<TickOutcome, PoolError> {
        self.update_partial(
            index,
            TimerPatch::default()
                .seconds_left(0)
                .running(false)
                .flashing(true),
        )?;
        info!("Timer {} expired", index);
        self.get_mut(index)?.audio.play()?;
        Ok(TickOutcome::Expired)
    }

    /// Stop a running timer, cancelling its tick registration
    pub fn stop(&mut self, index: usize) -> Result<(), PoolError> {
        self.update_partial(index, TimerPatch::default().running(false))
    }

    /// Silence one alerting timer; returns whether it was alerting
    pub fn silence(&mut self, index: usize) -> Result<bool, PoolError> {
        if !self.get(index)?.is_flashing() {
            return Ok(false);
        }

        self.update_partial(index, TimerPatch::default().running(false).flashing(false))?;
        debug!("Timer {} silenced", index);
        Ok(true)
    }

    /// Silence every alerting timer, leaving all others untouched
    ///
    /// Returns how many timers were silenced. Every alerting timer has its
    /// flags cleared before the first audio failure, if any, is reported.
    pub fn silence_all(&mut self) -> Result<usize, PoolError> {
        let flashing: Vec<usize> = self
            .timers
            .iter()
            .enumerate()
            .filter(|(_, timer)| timer.is_flashing())
            .map(|(index, _)| index)
            .collect();

        let mut first_error = None;
        for &index in &flashing {
            if let Err(e) = self.silence(index) {
                warn!("Audio failure while silencing timer {}: {}", index, e);
                first_error.get_or_insert(e);
            }
        }

        if !flashing.is_empty() {
            info!("Silenced {} alarms", flashing.len());
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(flashing.len()),
        }
    }
}

impl Drop for TimerPool {
    fn drop(&mut self) {
        for (index, timer) in self.timers.iter_mut().enumerate() {
            if timer.audio.is_playing() {
                if let Err(e) = timer.audio.stop() {
                    warn!("Failed to stop alarm of timer {} on teardown: {}", index, e);
                }
            }
        }
        debug!("Timer pool released {} timers", self.timers.len());
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::audio::testing::MockBackend;

    fn pool(count: usize) -> (TimerPool, Arc<MockBackend>) {
        let backend = MockBackend::new();
        let pool = TimerPool::initialize(count, backend.clone(), "alarm").unwrap();
        (pool, backend)
    }

    fn alerting(pool: &mut TimerPool, index: usize) {
        pool.update_partial(
            index,
            TimerPatch::default().seconds_left(0).running(false).flashing(true),
        )
        .unwrap();
    }

    #[test]
    fn rejects_an_empty_pool() {
        let backend = MockBackend::new();
        let err = TimerPool::initialize(0, backend, "alarm").unwrap_err();
        assert_eq!(err, PoolError::EmptyPool);
    }

    #[test]
    fn initializes_idle_timers_with_distinct_audio() {
        let (pool, backend) = pool(6);
        assert_eq!(pool.len(), 6);

        for snapshot in pool.timers() {
            assert_eq!(snapshot.phase, TimerPhase::Idle);
            assert_eq!(snapshot.seconds_left, 0);
            assert!(!snapshot.is_running);
            assert!(!snapshot.is_flashing);
            assert_eq!(snapshot.selected_sound, "alarm");
        }

        let mut ids: Vec<u64> = (0..6).map(|i| pool.get(i).unwrap().audio().id()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 6);
        assert_eq!(backend.recorder.opened.lock().unwrap().len(), 6);
    }

    #[test]
    fn initialization_fails_when_the_sound_is_missing() {
        let backend = MockBackend::new();
        backend.mark_missing("alarm");
        let err = TimerPool::initialize(3, backend, "alarm").unwrap_err();
        assert!(matches!(err, PoolError::Audio(AudioError::NotFound { .. })));
    }

    #[test]
    fn update_touches_only_the_target_timer() {
        let (mut pool, _) = pool(3);
        let before = pool.timers();

        pool.update_partial(1, TimerPatch::default().input_value("2:00")).unwrap();

        let after = pool.timers();
        assert_eq!(after[0], before[0]);
        assert_eq!(after[2], before[2]);
        assert_eq!(after[1].input_value, "2:00");
        assert_eq!(after[1].seconds_left, before[1].seconds_left);
        assert_eq!(after[1].phase, before[1].phase);
    }

    #[test]
    fn out_of_range_update_changes_nothing() {
        let (mut pool, _) = pool(3);
        let before = pool.timers();

        let err = pool
            .update_partial(3, TimerPatch::default().running(true).seconds_left(9))
            .unwrap_err();

        assert_eq!(err, PoolError::IndexOutOfRange { index: 3, count: 3 });
        assert_eq!(pool.timers(), before);
    }

    #[test]
    fn active_count_follows_updates() {
        let (mut pool, _) = pool(3);
        assert_eq!(pool.active_count(), 0);

        pool.update_partial(1, TimerPatch::default().running(true).seconds_left(5)).unwrap();
        assert_eq!(pool.active_count(), 1);

        alerting(&mut pool, 2);
        assert_eq!(pool.active_count(), 2);

        pool.update_partial(1, TimerPatch::default().running(false)).unwrap();
        assert_eq!(pool.active_count(), 1);
    }

    #[test]
    fn expiry_then_silence_all() {
        let (mut pool, _) = pool(3);
        pool.update_partial(1, TimerPatch::default().running(true).seconds_left(1)).unwrap();

        alerting(&mut pool, 1);
        assert_eq!(pool.active_count(), 1);

        assert_eq!(pool.silence_all().unwrap(), 1);
        let timer = pool.get(1).unwrap();
        assert!(!timer.is_running());
        assert!(!timer.is_flashing());
        assert_eq!(pool.active_count(), 0);
    }

    #[test]
    fn silence_all_leaves_running_timers_alone() {
        let (mut pool, _) = pool(3);
        pool.start(0, 30, TickHandle::detached(7)).unwrap();
        alerting(&mut pool, 2);
        let running_before = pool.timers()[0].clone();

        pool.silence_all().unwrap();

        assert_eq!(pool.timers()[0], running_before);
        assert_eq!(pool.get(0).unwrap().ticker_id(), Some(7));
        assert_eq!(pool.get(2).unwrap().phase(), TimerPhase::Idle);
    }

    #[test]
    fn flashing_never_reads_as_running() {
        let (mut pool, _) = pool(1);
        pool.update_partial(0, TimerPatch::default().running(true).flashing(true)).unwrap();

        let timer = pool.get(0).unwrap();
        assert!(timer.is_flashing());
        assert!(!timer.is_running());
        assert_eq!(pool.active_count(), 1);
    }

    #[test]
    fn ticks_count_down_and_expire() {
        let (mut pool, _) = pool(2);
        pool.start(0, 2, TickHandle::detached(1)).unwrap();

        assert_eq!(
            pool.tick(0, 1).unwrap(),
            TickOutcome::Ticked { seconds_left: 1 }
        );
        assert_eq!(pool.tick(0, 1).unwrap(), TickOutcome::Expired);

        let timer = pool.get(0).unwrap();
        assert_eq!(timer.phase(), TimerPhase::Alerting);
        assert_eq!(timer.seconds_left(), 0);
        assert!(timer.audio().is_playing());
        assert_eq!(timer.ticker_id(), None);
    }

    #[test]
    fn stale_ticks_are_ignored() {
        let (mut pool, _) = pool(1);
        pool.start(0, 10, TickHandle::detached(1)).unwrap();
        pool.start(0, 10, TickHandle::detached(2)).unwrap();

        assert_eq!(pool.tick(0, 1).unwrap(), TickOutcome::Stale);
        assert_eq!(pool.get(0).unwrap().seconds_left(), 10);

        pool.stop(0).unwrap();
        assert_eq!(pool.tick(0, 2).unwrap(), TickOutcome::Stale);
        assert_eq!(pool.get(0).unwrap().seconds_left(), 10);
    }

    #[test]
    fn zero_duration_expires_immediately() {
        let (mut pool, _) = pool(1);
        let outcome = pool.start(0, 0, TickHandle::detached(1)).unwrap();
        assert_eq!(outcome, TickOutcome::Expired);
        assert!(pool.get(0).unwrap().is_flashing());
    }

    #[test]
    fn playback_failure_still_marks_the_timer_alerting() {
        let (mut pool, backend) = pool(1);
        pool.start(0, 1, TickHandle::detached(1)).unwrap();
        backend.recorder.fail_playback.store(true, Ordering::SeqCst);

        let err = pool.tick(0, 1).unwrap_err();
        assert!(matches!(err, PoolError::Audio(AudioError::Device(_))));
        assert!(pool.get(0).unwrap().is_flashing());
    }

    #[test]
    fn silence_failure_still_clears_every_alarm() {
        let (mut pool, backend) = pool(3);
        alerting(&mut pool, 0);
        alerting(&mut pool, 2);
        backend.recorder.fail_playback.store(true, Ordering::SeqCst);

        assert!(pool.silence_all().is_err());
        assert_eq!(pool.active_count(), 0);
    }

    #[test]
    fn patching_out_of_alerting_stops_the_alarm() {
        let (mut pool, _) = pool(2);
        assert_eq!(pool.start(0, 0, TickHandle::detached(1)).unwrap(), TickOutcome::Expired);
        assert!(pool.get(0).unwrap().audio().is_playing());

        pool.update_partial(0, TimerPatch::default().flashing(false)).unwrap();

        let timer = pool.get(0).unwrap();
        assert_eq!(timer.phase(), TimerPhase::Idle);
        assert!(!timer.audio().is_playing());
        assert!(!pool.timers()[0].alarm_playing);
    }

    #[test]
    fn patching_out_of_alerting_reports_audio_failure_after_the_change() {
        let (mut pool, backend) = pool(1);
        pool.start(0, 0, TickHandle::detached(1)).unwrap();
        backend.recorder.fail_playback.store(true, Ordering::SeqCst);

        let err = pool
            .update_partial(0, TimerPatch::default().flashing(false).input_value("0:30"))
            .unwrap_err();

        assert!(matches!(err, PoolError::Audio(AudioError::Device(_))));
        let timer = pool.get(0).unwrap();
        assert_eq!(timer.phase(), TimerPhase::Idle);
        assert_eq!(timer.input_value(), "0:30");
    }

    #[test]
    fn changing_sound_swaps_the_owned_clip() {
        let (mut pool, backend) = pool(2);
        let old_id = pool.get(0).unwrap().audio().id();

        pool.update_partial(0, TimerPatch::default().sound("bell")).unwrap();

        let timer = pool.get(0).unwrap();
        assert_eq!(timer.selected_sound(), "bell");
        assert_eq!(timer.audio().sound(), "bell");
        assert_ne!(timer.audio().id(), old_id);
        assert!(backend.recorder.released.lock().unwrap().contains(&old_id));
        assert_eq!(pool.get(1).unwrap().selected_sound(), "alarm");
    }

    #[test]
    fn failed_sound_change_keeps_other_fields() {
        let (mut pool, backend) = pool(1);
        backend.mark_missing("siren");

        let err = pool
            .update_partial(0, TimerPatch::default().sound("siren").input_value("45"))
            .unwrap_err();

        assert!(matches!(err, PoolError::Audio(AudioError::NotFound { .. })));
        let timer = pool.get(0).unwrap();
        assert_eq!(timer.input_value(), "45");
        assert_eq!(timer.selected_sound(), "alarm");
    }

    #[test]
    fn dropping_the_pool_releases_every_clip() {
        let (pool, backend) = pool(4);
        drop(pool);
        assert_eq!(backend.recorder.released.lock().unwrap().len(), 4);
    }
}
