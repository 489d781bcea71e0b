//! Per-timer state, patches and snapshots

use serde::{Deserialize, Serialize};
use tokio::task::AbortHandle;

use crate::audio::AlarmAudio;

/// Countdown phase of a single timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerPhase {
    Idle,
    CountingDown,
    /// Expired and alerting. Never counts as running.
    Alerting,
}

impl TimerPhase {
    /// Phase for a pair of flags; flashing takes priority over running
    pub fn from_flags(running: bool, flashing: bool) -> Self {
        match (running, flashing) {
            (_, true) => TimerPhase::Alerting,
            (true, false) => TimerPhase::CountingDown,
            (false, false) => TimerPhase::Idle,
        }
    }

    pub fn is_running(self) -> bool {
        self == TimerPhase::CountingDown
    }

    pub fn is_flashing(self) -> bool {
        self == TimerPhase::Alerting
    }
}

/// Registration of a running timer's tick task
///
/// Dropping the handle aborts the task.
#[derive(Debug)]
pub struct TickHandle {
    id: u64,
    abort: Option<AbortHandle>,
}

impl TickHandle {
    pub fn new(id: u64, abort: AbortHandle) -> Self {
        Self {
            id,
            abort: Some(abort),
        }
    }

    /// A registration with no task behind it, for driving ticks by hand
    pub fn detached(id: u64) -> Self {
        Self { id, abort: None }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for TickHandle {
    fn drop(&mut self) {
        if let Some(abort) = self.abort.take() {
            abort.abort();
        }
    }
}

/// One countdown slot
#[derive(Debug)]
pub struct Timer {
    pub(crate) input_value: String,
    pub(crate) seconds_left: u64,
    pub(crate) phase: TimerPhase,
    pub(crate) selected_sound: String,
    pub(crate) audio: Box<dyn AlarmAudio>,
    pub(crate) ticker: Option<TickHandle>,
}

impl Timer {
    /// Create an idle timer owning `audio`
    pub fn idle(audio: Box<dyn AlarmAudio>) -> Self {
        Self {
            input_value: String::new(),
            seconds_left: 0,
            phase: TimerPhase::Idle,
            selected_sound: audio.sound().to_string(),
            audio,
            ticker: None,
        }
    }

    pub fn input_value(&self) -> &str {
        &self.input_value
    }

    pub fn seconds_left(&self) -> u64 {
        self.seconds_left
    }

    pub fn phase(&self) -> TimerPhase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase.is_running()
    }

    pub fn is_flashing(&self) -> bool {
        self.phase.is_flashing()
    }

    /// Running or alerting
    pub fn is_active(&self) -> bool {
        self.is_running() || self.is_flashing()
    }

    pub fn selected_sound(&self) -> &str {
        &self.selected_sound
    }

    pub fn audio(&self) -> &dyn AlarmAudio {
        self.audio.as_ref()
    }

    /// Id of the installed tick registration, if the timer has one
    pub fn ticker_id(&self) -> Option<u64> {
        self.ticker.as_ref().map(TickHandle::id)
    }

    pub fn snapshot(&self, index: usize) -> TimerSnapshot {
        TimerSnapshot {
            index,
            input_value: self.input_value.clone(),
            seconds_left: self.seconds_left,
            is_running: self.is_running(),
            is_flashing: self.is_flashing(),
            phase: self.phase,
            selected_sound: self.selected_sound.clone(),
            alarm_playing: self.audio.is_playing(),
        }
    }
}

/// Partial update of a timer; absent fields are left alone
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seconds_left: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_running: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_flashing: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_sound: Option<String>,
}

impl TimerPatch {
    pub fn seconds_left(mut self, seconds: u64) -> Self {
        self.seconds_left = Some(seconds);
        self
    }

    pub fn running(mut self, running: bool) -> Self {
        self.is_running = Some(running);
        self
    }

    pub fn flashing(mut self, flashing: bool) -> Self {
        self.is_flashing = Some(flashing);
        self
    }

    pub fn input_value(mut self, value: impl Into<String>) -> Self {
        self.input_value = Some(value.into());
        self
    }

    pub fn sound(mut self, sound: impl Into<String>) -> Self {
        self.selected_sound = Some(sound.into());
        self
    }
}

/// Read-only copy of a timer handed to the host layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub index: usize,
    pub input_value: String,
    pub seconds_left: u64,
    pub is_running: bool,
    pub is_flashing: bool,
    pub phase: TimerPhase,
    pub selected_sound: String,
    pub alarm_playing: bool,
}

/// Parse duration text as `SS`, `MM:SS` or `HH:MM:SS` into seconds
pub fn parse_duration(text: &str) -> Option<u64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let parts: Vec<&str> = text.split(':').collect();
    if parts.len() > 3 {
        return None;
    }

    let mut total: u64 = 0;
    for (i, part) in parts.iter().enumerate() {
        let value: u64 = part.trim().parse().ok()?;
        // Only the leading component may exceed 59
        if i > 0 && value >= 60 {
            return None;
        }
        total = total.checked_mul(60)?.checked_add(value)?;
    }
    Some(total)
}
