use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Read side of the media transport the spectrum driver synchronizes to.
///
/// The query must be cheap and non-blocking; it is called once per tick
/// from the driver's scheduling thread.
pub trait PlaybackTransport: Send + Sync {
    fn position(&self) -> Duration;
}

/// Wall-clock transport stand-in for a real media player.
///
/// Tracks a playback position over a known duration with play/pause/seek,
/// advancing in real time while playing. The demo binary uses it to drive
/// the pipeline without an audio output device; tests pin it with `seek`.
pub struct ClockTransport {
    state: Mutex<ClockState>,
}

struct ClockState {
    base: Duration,
    started_at: Option<Instant>,
    duration: Duration,
}

impl ClockTransport {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ClockState {
                base: Duration::ZERO,
                started_at: None,
                duration: Duration::ZERO,
            }),
        }
    }

    /// Set the total duration reported by the loaded media. Positions are
    /// clamped to it once set.
    pub fn set_duration(&self, duration: Duration) {
        self.state.lock().unwrap().duration = duration;
    }

    pub fn play(&self) {
        let mut state = self.state.lock().unwrap();
        if state.started_at.is_none() {
            state.started_at = Some(Instant::now());
        }
    }

    pub fn pause(&self) {
        let mut state = self.state.lock().unwrap();
        if let Some(started_at) = state.started_at.take() {
            state.base += started_at.elapsed();
        }
    }

    pub fn seek(&self, position: Duration) {
        let mut state = self.state.lock().unwrap();
        state.base = if state.duration > Duration::ZERO {
            position.min(state.duration)
        } else {
            position
        };
        if state.started_at.is_some() {
            state.started_at = Some(Instant::now());
        }
    }

    pub fn is_playing(&self) -> bool {
        self.state.lock().unwrap().started_at.is_some()
    }
}

impl Default for ClockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackTransport for ClockTransport {
    fn position(&self) -> Duration {
        let state = self.state.lock().unwrap();
        let mut position = state.base;
        if let Some(started_at) = state.started_at {
            position += started_at.elapsed();
        }
        if state.duration > Duration::ZERO {
            position = position.min(state.duration);
        }
        position
    }
}
