use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, Ordering};

/// Represents the current playback state of the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PlaybackState {
    /// No sink bound yet.
    Unconfigured = 0,
    /// Bound to a sink, nothing loaded.
    Configured = 1,
    /// A source is being opened on the decode thread.
    Loading = 2,
    /// A playable source is ready.
    Loaded = 3,
    Playing = 4,
    Paused = 5,
    /// Session halted; the sink binding is kept for reuse.
    Stopped = 6,
}

impl From<u8> for PlaybackState {
    fn from(value: u8) -> Self {
        match value {
            1 => PlaybackState::Configured,
            2 => PlaybackState::Loading,
            3 => PlaybackState::Loaded,
            4 => PlaybackState::Playing,
            5 => PlaybackState::Paused,
            6 => PlaybackState::Stopped,
            _ => PlaybackState::Unconfigured,
        }
    }
}

impl PlaybackState {
    /// True for every state in which a sink binding exists.
    pub fn is_bound(self) -> bool {
        self != PlaybackState::Unconfigured
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlaybackState::Unconfigured => "unconfigured",
            PlaybackState::Configured => "configured",
            PlaybackState::Loading => "loading",
            PlaybackState::Loaded => "loaded",
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
            PlaybackState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// The Clock is the shared timing and status authority of the player.
/// It keeps the playback position, state and the playable flag in atomics
/// so the delivery thread and callers can read them without taking the
/// player's control lock.
pub struct Clock {
    /// Frames delivered to the sink since the source was loaded.
    frame_pos: AtomicU64,
    /// Sink sample rate (e.g., 44100, 48000).
    sample_rate: AtomicU32,
    /// Sink channel count.
    channels: AtomicU8,
    /// Current state of playback (stored as u8 for atomicity).
    state: AtomicU8,
    playable: AtomicBool,
    /// Set by the decode thread once the source is exhausted.
    eos: AtomicBool,
}

impl Clock {
    pub fn new() -> Self {
        Self {
            frame_pos: AtomicU64::new(0),
            sample_rate: AtomicU32::new(0),
            channels: AtomicU8::new(0),
            state: AtomicU8::new(PlaybackState::Unconfigured as u8),
            playable: AtomicBool::new(false),
            eos: AtomicBool::new(false),
        }
    }

    pub fn get_frame_pos(&self) -> u64 {
        self.frame_pos.load(Ordering::Relaxed)
    }

    pub fn set_frame_pos(&self, pos: u64) {
        self.frame_pos.store(pos, Ordering::SeqCst);
    }

    /// Advances the position by `frames`, but only while playing.
    pub fn advance_frames(&self, frames: u64) {
        if self.get_state() == PlaybackState::Playing {
            self.frame_pos.fetch_add(frames, Ordering::Relaxed);
        }
    }

    /// Returns the current playback position in seconds.
    pub fn get_time_secs(&self) -> f64 {
        let rate = self.get_sample_rate() as f64;
        if rate > 0.0 {
            self.get_frame_pos() as f64 / rate
        } else {
            0.0
        }
    }

    pub fn get_state(&self) -> PlaybackState {
        PlaybackState::from(self.state.load(Ordering::Acquire))
    }

    pub fn set_state(&self, state: PlaybackState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    pub fn set_format(&self, sample_rate: u32, channels: u16) {
        self.sample_rate.store(sample_rate, Ordering::SeqCst);
        self.channels.store(channels as u8, Ordering::SeqCst);
    }

    pub fn get_sample_rate(&self) -> u32 {
        self.sample_rate.load(Ordering::Relaxed)
    }

    pub fn get_channels(&self) -> u16 {
        self.channels.load(Ordering::Relaxed) as u16
    }

    pub fn is_playable(&self) -> bool {
        self.playable.load(Ordering::Acquire)
    }

    /// Stores the flag and returns the previous value.
    pub fn swap_playable(&self, playable: bool) -> bool {
        self.playable.swap(playable, Ordering::AcqRel)
    }

    pub fn is_eos(&self) -> bool {
        self.eos.load(Ordering::Acquire)
    }

    pub fn set_eos(&self, eos: bool) {
        self.eos.store(eos, Ordering::Release);
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}
