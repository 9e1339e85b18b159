use thiserror::Error;

use crate::player::clock::PlaybackState;
use crate::player::sink::SinkError;

/// Errors returned by the player's control operations.
///
/// None of these are fatal: a refused call leaves the player in the state
/// it was in before the call.
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("invalid audio format: {sample_rate} Hz, {channels} channel(s)")]
    InvalidFormat { sample_rate: u32, channels: u16 },

    #[error("player is already bound to a sink with an active session")]
    AlreadyConfigured,

    #[error("player is not bound to a sink")]
    NotConfigured,

    #[error("external audio session already started")]
    AlreadyStarted,

    #[error("no playable source loaded")]
    NotPlayable,

    #[error("cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: PlaybackState,
    },

    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("failed to spawn worker thread: {0}")]
    Thread(#[from] std::io::Error),
}

/// Errors raised while opening or converting a source.
#[derive(Debug, Error)]
pub enum DecoderError {
    #[error("failed to open source: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported source: {0}")]
    Unsupported(#[from] symphonia::core::errors::Error),

    #[error("no supported audio tracks found")]
    NoTrack,

    #[error("resampling failed: {0}")]
    Resample(String),
}

pub type Result<T> = std::result::Result<T, PlayerError>;
