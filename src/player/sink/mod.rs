pub mod cpal_sink;

use thiserror::Error;

/// PCM layout the sink expects for injected frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioFormat {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    /// External audio sources accept mono or stereo at any positive rate.
    pub fn is_valid(&self) -> bool {
        self.sample_rate > 0 && matches!(self.channels, 1 | 2)
    }

    /// Number of frames covering `duration_ms` milliseconds, at least one.
    pub fn frames_per(&self, duration_ms: u32) -> usize {
        ((self.sample_rate as u64 * duration_ms as u64) / 1000).max(1) as usize
    }
}

/// One block of interleaved 16-bit PCM handed to the sink.
#[derive(Debug, Clone, Copy)]
pub struct AudioFrame<'a> {
    pub format: AudioFormat,
    pub samples: &'a [i16],
    /// Position of the first sample relative to the start of the source.
    pub timestamp_ms: u64,
}

impl AudioFrame<'_> {
    pub fn frames(&self) -> usize {
        self.samples.len() / self.format.channels.max(1) as usize
    }
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink rejected the request: {0}")]
    Rejected(String),

    #[error("external audio source is not enabled")]
    NotEnabled,

    #[error("audio device error: {0}")]
    Device(String),
}

/// The external engine capability the player injects audio into.
///
/// Implementations are shared with the rest of the caller's audio pipeline,
/// so both methods take `&self` and must tolerate being called from the
/// player's delivery thread.
pub trait ExternalAudioSink: Send + Sync {
    /// Enables or disables the external audio source at the given format.
    fn set_external_audio_source(&self, enabled: bool, format: AudioFormat)
        -> Result<(), SinkError>;

    /// Pushes one frame of audio.
    fn push_external_audio_frame(&self, frame: &AudioFrame<'_>) -> Result<(), SinkError>;
}
