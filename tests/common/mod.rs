#![allow(dead_code)]

use std::f32::consts::PI;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use song_injector::{AudioFormat, AudioFrame, ExternalAudioSink, PlayerId, PlayerObserver, SinkError};

pub const TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct RecordedFrame {
    pub format: AudioFormat,
    pub samples: Vec<i16>,
    pub timestamp_ms: u64,
}

/// Sink that records everything the player sends it.
#[derive(Default)]
pub struct RecordingSink {
    pub reject_enable: bool,
    enabled: Mutex<Option<AudioFormat>>,
    toggles: Mutex<Vec<bool>>,
    frames: Mutex<Vec<RecordedFrame>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn rejecting() -> Arc<Self> {
        Arc::new(Self {
            reject_enable: true,
            ..Self::default()
        })
    }

    pub fn enabled_format(&self) -> Option<AudioFormat> {
        *self.enabled.lock()
    }

    pub fn toggles(&self) -> Vec<bool> {
        self.toggles.lock().clone()
    }

    pub fn frame_count(&self) -> usize {
        self.frames.lock().len()
    }

    pub fn frames(&self) -> Vec<RecordedFrame> {
        self.frames.lock().clone()
    }
}

impl ExternalAudioSink for RecordingSink {
    fn set_external_audio_source(
        &self,
        enabled: bool,
        format: AudioFormat,
    ) -> Result<(), SinkError> {
        if enabled && self.reject_enable {
            return Err(SinkError::Rejected("test sink refuses".into()));
        }
        self.toggles.lock().push(enabled);
        *self.enabled.lock() = enabled.then_some(format);
        Ok(())
    }

    fn push_external_audio_frame(&self, frame: &AudioFrame<'_>) -> Result<(), SinkError> {
        if self.enabled.lock().is_none() {
            return Err(SinkError::NotEnabled);
        }
        self.frames.lock().push(RecordedFrame {
            format: frame.format,
            samples: frame.samples.to_vec(),
            timestamp_ms: frame.timestamp_ms,
        });
        Ok(())
    }
}

/// Observer that records every notification.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<(PlayerId, bool)>>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn values(&self) -> Vec<bool> {
        self.events.lock().iter().map(|(_, v)| *v).collect()
    }

    pub fn players(&self) -> Vec<PlayerId> {
        self.events.lock().iter().map(|(id, _)| *id).collect()
    }

    pub fn count(&self) -> usize {
        self.events.lock().len()
    }

    pub fn wait_for(&self, count: usize) -> bool {
        wait_until(TIMEOUT, || self.count() >= count)
    }
}

impl PlayerObserver for RecordingObserver {
    fn on_playable_changed(&self, player: PlayerId, is_playable: bool) {
        self.events.lock().push((player, is_playable));
    }
}

pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// Writes a 440 Hz sine WAV file and returns its path.
pub fn write_sine_wav(dir: &Path, name: &str, sample_rate: u32, channels: u16, secs: f32) -> PathBuf {
    let path = dir.join(name);
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();

    let frames = (sample_rate as f32 * secs) as u32;
    for n in 0..frames {
        let t = n as f32 / sample_rate as f32;
        let value = ((2.0 * PI * 440.0 * t).sin() * 0.5 * i16::MAX as f32) as i16;
        for _ in 0..channels {
            writer.write_sample(value).unwrap();
        }
    }
    writer.finalize().unwrap();
    path
}

/// Writes bytes that no demuxer recognises.
pub fn write_garbage(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"this is not audio at all, just some text").unwrap();
    path
}
