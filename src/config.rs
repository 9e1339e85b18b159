//! Player tuning parameters.
//!
//! Defaults suit a 10 ms external audio cadence; a JSON file can override
//! any subset of the fields.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Duration of each frame pushed to the sink.
    pub frame_duration_ms: u32,
    /// Ring buffer capacity, in seconds of sink-formatted audio.
    pub buffer_secs: f32,
    /// Input chunk handed to the resampler.
    pub resampler_chunk_size: usize,
    /// The decode thread backs off while fewer samples than this are free.
    pub min_vacant_samples: usize,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            frame_duration_ms: 10,
            buffer_secs: 1.0,
            resampler_chunk_size: 1024,
            min_vacant_samples: 1024,
        }
    }
}

impl PlayerConfig {
    /// Loads configuration from a JSON file, falling back to defaults when
    /// the file is missing or malformed.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<PlayerConfig>(&contents) {
                Ok(config) => {
                    info!("loaded player configuration from {:?}", path);
                    config.validate()
                }
                Err(err) => {
                    warn!("failed to parse {:?}: {}. Using defaults.", path, err);
                    Self::default()
                }
            },
            Err(err) => {
                warn!("failed to read {:?}: {}. Using defaults.", path, err);
                Self::default()
            }
        }
    }

    /// Clamps values that would stall or starve the pipeline.
    pub fn validate(mut self) -> Self {
        self.frame_duration_ms = self.frame_duration_ms.clamp(1, 100);
        if !self.buffer_secs.is_finite() || self.buffer_secs < 0.1 {
            self.buffer_secs = 0.1;
        }
        self.resampler_chunk_size = self.resampler_chunk_size.clamp(64, 16384);
        self.min_vacant_samples = self.min_vacant_samples.max(1);
        self
    }

    /// Ring buffer capacity in samples for the given sink layout.
    pub fn buffer_capacity(&self, sample_rate: u32, channels: u16) -> usize {
        let frames = (sample_rate as f32 * self.buffer_secs) as usize;
        (frames * channels as usize).max(self.min_vacant_samples * 2)
    }
}
