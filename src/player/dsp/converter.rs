use tracing::debug;

use crate::error::DecoderError;
use crate::player::dsp::remix::remix;
use crate::player::dsp::resampler::Resampler;
use crate::player::sink::AudioFormat;

/// Brings decoded blocks to the sink's format: channel remix first, then
/// sample rate conversion when the rates differ.
pub struct FormatConverter {
    source_channels: usize,
    target_channels: usize,
    resampler: Option<Resampler>,
}

impl FormatConverter {
    pub fn new(
        source_sample_rate: u32,
        source_channels: u16,
        target: AudioFormat,
        chunk_size: usize,
    ) -> Result<Self, DecoderError> {
        let target_channels = target.channels as usize;
        let resampler = if source_sample_rate != target.sample_rate {
            debug!(
                "initializing resampler: {}Hz -> {}Hz, {}ch -> {}ch",
                source_sample_rate, target.sample_rate, source_channels, target.channels
            );
            Some(Resampler::new(
                source_sample_rate,
                target.sample_rate,
                target_channels,
                chunk_size,
            )?)
        } else {
            None
        };

        Ok(Self {
            source_channels: source_channels as usize,
            target_channels,
            resampler,
        })
    }

    pub fn process(&mut self, samples: &[f32]) -> Result<Vec<f32>, DecoderError> {
        let remixed = remix(samples, self.source_channels, self.target_channels);
        match &mut self.resampler {
            Some(resampler) => resampler.process(&remixed),
            None => Ok(remixed),
        }
    }

    /// Drains whatever the resampler still holds at end of stream.
    pub fn flush(&mut self) -> Result<Vec<f32>, DecoderError> {
        match &mut self.resampler {
            Some(resampler) => resampler.flush(),
            None => Ok(Vec::new()),
        }
    }
}
