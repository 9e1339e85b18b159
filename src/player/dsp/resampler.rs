use audioadapter_buffers::direct::SequentialSliceOfVecs;
use rubato::{Fft, FixedSync, Resampler as RubatoResampler};

use crate::error::DecoderError;

/// Interleaved-in, interleaved-out wrapper around rubato's FFT resampler.
///
/// Input is accumulated until a full chunk is available; `flush` pads the
/// remainder with silence so the tail of a song is not lost.
pub struct Resampler {
    resampler: Fft<f32>,
    channels: usize,
    chunk_size: usize,
    buffer: Vec<f32>,
}

impl Resampler {
    pub fn new(
        source_sample_rate: u32,
        target_sample_rate: u32,
        channels: usize,
        chunk_size: usize,
    ) -> Result<Self, DecoderError> {
        let resampler = Fft::<f32>::new(
            source_sample_rate as usize,
            target_sample_rate as usize,
            chunk_size,
            2,
            channels,
            FixedSync::Input,
        )
        .map_err(|e| DecoderError::Resample(e.to_string()))?;

        // rubato may round the requested chunk to fit its FFT size.
        let chunk_size = resampler.input_frames_next();

        Ok(Self {
            resampler,
            channels,
            chunk_size,
            buffer: Vec::with_capacity(chunk_size * channels),
        })
    }

    pub fn process(&mut self, input: &[f32]) -> Result<Vec<f32>, DecoderError> {
        self.buffer.extend_from_slice(input);

        let mut all_output = Vec::new();

        while self.buffer.len() >= self.chunk_size * self.channels {
            let chunk: Vec<f32> = self
                .buffer
                .drain(0..self.chunk_size * self.channels)
                .collect();
            let num_frames = self.chunk_size;

            let mut input_buffer = vec![vec![0.0; num_frames]; self.channels];
            for (i, frame) in chunk.chunks_exact(self.channels).enumerate() {
                for (ch, sample) in frame.iter().enumerate() {
                    input_buffer[ch][i] = *sample;
                }
            }

            let out_len = self.resampler.output_frames_next();
            let mut output_buffer = vec![vec![0.0; out_len]; self.channels];

            let input_adapter = SequentialSliceOfVecs::new(&input_buffer, self.channels, num_frames)
                .map_err(|e| DecoderError::Resample(e.to_string()))?;
            let mut output_adapter =
                SequentialSliceOfVecs::new_mut(&mut output_buffer, self.channels, out_len)
                    .map_err(|e| DecoderError::Resample(e.to_string()))?;

            self.resampler
                .process_into_buffer(&input_adapter, &mut output_adapter, None)
                .map_err(|e| DecoderError::Resample(e.to_string()))?;

            all_output.reserve(out_len * self.channels);
            for i in 0..out_len {
                for channel in &output_buffer {
                    all_output.push(channel[i]);
                }
            }
        }

        Ok(all_output)
    }

    pub fn flush(&mut self) -> Result<Vec<f32>, DecoderError> {
        if self.buffer.is_empty() {
            return Ok(Vec::new());
        }

        let remaining_frames = self.buffer.len() / self.channels;
        let padding_needed = (self.chunk_size - remaining_frames) * self.channels;
        self.buffer.resize(self.buffer.len() + padding_needed, 0.0);

        self.process(&[])
    }
}
