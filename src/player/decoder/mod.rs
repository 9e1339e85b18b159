pub mod symphonia_decoder;

pub trait AudioDecoder: Send {
    /// Decodes the next block of audio data as interleaved f32 samples.
    /// Returns None when the end of the stream is reached.
    fn decode_next(&mut self) -> Option<Vec<f32>>;

    /// Returns the sample rate of the audio.
    fn sample_rate(&self) -> u32;

    /// Returns the number of channels.
    fn channels(&self) -> u16;

    /// Returns the total duration of the audio in seconds, if known.
    fn duration(&self) -> Option<f64>;
}
