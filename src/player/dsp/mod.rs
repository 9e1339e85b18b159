pub mod converter;
pub mod remix;
pub mod resampler;
