//! Plays a local song into a real-time communication engine's external
//! audio source.
//!
//! The engine is reached through the [`ExternalAudioSink`] trait, so any
//! engine binding (or a speaker, see [`player::sink::cpal_sink`]) can receive
//! the decoded frames.

pub mod config;
pub mod error;
pub mod player;

pub use config::PlayerConfig;
pub use error::{DecoderError, PlayerError};
pub use player::{
    AudioFormat, AudioFrame, ExternalAudioSink, PlaybackState, PlayerId, PlayerObserver,
    SimpleAudioPlayer, SinkError,
};
