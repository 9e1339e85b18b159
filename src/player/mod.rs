pub mod buffer;
pub mod clock;
pub mod decoder;
pub mod dsp;
pub mod observer;
#[allow(clippy::module_inception)]
pub mod player;
pub mod sink;

pub use clock::PlaybackState;
pub use observer::{PlayerId, PlayerObserver};
pub use player::SimpleAudioPlayer;
pub use sink::{AudioFormat, AudioFrame, ExternalAudioSink, SinkError};
