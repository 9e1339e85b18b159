use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use cpal::Sample;
use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard};
use tracing::{debug, error, info, warn};

use crate::config::PlayerConfig;
use crate::error::{DecoderError, PlayerError, Result};
use crate::player::buffer::{create_audio_buffer, AudioBufferConsumer, AudioBufferProducer};
use crate::player::clock::{Clock, PlaybackState};
use crate::player::decoder::{symphonia_decoder::SymphoniaDecoder, AudioDecoder};
use crate::player::dsp::converter::FormatConverter;
use crate::player::observer::{ObserverSlot, PlayerId, PlayerObserver};
use crate::player::sink::{AudioFormat, AudioFrame, ExternalAudioSink};

const BACKOFF: Duration = Duration::from_millis(5);

#[derive(Clone)]
struct Binding {
    sink: Arc<dyn ExternalAudioSink>,
    format: AudioFormat,
}

struct Worker {
    cancel: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl Worker {
    /// Waits for the thread unless asked to detach or called from the
    /// worker itself. A cancelled worker exits on its own either way.
    fn finish(self, detach: bool) {
        if detach || self.handle.thread().id() == thread::current().id() {
            return;
        }
        if self.handle.join().is_err() {
            warn!("player worker thread panicked");
        }
    }
}

/// Mutable control state, only touched with the control lock held.
#[derive(Default)]
struct Control {
    binding: Option<Binding>,
    load: Option<Worker>,
    delivery: Option<Worker>,
    /// Bumped by every load and stop; stale decode threads compare against it.
    generation: u64,
    duration: Option<f64>,
    /// Last playable value the observer was told about.
    announced: bool,
    /// Thread currently inside an observer callback.
    notifying: Option<ThreadId>,
}

struct Shared {
    id: PlayerId,
    config: PlayerConfig,
    clock: Clock,
    observer: ObserverSlot,
    control: ReentrantMutex<RefCell<Control>>,
    consumer: Mutex<Option<AudioBufferConsumer>>,
}

type ControlGuard<'a> = ReentrantMutexGuard<'a, RefCell<Control>>;

impl Shared {
    /// Updates the playable flag and tells the observer, with the control
    /// lock held so no other thread can act on the new value first.
    /// `report` forces a notification even when the flag is unchanged.
    fn publish_playable(&self, guard: &ControlGuard<'_>, playable: bool, report: bool) {
        self.clock.swap_playable(playable);

        let previous_notifier = {
            let mut control = guard.borrow_mut();
            if !report && control.announced == playable {
                return;
            }
            control.announced = playable;
            control.notifying.replace(thread::current().id())
        };

        debug!(player = %self.id, playable, "playable changed");
        self.observer.notify(self.id, playable);

        guard.borrow_mut().notifying = previous_notifier;
    }

    fn is_reentrant(&self, guard: &ControlGuard<'_>) -> bool {
        guard.borrow().notifying == Some(thread::current().id())
    }
}

/// Plays a local song into a communication engine's external audio source.
///
/// The player decodes the file on its own thread, converts it to the sink's
/// format and pushes fixed-size 16-bit frames to the sink while playing.
/// Changes of the playable flag are reported to a single weakly held
/// observer.
///
/// Lifecycle: `configure` binds a sink, `start` opens the delivery session,
/// `load_source` opens a song (asynchronously), `play`/`pause` toggle
/// delivery, `stop` ends the session but keeps the binding, `unbind` drops
/// the binding.
pub struct SimpleAudioPlayer {
    shared: Arc<Shared>,
}

impl SimpleAudioPlayer {
    pub fn new() -> Self {
        Self::with_config(PlayerConfig::default())
    }

    pub fn with_config(config: PlayerConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                id: PlayerId::next(),
                config: config.validate(),
                clock: Clock::new(),
                observer: ObserverSlot::default(),
                control: ReentrantMutex::new(RefCell::new(Control::default())),
                consumer: Mutex::new(None),
            }),
        }
    }

    pub fn id(&self) -> PlayerId {
        self.shared.id
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.shared.config
    }

    /// Registers the observer. Only a weak reference is kept.
    pub fn set_observer<O: PlayerObserver + 'static>(&self, observer: &Arc<O>) {
        self.shared.observer.set(observer);
    }

    pub fn clear_observer(&self) {
        self.shared.observer.clear();
    }

    /// Binds the player to `sink` and enables its external audio source.
    ///
    /// Rebinding is allowed only while nothing is loaded and no session is
    /// running.
    pub fn configure(
        &self,
        sink: Arc<dyn ExternalAudioSink>,
        sample_rate: u32,
        channels: u16,
    ) -> Result<()> {
        let format = AudioFormat::new(sample_rate, channels);
        if !format.is_valid() {
            warn!(sample_rate, channels, "refusing invalid external audio format");
            return Err(PlayerError::InvalidFormat {
                sample_rate,
                channels,
            });
        }

        let guard = self.shared.control.lock();
        let mut control = guard.borrow_mut();

        let state = self.shared.clock.get_state();
        let idle = matches!(
            state,
            PlaybackState::Unconfigured | PlaybackState::Configured | PlaybackState::Stopped
        );
        if !idle || control.delivery.is_some() {
            warn!(player = %self.shared.id, %state, "configure refused: session active");
            return Err(PlayerError::AlreadyConfigured);
        }

        if let Some(previous) = control.binding.take() {
            if let Err(err) = previous.sink.set_external_audio_source(false, previous.format) {
                warn!("failed to disable previous external audio source: {}", err);
            }
            self.shared.clock.set_state(PlaybackState::Unconfigured);
        }

        sink.set_external_audio_source(true, format)?;

        self.shared.clock.set_format(sample_rate, channels);
        self.shared.clock.set_state(PlaybackState::Configured);
        control.binding = Some(Binding { sink, format });

        info!(player = %self.shared.id, sample_rate, channels, "external audio configured");
        Ok(())
    }

    /// Starts the delivery session. Frames flow while the state is playing.
    pub fn start(&self) -> Result<()> {
        let guard = self.shared.control.lock();
        let mut control = guard.borrow_mut();

        let binding = control.binding.clone().ok_or(PlayerError::NotConfigured)?;
        if control.delivery.is_some() {
            return Err(PlayerError::AlreadyStarted);
        }

        let cancel = Arc::new(AtomicBool::new(false));
        let handle = {
            let shared = self.shared.clone();
            let cancel = cancel.clone();
            thread::Builder::new()
                .name("external-audio-delivery".into())
                .spawn(move || run_delivery(shared, binding, cancel))?
        };
        control.delivery = Some(Worker { cancel, handle });

        info!(player = %self.shared.id, "external audio session started");
        Ok(())
    }

    /// Opens `path` on a background thread.
    ///
    /// The outcome is reported once through the observer: `true` when the
    /// source can be played, `false` when it could not be opened. Any
    /// previous source is discarded first.
    pub fn load_source<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref().to_path_buf();

        let guard = self.shared.control.lock();
        let binding = guard
            .borrow()
            .binding
            .clone()
            .ok_or(PlayerError::NotConfigured)?;
        let reentrant = self.shared.is_reentrant(&guard);

        let (previous, generation) = {
            let mut control = guard.borrow_mut();
            let previous = control.load.take();
            if let Some(worker) = &previous {
                worker.cancel.store(true, Ordering::SeqCst);
            }
            control.generation += 1;
            control.duration = None;
            (previous, control.generation)
        };

        // The flag drops silently here; the load result is always reported.
        self.shared.clock.swap_playable(false);
        self.shared.clock.set_eos(false);
        self.shared.clock.set_frame_pos(0);

        let config = &self.shared.config;
        let capacity = config.buffer_capacity(binding.format.sample_rate, binding.format.channels);
        let (producer, consumer) = create_audio_buffer(capacity);
        *self.shared.consumer.lock() = Some(consumer);

        self.shared.clock.set_state(PlaybackState::Loading);

        let cancel = Arc::new(AtomicBool::new(false));
        let spawned = {
            let shared = self.shared.clone();
            let cancel = cancel.clone();
            let format = binding.format;
            let path = path.clone();
            thread::Builder::new()
                .name("song-decoder".into())
                .spawn(move || run_decode(shared, path, format, generation, cancel, producer))
        };

        let result = match spawned {
            Ok(handle) => {
                guard.borrow_mut().load = Some(Worker { cancel, handle });
                debug!(player = %self.shared.id, path = %path.display(), "loading source");
                Ok(())
            }
            Err(err) => {
                self.shared.clock.set_state(PlaybackState::Configured);
                Err(err.into())
            }
        };

        // Join outside the lock; the old decoder may be waiting for it.
        drop(guard);
        if let Some(worker) = previous {
            worker.finish(reentrant);
        }
        result
    }

    pub fn is_playing(&self) -> bool {
        let _guard = self.shared.control.lock();
        self.shared.clock.get_state() == PlaybackState::Playing
    }

    pub fn is_playable(&self) -> bool {
        let _guard = self.shared.control.lock();
        self.shared.clock.is_playable()
    }

    /// Starts or resumes playback of the loaded source.
    pub fn play(&self) -> Result<()> {
        let _guard = self.shared.control.lock();
        let state = self.shared.clock.get_state();
        match state {
            PlaybackState::Playing => Ok(()),
            PlaybackState::Loaded | PlaybackState::Paused if self.shared.clock.is_playable() => {
                self.shared.clock.set_state(PlaybackState::Playing);
                debug!(player = %self.shared.id, "playing");
                Ok(())
            }
            PlaybackState::Configured | PlaybackState::Stopped => {
                warn!(player = %self.shared.id, "play refused: nothing playable loaded");
                Err(PlayerError::NotPlayable)
            }
            _ => {
                warn!(player = %self.shared.id, %state, "play refused");
                Err(PlayerError::InvalidState {
                    operation: "play",
                    state,
                })
            }
        }
    }

    /// Suspends delivery, keeping the position.
    pub fn pause(&self) -> Result<()> {
        let _guard = self.shared.control.lock();
        let state = self.shared.clock.get_state();
        match state {
            PlaybackState::Playing => {
                self.shared.clock.set_state(PlaybackState::Paused);
                debug!(player = %self.shared.id, "paused");
                Ok(())
            }
            PlaybackState::Paused => Ok(()),
            _ => Err(PlayerError::InvalidState {
                operation: "pause",
                state,
            }),
        }
    }

    /// Ends the session: cancels a pending load, stops delivery and drops
    /// buffered audio. The sink binding is kept so the player can be
    /// started and loaded again. Calling it repeatedly is harmless.
    pub fn stop(&self) {
        let mut workers = Vec::new();
        let reentrant;
        {
            let guard = self.shared.control.lock();
            reentrant = self.shared.is_reentrant(&guard);
            {
                let mut control = guard.borrow_mut();
                control.generation += 1;
                control.duration = None;
                workers.extend(control.load.take());
                workers.extend(control.delivery.take());
            }
            for worker in &workers {
                worker.cancel.store(true, Ordering::SeqCst);
            }

            if let Some(mut consumer) = self.shared.consumer.lock().take() {
                consumer.clear();
            }
            self.shared.clock.set_eos(false);
            self.shared.clock.set_frame_pos(0);

            let state = self.shared.clock.get_state();
            if state.is_bound() && state != PlaybackState::Stopped {
                self.shared.clock.set_state(PlaybackState::Stopped);
                info!(player = %self.shared.id, "stopped");
            }

            self.shared.publish_playable(&guard, false, false);
        }

        for worker in workers {
            worker.finish(reentrant);
        }
    }

    /// Stops and disables the sink's external audio source, returning the
    /// player to its unconfigured state.
    pub fn unbind(&self) {
        self.stop();

        let guard = self.shared.control.lock();
        let binding = guard.borrow_mut().binding.take();
        if let Some(binding) = binding {
            if let Err(err) = binding.sink.set_external_audio_source(false, binding.format) {
                warn!("failed to disable external audio source: {}", err);
            }
            self.shared.clock.set_state(PlaybackState::Unconfigured);
            info!(player = %self.shared.id, "external audio unbound");
        }
    }

    pub fn state(&self) -> PlaybackState {
        let _guard = self.shared.control.lock();
        self.shared.clock.get_state()
    }

    /// Seconds of the current source delivered so far.
    pub fn position_secs(&self) -> f64 {
        self.shared.clock.get_time_secs()
    }

    /// Length of the current source, when the container reports it.
    pub fn duration_secs(&self) -> Option<f64> {
        self.shared.control.lock().borrow().duration
    }

    pub fn format(&self) -> Option<AudioFormat> {
        self.shared
            .control
            .lock()
            .borrow()
            .binding
            .as_ref()
            .map(|b| b.format)
    }
}

impl Default for SimpleAudioPlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SimpleAudioPlayer {
    fn drop(&mut self) {
        self.unbind();
    }
}

fn open_source(
    path: &Path,
    format: AudioFormat,
    chunk_size: usize,
) -> std::result::Result<(SymphoniaDecoder, FormatConverter), DecoderError> {
    let decoder = SymphoniaDecoder::open(path)?;
    let converter =
        FormatConverter::new(decoder.sample_rate(), decoder.channels(), format, chunk_size)?;
    Ok((decoder, converter))
}

fn run_decode(
    shared: Arc<Shared>,
    path: PathBuf,
    format: AudioFormat,
    generation: u64,
    cancel: Arc<AtomicBool>,
    mut producer: AudioBufferProducer,
) {
    let opened = open_source(&path, format, shared.config.resampler_chunk_size);

    let (mut decoder, mut converter) = {
        let guard = shared.control.lock();
        if cancel.load(Ordering::SeqCst) || guard.borrow().generation != generation {
            debug!(path = %path.display(), "dropping result of cancelled load");
            return;
        }

        match opened {
            Ok((decoder, converter)) => {
                guard.borrow_mut().duration = decoder.duration();
                shared.clock.set_state(PlaybackState::Loaded);
                info!(player = %shared.id, path = %path.display(), "source ready");
                shared.publish_playable(&guard, true, true);
                (decoder, converter)
            }
            Err(err) => {
                error!(player = %shared.id, path = %path.display(), "failed to load source: {}", err);
                shared.clock.set_state(PlaybackState::Configured);
                shared.publish_playable(&guard, false, true);
                return;
            }
        }
    };

    let min_vacant = shared.config.min_vacant_samples;
    loop {
        if cancel.load(Ordering::Relaxed) {
            return;
        }

        // If the buffer is full, sleep briefly to avoid pegging the CPU.
        if producer.vacant_len() < min_vacant {
            thread::sleep(BACKOFF);
            continue;
        }

        let Some(block) = decoder.decode_next() else {
            match converter.flush() {
                Ok(tail) => push_all(&mut producer, &tail, &cancel),
                Err(err) => warn!("failed to flush resampler: {}", err),
            }
            break;
        };

        match converter.process(&block) {
            Ok(samples) => push_all(&mut producer, &samples, &cancel),
            Err(err) => warn!("dropping block that failed to convert: {}", err),
        }
    }

    let guard = shared.control.lock();
    if !cancel.load(Ordering::SeqCst) && guard.borrow().generation == generation {
        shared.clock.set_eos(true);
        debug!(player = %shared.id, "source exhausted");
    }
}

fn push_all(producer: &mut AudioBufferProducer, samples: &[f32], cancel: &AtomicBool) {
    let mut pushed = 0;
    while pushed < samples.len() {
        if cancel.load(Ordering::Relaxed) {
            return;
        }
        pushed += producer.push_slice(&samples[pushed..]);
        if pushed < samples.len() {
            thread::sleep(BACKOFF);
        }
    }
}

fn run_delivery(shared: Arc<Shared>, binding: Binding, cancel: Arc<AtomicBool>) {
    let format = binding.format;
    let frame_ms = shared.config.frame_duration_ms;
    let frames = format.frames_per(frame_ms);
    let channels = format.channels as usize;

    let mut scratch = vec![0.0f32; frames * channels];
    let mut pcm = vec![0i16; frames * channels];
    let period = Duration::from_millis(frame_ms as u64);
    let mut deadline = Instant::now();

    while !cancel.load(Ordering::Acquire) {
        deadline += period;

        if shared.clock.get_state() == PlaybackState::Playing {
            let popped = match shared.consumer.lock().as_mut() {
                Some(consumer) => consumer.pop_slice(&mut scratch),
                None => 0,
            };

            if popped == 0 && shared.clock.is_eos() {
                finish_stream(&shared, &cancel);
            } else {
                // Underruns and the final partial frame are padded with silence.
                scratch[popped..].fill(0.0);
                for (out, sample) in pcm.iter_mut().zip(&scratch) {
                    *out = i16::from_sample(*sample);
                }

                let rate = format.sample_rate as u64;
                let frame = AudioFrame {
                    format,
                    samples: &pcm,
                    timestamp_ms: shared.clock.get_frame_pos() * 1000 / rate,
                };
                if let Err(err) = binding.sink.push_external_audio_frame(&frame) {
                    warn!(player = %shared.id, "sink rejected frame: {}", err);
                }
                shared.clock.advance_frames((popped / channels) as u64);
            }
        }

        let now = Instant::now();
        if deadline > now {
            thread::sleep(deadline - now);
        } else if now - deadline > period * 4 {
            // Fell far behind (suspended process, slow sink); resync.
            deadline = now;
        }
    }

    debug!(player = %shared.id, "delivery thread exiting");
}

fn finish_stream(shared: &Shared, cancel: &AtomicBool) {
    let guard = shared.control.lock();
    if cancel.load(Ordering::SeqCst)
        || shared.clock.get_state() != PlaybackState::Playing
        || !shared.clock.is_eos()
    {
        return;
    }

    shared.clock.set_eos(false);
    shared.clock.set_state(PlaybackState::Stopped);
    info!(player = %shared.id, "end of stream");
    shared.publish_playable(&guard, false, false);
}
