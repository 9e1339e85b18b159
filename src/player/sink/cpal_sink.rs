use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::player::buffer::{create_audio_buffer, AudioBufferConsumer, AudioBufferProducer};
use crate::player::sink::{AudioFormat, AudioFrame, ExternalAudioSink, SinkError};

/// Seconds of audio the speaker ring can hold.
const RING_SECS: usize = 1;

enum StreamCommand {
    Play,
    Pause,
    Shutdown,
}

/// Speaker-backed stand-in for a communication engine.
///
/// Frames pushed by the player are played on the default output device,
/// which makes the injected audio audible without any network engine.
/// The cpal stream lives on its own thread because it is not `Send` on
/// every platform.
pub struct CpalSink {
    format: AudioFormat,
    enabled: AtomicBool,
    producer: Mutex<AudioBufferProducer>,
    commands: Mutex<Sender<StreamCommand>>,
    dropped_samples: Arc<AtomicU64>,
    stream_thread: Option<JoinHandle<()>>,
}

impl CpalSink {
    /// Opens the default output device. The returned format is the one the
    /// player must be configured with.
    pub fn open_default() -> Result<Self, SinkError> {
        let (ready_tx, ready_rx) = mpsc::channel();
        let (command_tx, command_rx) = mpsc::channel();

        let stream_thread = thread::Builder::new()
            .name("speaker-output".into())
            .spawn(move || run_stream(ready_tx, command_rx))
            .map_err(|e| SinkError::Device(e.to_string()))?;

        let (format, producer) = ready_rx
            .recv()
            .map_err(|_| SinkError::Device("output thread exited during setup".into()))??;

        info!(
            sample_rate = format.sample_rate,
            channels = format.channels,
            "speaker sink ready"
        );

        Ok(Self {
            format,
            enabled: AtomicBool::new(false),
            producer: Mutex::new(producer),
            commands: Mutex::new(command_tx),
            dropped_samples: Arc::new(AtomicU64::new(0)),
            stream_thread: Some(stream_thread),
        })
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// Samples discarded because the speaker ring was full.
    pub fn dropped_samples(&self) -> u64 {
        self.dropped_samples.load(Ordering::Relaxed)
    }

    fn send(&self, command: StreamCommand) {
        if self.commands.lock().send(command).is_err() {
            warn!("speaker output thread is gone");
        }
    }
}

impl ExternalAudioSink for CpalSink {
    fn set_external_audio_source(
        &self,
        enabled: bool,
        format: AudioFormat,
    ) -> Result<(), SinkError> {
        if enabled && format != self.format {
            return Err(SinkError::Rejected(format!(
                "device runs at {} Hz / {} ch, requested {} Hz / {} ch",
                self.format.sample_rate, self.format.channels, format.sample_rate, format.channels
            )));
        }

        self.enabled.store(enabled, Ordering::SeqCst);
        self.send(if enabled {
            StreamCommand::Play
        } else {
            StreamCommand::Pause
        });
        Ok(())
    }

    fn push_external_audio_frame(&self, frame: &AudioFrame<'_>) -> Result<(), SinkError> {
        if !self.enabled.load(Ordering::SeqCst) {
            return Err(SinkError::NotEnabled);
        }

        let samples: Vec<f32> = frame.samples.iter().map(|s| f32::from_sample(*s)).collect();
        let pushed = self.producer.lock().push_slice(&samples);
        if pushed < samples.len() {
            self.dropped_samples
                .fetch_add((samples.len() - pushed) as u64, Ordering::Relaxed);
        }
        Ok(())
    }
}

impl Drop for CpalSink {
    fn drop(&mut self) {
        self.send(StreamCommand::Shutdown);
        if let Some(handle) = self.stream_thread.take() {
            let _ = handle.join();
        }
    }
}

type Ready = Result<(AudioFormat, AudioBufferProducer), SinkError>;

fn run_stream(ready: Sender<Ready>, commands: Receiver<StreamCommand>) {
    let stream = match build_stream() {
        Ok((stream, format, producer)) => {
            if ready.send(Ok((format, producer))).is_err() {
                return;
            }
            stream
        }
        Err(err) => {
            let _ = ready.send(Err(err));
            return;
        }
    };

    while let Ok(command) = commands.recv() {
        let result = match command {
            StreamCommand::Play => stream.play().map_err(|e| e.to_string()),
            StreamCommand::Pause => stream.pause().map_err(|e| e.to_string()),
            StreamCommand::Shutdown => break,
        };
        if let Err(err) = result {
            warn!("speaker stream control failed: {}", err);
        }
    }

    debug!("speaker output thread exiting");
}

fn build_stream() -> Result<(Stream, AudioFormat, AudioBufferProducer), SinkError> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| SinkError::Device("no output device available".into()))?;

    let supported = device
        .default_output_config()
        .map_err(|e| SinkError::Device(e.to_string()))?;
    let sample_format = supported.sample_format();
    let mut config: StreamConfig = supported.into();
    // External audio sources carry at most two channels.
    config.channels = config.channels.clamp(1, 2);

    let format = AudioFormat::new(config.sample_rate, config.channels);
    let (producer, consumer) =
        create_audio_buffer(format.sample_rate as usize * format.channels as usize * RING_SECS);

    let stream = match sample_format {
        SampleFormat::F32 => build_typed::<f32>(&device, &config, consumer),
        SampleFormat::I16 => build_typed::<i16>(&device, &config, consumer),
        SampleFormat::U16 => build_typed::<u16>(&device, &config, consumer),
        other => Err(SinkError::Device(format!(
            "unsupported sample format: {:?}",
            other
        ))),
    }?;

    // Start paused until the player enables the source.
    stream.pause().map_err(|e| SinkError::Device(e.to_string()))?;
    Ok((stream, format, producer))
}

fn build_typed<T: SizedSample + FromSample<f32>>(
    device: &cpal::Device,
    config: &StreamConfig,
    mut consumer: AudioBufferConsumer,
) -> Result<Stream, SinkError> {
    let mut scratch: Vec<f32> = Vec::new();
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                write_output(data, &mut consumer, &mut scratch);
            },
            move |err| warn!("speaker stream error: {}", err),
            None,
        )
        .map_err(|e| SinkError::Device(e.to_string()))
}

fn write_output<T: Sample + FromSample<f32>>(
    data: &mut [T],
    consumer: &mut AudioBufferConsumer,
    scratch: &mut Vec<f32>,
) {
    scratch.resize(data.len(), 0.0);
    let read = consumer.pop_slice(scratch);
    scratch[read..].fill(0.0);

    for (out, sample) in data.iter_mut().zip(scratch.iter()) {
        *out = T::from_sample(*sample);
    }
}
