use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use parking_lot::Mutex;
use tracing::Level;

use song_injector::player::sink::cpal_sink::CpalSink;
use song_injector::{PlayerConfig, PlayerId, PlayerObserver, SimpleAudioPlayer};

/// Plays a song through the external-audio path into the default speaker.
#[derive(Parser, Debug)]
#[command(name = "song-injector", version)]
struct Args {
    /// Audio file to play.
    file: PathBuf,

    /// JSON file with player settings.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the frame duration in milliseconds.
    #[arg(long)]
    frame_ms: Option<u32>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, default_value = "info")]
    log_level: Level,
}

/// Forwards playable changes to the main thread.
struct ChannelObserver {
    tx: Mutex<Sender<bool>>,
}

impl PlayerObserver for ChannelObserver {
    fn on_playable_changed(&self, _player: PlayerId, is_playable: bool) {
        let _ = self.tx.lock().send(is_playable);
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .init();

    let mut config = match &args.config {
        Some(path) => PlayerConfig::load_from_file(path),
        None => PlayerConfig::default(),
    };
    if let Some(frame_ms) = args.frame_ms {
        config.frame_duration_ms = frame_ms;
    }

    let sink = Arc::new(CpalSink::open_default().context("failed to open the speaker")?);
    let format = sink.format();

    let player = SimpleAudioPlayer::with_config(config);
    let (tx, rx) = mpsc::channel();
    let observer = Arc::new(ChannelObserver { tx: Mutex::new(tx) });
    player.set_observer(&observer);

    player
        .configure(sink.clone(), format.sample_rate, format.channels)
        .context("failed to configure external audio")?;
    player.start().context("failed to start external audio")?;
    player
        .load_source(&args.file)
        .with_context(|| format!("failed to load {}", args.file.display()))?;

    let playable = rx
        .recv_timeout(Duration::from_secs(10))
        .context("timed out waiting for the source to open")?;
    if !playable {
        bail!("{} could not be played", args.file.display());
    }

    player.play()?;
    if let Some(duration) = player.duration_secs() {
        println!("Playing {} ({:.1}s)", args.file.display(), duration);
    } else {
        println!("Playing {}", args.file.display());
    }

    // Playable drops to false at end of stream.
    loop {
        match rx.recv_timeout(Duration::from_secs(1)) {
            Ok(false) => break,
            Ok(true) => {}
            Err(mpsc::RecvTimeoutError::Timeout) => {
                print!("\rPlayback time: {:.2} seconds", player.position_secs());
                let _ = io::stdout().flush();
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    // Let the speaker drain its ring before tearing down.
    thread::sleep(Duration::from_millis(300));
    player.unbind();
    println!();
    if sink.dropped_samples() > 0 {
        println!("{} samples dropped by the speaker ring", sink.dropped_samples());
    }
    Ok(())
}
