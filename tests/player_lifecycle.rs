mod common;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use common::{write_garbage, write_sine_wav, RecordingObserver, RecordingSink};
use song_injector::{PlaybackState, PlayerError, SimpleAudioPlayer};
use tempfile::TempDir;

#[test]
fn configure_then_start_succeeds_for_valid_formats() {
    for sample_rate in [8000, 16000, 32000, 44100, 48000] {
        for channels in [1, 2] {
            let sink = RecordingSink::new();
            let player = SimpleAudioPlayer::new();

            player
                .configure(sink.clone(), sample_rate, channels)
                .unwrap();
            assert!(player.start().is_ok(), "{} Hz / {} ch", sample_rate, channels);
            assert_eq!(player.state(), PlaybackState::Configured);
            assert_eq!(
                sink.enabled_format().map(|f| (f.sample_rate, f.channels)),
                Some((sample_rate, channels))
            );
        }
    }
}

#[test]
fn invalid_formats_are_rejected_and_start_fails() {
    let sink = RecordingSink::new();
    let player = SimpleAudioPlayer::new();

    for (rate, channels) in [(0, 2), (48000, 0), (48000, 3)] {
        assert!(matches!(
            player.configure(sink.clone(), rate, channels),
            Err(PlayerError::InvalidFormat { .. })
        ));
    }

    assert!(matches!(player.start(), Err(PlayerError::NotConfigured)));
    assert_eq!(player.state(), PlaybackState::Unconfigured);
    assert!(sink.toggles().is_empty());
}

#[test]
fn sink_refusal_leaves_player_unconfigured() {
    let player = SimpleAudioPlayer::new();

    assert!(matches!(
        player.configure(RecordingSink::rejecting(), 48000, 2),
        Err(PlayerError::Sink(_))
    ));
    assert!(player.start().is_err());
    assert_eq!(player.state(), PlaybackState::Unconfigured);
}

#[test]
fn start_twice_is_refused() {
    let player = SimpleAudioPlayer::new();
    player.configure(RecordingSink::new(), 48000, 2).unwrap();

    player.start().unwrap();
    assert!(matches!(player.start(), Err(PlayerError::AlreadyStarted)));
}

#[test]
fn reconfigure_during_session_is_refused() {
    let player = SimpleAudioPlayer::new();
    player.configure(RecordingSink::new(), 48000, 2).unwrap();
    player.start().unwrap();

    assert!(matches!(
        player.configure(RecordingSink::new(), 44100, 1),
        Err(PlayerError::AlreadyConfigured)
    ));

    // After stop the binding can be replaced.
    player.stop();
    let replacement = RecordingSink::new();
    player.configure(replacement.clone(), 44100, 1).unwrap();
    assert_eq!(replacement.toggles(), vec![true]);
}

#[test]
fn load_before_configure_is_refused() {
    let dir = TempDir::new().unwrap();
    let path = write_sine_wav(dir.path(), "tone.wav", 48000, 2, 0.1);
    let player = SimpleAudioPlayer::new();

    assert!(matches!(
        player.load_source(&path),
        Err(PlayerError::NotConfigured)
    ));
}

#[test]
fn play_and_pause_while_unconfigured_are_safe() {
    let player = SimpleAudioPlayer::new();

    assert!(player.play().is_err());
    assert!(player.pause().is_err());
    player.stop();

    assert!(!player.is_playing());
    assert!(!player.is_playable());
    assert_eq!(player.state(), PlaybackState::Unconfigured);
}

#[test]
fn missing_resource_reports_not_playable_once() {
    let dir = TempDir::new().unwrap();
    let sink = RecordingSink::new();
    let observer = RecordingObserver::new();
    let player = SimpleAudioPlayer::new();
    player.set_observer(&observer);

    player.configure(sink, 48000, 2).unwrap();
    player.load_source(dir.path().join("missing.mp3")).unwrap();

    assert!(observer.wait_for(1));
    thread::sleep(Duration::from_millis(50));
    assert_eq!(observer.values(), vec![false]);
    assert_eq!(observer.players(), vec![player.id()]);

    assert!(matches!(player.play(), Err(PlayerError::NotPlayable)));
    assert!(!player.is_playing());
    assert!(!player.is_playable());
}

#[test]
fn unsupported_resource_reports_not_playable_once() {
    let dir = TempDir::new().unwrap();
    let path = write_garbage(dir.path(), "notes.mp3");
    let observer = RecordingObserver::new();
    let player = SimpleAudioPlayer::new();
    player.set_observer(&observer);

    player.configure(RecordingSink::new(), 48000, 2).unwrap();
    player.start().unwrap();
    player.load_source(&path).unwrap();

    assert!(observer.wait_for(1));
    thread::sleep(Duration::from_millis(50));
    assert_eq!(observer.values(), vec![false]);
    assert!(player.play().is_err());
    assert!(!player.is_playing());
}

#[test]
fn valid_resource_reports_playable_before_play_succeeds() {
    let dir = TempDir::new().unwrap();
    let path = write_sine_wav(dir.path(), "valid.wav", 48000, 2, 0.5);
    let observer = RecordingObserver::new();
    let player = SimpleAudioPlayer::new();
    player.set_observer(&observer);

    player.configure(RecordingSink::new(), 48000, 2).unwrap();
    player.load_source(&path).unwrap();

    assert!(observer.wait_for(1));
    assert_eq!(observer.values(), vec![true]);
    assert!(player.is_playable());
    assert_eq!(player.state(), PlaybackState::Loaded);

    player.play().unwrap();
    assert!(player.is_playing());
    assert_eq!(observer.values(), vec![true]);

    let duration = player.duration_secs().unwrap();
    assert!((duration - 0.5).abs() < 0.01, "duration was {}", duration);
}

#[test]
fn pause_before_play_never_plays() {
    let dir = TempDir::new().unwrap();
    let path = write_sine_wav(dir.path(), "valid.wav", 48000, 2, 0.5);
    let observer = RecordingObserver::new();
    let player = SimpleAudioPlayer::new();
    player.set_observer(&observer);

    player.configure(RecordingSink::new(), 48000, 2).unwrap();
    assert!(player.pause().is_err());
    assert!(!player.is_playing());

    player.load_source(&path).unwrap();
    assert!(observer.wait_for(1));

    assert!(matches!(
        player.pause(),
        Err(PlayerError::InvalidState { .. })
    ));
    assert!(!player.is_playing());
    assert_eq!(player.state(), PlaybackState::Loaded);
}

#[test]
fn stop_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let path = write_sine_wav(dir.path(), "valid.wav", 48000, 2, 0.5);
    let observer = RecordingObserver::new();
    let player = SimpleAudioPlayer::new();
    player.set_observer(&observer);

    player.configure(RecordingSink::new(), 48000, 2).unwrap();
    player.start().unwrap();
    player.load_source(&path).unwrap();
    assert!(observer.wait_for(1));

    player.stop();
    assert_eq!(observer.values(), vec![true, false]);

    player.stop();
    assert_eq!(observer.values(), vec![true, false]);
    assert_eq!(player.state(), PlaybackState::Stopped);
}

#[test]
fn stop_during_load_suppresses_late_notification() {
    let dir = TempDir::new().unwrap();
    let path = write_sine_wav(dir.path(), "long.wav", 44100, 1, 5.0);
    let observer = RecordingObserver::new();
    let player = SimpleAudioPlayer::new();
    player.set_observer(&observer);

    player.configure(RecordingSink::new(), 48000, 2).unwrap();
    player.start().unwrap();
    player.load_source(&path).unwrap();
    player.stop();

    // Whatever was delivered before stop returned, nothing may follow it.
    let delivered = observer.values();
    thread::sleep(Duration::from_millis(200));
    assert_eq!(observer.values(), delivered);
    assert!(!player.is_playable());
    assert!(!player.is_playing());
    if let Some(last) = delivered.last() {
        assert!(!last);
    }
}

#[test]
fn reload_replaces_previous_source() {
    let dir = TempDir::new().unwrap();
    let first = write_sine_wav(dir.path(), "first.wav", 48000, 2, 0.5);
    let broken = write_garbage(dir.path(), "broken.ogg");
    let observer = RecordingObserver::new();
    let player = SimpleAudioPlayer::new();
    player.set_observer(&observer);

    player.configure(RecordingSink::new(), 48000, 2).unwrap();
    player.load_source(&first).unwrap();
    assert!(observer.wait_for(1));

    player.load_source(&broken).unwrap();
    assert!(observer.wait_for(2));
    assert_eq!(observer.values(), vec![true, false]);
    assert!(!player.is_playable());
    assert_eq!(player.state(), PlaybackState::Configured);
}

#[test]
fn dropped_observer_is_not_kept_alive() {
    let dir = TempDir::new().unwrap();
    let path = write_sine_wav(dir.path(), "valid.wav", 48000, 2, 0.2);
    let player = SimpleAudioPlayer::new();
    let observer = RecordingObserver::new();
    player.set_observer(&observer);

    let weak = Arc::downgrade(&observer);
    drop(observer);
    assert!(weak.upgrade().is_none());

    player.configure(RecordingSink::new(), 48000, 2).unwrap();
    player.load_source(&path).unwrap();
    assert!(common::wait_until(common::TIMEOUT, || player.is_playable()));
    player.play().unwrap();
}

#[test]
fn unbind_disables_the_sink_and_allows_rebinding() {
    let sink = RecordingSink::new();
    let player = SimpleAudioPlayer::new();

    player.configure(sink.clone(), 48000, 2).unwrap();
    player.start().unwrap();
    player.unbind();

    assert_eq!(sink.toggles(), vec![true, false]);
    assert!(sink.enabled_format().is_none());
    assert_eq!(player.state(), PlaybackState::Unconfigured);
    assert!(player.format().is_none());

    player.configure(sink.clone(), 16000, 1).unwrap();
    assert!(player.start().is_ok());
}

#[test]
fn dropping_the_player_disables_the_sink() {
    let sink = RecordingSink::new();
    {
        let player = SimpleAudioPlayer::new();
        player.configure(sink.clone(), 48000, 2).unwrap();
        player.start().unwrap();
    }
    assert_eq!(sink.toggles(), vec![true, false]);
}
