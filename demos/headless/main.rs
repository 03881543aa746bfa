//! Runs the remote against a connected Launchpad Pro MK3 and a simulated player.
//!
//! The player plays a short fake playlist, so every page of the pad has something to show without
//! a real media player attached. Pass the path of a JSON config file as the only argument to
//! override the defaults. Logging is controlled with RUST_LOG and defaults to Info.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use launchpad_remote::artwork::{Artwork, Rgba};
use launchpad_remote::event::{self, Event};
use launchpad_remote::player::*;
use launchpad_remote::storage::FileStorage;
use launchpad_remote::util::Array2d;
use launchpad_remote::{pro_mk3, Config, Dispatcher, Launchpad};
use launchpad_remote::{InputDevice as _, OutputDevice as _};

const TRACK_SECONDS: f64 = 180.0;
const PLAYLIST: &[(&str, &str, &str)] = &[
    ("1440857781", "Opening", "The Simulators"),
    ("i.Lk83Bx0", "Second Track", "The Simulators"),
    ("1440857999", "Closer", "Null Device"),
];

struct State {
    playing: bool,
    track: Option<usize>,
    position: f64,
    volume: f64,
    muted_volume: Option<f64>,
    repeat: RepeatMode,
    shuffle: ShuffleMode,
    autoplay: bool,
}

/// Plays `PLAYLIST` on a virtual clock and reports every change as a notification
struct SimulatedPlayer {
    state: Mutex<State>,
    events: event::Sender,
}

impl SimulatedPlayer {
    fn new(events: event::Sender) -> Self {
        Self {
            state: Mutex::new(State {
                playing: false,
                track: None,
                position: 0.0,
                volume: 0.5,
                muted_volume: None,
                repeat: RepeatMode::None,
                shuffle: ShuffleMode::Off,
                autoplay: false,
            }),
            events,
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn notify_change(&self, notification: PlayerNotification) -> launchpad_remote::Result<()> {
        self.events
            .send(Event::Player(notification))
            .map_err(|_| launchpad_remote::Error::Player("event queue closed".to_owned()))
    }

    fn item(index: usize) -> NowPlaying {
        let (id, name, artist) = PLAYLIST[index];
        NowPlaying {
            item: MediaItem::Song(id.to_owned()),
            name: name.to_owned(),
            artist: artist.to_owned(),
            artwork: Some(ArtworkInfo {
                url: format!("sim://{}/{{w}}x{{h}}", index),
                width: 1200,
                height: 1200,
            }),
        }
    }

    fn change_track(&self, index: Option<usize>) -> launchpad_remote::Result<()> {
        let item = index.map(Self::item);
        self.notify_change(PlayerNotification::NowPlayingWillChange(item.clone()))?;
        {
            let mut state = self.state();
            state.track = index;
            state.position = 0.0;
        }
        self.notify_change(PlayerNotification::NowPlayingDidChange(item))
    }

    /// Advance the virtual clock by `elapsed`
    fn tick(&self, elapsed: Duration) -> launchpad_remote::Result<()> {
        let finished = {
            let mut state = self.state();
            if !state.playing || state.track.is_none() {
                return Ok(());
            }
            state.position += elapsed.as_secs_f64();
            state.position >= TRACK_SECONDS
        };
        if finished {
            let next = {
                let state = self.state();
                match (state.track, state.repeat) {
                    (Some(track), RepeatMode::One) => Some(track),
                    (Some(track), RepeatMode::All) => Some((track + 1) % PLAYLIST.len()),
                    (Some(track), RepeatMode::None) => Some(track + 1).filter(|t| *t < PLAYLIST.len()),
                    (None, _) => None,
                }
            };
            if next.is_none() {
                self.state().playing = false;
                self.notify_change(PlayerNotification::PlaybackStateChanged)?;
            }
            self.change_track(next)?;
        }
        self.notify_change(PlayerNotification::ProgressChanged)
    }

    fn skip(&self, forward: bool) -> launchpad_remote::Result<()> {
        let track = self.state().track;
        let next = match track {
            Some(track) if forward && track + 1 < PLAYLIST.len() => Some(track + 1),
            Some(track) if !forward && track > 0 => Some(track - 1),
            _ => return Ok(()),
        };
        self.change_track(next)
    }
}

impl Player for SimulatedPlayer {
    fn is_playing(&self) -> bool {
        self.state().playing
    }

    fn queue_is_empty(&self) -> bool {
        self.state().track.is_none()
    }

    fn now_playing(&self) -> Option<NowPlaying> {
        self.state().track.map(Self::item)
    }

    fn volume(&self) -> f64 {
        self.state().volume
    }

    fn set_volume(&self, volume: f64) -> launchpad_remote::Result<()> {
        self.state().volume = volume.clamp(0.0, 1.0);
        self.notify_change(PlayerNotification::VolumeChanged)
    }

    fn is_muted(&self) -> bool {
        self.state().muted_volume.is_some()
    }

    fn mute(&self) -> launchpad_remote::Result<()> {
        {
            let mut state = self.state();
            state.muted_volume = Some(state.volume);
            state.volume = 0.0;
        }
        self.notify_change(PlayerNotification::VolumeChanged)
    }

    fn unmute(&self) -> launchpad_remote::Result<()> {
        {
            let mut state = self.state();
            if let Some(volume) = state.muted_volume.take() {
                state.volume = volume;
            }
        }
        self.notify_change(PlayerNotification::VolumeChanged)
    }

    fn play(&self) -> launchpad_remote::Result<()> {
        let start = {
            let mut state = self.state();
            state.playing = true;
            state.track.is_none()
        };
        if start {
            self.change_track(Some(0))?;
        }
        self.notify_change(PlayerNotification::PlaybackStateChanged)
    }

    fn pause(&self) -> launchpad_remote::Result<()> {
        self.state().playing = false;
        self.notify_change(PlayerNotification::PlaybackStateChanged)
    }

    fn skip_to_next(&self) -> launchpad_remote::Result<()> {
        self.skip(true)
    }

    fn skip_to_previous(&self) -> launchpad_remote::Result<()> {
        self.skip(false)
    }

    fn can_skip_to_next(&self) -> bool {
        matches!(self.state().track, Some(track) if track + 1 < PLAYLIST.len())
    }

    fn can_skip_to_previous(&self) -> bool {
        matches!(self.state().track, Some(track) if track > 0)
    }

    fn repeat_mode(&self) -> RepeatMode {
        self.state().repeat
    }

    fn set_repeat_mode(&self, mode: RepeatMode) -> launchpad_remote::Result<()> {
        self.state().repeat = mode;
        self.notify_change(PlayerNotification::RepeatModeChanged)
    }

    fn shuffle_mode(&self) -> ShuffleMode {
        self.state().shuffle
    }

    fn set_shuffle_mode(&self, mode: ShuffleMode) -> launchpad_remote::Result<()> {
        self.state().shuffle = mode;
        self.notify_change(PlayerNotification::ShuffleChanged)
    }

    fn autoplay_enabled(&self) -> bool {
        self.state().autoplay
    }

    fn set_autoplay_enabled(&self, enabled: bool) -> launchpad_remote::Result<()> {
        self.state().autoplay = enabled;
        self.notify_change(PlayerNotification::AutoplayChanged)
    }

    fn playback_progress(&self) -> f64 {
        (self.state().position / TRACK_SECONDS).min(1.0)
    }

    fn playback_time(&self) -> f64 {
        self.state().position
    }

    fn play_context(&self) -> Option<MediaItem> {
        Some(MediaItem::Playlist("pl.simulated".to_owned()))
    }

    fn set_queue(&self, item: &MediaItem, start_playing: bool) -> launchpad_remote::Result<()> {
        log::info!("queueing {:?}", item);
        self.change_track(Some(0))?;
        if start_playing {
            self.play()?;
        }
        Ok(())
    }

    fn play_next(&self, item: &MediaItem) -> launchpad_remote::Result<()> {
        log::info!("playing {:?} next", item);
        self.notify_change(PlayerNotification::QueueItemsChanged)
    }

    fn play_later(&self, item: &MediaItem) -> launchpad_remote::Result<()> {
        log::info!("playing {:?} later", item);
        self.notify_change(PlayerNotification::QueueItemsChanged)
    }

    fn copy_to_clipboard(&self, text: &str) -> launchpad_remote::Result<()> {
        log::info!("clipboard: {}", text);
        Ok(())
    }

    async fn lookup_song(&self, _source: SongSource, id: &str) -> launchpad_remote::Result<SongInfo> {
        PLAYLIST
            .iter()
            .position(|(song_id, _, _)| *song_id == id)
            .map(|index| {
                let item = Self::item(index);
                SongInfo {
                    name: item.name,
                    artist: item.artist,
                    artwork: item.artwork,
                }
            })
            .ok_or_else(|| launchpad_remote::Error::Player(format!("unknown song {}", id)))
    }

    async fn audio_analysis(&self, song_id: &str) -> launchpad_remote::Result<AudioAnalysis> {
        let bpm = 100.0 + 10.0 * (song_id.len() % 4) as f64;
        let beat_ms = (60_000.0 / bpm) as u64;
        Ok(AudioAnalysis {
            bpm: Some(bpm),
            beats_ms: (0..(TRACK_SECONDS as u64 * 1000 / beat_ms))
                .map(|beat| beat * beat_ms)
                .collect(),
        })
    }

    async fn load_artwork(&self, url: &str) -> launchpad_remote::Result<Artwork> {
        // a diagonal gradient tinted per track
        let tint = url.bytes().map(|b| b as usize).sum::<usize>() % 3;
        let mut pixels = Array2d::new(32, 32);
        for y in 0..32 {
            for x in 0..32 {
                let a = (x * 8) as u8;
                let b = (y * 8) as u8;
                let pixel = match tint {
                    0 => Rgba::new(a, b, 255 - a, 255),
                    1 => Rgba::new(255 - b, a, b, 255),
                    _ => Rgba::new(b, 255 - a, a, 255),
                };
                pixels.set(x, y, pixel);
            }
        }
        Ok(Artwork::new(pixels))
    }

    async fn notify(&self, notification: Notification) -> launchpad_remote::Result<()> {
        log::info!(
            "notification: {} {}",
            notification.title,
            notification.body.unwrap_or_default()
        );
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut log_builder = env_logger::builder();
    if std::env::var("RUST_LOG").is_err() {
        log_builder.filter_level(log::LevelFilter::Info);
    }
    log_builder.init();

    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let (events, receiver) = event::channel();
    let player = Arc::new(SimulatedPlayer::new(events.clone()));

    let output = pro_mk3::Output::guess_named(&config.output_port)?;
    let _input = pro_mk3::Input::guess_named(&config.input_port, events.clone())?;
    let _daw_input = match pro_mk3::DawInput::guess_named(&config.daw_input_port, events.clone()) {
        Ok(handler) => Some(handler),
        Err(e) => {
            log::warn!("running without the DAW port: {}", e);
            None
        }
    };

    let clock_player = player.clone();
    tokio::spawn(async move {
        let period = Duration::from_millis(500);
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            if let Err(e) = clock_player.tick(period) {
                log::debug!("player clock stopped: {}", e);
                break;
            }
        }
    });

    let shutdown = events.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown.send(Event::Shutdown);
        }
    });

    let mut launchpad = Launchpad::new(
        output,
        player,
        FileStorage::new(&config.storage_path),
        events,
        &config,
    );
    launchpad.start().await?;

    let mut dispatcher = Dispatcher::new(launchpad, &config);
    dispatcher.run(receiver).await;
    Ok(())
}
