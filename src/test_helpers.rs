use std::sync::{Arc, Mutex, MutexGuard};

use crate::artwork::Artwork;
use crate::event::{self, Event, PortRole, RawMessage, Receiver};
use crate::player::*;
use crate::pro_mk3::Output;
use crate::storage::MemoryStorage;
use crate::{Config, Dispatcher, Error, Launchpad, MockSink, Result};

#[derive(Debug, Clone)]
pub struct PlayerState {
    pub playing: bool,
    pub queue_empty: bool,
    pub now_playing: Option<NowPlaying>,
    pub volume: f64,
    pub muted: bool,
    pub repeat: RepeatMode,
    pub shuffle: ShuffleMode,
    pub autoplay: bool,
    pub progress: f64,
    pub time: f64,
    pub can_skip_next: bool,
    pub can_skip_previous: bool,
    pub context: Option<MediaItem>,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            playing: false,
            queue_empty: true,
            now_playing: None,
            volume: 0.5,
            muted: false,
            repeat: RepeatMode::None,
            shuffle: ShuffleMode::Off,
            autoplay: false,
            progress: 0.0,
            time: 0.0,
            can_skip_next: false,
            can_skip_previous: false,
            context: None,
        }
    }
}

/// Commands the code under test issued, in order
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    SetVolume(f64),
    Mute,
    Unmute,
    Play,
    Pause,
    Next,
    Previous,
    Repeat(RepeatMode),
    Shuffle(ShuffleMode),
    Autoplay(bool),
    SetQueue(MediaItem, bool),
    PlayNext(MediaItem),
    PlayLater(MediaItem),
    Clipboard(String),
    Lookup(SongSource, String),
    Notify(Notification),
}

#[derive(Default)]
pub struct TestPlayer {
    state: Mutex<PlayerState>,
    calls: Mutex<Vec<Call>>,
    pub artwork: Mutex<Option<Artwork>>,
    pub artwork_urls: Mutex<Vec<String>>,
    pub analysis: Mutex<AudioAnalysis>,
}

impl TestPlayer {
    pub fn state(&self) -> MutexGuard<'_, PlayerState> {
        self.state.lock().unwrap()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn volume_sets(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::SetVolume(_)))
            .count()
    }

    fn record(&self, call: Call) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        Ok(())
    }
}

pub fn song(id: &str) -> NowPlaying {
    NowPlaying {
        item: MediaItem::Song(id.to_owned()),
        name: "Song".to_owned(),
        artist: "Artist".to_owned(),
        artwork: Some(ArtworkInfo {
            url: format!("https://example.com/{}/{{w}}x{{h}}.jpg", id),
            width: 1200,
            height: 1200,
        }),
    }
}

impl Player for TestPlayer {
    fn is_playing(&self) -> bool {
        self.state().playing
    }

    fn queue_is_empty(&self) -> bool {
        self.state().queue_empty
    }

    fn now_playing(&self) -> Option<NowPlaying> {
        self.state().now_playing.clone()
    }

    fn volume(&self) -> f64 {
        self.state().volume
    }

    fn set_volume(&self, volume: f64) -> Result<()> {
        self.state().volume = volume;
        self.record(Call::SetVolume(volume))
    }

    fn is_muted(&self) -> bool {
        self.state().muted
    }

    fn mute(&self) -> Result<()> {
        self.state().muted = true;
        self.record(Call::Mute)
    }

    fn unmute(&self) -> Result<()> {
        self.state().muted = false;
        self.record(Call::Unmute)
    }

    fn play(&self) -> Result<()> {
        self.state().playing = true;
        self.record(Call::Play)
    }

    fn pause(&self) -> Result<()> {
        self.state().playing = false;
        self.record(Call::Pause)
    }

    fn skip_to_next(&self) -> Result<()> {
        self.record(Call::Next)
    }

    fn skip_to_previous(&self) -> Result<()> {
        self.record(Call::Previous)
    }

    fn can_skip_to_next(&self) -> bool {
        self.state().can_skip_next
    }

    fn can_skip_to_previous(&self) -> bool {
        self.state().can_skip_previous
    }

    fn repeat_mode(&self) -> RepeatMode {
        self.state().repeat
    }

    fn set_repeat_mode(&self, mode: RepeatMode) -> Result<()> {
        self.state().repeat = mode;
        self.record(Call::Repeat(mode))
    }

    fn shuffle_mode(&self) -> ShuffleMode {
        self.state().shuffle
    }

    fn set_shuffle_mode(&self, mode: ShuffleMode) -> Result<()> {
        self.state().shuffle = mode;
        self.record(Call::Shuffle(mode))
    }

    fn autoplay_enabled(&self) -> bool {
        self.state().autoplay
    }

    fn set_autoplay_enabled(&self, enabled: bool) -> Result<()> {
        self.state().autoplay = enabled;
        self.record(Call::Autoplay(enabled))
    }

    fn playback_progress(&self) -> f64 {
        self.state().progress
    }

    fn playback_time(&self) -> f64 {
        self.state().time
    }

    fn play_context(&self) -> Option<MediaItem> {
        self.state().context.clone()
    }

    fn set_queue(&self, item: &MediaItem, start_playing: bool) -> Result<()> {
        self.state().queue_empty = false;
        self.record(Call::SetQueue(item.clone(), start_playing))
    }

    fn play_next(&self, item: &MediaItem) -> Result<()> {
        self.record(Call::PlayNext(item.clone()))
    }

    fn play_later(&self, item: &MediaItem) -> Result<()> {
        self.record(Call::PlayLater(item.clone()))
    }

    fn copy_to_clipboard(&self, text: &str) -> Result<()> {
        self.record(Call::Clipboard(text.to_owned()))
    }

    async fn lookup_song(&self, source: SongSource, id: &str) -> Result<SongInfo> {
        self.record(Call::Lookup(source, id.to_owned()))?;
        Ok(SongInfo {
            name: format!("Song {}", id),
            artist: "Artist".to_owned(),
            artwork: None,
        })
    }

    async fn audio_analysis(&self, _song_id: &str) -> Result<AudioAnalysis> {
        Ok(self.analysis.lock().unwrap().clone())
    }

    async fn load_artwork(&self, url: &str) -> Result<Artwork> {
        self.artwork_urls.lock().unwrap().push(url.to_owned());
        self.artwork
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| Error::Artwork(format!("no image at {}", url)))
    }

    async fn notify(&self, notification: Notification) -> Result<()> {
        self.record(Call::Notify(notification))
    }
}

pub struct Fixture {
    pub launchpad: Launchpad<TestPlayer, MemoryStorage>,
    pub player: Arc<TestPlayer>,
    pub sink: MockSink,
    pub events: Receiver,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let sink = MockSink::default();
        let player = Arc::new(TestPlayer::default());
        let (tx, events) = event::channel();
        let launchpad = Launchpad::new(
            Output::from_sink(sink.clone()),
            player.clone(),
            MemoryStorage::new(),
            tx,
            &config,
        );
        Self {
            launchpad,
            player,
            sink,
            events,
        }
    }

    pub fn into_dispatcher(self) -> DispatchFixture {
        self.into_dispatcher_with(&Config::default())
    }

    pub fn into_dispatcher_with(self, config: &Config) -> DispatchFixture {
        DispatchFixture {
            dispatcher: Dispatcher::new(self.launchpad, config),
            player: self.player,
            sink: self.sink,
            events: self.events,
        }
    }

    /// Wait for the next queued event matching `f`, dropping the others
    pub async fn next_event<F: Fn(&Event) -> bool>(&mut self, f: F) -> Option<Event> {
        while let Some(event) = self.events.recv().await {
            if f(&event) {
                return Some(event);
            }
        }
        None
    }
}

pub struct DispatchFixture {
    pub dispatcher: Dispatcher<TestPlayer, MemoryStorage>,
    pub player: Arc<TestPlayer>,
    pub sink: MockSink,
    pub events: Receiver,
}

impl DispatchFixture {
    /// Feed raw bytes through the dispatcher as if they arrived on the main port
    pub async fn press(&mut self, bytes: &[u8]) -> Result<()> {
        self.receive("LPProMK3 MIDI", PortRole::Controls, bytes).await
    }

    /// Feed raw bytes through the dispatcher as if they arrived on the DAW port
    pub async fn daw(&mut self, bytes: &[u8]) -> Result<()> {
        self.receive("MIDIIN3 (LPProMK3 MIDI)", PortRole::Announcements, bytes).await
    }

    async fn receive(&mut self, source: &str, role: PortRole, bytes: &[u8]) -> Result<()> {
        let message = RawMessage {
            timestamp: 0,
            source: source.to_owned(),
            role,
            bytes: bytes.to_vec(),
        };
        self.dispatcher.handle_event(Event::Input(message)).await
    }
}

/// The lighting specs of a sent message, decoded back from bytes, or `None` if the message isn't
/// a lighting command
pub fn lit(message: &[u8]) -> Option<Vec<(u8, u8, Vec<u8>)>> {
    let body = message.strip_prefix(&crate::pro_mk3::SYSEX_HEADER[..])?;
    let body = body.strip_suffix(&[crate::pro_mk3::SYSEX_STOP])?;
    let mut bytes = body.strip_prefix(&[3])?;
    let mut specs = Vec::new();
    while let [light_type, position, rest @ ..] = bytes {
        let arity = match *light_type {
            0 | 2 => 1,
            1 => 2,
            _ => 3,
        };
        specs.push((*light_type, *position, rest[..arity].to_vec()));
        bytes = &rest[arity..];
    }
    Some(specs)
}

/// Every `(light type, position, payload)` lit across all messages, in send order
pub fn all_lit(messages: &[Vec<u8>]) -> Vec<(u8, u8, Vec<u8>)> {
    messages.iter().filter_map(|m| lit(m)).flatten().collect()
}

/// The last payload `position` was lit with
pub fn last_light(messages: &[Vec<u8>], position: u8) -> Option<(u8, Vec<u8>)> {
    all_lit(messages)
        .into_iter()
        .filter(|(_, p, _)| *p == position)
        .last()
        .map(|(light_type, _, payload)| (light_type, payload))
}
