//! The media player as seen from the pad: state getters, commands, and the notifications it
//! pushes back into the event queue.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::artwork::Artwork;
use crate::{Result, Rgb};

/// Something the player can queue. Serialized as `{"album": "<id>"}` and so on.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaItem {
    Album(String),
    Playlist(String),
    Song(String),
}

impl MediaItem {
    pub fn id(&self) -> &str {
        match self {
            MediaItem::Album(id) | MediaItem::Playlist(id) | MediaItem::Song(id) => id,
        }
    }
}

/// A song pinned to a page-3 pad, with the color it was painted in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSong {
    pub item: MediaItem,
    #[serde(default)]
    pub rgb: Option<Rgb>,
}

#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, Default)]
pub enum RepeatMode {
    #[default]
    None,
    One,
    All,
}

impl RepeatMode {
    /// None -> One -> All -> None
    pub fn next(self) -> Self {
        match self {
            RepeatMode::None => RepeatMode::One,
            RepeatMode::One => RepeatMode::All,
            RepeatMode::All => RepeatMode::None,
        }
    }
}

#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, Default)]
pub enum ShuffleMode {
    #[default]
    Off,
    Songs,
}

impl ShuffleMode {
    pub fn toggled(self) -> Self {
        match self {
            ShuffleMode::Off => ShuffleMode::Songs,
            ShuffleMode::Songs => ShuffleMode::Off,
        }
    }
}

/// Fill the `{w}` and `{h}` placeholders of an artwork URL template
pub fn sized_url(template: &str, width: u32, height: u32) -> String {
    template
        .replace("{w}", &width.to_string())
        .replace("{h}", &height.to_string())
}

/// Artwork location as reported by the player. The URL may contain `{w}` and `{h}` placeholders.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ArtworkInfo {
    pub url: String,
    pub width: u32,
    pub height: u32,
}

impl ArtworkInfo {
    pub fn sized_url(&self, width: u32, height: u32) -> String {
        sized_url(&self.url, width, height)
    }

    /// The URL at the size the player reported
    pub fn full_size_url(&self) -> String {
        self.sized_url(self.width, self.height)
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct NowPlaying {
    pub item: MediaItem,
    pub name: String,
    pub artist: String,
    pub artwork: Option<ArtworkInfo>,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SongInfo {
    pub name: String,
    pub artist: String,
    pub artwork: Option<ArtworkInfo>,
}

/// Where a stored song id has to be resolved
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SongSource {
    Library,
    Catalog,
}

impl SongSource {
    /// Library ids look like `i.AbCd123`, catalog ids are plain numbers
    pub fn for_id(id: &str) -> Self {
        if id.contains("i.") {
            SongSource::Library
        } else {
            SongSource::Catalog
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioAnalysis {
    pub bpm: Option<f64>,
    /// Beat positions from the start of the track
    pub beats_ms: Vec<u64>,
}

/// A transient desktop notification
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Notification {
    pub title: String,
    pub body: Option<String>,
    pub icon: Option<String>,
    pub dismiss_after: Duration,
}

impl Notification {
    /// "<name> by <artist>", dismissed after two seconds
    pub fn for_song(name: &str, artist: &str, artwork: Option<&ArtworkInfo>) -> Self {
        Self {
            title: format!("{} by {}", name, artist),
            body: None,
            icon: artwork.map(ArtworkInfo::full_size_url),
            dismiss_after: Duration::from_secs(2),
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// State changes the player reports
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerNotification {
    PlaybackStateChanged,
    RepeatModeChanged,
    VolumeChanged,
    ProgressChanged,
    AutoplayChanged,
    ShuffleChanged,
    QueueItemsChanged,
    QueueItemForStartPosition,
    NowPlayingWillChange(Option<NowPlaying>),
    NowPlayingDidChange(Option<NowPlaying>),
}

/// The media player capability. Getters are cheap snapshots; commands take effect asynchronously
/// on the player side and are confirmed through [`PlayerNotification`]s.
pub trait Player: Send + Sync + 'static {
    fn is_playing(&self) -> bool;
    fn queue_is_empty(&self) -> bool;
    fn now_playing(&self) -> Option<NowPlaying>;

    /// 0.0 ..= 1.0
    fn volume(&self) -> f64;
    fn set_volume(&self, volume: f64) -> Result<()>;
    fn is_muted(&self) -> bool;
    fn mute(&self) -> Result<()>;
    fn unmute(&self) -> Result<()>;

    fn play(&self) -> Result<()>;
    fn pause(&self) -> Result<()>;
    fn skip_to_next(&self) -> Result<()>;
    fn skip_to_previous(&self) -> Result<()>;
    fn can_skip_to_next(&self) -> bool;
    fn can_skip_to_previous(&self) -> bool;

    fn repeat_mode(&self) -> RepeatMode;
    fn set_repeat_mode(&self, mode: RepeatMode) -> Result<()>;
    fn shuffle_mode(&self) -> ShuffleMode;
    fn set_shuffle_mode(&self, mode: ShuffleMode) -> Result<()>;
    fn autoplay_enabled(&self) -> bool;
    fn set_autoplay_enabled(&self, enabled: bool) -> Result<()>;

    /// Fraction of the current track played, 0.0 ..= 1.0
    fn playback_progress(&self) -> f64;
    /// Position in the current track, in seconds
    fn playback_time(&self) -> f64;

    /// The album or playlist currently shown to the user, if any
    fn play_context(&self) -> Option<MediaItem>;
    fn set_queue(&self, item: &MediaItem, start_playing: bool) -> Result<()>;
    fn play_next(&self, item: &MediaItem) -> Result<()>;
    fn play_later(&self, item: &MediaItem) -> Result<()>;

    fn copy_to_clipboard(&self, text: &str) -> Result<()>;

    fn lookup_song(
        &self,
        source: SongSource,
        id: &str,
    ) -> impl Future<Output = Result<SongInfo>> + Send;

    fn audio_analysis(&self, song_id: &str) -> impl Future<Output = Result<AudioAnalysis>> + Send;

    fn load_artwork(&self, url: &str) -> impl Future<Output = Result<Artwork>> + Send;

    fn notify(&self, notification: Notification) -> impl Future<Output = Result<()>> + Send;
}
