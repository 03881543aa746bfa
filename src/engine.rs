/*!
The device state engine: owns everything the pad currently shows and renders it.

The engine tracks the active page, the shift and delete modes, the tempo and the sampled artwork.
Each page has a fixed list of [`Routine`]s that paint it; selecting a page runs them. Timers never
touch the engine directly: they push events into the queue and the dispatcher calls back into the
engine, so all state changes happen on one task.
*/

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::artwork::Artwork;
use crate::color::hsv_to_rgb;
use crate::event::{self, Event};
use crate::layouts::{self, PadLayout};
use crate::player::{self, AudioAnalysis, NowPlaying, Player, PlayerNotification, RepeatMode, ShuffleMode};
use crate::pro_mk3::{ColorSpec, Output};
use crate::storage::{self, Storage};
use crate::{Config, Result, Rgb};

/// Tempo assumed when nothing is known about the current track
pub const DEFAULT_BPM: f64 = 60.0;

/// Period of the beat matching timer
const BEAT_TICK: Duration = Duration::from_millis(20);
/// How long the beat pad stays lit
const BEAT_FLASH: Duration = Duration::from_millis(40);
/// Delay between a tempo change and the tempo indicator flash
const TEMPO_FLASH_DELAY: Duration = Duration::from_millis(250);
/// How long the queue letter stays on page 3
const QUEUE_FLASH: Duration = Duration::from_millis(500);

/// Edge length of the artwork image requested from the player
const ARTWORK_SAMPLE_SIZE: u32 = 256;

/// Status pad next to the play button
const STATUS_PAD: u8 = 20;
const DELETE_MODE_PAD: u8 = 60;
const BEAT_PAD: u8 = 10;
const TEMPO_PAD: u8 = 40;
/// Receives the average artwork color
pub const ARTWORK_COLOR_PAD: u8 = 99;
const SKIP_PREVIOUS_PAD: u8 = 91;
const SKIP_NEXT_PAD: u8 = 92;

const VOLUME_COLUMN: u8 = 4;
const PROGRESS_COLUMN: u8 = 5;

/// Right-hand column, cleared together with the grid on a page change
const RIGHT_COLUMN: [u8; 8] = [19, 29, 39, 49, 59, 69, 79, 89];

/// Page indicator pads run from 101 to 108
const PAGE_INDICATOR_BASE: u8 = 100;
const DEFAULT_PAGE_COLOR: u8 = 37;

/// Pages the pad can show
pub const PAGES: std::ops::RangeInclusive<u8> = 1..=8;

/// A drawing step registered for a page
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
pub enum Routine {
    PlaybackIcon,
    PlayNextIndicator,
    RepeatIcon,
    Autoplay,
    Shuffle,
    Fader,
    Progress,
    SongIndexColors,
    ArtworkOnPads,
    FavoriteSongPads,
    DeleteLetter,
}

fn default_page_routines() -> HashMap<u8, Vec<Routine>> {
    use Routine::*;

    let mut routines = HashMap::new();
    routines.insert(
        1,
        vec![
            PlaybackIcon,
            PlayNextIndicator,
            RepeatIcon,
            Autoplay,
            Shuffle,
            Fader,
            Progress,
            SongIndexColors,
        ],
    );
    routines.insert(2, vec![ArtworkOnPads, PlaybackIcon]);
    routines.insert(3, vec![FavoriteSongPads, PlaybackIcon]);
    routines.insert(8, vec![DeleteLetter, SongIndexColors, PlaybackIcon]);
    routines
}

/// Every main-grid pad plus the row of buttons below it
fn grid_positions() -> impl Iterator<Item = u8> {
    (0..=8u8).flat_map(|row| (1..=8u8).map(move |col| row * 10 + col))
}

/// The clock period for a tempo: 24 ticks per beat, rounded to whole milliseconds
pub fn clock_period(bpm: f64) -> Duration {
    Duration::from_millis((2500.0 / bpm).round().max(1.0) as u64)
}

fn spawn_ticker(period: Duration, events: event::Sender, make: fn() -> Event) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            if events.send(make()).is_err() {
                break;
            }
        }
    })
}

fn stop(handle: &mut Option<JoinHandle<()>>) {
    if let Some(handle) = handle.take() {
        handle.abort();
    }
}

pub struct Launchpad<P: Player, S: Storage> {
    output: Output,
    player: Arc<P>,
    storage: S,
    events: event::Sender,

    page: u8,
    shift: bool,
    delete_mode: bool,
    play_next: bool,

    bpm: f64,
    clock: Option<JoinHandle<()>>,
    beat_timer: Option<JoinHandle<()>>,
    color_wheel: Option<JoinHandle<()>>,
    /// Beat positions of the current track, in 5 ms buckets
    beats: HashSet<u64>,
    hue: u16,

    now_playing_rgb: Option<Rgb>,
    artwork: Option<Artwork>,
    artwork_generation: u64,
    track_generation: u64,
    queue_flash: Option<PadLayout>,

    page_routines: HashMap<u8, Vec<Routine>>,
    page_colors: HashMap<u8, u8>,
    routine_runs: u64,

    startup_delay: Duration,
    color_wheel_interval: Option<Duration>,
    color_wheel_pads: Vec<u8>,
}

impl<P: Player, S: Storage> Launchpad<P, S> {
    /// Build an engine. Nothing is sent and no timer runs until [`Launchpad::start`].
    pub fn new(
        output: Output,
        player: Arc<P>,
        storage: S,
        events: event::Sender,
        config: &Config,
    ) -> Self {
        let mut page_colors = HashMap::new();
        page_colors.insert(1, DEFAULT_PAGE_COLOR);

        Self {
            output,
            player,
            storage,
            events,
            page: 1,
            shift: false,
            delete_mode: false,
            play_next: false,
            bpm: DEFAULT_BPM,
            clock: None,
            beat_timer: None,
            color_wheel: None,
            beats: HashSet::new(),
            hue: 0,
            now_playing_rgb: None,
            artwork: None,
            artwork_generation: 0,
            track_generation: 0,
            queue_flash: None,
            page_routines: default_page_routines(),
            page_colors,
            routine_runs: 0,
            startup_delay: config.startup_delay(),
            color_wheel_interval: config.color_wheel_interval(),
            color_wheel_pads: config.color_wheel_pads.clone(),
        }
    }

    pub fn player(&self) -> &Arc<P> {
        &self.player
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn page(&self) -> u8 {
        self.page
    }

    pub fn is_shift(&self) -> bool {
        self.shift
    }

    pub fn is_delete_mode(&self) -> bool {
        self.delete_mode
    }

    pub fn play_next(&self) -> bool {
        self.play_next
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    pub fn now_playing_rgb(&self) -> Option<Rgb> {
        self.now_playing_rgb
    }

    /// Number of render routines run so far
    pub fn routine_runs(&self) -> u64 {
        self.routine_runs
    }

    pub fn set_page_color(&mut self, page: u8, color: u8) {
        self.page_colors.insert(page, color);
    }

    /// Whether page-bound routines should draw for `page`
    fn on_page(&self, page: u8) -> bool {
        !self.shift && self.page == page
    }

    pub fn light(&mut self, spec: ColorSpec) -> Result<()> {
        self.output.light(spec)
    }

    pub fn set_buttons(&mut self, specs: &[ColorSpec]) -> Result<()> {
        self.output.set_buttons(specs)
    }

    pub fn send_clock_tick(&mut self) -> Result<()> {
        self.output.send_clock_tick()
    }

    /// Put the device in programmer mode, wait for it to settle and restore the last session
    pub async fn start(&mut self) -> Result<()> {
        self.output.enter_programmer_mode()?;
        log::info!("entered programmer mode");
        self.set_bpm(DEFAULT_BPM);

        tokio::time::sleep(self.startup_delay).await;

        let page = self.storage.get_or(storage::PAGE_KEY, 1u8).await?;
        self.set_page(page).await?;
        self.render_song_index_colors().await?;

        if let Some(period) = self.color_wheel_interval {
            stop(&mut self.color_wheel);
            self.color_wheel = Some(spawn_ticker(period, self.events.clone(), || {
                Event::ColorWheelTick
            }));
        }
        log::info!("restored page {}", page);
        Ok(())
    }

    /// Select a page and repaint it.
    ///
    /// In shift mode only the page indicators change. Selecting the current page again skips the
    /// clear but still runs every routine of the page. Pages outside 1..=8 are remembered but not
    /// drawn or persisted.
    pub async fn set_page(&mut self, page: u8) -> Result<()> {
        let old_page = self.page;
        self.page = page;
        if !PAGES.contains(&page) {
            log::debug!("page {} has nothing to show", page);
            return Ok(());
        }
        log::debug!("page {} -> {}", old_page, page);

        self.light_page_indicators()?;
        if !self.shift {
            if page != old_page {
                self.clear_pads(&RIGHT_COLUMN)?;
            }
            self.render_page().await?;
        }

        self.storage.set_value(storage::PAGE_KEY, &page).await
    }

    fn light_page_indicators(&mut self) -> Result<()> {
        let color = self
            .page_colors
            .get(&self.page)
            .copied()
            .unwrap_or(DEFAULT_PAGE_COLOR);
        let specs: Vec<_> = PAGES
            .map(|page| {
                let position = PAGE_INDICATOR_BASE + page;
                if page == self.page {
                    ColorSpec::palette(position, color)
                } else {
                    ColorSpec::off(position)
                }
            })
            .collect();
        self.output.set_buttons(&specs)
    }

    /// Run every routine registered for the current page
    pub async fn render_page(&mut self) -> Result<()> {
        let routines = self
            .page_routines
            .get(&self.page)
            .cloned()
            .unwrap_or_default();
        for routine in routines {
            self.run_routine(routine).await?;
        }
        Ok(())
    }

    pub async fn run_routine(&mut self, routine: Routine) -> Result<()> {
        log::trace!("render {:?}", routine);
        self.routine_runs += 1;
        match routine {
            Routine::PlaybackIcon => self.render_playback_icon(),
            Routine::PlayNextIndicator => self.render_play_next_indicator(),
            Routine::RepeatIcon => self.render_repeat_icon(),
            Routine::Autoplay => self.render_autoplay(),
            Routine::Shuffle => self.render_shuffle(),
            Routine::Fader => self.render_volume(),
            Routine::Progress => self.render_progress(),
            Routine::SongIndexColors => self.render_song_index_colors().await,
            Routine::ArtworkOnPads => self.render_artwork_on_pads(),
            Routine::FavoriteSongPads => self.render_favorite_songs().await,
            Routine::DeleteLetter => self.render_delete_letter(),
        }
    }

    pub fn set_shift(&mut self, shift: bool) {
        log::debug!("shift {}", if shift { "on" } else { "off" });
        self.shift = shift;
    }

    /// Switch delete mode and show it on its pad: red while deleting, green otherwise
    pub fn set_delete_mode(&mut self, delete_mode: bool) -> Result<()> {
        log::debug!("delete mode {}", if delete_mode { "on" } else { "off" });
        self.delete_mode = delete_mode;
        let color = if delete_mode { 5 } else { 3 };
        self.output.light(ColorSpec::palette(DELETE_MODE_PAD, color))
    }

    pub fn toggle_play_next(&mut self) -> Result<()> {
        self.play_next = !self.play_next;
        self.render_play_next_indicator()
    }

    /// Turn every grid pad off, along with `additional` pads
    pub fn clear_pads(&mut self, additional: &[u8]) -> Result<()> {
        let specs: Vec<_> = grid_positions()
            .chain(additional.iter().copied())
            .map(ColorSpec::off)
            .collect();
        self.output.set_buttons(&specs)
    }

    /// Clear the layout's bounding box, then paint the layout with `template`
    fn draw_layout(&mut self, layout: &PadLayout, x: u8, y: u8, template: ColorSpec) -> Result<()> {
        let clear: Vec<_> = layout
            .bounding_area(x, y)
            .into_iter()
            .map(ColorSpec::off)
            .collect();
        self.output.set_buttons(&clear)?;

        let paint: Vec<_> = layout.offset(x, y).map(|pad| template.at(pad)).collect();
        self.output.set_buttons(&paint)
    }

    /// Glyph on page 1 and the status pad everywhere. An empty queue flashes the status and
    /// drops the tempo back to the default.
    pub fn render_playback_icon(&mut self) -> Result<()> {
        let playing = self.player.is_playing();
        let status = if playing {
            ColorSpec::palette(STATUS_PAD, 25)
        } else if self.player.queue_is_empty() {
            if self.bpm != DEFAULT_BPM {
                self.set_bpm(DEFAULT_BPM);
            }
            ColorSpec::flashing(STATUS_PAD, 5, 0)
        } else {
            ColorSpec::palette(STATUS_PAD, 5)
        };

        if self.on_page(1) {
            let glyph = if playing { &layouts::PLAY } else { &layouts::PAUSE };
            self.draw_layout(glyph, 0, 0, status)?;
        }
        self.output.light(status)
    }

    pub fn render_play_next_indicator(&mut self) -> Result<()> {
        if !self.on_page(1) {
            return Ok(());
        }
        let glyph = if self.play_next {
            &layouts::PLAY_NEXT
        } else {
            &layouts::PLAY_LATER
        };
        self.draw_layout(glyph, 0, 5, ColorSpec::palette(0, 67))
    }

    pub fn render_repeat_icon(&mut self) -> Result<()> {
        if !self.on_page(1) {
            return Ok(());
        }
        match self.player.repeat_mode() {
            RepeatMode::None => self.draw_layout(&layouts::REPEAT, 5, 0, ColorSpec::palette(0, 1)),
            RepeatMode::One => {
                self.draw_layout(&layouts::REPEAT, 5, 0, ColorSpec::palette(0, 25))?;
                self.draw_layout(&layouts::REPEAT_ONE, 5, 0, ColorSpec::palette(0, 122))
            }
            RepeatMode::All => self.draw_layout(&layouts::REPEAT, 5, 0, ColorSpec::palette(0, 25)),
        }
    }

    pub fn render_autoplay(&mut self) -> Result<()> {
        if !self.on_page(1) {
            return Ok(());
        }
        let color = if self.player.autoplay_enabled() { 25 } else { 5 };
        self.draw_layout(&layouts::AUTOPLAY, 5, 5, ColorSpec::palette(0, color))
    }

    pub fn render_shuffle(&mut self) -> Result<()> {
        if !self.on_page(1) {
            return Ok(());
        }
        let color = match self.player.shuffle_mode() {
            ShuffleMode::Songs => 37,
            ShuffleMode::Off => 21,
        };
        self.draw_layout(&layouts::SHUFFLE, 5, 3, ColorSpec::palette(0, color))
    }

    pub fn render_volume(&mut self) -> Result<()> {
        let volume = self.player.volume();
        self.render_fader(VOLUME_COLUMN, volume, Rgb::WHITE, 1)
    }

    /// Playback progress in the fader style: red while paused, green while playing
    pub fn render_progress(&mut self) -> Result<()> {
        if !self.on_page(1) {
            return Ok(());
        }
        let progress = self.player.playback_progress();
        let color = if self.player.is_playing() {
            Rgb::GREEN
        } else {
            Rgb::RED
        };
        self.render_fader(PROGRESS_COLUMN, progress, color, 1)
    }

    /// Draw `value` (0.0 ..= 1.0) as a bar in `column`.
    ///
    /// Each of the 8 cells holds 16 steps; the cell above the filled ones shows the remainder as
    /// a dimmed `color`. The pad below the grid is lit on every page: green when full, red when
    /// empty, gray otherwise.
    pub fn render_fader(&mut self, column: u8, value: f64, color: Rgb, page: u8) -> Result<()> {
        let midi = (value * 128.0).round().clamp(0.0, 128.0) as u8;
        let mut specs = Vec::new();

        if self.on_page(page) {
            let height = midi / 16 + 1;
            let brightness = (midi % 16) * 8;
            for row in (height + 1)..=8 {
                specs.push(ColorSpec::off(row * 10 + column));
            }
            for row in 1..height.min(9) {
                specs.push(ColorSpec::rgb(row * 10 + column, color));
            }
            // a full bar has no partial cell
            if height <= 8 {
                specs.push(ColorSpec::rgb(
                    height * 10 + column,
                    color.with_value(brightness),
                ));
            }
        }

        let indicator = match midi {
            128 => Rgb::GREEN,
            0 => Rgb::RED,
            level => Rgb::gray(level),
        };
        specs.push(ColorSpec::rgb(column, indicator));
        self.output.set_buttons(&specs)
    }

    /// Highlight the right-column buttons that hold a saved play context
    pub async fn render_song_index_colors(&mut self) -> Result<()> {
        let color = if self.on_page(1) {
            15
        } else if self.shift || self.page == 8 {
            5
        } else {
            return Ok(());
        };

        let mut specs = Vec::new();
        for position in RIGHT_COLUMN {
            if self
                .storage
                .get_value::<serde_json::Value>(&storage::item_key(position))
                .await?
                .is_some()
            {
                specs.push(ColorSpec::palette(position, color));
            }
        }
        self.output.set_buttons(&specs)
    }

    /// Paint every saved page-3 song in its saved color
    pub async fn render_favorite_songs(&mut self) -> Result<()> {
        if !self.on_page(3) {
            return Ok(());
        }
        let mut specs = Vec::new();
        for position in grid_positions().filter(|p| *p > 10) {
            let stored: Option<crate::player::StoredSong> = self
                .storage
                .get_value(&storage::song_key(position))
                .await?;
            if let Some(rgb) = stored.and_then(|song| song.rgb) {
                specs.push(ColorSpec::rgb(position, rgb));
            }
        }
        self.output.set_buttons(&specs)
    }

    pub fn render_delete_letter(&mut self) -> Result<()> {
        if !self.on_page(8) {
            return Ok(());
        }
        self.draw_layout(&layouts::LETTER_D, 0, 0, ColorSpec::palette(0, 5))
    }

    /// Show the sampled artwork across the grid, one message per column
    pub fn render_artwork_on_pads(&mut self) -> Result<()> {
        let columns = match &self.artwork {
            Some(artwork) => artwork.pad_columns(),
            None => return Ok(()),
        };
        for column in columns {
            self.output.set_buttons(&column)?;
        }
        Ok(())
    }

    /// Advance the idle hue by one degree and paint the color wheel pads with it
    pub fn color_wheel_tick(&mut self) -> Result<()> {
        if self.hue >= 359 {
            self.hue = 0;
        }
        self.hue += 1;
        let rgb = hsv_to_rgb(self.hue, 127, 127);
        let specs: Vec<_> = self
            .color_wheel_pads
            .iter()
            .map(|&pad| ColorSpec::rgb(pad, rgb))
            .collect();
        self.output.set_buttons(&specs)
    }

    /// Restart the device clock at the new tempo
    pub fn set_bpm(&mut self, bpm: f64) {
        if !(bpm.is_finite() && bpm > 0.0) {
            log::warn!("ignoring tempo {}", bpm);
            return;
        }
        log::debug!("tempo {} bpm", bpm);
        self.bpm = bpm;
        stop(&mut self.clock);
        self.clock = Some(spawn_ticker(clock_period(bpm), self.events.clone(), || {
            Event::ClockTick
        }));
    }

    /// Replace the beat grid. No timer runs for an empty grid.
    pub fn set_beats(&mut self, beats_ms: &[u64]) {
        stop(&mut self.beat_timer);
        self.beats = beats_ms.iter().map(|ms| ms - ms % 5).collect();
        if !self.beats.is_empty() {
            self.beat_timer = Some(spawn_ticker(BEAT_TICK, self.events.clone(), || {
                Event::BeatTick
            }));
        }
    }

    /// Flash the beat pad if the playback position falls into a beat bucket
    pub fn beat_tick(&mut self) -> Result<()> {
        let ms = (self.player.playback_time() * 1000.0).floor().max(0.0) as u64;
        if self.beats.contains(&(ms - ms % 5)) {
            log::trace!("beat at {} ms", ms);
            self.output.light(ColorSpec::palette(BEAT_PAD, 10))?;
            self.send_later(BEAT_FLASH, Event::BeatFlashOff);
        }
        Ok(())
    }

    pub fn beat_flash_off(&mut self) -> Result<()> {
        self.output.light(ColorSpec::off(BEAT_PAD))
    }

    pub fn tempo_flash(&mut self) -> Result<()> {
        self.output.light(ColorSpec::flashing(TEMPO_PAD, 45, 0))
    }

    fn send_later(&self, delay: Duration, event: Event) {
        let events = self.events.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // the queue is gone on shutdown
            let _ = events.send(event);
        });
    }

    /// Load artwork in the background. Completion arrives as [`Event::ArtworkLoaded`]; only the
    /// most recent request is honored.
    ///
    /// Without an explicit URL the now-playing item's artwork is used, if there is any.
    pub fn refresh_artwork(&mut self, url: Option<String>, position: u8) {
        let url = match url.or_else(|| {
            self.player
                .now_playing()
                .and_then(|item| item.artwork)
                .map(|artwork| artwork.url)
        }) {
            Some(url) => url,
            None => return,
        };
        let url = player::sized_url(&url, ARTWORK_SAMPLE_SIZE, ARTWORK_SAMPLE_SIZE);

        self.artwork_generation += 1;
        let generation = self.artwork_generation;
        let player = self.player.clone();
        let events = self.events.clone();
        log::debug!("loading artwork #{} from {}", generation, url);
        tokio::spawn(async move {
            let artwork = player.load_artwork(&url).await;
            let _ = events.send(Event::ArtworkLoaded {
                generation,
                position,
                artwork,
            });
        });
    }

    /// Sample freshly loaded artwork: its average color goes to `position`, and in shift mode or
    /// on page 2 the whole grid shows it.
    pub fn artwork_loaded(&mut self, generation: u64, position: u8, artwork: Result<Artwork>) -> Result<()> {
        if generation != self.artwork_generation {
            log::debug!("discarding stale artwork #{}", generation);
            return Ok(());
        }
        let artwork = match artwork {
            Ok(artwork) => artwork,
            Err(e) => {
                log::warn!("artwork unavailable: {}", e);
                return Ok(());
            }
        };
        let rgb = match artwork.average_color() {
            Some(rgb) => rgb,
            None => {
                log::warn!("artwork #{} is empty", generation);
                return Ok(());
            }
        };

        self.now_playing_rgb = Some(rgb);
        self.artwork = Some(artwork);
        self.output.light(ColorSpec::rgb(position, rgb))?;
        if self.shift || self.page == 2 {
            self.render_artwork_on_pads()?;
        }
        Ok(())
    }

    /// The full page 1 set, as after a device reset
    pub async fn init_default_page(&mut self) -> Result<()> {
        log::info!("reinitializing default page");
        self.render_playback_icon()?;
        self.render_play_next_indicator()?;
        self.render_repeat_icon()?;
        self.render_autoplay()?;
        self.render_shuffle()?;
        self.render_volume()?;
        self.render_progress()?;
        self.set_page(1).await?;
        self.set_delete_mode(false)
    }

    pub async fn handle_notification(&mut self, notification: PlayerNotification) -> Result<()> {
        log::debug!("player: {:?}", notification);
        match notification {
            PlayerNotification::PlaybackStateChanged => {
                self.render_playback_icon()?;
                self.render_progress()?;
                self.refresh_artwork(None, ARTWORK_COLOR_PAD);
                Ok(())
            }
            PlayerNotification::RepeatModeChanged => self.render_repeat_icon(),
            PlayerNotification::VolumeChanged => self.render_volume(),
            PlayerNotification::ProgressChanged => self.render_progress(),
            PlayerNotification::AutoplayChanged => self.render_autoplay(),
            PlayerNotification::ShuffleChanged => self.render_shuffle(),
            PlayerNotification::QueueItemsChanged => self.start_queue_flash(),
            PlayerNotification::QueueItemForStartPosition => {
                self.refresh_artwork(None, ARTWORK_COLOR_PAD);
                Ok(())
            }
            PlayerNotification::NowPlayingWillChange(item) => {
                self.refresh_artwork(artwork_url(&item), ARTWORK_COLOR_PAD);
                Ok(())
            }
            PlayerNotification::NowPlayingDidChange(item) => self.now_playing_changed(item),
        }
    }

    /// Flash the status pad, and on page 3 show which way items are queued
    fn start_queue_flash(&mut self) -> Result<()> {
        let layout = if self.play_next {
            layouts::LETTER_N
        } else {
            layouts::LETTER_L
        };
        if self.page == 3 {
            self.draw_layout(&layout, 2, 2, ColorSpec::palette(0, 45))?;
        }
        self.queue_flash = Some(layout);
        self.output.light(ColorSpec::palette(STATUS_PAD, 45))?;
        self.send_later(QUEUE_FLASH, Event::QueueFlashEnd);
        Ok(())
    }

    pub async fn queue_flash_end(&mut self) -> Result<()> {
        if let Some(layout) = self.queue_flash.take() {
            if self.page == 3 {
                self.draw_layout(&layout, 2, 2, ColorSpec::off(0))?;
                self.set_page(self.page).await?;
            }
        }
        self.render_playback_icon()
    }

    fn now_playing_changed(&mut self, item: Option<NowPlaying>) -> Result<()> {
        self.refresh_artwork(artwork_url(&item), ARTWORK_COLOR_PAD);

        self.track_generation += 1;
        stop(&mut self.beat_timer);
        if let Some(item) = item {
            let generation = self.track_generation;
            let player = self.player.clone();
            let events = self.events.clone();
            let id = item.item.id().to_owned();
            tokio::spawn(async move {
                let analysis = player.audio_analysis(&id).await;
                let _ = events.send(Event::AnalysisLoaded {
                    generation,
                    analysis,
                });
            });
        }

        self.render_progress()?;
        let next = if self.player.can_skip_to_next() { 3 } else { 0 };
        let previous = if self.player.can_skip_to_previous() { 3 } else { 0 };
        self.output.light(ColorSpec::palette(SKIP_NEXT_PAD, next))?;
        self.output.light(ColorSpec::palette(SKIP_PREVIOUS_PAD, previous))
    }

    /// Apply the tempo and beat grid of the current track
    pub fn analysis_loaded(&mut self, generation: u64, analysis: Result<AudioAnalysis>) -> Result<()> {
        if generation != self.track_generation {
            log::debug!("discarding analysis of a previous track");
            return Ok(());
        }
        let analysis = match analysis {
            Ok(analysis) => analysis,
            Err(e) => {
                log::warn!("audio analysis unavailable: {}", e);
                return Ok(());
            }
        };
        if let Some(bpm) = analysis.bpm {
            self.set_bpm(bpm);
            self.send_later(TEMPO_FLASH_DELAY, Event::TempoFlash);
        }
        self.set_beats(&analysis.beats_ms);
        Ok(())
    }
}

fn artwork_url(item: &Option<NowPlaying>) -> Option<String> {
    item.as_ref()
        .and_then(|item| item.artwork.as_ref())
        .map(|artwork| artwork.url.clone())
}

impl<P: Player, S: Storage> Drop for Launchpad<P, S> {
    fn drop(&mut self) {
        stop(&mut self.clock);
        stop(&mut self.beat_timer);
        stop(&mut self.color_wheel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artwork::Rgba;
    use crate::player::{MediaItem, StoredSong};
    use crate::test_helpers::*;

    fn palette(position: u8, color: u8) -> (u8, u8, Vec<u8>) {
        (0, position, vec![color])
    }

    #[test]
    fn clock_period_rounds() {
        assert_eq!(clock_period(60.0), Duration::from_millis(42));
        assert_eq!(clock_period(120.0), Duration::from_millis(21));
        assert_eq!(clock_period(128.0), Duration::from_millis(20));
    }

    #[tokio::test(start_paused = true)]
    async fn reselecting_page_reruns_its_routines() -> anyhow::Result<()> {
        let mut f = Fixture::new();
        f.launchpad.set_page(1).await?;
        let before = f.launchpad.routine_runs();
        f.launchpad.set_page(1).await?;
        assert_eq!(f.launchpad.routine_runs() - before, 8);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn page_change_clears_and_persists() -> anyhow::Result<()> {
        let mut f = Fixture::new();
        f.launchpad.set_page(3).await?;

        let lights = all_lit(&f.sink.messages());
        assert!(lights.contains(&palette(103, 37)));
        assert!(lights.contains(&palette(101, 0)));
        assert!(lights.contains(&palette(11, 0)));
        assert!(lights.contains(&palette(89, 0)));
        assert_eq!(f.launchpad.storage().get_or(storage::PAGE_KEY, 0u8).await?, 3);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn shift_only_moves_the_indicator() -> anyhow::Result<()> {
        let mut f = Fixture::new();
        f.launchpad.set_shift(true);
        f.launchpad.set_page(2).await?;

        let lights = all_lit(&f.sink.messages());
        assert!(lights.iter().all(|(_, position, _)| (101..=108).contains(position)));
        assert_eq!(f.launchpad.routine_runs(), 0);
        assert_eq!(f.launchpad.page(), 2);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn out_of_range_pages_are_not_drawn() -> anyhow::Result<()> {
        let mut f = Fixture::new();
        f.launchpad.set_page(9).await?;
        assert_eq!(f.launchpad.page(), 9);
        assert!(f.sink.messages().is_empty());
        assert!(f.launchpad.storage().is_empty());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn delete_mode_pad() -> anyhow::Result<()> {
        let mut f = Fixture::new();
        f.launchpad.set_delete_mode(true)?;
        f.launchpad.set_delete_mode(false)?;
        assert_eq!(
            all_lit(&f.sink.messages()),
            vec![palette(60, 5), palette(60, 3)]
        );
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn empty_queue_flashes_and_resets_tempo() -> anyhow::Result<()> {
        let mut f = Fixture::new();
        f.launchpad.set_bpm(120.0);
        f.launchpad.render_playback_icon()?;

        assert_eq!(f.launchpad.bpm(), DEFAULT_BPM);
        let messages = f.sink.messages();
        assert_eq!(last_light(&messages, 20), Some((1, vec![5, 0])));
        // paused glyph in the same color
        assert_eq!(last_light(&messages, 33), Some((1, vec![5, 0])));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn playing_icon_is_green() -> anyhow::Result<()> {
        let mut f = Fixture::new();
        f.player.state().playing = true;
        f.launchpad.render_playback_icon()?;

        let messages = f.sink.messages();
        assert_eq!(last_light(&messages, 20), Some((0, vec![25])));
        assert_eq!(last_light(&messages, 23), Some((0, vec![25])));
        // outside the play glyph but inside its box
        assert_eq!(last_light(&messages, 22), Some((0, vec![0])));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn repeat_one_marks_its_extra_pad() -> anyhow::Result<()> {
        let mut f = Fixture::new();
        f.player.state().repeat = RepeatMode::One;
        f.launchpad.render_repeat_icon()?;
        let messages = f.sink.messages();
        assert_eq!(last_light(&messages, 27), Some((0, vec![122])));
        assert_eq!(last_light(&messages, 17), Some((0, vec![25])));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn fader_partial_cell_is_dimmed() -> anyhow::Result<()> {
        let mut f = Fixture::new();
        // 72 of 128: four full cells and a half-bright fifth
        f.launchpad.render_fader(4, 72.0 / 128.0, Rgb::GREEN, 1)?;
        let messages = f.sink.messages();
        assert_eq!(last_light(&messages, 44), Some((3, vec![0, 127, 0])));
        assert_eq!(last_light(&messages, 54), Some((3, vec![0, 64, 0])));
        assert_eq!(last_light(&messages, 64), Some((0, vec![0])));
        assert_eq!(last_light(&messages, 4), Some((3, vec![72, 72, 72])));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn fader_indicator_extremes() -> anyhow::Result<()> {
        let mut f = Fixture::new();
        f.launchpad.render_fader(4, 1.0, Rgb::WHITE, 1)?;
        let full = f.sink.take();
        assert_eq!(last_light(&full, 84), Some((3, vec![127, 127, 127])));
        assert_eq!(last_light(&full, 4), Some((3, vec![0, 127, 0])));
        assert!(all_lit(&full).iter().all(|(_, position, _)| *position < 90));

        f.launchpad.set_shift(true);
        f.launchpad.render_fader(4, 0.0, Rgb::WHITE, 1)?;
        // only the indicator outside page 1
        assert_eq!(all_lit(&f.sink.take()), vec![(3, 4, vec![127, 0, 0])]);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn song_index_colors_follow_mode() -> anyhow::Result<()> {
        let mut f = Fixture::new();
        let item = MediaItem::Album("1".into());
        f.launchpad
            .storage()
            .set_value(&storage::item_key(29), &item)
            .await?;

        f.launchpad.render_song_index_colors().await?;
        assert_eq!(all_lit(&f.sink.take()), vec![palette(29, 15)]);

        f.launchpad.set_shift(true);
        f.launchpad.render_song_index_colors().await?;
        assert_eq!(all_lit(&f.sink.take()), vec![palette(29, 5)]);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn favorites_use_saved_colors() -> anyhow::Result<()> {
        let mut f = Fixture::new();
        let stored = StoredSong {
            item: MediaItem::Song("7".into()),
            rgb: Some(Rgb::new(1, 2, 3)),
        };
        f.launchpad
            .storage()
            .set_value(&storage::song_key(45), &stored)
            .await?;
        f.launchpad.set_page(3).await?;
        assert_eq!(last_light(&f.sink.messages(), 45), Some((3, vec![1, 2, 3])));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn color_wheel_wraps() -> anyhow::Result<()> {
        let mut f = Fixture::new();
        for _ in 0..359 {
            f.launchpad.color_wheel_tick()?;
        }
        f.sink.clear();
        f.launchpad.color_wheel_tick()?;
        // back at hue 1
        assert_eq!(all_lit(&f.sink.messages()), vec![(3, 99, vec![127, 3, 1])]);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn clock_ticks_follow_tempo() -> anyhow::Result<()> {
        let mut f = Fixture::new();
        f.launchpad.set_bpm(125.0);
        let start = tokio::time::Instant::now();
        for _ in 0..3 {
            f.next_event(|e| matches!(e, Event::ClockTick)).await;
        }
        assert_eq!(start.elapsed(), Duration::from_millis(40));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn beat_flash() -> anyhow::Result<()> {
        let mut f = Fixture::new();
        f.launchpad.set_beats(&[1002, 2004]);
        f.player.state().time = 1.0041;
        f.launchpad.beat_tick()?;
        assert_eq!(all_lit(&f.sink.take()), vec![palette(10, 10)]);

        f.next_event(|e| matches!(e, Event::BeatFlashOff)).await;
        f.launchpad.beat_flash_off()?;
        assert_eq!(all_lit(&f.sink.take()), vec![palette(10, 0)]);

        f.player.state().time = 1.5;
        f.launchpad.beat_tick()?;
        assert!(f.sink.messages().is_empty());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn stale_artwork_is_discarded() -> anyhow::Result<()> {
        let mut f = Fixture::new();
        *f.player.artwork.lock().unwrap() = Some(Artwork::solid(4, 4, Rgba::new(200, 100, 0, 255)));

        f.launchpad.refresh_artwork(Some("a/{w}x{h}".into()), 99);
        f.launchpad.refresh_artwork(Some("b/{w}x{h}".into()), 99);

        let mut loaded = Vec::new();
        for _ in 0..2 {
            if let Some(Event::ArtworkLoaded {
                generation,
                position,
                artwork,
            }) = f.next_event(|e| matches!(e, Event::ArtworkLoaded { .. })).await
            {
                loaded.push(generation);
                f.launchpad.artwork_loaded(generation, position, artwork)?;
            }
        }
        loaded.sort();
        assert_eq!(loaded, vec![1, 2]);
        // only the second load lit the pad
        assert_eq!(
            all_lit(&f.sink.messages()),
            vec![(3, 99, vec![100, 50, 0])]
        );
        assert_eq!(f.launchpad.now_playing_rgb(), Some(Rgb::new(100, 50, 0)));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn artwork_fills_grid_on_page_two() -> anyhow::Result<()> {
        let mut f = Fixture::new();
        f.launchpad.set_page(2).await?;
        f.sink.clear();
        f.launchpad
            .artwork_loaded(0, 99, Ok(Artwork::solid(8, 8, Rgba::new(2, 4, 6, 255))))?;

        let messages = f.sink.messages();
        assert_eq!(messages.len(), 9);
        assert_eq!(last_light(&messages, 88), Some((3, vec![1, 2, 3])));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn failed_artwork_is_not_an_error() -> anyhow::Result<()> {
        let mut f = Fixture::new();
        f.launchpad.refresh_artwork(Some("missing".into()), 99);
        if let Some(Event::ArtworkLoaded {
            generation,
            position,
            artwork,
        }) = f.next_event(|e| matches!(e, Event::ArtworkLoaded { .. })).await
        {
            assert!(artwork.is_err());
            f.launchpad.artwork_loaded(generation, position, artwork)?;
        }
        assert!(f.sink.messages().is_empty());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn artwork_is_requested_at_sample_size() {
        let mut f = Fixture::new();
        f.player.state().now_playing = Some(song("42"));
        f.launchpad.refresh_artwork(None, ARTWORK_COLOR_PAD);
        f.next_event(|e| matches!(e, Event::ArtworkLoaded { .. })).await;
        assert_eq!(
            *f.player.artwork_urls.lock().unwrap(),
            vec!["https://example.com/42/256x256.jpg".to_owned()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn track_change_applies_analysis() -> anyhow::Result<()> {
        let mut f = Fixture::new();
        *f.player.analysis.lock().unwrap() = AudioAnalysis {
            bpm: Some(100.0),
            beats_ms: vec![600, 1200],
        };
        f.player.state().can_skip_next = true;

        f.launchpad
            .handle_notification(PlayerNotification::NowPlayingDidChange(Some(song("9"))))
            .await?;
        let messages = f.sink.take();
        assert_eq!(last_light(&messages, 92), Some((0, vec![3])));
        assert_eq!(last_light(&messages, 91), Some((0, vec![0])));

        if let Some(Event::AnalysisLoaded {
            generation,
            analysis,
        }) = f.next_event(|e| matches!(e, Event::AnalysisLoaded { .. })).await
        {
            f.launchpad.analysis_loaded(generation, analysis)?;
        }
        assert_eq!(f.launchpad.bpm(), 100.0);

        f.next_event(|e| matches!(e, Event::TempoFlash)).await;
        f.launchpad.tempo_flash()?;
        assert_eq!(all_lit(&f.sink.take()), vec![(1, 40, vec![45, 0])]);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn queue_flash_on_page_three() -> anyhow::Result<()> {
        let mut f = Fixture::new();
        f.launchpad.set_page(3).await?;
        f.sink.clear();

        f.launchpad
            .handle_notification(PlayerNotification::QueueItemsChanged)
            .await?;
        let messages = f.sink.take();
        assert_eq!(last_light(&messages, 20), Some((0, vec![45])));
        // letter L shifted by (2, 2)
        assert_eq!(last_light(&messages, 33), Some((0, vec![45])));

        f.next_event(|e| matches!(e, Event::QueueFlashEnd)).await;
        let runs = f.launchpad.routine_runs();
        f.launchpad.queue_flash_end().await?;
        assert_eq!(last_light(&f.sink.messages(), 33), Some((0, vec![0])));
        assert_eq!(f.launchpad.routine_runs() - runs, 2);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn start_restores_saved_page() -> anyhow::Result<()> {
        let mut f = Fixture::new();
        f.launchpad.storage().set_value(storage::PAGE_KEY, &8u8).await?;
        f.launchpad.start().await?;

        let messages = f.sink.messages();
        assert_eq!(messages[0], vec![240, 0, 32, 41, 2, 14, 14, 1, 247]);
        assert_eq!(f.launchpad.page(), 8);
        assert_eq!(last_light(&messages, 108), Some((0, vec![37])));
        // letter D
        assert_eq!(last_light(&messages, 86), Some((0, vec![5])));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn start_runs_configured_color_wheel() -> anyhow::Result<()> {
        let mut f = Fixture::with_config(Config {
            color_wheel_interval_ms: Some(100),
            color_wheel_pads: vec![98, 99],
            ..Config::default()
        });
        f.launchpad.start().await?;
        f.next_event(|e| matches!(e, Event::ColorWheelTick)).await;
        f.sink.clear();
        f.launchpad.color_wheel_tick()?;
        let lights = all_lit(&f.sink.messages());
        assert_eq!(lights.len(), 2);
        assert_eq!(lights[0].0, 3);
        assert_eq!(lights[1].1, 99);
        Ok(())
    }
}
