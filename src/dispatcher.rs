/*!
Turns inbound events into player commands and engine updates.

The [`Dispatcher`] owns the [`Launchpad`] engine and the note state table, and drains the event
queue one event at a time. Pad presses are decoded here, so edge detection sees messages in the
order they arrived across both input ports.
*/

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::event::{Event, PortRole, RawMessage, Receiver};
use crate::layouts;
use crate::player::{MediaItem, Notification, Player, SongSource, StoredSong};
use crate::pro_mk3::{Action, ColorSpec, DeviceLayout, MidiEvent, NoteStateTable};
use crate::storage::{self, Storage};
use crate::{Config, Launchpad, Result};

/// Volume change of one press on the volume buttons
pub const VOLUME_STEP: f64 = 1.0 / 128.0;

/// Custom layout page whose announcement hands the pad back to this crate
const RECOVERY_PAGE: u8 = 7;

/// Cancellation state shared between the dispatcher and the running volume ramp.
///
/// Every ramp runs under a generation number. Starting or cancelling a ramp moves the generation
/// on, and a ramp stops at its next step once its generation is no longer current.
#[derive(Debug, Clone, Default)]
pub struct FaderRamp {
    generation: Arc<AtomicU64>,
    moving: Arc<AtomicBool>,
}

impl FaderRamp {
    pub fn is_moving(&self) -> bool {
        self.moving.load(Ordering::SeqCst)
    }

    /// Claim a new generation, superseding any running ramp
    pub fn begin(&self) -> u64 {
        self.moving.store(true, Ordering::SeqCst);
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Stop the running ramp at its next step
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.moving.store(false, Ordering::SeqCst);
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Step the volume one MIDI unit at a time from `from` to `to`, both inclusive, sleeping `step`
    /// after each change. Returns the number of volume changes made.
    pub async fn run<P: Player>(
        self,
        player: Arc<P>,
        generation: u64,
        from: u8,
        to: u8,
        step: Duration,
    ) -> usize {
        let levels: Vec<u8> = if to > from {
            (from..=to).collect()
        } else if to < from {
            (to..=from).rev().collect()
        } else {
            Vec::new()
        };

        let mut changes = 0;
        for level in levels {
            if !self.is_current(generation) {
                break;
            }
            if let Err(e) = player.set_volume(level as f64 / 128.0) {
                log::warn!("volume ramp stopped: {}", e);
                break;
            }
            changes += 1;
            tokio::time::sleep(step).await;
        }

        if self.is_current(generation) {
            self.moving.store(false, Ordering::SeqCst);
        }
        log::debug!("volume ramp {} -> {} made {} changes", from, to, changes);
        changes
    }
}

pub struct Dispatcher<P: Player, S: Storage> {
    launchpad: Launchpad<P, S>,
    notes: NoteStateTable,
    fader: FaderRamp,
    min_velocity: u8,
    fader_step_multiplier: u64,
    share_link_prefix: String,
}

impl<P: Player, S: Storage> Dispatcher<P, S> {
    pub fn new(launchpad: Launchpad<P, S>, config: &Config) -> Self {
        Self {
            launchpad,
            notes: NoteStateTable::new(),
            fader: FaderRamp::default(),
            min_velocity: config.min_velocity,
            fader_step_multiplier: config.fader_step_multiplier,
            share_link_prefix: config.share_link_prefix.clone(),
        }
    }

    pub fn launchpad(&self) -> &Launchpad<P, S> {
        &self.launchpad
    }

    pub fn launchpad_mut(&mut self) -> &mut Launchpad<P, S> {
        &mut self.launchpad
    }

    pub fn fader(&self) -> &FaderRamp {
        &self.fader
    }

    /// Handle events until [`Event::Shutdown`] arrives or every sender is gone. A failing event
    /// is logged and doesn't stop the loop.
    pub async fn run(&mut self, mut events: Receiver) {
        while let Some(event) = events.recv().await {
            if let Event::Shutdown = event {
                log::info!("shutting down");
                break;
            }
            if let Err(e) = self.handle_event(event).await {
                log::error!("failed to handle event: {}", e);
            }
        }
        self.fader.cancel();
    }

    pub async fn handle_event(&mut self, event: Event) -> Result<()> {
        match event {
            Event::Input(message) => self.handle_input(message).await,
            Event::Player(notification) => self.launchpad.handle_notification(notification).await,
            Event::ClockTick => self.launchpad.send_clock_tick(),
            Event::BeatTick => self.launchpad.beat_tick(),
            Event::BeatFlashOff => self.launchpad.beat_flash_off(),
            Event::ColorWheelTick => self.launchpad.color_wheel_tick(),
            Event::TempoFlash => self.launchpad.tempo_flash(),
            Event::QueueFlashEnd => self.launchpad.queue_flash_end().await,
            Event::ArtworkLoaded {
                generation,
                position,
                artwork,
            } => self.launchpad.artwork_loaded(generation, position, artwork),
            Event::AnalysisLoaded {
                generation,
                analysis,
            } => self.launchpad.analysis_loaded(generation, analysis),
            Event::Shutdown => Ok(()),
        }
    }

    async fn handle_input(&mut self, message: RawMessage) -> Result<()> {
        let event = MidiEvent::decode(
            &message.bytes,
            message.timestamp,
            &message.source,
            &mut self.notes,
        );
        if !matches!(event.action, Action::Aftertouch | Action::Clock) {
            log::trace!("<- {:?}", event);
        }

        if let Some(announcement) = event.layout_announcement() {
            if announcement.layout == DeviceLayout::Custom && announcement.page == RECOVERY_PAGE {
                return self.launchpad.init_default_page().await;
            }
            return Ok(());
        }
        if message.role == PortRole::Announcements {
            return Ok(());
        }

        let (channel, number, velocity) = match event.triplet() {
            Some(triplet) => triplet,
            None => return Ok(()),
        };
        match event.action {
            Action::ControlChange if channel == 0 => {
                self.handle_control_change(number, velocity).await
            }
            Action::NoteOn if event.was_on() == Some(false) => {
                self.handle_note_on(channel, number, velocity).await
            }
            _ => Ok(()),
        }
    }

    /// Buttons around the grid
    async fn handle_control_change(&mut self, number: u8, velocity: u8) -> Result<()> {
        let player = self.launchpad.player().clone();

        if velocity == 127 {
            match number {
                4 => {
                    if player.is_muted() {
                        player.unmute()?;
                    } else {
                        player.mute()?;
                    }
                }
                10 => match player.now_playing() {
                    Some(item) => {
                        let link = format!("{}{}", self.share_link_prefix, item.item.id());
                        player.copy_to_clipboard(&link)?;
                    }
                    None => log::debug!("nothing playing to share"),
                },
                20 => self.toggle_playback()?,
                70 => {
                    let volume = player.volume() - VOLUME_STEP;
                    if volume > 0.0 {
                        player.set_volume(volume)?;
                    }
                }
                80 => {
                    let volume = player.volume() + VOLUME_STEP;
                    if volume < 1.0 {
                        player.set_volume(volume)?;
                    }
                }
                91 => player.skip_to_previous()?,
                92 => player.skip_to_next()?,
                n if n > 100 => self.launchpad.set_page(n - 100).await?,
                _ => {}
            }
        }

        match (number, velocity) {
            (90, 127) => {
                self.launchpad.set_shift(true);
                self.launchpad.clear_pads(&[])?;
                self.launchpad.render_song_index_colors().await?;
                self.launchpad.render_artwork_on_pads()?;
            }
            (90, 0) => {
                self.launchpad.set_shift(false);
                self.launchpad.clear_pads(&[])?;
                let page = self.launchpad.page();
                self.launchpad.set_page(page).await?;
                self.launchpad.render_song_index_colors().await?;
            }
            (60, 127) => self.launchpad.set_delete_mode(true)?,
            (60, 0) => self.launchpad.set_delete_mode(false)?,
            _ => {}
        }

        if velocity == 127 && number % 10 == 9 {
            self.handle_item_button(number).await?;
        }
        Ok(())
    }

    /// Right-hand column: saved play contexts
    async fn handle_item_button(&mut self, number: u8) -> Result<()> {
        let key = storage::item_key(number);
        let player = self.launchpad.player().clone();

        if self.launchpad.is_shift() {
            match player.play_context() {
                Some(context) => {
                    log::debug!("saving {:?} as {}", context, key);
                    self.launchpad.storage().set_value(&key, &context).await?;
                }
                None => log::debug!("no play context to save"),
            }
            return Ok(());
        }

        match self.launchpad.page() {
            1 => {
                let stored: Option<MediaItem> = self.launchpad.storage().get_value(&key).await?;
                if let Some(item) = stored {
                    self.enqueue(&item)?;
                }
            }
            8 => {
                self.launchpad.storage().delete(&key).await?;
                self.launchpad.light(ColorSpec::off(number))?;
            }
            _ => {}
        }
        Ok(())
    }

    fn enqueue(&self, item: &MediaItem) -> Result<()> {
        let player = self.launchpad.player();
        if self.launchpad.play_next() {
            player.play_next(item)
        } else {
            player.play_later(item)
        }
    }

    /// Pause or resume. With nothing playing and an empty queue the current play context is
    /// queued first.
    fn toggle_playback(&self) -> Result<()> {
        let player = self.launchpad.player();
        if player.now_playing().is_none() && player.queue_is_empty() {
            match player.play_context() {
                Some(context) => player.set_queue(&context, true)?,
                None => log::debug!("nothing to queue"),
            }
        }
        if player.is_playing() {
            player.pause()
        } else {
            player.play()
        }
    }

    async fn handle_note_on(&mut self, channel: u8, number: u8, velocity: u8) -> Result<()> {
        match channel {
            0 => match self.launchpad.page() {
                1 if !self.launchpad.is_shift() => self.handle_controls_press(number, velocity),
                2 if !self.launchpad.is_shift() => self.handle_artwork_press(number, velocity).await,
                3 => self.handle_song_press(number, velocity).await,
                _ => Ok(()),
            },
            // older custom layout
            2 if velocity > 40 => {
                let player = self.launchpad.player();
                match number {
                    60 => player.skip_to_previous(),
                    61 => player.skip_to_next(),
                    62 => self.toggle_playback(),
                    _ => Ok(()),
                }
            }
            _ => Ok(()),
        }
    }

    /// Page 1: icons and the volume fader
    fn handle_controls_press(&mut self, number: u8, velocity: u8) -> Result<()> {
        let player = self.launchpad.player().clone();
        let hard = velocity > self.min_velocity;

        if hard && layouts::PLAY_PAUSE_BOX.contains(number) {
            self.toggle_playback()?;
        }
        if hard && layouts::REPEAT_BOX.contains(number) {
            player.set_repeat_mode(player.repeat_mode().next())?;
        }
        if hard && layouts::AUTOPLAY_BOX.contains(number) {
            player.set_autoplay_enabled(!player.autoplay_enabled())?;
        }
        if layouts::SHUFFLE_BOX.contains(number) {
            player.set_shuffle_mode(player.shuffle_mode().toggled())?;
        }
        if hard && layouts::LETTER_BOX.contains(number) {
            self.launchpad.toggle_play_next()?;
        }

        if number % 10 == 4 {
            self.start_volume_ramp(number / 10, velocity);
        } else {
            self.fader.cancel();
        }
        Ok(())
    }

    /// Ramp the volume to the pressed fader row. Softer presses ramp slower.
    fn start_volume_ramp(&mut self, row: u8, velocity: u8) {
        let player = self.launchpad.player().clone();
        let from = (player.volume() * 128.0).round().clamp(0.0, 128.0) as u8;
        let to = row.min(8) * 16;
        let step = Duration::from_millis(
            128u64.saturating_sub(velocity as u64) * self.fader_step_multiplier,
        );

        if self.fader.is_moving() {
            log::debug!("superseding running volume ramp");
        }
        let generation = self.fader.begin();
        tokio::spawn(self.fader.clone().run(player, generation, from, to, step));
    }

    /// Page 2: the artwork grid doubles as transport controls
    async fn handle_artwork_press(&mut self, number: u8, velocity: u8) -> Result<()> {
        let player = self.launchpad.player().clone();

        if velocity > 10 && velocity < 40 {
            if let Some(item) = player.now_playing() {
                let notification =
                    Notification::for_song(&item.name, &item.artist, item.artwork.as_ref());
                if let Err(e) = player.notify(notification).await {
                    log::warn!("notification failed: {}", e);
                }
            }
            Ok(())
        } else if layouts::CENTER_BOX.contains(number) {
            self.toggle_playback()
        } else if number % 10 <= 4 {
            player.skip_to_previous()
        } else {
            player.skip_to_next()
        }
    }

    /// Page 3: every grid pad is a song slot
    async fn handle_song_press(&mut self, number: u8, velocity: u8) -> Result<()> {
        let key = storage::song_key(number);
        let player = self.launchpad.player().clone();
        let delete_mode = self.launchpad.is_delete_mode();
        let stored: Option<StoredSong> = self.launchpad.storage().get_value(&key).await?;

        match stored {
            Some(song) if velocity < 50 && !delete_mode => {
                let id = song.item.id();
                let result = match player.lookup_song(SongSource::for_id(id), id).await {
                    Ok(info) => {
                        let notification =
                            Notification::for_song(&info.name, &info.artist, info.artwork.as_ref())
                                .with_body(key);
                        player.notify(notification).await
                    }
                    Err(e) => Err(e),
                };
                if let Err(e) = result {
                    log::warn!("can't show song {}: {}", id, e);
                }
            }
            Some(_) if delete_mode => {
                self.launchpad.light(ColorSpec::off(number))?;
                self.launchpad.storage().delete(&key).await?;
            }
            Some(song) => self.enqueue(&song.item)?,
            None if !delete_mode => {
                if let Some(item) = player.now_playing() {
                    let song = StoredSong {
                        item: item.item,
                        rgb: self.launchpad.now_playing_rgb(),
                    };
                    if let Some(rgb) = song.rgb {
                        self.launchpad.light(ColorSpec::rgb(number, rgb))?;
                    }
                    log::debug!("saving {:?} as {}", song.item, key);
                    self.launchpad.storage().set_value(&key, &song).await?;
                }
            }
            None => {}
        }
        Ok(())
    }
}
