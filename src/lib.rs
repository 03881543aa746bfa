/*!
Drive a Novation Launchpad Pro MK3 as a remote control and status display for a media player.

The pad shows what the player is doing (playback state, volume, progress, repeat and shuffle
modes, album artwork, the beat of the current track) and turns presses into player commands.
What a press means depends on the page the pad is on:

| page | contents                                                                   |
|------|----------------------------------------------------------------------------|
| 1    | play/pause, repeat, autoplay and shuffle icons, a volume fader, progress   |
| 2    | the current artwork as an 8x8 mosaic; halves skip, the center toggles play |
| 3    | song slots: an empty pad saves the current song, a full one queues it      |
| 8    | saved play contexts on the right-hand column can be deleted                |

# Wiring it up

The [`Launchpad`] engine owns the pad state and renders it, the [`Dispatcher`] feeds it events.
Everything that happens (input from either MIDI port, player notifications, timers) goes through
one [`event`] queue. The player and the persistent storage are capabilities you provide by
implementing [`player::Player`] and [`storage::Storage`].

```no_run
# async fn run<P: launchpad_remote::player::Player>(player: std::sync::Arc<P>) -> launchpad_remote::Result<()> {
use launchpad_remote::{pro_mk3, storage::FileStorage, Config, Dispatcher, Launchpad};
use launchpad_remote::{InputDevice as _, OutputDevice as _};

let config = Config::default();
let (events, receiver) = launchpad_remote::event::channel();

let output = pro_mk3::Output::guess_named(&config.output_port)?;
let _input = pro_mk3::Input::guess_named(&config.input_port, events.clone())?;
let _daw_input = pro_mk3::DawInput::guess_named(&config.daw_input_port, events.clone())?;

let mut launchpad = Launchpad::new(
    output,
    player,
    FileStorage::new(&config.storage_path),
    events,
    &config,
);
launchpad.start().await?;
Dispatcher::new(launchpad, &config).run(receiver).await;
# Ok(())
# }
```

# Low-level access

[`pro_mk3::Output`] sends lighting commands directly. Every call corresponds to exactly one MIDI
message, so many pads can be updated at once:

```rust
use launchpad_remote::{pro_mk3::{ColorSpec, Output}, MockSink, Rgb};

let sink = MockSink::default();
let mut output = Output::from_sink(sink.clone());
output.set_buttons(&[
    ColorSpec::palette(11, 5),
    ColorSpec::rgb(12, Rgb::new(0, 64, 127)),
])?;
assert_eq!(sink.messages().len(), 1);
# Ok::<(), launchpad_remote::Error>(())
```
*/

pub mod util;

mod errors;
pub use errors::*;

mod midi_io;
pub use midi_io::*;

mod color;
pub use color::*;

mod config;
pub use config::Config;

pub mod launchpad_pro_mk3;
pub use launchpad_pro_mk3 as pro_mk3;

pub mod artwork;
pub mod event;
pub mod layouts;
pub mod player;
pub mod storage;

mod engine;
pub use engine::*;

mod dispatcher;
pub use dispatcher::*;

#[cfg(test)]
mod test_helpers;

/// Identifier used for e.g. the midi port names etc.
const APPLICATION_NAME: &str = "Launchpad Remote";
