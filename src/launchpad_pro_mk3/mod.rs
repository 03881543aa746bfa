/*!
# Launchpad Pro MK3 low-level API

The Pro MK3 is driven in programmer mode, where every pad and button is addressed by its
position `row * 10 + column`. The main 8x8 grid spans 11..88, the right-hand column 19..89, the
top row 91..98 and the two rows below the grid 1..8 and 101..108.

Lighting is done through a single SysEx command that can set any number of pads at once, see
[`ColorSpec`] and [`encode`]. Incoming messages are classified by [`MidiEvent::decode`].
*/

mod input;
pub use input::*;

mod output;
pub use output::*;

/// Every Pro MK3 SysEx message starts with these bytes
pub const SYSEX_HEADER: [u8; 6] = [240, 0, 32, 41, 2, 14];

/// End-of-SysEx byte
pub const SYSEX_STOP: u8 = 247;
