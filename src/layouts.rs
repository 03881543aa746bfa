//! Named pad sets used to paint icons and letters, and to hit-test presses against them.
//!
//! Coordinates are programmer-mode positions anchored at the bottom-left pad (11). Icons are
//! placed on the grid by adding a column offset `x` and a row offset `y * 10`.

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PadLayout {
    pub name: &'static str,
    pub pads: &'static [u8],
}

impl PadLayout {
    const fn new(name: &'static str, pads: &'static [u8]) -> Self {
        Self { name, pads }
    }

    /// `[min_row, min_col, max_row, max_col]` over all pads, or all zeros for an empty layout.
    ///
    /// ```rust
    /// # use launchpad_remote::layouts::PLAY;
    /// assert_eq!(PLAY.bounding_box(), [1, 1, 3, 3]);
    /// ```
    pub fn bounding_box(&self) -> [u8; 4] {
        if self.pads.is_empty() {
            return [0; 4];
        }
        self.pads.iter().fold([u8::MAX, u8::MAX, 0, 0], |[r0, c0, r1, c1], &pad| {
            let (row, col) = (pad / 10, pad % 10);
            [r0.min(row), c0.min(col), r1.max(row), c1.max(col)]
        })
    }

    pub fn contains(&self, position: u8) -> bool {
        self.pads.contains(&position)
    }

    /// The pads shifted right by `x` columns and up by `y` rows
    pub fn offset(&self, x: u8, y: u8) -> impl Iterator<Item = u8> + '_ {
        self.pads.iter().map(move |&pad| pad + y * 10 + x)
    }

    /// Every position inside the shifted bounding box, row by row
    pub fn bounding_area(&self, x: u8, y: u8) -> Vec<u8> {
        let [r0, c0, r1, c1] = self.bounding_box();
        (r0..=r1)
            .flat_map(|row| (c0..=c1).map(move |col| (row + y) * 10 + col + x))
            .collect()
    }

    pub fn by_name(name: &str) -> Option<&'static PadLayout> {
        ALL.iter().find(|layout| layout.name == name)
    }
}

pub const PLAY: PadLayout = PadLayout::new("play", &[11, 12, 21, 23, 31, 32]);
pub const PAUSE: PadLayout = PadLayout::new("pause", &[11, 13, 21, 23, 31, 33]);
pub const REPEAT: PadLayout = PadLayout::new("repeat", &[12, 13, 21, 23, 31, 32]);
/// The extra pad lit in repeat-one mode
pub const REPEAT_ONE: PadLayout = PadLayout::new("repeat_one", &[22]);
pub const AUTOPLAY: PadLayout = PadLayout::new("autoplay", &[11, 13, 21, 22, 23, 31, 32, 33]);
pub const SHUFFLE: PadLayout = PadLayout::new("shuffle", &[11, 12, 13, 21, 22, 23]);
pub const PLAY_NEXT: PadLayout = PadLayout::new("play_next", &[11, 21, 22, 31, 32, 33]);
pub const PLAY_LATER: PadLayout = PadLayout::new("play_later", &[11, 12, 13, 21, 22, 31]);

pub const LETTER_D: PadLayout = PadLayout::new(
    "letter_d",
    &[
        11, 12, 13, 14, 15, 16, 22, 27, 32, 38, 42, 48, 52, 58, 62, 68, 72, 77, 81, 82, 83, 84, 85,
        86,
    ],
);
pub const LETTER_N: PadLayout =
    PadLayout::new("letter_n", &[11, 14, 21, 23, 24, 31, 32, 34, 41, 44]);
pub const LETTER_L: PadLayout = PadLayout::new("letter_l", &[11, 12, 13, 21, 31, 41]);
pub const LETTER_P: PadLayout = PadLayout::new("letter_p", &[11, 21, 22, 23, 31, 32, 33]);

// Hit areas on page 1, each the 3x3 (or 3x2) cell an icon is drawn in

pub const PLAY_PAUSE_BOX: PadLayout =
    PadLayout::new("play_pause_box", &[11, 12, 13, 21, 22, 23, 31, 32, 33]);
pub const REPEAT_BOX: PadLayout =
    PadLayout::new("repeat_box", &[16, 17, 18, 26, 27, 28, 36, 37, 38]);
pub const AUTOPLAY_BOX: PadLayout =
    PadLayout::new("autoplay_box", &[66, 67, 68, 76, 77, 78, 86, 87, 88]);
pub const SHUFFLE_BOX: PadLayout = PadLayout::new("shuffle_box", &[46, 47, 48, 56, 57, 58]);
pub const LETTER_BOX: PadLayout =
    PadLayout::new("letter_box", &[61, 62, 63, 71, 72, 73, 81, 82, 83]);
/// The four middle pads, used as play/pause on page 2
pub const CENTER_BOX: PadLayout = PadLayout::new("center_box", &[44, 45, 54, 55]);

pub const ALL: &[PadLayout] = &[
    PLAY,
    PAUSE,
    REPEAT,
    REPEAT_ONE,
    AUTOPLAY,
    SHUFFLE,
    PLAY_NEXT,
    PLAY_LATER,
    LETTER_D,
    LETTER_N,
    LETTER_L,
    LETTER_P,
    PLAY_PAUSE_BOX,
    REPEAT_BOX,
    AUTOPLAY_BOX,
    SHUFFLE_BOX,
    LETTER_BOX,
    CENTER_BOX,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounding_boxes() {
        assert_eq!(PLAY.bounding_box(), [1, 1, 3, 3]);
        assert_eq!(LETTER_D.bounding_box(), [1, 1, 8, 8]);
        assert_eq!(REPEAT_ONE.bounding_box(), [2, 2, 2, 2]);
        assert_eq!(PadLayout::new("empty", &[]).bounding_box(), [0; 4]);
    }

    #[test]
    fn hit_boxes_cover_their_drawn_icons() {
        assert!(REPEAT.offset(5, 0).all(|pad| REPEAT_BOX.contains(pad)));
        assert!(AUTOPLAY.offset(5, 5).all(|pad| AUTOPLAY_BOX.contains(pad)));
        assert!(SHUFFLE.offset(5, 3).all(|pad| SHUFFLE_BOX.contains(pad)));
        assert!(PLAY_NEXT.offset(0, 5).all(|pad| LETTER_BOX.contains(pad)));
        assert!(PLAY_LATER.offset(0, 5).all(|pad| LETTER_BOX.contains(pad)));
    }

    #[test]
    fn bounding_area_is_offset() {
        assert_eq!(SHUFFLE.bounding_area(5, 3), vec![46, 47, 48, 56, 57, 58]);
        assert_eq!(REPEAT_ONE.bounding_area(5, 0), vec![27]);
    }

    #[test]
    fn lookup_by_name() {
        assert_eq!(PadLayout::by_name("letter_n"), Some(&LETTER_N));
        assert_eq!(PadLayout::by_name("nope"), None);
    }
}
