//! Conversions between RGB, HSV and HSL on the Launchpad's 7-bit scale.
//!
//! RGB components live in `0..128` (taken modulo 128 on input), hue in `0..360`, and saturation,
//! value and lightness in `0..=128`. Conversions towards HSV/HSL truncate, conversions towards RGB
//! round. Because the hue is bucketed to whole degrees, a round trip RGB -> HSV -> RGB may be off
//! by up to 3 per component.

use serde::{Deserialize, Serialize};

const RGB_MAX: f64 = 128.0;
const HUE_MAX: f64 = 360.0;
const SV_MAX: f64 = 128.0;

/// An RGB color on the Launchpad's 0..=127 component scale
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, Default, Serialize, Deserialize)]
pub struct Rgb {
	pub r: u8,
	pub g: u8,
	pub b: u8,
}

#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, Default)]
pub struct Hsv {
	pub h: u16,
	pub s: u8,
	pub v: u8,
}

#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, Default)]
pub struct Hsl {
	pub h: u16,
	pub s: u8,
	pub l: u8,
}

impl Rgb {
	pub const BLACK: Rgb = Rgb { r: 0, g: 0, b: 0 };
	pub const WHITE: Rgb = Rgb { r: 127, g: 127, b: 127 };
	pub const RED: Rgb = Rgb { r: 127, g: 0, b: 0 };
	pub const GREEN: Rgb = Rgb { r: 0, g: 127, b: 0 };

	pub fn new(r: u8, g: u8, b: u8) -> Self {
		return Self { r, g, b };
	}

	/// A gray with all three components set to `level`
	pub fn gray(level: u8) -> Self {
		return Self::new(level, level, level);
	}

	pub fn to_hsv(self) -> Hsv {
		return rgb_to_hsv(self.r, self.g, self.b);
	}

	pub fn to_hsl(self) -> Hsl {
		return rgb_to_hsl(self.r, self.g, self.b);
	}

	/// Keep hue and saturation of this color but replace its HSV value (brightness).
	///
	/// ```rust
	/// # use launchpad_remote::Rgb;
	/// assert_eq!(Rgb::WHITE.with_value(64), Rgb::gray(64));
	/// ```
	pub fn with_value(self, value: u8) -> Self {
		let hsv = Hsv { v: value, ..self.to_hsv() };
		return hsv.to_rgb();
	}
}

impl Hsv {
	pub fn new(h: u16, s: u8, v: u8) -> Self {
		return Self { h, s, v };
	}

	pub fn to_rgb(self) -> Rgb {
		return hsv_to_rgb(self.h, self.s, self.v);
	}
}

impl Hsl {
	pub fn new(h: u16, s: u8, l: u8) -> Self {
		return Self { h, s, l };
	}

	pub fn to_rgb(self) -> Rgb {
		return hsl_to_rgb(self.h, self.s, self.l);
	}
}

impl From<Rgb> for Hsv {
	fn from(rgb: Rgb) -> Self {
		rgb.to_hsv()
	}
}

impl From<Rgb> for Hsl {
	fn from(rgb: Rgb) -> Self {
		rgb.to_hsl()
	}
}

impl From<Hsv> for Rgb {
	fn from(hsv: Hsv) -> Self {
		hsv.to_rgb()
	}
}

impl From<Hsl> for Rgb {
	fn from(hsl: Hsl) -> Self {
		hsl.to_rgb()
	}
}

fn rgb_unit(component: u8) -> f64 {
	(component as f64 % RGB_MAX) / RGB_MAX
}

fn sv_unit(component: u8) -> f64 {
	let component = component as f64;
	if component == SV_MAX {
		1.0
	} else {
		(component % SV_MAX) / SV_MAX
	}
}

fn hue_unit(hue: u16) -> f64 {
	(hue as f64 % HUE_MAX) / HUE_MAX
}

// JS-style rounding: halves always round up
fn round_rgb(component: f64) -> u8 {
	(component * RGB_MAX + 0.5).floor() as u8
}

/// Hue in 0..1 of an RGB triple in unit scale, where `d = max - min` is non-zero
fn hue_of(r: f64, g: f64, b: f64, max: f64, d: f64) -> f64 {
	let h = if max == r {
		(g - b) / d + if g < b { 6.0 } else { 0.0 }
	} else if max == g {
		(b - r) / d + 2.0
	} else {
		(r - g) / d + 4.0
	};
	h / 6.0
}

pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> Hsv {
	let (r, g, b) = (rgb_unit(r), rgb_unit(g), rgb_unit(b));

	let max = r.max(g).max(b);
	let min = r.min(g).min(b);
	let d = max - min;

	let s = if max == 0.0 { 0.0 } else { d / max };
	let h = if max == min { 0.0 } else { hue_of(r, g, b, max, d) };

	return Hsv {
		h: (h * HUE_MAX).floor() as u16,
		s: (s * SV_MAX).floor() as u8,
		v: (max * SV_MAX).floor() as u8,
	};
}

pub fn rgb_to_hsl(r: u8, g: u8, b: u8) -> Hsl {
	let (r, g, b) = (rgb_unit(r), rgb_unit(g), rgb_unit(b));

	let max = r.max(g).max(b);
	let min = r.min(g).min(b);
	let l = (max + min) / 2.0;

	let (h, s) = if max == min {
		(0.0, 0.0) // achromatic
	} else {
		let d = max - min;
		let s = if l > 0.5 { d / (2.0 - max - min) } else { d / (max + min) };
		(hue_of(r, g, b, max, d), s)
	};

	return Hsl {
		h: (h * HUE_MAX).floor() as u16,
		s: (s * SV_MAX).floor() as u8,
		l: (l * SV_MAX).floor() as u8,
	};
}

pub fn hsv_to_rgb(h: u16, s: u8, v: u8) -> Rgb {
	let h = hue_unit(h) * 6.0;
	let s = sv_unit(s);
	let v = sv_unit(v);

	let i = h.floor();
	let f = h - i;
	let p = v * (1.0 - s);
	let q = v * (1.0 - f * s);
	let t = v * (1.0 - (1.0 - f) * s);

	let (r, g, b) = match i as u8 % 6 {
		0 => (v, t, p),
		1 => (q, v, p),
		2 => (p, v, t),
		3 => (p, q, v),
		4 => (t, p, v),
		_ => (v, p, q),
	};

	return Rgb::new(round_rgb(r), round_rgb(g), round_rgb(b));
}

pub fn hsl_to_rgb(h: u16, s: u8, l: u8) -> Rgb {
	let h = hue_unit(h);
	let s = sv_unit(s);
	let l = sv_unit(l);

	if s == 0.0 {
		let gray = round_rgb(l);
		return Rgb::gray(gray);
	}

	fn hue_to_rgb(p: f64, q: f64, mut t: f64) -> f64 {
		if t < 0.0 {
			t += 1.0;
		}
		if t > 1.0 {
			t -= 1.0;
		}
		if t < 1.0 / 6.0 {
			return p + (q - p) * 6.0 * t;
		}
		if t < 1.0 / 2.0 {
			return q;
		}
		if t < 2.0 / 3.0 {
			return p + (q - p) * (2.0 / 3.0 - t) * 6.0;
		}
		return p;
	}

	let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
	let p = 2.0 * l - q;

	return Rgb::new(
		round_rgb(hue_to_rgb(p, q, h + 1.0 / 3.0)),
		round_rgb(hue_to_rgb(p, q, h)),
		round_rgb(hue_to_rgb(p, q, h - 1.0 / 3.0)),
	);
}
