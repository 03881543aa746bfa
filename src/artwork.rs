//! Sampling album artwork down to what the pad can show: one average color, or an 8x8 mosaic.

use crate::pro_mk3::ColorSpec;
use crate::util::Array2d;
use crate::{Error, Result, Rgb};

/// An 8-bit RGBA pixel as decoded from an image
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, Default)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

/// Device intensity is half the 8-bit image intensity
fn to_device(r: u64, g: u64, b: u64) -> Rgb {
    Rgb::new((r / 2) as u8, (g / 2) as u8, (b / 2) as u8)
}

/// A decoded image, row-major with row 0 at the top
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Artwork {
    pixels: Array2d<Rgba>,
}

impl Artwork {
    pub fn new(pixels: Array2d<Rgba>) -> Self {
        Self { pixels }
    }

    /// Build from tightly packed RGBA bytes
    pub fn from_rgba(width: usize, height: usize, bytes: &[u8]) -> Result<Self> {
        let pixels = bytes
            .chunks_exact(4)
            .map(|p| Rgba::new(p[0], p[1], p[2], p[3]))
            .collect();
        Array2d::from_vec(width, height, pixels)
            .filter(|_| bytes.len() % 4 == 0)
            .map(Self::new)
            .ok_or_else(|| {
                Error::Artwork(format!(
                    "{} bytes don't make a {}x{} RGBA image",
                    bytes.len(),
                    width,
                    height
                ))
            })
    }

    /// A single-color image
    pub fn solid(width: usize, height: usize, color: Rgba) -> Self {
        let mut pixels = Array2d::new(width, height);
        for y in 0..height {
            for x in 0..width {
                pixels.set(x, y, color);
            }
        }
        Self::new(pixels)
    }

    pub fn width(&self) -> usize {
        self.pixels.width()
    }

    pub fn height(&self) -> usize {
        self.pixels.height()
    }

    /// Mean color over all pixels, alpha ignored, scaled to the device range. `None` for an
    /// empty image.
    pub fn average_color(&self) -> Option<Rgb> {
        if self.pixels.is_empty() {
            return None;
        }
        let (mut r, mut g, mut b, mut count) = (0u64, 0u64, 0u64, 0u64);
        for pixel in self.pixels.iter() {
            r += pixel.r as u64;
            g += pixel.g as u64;
            b += pixel.b as u64;
            count += 1;
        }
        Some(to_device(r / count, g / count, b / count))
    }

    /// Block averages of an 8x8 division of the image, indexed `[row][column]` with row 0 at the
    /// bottom of the image, matching the pad grid. `None` for an empty image.
    pub fn mosaic(&self) -> Option<[[Rgb; 8]; 8]> {
        if self.pixels.is_empty() {
            return None;
        }
        let (width, height) = (self.width(), self.height());
        // images smaller than 8 pixels repeat pixels rather than leave blocks empty
        let span = |cell: usize, size: usize| {
            let start = (cell * size / 8).min(size - 1);
            let end = ((cell + 1) * size / 8).max(start + 1).min(size);
            start..end
        };

        let mut mosaic = [[Rgb::BLACK; 8]; 8];
        for (row, cells) in mosaic.iter_mut().enumerate() {
            let ys = span(7 - row, height);
            for (column, cell) in cells.iter_mut().enumerate() {
                let xs = span(column, width);
                let (mut r, mut g, mut b, mut count) = (0u64, 0u64, 0u64, 0u64);
                for y in ys.clone() {
                    for x in xs.clone() {
                        let pixel = self.pixels.get(x, y);
                        r += pixel.r as u64;
                        g += pixel.g as u64;
                        b += pixel.b as u64;
                        count += 1;
                    }
                }
                *cell = to_device(r / count, g / count, b / count);
            }
        }
        Some(mosaic)
    }

    /// The mosaic as lighting commands, one set of 8 pads per grid column
    pub fn pad_columns(&self) -> Vec<Vec<ColorSpec>> {
        let mosaic = match self.mosaic() {
            Some(mosaic) => mosaic,
            None => return Vec::new(),
        };
        (0..8u8)
            .map(|column| {
                (0..8u8)
                    .map(|row| {
                        let position = (row + 1) * 10 + column + 1;
                        ColorSpec::rgb(position, mosaic[row as usize][column as usize])
                    })
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_ignores_alpha_and_halves() {
        let bytes = [255, 0, 100, 0, 1, 0, 100, 255];
        let artwork = Artwork::from_rgba(2, 1, &bytes).unwrap();
        // means 128, 0, 100
        assert_eq!(artwork.average_color(), Some(Rgb::new(64, 0, 50)));
    }

    #[test]
    fn rejects_mismatched_buffers() {
        assert!(Artwork::from_rgba(2, 2, &[0; 15]).is_err());
        assert!(Artwork::from_rgba(2, 2, &[0; 12]).is_err());
        assert!(Artwork::from_rgba(0, 0, &[]).unwrap().average_color().is_none());
    }

    #[test]
    fn mosaic_is_flipped_to_grid_rows() {
        // top half red, bottom half blue
        let mut pixels = Array2d::new(16, 16);
        for y in 0..16 {
            for x in 0..16 {
                let color = if y < 8 {
                    Rgba::new(254, 0, 0, 255)
                } else {
                    Rgba::new(0, 0, 254, 255)
                };
                pixels.set(x, y, color);
            }
        }
        let mosaic = Artwork::new(pixels).mosaic().unwrap();
        assert_eq!(mosaic[0][0], Rgb::new(0, 0, 127));
        assert_eq!(mosaic[7][7], Rgb::new(127, 0, 0));
    }

    #[test]
    fn tiny_images_still_fill_the_grid() {
        let artwork = Artwork::solid(3, 2, Rgba::new(10, 20, 30, 0));
        let columns = artwork.pad_columns();
        assert_eq!(columns.len(), 8);
        assert!(columns.iter().all(|column| column.len() == 8));
        assert_eq!(columns[0][0], ColorSpec::rgb(11, Rgb::new(5, 10, 15)));
        assert_eq!(columns[7][7].position(), 88);
    }
}
