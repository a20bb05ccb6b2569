use image::{GrayImage, RgbImage};

use crate::frame::Frame;

/// Read-only access to an interleaved 8-bit pixel grid.
///
/// Quality metrics are written against this trait rather than a concrete
/// image type, so any buffer that can report its geometry and hand out
/// individual samples can be classified.
pub trait PixelGrid {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn channels(&self) -> u8;

    /// Channel `c` of pixel `(x, y)`. Callers must stay in bounds.
    fn sample(&self, x: u32, y: u32, c: u8) -> u8;

    fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0 || self.channels() == 0
    }
}

impl PixelGrid for Frame {
    fn width(&self) -> u32 {
        Frame::width(self)
    }

    fn height(&self) -> u32 {
        Frame::height(self)
    }

    fn channels(&self) -> u8 {
        Frame::channels(self)
    }

    fn sample(&self, x: u32, y: u32, c: u8) -> u8 {
        let ch = Frame::channels(self) as usize;
        let idx = (y as usize * Frame::width(self) as usize + x as usize) * ch + c as usize;
        self.as_bytes()[idx]
    }
}

impl PixelGrid for RgbImage {
    fn width(&self) -> u32 {
        self.dimensions().0
    }

    fn height(&self) -> u32 {
        self.dimensions().1
    }

    fn channels(&self) -> u8 {
        3
    }

    fn sample(&self, x: u32, y: u32, c: u8) -> u8 {
        self.get_pixel(x, y).0[c as usize]
    }
}

impl PixelGrid for GrayImage {
    fn width(&self) -> u32 {
        self.dimensions().0
    }

    fn height(&self) -> u32 {
        self.dimensions().1
    }

    fn channels(&self) -> u8 {
        1
    }

    fn sample(&self, x: u32, y: u32, _c: u8) -> u8 {
        self.get_pixel(x, y).0[0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_and_image_agree() {
        let img = RgbImage::from_fn(4, 3, |x, y| image::Rgb([x as u8, y as u8, (x + y) as u8]));
        let frame = Frame::from_rgb_image(img.clone());
        for y in 0..3 {
            for x in 0..4 {
                for c in 0..3 {
                    assert_eq!(
                        PixelGrid::sample(&frame, x, y, c),
                        PixelGrid::sample(&img, x, y, c)
                    );
                }
            }
        }
    }

    #[test]
    fn empty_grid() {
        let frame = Frame::new(0, 0, 3, vec![]).unwrap();
        assert!(PixelGrid::is_empty(&frame));
        assert!(!PixelGrid::is_empty(&GrayImage::new(1, 1)));
    }
}
