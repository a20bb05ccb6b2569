use frame_triage_common::grid::PixelGrid;

// BT.601 weights in 14-bit fixed point; they sum to 1 << 14.
const R_WEIGHT: u32 = 4899;
const G_WEIGHT: u32 = 9617;
const B_WEIGHT: u32 = 1868;
const SHIFT: u32 = 14;

/// Single-channel luminance plane, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LumaGrid {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl LumaGrid {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn get(&self, x: u32, y: u32) -> u8 {
        self.data[y as usize * self.width as usize + x as usize]
    }

    /// Arithmetic mean of all luminance samples; zero for an empty plane.
    pub fn mean(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        let sum: u64 = self.data.iter().map(|&v| v as u64).sum();
        sum as f64 / self.data.len() as f64
    }
}

/// Convert a pixel grid to luminance.
///
/// Three- and four-channel grids are treated as RGB(A) and weighted with
/// `Y = 0.299 R + 0.587 G + 0.114 B`, rounded to the nearest integer. One-
/// and two-channel grids already carry luminance in their first channel.
/// Alpha is ignored.
pub fn luminance<G: PixelGrid + ?Sized>(grid: &G) -> LumaGrid {
    let (width, height) = (grid.width(), grid.height());
    let mut data = Vec::with_capacity(width as usize * height as usize);
    let color = grid.channels() >= 3;

    for y in 0..height {
        for x in 0..width {
            let y_val = if color {
                rgb_to_luma(grid.sample(x, y, 0), grid.sample(x, y, 1), grid.sample(x, y, 2))
            } else {
                grid.sample(x, y, 0)
            };
            data.push(y_val);
        }
    }

    LumaGrid {
        width,
        height,
        data,
    }
}

fn rgb_to_luma(r: u8, g: u8, b: u8) -> u8 {
    let weighted = r as u32 * R_WEIGHT + g as u32 * G_WEIGHT + b as u32 * B_WEIGHT;
    ((weighted + (1 << (SHIFT - 1))) >> SHIFT) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use frame_triage_common::frame::Frame;

    #[test]
    fn neutral_gray_keeps_its_value() {
        for v in [0u8, 1, 40, 127, 128, 254, 255] {
            assert_eq!(rgb_to_luma(v, v, v), v);
        }
    }

    #[test]
    fn channel_weights() {
        assert_eq!(rgb_to_luma(255, 0, 0), 76);
        assert_eq!(rgb_to_luma(0, 255, 0), 150);
        assert_eq!(rgb_to_luma(0, 0, 255), 29);
    }

    #[test]
    fn mean_of_uniform_frame() {
        let frame = Frame::filled(8, 6, 3, 40).unwrap();
        assert_eq!(luminance(&frame).mean(), 40.0);
    }

    #[test]
    fn gray_frame_passes_through() {
        let frame = Frame::new(2, 2, 1, vec![0, 10, 20, 30]).unwrap();
        let luma = luminance(&frame);
        assert_eq!(luma.as_slice(), &[0, 10, 20, 30]);
        assert_eq!(luma.mean(), 15.0);
    }

    #[test]
    fn alpha_is_ignored() {
        let frame = Frame::new(1, 1, 4, vec![200, 200, 200, 0]).unwrap();
        assert_eq!(luminance(&frame).get(0, 0), 200);
    }

    #[test]
    fn empty_plane_has_zero_mean() {
        let frame = Frame::new(0, 3, 3, vec![]).unwrap();
        assert_eq!(luminance(&frame).mean(), 0.0);
    }
}
