use frame_triage_common::grid::PixelGrid;

/// Mean absolute per-sample difference between two grids, over every
/// channel. Returns `None` when the grids differ in shape or are empty.
pub fn mean_abs_diff<A, B>(a: &A, b: &B) -> Option<f64>
where
    A: PixelGrid + ?Sized,
    B: PixelGrid + ?Sized,
{
    let shape = (a.width(), a.height(), a.channels());
    if shape != (b.width(), b.height(), b.channels()) || a.is_empty() {
        return None;
    }

    let (w, h, ch) = shape;
    let mut total: u64 = 0;
    for y in 0..h {
        for x in 0..w {
            for c in 0..ch {
                total += a.sample(x, y, c).abs_diff(b.sample(x, y, c)) as u64;
            }
        }
    }
    let count = w as u64 * h as u64 * ch as u64;
    Some(total as f64 / count as f64)
}
