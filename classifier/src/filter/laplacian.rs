use super::luma::LumaGrid;

/// Variance of the 4-neighbour Laplacian over a luminance plane.
///
/// Kernel:
/// ```text
/// [ 0  1  0 ]
/// [ 1 -4  1 ]
/// [ 0  1  0 ]
/// ```
///
/// The response is taken at every pixel. Out-of-range neighbours are
/// mirrored without repeating the edge sample (`dcb|abcd|cba`). The result
/// is the population variance of the responses; a sharp frame has large
/// responses concentrated on edges, a blurred one uniformly small ones.
pub fn laplacian_variance(luma: &LumaGrid) -> f64 {
    let (w, h) = (luma.width() as i64, luma.height() as i64);
    if w == 0 || h == 0 {
        return 0.0;
    }

    let at = |x: i64, y: i64| luma.get(reflect101(x, w) as u32, reflect101(y, h) as u32) as i32;

    let mut responses = Vec::with_capacity((w * h) as usize);
    for y in 0..h {
        for x in 0..w {
            let lap = at(x, y - 1) + at(x, y + 1) + at(x - 1, y) + at(x + 1, y) - 4 * at(x, y);
            responses.push(lap);
        }
    }

    let n = responses.len() as f64;
    let mean = responses.iter().map(|&v| v as f64).sum::<f64>() / n;
    responses
        .iter()
        .map(|&v| (v as f64 - mean).powi(2))
        .sum::<f64>()
        / n
}

/// Mirror an index into `0..n` without repeating the border sample.
fn reflect101(i: i64, n: i64) -> i64 {
    if n == 1 {
        0
    } else if i < 0 {
        -i
    } else if i >= n {
        2 * n - 2 - i
    } else {
        i
    }
}
