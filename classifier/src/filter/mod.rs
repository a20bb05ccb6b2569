//! Pure frame-quality measurements over any [`PixelGrid`].
//!
//! [`PixelGrid`]: frame_triage_common::grid::PixelGrid

pub mod diff;
pub mod laplacian;
pub mod luma;

pub use diff::mean_abs_diff;
pub use laplacian::laplacian_variance;
pub use luma::{luminance, LumaGrid};
