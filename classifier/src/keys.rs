use std::path::{Path, PathBuf};

use crate::classifier::Category;

/// File name for a classified sample, e.g. "frame_0042.jpg".
pub fn sample_file_name(index: u64) -> String {
    format!("frame_{index:04}.jpg")
}

/// Directory a category's samples are written to.
pub fn bucket_dir(base: &Path, category: Category) -> PathBuf {
    base.join(category.bucket())
}

/// Full path for a classified sample under `base`.
/// e.g. "output_frames/blurry/frame_0007.jpg"
pub fn sample_path(base: &Path, category: Category, index: u64) -> PathBuf {
    bucket_dir(base, category).join(sample_file_name(index))
}
