use frame_triage_common::config::OutputConfig;
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::classifier::{Category, ClassifiedSample};
use crate::keys::{bucket_dir, sample_path};

/// Destination for classified samples.
pub trait SampleSink {
    /// Persist a sample into its category's bucket. Returns where it was
    /// written, or `None` if this sink does not keep that category.
    fn store(&mut self, sample: &ClassifiedSample) -> Result<Option<PathBuf>, StorageError>;

    /// Whether samples of `category` are kept at all.
    fn will_persist(&self, _category: Category) -> bool {
        true
    }

    /// Called once when the run loop drains.
    fn flush(&mut self) -> Result<(), StorageError> {
        Ok(())
    }
}

/// Writes samples as JPEG files into one directory per bucket.
pub struct DirectorySink {
    base: PathBuf,
    persist_rejected: bool,
    jpeg_quality: u8,
    written: u64,
}

impl DirectorySink {
    pub fn new(config: &OutputConfig) -> Self {
        Self {
            base: config.path.clone(),
            persist_rejected: config.persist_rejected,
            jpeg_quality: config.jpeg_quality,
            written: 0,
        }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Create the bucket directories that will be written to.
    pub fn ensure_buckets(&self) -> Result<(), StorageError> {
        for category in Category::ALL {
            if !self.will_persist(category) {
                continue;
            }
            let dir = bucket_dir(&self.base, category);
            std::fs::create_dir_all(&dir).map_err(|source| StorageError::CreateDir {
                path: dir.clone(),
                source,
            })?;
            debug!(dir = %dir.display(), "bucket ready");
        }
        info!(base = %self.base.display(), persist_rejected = self.persist_rejected, "output buckets ready");
        Ok(())
    }

    fn write_jpeg(&self, path: &Path, sample: &ClassifiedSample) -> Result<(), StorageError> {
        let img = sample
            .frame
            .to_dynamic()
            .map_err(|e| StorageError::Encode(e.to_string()))?;
        // JPEG has no alpha channel.
        let img = match img {
            DynamicImage::ImageLumaA8(_) => DynamicImage::ImageLuma8(img.to_luma8()),
            DynamicImage::ImageRgba8(_) => DynamicImage::ImageRgb8(img.to_rgb8()),
            other => other,
        };

        let write_err = |source| StorageError::Write {
            path: path.to_path_buf(),
            source,
        };
        let file = File::create(path).map_err(write_err)?;
        let mut writer = BufWriter::new(file);
        let encoder = JpegEncoder::new_with_quality(&mut writer, self.jpeg_quality);
        img.write_with_encoder(encoder)
            .map_err(|e| StorageError::Encode(e.to_string()))?;
        writer.flush().map_err(write_err)?;
        Ok(())
    }
}

impl SampleSink for DirectorySink {
    fn store(&mut self, sample: &ClassifiedSample) -> Result<Option<PathBuf>, StorageError> {
        if !self.will_persist(sample.category) {
            return Ok(None);
        }
        let path = sample_path(&self.base, sample.category, sample.index);
        self.write_jpeg(&path, sample)?;
        self.written += 1;
        debug!(path = %path.display(), index = sample.index, "stored sample");
        Ok(Some(path))
    }

    fn will_persist(&self, category: Category) -> bool {
        self.persist_rejected || category.is_valid()
    }

    fn flush(&mut self) -> Result<(), StorageError> {
        info!(written = self.written, base = %self.base.display(), "output sink closed");
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("failed to create bucket directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to encode sample: {0}")]
    Encode(String),
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Measurements;
    use frame_triage_common::frame::Frame;

    fn sample(category: Category, index: u64, frame: Frame) -> ClassifiedSample {
        ClassifiedSample {
            frame,
            category,
            index,
            measurements: Measurements {
                luma_mean: 0.0,
                laplacian_variance: None,
                mean_difference: None,
            },
        }
    }

    fn config(dir: &Path, persist_rejected: bool) -> OutputConfig {
        OutputConfig {
            path: dir.to_path_buf(),
            persist_rejected,
            ..OutputConfig::default()
        }
    }

    #[test]
    fn creates_all_buckets() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectorySink::new(&config(dir.path(), true));
        sink.ensure_buckets().unwrap();
        for name in ["valid", "dark", "blurry", "similar"] {
            assert!(dir.path().join(name).is_dir(), "{name} bucket missing");
        }
    }

    #[test]
    fn writes_decodable_jpeg_into_bucket() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = DirectorySink::new(&config(dir.path(), true));
        sink.ensure_buckets().unwrap();

        let frame = Frame::filled(6, 4, 3, 90).unwrap();
        let path = sink
            .store(&sample(Category::Blurry, 3, frame))
            .unwrap()
            .unwrap();
        assert_eq!(path, dir.path().join("blurry").join("frame_0003.jpg"));

        let decoded = Frame::decode(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (6, 4));
    }

    #[test]
    fn alpha_frames_are_flattened() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = DirectorySink::new(&config(dir.path(), true));
        sink.ensure_buckets().unwrap();

        let frame = Frame::filled(2, 2, 4, 200).unwrap();
        assert!(sink.store(&sample(Category::Valid, 0, frame)).unwrap().is_some());
    }

    #[test]
    fn valid_only_mode_skips_rejects() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = DirectorySink::new(&config(dir.path(), false));
        sink.ensure_buckets().unwrap();
        assert!(!dir.path().join("dark").exists());

        let frame = Frame::filled(2, 2, 3, 10).unwrap();
        assert_eq!(sink.store(&sample(Category::TooDark, 0, frame.clone())).unwrap(), None);
        assert!(sink.store(&sample(Category::Valid, 1, frame)).unwrap().is_some());
        assert!(!sink.will_persist(Category::Similar));
    }

    #[test]
    fn missing_bucket_is_a_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = DirectorySink::new(&config(&dir.path().join("never-created"), true));
        let frame = Frame::filled(2, 2, 3, 10).unwrap();
        assert!(matches!(
            sink.store(&sample(Category::Valid, 0, frame)),
            Err(StorageError::Write { .. })
        ));
    }
}
