use frame_triage_common::frame::{Frame, TimestampedFrame};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::{CaptureError, CaptureEvent, CaptureSource};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];

/// Replays still images from a directory in file-name order, then ends.
pub struct DirectorySource {
    files: VecDeque<PathBuf>,
    seq: u64,
}

impl DirectorySource {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, CaptureError> {
        let dir = dir.as_ref();
        let io_err = |source| CaptureError::Io {
            path: dir.to_path_buf(),
            source,
        };

        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if path.is_file() && is_image(&path) {
                files.push(path);
            }
        }
        files.sort();

        info!(dir = %dir.display(), files = files.len(), "opened image directory");
        Ok(Self {
            files: files.into(),
            seq: 0,
        })
    }

    /// Files not yet replayed.
    pub fn remaining(&self) -> usize {
        self.files.len()
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

impl CaptureSource for DirectorySource {
    async fn next_frame(&mut self) -> Result<CaptureEvent, CaptureError> {
        let Some(path) = self.files.pop_front() else {
            return Ok(CaptureEvent::EndOfStream);
        };
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|source| CaptureError::Io {
                path: path.clone(),
                source,
            })?;

        self.seq += 1;
        debug!(seq = self.seq, path = %path.display(), "read frame from disk");
        let frame = Frame::decode(&bytes)?;
        Ok(CaptureEvent::Frame(TimestampedFrame::now(frame, self.seq)))
    }

    fn name(&self) -> &str {
        "directory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::encoded_image;
    use image::ImageFormat;

    #[tokio::test]
    async fn replays_images_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.png"), encoded_image(ImageFormat::Png, 2, 2)).unwrap();
        std::fs::write(dir.path().join("a.JPG"), encoded_image(ImageFormat::Jpeg, 3, 3)).unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let mut source = DirectorySource::open(dir.path()).unwrap();
        assert_eq!(source.remaining(), 2);

        let CaptureEvent::Frame(first) = source.next_frame().await.unwrap() else {
            panic!("expected a frame");
        };
        assert_eq!(first.frame.width(), 3);
        let CaptureEvent::Frame(second) = source.next_frame().await.unwrap() else {
            panic!("expected a frame");
        };
        assert_eq!(second.frame.width(), 2);
        assert_eq!(second.seq, 2);

        assert!(matches!(
            source.next_frame().await.unwrap(),
            CaptureEvent::EndOfStream
        ));
    }

    #[tokio::test]
    async fn corrupt_file_is_skipped_with_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("0.jpg"), b"garbage").unwrap();
        std::fs::write(dir.path().join("1.png"), encoded_image(ImageFormat::Png, 2, 2)).unwrap();

        let mut source = DirectorySource::open(dir.path()).unwrap();
        assert!(matches!(
            source.next_frame().await,
            Err(CaptureError::Decode(_))
        ));
        assert!(matches!(
            source.next_frame().await.unwrap(),
            CaptureEvent::Frame(_)
        ));
    }
}
