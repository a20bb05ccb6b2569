//! Frame acquisition for the triage pipeline.
//!
//! Every source implements [`CaptureSource`]: each call yields one decoded
//! frame, reports that the source is exhausted, or fails with a
//! [`CaptureError`] the caller is expected to retry.

pub mod directory;
pub mod mjpeg;
pub mod polling;

use std::path::PathBuf;
use std::time::Duration;

use frame_triage_common::config::{SourceConfig, SourceMode};
use frame_triage_common::frame::{FrameError, TimestampedFrame};

pub use directory::DirectorySource;
pub use mjpeg::{MjpegParser, MjpegSource};
pub use polling::PollingSource;

/// Result of a successful capture call.
#[derive(Debug)]
pub enum CaptureEvent {
    Frame(TimestampedFrame),
    /// The source has no more frames. Not an error.
    EndOfStream,
}

/// Async frame source.
#[allow(async_fn_in_trait)]
pub trait CaptureSource {
    /// Pull the next frame. Errors are transient: the same source may be
    /// called again and is expected to recover (reconnect, skip a file).
    async fn next_frame(&mut self) -> Result<CaptureEvent, CaptureError>;

    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "unnamed"
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("HTTP connection failed: {0}")]
    Connect(reqwest::Error),
    #[error("HTTP status {0}")]
    HttpStatus(u16),
    #[error("HTTP stream error: {0}")]
    Stream(reqwest::Error),
    #[error("stream closed by peer")]
    StreamClosed,
    #[error("failed to decode frame: {0}")]
    Decode(#[from] FrameError),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Source selected by configuration.
pub enum AnySource {
    Mjpeg(MjpegSource),
    Polling(PollingSource),
    Directory(DirectorySource),
}

impl AnySource {
    pub fn open(config: &SourceConfig) -> Result<Self, CaptureError> {
        let timeout = Duration::from_secs(config.connect_timeout_secs);
        Ok(match config.mode {
            SourceMode::Mjpeg => Self::Mjpeg(MjpegSource::new(&config.url, timeout)?),
            SourceMode::Polling => {
                let period = Duration::from_secs_f64(1.0 / config.poll_fps);
                Self::Polling(PollingSource::new(&config.url, period, timeout)?)
            }
            SourceMode::Directory => Self::Directory(DirectorySource::open(&config.url)?),
        })
    }
}

impl CaptureSource for AnySource {
    async fn next_frame(&mut self) -> Result<CaptureEvent, CaptureError> {
        match self {
            Self::Mjpeg(s) => s.next_frame().await,
            Self::Polling(s) => s.next_frame().await,
            Self::Directory(s) => s.next_frame().await,
        }
    }

    fn name(&self) -> &str {
        match self {
            Self::Mjpeg(s) => s.name(),
            Self::Polling(s) => s.name(),
            Self::Directory(s) => s.name(),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_util {
    use image::{ImageFormat, RgbImage};
    use std::io::Cursor;

    /// Encode a small gradient image in the given format.
    pub fn encoded_image(format: ImageFormat, width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x * 40) as u8, (y * 40) as u8, 128])
        });
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, format).unwrap();
        buf.into_inner()
    }
}
