use image::{DynamicImage, GrayImage, ImageBuffer, ImageReader, LumaA, RgbImage, Rgba};
use std::io::Cursor;

/// Largest channel depth a frame may carry (RGBA).
pub const MAX_CHANNELS: u8 = 4;

/// An immutable grid of 8-bit pixel samples.
///
/// Samples are interleaved row-major: channel `c` of pixel `(x, y)` lives at
/// `(y * width + x) * channels + c`. Three-channel frames are RGB, four-channel
/// frames RGBA, one- and two-channel frames are gray (with alpha).
///
/// A zero-width or zero-height frame is representable so that capture layers
/// can hand over whatever they decoded; the classifier rejects it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    channels: u8,
    data: Vec<u8>,
}

impl Frame {
    /// Wrap an interleaved sample buffer. The buffer length must match the
    /// declared geometry exactly.
    pub fn new(width: u32, height: u32, channels: u8, data: Vec<u8>) -> Result<Self, FrameError> {
        if channels == 0 || channels > MAX_CHANNELS {
            return Err(FrameError::UnsupportedChannels(channels));
        }
        let expected = width as usize * height as usize * channels as usize;
        if data.len() != expected {
            return Err(FrameError::BufferSize {
                got: data.len(),
                expected,
            });
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    /// A frame with every sample set to `value`.
    pub fn filled(width: u32, height: u32, channels: u8, value: u8) -> Result<Self, FrameError> {
        let len = width as usize * height as usize * channels as usize;
        Self::new(width, height, channels, vec![value; len])
    }

    pub fn from_rgb_image(img: RgbImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            channels: 3,
            data: img.into_raw(),
        }
    }

    pub fn from_gray_image(img: GrayImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            channels: 1,
            data: img.into_raw(),
        }
    }

    /// Convert a decoded image. Gray images stay single-channel; everything
    /// else is normalized to 8-bit RGB.
    pub fn from_dynamic(img: DynamicImage) -> Self {
        match img {
            DynamicImage::ImageLuma8(gray) => Self::from_gray_image(gray),
            other => Self::from_rgb_image(other.to_rgb8()),
        }
    }

    /// Decode an encoded still image (JPEG, PNG, BMP), sniffing the format.
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        let img = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(FrameError::Io)?
            .decode()
            .map_err(|e| FrameError::Decode(e.to_string()))?;
        Ok(Self::from_dynamic(img))
    }

    /// View the samples as an `image` buffer for encoding.
    pub fn to_dynamic(&self) -> Result<DynamicImage, FrameError> {
        let data = self.data.clone();
        let (w, h) = (self.width, self.height);
        let img = match self.channels {
            1 => GrayImage::from_raw(w, h, data).map(DynamicImage::ImageLuma8),
            2 => ImageBuffer::<LumaA<u8>, _>::from_raw(w, h, data).map(DynamicImage::ImageLumaA8),
            3 => RgbImage::from_raw(w, h, data).map(DynamicImage::ImageRgb8),
            _ => ImageBuffer::<Rgba<u8>, _>::from_raw(w, h, data).map(DynamicImage::ImageRgba8),
        };
        img.ok_or(FrameError::BufferSize {
            got: self.data.len(),
            expected: self.sample_count(),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Total number of samples (pixels times channels).
    pub fn sample_count(&self) -> usize {
        self.width as usize * self.height as usize * self.channels as usize
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// True when both frames have the same width, height and channel depth.
    pub fn same_shape(&self, other: &Frame) -> bool {
        self.width == other.width && self.height == other.height && self.channels == other.channels
    }
}

/// A captured frame with its capture metadata.
#[derive(Debug, Clone)]
pub struct TimestampedFrame {
    pub frame: Frame,
    /// Unix milliseconds at which the capture layer produced the frame.
    pub captured_at_ms: i64,
    /// Per-source sequence number.
    pub seq: u64,
}

impl TimestampedFrame {
    pub fn new(frame: Frame, captured_at_ms: i64, seq: u64) -> Self {
        Self {
            frame,
            captured_at_ms,
            seq,
        }
    }

    /// Stamp a frame with the current wall-clock time.
    pub fn now(frame: Frame, seq: u64) -> Self {
        Self::new(frame, chrono::Utc::now().timestamp_millis(), seq)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("unsupported channel count {0}, expected 1..=4")]
    UnsupportedChannels(u8),
    #[error("frame buffer has {got} samples, geometry requires {expected}")]
    BufferSize { got: usize, expected: usize },
    #[error("failed to decode image: {0}")]
    Decode(String),
    #[error("failed to read image: {0}")]
    Io(std::io::Error),
}
