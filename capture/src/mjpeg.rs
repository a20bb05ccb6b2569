use bytes::{Bytes, BytesMut};
use frame_triage_common::frame::{Frame, TimestampedFrame};
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::{CaptureError, CaptureEvent, CaptureSource};

const DEFAULT_BOUNDARY: &str = "frame";
const HEADER_END: &[u8] = b"\r\n\r\n";

/// Parse state for the MJPEG multipart stream.
enum ParseState {
    /// Looking for the boundary marker `--<boundary>\r\n`.
    SeekingBoundary,
    /// Found boundary, now looking for end of part headers `\r\n\r\n`.
    SeekingHeaderEnd,
    /// Collecting JPEG bytes until the next boundary.
    CollectingJpeg,
}

/// Incremental splitter for `multipart/x-mixed-replace` bodies.
///
/// Feed it network chunks with [`push`](Self::push) and drain complete
/// parts with [`next_part`](Self::next_part). A part is only emitted once
/// the boundary that terminates it has arrived.
pub struct MjpegParser {
    boundary: Vec<u8>,
    buffer: BytesMut,
    state: ParseState,
    /// Offset into `buffer` already scanned for the closing boundary.
    jpeg_start: usize,
}

impl MjpegParser {
    pub fn new() -> Self {
        Self::with_boundary(DEFAULT_BOUNDARY)
    }

    pub fn with_boundary(boundary: &str) -> Self {
        Self {
            boundary: format!("--{boundary}\r\n").into_bytes(),
            buffer: BytesMut::with_capacity(256 * 1024),
            state: ParseState::SeekingBoundary,
            jpeg_start: 0,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Return the next complete part body, or `None` if more data is needed.
    pub fn next_part(&mut self) -> Option<Vec<u8>> {
        let marker_len = self.boundary.len();
        loop {
            match self.state {
                ParseState::SeekingBoundary => {
                    if let Some(pos) = find_subsequence(&self.buffer, &self.boundary) {
                        let _ = self.buffer.split_to(pos + marker_len);
                        self.state = ParseState::SeekingHeaderEnd;
                    } else {
                        // Keep the tail in case the boundary spans chunks
                        if self.buffer.len() > marker_len {
                            let _ = self.buffer.split_to(self.buffer.len() - marker_len);
                        }
                        return None;
                    }
                }
                ParseState::SeekingHeaderEnd => {
                    let pos = find_subsequence(&self.buffer, HEADER_END)?;
                    let _ = self.buffer.split_to(pos + HEADER_END.len());
                    self.jpeg_start = 0;
                    self.state = ParseState::CollectingJpeg;
                }
                ParseState::CollectingJpeg => {
                    let Some(pos) = find_subsequence(&self.buffer[self.jpeg_start..], &self.boundary)
                    else {
                        self.jpeg_start = self.buffer.len().saturating_sub(marker_len);
                        return None;
                    };
                    let jpeg_end = self.jpeg_start + pos;
                    // Strip the CRLF that precedes the boundary
                    let end = if jpeg_end >= 2
                        && self.buffer[jpeg_end - 2] == b'\r'
                        && self.buffer[jpeg_end - 1] == b'\n'
                    {
                        jpeg_end - 2
                    } else {
                        jpeg_end
                    };
                    let part = self.buffer[..end].to_vec();
                    let _ = self.buffer.split_to(jpeg_end + marker_len);
                    self.state = ParseState::SeekingHeaderEnd;
                    if !part.is_empty() {
                        return Some(part);
                    }
                }
            }
        }
    }

    /// Drop buffered bytes, e.g. after a reconnect.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.state = ParseState::SeekingBoundary;
        self.jpeg_start = 0;
    }
}

impl Default for MjpegParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract the boundary name from a multipart `Content-Type` header value.
pub fn boundary_from_content_type(value: &str) -> Option<String> {
    value
        .split(';')
        .map(str::trim)
        .find_map(|param| param.strip_prefix("boundary="))
        .map(|b| b.trim_matches('"'))
        .map(|b| b.strip_prefix("--").unwrap_or(b))
        .filter(|b| !b.is_empty())
        .map(str::to_owned)
}

/// Live MJPEG-over-HTTP source. Connects lazily and reconnects on the call
/// after a dropped stream.
pub struct MjpegSource {
    url: String,
    client: reqwest::Client,
    stream: Option<BoxStream<'static, reqwest::Result<Bytes>>>,
    parser: MjpegParser,
    seq: u64,
}

impl MjpegSource {
    pub fn new(url: &str, connect_timeout: Duration) -> Result<Self, CaptureError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(CaptureError::Connect)?;
        Ok(Self {
            url: url.to_owned(),
            client,
            stream: None,
            parser: MjpegParser::new(),
            seq: 0,
        })
    }

    async fn connect(&mut self) -> Result<(), CaptureError> {
        info!(url = self.url, "connecting to MJPEG stream");
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(CaptureError::Connect)?;

        if !response.status().is_success() {
            return Err(CaptureError::HttpStatus(response.status().as_u16()));
        }

        let boundary = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(boundary_from_content_type)
            .unwrap_or_else(|| DEFAULT_BOUNDARY.to_owned());

        info!(status = %response.status(), boundary, "connected to MJPEG stream");
        self.parser = MjpegParser::with_boundary(&boundary);
        self.stream = Some(response.bytes_stream().boxed());
        Ok(())
    }

    fn disconnect(&mut self) {
        self.stream = None;
        self.parser.reset();
    }
}

impl CaptureSource for MjpegSource {
    async fn next_frame(&mut self) -> Result<CaptureEvent, CaptureError> {
        loop {
            if let Some(part) = self.parser.next_part() {
                self.seq += 1;
                debug!(seq = self.seq, bytes = part.len(), "MJPEG part received");
                let frame = Frame::decode(&part)?;
                return Ok(CaptureEvent::Frame(TimestampedFrame::now(frame, self.seq)));
            }

            let chunk = match self.stream.as_mut() {
                Some(stream) => stream.next().await,
                None => {
                    self.connect().await?;
                    continue;
                }
            };

            match chunk {
                Some(Ok(bytes)) => self.parser.push(&bytes),
                Some(Err(e)) => {
                    warn!(error = %e, "MJPEG stream error, dropping connection");
                    self.disconnect();
                    return Err(CaptureError::Stream(e));
                }
                None => {
                    self.disconnect();
                    return Err(CaptureError::StreamClosed);
                }
            }
        }
    }

    fn name(&self) -> &str {
        "mjpeg"
    }
}

/// Find the position of `needle` in `haystack`.
fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
