use frame_triage_common::frame::{Frame, TimestampedFrame};
use std::time::Duration;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::debug;

use crate::{CaptureError, CaptureEvent, CaptureSource};

/// Fetches one still image per tick from an HTTP endpoint.
pub struct PollingSource {
    url: String,
    client: reqwest::Client,
    period: Duration,
    /// Created on first use; tokio timers need a running runtime.
    ticker: Option<Interval>,
    seq: u64,
}

impl PollingSource {
    pub fn new(url: &str, period: Duration, connect_timeout: Duration) -> Result<Self, CaptureError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(CaptureError::Connect)?;
        Ok(Self {
            url: url.to_owned(),
            client,
            period,
            ticker: None,
            seq: 0,
        })
    }
}

impl CaptureSource for PollingSource {
    async fn next_frame(&mut self) -> Result<CaptureEvent, CaptureError> {
        let period = self.period;
        let ticker = self.ticker.get_or_insert_with(|| {
            let mut t = tokio::time::interval(period);
            t.set_missed_tick_behavior(MissedTickBehavior::Delay);
            t
        });
        ticker.tick().await;

        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(CaptureError::Connect)?;
        if !resp.status().is_success() {
            return Err(CaptureError::HttpStatus(resp.status().as_u16()));
        }
        let body = resp.bytes().await.map_err(CaptureError::Stream)?;

        self.seq += 1;
        debug!(seq = self.seq, bytes = body.len(), "polled frame");
        let frame = Frame::decode(&body)?;
        Ok(CaptureEvent::Frame(TimestampedFrame::now(frame, self.seq)))
    }

    fn name(&self) -> &str {
        "polling"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::encoded_image;
    use image::ImageFormat;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve each canned response to one connection, in order.
    async fn serve(responses: Vec<Vec<u8>>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            for response in responses {
                let (mut sock, _) = listener.accept().await.unwrap();
                let mut req = [0u8; 1024];
                let _ = sock.read(&mut req).await.unwrap();
                sock.write_all(&response).await.unwrap();
                sock.shutdown().await.unwrap();
            }
        });
        format!("http://{addr}/frame")
    }

    fn http_response(status: &str, body: &[u8]) -> Vec<u8> {
        let mut out = format!(
            "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        )
        .into_bytes();
        out.extend_from_slice(body);
        out
    }

    #[tokio::test]
    async fn fetches_and_decodes_still() {
        let png = encoded_image(ImageFormat::Png, 5, 4);
        let url = serve(vec![http_response("200 OK", &png)]).await;
        let mut source =
            PollingSource::new(&url, Duration::from_millis(10), Duration::from_secs(2)).unwrap();

        let CaptureEvent::Frame(f) = source.next_frame().await.unwrap() else {
            panic!("expected a frame");
        };
        assert_eq!(f.seq, 1);
        assert_eq!((f.frame.width(), f.frame.height(), f.frame.channels()), (5, 4, 3));
    }

    #[tokio::test]
    async fn non_success_status_is_reported() {
        let url = serve(vec![http_response("503 Service Unavailable", b"")]).await;
        let mut source =
            PollingSource::new(&url, Duration::from_millis(10), Duration::from_secs(2)).unwrap();
        assert!(matches!(
            source.next_frame().await,
            Err(CaptureError::HttpStatus(503))
        ));
    }

    #[tokio::test]
    async fn undecodable_body_is_a_decode_error() {
        let url = serve(vec![http_response("200 OK", b"not an image")]).await;
        let mut source =
            PollingSource::new(&url, Duration::from_millis(10), Duration::from_secs(2)).unwrap();
        assert!(matches!(
            source.next_frame().await,
            Err(CaptureError::Decode(_))
        ));
    }
}
