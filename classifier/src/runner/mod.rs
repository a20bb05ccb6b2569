//! The capture → sample → classify → store loop.

mod backoff;
mod state;

pub use backoff::Backoff;
pub use state::{RunState, RunStats, StopReason};

use std::time::{Duration, Instant};

use frame_triage_capture::{CaptureError, CaptureEvent, CaptureSource};
use frame_triage_common::config::{QualityThresholds, RetryConfig};
use frame_triage_common::frame::TimestampedFrame;
use tokio::sync::watch;
use tracing::{error, info, trace, warn};

use crate::classifier::{Category, Classifier};
use crate::sampler::Sampler;
use crate::storage::SampleSink;

/// Drives one capture source through the sampler and classifier into a
/// sink until the source ends, the shutdown signal fires, or the capture
/// failure budget runs out.
pub struct RunLoop<C, S> {
    source: C,
    sink: S,
    sampler: Sampler,
    classifier: Classifier,
    backoff: Backoff,
    /// Zero means unbounded.
    max_consecutive_failures: u32,
    consecutive_failures: u32,
    state: RunState,
    stats: RunStats,
}

impl<C: CaptureSource, S: SampleSink> RunLoop<C, S> {
    pub fn new(source: C, sink: S, thresholds: QualityThresholds, retry: &RetryConfig) -> Self {
        Self {
            source,
            sink,
            sampler: Sampler::new(thresholds.interval_secs),
            classifier: Classifier::new(thresholds),
            backoff: Backoff::new(
                Duration::from_millis(retry.initial_backoff_ms),
                Duration::from_millis(retry.max_backoff_ms),
            ),
            max_consecutive_failures: retry.max_consecutive_failures,
            consecutive_failures: 0,
            state: RunState::Running,
            stats: RunStats::default(),
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Run until stopped. Setting the shutdown flag to `true` stops the
    /// loop at the next await point; the frame being classified, if any,
    /// is finished first.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> StopReason {
        self.state = RunState::Running;
        info!(source = self.source.name(), "run loop started");

        let reason = loop {
            if *shutdown.borrow() {
                break StopReason::Cancelled;
            }

            let next = tokio::select! {
                _ = cancelled(&mut shutdown) => None,
                result = self.source.next_frame() => Some(result),
            };

            match next {
                None => break StopReason::Cancelled,
                Some(Ok(CaptureEvent::Frame(frame))) => self.handle_frame(frame),
                Some(Ok(CaptureEvent::EndOfStream)) => {
                    info!("capture source reached end of stream");
                    break StopReason::EndOfStream;
                }
                Some(Err(e)) => {
                    if let Some(reason) = self.handle_capture_error(e, &mut shutdown).await {
                        break reason;
                    }
                }
            }
        };

        self.drain(reason);
        reason
    }

    fn handle_frame(&mut self, captured: TimestampedFrame) {
        self.stats.captured += 1;
        if self.consecutive_failures > 0 {
            info!(failures = self.consecutive_failures, "capture recovered");
            self.consecutive_failures = 0;
            self.backoff.reset();
        }

        if !self.sampler.try_sample(Instant::now()) {
            trace!(seq = captured.seq, "between sampling ticks, dropping frame");
            return;
        }
        self.stats.sampled += 1;

        let TimestampedFrame {
            frame,
            captured_at_ms,
            seq,
        } = captured;

        let sample = match self.classifier.classify(frame) {
            Ok(s) => s,
            Err(e) => {
                self.stats.invalid_frames += 1;
                warn!(error = %e, seq, "skipping invalid frame");
                return;
            }
        };
        self.stats.record(sample.category);

        let index = sample.index;
        let persisted = self.sink.will_persist(sample.category);
        let m = sample.measurements;
        match sample.category {
            Category::Valid => info!(index, seq, captured_at_ms, persisted, "frame is valid"),
            Category::TooDark => warn!(
                index,
                persisted,
                luma_mean = format!("{:.2}", m.luma_mean),
                "skipped: too dark"
            ),
            Category::Blurry => warn!(
                index,
                persisted,
                laplacian_variance = ?m.laplacian_variance,
                "skipped: blurry"
            ),
            Category::Similar => warn!(
                index,
                persisted,
                mean_difference = ?m.mean_difference,
                "skipped: similar to last valid frame"
            ),
        }

        if !persisted {
            return;
        }
        match self.sink.store(&sample) {
            Ok(Some(path)) => {
                self.stats.persisted += 1;
                info!(index, path = %path.display(), "saved");
            }
            Ok(None) => {}
            Err(e) => {
                self.stats.sink_errors += 1;
                error!(error = %e, index, category = %sample.category, "failed to store sample");
            }
        }
    }

    /// Count the failure and wait out the backoff. Returns a stop reason if
    /// the loop should end instead of retrying.
    async fn handle_capture_error(
        &mut self,
        err: CaptureError,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Option<StopReason> {
        self.stats.capture_errors += 1;
        self.consecutive_failures += 1;
        let failures = self.consecutive_failures;

        if self.max_consecutive_failures > 0 && failures >= self.max_consecutive_failures {
            error!(error = %err, failures, "capture failure budget exhausted, stopping");
            return Some(StopReason::CaptureFailures(failures));
        }

        let delay = self.backoff.next_delay();
        warn!(error = %err, failures, "capture failed, retrying in {:?}", delay);
        tokio::select! {
            _ = cancelled(shutdown) => Some(StopReason::Cancelled),
            _ = tokio::time::sleep(delay) => None,
        }
    }

    fn drain(&mut self, reason: StopReason) {
        self.state = RunState::Draining;
        info!(?reason, "run loop draining");
        if let Err(e) = self.sink.flush() {
            self.stats.sink_errors += 1;
            error!(error = %e, "failed to flush sink");
        }
        self.state = RunState::Stopped;

        let s = &self.stats;
        info!(
            captured = s.captured,
            sampled = s.sampled,
            valid = s.valid,
            too_dark = s.too_dark,
            blurry = s.blurry,
            similar = s.similar,
            persisted = s.persisted,
            invalid_frames = s.invalid_frames,
            capture_errors = s.capture_errors,
            "run loop stopped"
        );
    }
}

/// Resolves once the shutdown flag reads `true`. If the sender is dropped
/// first, nobody can cancel any more and this never resolves.
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
