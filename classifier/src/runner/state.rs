use crate::classifier::Category;

/// Lifecycle of the run loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Pulling frames from the source.
    Running,
    /// No more frames are pulled; the sink is being flushed.
    Draining,
    Stopped,
}

/// Why the loop left `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EndOfStream,
    Cancelled,
    /// The consecutive capture failure budget ran out.
    CaptureFailures(u32),
}

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub captured: u64,
    pub sampled: u64,
    pub valid: u64,
    pub too_dark: u64,
    pub blurry: u64,
    pub similar: u64,
    pub persisted: u64,
    pub invalid_frames: u64,
    pub capture_errors: u64,
    pub sink_errors: u64,
}

impl RunStats {
    pub fn record(&mut self, category: Category) {
        match category {
            Category::Valid => self.valid += 1,
            Category::TooDark => self.too_dark += 1,
            Category::Blurry => self.blurry += 1,
            Category::Similar => self.similar += 1,
        }
    }

    pub fn classified(&self) -> u64 {
        self.valid + self.too_dark + self.blurry + self.similar
    }
}
