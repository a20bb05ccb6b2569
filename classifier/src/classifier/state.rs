use frame_triage_common::frame::Frame;

/// Whether a similarity baseline exists yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No frame has been accepted; the similarity test is skipped.
    NoBaseline,
    /// At least one frame has been accepted. Never reverts.
    HasBaseline,
}

/// State the classifier carries from one sample to the next.
#[derive(Debug, Default)]
pub struct ClassifierState {
    /// Owned copy of the most recent valid frame.
    last_accepted: Option<Frame>,
    /// Index handed to the next classified sample.
    sample_index: u64,
}

impl ClassifierState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_accepted(&self) -> Option<&Frame> {
        self.last_accepted.as_ref()
    }

    pub fn sample_index(&self) -> u64 {
        self.sample_index
    }

    pub fn phase(&self) -> Phase {
        if self.last_accepted.is_some() {
            Phase::HasBaseline
        } else {
            Phase::NoBaseline
        }
    }

    pub(super) fn accept(&mut self, frame: &Frame) {
        self.last_accepted = Some(frame.clone());
    }

    pub(super) fn next_index(&mut self) -> u64 {
        let index = self.sample_index;
        self.sample_index += 1;
        index
    }
}
