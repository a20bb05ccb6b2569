//! Frame-quality classification.
//!
//! Each sampled frame goes through three tests in a fixed order, and the
//! first one that fires decides the category:
//!
//! 1. darkness: mean luminance below the darkness limit
//! 2. blur: Laplacian variance of the luminance below the blur limit
//! 3. similarity: mean absolute difference from the last accepted frame
//!    below the similarity limit (skipped until a frame has been accepted)
//!
//! A frame that passes all three is valid and becomes the new baseline.
//! Darkness is checked first because an under-exposed frame makes both the
//! blur and the similarity measurements unreliable. All comparisons are
//! strict: a measurement equal to its limit passes.

mod state;

pub use state::{ClassifierState, Phase};

use std::fmt;

use frame_triage_common::config::QualityThresholds;
use frame_triage_common::frame::Frame;
use frame_triage_common::grid::PixelGrid;
use tracing::debug;

use crate::filter::{laplacian_variance, luminance, mean_abs_diff};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Valid,
    TooDark,
    Blurry,
    Similar,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Valid,
        Category::TooDark,
        Category::Blurry,
        Category::Similar,
    ];

    /// Name of the output bucket this category is routed to.
    pub fn bucket(self) -> &'static str {
        match self {
            Category::Valid => "valid",
            Category::TooDark => "dark",
            Category::Blurry => "blurry",
            Category::Similar => "similar",
        }
    }

    pub fn is_valid(self) -> bool {
        self == Category::Valid
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.bucket())
    }
}

/// Numbers behind a decision. Tests that never ran are `None`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurements {
    pub luma_mean: f64,
    pub laplacian_variance: Option<f64>,
    pub mean_difference: Option<f64>,
}

/// A classified frame, ready for the sink.
#[derive(Debug, Clone)]
pub struct ClassifiedSample {
    pub frame: Frame,
    pub category: Category,
    pub index: u64,
    pub measurements: Measurements,
}

/// Width, height and channel depth of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shape {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
}

impl Shape {
    fn of(frame: &Frame) -> Self {
        Self {
            width: frame.width(),
            height: frame.height(),
            channels: frame.channels(),
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.width, self.height, self.channels)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidFrame {
    #[error("invalid frame: zero-sized ({0})")]
    Empty(Shape),
    #[error("invalid frame: shape {got} does not match baseline {baseline}")]
    ShapeMismatch { got: Shape, baseline: Shape },
}

/// Run the ordered quality tests against `frame`.
///
/// Pure: works on any [`PixelGrid`] and touches no state. `baseline` is the
/// last accepted frame, if any; it must have the same shape as `frame`.
pub fn evaluate<G>(frame: &G, baseline: Option<&G>, thresholds: &QualityThresholds) -> (Category, Measurements)
where
    G: PixelGrid + ?Sized,
{
    let luma = luminance(frame);
    let mut m = Measurements {
        luma_mean: luma.mean(),
        laplacian_variance: None,
        mean_difference: None,
    };
    if m.luma_mean < thresholds.darkness {
        return (Category::TooDark, m);
    }

    let variance = laplacian_variance(&luma);
    m.laplacian_variance = Some(variance);
    if variance < thresholds.blur {
        return (Category::Blurry, m);
    }

    if let Some(base) = baseline {
        m.mean_difference = mean_abs_diff(frame, base);
        if m.mean_difference.is_some_and(|d| d < thresholds.similarity) {
            return (Category::Similar, m);
        }
    }

    (Category::Valid, m)
}

/// Stateful classifier for a single stream.
///
/// Holds the thresholds and the [`ClassifierState`]. The baseline frame is
/// replaced only when a frame is classified valid.
#[derive(Debug)]
pub struct Classifier {
    thresholds: QualityThresholds,
    state: ClassifierState,
}

impl Classifier {
    pub fn new(thresholds: QualityThresholds) -> Self {
        Self {
            thresholds,
            state: ClassifierState::new(),
        }
    }

    pub fn thresholds(&self) -> &QualityThresholds {
        &self.thresholds
    }

    pub fn state(&self) -> &ClassifierState {
        &self.state
    }

    /// Classify one sampled frame.
    ///
    /// On error the state is untouched and no sample index is consumed.
    pub fn classify(&mut self, frame: Frame) -> Result<ClassifiedSample, InvalidFrame> {
        self.check_shape(&frame)?;

        let (category, measurements) =
            evaluate(&frame, self.state.last_accepted(), &self.thresholds);
        if category.is_valid() {
            self.state.accept(&frame);
        }
        let index = self.state.next_index();

        debug!(
            index,
            %category,
            luma_mean = format!("{:.2}", measurements.luma_mean),
            laplacian_variance = ?measurements.laplacian_variance,
            mean_difference = ?measurements.mean_difference,
            "frame classified"
        );

        Ok(ClassifiedSample {
            frame,
            category,
            index,
            measurements,
        })
    }

    fn check_shape(&self, frame: &Frame) -> Result<(), InvalidFrame> {
        if frame.is_empty() {
            return Err(InvalidFrame::Empty(Shape::of(frame)));
        }
        match self.state.last_accepted() {
            Some(base) if !base.same_shape(frame) => Err(InvalidFrame::ShapeMismatch {
                got: Shape::of(frame),
                baseline: Shape::of(base),
            }),
            _ => Ok(()),
        }
    }
}
