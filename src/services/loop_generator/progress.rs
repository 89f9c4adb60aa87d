use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Pipeline stage of one generation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "stage", content = "reason")]
pub enum GenerationStage {
    GeneratingWaypoints,
    FetchingRoutes,
    EvaluatingShapes,
    ScoringAttributes,
    Ranked,
    Failed(String),
}

impl fmt::Display for GenerationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationStage::GeneratingWaypoints => write!(f, "Planning loop shapes"),
            GenerationStage::FetchingRoutes => write!(f, "Fetching routes"),
            GenerationStage::EvaluatingShapes => write!(f, "Checking loop shapes"),
            GenerationStage::ScoringAttributes => write!(f, "Scoring roads"),
            GenerationStage::Ranked => write!(f, "Done"),
            GenerationStage::Failed(reason) => write!(f, "Failed: {}", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Progress {
    pub stage: GenerationStage,
    pub label: String,
    /// In [0, 1], never decreases within a run
    pub fraction: f32,
}

/// Optional, non-blocking progress stream.
///
/// Sends never wait and a dropped receiver is ignored, so reporting can
/// never stall or fail a run.
#[derive(Debug, Default)]
pub struct ProgressReporter {
    sender: Option<UnboundedSender<Progress>>,
    /// Bits of the highest fraction sent so far
    high_water: AtomicU32,
}

impl ProgressReporter {
    pub fn new(sender: UnboundedSender<Progress>) -> Self {
        ProgressReporter {
            sender: Some(sender),
            high_water: AtomicU32::new(0),
        }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn channel() -> (Self, UnboundedReceiver<Progress>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn report(&self, stage: GenerationStage, label: impl Into<String>, fraction: f32) {
        let Some(sender) = &self.sender else {
            return;
        };

        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        // Non-negative floats order the same as their bit patterns
        let previous = self
            .high_water
            .fetch_max(fraction.to_bits(), Ordering::AcqRel);
        let fraction = fraction.max(f32::from_bits(previous));

        let _ = sender.send(Progress {
            stage,
            label: label.into(),
            fraction,
        });
    }

    pub fn stage(&self, stage: GenerationStage, fraction: f32) {
        let label = stage.to_string();
        self.report(stage, label, fraction);
    }
}
