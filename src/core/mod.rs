pub mod descriptor;
pub mod detection;
pub mod evaluation;
pub mod expression;
pub mod guidance;
pub mod hold_still;
pub mod position;
pub mod quality;

pub use descriptor::Descriptor;
pub use detection::{DetectionSample, Expression, ExpressionKind, FaceBox, FrameSize, Point};
pub use evaluation::{evaluate_tick, is_good_tick, TickEvaluation};
pub use expression::{ExpressionGate, ExpressionVerdict};
pub use guidance::Guidance;
pub use hold_still::{CapturedDescriptor, HoldOutcome, HoldStillAccumulator, TickSignal};
pub use position::{PositionAssessment, PositionValidator};
pub use quality::{CaptureQuality, QualityGate, QualityMetrics};
