// Core modules
pub mod common;
pub mod core;
pub mod camera;
pub mod service;
pub mod storage;
pub mod workflow;
pub mod simulation;

// Re-export commonly used types
pub use common::{Config, DevMode, EnrollError, EnrollmentFailure, Result};
pub use crate::core::{
    evaluate_tick, is_good_tick, Descriptor, DetectionSample, ExpressionGate, FrameSize, Guidance,
    HoldStillAccumulator, PositionValidator, QualityGate,
};
pub use camera::{FrameAnalyzer, VideoSource};
pub use service::{EnrollmentBackend, LocalBackend};
pub use storage::EnrollmentStore;
pub use workflow::{
    Collaborators, EnrollmentWorkflow, SessionOutcome, SessionReport, WorkflowHandle, WorkflowPhase,
    WorkflowView,
};
