use serde::Serialize;
use crate::common::config::HoldStillConfig;
use crate::common::EnrollmentFailure;
use crate::core::descriptor::Descriptor;
use crate::core::detection::{DetectionSample, Expression, FaceBox};
use crate::core::guidance::Guidance;
use crate::core::hold_still::{CapturedDescriptor, HoldStillAccumulator};
use crate::service::protocol::{CredentialToken, EnrollmentIdentity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowPhase {
    AwaitingCredential,
    VerifyingCredential,
    ExistingEnrollmentConflict,
    WarmingUp,
    Scanning,
    Committing,
    Success,
    Error,
}

impl WorkflowPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowPhase::Success | WorkflowPhase::Error)
    }
}

impl std::fmt::Display for WorkflowPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            WorkflowPhase::AwaitingCredential => "awaiting_credential",
            WorkflowPhase::VerifyingCredential => "verifying_credential",
            WorkflowPhase::ExistingEnrollmentConflict => "existing_enrollment_conflict",
            WorkflowPhase::WarmingUp => "warming_up",
            WorkflowPhase::Scanning => "scanning",
            WorkflowPhase::Committing => "committing",
            WorkflowPhase::Success => "success",
            WorkflowPhase::Error => "error",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub enum VerificationStep {
    Lookup,
    /// Re-entered after the user confirmed re-enrollment.
    RemovingPrior { identity: EnrollmentIdentity },
}

/// Where the face was when a good frame was seen, kept for telemetry.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameMeta {
    pub face_box: Option<FaceBox>,
    pub yaw: Option<f32>,
    pub pitch: Option<f32>,
    pub expression: Option<Expression>,
}

impl From<&DetectionSample> for FrameMeta {
    fn from(sample: &DetectionSample) -> Self {
        Self {
            face_box: sample.face_box,
            yaw: sample.yaw,
            pitch: sample.pitch,
            expression: sample.expression,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GoodFrame {
    pub descriptor: Descriptor,
    pub meta: FrameMeta,
}

/// Everything only the scanning phase may touch.
#[derive(Debug)]
pub struct ScanState {
    pub accumulator: HoldStillAccumulator,
    /// Verdict of the most recent sample; `None` when it was not fully good.
    pub latest: Option<GoodFrame>,
    pub guidance: Option<Guidance>,
}

impl ScanState {
    pub fn new(config: &HoldStillConfig) -> Self {
        Self {
            accumulator: HoldStillAccumulator::new(config),
            latest: None,
            guidance: None,
        }
    }
}

/// Holds the captured descriptor until exactly one commit takes it.
#[derive(Debug)]
pub struct CommitSlot {
    captured: Option<CapturedDescriptor>,
    in_flight: bool,
}

impl CommitSlot {
    pub fn new(captured: CapturedDescriptor) -> Self {
        Self { captured: Some(captured), in_flight: false }
    }

    /// Hands out the descriptor on the first call only.
    pub fn begin(&mut self) -> Option<CapturedDescriptor> {
        if self.in_flight {
            return None;
        }
        self.in_flight = true;
        self.captured.take()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }
}

#[derive(Debug)]
pub enum WorkflowState {
    AwaitingCredential,
    VerifyingCredential {
        token: CredentialToken,
        step: VerificationStep,
    },
    ExistingEnrollmentConflict {
        token: CredentialToken,
        identity: EnrollmentIdentity,
    },
    WarmingUp {
        token: CredentialToken,
        identity: EnrollmentIdentity,
    },
    Scanning {
        token: CredentialToken,
        identity: EnrollmentIdentity,
        scan: ScanState,
    },
    Committing {
        token: CredentialToken,
        identity: EnrollmentIdentity,
        slot: CommitSlot,
    },
    Success {
        identity: EnrollmentIdentity,
    },
    Error {
        failure: EnrollmentFailure,
    },
}

impl WorkflowState {
    pub fn phase(&self) -> WorkflowPhase {
        match self {
            WorkflowState::AwaitingCredential => WorkflowPhase::AwaitingCredential,
            WorkflowState::VerifyingCredential { .. } => WorkflowPhase::VerifyingCredential,
            WorkflowState::ExistingEnrollmentConflict { .. } => WorkflowPhase::ExistingEnrollmentConflict,
            WorkflowState::WarmingUp { .. } => WorkflowPhase::WarmingUp,
            WorkflowState::Scanning { .. } => WorkflowPhase::Scanning,
            WorkflowState::Committing { .. } => WorkflowPhase::Committing,
            WorkflowState::Success { .. } => WorkflowPhase::Success,
            WorkflowState::Error { .. } => WorkflowPhase::Error,
        }
    }

    pub fn identity(&self) -> Option<&EnrollmentIdentity> {
        match self {
            WorkflowState::VerifyingCredential { step: VerificationStep::RemovingPrior { identity }, .. }
            | WorkflowState::ExistingEnrollmentConflict { identity, .. }
            | WorkflowState::WarmingUp { identity, .. }
            | WorkflowState::Scanning { identity, .. }
            | WorkflowState::Committing { identity, .. }
            | WorkflowState::Success { identity } => Some(identity),
            _ => None,
        }
    }
}

/// What the kiosk screen renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowView {
    pub phase: WorkflowPhase,
    pub guidance: Option<Guidance>,
    pub hold_progress: f32,
    pub identity: Option<EnrollmentIdentity>,
    pub error: Option<String>,
    pub attempt: u32,
}

impl WorkflowView {
    pub fn of(state: &WorkflowState, attempt: u32) -> Self {
        let (guidance, hold_progress) = match state {
            WorkflowState::Scanning { scan, .. } => (scan.guidance, scan.accumulator.progress()),
            WorkflowState::Committing { .. } | WorkflowState::Success { .. } => (None, 1.0),
            _ => (None, 0.0),
        };
        let error = match state {
            WorkflowState::Error { failure } => Some(failure.user_message()),
            _ => None,
        };
        Self {
            phase: state.phase(),
            guidance,
            hold_progress,
            identity: state.identity().cloned(),
            error,
            attempt,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    Enrolled(EnrollmentIdentity),
    Cancelled,
    Closed,
}

/// Returned to the kiosk shell when a session ends.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub session_id: String,
    pub outcome: SessionOutcome,
    pub history: Vec<WorkflowPhase>,
    pub attempts: u32,
}

impl SessionReport {
    pub fn visited(&self, phase: WorkflowPhase) -> bool {
        self.history.contains(&phase)
    }
}
