use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnrollError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Enrollment not found: {0}")]
    EnrollmentNotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, EnrollError>;

/// Failures reported by the remote identity backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("rejected by server: {0}")]
    Validation(String),

    #[error("storage failure: {0}")]
    Storage(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalyzerError {
    #[error("detection models are not loaded")]
    ModelsNotLoaded,

    #[error("video source unavailable")]
    SourceUnavailable,

    #[error("inference failed: {0}")]
    Inference(String),
}

/// Which readiness signal ran out of polling budget during warm-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStage {
    Camera,
    Models,
}

impl std::fmt::Display for SetupStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SetupStage::Camera => write!(f, "camera"),
            SetupStage::Models => write!(f, "detection models"),
        }
    }
}

/// Terminal failure of one enrollment attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnrollmentFailure {
    #[error("credential rejected: {0}")]
    CredentialRejected(BackendError),

    #[error("{0} did not become ready")]
    SetupTimeout(SetupStage),

    #[error("commit rejected: {0}")]
    CommitRejected(BackendError),

    #[error("removal of the previous enrollment failed: {0}")]
    RemovalRejected(BackendError),
}

impl EnrollmentFailure {
    /// The single message shown on the kiosk for this failure.
    pub fn user_message(&self) -> String {
        match self {
            EnrollmentFailure::CredentialRejected(BackendError::Authentication(_)) => {
                "Card not recognized. Please try again or contact an administrator.".to_string()
            }
            EnrollmentFailure::CredentialRejected(_) => {
                "Could not verify your card right now. Please try again.".to_string()
            }
            EnrollmentFailure::SetupTimeout(SetupStage::Camera) => {
                "The camera is not available. Please try again.".to_string()
            }
            EnrollmentFailure::SetupTimeout(SetupStage::Models) => {
                "Face detection failed to start. Please try again.".to_string()
            }
            EnrollmentFailure::CommitRejected(_) => {
                "Your face could not be saved. Please try again.".to_string()
            }
            EnrollmentFailure::RemovalRejected(_) => {
                "Your previous enrollment could not be removed. Please try again.".to_string()
            }
        }
    }
}
