use async_trait::async_trait;
use crate::common::BackendError;
use crate::service::protocol::{CommitRequest, CredentialToken, CredentialVerification, TelemetrySnapshot};

/// Remote identity service the kiosk enrolls against.
#[async_trait]
pub trait EnrollmentBackend: Send + Sync {
    /// Fails with [`BackendError::Authentication`] for an unknown or expired token.
    async fn verify_credential(&self, token: &CredentialToken) -> Result<CredentialVerification, BackendError>;

    /// Idempotent.
    async fn delete_enrollment(&self, identity_id: &str) -> Result<(), BackendError>;

    /// `request.verification_token` must be the token that resolved the identity.
    async fn commit_enrollment(&self, request: &CommitRequest) -> Result<(), BackendError>;

    /// Best effort; callers log and drop failures.
    async fn upload_telemetry_snapshot(&self, snapshot: &TelemetrySnapshot) -> Result<(), BackendError>;
}
