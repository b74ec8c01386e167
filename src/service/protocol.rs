use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use crate::core::detection::{Expression, FaceBox};

/// Token read from the tapped card. Never logged in full.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialToken(String);

impl CredentialToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for CredentialToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let visible: String = self.0.chars().take(4).collect();
        write!(f, "CredentialToken({}…)", visible)
    }
}

/// The person being enrolled, fixed for the whole session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentIdentity {
    pub id: String,
    pub name: String,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialVerification {
    pub identity: EnrollmentIdentity,
    pub has_existing_enrollment: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitRequest {
    pub identity_id: String,
    pub descriptor: String,
    pub verification_token: CredentialToken,
}

/// Best-effort record of the moment a descriptor was captured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub session_id: String,
    pub attempt: u32,
    pub identity_id: String,
    pub captured_at: DateTime<Utc>,
    pub good_ticks: u32,
    pub descriptor_digest: String,
    pub face_box: Option<FaceBox>,
    pub yaw: Option<f32>,
    pub pitch: Option<f32>,
    pub expression: Option<Expression>,
}
