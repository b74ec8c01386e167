use async_trait::async_trait;
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use crate::common::config::CardEntry;
use crate::common::{BackendError, EnrollError};
use crate::core::descriptor;
use crate::service::backend::EnrollmentBackend;
use crate::service::protocol::{
    CommitRequest, CredentialToken, CredentialVerification, EnrollmentIdentity, TelemetrySnapshot,
};
use crate::storage::{EnrollmentRecord, EnrollmentStore};

const TELEMETRY_FILE: &str = "snapshots.jsonl";

/// Backend served from the local enrollment store and the configured cards.
pub struct LocalBackend {
    store: Arc<EnrollmentStore>,
    cards: HashMap<String, EnrollmentIdentity>,
    telemetry_dir: Option<PathBuf>,
}

impl LocalBackend {
    pub fn new(store: EnrollmentStore, cards: &[CardEntry], telemetry_dir: Option<PathBuf>) -> Self {
        let cards = cards
            .iter()
            .map(|card| {
                (
                    card.token.clone(),
                    EnrollmentIdentity {
                        id: card.id.clone(),
                        name: card.name.clone(),
                        username: card.username.clone(),
                    },
                )
            })
            .collect();
        Self { store: Arc::new(store), cards, telemetry_dir }
    }

    pub fn store(&self) -> &EnrollmentStore {
        &self.store
    }

    fn resolve(&self, token: &CredentialToken) -> Result<&EnrollmentIdentity, BackendError> {
        self.cards
            .get(token.as_str())
            .ok_or_else(|| BackendError::Authentication("unknown card".into()))
    }
}

fn storage_error(e: EnrollError) -> BackendError {
    BackendError::Storage(e.to_string())
}

/// Run filesystem work off the async executor.
async fn blocking<T, F>(work: F) -> Result<T, BackendError>
where
    F: FnOnce() -> Result<T, BackendError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| BackendError::Unavailable(format!("storage task failed: {}", e)))?
}

#[async_trait]
impl EnrollmentBackend for LocalBackend {
    async fn verify_credential(&self, token: &CredentialToken) -> Result<CredentialVerification, BackendError> {
        let identity = self.resolve(token)?.clone();
        let store = Arc::clone(&self.store);
        let id = identity.id.clone();
        let has_existing_enrollment =
            blocking(move || store.contains(&id).map_err(storage_error)).await?;
        tracing::debug!("Card resolved to {} (enrolled: {})", identity.username, has_existing_enrollment);
        Ok(CredentialVerification { identity, has_existing_enrollment })
    }

    async fn delete_enrollment(&self, identity_id: &str) -> Result<(), BackendError> {
        let store = Arc::clone(&self.store);
        let id = identity_id.to_string();
        let removed = blocking(move || store.delete(&id).map_err(storage_error)).await?;
        tracing::info!("Enrollment for {} removed (existed: {})", identity_id, removed);
        Ok(())
    }

    async fn commit_enrollment(&self, request: &CommitRequest) -> Result<(), BackendError> {
        let identity = self.resolve(&request.verification_token)?;
        if identity.id != request.identity_id {
            return Err(BackendError::Validation("token does not belong to this identity".into()));
        }
        let descriptor = descriptor::deserialize(&request.descriptor)
            .map_err(|e| BackendError::Validation(e.to_string()))?;

        let record = EnrollmentRecord::new(identity.clone(), descriptor);
        let store = Arc::clone(&self.store);
        blocking(move || store.save(&record).map_err(storage_error)).await?;
        tracing::info!("Enrollment committed for {}", identity.username);
        Ok(())
    }

    async fn upload_telemetry_snapshot(&self, snapshot: &TelemetrySnapshot) -> Result<(), BackendError> {
        let Some(dir) = self.telemetry_dir.clone() else {
            return Ok(());
        };
        let line = serde_json::to_string(snapshot)
            .map_err(|e| BackendError::Validation(format!("unencodable snapshot: {}", e)))?;
        blocking(move || {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(dir.join(TELEMETRY_FILE))
                .map_err(|e| BackendError::Storage(e.to_string()))?;
            writeln!(file, "{}", line).map_err(|e| BackendError::Storage(e.to_string()))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::descriptor::Descriptor;
    use chrono::Utc;

    fn backend(dir: &std::path::Path) -> LocalBackend {
        let store = EnrollmentStore::new_with_path(dir.join("enrollments")).unwrap();
        let cards = vec![
            CardEntry {
                token: "card-1".into(),
                id: "u-1".into(),
                name: "Ada Lovelace".into(),
                username: "ada".into(),
            },
            CardEntry {
                token: "card-2".into(),
                id: "u-2".into(),
                name: "Alan Turing".into(),
                username: "alan".into(),
            },
        ];
        LocalBackend::new(store, &cards, Some(dir.to_path_buf()))
    }

    fn commit(identity_id: &str, token: &str) -> CommitRequest {
        CommitRequest {
            identity_id: identity_id.into(),
            descriptor: descriptor::serialize(&Descriptor::new(vec![0.5; 16])).unwrap(),
            verification_token: CredentialToken::new(token),
        }
    }

    #[tokio::test]
    async fn unknown_card_is_authentication_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = backend(tmp.path())
            .verify_credential(&CredentialToken::new("nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Authentication(_)));
    }

    #[tokio::test]
    async fn commit_then_verify_reports_existing() {
        let tmp = tempfile::tempdir().unwrap();
        let b = backend(tmp.path());
        let token = CredentialToken::new("card-1");

        assert!(!b.verify_credential(&token).await.unwrap().has_existing_enrollment);
        b.commit_enrollment(&commit("u-1", "card-1")).await.unwrap();
        assert!(b.verify_credential(&token).await.unwrap().has_existing_enrollment);

        b.delete_enrollment("u-1").await.unwrap();
        b.delete_enrollment("u-1").await.unwrap();
        assert!(!b.verify_credential(&token).await.unwrap().has_existing_enrollment);
    }

    #[tokio::test]
    async fn commit_with_foreign_token_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let b = backend(tmp.path());
        let err = b.commit_enrollment(&commit("u-1", "card-2")).await.unwrap_err();
        assert!(matches!(err, BackendError::Validation(_)));
        assert!(!b.store().contains("u-1").unwrap());
    }

    #[tokio::test]
    async fn commit_with_garbage_descriptor_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let mut request = commit("u-1", "card-1");
        request.descriptor = "{oops".into();
        let err = backend(tmp.path()).commit_enrollment(&request).await.unwrap_err();
        assert!(matches!(err, BackendError::Validation(_)));
    }

    #[tokio::test]
    async fn telemetry_appends_json_lines() {
        let tmp = tempfile::tempdir().unwrap();
        let b = backend(tmp.path());
        let snapshot = TelemetrySnapshot {
            session_id: "s".into(),
            attempt: 1,
            identity_id: "u-1".into(),
            captured_at: Utc::now(),
            good_ticks: 15,
            descriptor_digest: "ab".into(),
            face_box: None,
            yaw: Some(1.0),
            pitch: None,
            expression: None,
        };
        b.upload_telemetry_snapshot(&snapshot).await.unwrap();
        b.upload_telemetry_snapshot(&snapshot).await.unwrap();
        let written = std::fs::read_to_string(tmp.path().join(TELEMETRY_FILE)).unwrap();
        assert_eq!(written.lines().count(), 2);
    }
}
