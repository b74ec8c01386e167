use crate::common::{DevMode, EnrollError, Result};
use crate::core::descriptor::Descriptor;
use crate::service::protocol::EnrollmentIdentity;
use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

const STORAGE_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrollmentRecord {
    pub version: u32,
    pub identity: EnrollmentIdentity,
    pub descriptor: Descriptor,
    pub enrolled_at: DateTime<Utc>,
}

impl EnrollmentRecord {
    pub fn new(identity: EnrollmentIdentity, descriptor: Descriptor) -> Self {
        Self {
            version: STORAGE_VERSION,
            identity,
            descriptor,
            enrolled_at: Utc::now(),
        }
    }
}

/// One bincode file per enrolled identity.
pub struct EnrollmentStore {
    data_dir: PathBuf,
}

impl EnrollmentStore {
    pub fn new_with_path(data_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&data_dir)?;
        Ok(Self { data_dir })
    }

    pub fn new_with_dev_mode(dev_mode: &DevMode) -> Result<Self> {
        let data_dir = match dev_mode.enrollments_dir() {
            Some(dir) => dir,
            None => {
                let dirs = ProjectDirs::from("com", "kiosk", "KioskEnroll")
                    .ok_or_else(|| EnrollError::Storage("Failed to get project dirs".into()))?;
                dirs.data_dir().join("enrollments")
            }
        };

        fs::create_dir_all(&data_dir)?;
        tracing::debug!("EnrollmentStore using {:?}", data_dir);

        Ok(Self { data_dir })
    }

    pub fn data_dir(&self) -> &std::path::Path {
        &self.data_dir
    }

    fn record_path(&self, identity_id: &str) -> Result<PathBuf> {
        let valid = !identity_id.is_empty()
            && !identity_id.starts_with('.')
            && identity_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(EnrollError::Storage(format!("Invalid identity id: {:?}", identity_id)));
        }
        Ok(self.data_dir.join(format!("{}.bincode", identity_id)))
    }

    pub fn save(&self, record: &EnrollmentRecord) -> Result<()> {
        let path = self.record_path(&record.identity.id)?;
        let encoded = bincode::serialize(record)
            .map_err(|e| EnrollError::Storage(format!("Failed to serialize: {}", e)))?;
        fs::write(path, encoded)?;
        Ok(())
    }

    pub fn get(&self, identity_id: &str) -> Result<EnrollmentRecord> {
        let path = self.record_path(identity_id)?;

        if !path.exists() {
            return Err(EnrollError::EnrollmentNotFound(identity_id.to_string()));
        }

        let data = fs::read(path)?;
        let mut record: EnrollmentRecord = bincode::deserialize(&data)
            .map_err(|e| EnrollError::Storage(format!("Failed to deserialize: {}", e)))?;

        if record.version < STORAGE_VERSION {
            record.version = STORAGE_VERSION;
        }

        Ok(record)
    }

    pub fn contains(&self, identity_id: &str) -> Result<bool> {
        Ok(self.record_path(identity_id)?.exists())
    }

    /// Returns whether a record was removed. Deleting a missing record is fine.
    pub fn delete(&self, identity_id: &str) -> Result<bool> {
        let path = self.record_path(identity_id)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
