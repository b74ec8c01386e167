use std::path::{Path, PathBuf};
use std::fs;
use crate::common::error::Result;

const DEV_BASE_DIR: &str = "./dev_data";

/// Development mode keeps all kiosk data under a local directory.
#[derive(Debug, Clone)]
pub struct DevMode {
    enabled: bool,
    base_dir: PathBuf,
}

impl DevMode {
    pub fn new(enabled: bool) -> Result<Self> {
        Self::with_base_dir(enabled, PathBuf::from(DEV_BASE_DIR))
    }

    pub fn with_base_dir(enabled: bool, base_dir: PathBuf) -> Result<Self> {
        if enabled {
            fs::create_dir_all(&base_dir)?;
            fs::create_dir_all(base_dir.join("enrollments"))?;
            fs::create_dir_all(base_dir.join("telemetry"))?;

            tracing::info!("Development mode enabled - data will be saved to: {}", base_dir.display());
        }

        Ok(Self { enabled, base_dir })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn base_dir(&self) -> Option<&Path> {
        self.enabled.then_some(self.base_dir.as_path())
    }

    pub fn enrollments_dir(&self) -> Option<PathBuf> {
        self.enabled.then(|| self.base_dir.join("enrollments"))
    }

    pub fn telemetry_dir(&self) -> Option<PathBuf> {
        self.enabled.then(|| self.base_dir.join("telemetry"))
    }
}
