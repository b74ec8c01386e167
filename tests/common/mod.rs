#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::ops::Range;
use std::time::Duration;
use tokio::task::JoinHandle;

use kiosk_enroll::camera::{FrameAnalyzer, VideoSource};
use kiosk_enroll::common::{AnalyzerError, BackendError, Config};
use kiosk_enroll::core::{DetectionSample, FrameSize, QualityGate};
use kiosk_enroll::service::{
    CommitRequest, CredentialToken, CredentialVerification, EnrollmentBackend, EnrollmentIdentity,
    TelemetrySnapshot,
};
use kiosk_enroll::simulation::{Scenario, ScriptedAnalyzer, SyntheticCamera};
use kiosk_enroll::workflow::{Collaborators, EnrollmentWorkflow, SessionReport, WorkflowHandle};

pub const CARD: &str = "card-ada";
pub const FRAME: FrameSize = FrameSize { width: 640, height: 480 };

pub fn ada() -> EnrollmentIdentity {
    EnrollmentIdentity {
        id: "emp-1001".into(),
        name: "Ada Lovelace".into(),
        username: "alovelace".into(),
    }
}

/// Backend double that counts every call and can be told to fail.
#[derive(Default)]
pub struct RecordingBackend {
    pub enrolled: AtomicBool,
    pub reject_commits: AtomicU32,
    pub fail_telemetry: bool,
    pub verify_delay: Duration,
    pub commit_delay: Duration,

    pub verify_calls: AtomicU32,
    pub delete_calls: AtomicU32,
    pub commit_calls: AtomicU32,
    pub telemetry_calls: AtomicU32,
    pub calls: Mutex<Vec<&'static str>>,
    pub commits: Mutex<Vec<CommitRequest>>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn already_enrolled() -> Self {
        let backend = Self::default();
        backend.enrolled.store(true, Ordering::SeqCst);
        backend
    }

    pub fn verifies(&self) -> u32 {
        self.verify_calls.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> u32 {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub fn commits(&self) -> u32 {
        self.commit_calls.load(Ordering::SeqCst)
    }

    pub fn telemetry(&self) -> u32 {
        self.telemetry_calls.load(Ordering::SeqCst)
    }

    pub fn call_log(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    fn log(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl EnrollmentBackend for RecordingBackend {
    async fn verify_credential(&self, token: &CredentialToken) -> Result<CredentialVerification, BackendError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        self.log("verify");
        if !self.verify_delay.is_zero() {
            tokio::time::sleep(self.verify_delay).await;
        }
        if token.as_str() != CARD {
            return Err(BackendError::Authentication("unknown card".into()));
        }
        Ok(CredentialVerification {
            identity: ada(),
            has_existing_enrollment: self.enrolled.load(Ordering::SeqCst),
        })
    }

    async fn delete_enrollment(&self, _identity_id: &str) -> Result<(), BackendError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.log("delete");
        self.enrolled.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn commit_enrollment(&self, request: &CommitRequest) -> Result<(), BackendError> {
        self.commit_calls.fetch_add(1, Ordering::SeqCst);
        self.log("commit");
        self.commits.lock().unwrap().push(request.clone());
        if !self.commit_delay.is_zero() {
            tokio::time::sleep(self.commit_delay).await;
        }
        let rejected = self
            .reject_commits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if rejected {
            return Err(BackendError::Validation("descriptor rejected".into()));
        }
        self.enrolled.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn upload_telemetry_snapshot(&self, _snapshot: &TelemetrySnapshot) -> Result<(), BackendError> {
        self.telemetry_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_telemetry {
            return Err(BackendError::Unavailable("telemetry sink down".into()));
        }
        Ok(())
    }
}

/// Analyzer that never answers within a sampling period.
pub struct SlowAnalyzer {
    pub delay: Duration,
    pub calls: AtomicU32,
}

#[async_trait]
impl FrameAnalyzer for SlowAnalyzer {
    fn models_loaded(&self) -> bool {
        true
    }

    async fn analyze_frame(&self, _source: &dyn VideoSource) -> Result<DetectionSample, AnalyzerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(DetectionSample::no_face())
    }
}

/// Steady subject who steps out of frame for the given frame numbers.
pub struct VanishingAnalyzer {
    inner: ScriptedAnalyzer,
    absent: Range<u32>,
}

impl VanishingAnalyzer {
    pub fn new(absent: Range<u32>) -> Self {
        Self { inner: ScriptedAnalyzer::new(Scenario::Steady), absent }
    }

    pub fn calls(&self) -> u32 {
        self.inner.calls()
    }
}

#[async_trait]
impl FrameAnalyzer for VanishingAnalyzer {
    fn models_loaded(&self) -> bool {
        self.inner.models_loaded()
    }

    async fn analyze_frame(&self, source: &dyn VideoSource) -> Result<DetectionSample, AnalyzerError> {
        let sample = self.inner.analyze_frame(source).await?;
        if self.absent.contains(&self.inner.calls()) {
            return Ok(DetectionSample::no_face());
        }
        Ok(sample)
    }
}

pub fn ready_camera() -> Arc<SyntheticCamera> {
    Arc::new(SyntheticCamera::ready(FRAME))
}

pub fn start(
    config: Config,
    backend: Arc<RecordingBackend>,
    analyzer: Arc<dyn FrameAnalyzer>,
    camera: Arc<SyntheticCamera>,
) -> (JoinHandle<SessionReport>, WorkflowHandle) {
    let deps = Collaborators {
        backend,
        analyzer,
        video: camera,
        quality: Arc::new(QualityGate::new(&config.quality)),
    };
    let (workflow, handle) = EnrollmentWorkflow::new(config, deps);
    (tokio::spawn(workflow.run()), handle)
}
