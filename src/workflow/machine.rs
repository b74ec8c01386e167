use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::camera::{FrameAnalyzer, VideoSource};
use crate::common::{BackendError, Config, EnrollmentFailure, SetupStage};
use crate::core::descriptor;
use crate::core::detection::{DetectionSample, FrameSize};
use crate::core::evaluation::evaluate_tick;
use crate::core::expression::ExpressionGate;
use crate::core::hold_still::{CapturedDescriptor, HoldOutcome, TickSignal};
use crate::core::position::PositionValidator;
use crate::core::quality::CaptureQuality;
use crate::service::backend::EnrollmentBackend;
use crate::service::protocol::{
    CommitRequest, CredentialToken, CredentialVerification, EnrollmentIdentity, TelemetrySnapshot,
};
use crate::workflow::scope::SessionScope;
use crate::workflow::state::{
    CommitSlot, FrameMeta, GoodFrame, ScanState, SessionOutcome, SessionReport, VerificationStep,
    WorkflowPhase, WorkflowState, WorkflowView,
};

/// The external capabilities a session drives.
#[derive(Clone)]
pub struct Collaborators {
    pub backend: Arc<dyn EnrollmentBackend>,
    pub analyzer: Arc<dyn FrameAnalyzer>,
    pub video: Arc<dyn VideoSource>,
    pub quality: Arc<dyn CaptureQuality>,
}

#[derive(Debug)]
pub(crate) enum WorkflowEvent {
    CredentialTapped(CredentialToken),
    ConfirmReenroll,
    DeclineReenroll,
    Retry,
    Cancel,
    ViewClosed,
    Verified { attempt: u32, result: Result<CredentialVerification, BackendError> },
    PriorRemoved { attempt: u32, result: Result<(), BackendError> },
    WarmupFinished { attempt: u32, result: Result<(), SetupStage> },
    SampleReady { attempt: u32, sample: Option<(DetectionSample, FrameSize)> },
    HoldTick { attempt: u32 },
    CommitFinished { attempt: u32, result: Result<(), BackendError> },
    SuccessShown { attempt: u32 },
}

impl WorkflowEvent {
    /// Attempt that produced an internal event; user events carry none.
    fn attempt(&self) -> Option<u32> {
        match self {
            WorkflowEvent::Verified { attempt, .. }
            | WorkflowEvent::PriorRemoved { attempt, .. }
            | WorkflowEvent::WarmupFinished { attempt, .. }
            | WorkflowEvent::SampleReady { attempt, .. }
            | WorkflowEvent::HoldTick { attempt }
            | WorkflowEvent::CommitFinished { attempt, .. }
            | WorkflowEvent::SuccessShown { attempt } => Some(*attempt),
            _ => None,
        }
    }
}

enum Step {
    Stay(WorkflowState),
    Enter(WorkflowState),
    Finish(SessionOutcome),
}

/// One enrollment attempt's identity and the timers it owns.
struct Session {
    id: String,
    attempt: u32,
    timers: SessionScope,
}

impl Session {
    fn new() -> Self {
        Self {
            id: format!("{:016x}", rand::random::<u64>()),
            attempt: 1,
            timers: SessionScope::new(),
        }
    }

    /// Start over from a clean slate; results from older attempts become stale.
    fn restart(&mut self) {
        self.timers.cancel_all();
        self.attempt += 1;
    }

    fn teardown(&mut self) {
        self.timers.cancel_all();
    }
}

/// Drives a kiosk session from card tap to a committed descriptor.
///
/// All state lives in [`WorkflowState`]; every change goes through a
/// transition which first cancels the timers of the phase being left.
/// Remote calls run detached and report back through the event channel,
/// so a cancel never waits on the network and a late result is dropped.
pub struct EnrollmentWorkflow {
    config: Config,
    deps: Collaborators,
    validator: PositionValidator,
    gate: ExpressionGate,
    state: WorkflowState,
    session: Session,
    events: mpsc::UnboundedReceiver<WorkflowEvent>,
    sender: mpsc::UnboundedSender<WorkflowEvent>,
    view: watch::Sender<WorkflowView>,
    history: Vec<WorkflowPhase>,
}

impl EnrollmentWorkflow {
    pub fn new(config: Config, deps: Collaborators) -> (Self, WorkflowHandle) {
        let (sender, events) = mpsc::unbounded_channel();
        let session = Session::new();
        let state = WorkflowState::AwaitingCredential;
        let (view, view_rx) = watch::channel(WorkflowView::of(&state, session.attempt));

        let workflow = Self {
            validator: PositionValidator::new(&config.position),
            gate: ExpressionGate::new(&config.expression),
            config,
            deps,
            state,
            session,
            events,
            sender: sender.clone(),
            view,
            history: vec![WorkflowPhase::AwaitingCredential],
        };
        let handle = WorkflowHandle { events: sender, view: view_rx };
        (workflow, handle)
    }

    /// Process events until the session ends, then release every timer.
    pub async fn run(mut self) -> SessionReport {
        info!("Enrollment session {} started", self.session.id);

        let outcome = loop {
            let Some(event) = self.events.recv().await else {
                break SessionOutcome::Closed;
            };
            let state = std::mem::replace(&mut self.state, WorkflowState::AwaitingCredential);
            match self.transition(state, event) {
                Step::Stay(state) => {
                    self.state = state;
                    self.publish();
                }
                Step::Enter(next) => self.enter(next),
                Step::Finish(outcome) => break outcome,
            }
        };

        self.session.teardown();
        info!("Enrollment session {} ended: {:?}", self.session.id, outcome);

        SessionReport {
            session_id: self.session.id.clone(),
            outcome,
            history: std::mem::take(&mut self.history),
            attempts: self.session.attempt,
        }
    }

    fn transition(&mut self, state: WorkflowState, event: WorkflowEvent) -> Step {
        if let Some(attempt) = event.attempt() {
            if attempt != self.session.attempt {
                debug!("Dropping stale event from attempt {}", attempt);
                return Step::Stay(state);
            }
        }

        match (state, event) {
            (WorkflowState::Success { identity }, WorkflowEvent::ViewClosed) => {
                Step::Finish(SessionOutcome::Enrolled(identity))
            }
            (_, WorkflowEvent::ViewClosed) => Step::Finish(SessionOutcome::Closed),
            (state @ WorkflowState::Success { .. }, WorkflowEvent::Cancel) => {
                debug!("Cancel ignored after a successful commit");
                Step::Stay(state)
            }
            (_, WorkflowEvent::Cancel) => Step::Finish(SessionOutcome::Cancelled),

            (WorkflowState::AwaitingCredential, WorkflowEvent::CredentialTapped(token)) => {
                Step::Enter(WorkflowState::VerifyingCredential { token, step: VerificationStep::Lookup })
            }
            (state, WorkflowEvent::CredentialTapped(token)) => {
                debug!("Ignoring card tap {:?} while {}", token, state.phase());
                Step::Stay(state)
            }

            (
                WorkflowState::VerifyingCredential { token, step: VerificationStep::Lookup },
                WorkflowEvent::Verified { result, .. },
            ) => match result {
                Ok(CredentialVerification { identity, has_existing_enrollment: true }) => {
                    Step::Enter(WorkflowState::ExistingEnrollmentConflict { token, identity })
                }
                Ok(CredentialVerification { identity, .. }) => {
                    Step::Enter(WorkflowState::WarmingUp { token, identity })
                }
                Err(e) => Step::Enter(WorkflowState::Error {
                    failure: EnrollmentFailure::CredentialRejected(e),
                }),
            },

            (WorkflowState::ExistingEnrollmentConflict { token, identity }, WorkflowEvent::ConfirmReenroll) => {
                Step::Enter(WorkflowState::VerifyingCredential {
                    token,
                    step: VerificationStep::RemovingPrior { identity },
                })
            }
            (WorkflowState::ExistingEnrollmentConflict { .. }, WorkflowEvent::DeclineReenroll) => {
                Step::Finish(SessionOutcome::Cancelled)
            }

            (
                WorkflowState::VerifyingCredential { token, step: VerificationStep::RemovingPrior { identity } },
                WorkflowEvent::PriorRemoved { result, .. },
            ) => match result {
                Ok(()) => Step::Enter(WorkflowState::WarmingUp { token, identity }),
                Err(e) => Step::Enter(WorkflowState::Error {
                    failure: EnrollmentFailure::RemovalRejected(e),
                }),
            },

            (WorkflowState::WarmingUp { token, identity }, WorkflowEvent::WarmupFinished { result, .. }) => {
                match result {
                    Ok(()) => Step::Enter(WorkflowState::Scanning {
                        token,
                        identity,
                        scan: ScanState::new(&self.config.hold_still),
                    }),
                    Err(stage) => Step::Enter(WorkflowState::Error {
                        failure: EnrollmentFailure::SetupTimeout(stage),
                    }),
                }
            }

            (WorkflowState::Scanning { token, identity, mut scan }, WorkflowEvent::SampleReady { sample, .. }) => {
                self.record_sample(&mut scan, sample);
                Step::Stay(WorkflowState::Scanning { token, identity, scan })
            }
            (WorkflowState::Scanning { token, identity, mut scan }, WorkflowEvent::HoldTick { .. }) => {
                let signal = match &scan.latest {
                    Some(frame) => TickSignal::Good(frame.descriptor.clone()),
                    None => TickSignal::Bad,
                };
                match scan.accumulator.tick(signal) {
                    HoldOutcome::Capture(captured) => {
                        info!("Hold complete after {} good ticks", captured.good_ticks());
                        let meta = scan.latest.take().map(|frame| frame.meta);
                        self.upload_snapshot(&identity, &captured, meta);
                        Step::Enter(WorkflowState::Committing {
                            token,
                            identity,
                            slot: CommitSlot::new(captured),
                        })
                    }
                    HoldOutcome::Progress { good_ticks, bad_streak } => {
                        debug!("Hold progress: {} good, {} bad in a row", good_ticks, bad_streak);
                        Step::Stay(WorkflowState::Scanning { token, identity, scan })
                    }
                    HoldOutcome::Halted => Step::Stay(WorkflowState::Scanning { token, identity, scan }),
                }
            }

            (WorkflowState::Committing { identity, .. }, WorkflowEvent::CommitFinished { result, .. }) => {
                match result {
                    Ok(()) => Step::Enter(WorkflowState::Success { identity }),
                    Err(e) => Step::Enter(WorkflowState::Error {
                        failure: EnrollmentFailure::CommitRejected(e),
                    }),
                }
            }

            (WorkflowState::Success { identity }, WorkflowEvent::SuccessShown { .. }) => {
                Step::Finish(SessionOutcome::Enrolled(identity))
            }

            (WorkflowState::Error { .. }, WorkflowEvent::Retry) => {
                self.session.restart();
                info!("Retrying enrollment, attempt {}", self.session.attempt);
                Step::Enter(WorkflowState::AwaitingCredential)
            }

            (state, event) => {
                debug!("Ignoring {:?} while {}", event, state.phase());
                Step::Stay(state)
            }
        }
    }

    fn enter(&mut self, next: WorkflowState) {
        self.session.timers.cancel_all();

        let from = self.history.last().copied().unwrap_or(WorkflowPhase::AwaitingCredential);
        info!("Enrollment {} -> {}", from, next.phase());
        self.history.push(next.phase());
        self.state = next;

        self.on_enter();
        self.publish();
    }

    fn on_enter(&mut self) {
        let attempt = self.session.attempt;
        match &mut self.state {
            WorkflowState::AwaitingCredential => {}
            WorkflowState::VerifyingCredential { token, step: VerificationStep::Lookup } => {
                let token = token.clone();
                self.call_backend(move |backend| async move {
                    let result = backend.verify_credential(&token).await;
                    WorkflowEvent::Verified { attempt, result }
                });
            }
            WorkflowState::VerifyingCredential { step: VerificationStep::RemovingPrior { identity }, .. } => {
                let identity_id = identity.id.clone();
                info!("Removing previous enrollment for {}", identity.username);
                self.call_backend(move |backend| async move {
                    let result = backend.delete_enrollment(&identity_id).await;
                    WorkflowEvent::PriorRemoved { attempt, result }
                });
            }
            WorkflowState::ExistingEnrollmentConflict { identity, .. } => {
                info!("{} is already enrolled, waiting for confirmation", identity.username);
            }
            WorkflowState::WarmingUp { .. } => self.start_warmup(),
            WorkflowState::Scanning { .. } => self.start_sampling(),
            WorkflowState::Committing { token, identity, slot } => {
                let Some(captured) = slot.begin() else {
                    warn!("Commit already in flight, ignoring duplicate trigger");
                    return;
                };
                let token = token.clone();
                let identity_id = identity.id.clone();
                match descriptor::serialize(captured.descriptor()) {
                    Ok(encoded) => {
                        let request = CommitRequest {
                            identity_id,
                            descriptor: encoded,
                            verification_token: token,
                        };
                        self.call_backend(move |backend| async move {
                            let result = backend.commit_enrollment(&request).await;
                            WorkflowEvent::CommitFinished { attempt, result }
                        });
                    }
                    Err(e) => {
                        let _ = self.sender.send(WorkflowEvent::CommitFinished {
                            attempt,
                            result: Err(BackendError::Validation(e.to_string())),
                        });
                    }
                }
            }
            WorkflowState::Success { identity } => {
                info!("Enrollment complete for {}", identity.username);
                let sender = self.sender.clone();
                let delay = Duration::from_millis(self.config.workflow.success_display_ms);
                self.session.timers.after(delay, move || {
                    let _ = sender.send(WorkflowEvent::SuccessShown { attempt });
                });
            }
            WorkflowState::Error { failure } => {
                warn!("Enrollment failed: {}", failure);
            }
        }
    }

    /// Run a remote call outside the session scope. It is never aborted;
    /// its result is dropped if the attempt moved on or the session ended.
    fn call_backend<F, Fut>(&self, call: F)
    where
        F: FnOnce(Arc<dyn EnrollmentBackend>) -> Fut,
        Fut: Future<Output = WorkflowEvent> + Send + 'static,
    {
        let pending = call(self.deps.backend.clone());
        let sender = self.sender.clone();
        tokio::spawn(async move {
            let event = pending.await;
            if sender.send(event).is_err() {
                debug!("Session closed before a backend call returned");
            }
        });
    }

    fn start_warmup(&mut self) {
        let attempt = self.session.attempt;
        let warmup = self.config.warmup.clone();
        let video = self.deps.video.clone();
        let analyzer = self.deps.analyzer.clone();
        let sender = self.sender.clone();

        self.session.timers.spawn(async move {
            let interval = Duration::from_millis(warmup.poll_interval_ms);
            let (camera, models) = tokio::join!(
                poll_ready(|| video.is_streaming(), warmup.camera_poll_budget, interval),
                poll_ready(|| analyzer.models_loaded(), warmup.model_poll_budget, interval),
            );
            let result = if !camera {
                Err(SetupStage::Camera)
            } else if !models {
                Err(SetupStage::Models)
            } else {
                Ok(())
            };
            let _ = sender.send(WorkflowEvent::WarmupFinished { attempt, result });
        });
    }

    /// Sampler and hold timer share a cadence but run independently; the
    /// hold timer reads whatever verdict the sampler left behind.
    fn start_sampling(&mut self) {
        let attempt = self.session.attempt;
        let tick = self.config.hold_still.tick_interval();
        let settle = Duration::from_millis(self.config.warmup.settle_delay_ms);
        let video = self.deps.video.clone();
        let analyzer = self.deps.analyzer.clone();

        let sender = self.sender.clone();
        self.session.timers.spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + settle, tick);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let sample = sample_frame(analyzer.as_ref(), video.as_ref(), tick).await;
                if sender.send(WorkflowEvent::SampleReady { attempt, sample }).is_err() {
                    break;
                }
            }
        });

        let sender = self.sender.clone();
        self.session.timers.every(settle + tick, tick, move || {
            sender.send(WorkflowEvent::HoldTick { attempt }).is_ok()
        });
    }

    fn record_sample(&self, scan: &mut ScanState, sample: Option<(DetectionSample, FrameSize)>) {
        let Some((sample, frame)) = sample else {
            scan.latest = None;
            return;
        };

        let evaluation = evaluate_tick(
            &sample,
            frame,
            &self.validator,
            &self.gate,
            self.deps.quality.as_ref(),
        );
        scan.guidance = Some(evaluation.guidance);
        if sample.detected_box().is_none() && scan.accumulator.good_ticks() > 0 {
            debug!("Face lost, restarting the hold");
            scan.accumulator.reset();
        }
        scan.latest = evaluation.descriptor.map(|descriptor| GoodFrame {
            descriptor,
            meta: FrameMeta::from(&sample),
        });
    }

    fn upload_snapshot(&self, identity: &EnrollmentIdentity, captured: &CapturedDescriptor, meta: Option<FrameMeta>) {
        let descriptor_digest = match descriptor::serialize(captured.descriptor()) {
            Ok(encoded) => descriptor::digest(&encoded),
            Err(e) => {
                warn!("Skipping telemetry snapshot: {}", e);
                return;
            }
        };
        let meta = meta.unwrap_or(FrameMeta { face_box: None, yaw: None, pitch: None, expression: None });
        let snapshot = TelemetrySnapshot {
            session_id: self.session.id.clone(),
            attempt: self.session.attempt,
            identity_id: identity.id.clone(),
            captured_at: Utc::now(),
            good_ticks: captured.good_ticks(),
            descriptor_digest,
            face_box: meta.face_box,
            yaw: meta.yaw,
            pitch: meta.pitch,
            expression: meta.expression,
        };

        let backend = self.deps.backend.clone();
        tokio::spawn(async move {
            if let Err(e) = backend.upload_telemetry_snapshot(&snapshot).await {
                warn!("Telemetry snapshot upload failed: {}", e);
            }
        });
    }

    fn publish(&self) {
        let next = WorkflowView::of(&self.state, self.session.attempt);
        self.view.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }
}

async fn poll_ready(mut ready: impl FnMut() -> bool, budget: u32, interval: Duration) -> bool {
    for _ in 0..budget {
        if ready() {
            return true;
        }
        time::sleep(interval).await;
    }
    false
}

/// One analysis bounded by the sampling period; anything else is a dropped tick.
async fn sample_frame(
    analyzer: &dyn FrameAnalyzer,
    video: &dyn VideoSource,
    budget: Duration,
) -> Option<(DetectionSample, FrameSize)> {
    let Some(frame) = video.frame_size() else {
        debug!("Dropped tick: no frame yet");
        return None;
    };
    match time::timeout(budget, analyzer.analyze_frame(video)).await {
        Ok(Ok(sample)) => Some((sample, frame)),
        Ok(Err(e)) => {
            debug!("Dropped tick: {}", e);
            None
        }
        Err(_) => {
            warn!("Dropped tick: analysis took longer than {:?}", budget);
            None
        }
    }
}

/// The kiosk shell's side of a running session.
///
/// Dropping the handle counts as the hosting view closing.
pub struct WorkflowHandle {
    events: mpsc::UnboundedSender<WorkflowEvent>,
    view: watch::Receiver<WorkflowView>,
}

impl WorkflowHandle {
    fn send(&self, event: WorkflowEvent) {
        if self.events.send(event).is_err() {
            debug!("Enrollment session already ended");
        }
    }

    pub fn tap_credential(&self, token: CredentialToken) {
        self.send(WorkflowEvent::CredentialTapped(token));
    }

    pub fn confirm_reenroll(&self) {
        self.send(WorkflowEvent::ConfirmReenroll);
    }

    pub fn decline_reenroll(&self) {
        self.send(WorkflowEvent::DeclineReenroll);
    }

    pub fn retry(&self) {
        self.send(WorkflowEvent::Retry);
    }

    pub fn cancel(&self) {
        self.send(WorkflowEvent::Cancel);
    }

    pub fn close_view(&self) {
        self.send(WorkflowEvent::ViewClosed);
    }

    pub fn view(&self) -> WorkflowView {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<WorkflowView> {
        self.view.clone()
    }

    /// Resolves once the published view reaches `phase`, or `None` if the
    /// session ended first.
    pub async fn wait_for_phase(&self, phase: WorkflowPhase) -> Option<WorkflowView> {
        let mut view = self.view.clone();
        let reached = view.wait_for(|v| v.phase == phase).await.ok()?;
        Some(reached.clone())
    }

    /// Like [`wait_for_phase`](Self::wait_for_phase) with an arbitrary predicate.
    pub async fn wait_for<F>(&self, mut predicate: F) -> Option<WorkflowView>
    where
        F: FnMut(&WorkflowView) -> bool,
    {
        let mut view = self.view.clone();
        let reached = view.wait_for(|v| predicate(v)).await.ok()?;
        Some(reached.clone())
    }
}

impl Drop for WorkflowHandle {
    fn drop(&mut self) {
        let _ = self.events.send(WorkflowEvent::ViewClosed);
    }
}
