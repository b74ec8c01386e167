//! Synthetic camera and analyzer for running sessions without hardware.

use async_trait::async_trait;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use crate::camera::{FrameAnalyzer, VideoSource};
use crate::common::AnalyzerError;
use crate::core::descriptor::Descriptor;
use crate::core::detection::{DetectionSample, Expression, ExpressionKind, FaceBox, FrameSize, Point};

const DESCRIPTOR_LEN: usize = 128;
const LANDMARK_COUNT: usize = 68;

/// A video source that starts streaming after a number of readiness polls.
pub struct SyntheticCamera {
    frame: FrameSize,
    ready_after: u32,
    polls: AtomicU32,
}

impl SyntheticCamera {
    pub fn new(frame: FrameSize, ready_after: u32) -> Self {
        Self {
            frame,
            ready_after,
            polls: AtomicU32::new(0),
        }
    }

    /// Streaming from the first poll.
    pub fn ready(frame: FrameSize) -> Self {
        Self::new(frame, 0)
    }

    pub fn never_ready(frame: FrameSize) -> Self {
        Self::new(frame, u32::MAX)
    }

    pub fn polls(&self) -> u32 {
        self.polls.load(Ordering::SeqCst)
    }
}

impl VideoSource for SyntheticCamera {
    fn is_streaming(&self) -> bool {
        let seen = self.polls.fetch_add(1, Ordering::SeqCst).saturating_add(1);
        seen > self.ready_after
    }

    fn frame_size(&self) -> Option<FrameSize> {
        (self.polls() > self.ready_after).then_some(self.frame)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    /// Centered, neutral, well sized.
    Steady,
    /// Face at a tenth of the frame width.
    TooFar,
    /// Good position but a broad smile.
    Smiling,
    /// Steady with the face drifting off-center every fifth frame.
    Jittery,
}

impl FromStr for Scenario {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "steady" => Ok(Scenario::Steady),
            "too-far" => Ok(Scenario::TooFar),
            "smiling" => Ok(Scenario::Smiling),
            "jittery" => Ok(Scenario::Jittery),
            other => Err(format!(
                "unknown scenario '{}', expected steady, too-far, smiling or jittery", other
            )),
        }
    }
}

impl std::fmt::Display for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Scenario::Steady => "steady",
            Scenario::TooFar => "too-far",
            Scenario::Smiling => "smiling",
            Scenario::Jittery => "jittery",
        };
        f.write_str(name)
    }
}

/// Analyzer that replays a [`Scenario`], one sample per call.
pub struct ScriptedAnalyzer {
    scenario: Scenario,
    models_ready_after: u32,
    model_polls: AtomicU32,
    calls: AtomicU32,
}

impl ScriptedAnalyzer {
    pub fn new(scenario: Scenario) -> Self {
        Self::with_model_delay(scenario, 0)
    }

    /// Models report loaded only after `polls` readiness checks.
    pub fn with_model_delay(scenario: Scenario, polls: u32) -> Self {
        Self {
            scenario,
            models_ready_after: polls,
            model_polls: AtomicU32::new(0),
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn sample(&self, n: u32, frame: FrameSize) -> DetectionSample {
        let (cx, cy) = frame.center();
        let width = frame.width as f32;
        let neutral = Expression { kind: ExpressionKind::Neutral, confidence: 0.92 };

        let (side, cx, expression) = match self.scenario {
            Scenario::Steady => (width * 0.3, cx, neutral),
            Scenario::TooFar => (width * 0.1, cx, neutral),
            Scenario::Smiling => (
                width * 0.3,
                cx,
                Expression { kind: ExpressionKind::Happy, confidence: 0.97 },
            ),
            Scenario::Jittery if n % 5 == 0 => (width * 0.3, cx + width * 0.3, neutral),
            Scenario::Jittery => (width * 0.3, cx, neutral),
        };

        let face = FaceBox::centered_at(cx, cy, side, side);
        DetectionSample {
            detected: true,
            face_box: Some(face),
            yaw: Some(2.0),
            pitch: Some(-1.5),
            expression: Some(expression),
            descriptor: Some(synthetic_descriptor(n)),
            landmarks: ring_landmarks(&face),
            detection_score: Some(0.97),
        }
    }
}

#[async_trait]
impl FrameAnalyzer for ScriptedAnalyzer {
    fn models_loaded(&self) -> bool {
        let seen = self.model_polls.fetch_add(1, Ordering::SeqCst).saturating_add(1);
        seen > self.models_ready_after
    }

    async fn analyze_frame(&self, source: &dyn VideoSource) -> Result<DetectionSample, AnalyzerError> {
        let frame = source.frame_size().ok_or(AnalyzerError::SourceUnavailable)?;
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(self.sample(n, frame))
    }
}

/// Unit-length-ish vector that differs for every frame number.
pub fn synthetic_descriptor(n: u32) -> Descriptor {
    let values = (0..DESCRIPTOR_LEN)
        .map(|i| ((i as f32) * 0.37 + (n as f32) * 0.011).sin() * 0.088)
        .collect();
    Descriptor::new(values)
}

fn ring_landmarks(face: &FaceBox) -> Vec<Point> {
    let (cx, cy) = face.center();
    let radius = face.largest_side() / 2.0;
    (0..LANDMARK_COUNT)
        .map(|i| {
            let angle = i as f32 / LANDMARK_COUNT as f32 * std::f32::consts::TAU;
            Point {
                x: cx + radius * angle.cos(),
                y: cy + radius * angle.sin(),
            }
        })
        .collect()
}
