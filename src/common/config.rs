use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use crate::common::error::{EnrollError, Result};

pub const DEFAULT_CONFIG_PATH: &str = "configs/kiosk-enroll.toml";

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub position: PositionConfig,
    #[serde(default)]
    pub expression: ExpressionConfig,
    #[serde(default)]
    pub hold_still: HoldStillConfig,
    #[serde(default)]
    pub quality: QualityConfig,
    #[serde(default)]
    pub warmup: WarmupConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub cards: Vec<CardEntry>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PositionConfig {
    #[serde(default = "default_min_face_ratio")]
    pub min_face_ratio: f32,
    #[serde(default = "default_max_face_ratio")]
    pub max_face_ratio: f32,
    #[serde(default = "default_max_center_offset")]
    pub max_center_offset: f32,
    #[serde(default = "default_max_angle")]
    pub max_yaw_degrees: f32,
    #[serde(default = "default_max_angle")]
    pub max_pitch_degrees: f32,
    #[serde(default = "default_circle_ratio")]
    pub circle_ratio: f32,
    /// Fraction of the drawn circle a face center must stay inside.
    #[serde(default = "default_inner_circle_factor")]
    pub inner_circle_factor: f32,
    /// Set when the analyzer sees a horizontally flipped frame.
    #[serde(default)]
    pub mirrored_input: bool,
}

fn default_min_face_ratio() -> f32 { 0.15 }
fn default_max_face_ratio() -> f32 { 0.60 }
fn default_max_center_offset() -> f32 { 0.15 }
fn default_max_angle() -> f32 { 15.0 }
fn default_circle_ratio() -> f32 { 0.35 }
fn default_inner_circle_factor() -> f32 { 0.8 }

impl Default for PositionConfig {
    fn default() -> Self {
        Self {
            min_face_ratio: default_min_face_ratio(),
            max_face_ratio: default_max_face_ratio(),
            max_center_offset: default_max_center_offset(),
            max_yaw_degrees: default_max_angle(),
            max_pitch_degrees: default_max_angle(),
            circle_ratio: default_circle_ratio(),
            inner_circle_factor: default_inner_circle_factor(),
            mirrored_input: false,
        }
    }
}

/// Confidence above which an expression disqualifies a frame.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ExpressionConfig {
    #[serde(default = "default_happy")]
    pub happy: f32,
    #[serde(default = "default_sad")]
    pub sad: f32,
    #[serde(default = "default_angry")]
    pub angry: f32,
    #[serde(default = "default_surprised")]
    pub surprised: f32,
    #[serde(default = "default_fearful")]
    pub fearful: f32,
    #[serde(default = "default_disgusted")]
    pub disgusted: f32,
}

fn default_happy() -> f32 { 0.85 }
fn default_sad() -> f32 { 0.95 }
fn default_angry() -> f32 { 0.85 }
fn default_surprised() -> f32 { 0.85 }
fn default_fearful() -> f32 { 0.90 }
fn default_disgusted() -> f32 { 0.90 }

impl Default for ExpressionConfig {
    fn default() -> Self {
        Self {
            happy: default_happy(),
            sad: default_sad(),
            angry: default_angry(),
            surprised: default_surprised(),
            fearful: default_fearful(),
            disgusted: default_disgusted(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HoldStillConfig {
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_required_good_ticks")]
    pub required_good_ticks: u32,
    #[serde(default = "default_bad_tick_tolerance")]
    pub bad_tick_tolerance: u32,
}

fn default_tick_interval() -> u64 { 100 }
fn default_required_good_ticks() -> u32 { 15 }
fn default_bad_tick_tolerance() -> u32 { 3 }

impl Default for HoldStillConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval(),
            required_good_ticks: default_required_good_ticks(),
            bad_tick_tolerance: default_bad_tick_tolerance(),
        }
    }
}

impl HoldStillConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct QualityConfig {
    #[serde(default = "default_min_capture_quality")]
    pub min_capture_quality: f32,
    #[serde(default = "default_expected_landmarks")]
    pub expected_landmarks: usize,
}

fn default_min_capture_quality() -> f32 { 0.6 }
fn default_expected_landmarks() -> usize { 68 }

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            min_capture_quality: default_min_capture_quality(),
            expected_landmarks: default_expected_landmarks(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WarmupConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_camera_poll_budget")]
    pub camera_poll_budget: u32,
    #[serde(default = "default_model_poll_budget")]
    pub model_poll_budget: u32,
    /// Pause between readiness and the first sample, covers the fade-in.
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,
}

fn default_poll_interval() -> u64 { 100 }
fn default_camera_poll_budget() -> u32 { 50 }
fn default_model_poll_budget() -> u32 { 100 }
fn default_settle_delay() -> u64 { 300 }

impl Default for WarmupConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            camera_poll_budget: default_camera_poll_budget(),
            model_poll_budget: default_model_poll_budget(),
            settle_delay_ms: default_settle_delay(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WorkflowConfig {
    #[serde(default = "default_success_display")]
    pub success_display_ms: u64,
}

fn default_success_display() -> u64 { 3000 }

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            success_display_ms: default_success_display(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

/// A card known to the local backend.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CardEntry {
    pub token: String,
    pub id: String,
    pub name: String,
    pub username: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from_path(Path::new(DEFAULT_CONFIG_PATH))
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(EnrollError::Config(format!(
                "Config file not found: {}. Please create it from the example.", path.display()
            )));
        }

        tracing::info!("Loading config from: {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)
            .map_err(|e| EnrollError::Config(format!("Config parse error: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let p = &self.position;
        for (name, value) in [
            ("min_face_ratio", p.min_face_ratio),
            ("max_face_ratio", p.max_face_ratio),
            ("max_center_offset", p.max_center_offset),
            ("circle_ratio", p.circle_ratio),
            ("inner_circle_factor", p.inner_circle_factor),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(EnrollError::Config(format!(
                    "position.{} must be in (0, 1], got {}", name, value
                )));
            }
        }
        if p.min_face_ratio >= p.max_face_ratio {
            return Err(EnrollError::Config(format!(
                "position.min_face_ratio ({}) must be below max_face_ratio ({})",
                p.min_face_ratio, p.max_face_ratio
            )));
        }
        if !(p.max_yaw_degrees > 0.0 && p.max_yaw_degrees <= 90.0) {
            return Err(EnrollError::Config(format!(
                "position.max_yaw_degrees must be between 0 and 90, got {}", p.max_yaw_degrees
            )));
        }
        if !(p.max_pitch_degrees > 0.0 && p.max_pitch_degrees <= 90.0) {
            return Err(EnrollError::Config(format!(
                "position.max_pitch_degrees must be between 0 and 90, got {}", p.max_pitch_degrees
            )));
        }

        let e = &self.expression;
        for (name, value) in [
            ("happy", e.happy),
            ("sad", e.sad),
            ("angry", e.angry),
            ("surprised", e.surprised),
            ("fearful", e.fearful),
            ("disgusted", e.disgusted),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(EnrollError::Config(format!(
                    "expression.{} must be between 0.0 and 1.0, got {}", name, value
                )));
            }
        }

        if self.hold_still.tick_interval_ms == 0 {
            return Err(EnrollError::Config("hold_still.tick_interval_ms must be positive".into()));
        }
        if self.hold_still.required_good_ticks == 0 {
            return Err(EnrollError::Config("hold_still.required_good_ticks must be positive".into()));
        }

        if !(0.0..=1.0).contains(&self.quality.min_capture_quality) {
            return Err(EnrollError::Config(format!(
                "quality.min_capture_quality must be between 0.0 and 1.0, got {}",
                self.quality.min_capture_quality
            )));
        }

        let w = &self.warmup;
        if w.poll_interval_ms == 0 || w.camera_poll_budget == 0 || w.model_poll_budget == 0 {
            return Err(EnrollError::Config(
                "warmup poll interval and budgets must be positive".into()
            ));
        }

        Ok(())
    }

    pub fn find_card(&self, token: &str) -> Option<&CardEntry> {
        self.cards.iter().find(|card| card.token == token)
    }
}
