use crate::common::config::QualityConfig;
use crate::core::detection::{DetectionSample, FrameSize};

/// The "good enough to enroll" predicate applied on top of geometry.
pub trait CaptureQuality: Send + Sync {
    fn is_capture_quality(&self, sample: &DetectionSample, frame: FrameSize) -> bool;
}

#[derive(Debug, Clone)]
pub struct QualityMetrics {
    pub detection_confidence: f32,
    pub face_centering_score: f32,
    pub landmark_coverage: f32,
    pub overall_score: f32,
}

impl QualityMetrics {
    /// Calculate quality metrics for one detection
    pub fn calculate(sample: &DetectionSample, frame: FrameSize, expected_landmarks: usize) -> Option<Self> {
        let face = sample.detected_box()?;

        // Analyzers without a score only report faces they are sure of
        let detection_confidence = sample.detection_score.unwrap_or(1.0).clamp(0.0, 1.0);

        let (face_center_x, face_center_y) = face.center();
        let (img_center_x, img_center_y) = frame.center();
        let x_offset = ((face_center_x - img_center_x).abs() / img_center_x).min(1.0);
        let y_offset = ((face_center_y - img_center_y).abs() / img_center_y).min(1.0);
        let face_centering_score = 1.0 - (x_offset + y_offset) / 2.0;

        let landmark_coverage = if expected_landmarks == 0 {
            1.0
        } else {
            (sample.landmarks.len() as f32 / expected_landmarks as f32).min(1.0)
        };

        let overall_score = detection_confidence * 0.4
            + face_centering_score * 0.3
            + landmark_coverage * 0.3;

        Some(QualityMetrics {
            detection_confidence,
            face_centering_score,
            landmark_coverage,
            overall_score,
        })
    }

    pub fn meets_minimum_requirements(&self, min_quality: f32) -> bool {
        self.overall_score >= min_quality
    }

    /// Get a human-readable quality assessment
    pub fn get_quality_assessment(&self) -> String {
        let quality_level = if self.overall_score >= 0.8 {
            "Excellent"
        } else if self.overall_score >= 0.7 {
            "Good"
        } else if self.overall_score >= 0.6 {
            "Acceptable"
        } else if self.overall_score >= 0.5 {
            "Poor"
        } else {
            "Very Poor"
        };

        format!("Quality: {} (score: {:.2})", quality_level, self.overall_score)
    }
}

/// Default [`CaptureQuality`] built from [`QualityMetrics`].
#[derive(Debug, Clone)]
pub struct QualityGate {
    min_quality: f32,
    expected_landmarks: usize,
}

impl QualityGate {
    pub fn new(config: &QualityConfig) -> Self {
        Self {
            min_quality: config.min_capture_quality,
            expected_landmarks: config.expected_landmarks,
        }
    }
}

impl CaptureQuality for QualityGate {
    fn is_capture_quality(&self, sample: &DetectionSample, frame: FrameSize) -> bool {
        let usable_descriptor = sample.descriptor.as_ref().is_some_and(|d| d.is_usable());
        if !usable_descriptor {
            return false;
        }
        match QualityMetrics::calculate(sample, frame, self.expected_landmarks) {
            Some(metrics) => {
                tracing::trace!("{}", metrics.get_quality_assessment());
                metrics.meets_minimum_requirements(self.min_quality)
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::descriptor::Descriptor;
    use crate::core::detection::{FaceBox, Point};

    fn sample(score: f32, landmarks: usize) -> DetectionSample {
        DetectionSample {
            detected: true,
            face_box: Some(FaceBox::centered_at(320.0, 240.0, 200.0, 200.0)),
            descriptor: Some(Descriptor::new(vec![0.5; 128])),
            landmarks: vec![Point { x: 0.0, y: 0.0 }; landmarks],
            detection_score: Some(score),
            ..Default::default()
        }
    }

    #[test]
    fn centered_confident_face_passes() {
        let gate = QualityGate::new(&QualityConfig::default());
        assert!(gate.is_capture_quality(&sample(0.95, 68), FrameSize::new(640, 480)));
    }

    #[test]
    fn weak_detection_without_landmarks_fails() {
        let gate = QualityGate::new(&QualityConfig::default());
        assert!(!gate.is_capture_quality(&sample(0.2, 0), FrameSize::new(640, 480)));
    }

    #[test]
    fn missing_descriptor_fails() {
        let gate = QualityGate::new(&QualityConfig::default());
        let mut s = sample(0.99, 68);
        s.descriptor = None;
        assert!(!gate.is_capture_quality(&s, FrameSize::new(640, 480)));
    }

    #[test]
    fn assessment_labels() {
        let metrics = QualityMetrics::calculate(&sample(1.0, 68), FrameSize::new(640, 480), 68).unwrap();
        assert!((metrics.overall_score - 1.0).abs() < 1e-6);
        assert!(metrics.get_quality_assessment().starts_with("Quality: Excellent"));
    }
}
