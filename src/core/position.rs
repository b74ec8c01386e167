use crate::common::config::PositionConfig;
use crate::core::detection::{DetectionSample, FrameSize};
use crate::core::guidance::Guidance;
use crate::core::quality::CaptureQuality;

/// Geometric verdict for one sample against one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionAssessment {
    pub is_centered: bool,
    pub is_sized: bool,
    pub is_in_circle: bool,
    pub is_angle_good: bool,
    pub is_valid: bool,
    pub guidance: Guidance,
    /// `max(box side) / frame width`, absent when no face was found.
    pub size_ratio: Option<f32>,
}

impl PositionAssessment {
    fn no_face() -> Self {
        Self {
            is_centered: false,
            is_sized: false,
            is_in_circle: false,
            is_angle_good: false,
            is_valid: false,
            guidance: Guidance::PositionInCircle,
            size_ratio: None,
        }
    }
}

/// Scores face placement: distance, head angle, centering.
#[derive(Debug, Clone)]
pub struct PositionValidator {
    thresholds: PositionConfig,
}

impl PositionValidator {
    pub fn new(thresholds: &PositionConfig) -> Self {
        Self { thresholds: thresholds.clone() }
    }

    pub fn assess(
        &self,
        sample: &DetectionSample,
        frame: FrameSize,
        quality: &dyn CaptureQuality,
    ) -> PositionAssessment {
        let t = &self.thresholds;
        let face = match sample.detected_box() {
            Some(face) if frame.width > 0 && frame.height > 0 => face,
            _ => return PositionAssessment::no_face(),
        };

        let (face_x, face_y) = face.center();
        let (frame_x, frame_y) = frame.center();
        let dx = face_x - frame_x;
        let dy = face_y - frame_y;
        let offset_x = dx.abs() / frame.width as f32;
        let offset_y = dy.abs() / frame.height as f32;
        let is_centered = offset_x < t.max_center_offset && offset_y < t.max_center_offset;

        let size_ratio = face.largest_side() / frame.width as f32;
        let is_sized = size_ratio >= t.min_face_ratio && size_ratio <= t.max_face_ratio;

        // Tighter than the drawn circle so the verdict does not flicker at its edge
        let radius = frame.min_dimension() * t.circle_ratio;
        let distance = (dx * dx + dy * dy).sqrt();
        let is_in_circle = distance < radius * t.inner_circle_factor;

        let yaw = sample.yaw.unwrap_or(0.0);
        let pitch = sample.pitch.unwrap_or(0.0);
        let yaw_good = yaw.abs() <= t.max_yaw_degrees;
        let pitch_good = pitch.abs() <= t.max_pitch_degrees;
        let is_angle_good = yaw_good && pitch_good;

        let is_valid = is_centered
            && is_sized
            && is_in_circle
            && is_angle_good
            && quality.is_capture_quality(sample, frame);

        let guidance = if !is_sized {
            if size_ratio < t.min_face_ratio {
                Guidance::MoveCloser
            } else {
                Guidance::MoveBack
            }
        } else if !yaw_good {
            if yaw > 0.0 { Guidance::TurnLeft } else { Guidance::TurnRight }
        } else if !pitch_good {
            if pitch > 0.0 { Guidance::LookDown } else { Guidance::LookUp }
        } else if !is_centered || !is_in_circle {
            self.position_correction(dx, dy, offset_x, offset_y)
        } else {
            Guidance::HoldStill
        };

        PositionAssessment {
            is_centered,
            is_sized,
            is_in_circle,
            is_angle_good,
            is_valid,
            guidance,
            size_ratio: Some(size_ratio),
        }
    }

    /// Correct along whichever axis is further off.
    fn position_correction(&self, dx: f32, dy: f32, offset_x: f32, offset_y: f32) -> Guidance {
        if offset_x >= offset_y {
            // The camera faces the subject, so image-right is the subject's left.
            let face_on_image_right = (dx > 0.0) != self.thresholds.mirrored_input;
            if face_on_image_right {
                Guidance::MoveRight
            } else {
                Guidance::MoveLeft
            }
        } else if dy > 0.0 {
            Guidance::MoveUp
        } else {
            Guidance::MoveDown
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::detection::FaceBox;

    struct AlwaysQuality(bool);

    impl CaptureQuality for AlwaysQuality {
        fn is_capture_quality(&self, _: &DetectionSample, _: FrameSize) -> bool {
            self.0
        }
    }

    fn validator() -> PositionValidator {
        PositionValidator::new(&PositionConfig::default())
    }

    fn face_at(cx: f32, cy: f32, side: f32) -> DetectionSample {
        DetectionSample {
            detected: true,
            face_box: Some(FaceBox::centered_at(cx, cy, side, side)),
            yaw: Some(0.0),
            pitch: Some(0.0),
            ..Default::default()
        }
    }

    #[test]
    fn undetected_is_always_invalid() {
        let v = validator();
        let frames = [FrameSize::new(640, 480), FrameSize::new(1000, 1000), FrameSize::new(1920, 1080)];
        let boxes = [
            Some(FaceBox::centered_at(320.0, 240.0, 200.0, 200.0)),
            Some(FaceBox::new(0.0, 0.0, 5.0, 5.0)),
            None,
        ];
        for frame in frames {
            for face_box in boxes {
                let sample = DetectionSample { detected: false, face_box, ..Default::default() };
                let a = v.assess(&sample, frame, &AlwaysQuality(true));
                assert!(!a.is_valid);
                assert_eq!(a.guidance, Guidance::PositionInCircle);
            }
        }
    }

    #[test]
    fn detected_without_box_counts_as_no_face() {
        let sample = DetectionSample { detected: true, ..Default::default() };
        let a = validator().assess(&sample, FrameSize::new(640, 480), &AlwaysQuality(true));
        assert_eq!(a, PositionAssessment::no_face());
    }

    #[test]
    fn size_ratio_boundaries_are_inclusive() {
        let v = validator();
        let frame = FrameSize::new(1000, 1000);
        let q = AlwaysQuality(true);

        let at_min = v.assess(&face_at(500.0, 500.0, 150.0), frame, &q);
        assert!(at_min.is_sized && at_min.is_valid);
        let below_min = v.assess(&face_at(500.0, 500.0, 149.0), frame, &q);
        assert!(!below_min.is_valid);
        assert_eq!(below_min.guidance, Guidance::MoveCloser);

        let at_max = v.assess(&face_at(500.0, 500.0, 600.0), frame, &q);
        assert!(at_max.is_sized && at_max.is_valid);
        let above_max = v.assess(&face_at(500.0, 500.0, 601.0), frame, &q);
        assert!(!above_max.is_valid);
        assert_eq!(above_max.guidance, Guidance::MoveBack);
    }

    #[test]
    fn valid_face_says_hold_still() {
        let a = validator().assess(&face_at(320.0, 240.0, 200.0), FrameSize::new(640, 480), &AlwaysQuality(true));
        assert!(a.is_valid);
        assert_eq!(a.guidance, Guidance::HoldStill);
    }

    #[test]
    fn size_outranks_angle() {
        let mut sample = face_at(500.0, 500.0, 100.0);
        sample.yaw = Some(30.0);
        let a = validator().assess(&sample, FrameSize::new(1000, 1000), &AlwaysQuality(true));
        assert!(!a.is_angle_good);
        assert_eq!(a.guidance, Guidance::MoveCloser);
    }

    #[test]
    fn angle_guidance_follows_sign() {
        let v = validator();
        let frame = FrameSize::new(1000, 1000);
        let q = AlwaysQuality(true);
        let cases = [
            (Some(20.0), Some(0.0), Guidance::TurnLeft),
            (Some(-20.0), Some(0.0), Guidance::TurnRight),
            (Some(0.0), Some(20.0), Guidance::LookDown),
            (Some(0.0), Some(-20.0), Guidance::LookUp),
        ];
        for (yaw, pitch, expected) in cases {
            let mut sample = face_at(500.0, 500.0, 300.0);
            sample.yaw = yaw;
            sample.pitch = pitch;
            let a = v.assess(&sample, frame, &q);
            assert!(!a.is_valid);
            assert_eq!(a.guidance, expected);
        }
    }

    #[test]
    fn angle_outranks_position() {
        let mut sample = face_at(750.0, 500.0, 300.0);
        sample.pitch = Some(-25.0);
        let a = validator().assess(&sample, FrameSize::new(1000, 1000), &AlwaysQuality(true));
        assert_eq!(a.guidance, Guidance::LookUp);
    }

    #[test]
    fn missing_angles_pass() {
        let mut sample = face_at(500.0, 500.0, 300.0);
        sample.yaw = None;
        sample.pitch = None;
        let a = validator().assess(&sample, FrameSize::new(1000, 1000), &AlwaysQuality(true));
        assert!(a.is_angle_good && a.is_valid);
    }

    #[test]
    fn position_uses_larger_axis() {
        let v = validator();
        let frame = FrameSize::new(1000, 1000);
        let q = AlwaysQuality(true);

        assert_eq!(v.assess(&face_at(700.0, 550.0, 200.0), frame, &q).guidance, Guidance::MoveRight);
        assert_eq!(v.assess(&face_at(300.0, 550.0, 200.0), frame, &q).guidance, Guidance::MoveLeft);
        assert_eq!(v.assess(&face_at(520.0, 300.0, 200.0), frame, &q).guidance, Guidance::MoveDown);
        assert_eq!(v.assess(&face_at(520.0, 700.0, 200.0), frame, &q).guidance, Guidance::MoveUp);
    }

    #[test]
    fn mirrored_input_flips_horizontal_guidance() {
        let config = PositionConfig { mirrored_input: true, ..Default::default() };
        let v = PositionValidator::new(&config);
        let a = v.assess(&face_at(700.0, 500.0, 200.0), FrameSize::new(1000, 1000), &AlwaysQuality(true));
        assert_eq!(a.guidance, Guidance::MoveLeft);
    }

    #[test]
    fn circle_is_stricter_than_centering() {
        // 140 px right in a 1000x400 frame: offset 0.14 passes centering,
        // but the inner circle radius is 400 * 0.35 * 0.8 = 112 px.
        let a = validator().assess(&face_at(640.0, 200.0, 200.0), FrameSize::new(1000, 400), &AlwaysQuality(true));
        assert!(a.is_centered);
        assert!(!a.is_in_circle);
        assert!(!a.is_valid);
        assert_eq!(a.guidance, Guidance::MoveRight);
    }

    #[test]
    fn quality_failure_invalidates_good_geometry() {
        let a = validator().assess(&face_at(500.0, 500.0, 300.0), FrameSize::new(1000, 1000), &AlwaysQuality(false));
        assert!(a.is_centered && a.is_sized && a.is_in_circle && a.is_angle_good);
        assert!(!a.is_valid);
        assert_eq!(a.guidance, Guidance::HoldStill);
    }
}
