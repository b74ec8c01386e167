use serde::{Deserialize, Serialize};
use crate::core::descriptor::Descriptor;

/// Axis-aligned face box in frame pixels, origin at the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl FaceBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Box of the given size centered on `(cx, cy)`.
    pub fn centered_at(cx: f32, cy: f32, width: f32, height: f32) -> Self {
        Self::new(cx - width / 2.0, cy - height / 2.0, width, height)
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn largest_side(&self) -> f32 {
        self.width.max(self.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn center(&self) -> (f32, f32) {
        (self.width as f32 / 2.0, self.height as f32 / 2.0)
    }

    pub fn min_dimension(&self) -> f32 {
        self.width.min(self.height) as f32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpressionKind {
    Neutral,
    Happy,
    Sad,
    Angry,
    Surprised,
    Fearful,
    Disgusted,
}

impl std::fmt::Display for ExpressionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ExpressionKind::Neutral => "neutral",
            ExpressionKind::Happy => "happy",
            ExpressionKind::Sad => "sad",
            ExpressionKind::Angry => "angry",
            ExpressionKind::Surprised => "surprised",
            ExpressionKind::Fearful => "fearful",
            ExpressionKind::Disgusted => "disgusted",
        };
        f.write_str(name)
    }
}

/// Dominant expression reported by the analyzer for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Expression {
    pub kind: ExpressionKind,
    pub confidence: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

/// Everything the analyzer reports about one frame.
///
/// Angles are in degrees. Positive yaw means the face is turned toward the
/// subject's right, positive pitch means the subject is looking up.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionSample {
    pub detected: bool,
    pub face_box: Option<FaceBox>,
    pub yaw: Option<f32>,
    pub pitch: Option<f32>,
    pub expression: Option<Expression>,
    pub descriptor: Option<Descriptor>,
    pub landmarks: Vec<Point>,
    /// Detector confidence in `[0, 1]`, when the analyzer exposes one.
    pub detection_score: Option<f32>,
}

impl DetectionSample {
    pub fn no_face() -> Self {
        Self::default()
    }

    /// The face box, only when the analyzer actually detected a face.
    pub fn detected_box(&self) -> Option<&FaceBox> {
        if self.detected {
            self.face_box.as_ref()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn box_geometry() {
        let b = FaceBox::centered_at(320.0, 240.0, 100.0, 120.0);
        assert_eq!(b.x, 270.0);
        assert_eq!(b.y, 180.0);
        assert_eq!(b.center(), (320.0, 240.0));
        assert_eq!(b.largest_side(), 120.0);
    }

    #[test]
    fn undetected_sample_hides_box() {
        let sample = DetectionSample {
            detected: false,
            face_box: Some(FaceBox::new(0.0, 0.0, 10.0, 10.0)),
            ..Default::default()
        };
        assert!(sample.detected_box().is_none());
    }
}
