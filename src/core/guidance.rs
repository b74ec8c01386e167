use serde::{Deserialize, Serialize};
use crate::core::detection::ExpressionKind;

/// The one instruction shown to the person in front of the kiosk.
///
/// Directions are from the subject's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Guidance {
    PositionInCircle,
    MoveCloser,
    MoveBack,
    TurnLeft,
    TurnRight,
    LookUp,
    LookDown,
    MoveLeft,
    MoveRight,
    MoveUp,
    MoveDown,
    RelaxExpression(ExpressionKind),
    HoldStill,
}

impl Guidance {
    pub fn is_size_correction(&self) -> bool {
        matches!(self, Guidance::MoveCloser | Guidance::MoveBack)
    }

    pub fn message(&self) -> &'static str {
        match self {
            Guidance::PositionInCircle => "Position your face in the circle",
            Guidance::MoveCloser => "Move closer",
            Guidance::MoveBack => "Move back",
            Guidance::TurnLeft => "Turn your head slightly left",
            Guidance::TurnRight => "Turn your head slightly right",
            Guidance::LookUp => "Look up slightly",
            Guidance::LookDown => "Look down slightly",
            Guidance::MoveLeft => "Move left",
            Guidance::MoveRight => "Move right",
            Guidance::MoveUp => "Move up",
            Guidance::MoveDown => "Move down",
            Guidance::RelaxExpression(ExpressionKind::Happy) => "Please don't smile, keep a neutral face",
            Guidance::RelaxExpression(ExpressionKind::Surprised) => "Relax your face, keep a neutral expression",
            Guidance::RelaxExpression(_) => "Please keep a neutral expression",
            Guidance::HoldStill => "Hold still",
        }
    }
}

impl std::fmt::Display for Guidance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}
