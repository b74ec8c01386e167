use crate::common::config::ExpressionConfig;
use crate::core::detection::{Expression, ExpressionKind};
use crate::core::guidance::Guidance;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExpressionVerdict {
    pub ok: bool,
    /// Set only when `ok` is false.
    pub guidance: Option<Guidance>,
}

impl ExpressionVerdict {
    fn pass() -> Self {
        Self { ok: true, guidance: None }
    }

    pub fn message(&self) -> Option<&'static str> {
        self.guidance.map(|g| g.message())
    }
}

/// Rejects frames showing a strong non-neutral expression.
#[derive(Debug, Clone)]
pub struct ExpressionGate {
    thresholds: ExpressionConfig,
}

impl ExpressionGate {
    pub fn new(thresholds: &ExpressionConfig) -> Self {
        Self { thresholds: thresholds.clone() }
    }

    pub fn threshold(&self, kind: ExpressionKind) -> Option<f32> {
        let t = &self.thresholds;
        match kind {
            ExpressionKind::Neutral => None,
            ExpressionKind::Happy => Some(t.happy),
            ExpressionKind::Sad => Some(t.sad),
            ExpressionKind::Angry => Some(t.angry),
            ExpressionKind::Surprised => Some(t.surprised),
            ExpressionKind::Fearful => Some(t.fearful),
            ExpressionKind::Disgusted => Some(t.disgusted),
        }
    }

    pub fn check(&self, expression: Option<&Expression>) -> ExpressionVerdict {
        let Some(expression) = expression else {
            return ExpressionVerdict::pass();
        };
        match self.threshold(expression.kind) {
            Some(limit) if expression.confidence > limit => ExpressionVerdict {
                ok: false,
                guidance: Some(Guidance::RelaxExpression(expression.kind)),
            },
            _ => ExpressionVerdict::pass(),
        }
    }
}
