use crate::core::descriptor::Descriptor;
use crate::core::detection::{DetectionSample, FrameSize};
use crate::core::expression::{ExpressionGate, ExpressionVerdict};
use crate::core::guidance::Guidance;
use crate::core::hold_still::TickSignal;
use crate::core::position::{PositionAssessment, PositionValidator};
use crate::core::quality::CaptureQuality;

#[derive(Debug, Clone)]
pub struct TickEvaluation {
    pub assessment: PositionAssessment,
    pub expression: ExpressionVerdict,
    pub guidance: Guidance,
    /// Present only when the tick is fully good.
    pub descriptor: Option<Descriptor>,
}

impl TickEvaluation {
    pub fn is_good(&self) -> bool {
        self.descriptor.is_some()
    }

    pub fn into_signal(self) -> TickSignal {
        match self.descriptor {
            Some(descriptor) => TickSignal::Good(descriptor),
            None => TickSignal::Bad,
        }
    }
}

/// Size fixes come first, then an expression rejection, then whatever the
/// position validator asked for.
fn choose_guidance(assessment: &PositionAssessment, expression: &ExpressionVerdict) -> Guidance {
    if assessment.guidance.is_size_correction() {
        return assessment.guidance;
    }
    match expression.guidance {
        Some(rejection) if assessment.guidance != Guidance::PositionInCircle => rejection,
        _ => assessment.guidance,
    }
}

pub fn evaluate_tick(
    sample: &DetectionSample,
    frame: FrameSize,
    validator: &PositionValidator,
    gate: &ExpressionGate,
    quality: &dyn CaptureQuality,
) -> TickEvaluation {
    let assessment = validator.assess(sample, frame, quality);
    let expression = gate.check(sample.expression.as_ref());
    let guidance = choose_guidance(&assessment, &expression);

    let descriptor = if assessment.is_valid && expression.ok {
        sample.descriptor.clone()
    } else {
        None
    };

    TickEvaluation {
        assessment,
        expression,
        guidance,
        descriptor,
    }
}

/// Valid position, acceptable expression and a descriptor present.
pub fn is_good_tick(
    sample: &DetectionSample,
    frame: FrameSize,
    validator: &PositionValidator,
    gate: &ExpressionGate,
    quality: &dyn CaptureQuality,
) -> bool {
    evaluate_tick(sample, frame, validator, gate, quality).is_good()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::config::{ExpressionConfig, PositionConfig};
    use crate::core::detection::{Expression, ExpressionKind, FaceBox};

    struct Pass;

    impl CaptureQuality for Pass {
        fn is_capture_quality(&self, _: &DetectionSample, _: FrameSize) -> bool {
            true
        }
    }

    fn parts() -> (PositionValidator, ExpressionGate) {
        (
            PositionValidator::new(&PositionConfig::default()),
            ExpressionGate::new(&ExpressionConfig::default()),
        )
    }

    fn sample(side: f32, cx: f32, expression: Option<Expression>) -> DetectionSample {
        DetectionSample {
            detected: true,
            face_box: Some(FaceBox::centered_at(cx, 500.0, side, side)),
            yaw: Some(0.0),
            pitch: Some(0.0),
            expression,
            descriptor: Some(Descriptor::new(vec![0.25; 8])),
            ..Default::default()
        }
    }

    const FRAME: FrameSize = FrameSize { width: 1000, height: 1000 };

    fn smiling() -> Option<Expression> {
        Some(Expression { kind: ExpressionKind::Happy, confidence: 0.97 })
    }

    #[test]
    fn good_tick_carries_descriptor() {
        let (v, g) = parts();
        let eval = evaluate_tick(&sample(300.0, 500.0, None), FRAME, &v, &g, &Pass);
        assert!(eval.is_good());
        assert_eq!(eval.guidance, Guidance::HoldStill);
        assert!(matches!(eval.into_signal(), TickSignal::Good(_)));
    }

    #[test]
    fn missing_descriptor_is_bad() {
        let (v, g) = parts();
        let mut s = sample(300.0, 500.0, None);
        s.descriptor = None;
        assert!(!is_good_tick(&s, FRAME, &v, &g, &Pass));
    }

    #[test]
    fn expression_outranks_position_message() {
        let (v, g) = parts();
        let eval = evaluate_tick(&sample(300.0, 750.0, smiling()), FRAME, &v, &g, &Pass);
        assert!(!eval.is_good());
        assert_eq!(eval.guidance, Guidance::RelaxExpression(ExpressionKind::Happy));
    }

    #[test]
    fn size_correction_outranks_expression() {
        let (v, g) = parts();
        let eval = evaluate_tick(&sample(100.0, 500.0, smiling()), FRAME, &v, &g, &Pass);
        assert_eq!(eval.guidance, Guidance::MoveCloser);
    }

    #[test]
    fn smiling_in_good_position_is_bad_tick() {
        let (v, g) = parts();
        let eval = evaluate_tick(&sample(300.0, 500.0, smiling()), FRAME, &v, &g, &Pass);
        assert!(eval.assessment.is_valid);
        assert!(!eval.is_good());
    }
}
