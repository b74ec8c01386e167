//! Temporal debouncing of the per-tick "frame is good" signal.
//!
//! A hold succeeds after `required_good_ticks` good ticks. Once progress has
//! started, up to `bad_tick_tolerance` consecutive bad ticks are forgiven so a
//! single dropped frame does not restart the hold; a longer streak does. A bad
//! tick before any progress keeps the count at zero.

use crate::common::config::HoldStillConfig;
use crate::core::descriptor::Descriptor;

pub enum TickSignal {
    Good(Descriptor),
    Bad,
}

/// The descriptor selected by a completed hold. Moved, never cloned.
#[derive(Debug, PartialEq)]
pub struct CapturedDescriptor {
    descriptor: Descriptor,
    good_ticks: u32,
}

impl CapturedDescriptor {
    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    pub fn good_ticks(&self) -> u32 {
        self.good_ticks
    }
}

#[derive(Debug, PartialEq)]
pub enum HoldOutcome {
    Progress { good_ticks: u32, bad_streak: u32 },
    Capture(CapturedDescriptor),
    Halted,
}

#[derive(Debug, Clone)]
pub struct HoldStillAccumulator {
    required_good_ticks: u32,
    bad_tick_tolerance: u32,
    good_ticks: u32,
    bad_streak: u32,
    last_good: Option<Descriptor>,
    halted: bool,
}

impl HoldStillAccumulator {
    pub fn new(config: &HoldStillConfig) -> Self {
        Self {
            required_good_ticks: config.required_good_ticks.max(1),
            bad_tick_tolerance: config.bad_tick_tolerance,
            good_ticks: 0,
            bad_streak: 0,
            last_good: None,
            halted: false,
        }
    }

    pub fn tick(&mut self, signal: TickSignal) -> HoldOutcome {
        if self.halted {
            return HoldOutcome::Halted;
        }

        match signal {
            TickSignal::Good(descriptor) => {
                self.good_ticks += 1;
                self.bad_streak = 0;
                self.last_good = Some(descriptor);

                if self.good_ticks >= self.required_good_ticks {
                    if let Some(descriptor) = self.last_good.take() {
                        self.halted = true;
                        return HoldOutcome::Capture(CapturedDescriptor {
                            descriptor,
                            good_ticks: self.good_ticks,
                        });
                    }
                }
            }
            TickSignal::Bad => {
                self.bad_streak += 1;
                if self.bad_streak > self.bad_tick_tolerance || self.good_ticks == 0 {
                    self.good_ticks = 0;
                    self.last_good = None;
                }
            }
        }

        HoldOutcome::Progress {
            good_ticks: self.good_ticks,
            bad_streak: self.bad_streak,
        }
    }

    /// Position lost: forget all progress and resume sampling.
    pub fn reset(&mut self) {
        self.good_ticks = 0;
        self.bad_streak = 0;
        self.last_good = None;
        self.halted = false;
    }

    pub fn good_ticks(&self) -> u32 {
        self.good_ticks
    }

    pub fn bad_streak(&self) -> u32 {
        self.bad_streak
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Hold completion in `[0, 1]` for the progress ring.
    pub fn progress(&self) -> f32 {
        if self.halted {
            return 1.0;
        }
        (self.good_ticks as f32 / self.required_good_ticks as f32).min(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accumulator() -> HoldStillAccumulator {
        HoldStillAccumulator::new(&HoldStillConfig::default())
    }

    fn good(marker: f32) -> TickSignal {
        TickSignal::Good(Descriptor::new(vec![marker; 4]))
    }

    /// Feeds a pattern of `G`/`B` ticks and returns every capture emitted.
    fn run(acc: &mut HoldStillAccumulator, pattern: &str) -> Vec<CapturedDescriptor> {
        let mut captures = Vec::new();
        for (i, c) in pattern.chars().enumerate() {
            let signal = if c == 'G' { good(i as f32) } else { TickSignal::Bad };
            if let HoldOutcome::Capture(captured) = acc.tick(signal) {
                captures.push(captured);
            }
        }
        captures
    }

    #[test]
    fn fifteen_good_ticks_capture_exactly_once() {
        let mut acc = accumulator();
        let captures = run(&mut acc, &"G".repeat(40));
        assert_eq!(captures.len(), 1);
        assert_eq!(captures[0].good_ticks(), 15);
        assert!(acc.is_halted());
        assert_eq!(acc.tick(good(99.0)), HoldOutcome::Halted);
    }

    #[test]
    fn fourteen_good_then_reset_streak_never_captures() {
        let mut acc = accumulator();
        let captures = run(&mut acc, &format!("{}BBBB", "G".repeat(14)));
        assert!(captures.is_empty());
        assert_eq!(acc.good_ticks(), 0);
    }

    #[test]
    fn isolated_bad_ticks_are_tolerated() {
        let mut acc = accumulator();
        let captures = run(&mut acc, "GGGGBGGGGBGGGGBGGG");
        assert_eq!(captures.len(), 1);
    }

    #[test]
    fn three_consecutive_bad_ticks_are_tolerated() {
        let mut acc = accumulator();
        let captures = run(&mut acc, &format!("{}BBB{}", "G".repeat(10), "G".repeat(5)));
        assert_eq!(captures.len(), 1);
    }

    #[test]
    fn fourth_consecutive_bad_tick_resets() {
        let mut acc = accumulator();
        run(&mut acc, &format!("{}BBB", "G".repeat(10)));
        assert_eq!(acc.good_ticks(), 10);
        assert_eq!(acc.bad_streak(), 3);
        acc.tick(TickSignal::Bad);
        assert_eq!(acc.good_ticks(), 0);
    }

    #[test]
    fn bad_tick_before_progress_stays_at_zero() {
        let mut acc = accumulator();
        run(&mut acc, "BG");
        assert_eq!(acc.good_ticks(), 1);
        acc.tick(TickSignal::Bad);
        assert_eq!(acc.good_ticks(), 1);
        let mut fresh = accumulator();
        fresh.tick(TickSignal::Bad);
        assert_eq!(fresh.good_ticks(), 0);
    }

    #[test]
    fn capture_uses_latest_good_descriptor() {
        let mut acc = accumulator();
        let captures = run(&mut acc, &format!("{}B{}", "G".repeat(7), "G".repeat(8)));
        assert_eq!(captures.len(), 1);
        // Last tick of the pattern is index 15.
        assert_eq!(captures[0].descriptor().as_slice(), &[15.0; 4]);
    }

    #[test]
    fn reset_clears_progress_and_resumes() {
        let mut acc = accumulator();
        run(&mut acc, &"G".repeat(15));
        assert!(acc.is_halted());
        acc.reset();
        assert_eq!(acc.progress(), 0.0);
        assert_eq!(run(&mut acc, &"G".repeat(15)).len(), 1);
    }

    #[test]
    fn progress_tracks_good_ticks() {
        let mut acc = accumulator();
        run(&mut acc, "GGG");
        assert!((acc.progress() - 0.2).abs() < 1e-6);
    }
}
