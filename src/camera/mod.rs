//! Contracts for the already-running video source and the face analyzer.
//!
//! Both are owned by the hosting kiosk shell; the enrollment workflow only
//! polls their readiness and asks for one analysis per tick.

use async_trait::async_trait;
use crate::common::AnalyzerError;
use crate::core::detection::{DetectionSample, FrameSize};

pub trait VideoSource: Send + Sync {
    /// True once frames are flowing.
    fn is_streaming(&self) -> bool;

    /// Current frame dimensions, `None` until the first frame arrives.
    fn frame_size(&self) -> Option<FrameSize>;
}

#[async_trait]
pub trait FrameAnalyzer: Send + Sync {
    /// True once detection, landmark, expression and descriptor models are loaded.
    fn models_loaded(&self) -> bool;

    async fn analyze_frame(&self, source: &dyn VideoSource) -> Result<DetectionSample, AnalyzerError>;
}
