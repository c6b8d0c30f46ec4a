use crate::shared::frame::Frame;

/// Caller-supplied transformation applied to a frame before detection.
pub trait FramePreprocessor: Send + Sync {
    fn apply(&self, frame: &mut Frame);
}
