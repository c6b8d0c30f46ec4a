use crate::shared::error::AnnotateError;
use crate::shared::frame::Frame;

/// Push-style per-frame callback: one frame in, one frame out.
///
/// Transports (camera loops, media pipelines, tests) invoke this once per
/// arriving frame, possibly from several threads at once.
pub trait FrameProcessor: Send + Sync {
    fn process(&self, frame: Frame) -> Result<Frame, AnnotateError>;
}
