use crate::shared::frame::Frame;
use crate::shared::stream_metadata::StreamMetadata;

/// Consumes annotated frames: a file on disk or a display surface.
///
/// Sinks accept frames in any [`PixelFormat`](crate::shared::frame::PixelFormat)
/// and convert to RGB themselves.
pub trait FrameSink: Send {
    fn open(&mut self, metadata: &StreamMetadata) -> Result<(), Box<dyn std::error::Error>>;

    fn show(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>>;

    /// Flushes buffered output.
    fn close(&mut self) -> Result<(), Box<dyn std::error::Error>>;
}
