use crate::shared::frame::Frame;
use crate::shared::stream_metadata::StreamMetadata;

/// Produces frames from a camera, a video file or a still image.
///
/// The source knows where it reads from when it is constructed; `open`
/// acquires the underlying resource. Iterator exhaustion is the end of the
/// stream and is not an error.
pub trait FrameSource: Send {
    fn open(&mut self) -> Result<StreamMetadata, Box<dyn std::error::Error>>;

    /// Returns an iterator over frames in capture order.
    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_>;

    /// Releases the device or file. Safe to call more than once.
    fn close(&mut self);
}
