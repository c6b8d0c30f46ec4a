use std::sync::Arc;

use crate::annotation::domain::frame_processor::FrameProcessor;
use crate::video::domain::frame_sink::FrameSink;
use crate::video::domain::frame_source::FrameSource;

/// Single-still pipeline: read → annotate → write.
///
/// Unlike streams, an invalid image is an error: there is no next frame to
/// fall back to.
pub struct AnnotateImageUseCase {
    reader: Box<dyn FrameSource>,
    writer: Box<dyn FrameSink>,
    processor: Arc<dyn FrameProcessor>,
}

impl AnnotateImageUseCase {
    pub fn new(
        reader: Box<dyn FrameSource>,
        writer: Box<dyn FrameSink>,
        processor: Arc<dyn FrameProcessor>,
    ) -> Self {
        Self {
            reader,
            writer,
            processor,
        }
    }

    pub fn execute(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let metadata = self.reader.open()?;
        let frame = self.reader.frames().next().ok_or("No frames in image")??;
        self.reader.close();

        let annotated = self.processor.process(frame)?;

        self.writer.open(&metadata)?;
        self.writer.show(&annotated)?;
        self.writer.close()
    }
}
