use std::sync::Arc;

use crate::annotation::domain::frame_processor::FrameProcessor;
use crate::pipeline::stream_executor::{StreamConfig, StreamExecutor, StreamSummary};
use crate::shared::stream_metadata::StreamMetadata;
use crate::video::domain::frame_sink::FrameSink;
use crate::video::domain::frame_source::FrameSource;

/// Orchestrates a live or recorded annotation stream.
///
/// Wires the source, processor and sink together and hands them to a
/// [`StreamExecutor`]. Single-use: `execute` consumes the owned components,
/// so calling it twice fails.
pub struct AnnotateStreamUseCase {
    source: Option<Box<dyn FrameSource>>,
    sink: Option<Box<dyn FrameSink>>,
    processor: Arc<dyn FrameProcessor>,
    executor: Box<dyn StreamExecutor>,
    config: Option<StreamConfig>,
}

impl AnnotateStreamUseCase {
    pub fn new(
        source: Box<dyn FrameSource>,
        sink: Box<dyn FrameSink>,
        processor: Arc<dyn FrameProcessor>,
        executor: Box<dyn StreamExecutor>,
        config: StreamConfig,
    ) -> Self {
        Self {
            source: Some(source),
            sink: Some(sink),
            processor,
            executor,
            config: Some(config),
        }
    }

    /// Runs the stream. `metadata` is what the already-opened source reported.
    pub fn execute(
        &mut self,
        metadata: &StreamMetadata,
    ) -> Result<StreamSummary, Box<dyn std::error::Error>> {
        let source = self.source.take().ok_or("Stream already executed")?;
        let sink = self.sink.take().ok_or("Stream already executed")?;
        let config = self.config.take().ok_or("Stream already executed")?;

        self.executor
            .execute(source, sink, self.processor.clone(), metadata, config)
    }
}
