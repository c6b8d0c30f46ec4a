use std::sync::Arc;
use std::time::Instant;

use crate::annotation::domain::frame_processor::FrameProcessor;
use crate::pipeline::stream_executor::{StreamConfig, StreamExecutor, StreamSummary};
use crate::shared::stream_metadata::StreamMetadata;
use crate::video::domain::frame_sink::FrameSink;
use crate::video::domain::frame_source::FrameSource;

/// Blocking poll loop on the calling thread: read one frame, annotate it,
/// show it, repeat.
///
/// Stops on the stop signal, the frame limit, end of stream, or the first
/// source or sink failure. Invalid frames are logged and skipped.
pub struct SequentialStreamExecutor;

impl StreamExecutor for SequentialStreamExecutor {
    fn execute(
        &self,
        mut source: Box<dyn FrameSource>,
        mut sink: Box<dyn FrameSink>,
        processor: Arc<dyn FrameProcessor>,
        metadata: &StreamMetadata,
        mut config: StreamConfig,
    ) -> Result<StreamSummary, Box<dyn std::error::Error>> {
        if let Err(e) = sink.open(metadata) {
            source.close();
            return Err(e);
        }
        config.logger.info(&format!(
            "Streaming {}x{} at {:.1} fps",
            metadata.width,
            metadata.height,
            metadata.effective_fps()
        ));

        let result = poll_loop(source.as_mut(), sink.as_mut(), processor.as_ref(), metadata, &mut config);
        source.close();
        let closed = sink.close();
        config.logger.summary();

        let summary = result?;
        closed?;
        log::info!("Stream finished: {summary}");
        Ok(summary)
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

fn poll_loop(
    source: &mut dyn FrameSource,
    sink: &mut dyn FrameSink,
    processor: &dyn FrameProcessor,
    metadata: &StreamMetadata,
    config: &mut StreamConfig,
) -> Result<StreamSummary, Box<dyn std::error::Error>> {
    let total = config.expected_frames(metadata);
    let mut summary = StreamSummary::default();
    let mut frames = source.frames();

    loop {
        if config.is_cancelled() {
            summary.stopped = true;
            break;
        }
        if config.limit_reached(summary.frames_read) {
            break;
        }

        let t0 = Instant::now();
        let Some(next) = frames.next() else {
            break;
        };
        let frame = next?;
        config.logger.timing("read", elapsed_ms(t0));
        summary.frames_read += 1;

        let t0 = Instant::now();
        let annotated = match processor.process(frame) {
            Ok(annotated) => annotated,
            Err(e) if e.is_recoverable() => {
                log::warn!("Skipping frame {}: {e}", summary.frames_read - 1);
                summary.frames_skipped += 1;
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        config.logger.timing("annotate", elapsed_ms(t0));
        summary.frames_annotated += 1;

        let t0 = Instant::now();
        sink.show(&annotated)?;
        config.logger.timing("show", elapsed_ms(t0));

        if !config.report_progress(summary.frames_annotated, total) {
            summary.stopped = true;
            break;
        }
    }

    Ok(summary)
}
