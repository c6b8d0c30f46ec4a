use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::annotation::domain::frame_processor::FrameProcessor;
use crate::pipeline::pipeline_logger::{NullPipelineLogger, PipelineLogger};
use crate::shared::stream_metadata::StreamMetadata;
use crate::video::domain::frame_sink::FrameSink;
use crate::video::domain::frame_source::FrameSource;

/// Controls for one streaming run.
pub struct StreamConfig {
    /// Stop after this many frames have been read.
    pub max_frames: Option<usize>,
    /// Called after each delivered frame with `(delivered, total)`;
    /// returning `false` stops the run.
    pub on_progress: Option<Box<dyn Fn(usize, usize) -> bool + Send>>,
    /// User stop signal, checked before every frame.
    pub cancelled: Arc<AtomicBool>,
    pub logger: Box<dyn PipelineLogger>,
}

impl StreamConfig {
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Whether `frames_read` frames already satisfy the frame limit.
    pub fn limit_reached(&self, frames_read: usize) -> bool {
        self.max_frames.is_some_and(|max| frames_read >= max)
    }

    /// Frame count to report progress against, 0 when unbounded.
    pub fn expected_frames(&self, metadata: &StreamMetadata) -> usize {
        match self.max_frames {
            Some(max) if metadata.total_frames == 0 => max,
            Some(max) => max.min(metadata.total_frames),
            None => metadata.total_frames,
        }
    }

    /// Reports a delivered frame. Returns `false` when the callback asks to stop.
    pub fn report_progress(&mut self, delivered: usize, total: usize) -> bool {
        self.logger.progress(delivered, total);
        self.on_progress
            .as_ref()
            .map_or(true, |callback| callback(delivered, total))
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_frames: None,
            on_progress: None,
            cancelled: Arc::new(AtomicBool::new(false)),
            logger: Box::new(NullPipelineLogger),
        }
    }
}

/// Outcome of a streaming run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StreamSummary {
    pub frames_read: usize,
    pub frames_annotated: usize,
    /// Frames rejected by the annotator as invalid.
    pub frames_skipped: usize,
    /// True when the stop signal or the progress callback ended the run.
    pub stopped: bool,
}

impl fmt::Display for StreamSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} frames read, {} annotated, {} skipped",
            self.frames_read, self.frames_annotated, self.frames_skipped
        )?;
        if self.stopped {
            write!(f, " (stopped)")?;
        }
        Ok(())
    }
}

/// Drives frames from an opened source, through the processor, into a sink.
///
/// The source must already be open; `metadata` is what it reported. The
/// executor opens and closes the sink and closes the source.
pub trait StreamExecutor: Send {
    fn execute(
        &self,
        source: Box<dyn FrameSource>,
        sink: Box<dyn FrameSink>,
        processor: Arc<dyn FrameProcessor>,
        metadata: &StreamMetadata,
        config: StreamConfig,
    ) -> Result<StreamSummary, Box<dyn std::error::Error>>;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StreamConfig::default();
        assert!(!config.is_cancelled());
        assert!(!config.limit_reached(1_000_000));
    }

    #[test]
    fn test_limit_reached() {
        let config = StreamConfig {
            max_frames: Some(3),
            ..StreamConfig::default()
        };
        assert!(!config.limit_reached(2));
        assert!(config.limit_reached(3));
    }

    #[test]
    fn test_expected_frames() {
        let mut config = StreamConfig::default();
        assert_eq!(config.expected_frames(&fixtures::metadata(0)), 0);
        assert_eq!(config.expected_frames(&fixtures::metadata(50)), 50);
        config.max_frames = Some(10);
        assert_eq!(config.expected_frames(&fixtures::metadata(0)), 10);
        assert_eq!(config.expected_frames(&fixtures::metadata(5)), 5);
    }

    #[test]
    fn test_progress_callback_can_stop() {
        let mut config = StreamConfig {
            on_progress: Some(Box::new(|delivered, _| delivered < 2)),
            ..StreamConfig::default()
        };
        assert!(config.report_progress(1, 0));
        assert!(!config.report_progress(2, 0));
    }

    #[test]
    fn test_cancel_flag_is_shared() {
        let config = StreamConfig::default();
        let handle = config.cancelled.clone();
        handle.store(true, Ordering::Relaxed);
        assert!(config.is_cancelled());
    }

    #[test]
    fn test_summary_display() {
        let summary = StreamSummary {
            frames_read: 10,
            frames_annotated: 9,
            frames_skipped: 1,
            stopped: true,
        };
        assert_eq!(
            summary.to_string(),
            "10 frames read, 9 annotated, 1 skipped (stopped)"
        );
    }
}
