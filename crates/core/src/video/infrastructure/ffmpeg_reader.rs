use std::path::{Path, PathBuf};

use crate::shared::frame::Frame;
use crate::shared::stream_metadata::StreamMetadata;
use crate::video::domain::frame_source::FrameSource;
use crate::video::infrastructure::ffmpeg_decoder;

/// Decodes a video file via ffmpeg-next (libavformat + libavcodec).
///
/// Each decoded frame is converted to RGB24.
pub struct FfmpegReader {
    path: PathBuf,
    input_ctx: Option<ffmpeg_next::format::context::Input>,
    video_stream_index: usize,
}

// Safety: FfmpegReader is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegReader {}

impl FfmpegReader {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            input_ctx: None,
            video_stream_index: 0,
        }
    }
}

impl FrameSource for FfmpegReader {
    fn open(&mut self) -> Result<StreamMetadata, Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;

        let ictx = ffmpeg_next::format::input(&self.path)?;
        let (metadata, index) = ffmpeg_decoder::describe(&ictx, Some(self.path.clone()))?;
        log::info!(
            "Opened {} ({}x{} @ {:.2} fps, {} frames, {})",
            self.path.display(),
            metadata.width,
            metadata.height,
            metadata.fps,
            metadata.total_frames,
            metadata.codec
        );

        self.video_stream_index = index;
        self.input_ctx = Some(ictx);
        Ok(metadata)
    }

    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
        match self.input_ctx.as_mut() {
            Some(ictx) => ffmpeg_decoder::decode(ictx, self.video_stream_index),
            None => Box::new(std::iter::once(Err("FfmpegReader: not opened".into()))),
        }
    }

    fn close(&mut self) {
        self.input_ctx = None;
    }
}
