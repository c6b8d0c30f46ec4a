use std::path::{Path, PathBuf};

use crate::shared::frame::Frame;
use crate::shared::stream_metadata::StreamMetadata;
use crate::video::domain::frame_sink::FrameSink;
use crate::video::infrastructure::image_file_writer::save_rgb;

/// Writes every frame as a numbered PNG (`frame_000042.png`) in a directory.
pub struct ImageSequenceWriter {
    dir: PathBuf,
    written: usize,
}

impl ImageSequenceWriter {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            written: 0,
        }
    }

    pub fn frame_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("frame_{index:06}.png"))
    }
}

impl FrameSink for ImageSequenceWriter {
    fn open(&mut self, _metadata: &StreamMetadata) -> Result<(), Box<dyn std::error::Error>> {
        std::fs::create_dir_all(&self.dir)?;
        self.written = 0;
        Ok(())
    }

    fn show(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        save_rgb(&self.frame_path(frame.index()), frame)?;
        self.written += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        log::info!("Wrote {} frames to {}", self.written, self.dir.display());
        Ok(())
    }
}
