use std::path::{Path, PathBuf};

use crate::shared::frame::Frame;
use crate::shared::stream_metadata::StreamMetadata;
use crate::video::domain::frame_sink::FrameSink;

/// Writes frames to one image file using the `image` crate.
///
/// The encoder is picked from the file extension. Each shown frame replaces
/// the file, so for a stream the last frame wins.
pub struct ImageFileWriter {
    path: PathBuf,
}

impl ImageFileWriter {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

/// Saves `frame` to `path` as RGB, creating parent directories.
pub(super) fn save_rgb(path: &Path, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let img = image::RgbImage::from_raw(frame.width(), frame.height(), frame.rgb_data().into_owned())
        .ok_or("Failed to create image from frame data")?;
    img.save(path)?;
    Ok(())
}

impl FrameSink for ImageFileWriter {
    fn open(&mut self, _metadata: &StreamMetadata) -> Result<(), Box<dyn std::error::Error>> {
        image::ImageFormat::from_path(&self.path)?;
        Ok(())
    }

    fn show(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        save_rgb(&self.path, frame)
    }

    fn close(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        Ok(())
    }
}
