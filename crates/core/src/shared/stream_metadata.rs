use std::path::PathBuf;

use crate::shared::constants::FALLBACK_FPS;

/// Properties of a frame stream, reported by a source when it is opened.
///
/// `total_frames == 0` means the length is unknown, which is always the case
/// for live capture and sometimes for files whose container has no count.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub total_frames: usize,
    pub codec: String,
    pub source_path: Option<PathBuf>,
    /// Set by capture devices; such streams only end when stopped.
    pub live: bool,
}

impl StreamMetadata {
    pub fn is_live(&self) -> bool {
        self.live
    }

    /// Frame rate to use for encoding, falling back when the source has none.
    pub fn effective_fps(&self) -> f64 {
        if self.fps > 0.0 {
            self.fps
        } else {
            FALLBACK_FPS
        }
    }
}
