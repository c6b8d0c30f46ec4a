use crate::shared::constants::{DEFAULT_MIN_FACE_SIZE, DEFAULT_MIN_NEIGHBORS, DEFAULT_SCALE_FACTOR};

/// Tuning of the multi-scale scan.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectionParams {
    /// Ratio between successive scan scales; must exceed 1.
    pub scale_factor: f64,
    /// A grouped detection survives only with more than this many member windows.
    pub min_neighbors: usize,
    /// Windows smaller than this are not scanned.
    pub min_size: Option<(u32, u32)>,
    /// Windows larger than this are not scanned.
    pub max_size: Option<(u32, u32)>,
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            scale_factor: DEFAULT_SCALE_FACTOR,
            min_neighbors: DEFAULT_MIN_NEIGHBORS,
            min_size: None,
            max_size: None,
        }
    }
}

impl DetectionParams {
    /// Defaults plus the 30x30 minimum face size filter.
    pub fn with_default_min_size() -> Self {
        Self {
            min_size: Some((DEFAULT_MIN_FACE_SIZE, DEFAULT_MIN_FACE_SIZE)),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(self.scale_factor > 1.0 && self.scale_factor.is_finite()) {
            return Err(format!(
                "scale factor must be greater than 1.0, got {}",
                self.scale_factor
            ));
        }
        if let (Some((min_w, min_h)), Some((max_w, max_h))) = (self.min_size, self.max_size) {
            if min_w > max_w || min_h > max_h {
                return Err(format!(
                    "minimum size {min_w}x{min_h} exceeds maximum size {max_w}x{max_h}"
                ));
            }
        }
        Ok(())
    }
}
