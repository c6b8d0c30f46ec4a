use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::GrayImage;

use crate::detection::domain::detection_params::DetectionParams;
use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::infrastructure::haar_cascade::HaarCascade;
use crate::detection::infrastructure::integral_image::IntegralImage;
use crate::detection::infrastructure::rect_grouping::{group_rectangles, GROUP_EPS};
use crate::shared::constants::{CASCADE_MODEL_NAME, CASCADE_MODEL_URL, SYSTEM_CASCADE_DIRS};
use crate::shared::error::AnnotateError;
use crate::shared::model_resolver::{self, ProgressFn};
use crate::shared::region::Region;

/// Multi-scale sliding-window face detector driven by a [`HaarCascade`].
///
/// The image is shrunk by `scale_factor` per level while the cascade window
/// stays fixed, so small faces are found first. Hits from every level are
/// mapped back to source coordinates and grouped.
pub struct HaarCascadeDetector {
    cascade: HaarCascade,
}

impl HaarCascadeDetector {
    pub fn new(cascade: HaarCascade) -> Self {
        Self { cascade }
    }

    /// Loads the cascade at `path`, failing with `ModelUnavailable`.
    pub fn from_file(path: &Path) -> Result<Self, AnnotateError> {
        let cascade = HaarCascade::from_file(path)?;
        log::info!(
            "Loaded Haar cascade from {} ({} stages, {}x{} window)",
            path.display(),
            cascade.stages().len(),
            cascade.window_size().0,
            cascade.window_size().1
        );
        Ok(Self::new(cascade))
    }

    /// Locates the stock frontal face cascade and loads it.
    ///
    /// Looks at `explicit` only when given; otherwise the user cache, the
    /// system OpenCV install and finally a download into the cache.
    pub fn frontal_face(
        explicit: Option<&Path>,
        progress: Option<ProgressFn>,
    ) -> Result<Self, AnnotateError> {
        let search_dirs: Vec<PathBuf> = SYSTEM_CASCADE_DIRS.iter().map(PathBuf::from).collect();
        let path = model_resolver::resolve(
            CASCADE_MODEL_NAME,
            CASCADE_MODEL_URL,
            explicit,
            &search_dirs,
            progress,
        )
        .map_err(|e| AnnotateError::ModelUnavailable(e.to_string()))?;
        Self::from_file(&path)
    }

    pub fn cascade(&self) -> &HaarCascade {
        &self.cascade
    }

    /// Every window that passes all stages, in source-image coordinates.
    pub fn candidates(&self, gray: &GrayImage, params: &DetectionParams) -> Vec<Region> {
        let mut hits = Vec::new();
        if !(params.scale_factor > 1.0 && params.scale_factor.is_finite()) {
            return hits;
        }

        let (img_w, img_h) = gray.dimensions();
        let (win_w, win_h) = self.cascade.window_size();
        let mut factor = 1.0f64;

        loop {
            let window_w = (win_w as f64 * factor).round() as u32;
            let window_h = (win_h as f64 * factor).round() as u32;
            let scaled_w = (img_w as f64 / factor).round() as usize;
            let scaled_h = (img_h as f64 / factor).round() as usize;

            if scaled_w <= win_w || scaled_h <= win_h {
                break;
            }
            if let Some((max_w, max_h)) = params.max_size {
                if window_w > max_w || window_h > max_h {
                    break;
                }
            }
            let too_small = params
                .min_size
                .is_some_and(|(min_w, min_h)| window_w < min_w || window_h < min_h);

            if !too_small {
                let integral = if factor == 1.0 {
                    IntegralImage::new(gray)
                } else {
                    let scaled =
                        imageops::resize(gray, scaled_w as u32, scaled_h as u32, FilterType::Triangle);
                    IntegralImage::new(&scaled)
                };
                let step = if factor > 2.0 { 1 } else { 2 };

                for y in (0..scaled_h - win_h).step_by(step) {
                    for x in (0..scaled_w - win_w).step_by(step) {
                        if self.cascade.classify(&integral, x, y) {
                            hits.push(Region::new(
                                (x as f64 * factor).round() as i32,
                                (y as f64 * factor).round() as i32,
                                window_w as i32,
                                window_h as i32,
                            ));
                        }
                    }
                }
            }

            factor *= params.scale_factor;
        }

        hits
    }
}

impl FaceDetector for HaarCascadeDetector {
    fn detect(&self, gray: &GrayImage, params: &DetectionParams) -> Vec<Region> {
        let (w, h) = gray.dimensions();
        let candidates = self.candidates(gray, params);
        log::trace!("{} raw cascade hits", candidates.len());
        let faces: Vec<Region> = group_rectangles(&candidates, params.min_neighbors, GROUP_EPS)
            .into_iter()
            .filter_map(|r| r.clamp_to(w, h))
            .collect();
        debug_assert!(faces.iter().all(|r| r.is_within(w, h)));
        faces
    }
}
