use thiserror::Error;

/// Failures of the face annotation domain.
///
/// `ModelUnavailable` and `DeviceUnavailable` are fatal and surface before any
/// frame is processed. `InvalidFrame` concerns a single frame; stream callers
/// skip it and keep going. End of stream is not an error: sources simply stop
/// yielding frames.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnnotateError {
    #[error("face detection model unavailable: {0}")]
    ModelUnavailable(String),
    #[error("capture device unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
}

impl AnnotateError {
    /// Whether a stream can continue after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, AnnotateError::InvalidFrame(_))
    }
}
