//! Capture backends the frame source can try

use std::sync::Arc;

use crate::config::BackendKind;
use crate::error::VisionError;
use crate::frame::Frame;

#[cfg(feature = "opencv")]
pub mod opencv_backend;
pub mod test_pattern;

#[cfg(feature = "opencv")]
pub use opencv_backend::OpenCvBackend;
pub use test_pattern::TestPatternBackend;

/// An opened camera
pub trait CaptureDevice: Send {
    /// Advance to the most recent hardware frame
    fn grab(&mut self) -> Result<(), VisionError>;

    /// Decode the grabbed frame. `Ok(None)` when the device had nothing to decode.
    fn retrieve(&mut self) -> Result<Option<Frame>, VisionError>;

    /// Hand the device back to the OS. Must tolerate repeated calls.
    fn release(&mut self);
}

/// A way of opening a camera
pub trait CaptureBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Open `source` with a one-frame internal buffer at the requested resolution
    fn open(&self, source: u32, width: u32, height: u32) -> Result<Box<dyn CaptureDevice>, VisionError>;
}

/// Ordered backend list for a configured kind
pub fn backends_for(kind: BackendKind) -> Vec<Arc<dyn CaptureBackend>> {
    match kind {
        BackendKind::TestPattern => vec![Arc::new(TestPatternBackend::default())],
        BackendKind::Auto => platform_backends(),
    }
}

#[cfg(feature = "opencv")]
fn platform_backends() -> Vec<Arc<dyn CaptureBackend>> {
    OpenCvBackend::platform_defaults()
        .into_iter()
        .map(|b| Arc::new(b) as Arc<dyn CaptureBackend>)
        .collect()
}

#[cfg(not(feature = "opencv"))]
fn platform_backends() -> Vec<Arc<dyn CaptureBackend>> {
    tracing::warn!("Built without the `opencv` feature, using the test pattern camera");
    vec![Arc::new(TestPatternBackend::default())]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_test_pattern_kind() {
        let backends = backends_for(BackendKind::TestPattern);
        assert_eq!(backends.len(), 1);
        assert_eq!(backends[0].name(), "test-pattern");
    }

    #[test]
    fn test_auto_is_never_empty() {
        assert!(!backends_for(BackendKind::Auto).is_empty());
    }
}
