// Shared application state handed to every handler and session

use fieldbot_core::OperationalController;
use fieldbot_eye::processing::DetectorMode;
use fieldbot_eye::{Annotator, DetectionPipeline, FrameSource};
use std::sync::Arc;

use crate::session::SessionConfig;
use crate::settings::FieldbotConfig;

/// Constructed once at startup. Sessions share the camera and the
/// controller; cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub camera: Arc<FrameSource>,
    pub controller: Arc<OperationalController>,
    pub pipeline: DetectionPipeline,
    pub annotator: Annotator,
    pub session: SessionConfig,
}

impl AppState {
    pub fn new(
        camera: Arc<FrameSource>,
        controller: Arc<OperationalController>,
        pipeline: DetectionPipeline,
        session: SessionConfig,
    ) -> Self {
        let annotator = Annotator::new(controller.target_label());
        Self {
            camera,
            controller,
            pipeline,
            annotator,
            session,
        }
    }

    /// Build everything from configuration. The camera is created but not
    /// started.
    pub fn from_config(config: &FieldbotConfig) -> Self {
        Self::new(
            Arc::new(FrameSource::new(config.camera.clone())),
            Arc::new(OperationalController::new(&config.controller)),
            DetectionPipeline::from_config(&config.detection),
            config.session.clone(),
        )
    }

    /// Effective detector mode, after any fallback
    pub fn mode(&self) -> DetectorMode {
        self.pipeline.mode()
    }
}

#[cfg(test)]
impl AppState {
    /// Test-pattern camera opened once (its trial frame is the latest frame),
    /// manual clock and a fast session cadence
    pub(crate) fn for_tests(
        detector: Arc<dyn fieldbot_eye::Detector>,
        controller: &fieldbot_core::ControllerConfig,
        clock: Arc<dyn fieldbot_core::Clock>,
    ) -> Self {
        let camera = FrameSource::new(Self::test_camera());
        camera
            .open()
            .unwrap_or_else(|e| panic!("test pattern camera failed to open: {}", e));
        Self::new(
            Arc::new(camera),
            Arc::new(OperationalController::with_clock(controller, clock)),
            DetectionPipeline::new(detector, fieldbot_core::LabelMap::default()),
            Self::test_session(),
        )
    }

    pub(crate) fn for_tests_without_frames(detector: Arc<dyn fieldbot_eye::Detector>) -> Self {
        Self::new(
            Arc::new(FrameSource::new(Self::test_camera())),
            Arc::new(OperationalController::new(&fieldbot_core::ControllerConfig::default())),
            DetectionPipeline::new(detector, fieldbot_core::LabelMap::default()),
            Self::test_session(),
        )
    }

    fn test_camera() -> fieldbot_eye::CameraConfig {
        fieldbot_eye::CameraConfig {
            width: 64,
            height: 48,
            backend: fieldbot_eye::BackendKind::TestPattern,
            ..fieldbot_eye::CameraConfig::default()
        }
    }

    fn test_session() -> SessionConfig {
        SessionConfig {
            command_wait_ms: 5,
            pace_ms: 5,
            ..SessionConfig::default()
        }
    }
}
