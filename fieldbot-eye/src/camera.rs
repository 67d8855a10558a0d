//! Background camera capture with a latest-frame slot

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use metrics::counter;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::backends::{backends_for, CaptureBackend, CaptureDevice};
use crate::config::CameraConfig;
use crate::error::VisionError;
use crate::frame::Frame;

/// Counter bumped on every failed grab or decode
pub const CAPTURE_FAILURES: &str = "fieldbot_capture_failures_total";

/// Owns the camera and a dedicated capture thread.
///
/// Readers call [`FrameSource::get_frame`] and receive their own copy of the
/// most recent frame. The slot lock is held only for the swap and the copy;
/// device reads happen outside it.
pub struct FrameSource {
    config: CameraConfig,
    backends: Vec<Arc<dyn CaptureBackend>>,
    latest: Arc<RwLock<Option<Frame>>>,
    lifecycle: Mutex<Lifecycle>,
    running: AtomicBool,
}

#[derive(Default)]
struct Lifecycle {
    /// Opened but not yet handed to a capture thread
    device: Option<Box<dyn CaptureDevice>>,
    backend: Option<String>,
    worker: Option<CaptureWorker>,
}

struct CaptureWorker {
    stop_tx: Sender<()>,
    done_rx: Receiver<()>,
    handle: JoinHandle<()>,
}

impl FrameSource {
    /// Frame source over the backends the config asks for
    pub fn new(config: CameraConfig) -> Self {
        let backends = backends_for(config.backend);
        Self::with_backends(config, backends)
    }

    /// Frame source over an explicit, ordered backend list
    pub fn with_backends(config: CameraConfig, backends: Vec<Arc<dyn CaptureBackend>>) -> Self {
        Self {
            config,
            backends,
            latest: Arc::new(RwLock::new(None)),
            lifecycle: Mutex::new(Lifecycle::default()),
            running: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    /// Open the camera, trying each backend in order until one opens and
    /// yields a frame. Leaves the source unopened on failure.
    pub fn open(&self) -> Result<(), VisionError> {
        let mut lifecycle = self.lifecycle.lock();
        self.open_locked(&mut lifecycle)
    }

    fn open_locked(&self, lifecycle: &mut Lifecycle) -> Result<(), VisionError> {
        if lifecycle.device.is_some() || lifecycle.worker.is_some() {
            return Ok(());
        }

        let CameraConfig { source, width, height, .. } = self.config;
        let mut failures = Vec::new();

        for backend in &self.backends {
            info!("Attempting camera initialization with backend: {}", backend.name());
            let mut device = match backend.open(source, width, height) {
                Ok(device) => device,
                Err(e) => {
                    warn!("Backend {} could not open camera {}: {}", backend.name(), source, e);
                    failures.push(format!("{}: {}", backend.name(), e));
                    continue;
                }
            };

            match capture_once(device.as_mut()) {
                Ok(Some(frame)) => {
                    info!(
                        "Camera {} initialized with backend {} at {}x{}",
                        source,
                        backend.name(),
                        frame.width(),
                        frame.height()
                    );
                    *self.latest.write() = Some(frame);
                    lifecycle.device = Some(device);
                    lifecycle.backend = Some(backend.name().to_string());
                    return Ok(());
                }
                Ok(None) => {
                    warn!("Opened but failed to read from backend {}", backend.name());
                    failures.push(format!("{}: no frame on trial read", backend.name()));
                }
                Err(e) => {
                    warn!("Opened but failed to read from backend {}: {}", backend.name(), e);
                    failures.push(format!("{}: {}", backend.name(), e));
                }
            }
            device.release();
        }

        error!(
            "All camera backends failed for camera {}. Is another application using it?",
            source
        );
        let reason = if failures.is_empty() {
            "no capture backends configured".to_string()
        } else {
            failures.join("; ")
        };
        Err(VisionError::DeviceUnavailable {
            source_id: source,
            reason,
        })
    }

    /// Start the capture thread, opening the camera first if needed.
    /// Calling it while already running is a no-op.
    pub fn start(&self) -> Result<(), VisionError> {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.worker.is_some() {
            return Ok(());
        }

        if let Err(e) = self.open_locked(&mut lifecycle) {
            error!("Cannot start: camera is not opened");
            return Err(e);
        }

        let device = lifecycle.device.take().ok_or_else(|| {
            VisionError::Camera("Camera opened without a device handle".to_string())
        })?;

        let (stop_tx, stop_rx) = channel::bounded::<()>(1);
        let (done_tx, done_rx) = channel::bounded::<()>(1);
        let latest = self.latest.clone();
        let backoff = self.config.retry_backoff();
        let pace = self.config.pace();

        let handle = std::thread::Builder::new()
            .name("fieldbot-capture".into())
            .spawn(move || capture_loop(device, latest, stop_rx, done_tx, backoff, pace))?;

        lifecycle.worker = Some(CaptureWorker {
            stop_tx,
            done_rx,
            handle,
        });
        self.running.store(true, Ordering::Release);
        info!("Camera capture loop started");
        Ok(())
    }

    /// Stop the capture thread and release the camera. Safe to call any
    /// number of times, including on a source that never opened.
    pub fn stop(&self) {
        let (worker, device) = {
            let mut lifecycle = self.lifecycle.lock();
            lifecycle.backend = None;
            (lifecycle.worker.take(), lifecycle.device.take())
        };
        self.running.store(false, Ordering::Release);

        if let Some(mut device) = device {
            device.release();
        }

        let Some(worker) = worker else {
            return;
        };

        let CaptureWorker {
            stop_tx,
            done_rx,
            handle,
        } = worker;
        drop(stop_tx);

        match done_rx.recv_timeout(self.config.stop_timeout()) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if handle.join().is_err() {
                    error!("Camera capture thread panicked");
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    "Capture thread did not exit within {:?}, detaching it",
                    self.config.stop_timeout()
                );
            }
        }
        info!("Camera capture loop stopped and released");
    }

    /// Copy of the most recent frame, `None` before the first capture
    pub fn get_frame(&self) -> Option<Frame> {
        self.latest.read().clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn is_open(&self) -> bool {
        let lifecycle = self.lifecycle.lock();
        lifecycle.device.is_some() || lifecycle.worker.is_some()
    }

    /// Name of the backend that opened the camera
    pub fn backend_name(&self) -> Option<String> {
        self.lifecycle.lock().backend.clone()
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        self.stop();
    }
}

fn capture_once(device: &mut dyn CaptureDevice) -> Result<Option<Frame>, VisionError> {
    device.grab()?;
    device.retrieve()
}

/// `true` if the wait ran out, `false` once a stop was requested
fn wait_unless_stopped(stop_rx: &Receiver<()>, wait: Duration) -> bool {
    matches!(stop_rx.recv_timeout(wait), Err(RecvTimeoutError::Timeout))
}

fn capture_loop(
    mut device: Box<dyn CaptureDevice>,
    latest: Arc<RwLock<Option<Frame>>>,
    stop_rx: Receiver<()>,
    done_tx: Sender<()>,
    backoff: Duration,
    pace: Duration,
) {
    loop {
        let keep_going = match capture_once(device.as_mut()) {
            Ok(Some(frame)) => {
                *latest.write() = Some(frame);
                wait_unless_stopped(&stop_rx, pace)
            }
            Ok(None) => {
                debug!("Camera grabbed but decoded nothing");
                wait_unless_stopped(&stop_rx, pace)
            }
            Err(e) => {
                counter!(CAPTURE_FAILURES).increment(1);
                if e.is_transient() {
                    warn!("Camera capture failed, retrying in {:?}: {}", backoff, e);
                } else {
                    error!("Error in capture loop, retrying in {:?}: {}", backoff, e);
                }
                wait_unless_stopped(&stop_rx, backoff)
            }
        };

        if !keep_going {
            break;
        }
    }

    device.release();
    let _ = done_tx.send(());
}
