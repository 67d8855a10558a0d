//! Tests for FrameSource

use fieldbot_eye::backends::{CaptureBackend, CaptureDevice, TestPatternBackend};
use fieldbot_eye::config::{BackendKind, CameraConfig};
use fieldbot_eye::error::VisionError;
use fieldbot_eye::{Frame, FrameSource};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn config() -> CameraConfig {
    CameraConfig {
        width: 32,
        height: 24,
        backend: BackendKind::TestPattern,
        retry_backoff_ms: 10,
        pace_ms: 1,
        stop_timeout_ms: 1000,
        ..CameraConfig::default()
    }
}

fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    false
}

/// Backend that refuses to open
struct Refusing {
    name: &'static str,
    attempts: Arc<AtomicUsize>,
}

impl CaptureBackend for Refusing {
    fn name(&self) -> &str {
        self.name
    }

    fn open(&self, _source: u32, _w: u32, _h: u32) -> Result<Box<dyn CaptureDevice>, VisionError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(VisionError::Camera(format!("{} refused", self.name)))
    }
}

/// Device that numbers its frames in the first byte and can be told to fail
struct Counting {
    next: Arc<AtomicU32>,
    fail: Arc<Mutex<bool>>,
    released: Arc<AtomicUsize>,
}

impl CaptureDevice for Counting {
    fn grab(&mut self) -> Result<(), VisionError> {
        if *self.fail.lock() {
            Err(VisionError::TransientCapture("unplugged".to_string()))
        } else {
            Ok(())
        }
    }

    fn retrieve(&mut self) -> Result<Option<Frame>, VisionError> {
        let n = self.next.fetch_add(1, Ordering::SeqCst);
        let mut frame = Frame::filled(4, 4, [0, 0, 0])?;
        frame.data_mut()[0] = (n % 251) as u8;
        Ok(Some(frame))
    }

    fn release(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Clone, Default)]
struct CountingBackend {
    next: Arc<AtomicU32>,
    fail: Arc<Mutex<bool>>,
    released: Arc<AtomicUsize>,
}

impl CaptureBackend for CountingBackend {
    fn name(&self) -> &str {
        "counting"
    }

    fn open(&self, _source: u32, _w: u32, _h: u32) -> Result<Box<dyn CaptureDevice>, VisionError> {
        Ok(Box::new(Counting {
            next: self.next.clone(),
            fail: self.fail.clone(),
            released: self.released.clone(),
        }))
    }
}

#[test]
fn test_get_frame_before_open_is_none() {
    let source = FrameSource::new(config());
    assert!(source.get_frame().is_none());
    assert!(!source.is_running());
}

#[test]
fn test_stop_on_unopened_source_is_noop() {
    let source = FrameSource::new(config());
    source.stop();
    source.stop();
    assert!(!source.is_running());
}

#[test]
fn test_all_backends_failing_is_device_unavailable() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let backends: Vec<Arc<dyn CaptureBackend>> = vec![
        Arc::new(Refusing {
            name: "first",
            attempts: attempts.clone(),
        }),
        Arc::new(Refusing {
            name: "second",
            attempts: attempts.clone(),
        }),
    ];
    let source = FrameSource::with_backends(config(), backends);

    let err = source.open().unwrap_err();
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    match err {
        VisionError::DeviceUnavailable { reason, .. } => {
            assert!(reason.contains("first"));
            assert!(reason.contains("second"));
        }
        other => panic!("expected DeviceUnavailable, got {}", other),
    }

    assert!(source.start().is_err());
    assert!(!source.is_running());
    assert!(source.get_frame().is_none());
}

#[test]
fn test_falls_back_to_next_backend_in_order() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let backends: Vec<Arc<dyn CaptureBackend>> = vec![
        Arc::new(Refusing {
            name: "broken",
            attempts: attempts.clone(),
        }),
        Arc::new(TestPatternBackend),
        Arc::new(Refusing {
            name: "never-tried",
            attempts: attempts.clone(),
        }),
    ];
    let source = FrameSource::with_backends(config(), backends);

    source.open().unwrap();
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    assert_eq!(source.backend_name().as_deref(), Some("test-pattern"));
    assert_eq!(source.get_frame().unwrap().shape(), (24, 32, 3));
}

#[test]
fn test_latest_frame_wins() {
    let backend = CountingBackend::default();
    let source = FrameSource::with_backends(config(), vec![Arc::new(backend.clone())]);
    source.start().unwrap();

    assert!(wait_for(|| backend.next.load(Ordering::SeqCst) > 20));
    let a = source.get_frame().unwrap();
    assert!(wait_for(|| {
        source
            .get_frame()
            .map(|b| b.captured_at() > a.captured_at() || b.data()[0] != a.data()[0])
            .unwrap_or(false)
    }));

    source.stop();
}

#[test]
fn test_returned_frame_is_independent_copy() {
    let source = FrameSource::with_backends(config(), vec![Arc::new(TestPatternBackend)]);
    source.open().unwrap();

    let mut mine = source.get_frame().unwrap();
    let pristine = source.get_frame().unwrap();
    for byte in mine.data_mut() {
        *byte = 7;
    }
    assert_eq!(source.get_frame().unwrap(), pristine);
}

#[test]
fn test_start_is_idempotent_and_stop_releases_device() {
    let backend = CountingBackend::default();
    let source = FrameSource::with_backends(config(), vec![Arc::new(backend.clone())]);

    source.start().unwrap();
    source.start().unwrap();
    assert!(source.is_running());

    source.stop();
    assert!(!source.is_running());
    assert!(backend.released.load(Ordering::SeqCst) >= 1);

    // the slot keeps the last frame after stop
    assert!(source.get_frame().is_some());
    source.stop();
}

#[test]
fn test_capture_recovers_after_transient_failures() {
    let backend = CountingBackend::default();
    let source = FrameSource::with_backends(config(), vec![Arc::new(backend.clone())]);
    source.start().unwrap();

    *backend.fail.lock() = true;
    std::thread::sleep(Duration::from_millis(50));
    let stalled = backend.next.load(Ordering::SeqCst);
    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(backend.next.load(Ordering::SeqCst), stalled);
    assert!(source.is_running());

    *backend.fail.lock() = false;
    assert!(wait_for(|| backend.next.load(Ordering::SeqCst) > stalled + 3));
    source.stop();
}

#[test]
fn test_stop_returns_promptly_during_backoff() {
    let backend = CountingBackend::default();
    let config = CameraConfig {
        retry_backoff_ms: 60_000,
        ..config()
    };
    let source = FrameSource::with_backends(config, vec![Arc::new(backend.clone())]);
    source.start().unwrap();
    *backend.fail.lock() = true;
    std::thread::sleep(Duration::from_millis(20));

    let started = Instant::now();
    source.stop();
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[test]
fn test_restart_after_stop() {
    let source = FrameSource::with_backends(config(), vec![Arc::new(TestPatternBackend)]);
    source.start().unwrap();
    source.stop();
    source.start().unwrap();
    assert!(source.is_running());
    source.stop();
}
