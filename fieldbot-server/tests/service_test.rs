//! End-to-end tests over a real listener: health probe and websocket sessions

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use fieldbot_core::{BoundingBox, ControllerConfig, Detection, LabelMap, OperationalController};
use fieldbot_eye::processing::DetectorMode;
use fieldbot_eye::{BackendKind, CameraConfig, DemoDetector, DetectionPipeline, Detector, Frame, FrameSource, VisionError};
use fieldbot_server::{create_router, AppState, HealthResponse, SessionConfig, TelemetryPayload};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tower::ServiceExt;

type Client = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

struct AlwaysWeed;

impl Detector for AlwaysWeed {
    fn detect(&self, _frame: &Frame) -> Result<Vec<Detection>, VisionError> {
        Ok(vec![
            Detection::new("potted plant", 91.0, BoundingBox::new(5.0, 5.0, 30.0, 30.0)),
            Detection::new("person", 40.0, BoundingBox::new(30.0, 10.0, 60.0, 40.0)),
        ])
    }

    fn mode(&self) -> DetectorMode {
        DetectorMode::Live
    }
}

fn state(detector: Arc<dyn Detector>) -> AppState {
    let camera = FrameSource::new(CameraConfig {
        width: 64,
        height: 48,
        backend: BackendKind::TestPattern,
        ..CameraConfig::default()
    });
    camera.open().unwrap();
    AppState::new(
        Arc::new(camera),
        Arc::new(OperationalController::new(&ControllerConfig::default())),
        DetectionPipeline::new(detector, LabelMap::default()),
        SessionConfig {
            command_wait_ms: 5,
            pace_ms: 10,
            ..SessionConfig::default()
        },
    )
}

async fn serve(state: AppState) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, create_router(state)).await.unwrap();
    });
    format!("ws://{}/ws", addr)
}

async fn next_payload(client: &mut Client) -> TelemetryPayload {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("timed out waiting for telemetry")
            .expect("stream ended")
            .expect("websocket error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

/// Skip payloads until one satisfies `condition`
async fn payload_where(client: &mut Client, condition: impl Fn(&TelemetryPayload) -> bool) -> TelemetryPayload {
    for _ in 0..200 {
        let payload = next_payload(client).await;
        if condition(&payload) {
            return payload;
        }
    }
    panic!("condition never met");
}

async fn send(client: &mut Client, text: &str) {
    client.send(Message::Text(text.to_string())).await.unwrap();
}

#[tokio::test]
async fn test_health_reports_effective_mode() {
    let app = create_router(state(Arc::new(DemoDetector::seeded(0.0, 1))));
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), 1024).await.unwrap();
    let health: HealthResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(health.status, "ok");
    assert_eq!(health.mode, "DEMO");

    let app = create_router(state(Arc::new(AlwaysWeed)));
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = to_bytes(response.into_body(), 1024).await.unwrap();
    assert_eq!(
        serde_json::from_slice::<serde_json::Value>(&body).unwrap(),
        serde_json::json!({"status": "ok", "mode": "LIVE"})
    );
}

#[tokio::test]
async fn test_stream_starts_idle_with_jpeg_frames() {
    let url = serve(state(Arc::new(AlwaysWeed))).await;
    let (mut client, _) = connect_async(url).await.unwrap();

    let payload = next_payload(&mut client).await;
    assert_eq!(payload.status.state.as_str(), "IDLE");
    assert!(payload.detections.is_empty());
    let jpeg = STANDARD.decode(&payload.frame).unwrap();
    assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
}

#[tokio::test]
async fn test_start_maps_labels_and_triggers_action() {
    let url = serve(state(Arc::new(AlwaysWeed))).await;
    let (mut client, _) = connect_async(url).await.unwrap();

    send(&mut client, r#"{"command": "START"}"#).await;
    let payload = payload_where(&mut client, |p| !p.detections.is_empty()).await;

    // the 40% person is below the default 50% threshold
    assert_eq!(payload.detections.len(), 1);
    assert_eq!(payload.detections[0].class_label, "Weed");
    assert_eq!(payload.status.state.as_str(), "ACTION_TRIGGERED");
    assert!(payload.status.stats.weeds_found >= 1);
    assert_eq!(payload.status.stats.other_objects, 0);
}

#[tokio::test]
async fn test_threshold_and_malformed_commands() {
    let url = serve(state(Arc::new(AlwaysWeed))).await;
    let (mut client, _) = connect_async(url).await.unwrap();

    send(&mut client, "not json").await;
    send(&mut client, r#"{"command": "JUMP"}"#).await;
    send(&mut client, r#"{"command": "SET_THRESHOLD", "value": 30}"#).await;
    send(&mut client, r#"{"command": "START"}"#).await;

    let payload = payload_where(&mut client, |p| p.detections.len() == 2).await;
    assert_eq!(payload.status.confidence_threshold, 30);
    let labels: Vec<_> = payload.detections.iter().map(|d| d.class_label.as_str()).collect();
    assert_eq!(labels, vec!["Weed", "Paddy"]);

    send(&mut client, r#"{"command": "SET_THRESHOLD"}"#).await;
    let payload = payload_where(&mut client, |p| p.status.confidence_threshold == 50).await;
    assert!(payload.detections.len() <= 1);
}

#[tokio::test]
async fn test_stop_from_one_client_is_seen_by_another() {
    let app = state(Arc::new(AlwaysWeed));
    let controller = app.controller.clone();
    let url = serve(app).await;

    let (mut a, _) = connect_async(url.clone()).await.unwrap();
    let (mut b, _) = connect_async(url).await.unwrap();

    send(&mut a, r#"{"command": "START"}"#).await;
    payload_where(&mut b, |p| p.status.state.as_str() != "IDLE").await;

    send(&mut a, r#"{"command": "STOP"}"#).await;
    let seen_by_b = payload_where(&mut b, |p| p.status.state.as_str() == "STOPPED").await;
    assert!(seen_by_b.detections.is_empty());
    assert!(!controller.is_active());

    // B disconnecting leaves A streaming; skip A's backlog from before the STOP
    b.close(None).await.unwrap();
    payload_where(&mut a, |p| p.status.state.as_str() == "STOPPED").await;
    let payload = next_payload(&mut a).await;
    assert_eq!(payload.status.state.as_str(), "STOPPED");
    assert!(payload.detections.is_empty());
}
