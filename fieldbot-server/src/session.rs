//! Per-client streaming loop

use async_trait::async_trait;
use fieldbot_core::{filter_by_confidence, Command, Detection, StatusSnapshot};
use fieldbot_eye::processing::encode_frame_base64;
use fieldbot_eye::Frame;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tracing::{debug, info, warn};

use crate::metrics;
use crate::state::AppState;

/// Cadence and encoding settings for streaming sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Upper bound on waiting for a command each iteration, milliseconds
    pub command_wait_ms: u64,
    /// Sleep between payloads, milliseconds
    pub pace_ms: u64,
    pub jpeg_quality: u8,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            command_wait_ms: 10,
            pace_ms: 50,
            jpeg_quality: fieldbot_eye::processing::DEFAULT_JPEG_QUALITY,
        }
    }
}

impl SessionConfig {
    pub fn command_wait(&self) -> Duration {
        Duration::from_millis(self.command_wait_ms)
    }

    pub fn pace(&self) -> Duration {
        Duration::from_millis(self.pace_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.pace_ms == 0 {
            return Err("pace_ms must be positive".to_string());
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err("jpeg_quality must be between 1 and 100".to_string());
        }
        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Session closed")]
    Closed,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// One telemetry message: annotated frame, controller status, kept detections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryPayload {
    /// Base64 JPEG
    pub frame: String,
    pub status: StatusSnapshot,
    pub detections: Vec<Detection>,
}

/// Where a session delivers its payloads
#[async_trait]
pub trait TelemetrySink: Send {
    async fn send(&mut self, payload: &TelemetryPayload) -> Result<(), SessionError>;

    /// Tell the observer the stream is over. Called once when the session ends.
    async fn close(&mut self) -> Result<(), SessionError> {
        Ok(())
    }
}

/// What one iteration did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// A payload was delivered
    Sent,
    /// No frame was available or processing failed; nothing was sent
    Skipped,
}

/// Streams telemetry to one observer and applies that observer's commands
/// to the shared controller.
pub struct StreamSession<S> {
    id: String,
    state: AppState,
    commands: mpsc::Receiver<Command>,
    sink: S,
    payloads_sent: u64,
}

impl<S: TelemetrySink> StreamSession<S> {
    pub fn new(id: impl Into<String>, state: AppState, commands: mpsc::Receiver<Command>, sink: S) -> Self {
        Self {
            id: id.into(),
            state,
            commands,
            sink,
            payloads_sent: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn payloads_sent(&self) -> u64 {
        self.payloads_sent
    }

    /// Run until the observer disconnects or delivery fails. The shared
    /// camera and controller are left as they are.
    pub async fn run(mut self) -> Result<(), SessionError> {
        let pace = self.state.session.pace();
        let result = loop {
            match self.tick().await {
                Ok(_) => tokio::time::sleep(pace).await,
                Err(SessionError::Closed) => break Ok(()),
                Err(e) => break Err(e),
            }
        };

        if let Err(e) = self.sink.close().await {
            debug!("Session {}: close failed: {}", self.id, e);
        }

        match &result {
            Ok(()) => info!("Session {} ended after {} payloads", self.id, self.payloads_sent),
            Err(e) => warn!("Session {} ended: {}", self.id, e),
        }
        result
    }

    /// One iteration without the trailing pacing sleep
    pub async fn tick(&mut self) -> Result<Tick, SessionError> {
        self.intake_commands().await?;

        let Some(frame) = self.state.camera.get_frame() else {
            debug!("Session {}: no frame yet", self.id);
            return Ok(Tick::Skipped);
        };

        let Some((detections, encoded)) = self.process(frame).await else {
            return Ok(Tick::Skipped);
        };

        let controller = &self.state.controller;
        controller.update(&detections);
        let status = controller.get_status();

        debug!(
            "[WS {}] State: {} | Detections: {} | Total: {}",
            self.id,
            status.state,
            detections.len(),
            status.stats.total_detections
        );

        let payload = TelemetryPayload {
            frame: encoded,
            status,
            detections,
        };
        self.sink.send(&payload).await?;
        self.payloads_sent += 1;
        metrics::record_payload_sent();
        Ok(Tick::Sent)
    }

    /// Wait up to the command window for one command, then apply whatever
    /// else is already queued.
    async fn intake_commands(&mut self) -> Result<(), SessionError> {
        let wait = self.state.session.command_wait();
        match tokio::time::timeout(wait, self.commands.recv()).await {
            Ok(Some(command)) => self.apply(command),
            Ok(None) => return Err(SessionError::Closed),
            Err(_) => return Ok(()),
        }

        loop {
            match self.commands.try_recv() {
                Ok(command) => self.apply(command),
                Err(TryRecvError::Empty) => return Ok(()),
                Err(TryRecvError::Disconnected) => return Err(SessionError::Closed),
            }
        }
    }

    fn apply(&self, command: Command) {
        debug!("Session {} command: {}", self.id, command);
        metrics::record_command(command.kind());
        let controller = &self.state.controller;
        match command {
            Command::Start => controller.start(),
            Command::Stop => controller.stop(),
            Command::SetThreshold { value } => controller.set_threshold_percent(value),
        }
    }

    /// Detect, filter, annotate and encode on the blocking pool
    async fn process(&self, mut frame: Frame) -> Option<(Vec<Detection>, String)> {
        let active = self.state.controller.is_active();
        let threshold = self.state.controller.threshold();
        let pipeline = self.state.pipeline.clone();
        let annotator = self.state.annotator.clone();
        let quality = self.state.session.jpeg_quality;
        let id = self.id.clone();

        let job = tokio::task::spawn_blocking(move || {
            let detections = if active {
                match pipeline.detect(&frame) {
                    Ok(raw) => filter_by_confidence(raw, threshold),
                    Err(e) => {
                        warn!("Session {}: detection failed: {}", id, e);
                        Vec::new()
                    }
                }
            } else {
                Vec::new()
            };

            annotator.annotate(&mut frame, &detections);
            encode_frame_base64(&frame, quality).map(|encoded| (detections, encoded))
        });

        match job.await {
            Ok(Ok(result)) => Some(result),
            Ok(Err(e)) => {
                warn!("Session {}: frame encoding failed: {}", self.id, e);
                None
            }
            Err(e) => {
                warn!("Session {}: processing task failed: {}", self.id, e);
                None
            }
        }
    }
}
