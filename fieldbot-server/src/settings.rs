// Layered service configuration: defaults, TOML file, environment, CLI

use clap::Parser;
use config::{Config, Environment, File};
use fieldbot_core::ControllerConfig;
use fieldbot_eye::config::BackendKind;
use fieldbot_eye::{CameraConfig, DetectionConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

use crate::session::SessionConfig;

/// Environment prefix for nested keys, e.g. `FIELDBOT__API__PORT`
pub const ENV_PREFIX: &str = "FIELDBOT";

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid value {value:?} for {name}")]
    LegacyEnv { name: &'static str, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Command line flags. Every flag overrides the loaded configuration.
#[derive(Parser, Debug, Default, Clone)]
#[command(name = "fieldbot-server")]
#[command(about = "Fieldbot perception loop and operator telemetry server", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Configuration file path (TOML)
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Bind address
    #[arg(long)]
    pub host: Option<String>,

    /// HTTP port
    #[arg(long)]
    pub port: Option<u16>,

    /// Use the mock detector
    #[arg(long, conflicts_with = "live")]
    pub demo: bool,

    /// Use the YOLO model
    #[arg(long)]
    pub live: bool,

    /// Camera device index
    #[arg(long)]
    pub camera: Option<u32>,

    /// Use the built-in test pattern instead of a real camera
    #[arg(long)]
    pub test_pattern: bool,

    /// ONNX model path for live mode
    #[arg(long)]
    pub model: Option<PathBuf>,

    /// Initial confidence threshold as a fraction (0.0 - 1.0)
    #[arg(long)]
    pub confidence_threshold: Option<f64>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Emit JSON log lines
    #[arg(long)]
    pub json_logs: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 9000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Complete service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldbotConfig {
    pub api: ApiConfig,
    pub camera: CameraConfig,
    pub detection: DetectionConfig,
    pub controller: ControllerConfig,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
}

impl FieldbotConfig {
    /// Load from the process environment and the given flags
    pub fn load(cli: &Cli) -> Result<Self, SettingsError> {
        Self::load_with_env(cli, std::env::vars().collect())
    }

    /// Load with an explicit environment snapshot
    pub fn load_with_env(cli: &Cli, env: HashMap<String, String>) -> Result<Self, SettingsError> {
        let mut builder = Config::builder();
        if let Some(path) = &cli.config {
            builder = builder.add_source(File::from(path.as_path()).required(true));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true)
                .source(Some(env.clone())),
        );

        let mut settings: FieldbotConfig = builder.build()?.try_deserialize()?;
        settings.apply_legacy_env(&env)?;
        settings.apply_cli(cli);
        settings.validate()?;
        Ok(settings)
    }

    /// Flat variables understood by earlier deployments
    fn apply_legacy_env(&mut self, env: &HashMap<String, String>) -> Result<(), SettingsError> {
        if let Some(host) = env.get("API_HOST") {
            self.api.host = host.clone();
        }
        if let Some(port) = env.get("API_PORT") {
            self.api.port = parse_legacy("API_PORT", port)?;
        }
        if let Some(demo) = env.get("DEMO_MODE") {
            self.detection.demo = demo.trim().eq_ignore_ascii_case("true");
        }
        if let Some(index) = env.get("WEBCAM_INDEX") {
            self.camera.source = parse_legacy("WEBCAM_INDEX", index)?;
        }
        if let Some(threshold) = env.get("CONFIDENCE_THRESHOLD") {
            self.controller.confidence_threshold = parse_legacy("CONFIDENCE_THRESHOLD", threshold)?;
        }
        Ok(())
    }

    fn apply_cli(&mut self, cli: &Cli) {
        if let Some(host) = &cli.host {
            self.api.host = host.clone();
        }
        if let Some(port) = cli.port {
            self.api.port = port;
        }
        if cli.demo {
            self.detection.demo = true;
        }
        if cli.live {
            self.detection.demo = false;
        }
        if let Some(camera) = cli.camera {
            self.camera.source = camera;
        }
        if cli.test_pattern {
            self.camera.backend = BackendKind::TestPattern;
        }
        if let Some(model) = &cli.model {
            self.detection.model_path = model.clone();
        }
        if let Some(threshold) = cli.confidence_threshold {
            self.controller.confidence_threshold = threshold;
        }
        if let Some(level) = &cli.log_level {
            self.logging.level = level.clone();
        }
        if cli.json_logs {
            self.logging.json = true;
        }
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.api.host.trim().is_empty() {
            return Err(SettingsError::Invalid("api.host cannot be empty".to_string()));
        }
        self.camera
            .validate()
            .map_err(|e| SettingsError::Invalid(format!("camera: {}", e)))?;
        self.detection
            .validate()
            .map_err(|e| SettingsError::Invalid(format!("detection: {}", e)))?;
        self.controller
            .validate()
            .map_err(|e| SettingsError::Invalid(format!("controller: {}", e)))?;
        self.session
            .validate()
            .map_err(|e| SettingsError::Invalid(format!("session: {}", e)))?;
        Ok(())
    }

    /// `host:port` to bind
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}

fn parse_legacy<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, SettingsError> {
    value.trim().parse().map_err(|_| SettingsError::LegacyEnv {
        name,
        value: value.to_string(),
    })
}
