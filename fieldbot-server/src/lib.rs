pub mod http;
pub mod metrics;
pub mod session;
pub mod settings;
pub mod state;
pub mod websocket;

pub use http::{create_router, HealthResponse};
pub use session::{SessionConfig, SessionError, StreamSession, TelemetryPayload, TelemetrySink, Tick};
pub use settings::{Cli, FieldbotConfig, SettingsError};
pub use state::AppState;
