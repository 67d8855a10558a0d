//! Open a camera, capture for a second and report what came back.
//!
//! Usage: cargo run -p fieldbot-eye --example probe_camera --features opencv -- [index]

use fieldbot_eye::config::CameraConfig;
use fieldbot_eye::FrameSource;
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let source_index = match std::env::args().nth(1) {
        Some(arg) => arg.parse()?,
        None => 0,
    };

    println!("Starting camera verification on index {}...", source_index);
    let camera = FrameSource::new(CameraConfig {
        source: source_index,
        ..CameraConfig::default()
    });

    if let Err(e) = camera.start() {
        println!("Camera unavailable: {}", e);
        println!("No frame captured (expected if no camera is attached).");
        return Ok(());
    }
    println!(
        "Backend in use: {}",
        camera.backend_name().unwrap_or_else(|| "unknown".to_string())
    );

    std::thread::sleep(Duration::from_secs(1));

    match camera.get_frame() {
        Some(frame) => {
            println!("Successfully captured a frame!");
            println!("Frame shape: {:?}", frame.shape());
        }
        None => println!("No frame captured yet."),
    }

    camera.stop();
    println!("Verification complete.");
    Ok(())
}
