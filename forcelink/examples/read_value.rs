//! Read a few values from a real indicator
//!
//! LOADCELL_PORT=/dev/ttyUSB0 LOADCELL_ADDRESS=1 cargo run --example read_value

use std::time::Duration;

use forcelink::{ControllerConfig, LoadCell, LoadCellController};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> forcelink::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let port = std::env::var("LOADCELL_PORT").unwrap_or_else(|_| "/dev/ttyUSB0".to_string());
    let address = std::env::var("LOADCELL_ADDRESS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(1);

    let config = ControllerConfig::new(port).with_device_address(address);
    let mut cell = LoadCellController::new(config)?;
    cell.connect().await?;

    println!("{}", cell.get_status());

    for _ in 0..5 {
        match cell.read_value().await {
            Ok(value) => println!("Force: {value:.3}"),
            Err(e) if e.is_recoverable() => println!("No reading: {e}"),
            Err(e) => {
                cell.disconnect().await;
                return Err(e);
            }
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }

    let peak = cell
        .read_peak(Duration::from_secs(1), Duration::from_millis(200))
        .await?;
    println!("{peak}");

    cell.disconnect().await;

    Ok(())
}
