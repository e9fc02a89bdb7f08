//! Drive the simulated load cell and watch its status events

use std::time::Duration;

use forcelink::{LoadCell, MockHandle, MockLoadCell};
use tokio::time::sleep;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> forcelink::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let handle = MockHandle::new().with_base_value(12.0);
    let mut cell = MockLoadCell::with_handle(1, handle.clone());
    let mut events = cell.subscribe();

    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match (&event.error, event.value) {
                (Some(error), _) => println!("[{}] {} ({error})", event.timestamp, event.state),
                (None, Some(value)) => println!("[{}] {} {value:.3}", event.timestamp, event.state),
                (None, None) => println!("[{}] {}", event.timestamp, event.state),
            }
        }
    });

    cell.connect().await?;
    println!("Raw: {}", cell.read_raw_data().await?);

    cell.auto_zero().await?;
    println!("After zero: {:.3}", cell.read_value().await?);

    cell.start_monitoring(Duration::from_millis(200))?;

    handle.simulate_load_change(250.0);
    sleep(Duration::from_secs(1)).await;

    handle.simulate_load_change(1500.0);
    sleep(Duration::from_secs(1)).await;

    handle.simulate_load_change(40.0);
    sleep(Duration::from_secs(1)).await;

    cell.stop_monitoring();
    println!("{}", cell.get_status());

    cell.disconnect().await;

    Ok(())
}
