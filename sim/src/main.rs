use std::error::Error;

use sim::BackendSim;
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    tracing_subscriber::fmt::init();

    let port = std::env::var("SIM_PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(12345);
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!("motion backend simulator listening on port {}", port);

    BackendSim::new().serve(listener).await;
    Ok(())
}
