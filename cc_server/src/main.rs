use cc_server::config::ServerConfig;
use cc_server::context::Shared;
use cc_server::listener::Server;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = ServerConfig::from_env();
    info!("command server starting on {}", config.listen_addr());
    info!("motion backend at {}", config.backend.connection_url());

    let ctx = Shared::new(config);
    let server = Server::new(ctx);
    if let Err(e) = server.run().await {
        error!("listener stopped: {}", e);
        std::process::exit(1);
    }
}
